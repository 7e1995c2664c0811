use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::topic_classifier::TopicClassifier;
use crate::config::TopicConfig;
use crate::domain::embedding::{TextEmbedder, TextExtractor};
use crate::domain::errors::{LibraryError, PipelineError};
use crate::domain::library::{
    ArchiveMode, IngestOutcome, IngestReport, ItemStatus, PaperHit, PaperPayload, SearchOutcome,
};
use crate::domain::vector_repository::{PayloadFilter, PointToUpsert, VectorRepository};
use crate::infrastructure::file_system::{archive_file, list_pdfs};

/// Settings the paper pipeline needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct PaperSettings {
    pub text_model: String,
    pub archive_root: PathBuf,
    pub topics: TopicConfig,
}

/// Ingests, classifies, archives and searches PDF papers.
pub struct PaperService {
    embedder: Arc<dyn TextEmbedder>,
    extractor: Arc<dyn TextExtractor>,
    repository: Arc<dyn VectorRepository>,
    classifier: TopicClassifier,
    settings: PaperSettings,
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

impl PaperService {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        extractor: Arc<dyn TextExtractor>,
        repository: Arc<dyn VectorRepository>,
        settings: PaperSettings,
    ) -> Self {
        let classifier = TopicClassifier::new(
            embedder.clone(),
            settings.text_model.clone(),
            settings.topics.prompt_template.clone(),
        );
        Self {
            embedder,
            extractor,
            repository,
            classifier,
            settings,
        }
    }

    /// Adds one PDF or every PDF under a directory to the library.
    ///
    /// Each file is handled on its own; failures are recorded in the report and
    /// never stop the batch.
    pub async fn ingest(&self, path: &Path, candidate_topics: &[String], mode: ArchiveMode) -> Result<IngestReport> {
        let pdfs = list_pdfs(path);
        if pdfs.is_empty() {
            log::warn!("No PDF files found under {}", path.display());
        } else {
            log::info!("Found {} PDF files under {}", pdfs.len(), path.display());
        }

        let mut outcomes = Vec::with_capacity(pdfs.len());
        for pdf in pdfs {
            log::info!("Processing: {}", pdf.display());
            let status = match self.ingest_one(&pdf, candidate_topics, mode).await {
                Ok(status) => status,
                Err(error) => {
                    log::error!("  -> failed: {}", error);
                    ItemStatus::Failed { error }
                }
            };
            outcomes.push(IngestOutcome { source: pdf, status });
        }

        let total_records = self
            .repository
            .count()
            .await
            .context("Failed to count paper records")?;
        log::info!("Ingestion finished. Papers in library: {}", total_records);
        Ok(IngestReport { outcomes, total_records })
    }

    /// Bulk-organizes an existing folder through the ingestion pipeline.
    pub async fn organize(&self, dir: &Path, candidate_topics: &[String], mode: ArchiveMode) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(LibraryError::NotADirectory(dir.to_path_buf()).into());
        }
        self.ingest(dir, candidate_topics, mode).await
    }

    async fn ingest_one(&self, pdf: &Path, candidate_topics: &[String], mode: ArchiveMode) -> Result<ItemStatus, PipelineError> {
        let topics = &self.settings.topics;

        let text = self
            .extractor
            .extract_text(pdf)
            .map_err(|e| PipelineError::Extraction(format!("{:#}", e)))?;
        if text.trim().is_empty() {
            let reason = "PDF has no extractable text".to_string();
            log::warn!("  -> skipped: {}", reason);
            return Ok(ItemStatus::Skipped { reason });
        }

        let snippet = truncate_chars(&text, topics.classify_chars);
        let topic = self
            .classifier
            .classify(
                snippet,
                candidate_topics,
                &topics.definitions,
                topics.min_similarity,
                &topics.default_topic,
            )
            .map_err(|e| PipelineError::Classification(format!("{:#}", e)))?;

        log::info!("  -> topic: {}  similarity: {:.3}", topic.label, topic.similarity);

        // Embed before archiving so a failure leaves the source where it was.
        let vector = self
            .embedder
            .embed_text(&self.settings.text_model, snippet)
            .map_err(|e| PipelineError::Embedding(format!("{:#}", e)))?;

        let archived_path = archive_file(pdf, &self.settings.archive_root, &topic.label, &topics.default_topic, mode)
            .map_err(|source| PipelineError::Archive {
                target: self.settings.archive_root.join(&topic.label),
                source,
            })?;
        log::info!("  -> archived to: {}", archived_path.display());

        let payload = PaperPayload {
            path: archived_path.to_string_lossy().to_string(),
            topic: topic.label.clone(),
            topic_sim: topic.similarity,
            document: truncate_chars(&text, topics.stored_chars).to_string(),
        };
        let id = Uuid::new_v4().to_string();
        let point = PointToUpsert {
            id: id.clone(),
            vector,
            payload: serde_json::to_value(&payload).map_err(|e| PipelineError::Store(e.to_string()))?,
        };
        self.repository.upsert_points(&[point]).await.map_err(|e| {
            PipelineError::Store(format!(
                "{:#} (file already archived at {}; re-add it from there)",
                e,
                archived_path.display()
            ))
        })?;

        Ok(ItemStatus::Indexed {
            id,
            archived_path,
            topic: topic.label,
            similarity: topic.similarity,
        })
    }

    /// Finds the papers closest to `query`, optionally within one topic.
    pub async fn search(&self, query: &str, top_k: usize, topic: Option<&str>) -> Result<SearchOutcome<PaperHit>> {
        if self.repository.count().await? == 0 {
            log::info!("Paper collection is empty.");
            return Ok(SearchOutcome::EmptyLibrary);
        }
        if top_k == 0 {
            return Ok(SearchOutcome::Hits(Vec::new()));
        }

        let query_vector = self.embedder.embed_text(&self.settings.text_model, query)?;
        let expected = self.repository.dimension();
        if query_vector.len() != expected {
            return Err(LibraryError::DimensionMismatch {
                collection: self.repository.collection_name(),
                expected,
                actual: query_vector.len(),
            }
            .into());
        }

        let filter = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| PayloadFilter::matches("topic", t));
        let records = self.repository.search(query_vector, top_k, filter).await?;

        let mut hits = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<PaperPayload>(record.payload) {
                Ok(payload) => hits.push(PaperHit {
                    id: record.id,
                    path: payload.path,
                    topic: payload.topic,
                    topic_sim: payload.topic_sim,
                    distance: record.distance,
                }),
                Err(e) => log::error!("Skipping paper record {} with unreadable payload: {}", record.id, e),
            }
        }
        Ok(SearchOutcome::Hits(hits))
    }

    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vector_repository::{MockVectorRepository, ScoredRecord};
    use assert_matches::assert_matches;
    use mockall::predicate::*;

    struct ConstantEmbedder(Vec<f32>);

    impl TextEmbedder for ConstantEmbedder {
        fn embed_texts(&self, _model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }

        fn text_dimension(&self, _model: &str) -> Result<usize> {
            Ok(self.0.len())
        }
    }

    struct NoExtractor;

    impl TextExtractor for NoExtractor {
        fn extract_text(&self, path: &Path) -> Result<String> {
            Err(anyhow::anyhow!("unexpected extraction of {}", path.display()))
        }
    }

    struct FixedExtractor(&'static str);

    impl TextExtractor for FixedExtractor {
        fn extract_text(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn service(repository: MockVectorRepository, vector: Vec<f32>) -> PaperService {
        PaperService::new(
            Arc::new(ConstantEmbedder(vector)),
            Arc::new(NoExtractor),
            Arc::new(repository),
            PaperSettings {
                text_model: "test-model".to_string(),
                archive_root: PathBuf::from("/unused"),
                topics: TopicConfig::default(),
            },
        )
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("論文テキスト", 2), "論文");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_search_empty_collection_reports_empty_library() {
        let mut repo = MockVectorRepository::new();
        repo.expect_count().times(1).returning(|| Ok(0));
        repo.expect_search().times(0);

        let outcome = service(repo, vec![1.0, 0.0]).search("anything", 5, None).await.unwrap();
        assert!(outcome.is_empty_library());
    }

    #[tokio::test]
    async fn test_search_with_topic_filter_maps_payloads() {
        let mut repo = MockVectorRepository::new();
        repo.expect_count().returning(|| Ok(2));
        repo.expect_dimension().return_const(2usize);
        repo.expect_search()
            .with(
                eq(vec![1.0, 0.0]),
                eq(3usize),
                eq(Some(PayloadFilter::matches("topic", "CV"))),
            )
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    ScoredRecord {
                        id: "a".to_string(),
                        distance: 0.1,
                        payload: serde_json::json!({
                            "path": "/lib/CV/a.pdf",
                            "topic": "CV",
                            "topic_sim": 0.42,
                            "document": "text",
                        }),
                    },
                    ScoredRecord {
                        id: "broken".to_string(),
                        distance: 0.2,
                        payload: serde_json::json!({ "unexpected": true }),
                    },
                ])
            });

        let hits = service(repo, vec![1.0, 0.0])
            .search("detection", 3, Some(" CV "))
            .await
            .unwrap()
            .into_hits();
        assert_eq!(
            hits,
            vec![PaperHit {
                id: "a".to_string(),
                path: "/lib/CV/a.pdf".to_string(),
                topic: "CV".to_string(),
                topic_sim: 0.42,
                distance: 0.1,
            }]
        );
    }

    #[tokio::test]
    async fn test_search_blank_topic_is_global() {
        let mut repo = MockVectorRepository::new();
        repo.expect_count().returning(|| Ok(1));
        repo.expect_dimension().return_const(2usize);
        repo.expect_search()
            .withf(|_, _, filter| filter.is_none())
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let outcome = service(repo, vec![0.0, 1.0]).search("q", 5, Some("  ")).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Hits(Vec::new()));
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch_is_hard_error() {
        let mut repo = MockVectorRepository::new();
        repo.expect_count().returning(|| Ok(4));
        repo.expect_dimension().return_const(384usize);
        repo.expect_collection_name().return_const("papers".to_string());
        repo.expect_search().times(0);

        let err = service(repo, vec![1.0, 0.0, 0.0]).search("q", 5, None).await.unwrap_err();
        assert_matches!(
            err.downcast_ref::<LibraryError>(),
            Some(LibraryError::DimensionMismatch { expected: 384, actual: 3, .. })
        );
    }

    #[tokio::test]
    async fn test_store_failure_names_archived_location() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("paper.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let library = dir.path().join("library");

        let mut repo = MockVectorRepository::new();
        repo.expect_upsert_points()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        repo.expect_count().returning(|| Ok(0));

        let service = PaperService::new(
            Arc::new(ConstantEmbedder(vec![1.0, 0.0])),
            Arc::new(FixedExtractor("some paper text")),
            Arc::new(repo),
            PaperSettings {
                text_model: "test-model".to_string(),
                archive_root: library.clone(),
                topics: TopicConfig::default(),
            },
        );
        let report = service.ingest(&source, &[], ArchiveMode::Move).await.unwrap();

        let archived = library.join("Other").join("paper.pdf");
        assert!(archived.exists());
        assert_matches!(
            &report.outcomes[0].status,
            ItemStatus::Failed { error: PipelineError::Store(message) } => {
                assert!(message.contains("connection refused"));
                assert!(message.contains(&archived.display().to_string()));
            }
        );
    }

    #[tokio::test]
    async fn test_organize_requires_directory() {
        let repo = MockVectorRepository::new();
        let err = service(repo, vec![1.0])
            .organize(Path::new("/definitely/not/here"), &[], ArchiveMode::Copy)
            .await
            .unwrap_err();
        assert_matches!(err.downcast_ref::<LibraryError>(), Some(LibraryError::NotADirectory(_)));
    }
}
