#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use papershelf::application::topic_classifier::cosine_similarity;
use papershelf::config::{Metric, TopicConfig};
use papershelf::domain::embedding::l2_normalize;
use papershelf::{
    ImageEmbedder, ImageService, ImageSettings, LibraryError, PaperService, PaperSettings, PayloadFilter,
    PointToUpsert, ScoredRecord, TextEmbedder, TextExtractor, VectorRepository,
};

type StoredPoint = (String, Vec<f32>, serde_json::Value);

/// A collection kept in memory. `None` means the collection does not exist.
pub struct InMemoryRepository {
    name: String,
    dimension: usize,
    metric: Metric,
    points: Mutex<Option<Vec<StoredPoint>>>,
}

impl InMemoryRepository {
    pub fn new(name: &str, dimension: usize, metric: Metric) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            metric,
            points: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            Metric::Cosine => 1.0 - cosine_similarity(a, b),
            Metric::Euclid => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
            Metric::Dot => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(LibraryError::DimensionMismatch {
                collection: self.name.clone(),
                expected: self.dimension,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorRepository for InMemoryRepository {
    async fn initialize_collection(&self) -> Result<()> {
        let mut points = self.points.lock().unwrap();
        if points.is_none() {
            *points = Some(Vec::new());
        }
        Ok(())
    }

    async fn upsert_points(&self, new_points: &[PointToUpsert]) -> Result<()> {
        let mut guard = self.points.lock().unwrap();
        let points = guard
            .as_mut()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;
        for point in new_points {
            self.check_dimension(point.vector.len())?;
            let record = (point.id.clone(), point.vector.clone(), point.payload.clone());
            match points.iter_mut().find(|(id, _, _)| *id == point.id) {
                Some(existing) => *existing = record,
                None => points.push(record),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<PayloadFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        self.check_dimension(query_vector.len())?;
        let guard = self.points.lock().unwrap();
        let points = guard
            .as_ref()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;

        let mut records: Vec<ScoredRecord> = points
            .iter()
            .filter(|(_, _, payload)| match &filter {
                Some(f) => payload.get(&f.key).and_then(|v| v.as_str()) == Some(f.value.as_str()),
                None => true,
            })
            .map(|(id, vector, payload)| ScoredRecord {
                id: id.clone(),
                distance: self.distance(&query_vector, vector),
                payload: payload.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        records.truncate(limit);
        Ok(records)
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.points.lock().unwrap();
        let points = guard
            .as_ref()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;
        Ok(points.len() as u64)
    }

    async fn delete_collection(&self) -> Result<bool> {
        Ok(self.points.lock().unwrap().take().is_some())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn collection_name(&self) -> String {
        self.name.clone()
    }
}

/// Embeds text by counting keyword groups, one dimension per group.
///
/// Images are "embedded" by reading the file as text, so fixtures can be
/// plain files whose contents name what the picture shows.
pub struct KeywordEmbedder {
    groups: Vec<Vec<&'static str>>,
}

impl KeywordEmbedder {
    /// Groups matching the default topic catalog: vision, language, reinforcement learning.
    pub fn topics() -> Self {
        Self {
            groups: vec![
                vec!["vision", "image", "detection", "segmentation"],
                vec!["language", "text", "transformer"],
                vec!["reinforcement", "reward", "agent", "policy"],
            ],
        }
    }

    pub fn animals() -> Self {
        Self {
            groups: vec![vec!["cat"], vec!["dog"], vec!["car"]],
        }
    }

    pub fn dimension(&self) -> usize {
        self.groups.len()
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .groups
            .iter()
            .map(|words| words.iter().map(|w| lower.matches(w).count()).sum::<usize>() as f32)
            .collect();
        l2_normalize(&mut vector);
        vector
    }
}

impl TextEmbedder for KeywordEmbedder {
    fn embed_texts(&self, _model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn text_dimension(&self, _model: &str) -> Result<usize> {
        Ok(self.dimension())
    }
}

impl ImageEmbedder for KeywordEmbedder {
    fn embed_images(&self, _model: &str, images: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        images
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path)?;
                Ok(self.embed(&String::from_utf8_lossy(&bytes)))
            })
            .collect()
    }

    fn image_dimension(&self, _model: &str) -> Result<usize> {
        Ok(self.dimension())
    }
}

/// Treats every "PDF" as a UTF-8 text file.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Wraps [`KeywordEmbedder::topics`], remembering every input and failing on
/// inputs that contain `fail_marker`.
pub struct RecordingEmbedder {
    inner: KeywordEmbedder,
    fail_marker: Option<&'static str>,
    pub inputs: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: KeywordEmbedder::topics(),
            fail_marker: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(marker: &'static str) -> Self {
        Self {
            fail_marker: Some(marker),
            ..Self::new()
        }
    }
}

impl TextEmbedder for RecordingEmbedder {
    fn embed_texts(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.inputs
            .lock()
            .unwrap()
            .extend(texts.iter().map(|t| t.to_string()));
        if let Some(marker) = self.fail_marker {
            if texts.iter().any(|t| t.contains(marker)) {
                return Err(anyhow!("model rejected input containing {:?}", marker));
            }
        }
        self.inner.embed_texts(model, texts)
    }

    fn text_dimension(&self, model: &str) -> Result<usize> {
        self.inner.text_dimension(model)
    }
}

pub fn paper_service(archive_root: &Path) -> (PaperService, Arc<InMemoryRepository>) {
    paper_service_with(archive_root, Arc::new(KeywordEmbedder::topics()))
}

pub fn paper_service_with(
    archive_root: &Path,
    embedder: Arc<dyn TextEmbedder>,
) -> (PaperService, Arc<InMemoryRepository>) {
    let dimension = embedder.text_dimension("keywords").unwrap();
    let repo = Arc::new(InMemoryRepository::new("papers", dimension, Metric::Euclid));
    let service = PaperService::new(
        embedder,
        Arc::new(PlainTextExtractor),
        repo.clone(),
        PaperSettings {
            text_model: "keywords".to_string(),
            archive_root: archive_root.to_path_buf(),
            topics: TopicConfig::default(),
        },
    );
    (service, repo)
}

pub fn image_service() -> (ImageService, Arc<InMemoryRepository>) {
    let embedder = Arc::new(KeywordEmbedder::animals());
    let repo = Arc::new(InMemoryRepository::new("images", embedder.dimension(), Metric::Cosine));
    let service = ImageService::new(
        embedder.clone(),
        embedder,
        repo.clone(),
        ImageSettings {
            image_model: "clip-vision".to_string(),
            query_model: "clip-text".to_string(),
        },
    );
    (service, repo)
}

pub fn all_topics() -> Vec<String> {
    TopicConfig::default().labels()
}
