use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::embedding::{ImageEmbedder, TextEmbedder};
use crate::domain::errors::LibraryError;
use crate::domain::library::{ImageHit, ImageIndexReport, ImagePayload, SearchOutcome};
use crate::domain::vector_repository::{PointToUpsert, VectorRepository};
use crate::infrastructure::file_system::{absolute_path, list_images, stable_image_id};

#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Encoder for the images themselves.
    pub image_model: String,
    /// Text encoder sharing the image model's embedding space, used for queries.
    pub query_model: String,
}

/// Indexes images and searches them with free-text descriptions.
pub struct ImageService {
    image_embedder: Arc<dyn ImageEmbedder>,
    text_embedder: Arc<dyn TextEmbedder>,
    repository: Arc<dyn VectorRepository>,
    settings: ImageSettings,
}

impl ImageService {
    pub fn new(
        image_embedder: Arc<dyn ImageEmbedder>,
        text_embedder: Arc<dyn TextEmbedder>,
        repository: Arc<dyn VectorRepository>,
        settings: ImageSettings,
    ) -> Self {
        Self {
            image_embedder,
            text_embedder,
            repository,
            settings,
        }
    }

    /// Embeds every image under `path` and upserts it keyed by its path.
    ///
    /// Re-indexing a path overwrites its record instead of adding a new one.
    pub async fn index(&self, path: &Path) -> Result<ImageIndexReport> {
        let images = list_images(path);
        if images.is_empty() {
            log::warn!("No image files found under {}", path.display());
            return Ok(ImageIndexReport {
                total_records: self.repository.count().await?,
                ..Default::default()
            });
        }
        log::info!("Found {} images, building index...", images.len());

        let absolute: Vec<PathBuf> = images
            .iter()
            .map(|p| absolute_path(p))
            .collect::<std::io::Result<_>>()
            .context("Failed to resolve image paths")?;
        let embeddings = self
            .image_embedder
            .embed_images(&self.settings.image_model, &absolute)
            .context("Failed to embed images")?;
        if embeddings.len() != absolute.len() {
            anyhow::bail!(
                "Image model returned {} embeddings for {} images",
                embeddings.len(),
                absolute.len()
            );
        }

        let dimension = embeddings.first().map(Vec::len);
        if let Some(first) = embeddings.first() {
            log::info!("Embedding dimension: {}", first.len());
            log::debug!("First values: {:?}", &first[..first.len().min(5)]);
        }

        let points = absolute
            .iter()
            .zip(embeddings)
            .map(|(image, vector)| {
                let payload = ImagePayload {
                    path: image.to_string_lossy().to_string(),
                };
                Ok(PointToUpsert {
                    id: stable_image_id(image)?,
                    vector,
                    payload: serde_json::to_value(payload)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.repository.upsert_points(&points).await?;

        let total_records = self.repository.count().await?;
        log::info!("Image indexing finished. Images in library: {}", total_records);
        Ok(ImageIndexReport {
            discovered: images.len(),
            indexed: points.len(),
            dimension,
            total_records,
        })
    }

    /// Finds images matching a text description.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome<ImageHit>> {
        if self.repository.count().await? == 0 {
            log::info!("Image collection is empty.");
            return Ok(SearchOutcome::EmptyLibrary);
        }
        if top_k == 0 {
            return Ok(SearchOutcome::Hits(Vec::new()));
        }

        let query_vector = self.text_embedder.embed_text(&self.settings.query_model, query)?;
        let expected = self.repository.dimension();
        if query_vector.len() != expected {
            return Err(LibraryError::DimensionMismatch {
                collection: self.repository.collection_name(),
                expected,
                actual: query_vector.len(),
            }
            .into());
        }

        let records = self.repository.search(query_vector, top_k, None).await?;
        let hits = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<ImagePayload>(record.payload) {
                Ok(payload) => Some(ImageHit {
                    id: record.id,
                    path: payload.path,
                    distance: record.distance,
                }),
                Err(e) => {
                    log::error!("Skipping image record {} with unreadable payload: {}", record.id, e);
                    None
                }
            })
            .collect();
        Ok(SearchOutcome::Hits(hits))
    }

    /// Drops the image collection so it can be rebuilt, e.g. after switching models.
    pub async fn reset(&self) -> Result<bool> {
        self.repository.delete_collection().await
    }

    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }
}
