use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use crate::application::{ImageService, ImageSettings, PaperService, PaperSettings};
use crate::config::{LibraryConfig, Metric, VectorDbConfig};
use crate::domain::embedding::{ImageEmbedder, TextEmbedder};
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::docker::{ensure_qdrant_via_docker, QdrantContainer};
use crate::infrastructure::vector_db::qdrant_client::Qdrant;
use crate::infrastructure::{FastEmbedProvider, LopdfExtractor, VectorDb};

/// The two services a command works with.
pub struct Library {
    pub papers: PaperService,
    pub images: ImageService,
}

fn qdrant_client(config: &VectorDbConfig) -> Result<Qdrant> {
    let mut builder = Qdrant::from_url(&config.url);
    if let Some(key) = &config.api_key {
        builder = builder.api_key(key.clone());
    }
    builder
        .build()
        .with_context(|| format!("Failed to build Qdrant client for {}", config.url))
}

async fn open_collection(
    config: &VectorDbConfig,
    name: &str,
    dimension: usize,
    metric: Metric,
) -> Result<Arc<dyn VectorRepository>> {
    let db = VectorDb::new(qdrant_client(config)?, name.to_string(), dimension, metric)?;
    db.initialize_collection()
        .await
        .with_context(|| format!("Failed to open collection '{}'", name))?;
    Ok(Arc::new(db))
}

/// Connects to the vector store and wires up the paper and image services.
///
/// Any failure here is fatal for the command: nothing has been ingested yet.
pub async fn build_library(config: &LibraryConfig) -> Result<Library> {
    let db_config = &config.vector_db;
    if db_config.manage_docker {
        let container = QdrantContainer::from_config(db_config, &config.storage.vector_db_dir);
        ensure_qdrant_via_docker(container)
            .await
            .context("Failed to start the local Qdrant container")?;
    } else {
        log::debug!("Using Qdrant at {} (docker management disabled)", db_config.url);
    }

    let provider = Arc::new(FastEmbedProvider::new(config.models.cache_dir.clone()));
    let text_dim = provider.text_dimension(&config.models.text)?;
    let image_dim = provider.image_dimension(&config.models.image)?;
    let query_dim = provider.text_dimension(&config.models.image_text)?;
    if image_dim != query_dim {
        return Err(anyhow!(
            "Image model '{}' ({} dims) and image query model '{}' ({} dims) do not share an embedding space",
            config.models.image,
            image_dim,
            config.models.image_text,
            query_dim
        ));
    }
    log::debug!("Text dimension: {}, image dimension: {}", text_dim, image_dim);

    let papers_repo = open_collection(db_config, &db_config.paper_collection, text_dim, db_config.paper_metric).await?;
    let images_repo = open_collection(db_config, &db_config.image_collection, image_dim, db_config.image_metric).await?;

    let papers = PaperService::new(
        provider.clone(),
        Arc::new(LopdfExtractor),
        papers_repo,
        PaperSettings {
            text_model: config.models.text.clone(),
            archive_root: config.storage.paper_dir.clone(),
            topics: config.topics.clone(),
        },
    );
    let images = ImageService::new(
        provider.clone(),
        provider,
        images_repo,
        ImageSettings {
            image_model: config.models.image.clone(),
            query_model: config.models.image_text.clone(),
        },
    );
    Ok(Library { papers, images })
}
