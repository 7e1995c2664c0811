use anyhow::{anyhow, Context, Result};
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::domain::embedding::{l2_normalize, ImageEmbedder, TextEmbedder};
use crate::domain::errors::LibraryError;

/// Embedding provider backed by fastembed's ONNX models.
///
/// Models are resolved by identifier (e.g. `sentence-transformers/all-MiniLM-L6-v2`),
/// loaded on first use and kept for the lifetime of the provider. One provider is
/// created at start-up and shared by the services that need it.
pub struct FastEmbedProvider {
    cache_dir: Option<PathBuf>,
    text_models: Mutex<HashMap<String, Arc<TextEmbedding>>>,
    image_models: Mutex<HashMap<String, Arc<ImageEmbedding>>>,
}

impl FastEmbedProvider {
    /// # Arguments
    ///
    /// * `cache_dir` - Where downloaded model files live (None for fastembed's default).
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            text_models: Mutex::new(HashMap::new()),
            image_models: Mutex::new(HashMap::new()),
        }
    }

    fn text_model(&self, name: &str) -> Result<Arc<TextEmbedding>> {
        let mut models = self
            .text_models
            .lock()
            .map_err(|_| anyhow!("Text model cache lock poisoned"))?;
        if let Some(model) = models.get(name) {
            return Ok(model.clone());
        }

        let (model_kind, _) = resolve_text_model(name)?;
        log::info!("Loading text embedding model '{}'...", name);
        let mut opts = InitOptions::new(model_kind);
        if let Some(dir) = &self.cache_dir {
            opts = opts.with_cache_dir(dir.clone());
        }
        let model = Arc::new(
            TextEmbedding::try_new(opts)
                .with_context(|| format!("Failed to load text embedding model '{}'", name))?,
        );
        models.insert(name.to_string(), model.clone());
        Ok(model)
    }

    fn image_model(&self, name: &str) -> Result<Arc<ImageEmbedding>> {
        let mut models = self
            .image_models
            .lock()
            .map_err(|_| anyhow!("Image model cache lock poisoned"))?;
        if let Some(model) = models.get(name) {
            return Ok(model.clone());
        }

        let (model_kind, _) = resolve_image_model(name)?;
        log::info!("Loading image embedding model '{}'...", name);
        let mut opts = ImageInitOptions::new(model_kind);
        if let Some(dir) = &self.cache_dir {
            opts = opts.with_cache_dir(dir.clone());
        }
        let model = Arc::new(
            ImageEmbedding::try_new(opts)
                .with_context(|| format!("Failed to load image embedding model '{}'", name))?,
        );
        models.insert(name.to_string(), model.clone());
        Ok(model)
    }
}

impl TextEmbedder for FastEmbedProvider {
    fn embed_texts(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embedder = self.text_model(model)?;
        let mut embeddings = embedder
            .embed(texts.to_vec(), None)
            .map_err(|e| LibraryError::Embedding(e.to_string()))?;
        embeddings.iter_mut().for_each(|v| l2_normalize(v));
        Ok(embeddings)
    }

    fn text_dimension(&self, model: &str) -> Result<usize> {
        resolve_text_model(model).map(|(_, dim)| dim)
    }
}

impl ImageEmbedder for FastEmbedProvider {
    fn embed_images(&self, model: &str, images: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let embedder = self.image_model(model)?;
        let mut embeddings = embedder
            .embed(images.to_vec(), None)
            .map_err(|e| LibraryError::Embedding(e.to_string()))?;
        embeddings.iter_mut().for_each(|v| l2_normalize(v));
        Ok(embeddings)
    }

    fn image_dimension(&self, model: &str) -> Result<usize> {
        resolve_image_model(model).map(|(_, dim)| dim)
    }
}

/// Reduces a model identifier to a comparable key:
/// `sentence-transformers/all-MiniLM-L6-v2` and `Qdrant/all-MiniLM-L6-v2-onnx`
/// both become `all-minilm-l6-v2`.
fn model_key(code: &str) -> String {
    let name = code.rsplit('/').next().unwrap_or(code).to_lowercase();
    name.strip_suffix("-onnx").map(str::to_string).unwrap_or(name)
}

fn resolve<T: Clone>(name: &str, candidates: &[(String, T, usize)]) -> Option<(T, usize)> {
    let exact = candidates
        .iter()
        .find(|(code, _, _)| code.eq_ignore_ascii_case(name));
    let loose = || {
        let wanted = model_key(name);
        candidates.iter().find(|(code, _, _)| model_key(code) == wanted)
    };
    exact
        .or_else(loose)
        .map(|(_, model, dim)| (model.clone(), *dim))
}

/// Maps a text model identifier to fastembed's model and its output dimension.
pub fn resolve_text_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let candidates: Vec<_> = TextEmbedding::list_supported_models()
        .into_iter()
        .map(|info| (info.model_code, info.model, info.dim))
        .collect();
    resolve(name, &candidates).ok_or_else(|| LibraryError::UnsupportedModel(name.to_string()).into())
}

/// Maps an image model identifier to fastembed's model and its output dimension.
pub fn resolve_image_model(name: &str) -> Result<(ImageEmbeddingModel, usize)> {
    let candidates: Vec<_> = ImageEmbedding::list_supported_models()
        .into_iter()
        .map(|info| (info.model_code, info.model, info.dim))
        .collect();
    resolve(name, &candidates).ok_or_else(|| LibraryError::UnsupportedModel(name.to_string()).into())
}
