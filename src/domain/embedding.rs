use anyhow::Result;
use std::path::{Path, PathBuf};

/// Produces text embeddings for a named model.
///
/// Implementations must return one L2-normalized vector per input, in input
/// order, and the same dimension for every call with the same model.
pub trait TextEmbedder: Send + Sync {
    fn embed_texts(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Output dimension of `model`, known without loading it.
    fn text_dimension(&self, model: &str) -> Result<usize>;

    fn embed_text(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(model, &[text])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model '{}' returned no embedding", model))
    }
}

/// Produces image embeddings for a named model.
pub trait ImageEmbedder: Send + Sync {
    fn embed_images(&self, model: &str, images: &[PathBuf]) -> Result<Vec<Vec<f32>>>;

    fn image_dimension(&self, model: &str) -> Result<usize>;
}

/// Pulls plain text out of a document on disk.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
