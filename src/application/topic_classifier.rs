use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::config::DESCRIPTION_PLACEHOLDER;
use crate::domain::embedding::TextEmbedder;
use crate::domain::library::{TopicDefinition, TopicMatch};

const NORM_EPSILON: f32 = 1e-12;

/// Cosine similarity of two vectors, clamped to `[-1, 1]`.
///
/// Zero-norm inputs are divided by a tiny epsilon instead of zero, which
/// yields `0.0` rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_a = if norm_a == 0.0 { NORM_EPSILON } else { norm_a };
    let norm_b = if norm_b == 0.0 { NORM_EPSILON } else { norm_b };
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Matches text against topic descriptions in embedding space.
pub struct TopicClassifier {
    embedder: Arc<dyn TextEmbedder>,
    model: String,
    prompt_template: String,
}

impl TopicClassifier {
    pub fn new(embedder: Arc<dyn TextEmbedder>, model: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            embedder,
            model: model.into(),
            prompt_template: prompt_template.into(),
        }
    }

    pub fn prompt_for(&self, description: &str) -> String {
        self.prompt_template.replace(DESCRIPTION_PLACEHOLDER, description)
    }

    /// Picks the candidate label whose description is closest to `text`.
    ///
    /// Candidates are trimmed and must exist in `catalog`; when none survive the
    /// result is `(default_label, 0.0)`. Ties go to the earliest candidate. A best
    /// similarity under `min_similarity` yields `default_label` with that similarity.
    pub fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
        catalog: &[TopicDefinition],
        min_similarity: f32,
        default_label: &str,
    ) -> Result<TopicMatch> {
        let topics: Vec<&TopicDefinition> = candidate_labels
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .filter_map(|label| catalog.iter().find(|t| t.label == label))
            .collect();

        if topics.is_empty() {
            log::debug!("No known candidate topics among {:?}", candidate_labels);
            return Ok(TopicMatch {
                label: default_label.to_string(),
                similarity: 0.0,
            });
        }

        let prompts: Vec<String> = topics.iter().map(|t| self.prompt_for(&t.description)).collect();
        let prompt_refs: Vec<&str> = prompts.iter().map(String::as_str).collect();

        let text_embedding = self.embedder.embed_text(&self.model, text)?;
        let prompt_embeddings = self.embedder.embed_texts(&self.model, &prompt_refs)?;
        if prompt_embeddings.len() != topics.len() {
            return Err(anyhow!(
                "Expected {} prompt embeddings, got {}",
                topics.len(),
                prompt_embeddings.len()
            ));
        }

        let mut best: Option<(&TopicDefinition, f32)> = None;
        for (topic, embedding) in topics.iter().zip(&prompt_embeddings) {
            let similarity = cosine_similarity(&text_embedding, embedding);
            log::debug!("Topic '{}' similarity {:.4}", topic.label, similarity);
            if best.map_or(true, |(_, best_sim)| similarity > best_sim) {
                best = Some((topic, similarity));
            }
        }

        // topics is non-empty, so best is always set here.
        let (topic, similarity) = best.ok_or_else(|| anyhow!("No topic scored"))?;
        if similarity < min_similarity {
            return Ok(TopicMatch {
                label: default_label.to_string(),
                similarity,
            });
        }
        Ok(TopicMatch {
            label: topic.label.clone(),
            similarity,
        })
    }
}
