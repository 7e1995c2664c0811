use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::library::TopicDefinition;

pub const CONFIG_PATH_ENV: &str = "PAPERSHELF_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILENAME: &str = "papershelf.toml";
const ENV_PREFIX: &str = "PAPERSHELF_";

pub const DESCRIPTION_PLACEHOLDER: &str = "{description}";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "papershelf", "papershelf")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Similarity metric of a vector collection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclid,
    Dot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Archive root; one subdirectory per topic.
    pub paper_dir: PathBuf,
    pub image_dir: PathBuf,
    /// On-disk location of the vector store data (bind-mounted into the managed container).
    pub vector_db_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            paper_dir: data_dir.join("papers"),
            image_dir: data_dir.join("images"),
            vector_db_dir: data_dir.join("vector_db"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VectorDbConfig {
    /// gRPC endpoint of the Qdrant server.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub paper_collection: String,
    pub image_collection: String,
    pub paper_metric: Metric,
    pub image_metric: Metric,
    /// Start (or reuse) a local Qdrant container before connecting.
    #[serde(default)]
    pub manage_docker: bool,
    pub container_name: String,
    pub container_image: String,
    /// REST port used for the container health check.
    pub http_port: u16,
    pub grpc_port: u16,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            paper_collection: "papers".to_string(),
            image_collection: "images".to_string(),
            paper_metric: Metric::Euclid,
            image_metric: Metric::Cosine,
            manage_docker: false,
            container_name: "papershelf-qdrant".to_string(),
            container_image: "qdrant/qdrant".to_string(),
            http_port: 6333,
            grpc_port: 6334,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Text encoder for papers (index and query).
    pub text: String,
    /// Image encoder for the image collection.
    pub image: String,
    /// Text encoder sharing the image encoder's embedding space.
    pub image_text: String,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            image: "Qdrant/clip-ViT-B-32-vision".to_string(),
            image_text: "Qdrant/clip-ViT-B-32-text".to_string(),
            cache_dir: project_dirs().map(|dirs| dirs.cache_dir().join("models")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TopicConfig {
    pub default_topic: String,
    pub min_similarity: f32,
    /// Characters of extracted text used for classification and the stored vector.
    pub classify_chars: usize,
    /// Characters of extracted text kept in the record.
    pub stored_chars: usize,
    pub prompt_template: String,
    pub definitions: Vec<TopicDefinition>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            default_topic: "Other".to_string(),
            min_similarity: 0.20,
            classify_chars: 6000,
            stored_chars: 10000,
            prompt_template: "This paper is mainly about {description}.".to_string(),
            definitions: default_topic_definitions(),
        }
    }
}

fn default_topic_definitions() -> Vec<TopicDefinition> {
    [
        (
            "CV",
            "computer vision, image classification, object detection, segmentation, OCR, tracking, SLAM, 3D vision, diffusion, ViT, CLIP",
        ),
        (
            "NLP",
            "natural language processing, language model, LLM, transformer, attention, pretraining, finetuning, instruction tuning, RAG, information extraction, text classification",
        ),
        (
            "RL",
            "reinforcement learning, agent, policy gradient, Q-learning, actor-critic, offline RL, exploration, reward, MDP, control, robotics",
        ),
    ]
    .into_iter()
    .map(|(label, description)| TopicDefinition {
        label: label.to_string(),
        description: description.to_string(),
    })
    .collect()
}

impl TopicConfig {
    pub fn labels(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.label.clone()).collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LibraryConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub topics: TopicConfig,
}

/// Loads configuration from defaults, a TOML file and `PAPERSHELF_*` env vars.
///
/// The file is `explicit_path` when given, else `$PAPERSHELF_CONFIG_PATH`, else
/// `papershelf.toml` in the working directory. An explicitly named file must exist;
/// the fallback file is optional.
pub fn load_config(explicit_path: Option<&Path>) -> Result<LibraryConfig> {
    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let named_path = explicit_path.map(Path::to_path_buf).or(config_path_env);

    let config_path = match named_path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            log::info!("Using config file: {}", path.display());
            path
        }
        None => {
            log::debug!(
                "{} not set, falling back to default: {}",
                CONFIG_PATH_ENV,
                DEFAULT_CONFIG_FILENAME
            );
            PathBuf::from(DEFAULT_CONFIG_FILENAME)
        }
    };

    let figment = Figment::new()
        .merge(Serialized::defaults(LibraryConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: LibraryConfig = figment
        .extract()
        .context("Failed to extract LibraryConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &LibraryConfig) -> Result<()> {
    let paths = [
        ("storage.paper_dir", &config.storage.paper_dir),
        ("storage.image_dir", &config.storage.image_dir),
        ("storage.vector_db_dir", &config.storage.vector_db_dir),
    ];
    for (name, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("Configured {} cannot be empty", name));
        }
    }

    let vector_db = &config.vector_db;
    if vector_db.paper_collection.trim().is_empty() || vector_db.image_collection.trim().is_empty() {
        return Err(anyhow!("Collection names cannot be empty"));
    }
    if vector_db.paper_collection == vector_db.image_collection {
        return Err(anyhow!(
            "Paper and image collections must differ (both are '{}')",
            vector_db.paper_collection
        ));
    }

    let topics = &config.topics;
    if topics.default_topic.trim().is_empty() {
        return Err(anyhow!("topics.default_topic cannot be empty"));
    }
    if !(-1.0..=1.0).contains(&topics.min_similarity) {
        return Err(anyhow!(
            "topics.min_similarity must be within [-1, 1], got {}",
            topics.min_similarity
        ));
    }
    if topics.classify_chars == 0 || topics.stored_chars == 0 {
        return Err(anyhow!("topics.classify_chars and topics.stored_chars must be positive"));
    }
    if !topics.prompt_template.contains(DESCRIPTION_PLACEHOLDER) {
        return Err(anyhow!(
            "topics.prompt_template must contain {}",
            DESCRIPTION_PLACEHOLDER
        ));
    }
    let mut seen = HashSet::new();
    for definition in &topics.definitions {
        if definition.label.trim().is_empty() {
            return Err(anyhow!("Topic labels cannot be empty"));
        }
        if !seen.insert(definition.label.as_str()) {
            return Err(anyhow!("Duplicate topic label: {}", definition.label));
        }
    }
    Ok(())
}
