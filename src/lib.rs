pub mod application;
pub mod config;
/// Declare modules and make them public
pub mod domain;
pub mod infrastructure;
pub mod initialization;

/// Re-export necessary items for main.rs and tests
pub use application::{ImageService, ImageSettings, PaperService, PaperSettings, TopicClassifier};
pub use config::{load_config, LibraryConfig};
pub use domain::embedding::{ImageEmbedder, TextEmbedder, TextExtractor};
pub use domain::errors::{LibraryError, PipelineError};
pub use domain::library::*;
pub use domain::vector_repository::{PayloadFilter, PointToUpsert, ScoredRecord, VectorRepository};
pub use infrastructure::vector_db::{qdrant_client, VectorDb};
pub use initialization::{build_library, Library};
