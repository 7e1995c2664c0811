pub mod docker;
pub mod embedding;
pub mod file_system;
pub mod pdf;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use embedding::FastEmbedProvider;
pub use pdf::LopdfExtractor;
pub use vector_db::VectorDb;
