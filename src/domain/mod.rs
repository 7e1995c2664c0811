pub mod embedding;
pub mod errors;
pub mod library;
pub mod vector_repository;
