pub mod image_service;
pub mod paper_service;
pub mod topic_classifier;

pub use image_service::{ImageService, ImageSettings};
pub use paper_service::{PaperService, PaperSettings};
pub use topic_classifier::TopicClassifier;
