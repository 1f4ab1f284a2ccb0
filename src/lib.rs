pub mod annotation;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod mask;
pub mod prompt;
pub mod tracker;
pub mod view;

pub use annotation::{Annotations, BoundingBox, Mode, Point};
pub use app::AnnotateApp;
pub use client::SegmentationClient;
pub use config::Config;
pub use error::{ClientError, Result};
pub use mask::Mask;
pub use prompt::PromptPayload;
