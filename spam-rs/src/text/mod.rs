//! Text processing module
//!
//! Cleaning, tokenization and mbox input for the classifiers.

pub mod clean;
pub mod features;
pub mod mbox;

pub use clean::clean_text;
pub use features::{FeatureExtractor, Features};
pub use mbox::{Category, Direction, MboxMessage, MboxReader};
