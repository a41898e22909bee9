//! Ensemble decision module
//!
//! Fuses the votes of independent member classifiers into one verdict.

pub mod engine;
pub mod types;

pub use engine::{explain, score};
pub use types::*;
