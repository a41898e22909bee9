//! spam-rs: Ensemble spam detection service
//!
//! Several independently trained classifiers each label an email as spam or
//! not spam with a confidence. A weighted decision engine combines those
//! votes into one verdict with a continuous spam score, a confidence, and a
//! per-model breakdown. The verdict is served over HTTP.
//!
//! # Features
//!
//! - Weighted soft voting with renormalization over available members
//! - Linear, naive Bayes, decision forest, rule-based and remote classifiers
//! - Per-classifier timeouts; failed classifiers drop out of the vote
//! - Mbox batch scoring from the command line
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8000"
//!
//! [ensemble]
//! threshold = 50.0
//! classifier_timeout_ms = 2000
//!
//! [[models]]
//! id = "svm"
//! kind = "linear"
//! path = "models/svm.json"
//!
//! [[models]]
//! id = "naive_bayes"
//! kind = "bayes"
//! path = "models/naive_bayes.json"
//! ```

pub mod api;
pub mod classifier;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod pipeline;
pub mod text;

pub use api::ApiServer;
pub use config::Config;
pub use ensemble::{EnsembleConfig, EnsembleVerdict};
pub use error::{EngineError, Result};
pub use pipeline::PredictionPipeline;
