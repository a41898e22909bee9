//! REST API module for spam-rs
//!
//! Exposes the prediction pipeline over HTTP

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use handlers::{AppState, PredictRequest, PredictResponse};
pub use server::ApiServer;
