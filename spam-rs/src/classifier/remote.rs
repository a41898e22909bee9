//! Remote classifier
//!
//! Delegates to an external model server over HTTP. The server receives the
//! cleaned text and answers with a label and confidence.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{MemberClassifier, Prediction};
use crate::ensemble::{Label, ModelId};
use crate::error::{EngineError, Result};
use crate::text::Features;

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    prediction: Label,
    confidence: f64,
}

/// HTTP member classifier
pub struct RemoteClassifier {
    id: ModelId,
    url: String,
    client: reqwest::Client,
}

impl RemoteClassifier {
    pub fn new(id: ModelId, url: String, timeout: Duration) -> AnyResult<Self> {
        reqwest::Url::parse(&url).with_context(|| format!("invalid classifier URL '{}'", url))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self { id, url, client })
    }

    fn unavailable(&self, reason: String) -> EngineError {
        EngineError::MemberUnavailable {
            model: self.id.to_string(),
            reason,
        }
    }
}

#[async_trait::async_trait]
impl MemberClassifier for RemoteClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn classify(&self, features: &Features) -> Result<Prediction> {
        debug!("Remote classifier {}: POST {}", self.id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&RemoteRequest {
                content: features.text(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Remote classifier {} failed with status {}: {}", self.id, status, error_text);
            return Err(self.unavailable(format!("model server returned {}", status)));
        }

        let body: RemoteResponse = response.json().await?;
        if !(0.0..=100.0).contains(&body.confidence) {
            return Err(self.unavailable(format!(
                "model server returned confidence {}",
                body.confidence
            )));
        }

        Ok(Prediction::new(body.prediction, body.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn spawn_model_server(status: axum::http::StatusCode, body: serde_json::Value) -> SocketAddr {
        let app = Router::new().route(
            "/predict",
            post(move |Json(req): Json<serde_json::Value>| {
                let body = body.clone();
                async move {
                    assert!(req["content"].is_string());
                    (status, Json(body))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(RemoteClassifier::new("svm".into(), "not a url".to_string(), Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_remote_prediction() {
        let addr = spawn_model_server(
            axum::http::StatusCode::OK,
            serde_json::json!({"prediction": "Not Spam", "confidence": 88.5}),
        )
        .await;

        let classifier = RemoteClassifier::new(
            "svm".into(),
            format!("http://{}/predict", addr),
            Duration::from_secs(2),
        )
        .unwrap();

        let prediction = classifier.classify(&Features::default()).await.unwrap();
        assert_eq!(prediction, Prediction::new(Label::NotSpam, 88.5));
    }

    #[tokio::test]
    async fn test_remote_error_status_is_unavailable() {
        let addr = spawn_model_server(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({"detail": "boom"}),
        )
        .await;

        let classifier = RemoteClassifier::new(
            "svm".into(),
            format!("http://{}/predict", addr),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = classifier.classify(&Features::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::MemberUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_remote_out_of_range_confidence() {
        let addr = spawn_model_server(
            axum::http::StatusCode::OK,
            serde_json::json!({"prediction": "Spam", "confidence": 140.0}),
        )
        .await;

        let classifier = RemoteClassifier::new(
            "svm".into(),
            format!("http://{}/predict", addr),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(classifier.classify(&Features::default()).await.is_err());
    }
}
