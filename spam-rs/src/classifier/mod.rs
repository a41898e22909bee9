//! Member classifier abstraction
//!
//! Every configured model sits behind [`MemberClassifier`]. Local backends
//! load a JSON artifact once at startup; the remote backend calls an
//! external model server.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{BackendConfig, ModelConfig};
use crate::ensemble::{Label, ModelId};
use crate::error::Result;
use crate::text::Features;

pub mod bayes;
pub mod forest;
pub mod linear;
pub mod mock;
pub mod remote;
pub mod rules;

pub use bayes::BayesClassifier;
pub use forest::ForestClassifier;
pub use linear::LinearClassifier;
pub use mock::MockClassifier;
pub use remote::RemoteClassifier;
pub use rules::RulesClassifier;

/// One classifier's label and its confidence in that label, in [0,100]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: Label, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// From a spam probability: the more likely label wins, ties go to spam,
    /// and confidence is the winning probability as a percentage.
    pub fn from_probability(p_spam: f64) -> Self {
        let p = p_spam.clamp(0.0, 1.0);
        if p >= 0.5 {
            Self::new(Label::Spam, p * 100.0)
        } else {
            Self::new(Label::NotSpam, (1.0 - p) * 100.0)
        }
    }
}

/// Member classifier trait
#[async_trait::async_trait]
pub trait MemberClassifier: Send + Sync {
    /// Configured model id
    fn id(&self) -> &ModelId;

    /// Backend kind, as written in configuration
    fn kind(&self) -> &'static str;

    /// Classify one email
    async fn classify(&self, features: &Features) -> Result<Prediction>;
}

/// Stand-in for a model whose artifact failed to load.
///
/// Keeps the configured member set intact: it reports unavailable on every
/// request instead of disappearing from the results.
pub struct UnloadedClassifier {
    id: ModelId,
    kind: &'static str,
    reason: String,
}

impl UnloadedClassifier {
    pub fn new(id: ModelId, kind: &'static str, reason: String) -> Self {
        Self { id, kind, reason }
    }
}

#[async_trait::async_trait]
impl MemberClassifier for UnloadedClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn classify(&self, _features: &Features) -> Result<Prediction> {
        Err(crate::error::EngineError::MemberUnavailable {
            model: self.id.to_string(),
            reason: self.reason.clone(),
        })
    }
}

/// Build one classifier from configuration
pub fn build(model: &ModelConfig, timeout: Duration) -> Arc<dyn MemberClassifier> {
    let id = ModelId::new(model.id.clone());
    let kind = model.backend.kind();

    let loaded: anyhow::Result<Arc<dyn MemberClassifier>> = match &model.backend {
        BackendConfig::Linear { path } => {
            LinearClassifier::from_file(id.clone(), path).map(shared)
        }
        BackendConfig::Bayes { path } => {
            BayesClassifier::from_file(id.clone(), path).map(shared)
        }
        BackendConfig::Forest { path } => {
            ForestClassifier::from_file(id.clone(), path).map(shared)
        }
        BackendConfig::Rules { path: Some(path) } => {
            RulesClassifier::from_file(id.clone(), path).map(shared)
        }
        BackendConfig::Rules { path: None } => {
            RulesClassifier::with_default_rules(id.clone()).map(shared)
        }
        BackendConfig::Remote { url } => {
            RemoteClassifier::new(id.clone(), url.clone(), timeout).map(shared)
        }
    };

    match loaded {
        Ok(classifier) => {
            info!("Loaded classifier {} ({})", id, kind);
            classifier
        }
        Err(e) => {
            warn!("Failed to load classifier {} ({}): {:#}", id, kind, e);
            Arc::new(UnloadedClassifier::new(id, kind, format!("{:#}", e)))
        }
    }
}

fn shared<C: MemberClassifier + 'static>(classifier: C) -> Arc<dyn MemberClassifier> {
    Arc::new(classifier)
}

/// Build every configured classifier, in configuration order
pub fn build_all(models: &[ModelConfig], timeout: Duration) -> Vec<Arc<dyn MemberClassifier>> {
    models.iter().map(|m| build(m, timeout)).collect()
}

/// Logistic function
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_prediction_from_probability() {
        assert_eq!(Prediction::from_probability(0.9), Prediction::new(Label::Spam, 90.0));
        assert_eq!(Prediction::from_probability(0.5), Prediction::new(Label::Spam, 50.0));
        assert_eq!(Prediction::from_probability(0.0), Prediction::new(Label::NotSpam, 100.0));
        assert_eq!(Prediction::from_probability(1.7), Prediction::new(Label::Spam, 100.0));

        let ham = Prediction::from_probability(0.25);
        assert_eq!(ham.label, Label::NotSpam);
        assert_eq!(ham.confidence, 75.0);
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[tokio::test]
    async fn test_missing_artifact_builds_unloaded_member() {
        let model = ModelConfig {
            id: "svm".to_string(),
            weight: 1.0,
            backend: BackendConfig::Linear {
                path: PathBuf::from("/nonexistent/svm.json"),
            },
        };

        let classifier = build(&model, Duration::from_secs(1));
        assert_eq!(classifier.id(), &ModelId::from("svm"));
        assert_eq!(classifier.kind(), "linear");

        let err = classifier.classify(&Features::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::EngineError::MemberUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_default_rules_backend_builds() {
        let model = ModelConfig {
            id: "rules".to_string(),
            weight: 0.5,
            backend: BackendConfig::Rules { path: None },
        };

        let classifier = build(&model, Duration::from_secs(1));
        assert_eq!(classifier.kind(), "rules");
        assert!(classifier.classify(&Features::default()).await.is_ok());
    }
}
