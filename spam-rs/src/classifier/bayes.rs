//! Naive Bayes classifier over stemmed tokens
//!
//! Per-token spam/ham document counts with Laplace smoothing. The posterior
//! log-odds of spam are summed over the distinct tokens of a message.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::{sigmoid, MemberClassifier, Prediction};
use crate::ensemble::ModelId;
use crate::error::{EngineError, Result};
use crate::text::Features;

/// Token statistics of a trained model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BayesModel {
    /// Spam messages seen
    pub spam_count: u32,
    /// Ham messages seen
    pub ham_count: u32,
    /// token -> (spam documents, ham documents)
    pub tokens: HashMap<String, (u32, u32)>,
}

impl BayesModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn from a message
    pub fn learn(&mut self, features: &Features, is_spam: bool) {
        if is_spam {
            self.spam_count += 1;
        } else {
            self.ham_count += 1;
        }

        let distinct: HashSet<&String> = features.tokens().iter().collect();
        for token in distinct {
            let entry = self.tokens.entry(token.clone()).or_insert((0, 0));
            if is_spam {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    pub fn is_trained(&self) -> bool {
        self.spam_count > 0 && self.ham_count > 0
    }

    /// Posterior log-odds of spam, `None` without training data for both classes
    pub fn log_odds(&self, features: &Features) -> Option<f64> {
        if !self.is_trained() {
            return None;
        }

        let spam_docs = self.spam_count as f64;
        let ham_docs = self.ham_count as f64;
        let mut log_odds = (spam_docs / ham_docs).ln();

        let distinct: HashSet<&String> = features.tokens().iter().collect();
        for token in distinct {
            let (spam, ham) = self.tokens.get(token).copied().unwrap_or((0, 0));

            // Apply Laplace smoothing
            let p_spam = (spam as f64 + 1.0) / (spam_docs + 2.0);
            let p_ham = (ham as f64 + 1.0) / (ham_docs + 2.0);
            log_odds += p_spam.ln() - p_ham.ln();
        }

        Some(log_odds)
    }
}

/// Naive Bayes member classifier
pub struct BayesClassifier {
    id: ModelId,
    model: BayesModel,
}

impl BayesClassifier {
    pub fn new(id: ModelId, model: BayesModel) -> Self {
        Self { id, model }
    }

    /// Load token statistics from a JSON file
    pub fn from_file(id: ModelId, path: &Path) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let model: BayesModel = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        if !model.is_trained() {
            anyhow::bail!("{} has no spam or no ham training data", path.display());
        }

        Ok(Self::new(id, model))
    }

    pub fn model(&self) -> &BayesModel {
        &self.model
    }
}

#[async_trait::async_trait]
impl MemberClassifier for BayesClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "bayes"
    }

    async fn classify(&self, features: &Features) -> Result<Prediction> {
        let log_odds = self
            .model
            .log_odds(features)
            .ok_or_else(|| EngineError::MemberUnavailable {
                model: self.id.to_string(),
                reason: "model has no training data".to_string(),
            })?;

        Ok(Prediction::from_probability(sigmoid(log_odds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Label;
    use crate::text::FeatureExtractor;

    fn trained() -> BayesModel {
        let extractor = FeatureExtractor::new();
        let mut model = BayesModel::new();

        for spam in [
            "Win a free prize now, click here",
            "Free money! Claim your lottery prize",
            "Limited time offer, free viagra",
        ] {
            model.learn(&extractor.extract(spam), true);
        }
        for ham in [
            "Can we meet tomorrow for the project review",
            "Here are the meeting notes from the review",
            "Lunch tomorrow with the project team",
        ] {
            model.learn(&extractor.extract(ham), false);
        }

        model
    }

    #[test]
    fn test_learn_counts_documents() {
        let model = trained();
        assert_eq!(model.spam_count, 3);
        assert_eq!(model.ham_count, 3);
        // "free" appears in every spam message, once per document
        assert_eq!(model.tokens.get("free"), Some(&(3, 0)));
    }

    #[tokio::test]
    async fn test_classify() {
        let extractor = FeatureExtractor::new();
        let classifier = BayesClassifier::new("naive_bayes".into(), trained());

        let spam = classifier.classify(&extractor.extract("free prize, click now")).await.unwrap();
        assert_eq!(spam.label, Label::Spam);

        let ham = classifier
            .classify(&extractor.extract("project review tomorrow"))
            .await
            .unwrap();
        assert_eq!(ham.label, Label::NotSpam);
    }

    #[tokio::test]
    async fn test_untrained_is_unavailable() {
        let classifier = BayesClassifier::new("naive_bayes".into(), BayesModel::new());
        let err = classifier.classify(&Features::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::MemberUnavailable { .. }));
    }

    #[test]
    fn test_model_roundtrips_through_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&trained()).unwrap()).unwrap();

        let classifier = BayesClassifier::from_file("naive_bayes".into(), file.path()).unwrap();
        assert_eq!(classifier.model().spam_count, 3);
    }
}
