//! Linear classifier (logistic regression, linear SVM)
//!
//! Decision value `bias + Σ coef(token) · weight(token)`, turned into a spam
//! probability by the model's calibration link.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{sigmoid, MemberClassifier, Prediction};
use crate::ensemble::ModelId;
use crate::error::Result;
use crate::text::Features;

/// How a decision value becomes a probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibration {
    /// `1 / (1 + e^-f)`
    Logistic,
    /// Platt scaling, `1 / (1 + e^(a·f + b))`
    Platt { a: f64, b: f64 },
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Logistic
    }
}

/// Serialized linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub bias: f64,
    /// Coefficient per stemmed token
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub calibration: Calibration,
}

impl LinearModel {
    pub fn decision_value(&self, features: &Features) -> f64 {
        self.bias
            + features
                .weights()
                .iter()
                .filter_map(|(token, w)| self.weights.get(token).map(|coef| coef * w))
                .sum::<f64>()
    }

    pub fn probability(&self, features: &Features) -> f64 {
        let f = self.decision_value(features);
        match self.calibration {
            Calibration::Logistic => sigmoid(f),
            Calibration::Platt { a, b } => 1.0 / (1.0 + (a * f + b).exp()),
        }
    }
}

/// Linear member classifier
pub struct LinearClassifier {
    id: ModelId,
    model: LinearModel,
}

impl LinearClassifier {
    pub fn new(id: ModelId, model: LinearModel) -> Self {
        Self { id, model }
    }

    /// Load a model artifact from a JSON file
    pub fn from_file(id: ModelId, path: &Path) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let model: LinearModel = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        if !model.bias.is_finite() || model.weights.values().any(|w| !w.is_finite()) {
            anyhow::bail!("{} contains non-finite coefficients", path.display());
        }

        Ok(Self::new(id, model))
    }
}

#[async_trait::async_trait]
impl MemberClassifier for LinearClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "linear"
    }

    async fn classify(&self, features: &Features) -> Result<Prediction> {
        Ok(Prediction::from_probability(self.model.probability(features)))
    }
}
