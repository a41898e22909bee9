//! Ensemble types and data structures

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Default spam-score cutoff
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Default per-classifier timeout in milliseconds
pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 2000;

/// Reason recorded for a configured classifier that never reported
pub const NOT_REPORTED: &str = "not reported";

/// Identifier of a member classifier, unique within a configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for ModelId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModelId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Binary label produced by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Spam")]
    Spam,
    #[serde(rename = "Not Spam", alias = "Ham", alias = "NotSpam")]
    NotSpam,
}

impl Label {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Spam => "Spam",
            Label::NotSpam => "Not Spam",
        }
    }

    /// The opposite label
    pub fn flipped(self) -> Self {
        match self {
            Label::Spam => Label::NotSpam,
            Label::NotSpam => Label::Spam,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one classifier reported for one input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MemberOutcome {
    /// A label with the model's confidence in that label, in [0,100]
    Vote { label: Label, confidence: f64 },
    /// The classifier failed, timed out, or never reported
    Unavailable { reason: String },
}

/// Output of one classifier for one input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberResult {
    pub model_id: ModelId,
    pub outcome: MemberOutcome,
}

impl MemberResult {
    /// A member that voted
    pub fn vote(model_id: impl Into<ModelId>, label: Label, confidence: f64) -> Self {
        Self {
            model_id: model_id.into(),
            outcome: MemberOutcome::Vote { label, confidence },
        }
    }

    /// A member that failed to report
    pub fn unavailable(model_id: impl Into<ModelId>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            outcome: MemberOutcome::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.outcome, MemberOutcome::Vote { .. })
    }

    pub fn label(&self) -> Option<Label> {
        match self.outcome {
            MemberOutcome::Vote { label, .. } => Some(label),
            MemberOutcome::Unavailable { .. } => None,
        }
    }

    /// Signed vote in [-1, +1]: positive for spam, negative for not spam
    pub fn spam_vote(&self) -> Option<f64> {
        match self.outcome {
            MemberOutcome::Vote {
                label: Label::Spam,
                confidence,
            } => Some(confidence / 100.0),
            MemberOutcome::Vote {
                label: Label::NotSpam,
                confidence,
            } => Some(-(confidence / 100.0)),
            MemberOutcome::Unavailable { .. } => None,
        }
    }
}

/// Per-model breakdown of a verdict, one entry per configured classifier
/// in configuration order.
///
/// Serializes as a JSON object keyed by model id:
/// `{"svm": {"prediction": "Spam", "confidence": 98.0}, ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct MemberResults(Vec<MemberResult>);

impl MemberResults {
    pub(crate) fn from_ordered(results: Vec<MemberResult>) -> Self {
        Self(results)
    }

    pub fn get(&self, model_id: &str) -> Option<&MemberResult> {
        self.0.iter().find(|r| r.model_id == *model_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MemberResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &ModelId> {
        self.0.iter().map(|r| &r.model_id)
    }
}

impl<'a> IntoIterator for &'a MemberResults {
    type Item = &'a MemberResult;
    type IntoIter = std::slice::Iter<'a, MemberResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Wire shape of one member entry
struct MemberReport<'a>(&'a MemberOutcome);

impl Serialize for MemberReport<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            MemberOutcome::Vote { label, confidence } => {
                let mut s = serializer.serialize_struct("MemberReport", 2)?;
                s.serialize_field("prediction", label.as_str())?;
                s.serialize_field("confidence", confidence)?;
                s.end()
            }
            MemberOutcome::Unavailable { reason } => {
                let mut s = serializer.serialize_struct("MemberReport", 3)?;
                s.serialize_field("prediction", "Unavailable")?;
                s.serialize_field("confidence", &0.0)?;
                s.serialize_field("error", reason)?;
                s.end()
            }
        }
    }
}

impl Serialize for MemberResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in &self.0 {
            map.serialize_entry(result.model_id.as_str(), &MemberReport(&result.outcome))?;
        }
        map.end()
    }
}

/// The decision engine's output for one input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleVerdict {
    /// Final decision
    pub is_spam: bool,
    /// Distance of `spam_score` from the boundary, in [0,100]
    pub confidence: f64,
    /// Continuous spamminess, 0 = unanimous confident ham, 100 = unanimous confident spam
    pub spam_score: f64,
    /// Members whose vote contributed
    pub members_available: usize,
    /// Available members that labelled the input as spam
    pub spam_votes: usize,
    /// Per-model breakdown
    pub member_results: MemberResults,
}

impl EnsembleVerdict {
    pub fn prediction(&self) -> Label {
        if self.is_spam {
            Label::Spam
        } else {
            Label::NotSpam
        }
    }
}

/// A configured classifier and its voting weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberWeight {
    pub id: ModelId,
    pub weight: f64,
}

/// Process-wide ensemble configuration, immutable once built
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleConfig {
    members: Vec<MemberWeight>,
    threshold: f64,
    #[serde(rename = "classifier_timeout_ms", serialize_with = "serialize_millis")]
    classifier_timeout: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl EnsembleConfig {
    /// Build and validate a configuration
    pub fn new(
        members: Vec<MemberWeight>,
        threshold: f64,
        classifier_timeout: Duration,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "at least one classifier must be configured".to_string(),
            ));
        }

        for (i, member) in members.iter().enumerate() {
            if member.id.as_str().trim().is_empty() {
                return Err(EngineError::ConfigInvalid(
                    "classifier id must not be empty".to_string(),
                ));
            }
            if members[..i].iter().any(|m| m.id == member.id) {
                return Err(EngineError::ConfigInvalid(format!(
                    "classifier '{}' configured more than once",
                    member.id
                )));
            }
            if !member.weight.is_finite() || member.weight <= 0.0 {
                return Err(EngineError::ConfigInvalid(format!(
                    "weight of '{}' must be a positive number, got {}",
                    member.id, member.weight
                )));
            }
        }

        // Votes are normalized by the weight sum, which must stay finite
        let total_weight: f64 = members.iter().map(|m| m.weight).sum();
        if !total_weight.is_finite() {
            return Err(EngineError::ConfigInvalid(format!(
                "total weight of {} classifiers overflows",
                members.len()
            )));
        }

        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(EngineError::ConfigInvalid(format!(
                "threshold must be within [0, 100], got {}",
                threshold
            )));
        }

        if classifier_timeout.is_zero() {
            return Err(EngineError::ConfigInvalid(
                "classifier timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            members,
            threshold,
            classifier_timeout,
        })
    }

    /// Equal weights of 1.0, default threshold and timeout
    pub fn equal_weights<I, T>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<ModelId>,
    {
        let members = ids
            .into_iter()
            .map(|id| MemberWeight {
                id: id.into(),
                weight: 1.0,
            })
            .collect();
        Self::new(
            members,
            DEFAULT_THRESHOLD,
            Duration::from_millis(DEFAULT_CLASSIFIER_TIMEOUT_MS),
        )
    }

    pub fn members(&self) -> &[MemberWeight] {
        &self.members
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classifier_timeout(&self) -> Duration {
        self.classifier_timeout
    }

    /// Index of a classifier in configuration order
    pub fn position(&self, model_id: &ModelId) -> Option<usize> {
        self.members.iter().position(|m| m.id == *model_id)
    }

    pub fn weight_of(&self, model_id: &str) -> Option<f64> {
        self.members
            .iter()
            .find(|m| m.id == *model_id)
            .map(|m| m.weight)
    }
}
