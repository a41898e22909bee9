//! Mock classifier for testing
//!
//! Returns a fixed prediction, fails, stalls or hogs its thread, without
//! loading any model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{MemberClassifier, Prediction};
use crate::ensemble::{Label, ModelId};
use crate::error::{EngineError, Result};
use crate::text::Features;

enum Behavior {
    Respond(Prediction),
    Fail(String),
    Stall(Duration, Prediction),
    /// Holds the thread without yielding
    Block(Duration, Prediction),
}

/// Mock member classifier
pub struct MockClassifier {
    id: ModelId,
    behavior: Behavior,
    calls: AtomicU64,
    completed: AtomicU64,
}

impl MockClassifier {
    /// Always answers with `label` at `confidence`
    pub fn responding(id: &str, label: Label, confidence: f64) -> Self {
        Self::with_behavior(id, Behavior::Respond(Prediction::new(label, confidence)))
    }

    /// Always fails with `reason`
    pub fn failing(id: &str, reason: &str) -> Self {
        Self::with_behavior(id, Behavior::Fail(reason.to_string()))
    }

    /// Answers only after `delay`
    pub fn stalling(id: &str, delay: Duration, label: Label, confidence: f64) -> Self {
        Self::with_behavior(id, Behavior::Stall(delay, Prediction::new(label, confidence)))
    }

    /// Answers after `delay` spent without yielding to the runtime
    pub fn blocking(id: &str, delay: Duration, label: Label, confidence: f64) -> Self {
        Self::with_behavior(id, Behavior::Block(delay, Prediction::new(label, confidence)))
    }

    fn with_behavior(id: &str, behavior: Behavior) -> Self {
        Self {
            id: ModelId::from(id),
            behavior,
            calls: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Number of classify calls received
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of classify calls that ran to completion
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl MemberClassifier for MockClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn classify(&self, _features: &Features) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let outcome = match &self.behavior {
            Behavior::Respond(prediction) => Ok(*prediction),
            Behavior::Fail(reason) => Err(EngineError::MemberUnavailable {
                model: self.id.to_string(),
                reason: reason.clone(),
            }),
            Behavior::Stall(delay, prediction) => {
                tokio::time::sleep(*delay).await;
                Ok(*prediction)
            }
            Behavior::Block(delay, prediction) => {
                std::thread::sleep(*delay);
                Ok(*prediction)
            }
        };

        self.completed.fetch_add(1, Ordering::Relaxed);
        outcome
    }
}
