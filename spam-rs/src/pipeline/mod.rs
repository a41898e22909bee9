//! Prediction pipeline
//!
//! Runs every configured member classifier concurrently on one email, each
//! under the configured timeout, and hands the collected results to the
//! decision engine. A member that errors or times out is recorded as
//! unavailable; the engine then scores the remaining members.
//!
//! Each member call runs as its own runtime task, so on the multi-threaded
//! runtime the timeout also bounds members that compute without yielding.
//! Dropping the future returned by [`PredictionPipeline::predict`] aborts
//! any member tasks still in flight.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::classifier::{self, MemberClassifier, Prediction};
use crate::config::Config;
use crate::ensemble::{self, EnsembleConfig, EnsembleVerdict, MemberResult};
use crate::error::{EngineError, Result};
use crate::text::{FeatureExtractor, Features};

pub mod stats;

pub use stats::{PipelineStats, StatsSnapshot};

/// Classifiers plus decision engine configuration, built once at startup
pub struct PredictionPipeline {
    config: Arc<EnsembleConfig>,
    extractor: FeatureExtractor,
    /// Aligned with `config.members()`
    classifiers: Vec<Arc<dyn MemberClassifier>>,
    stats: PipelineStats,
}

impl PredictionPipeline {
    /// Pair classifiers with the configuration.
    ///
    /// Every configured member needs exactly one classifier and every
    /// classifier must be configured.
    pub fn new(
        config: EnsembleConfig,
        classifiers: Vec<Arc<dyn MemberClassifier>>,
    ) -> Result<Self> {
        let mut ordered = Vec::with_capacity(config.members().len());

        for member in config.members() {
            let mut matching = classifiers.iter().filter(|c| *c.id() == member.id);
            let classifier = matching.next().ok_or_else(|| {
                EngineError::ConfigInvalid(format!("no classifier for configured model '{}'", member.id))
            })?;
            if matching.next().is_some() {
                return Err(EngineError::ConfigInvalid(format!(
                    "more than one classifier for model '{}'",
                    member.id
                )));
            }
            ordered.push(Arc::clone(classifier));
        }

        if let Some(extra) = classifiers.iter().find(|c| config.position(c.id()).is_none()) {
            return Err(EngineError::ConfigInvalid(format!(
                "classifier '{}' is not configured",
                extra.id()
            )));
        }

        let stats = PipelineStats::new(config.members().iter().map(|m| &m.id));

        Ok(Self {
            config: Arc::new(config),
            extractor: FeatureExtractor::new(),
            classifiers: ordered,
            stats,
        })
    }

    /// Validate the configuration and load every configured classifier
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let ensemble = config.ensemble_config()?;
        let classifiers = classifier::build_all(&config.models, config.classifier_timeout());

        info!(
            "Pipeline ready: {} classifiers, threshold {}, timeout {}ms",
            classifiers.len(),
            ensemble.threshold(),
            ensemble.classifier_timeout().as_millis()
        );

        Self::new(ensemble, classifiers)
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn classifiers(&self) -> &[Arc<dyn MemberClassifier>] {
        &self.classifiers
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Classify one email
    pub async fn predict(&self, content: &str) -> Result<EnsembleVerdict> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("predict", %request_id);
        self.predict_inner(content).instrument(span).await
    }

    async fn predict_inner(&self, content: &str) -> Result<EnsembleVerdict> {
        self.stats.record_request();

        if content.trim().is_empty() {
            self.stats.record_rejected();
            return Err(EngineError::InvalidInput("content must not be empty".to_string()));
        }

        let features = Arc::new(self.extractor.extract(content));
        debug!("Extracted {} tokens", features.tokens().len());

        let timeout = self.config.classifier_timeout();
        let results: Vec<MemberResult> = join_all(
            self.classifiers
                .iter()
                .enumerate()
                .map(|(index, classifier)| self.run_member(index, classifier, &features, timeout)),
        )
        .await;

        match ensemble::score(&results, &self.config) {
            Ok(verdict) => {
                self.stats.record_verdict(&verdict);
                info!(
                    "Verdict: {} (spam_score {:.2}, confidence {:.2}, {}/{} members)",
                    verdict.prediction(),
                    verdict.spam_score,
                    verdict.confidence,
                    verdict.members_available,
                    self.classifiers.len()
                );
                Ok(verdict)
            }
            Err(e) => {
                match e {
                    EngineError::InvalidInput(_) => self.stats.record_rejected(),
                    _ => self.stats.record_failed(),
                }
                warn!("No verdict: {}", e);
                Err(e)
            }
        }
    }

    async fn run_member(
        &self,
        index: usize,
        classifier: &Arc<dyn MemberClassifier>,
        features: &Arc<Features>,
        timeout: Duration,
    ) -> MemberResult {
        let id = classifier.id().clone();

        let mut task = {
            let classifier = Arc::clone(classifier);
            let features = Arc::clone(features);
            MemberTask(tokio::spawn(
                async move { classifier.classify(&features).await }.in_current_span(),
            ))
        };

        let outcome = tokio::time::timeout(timeout, &mut task.0).await;
        let reason = match outcome {
            Ok(Ok(Ok(prediction))) if (0.0..=100.0).contains(&prediction.confidence) => {
                debug!("{}: {} @ {:.2}", id, prediction.label, prediction.confidence);
                return MemberResult::vote(id, prediction.label, prediction.confidence);
            }
            Ok(Ok(Ok(prediction))) => format!("confidence {} outside [0, 100]", prediction.confidence),
            Ok(Ok(Err(EngineError::MemberUnavailable { reason, .. }))) => reason,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(e)) => format!("classifier task failed: {}", e),
            Err(_) => format!("timed out after {}ms", timeout.as_millis()),
        };

        warn!("{}", EngineError::MemberUnavailable {
            model: id.to_string(),
            reason: reason.clone(),
        });
        self.stats.record_unavailable(index);
        MemberResult::unavailable(id, reason)
    }
}

/// Member call running on the runtime, aborted once nobody waits for it
struct MemberTask(JoinHandle<Result<Prediction>>);

impl Drop for MemberTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
