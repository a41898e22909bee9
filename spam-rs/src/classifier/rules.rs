//! Rule-based classifier
//!
//! Keyword and regex rules each add a score when they match the cleaned
//! text. The total is mapped to a spam probability around a threshold.

use anyhow::{Context, Result as AnyResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::{sigmoid, MemberClassifier, Prediction};
use crate::ensemble::ModelId;
use crate::error::Result;
use crate::text::Features;

/// Types of spam rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Case-insensitive substring, scored per occurrence
    Body,
    /// Regex over the cleaned text
    Regex,
}

/// Spam rule definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rule_type: RuleType,
    pub pattern: String,
    /// Score if matched
    pub score: f64,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Serialized rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Total score at which the spam probability reaches 0.5
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Score units per e-fold of the odds
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub rules: Vec<SpamRule>,
}

fn default_threshold() -> f64 {
    5.0
}

fn default_scale() -> f64 {
    2.0
}

enum Matcher {
    Body(String),
    Regex(Regex),
}

struct CompiledRule {
    rule: SpamRule,
    matcher: Matcher,
}

/// A matched spam rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_name: String,
    pub score: f64,
}

/// Rule-based member classifier
pub struct RulesClassifier {
    id: ModelId,
    threshold: f64,
    scale: f64,
    rules: Vec<CompiledRule>,
}

impl RulesClassifier {
    /// Compile a rule set; regex rules that fail to compile are an error
    pub fn new(id: ModelId, rule_set: RuleSet) -> AnyResult<Self> {
        if !rule_set.threshold.is_finite() || !rule_set.scale.is_finite() || rule_set.scale <= 0.0 {
            anyhow::bail!("rule set threshold and scale must be finite, scale positive");
        }

        let rules = rule_set
            .rules
            .into_iter()
            .filter(|r| r.is_enabled)
            .map(|rule| -> AnyResult<CompiledRule> {
                let matcher = match rule.rule_type {
                    RuleType::Body => Matcher::Body(rule.pattern.to_lowercase()),
                    RuleType::Regex => Matcher::Regex(
                        Regex::new(&rule.pattern)
                            .with_context(|| format!("rule {}", rule.name))?,
                    ),
                };
                Ok(CompiledRule { rule, matcher })
            })
            .collect::<AnyResult<Vec<_>>>()?;

        Ok(Self {
            id,
            threshold: rule_set.threshold,
            scale: rule_set.scale,
            rules,
        })
    }

    /// Built-in rule set
    pub fn with_default_rules(id: ModelId) -> AnyResult<Self> {
        let rule_set = RuleSet {
            threshold: default_threshold(),
            scale: default_scale(),
            rules: default_rules(),
        };
        Self::new(id, rule_set)
    }

    /// Load a rule set from a JSON file
    pub fn from_file(id: ModelId, path: &Path) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let rule_set: RuleSet = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Self::new(id, rule_set)
    }

    /// Run every enabled rule against the text
    pub fn matches(&self, text: &str) -> Vec<RuleMatch> {
        let lower = text.to_lowercase();

        self.rules
            .iter()
            .filter_map(|compiled| {
                let score = match &compiled.matcher {
                    Matcher::Body(pattern) => {
                        let count = lower.matches(pattern.as_str()).count();
                        if count == 0 {
                            return None;
                        }
                        // More occurrences = higher score
                        compiled.rule.score * (1.0 + (count as f64 - 1.0) * 0.5).min(3.0)
                    }
                    Matcher::Regex(re) => {
                        if !re.is_match(text) {
                            return None;
                        }
                        compiled.rule.score
                    }
                };
                Some(RuleMatch {
                    rule_name: compiled.rule.name.clone(),
                    score,
                })
            })
            .collect()
    }

    pub fn probability(&self, text: &str) -> f64 {
        let total: f64 = self.matches(text).iter().map(|m| m.score).sum();
        sigmoid((total - self.threshold) / self.scale)
    }
}

#[async_trait::async_trait]
impl MemberClassifier for RulesClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "rules"
    }

    async fn classify(&self, features: &Features) -> Result<Prediction> {
        let matched = self.matches(features.text());
        debug!(
            model = %self.id,
            rules = ?matched.iter().map(|m| m.rule_name.as_str()).collect::<Vec<_>>(),
            "rules matched"
        );
        Ok(Prediction::from_probability(self.probability(features.text())))
    }
}

fn body(name: &str, description: &str, pattern: &str, score: f64) -> SpamRule {
    SpamRule {
        name: name.to_string(),
        description: description.to_string(),
        rule_type: RuleType::Body,
        pattern: pattern.to_string(),
        score,
        is_enabled: true,
    }
}

fn regex(name: &str, description: &str, pattern: &str, score: f64) -> SpamRule {
    SpamRule {
        name: name.to_string(),
        description: description.to_string(),
        rule_type: RuleType::Regex,
        pattern: pattern.to_string(),
        score,
        is_enabled: true,
    }
}

/// Default spam detection rules
fn default_rules() -> Vec<SpamRule> {
    vec![
        body("BODY_FREE", "Offers something for free", "free", 1.0),
        body("BODY_WINNER", "Mentions winning", "winner", 2.0),
        body("BODY_LOTTERY", "Mentions a lottery", "lottery", 3.0),
        body("BODY_UNSUBSCRIBE", "Contains unsubscribe link", "unsubscribe", 0.5),
        body("BODY_VIAGRA", "Pharmaceutical spam", "viagra", 5.0),
        body("BODY_CIALIS", "Pharmaceutical spam", "cialis", 5.0),
        body("BODY_CLICK_HERE", "'click here' spam pattern", "click here", 1.0),
        body("BODY_MILLION_DOLLARS", "Large money amounts", "million dollar", 3.0),
        body("BODY_BANK_TRANSFER", "Mentions bank transfers", "bank transfer", 2.0),
        body("BODY_NIGERIAN", "Nigerian prince scam pattern", "nigerian prince", 5.0),
        body("BODY_ACT_NOW", "Urgency pressure pattern", "act now", 1.5),
        body("BODY_LIMITED_TIME", "Limited time offer pattern", "limited time", 1.0),
        regex(
            "REGEX_ALL_CAPS_LINE",
            "A line mostly in uppercase",
            r"(?m)^[A-Z\s!?.,]{20,}$",
            2.0,
        ),
        regex(
            "REGEX_MONEY_AMOUNT",
            "Currency followed by a large amount",
            r"(?i)(dollar|pound|euro)\s+num",
            2.5,
        ),
        regex(
            "REGEX_EXCESSIVE_EXCLAMATION",
            "Excessive exclamation marks",
            r"!{3,}",
            1.5,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Label;
    use crate::text::FeatureExtractor;

    fn classifier() -> RulesClassifier {
        RulesClassifier::with_default_rules("rules".into()).unwrap()
    }

    #[test]
    fn test_body_rule_scales_with_occurrences() {
        let matched = classifier().matches("free FREE free");
        assert_eq!(
            matched,
            vec![RuleMatch {
                rule_name: "BODY_FREE".to_string(),
                score: 2.0
            }]
        );
    }

    #[test]
    fn test_money_rule_sees_cleaned_text() {
        let extractor = FeatureExtractor::new();
        let features = extractor.extract("Transfer $5000000 today");
        let names: Vec<String> = classifier()
            .matches(features.text())
            .into_iter()
            .map(|m| m.rule_name)
            .collect();
        assert!(names.contains(&"REGEX_MONEY_AMOUNT".to_string()));
    }

    #[tokio::test]
    async fn test_classify() {
        let extractor = FeatureExtractor::new();
        let classifier = classifier();

        let spam = classifier
            .classify(&extractor.extract("WINNER!!! Claim your lottery prize, act now"))
            .await
            .unwrap();
        assert_eq!(spam.label, Label::Spam);

        let ham = classifier
            .classify(&extractor.extract("Agenda for Monday's meeting attached."))
            .await
            .unwrap();
        assert_eq!(ham.label, Label::NotSpam);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut rule = body("BODY_FREE", "", "free", 1.0);
        rule.is_enabled = false;
        let classifier = RulesClassifier::new(
            "rules".into(),
            RuleSet {
                threshold: 5.0,
                scale: 2.0,
                rules: vec![rule],
            },
        )
        .unwrap();
        assert!(classifier.matches("free").is_empty());
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let result = RulesClassifier::new(
            "rules".into(),
            RuleSet {
                threshold: 5.0,
                scale: 2.0,
                rules: vec![regex("BROKEN", "", "(unclosed", 1.0)],
            },
        );
        assert!(result.is_err());
    }
}
