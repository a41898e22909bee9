//! Feature extraction
//!
//! Turns cleaned email text into stemmed tokens and L2-normalized term
//! frequencies. Every member classifier consumes the same `Features`.

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

use super::clean::clean_text;

/// Numeric representation of one email
#[derive(Debug, Clone, Default)]
pub struct Features {
    text: String,
    tokens: Vec<String>,
    weights: HashMap<String, f64>,
}

impl Features {
    /// Cleaned text the features were extracted from
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stemmed tokens in document order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Normalized term weight, 0 for absent tokens
    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Stemming tokenizer shared by all classifiers
pub struct FeatureExtractor {
    stemmer: Stemmer,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Clean, tokenize and weight raw email text
    pub fn extract(&self, raw: &str) -> Features {
        let text = clean_text(raw);
        let tokens = self.tokenize(&text);

        let mut counts: HashMap<String, f64> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0.0) += 1.0;
        }

        let norm = counts.values().map(|c| c * c).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in counts.values_mut() {
                *value /= norm;
            }
        }

        Features {
            text,
            tokens,
            weights: counts,
        }
    }

    /// Tokenize text into stemmed words
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() >= 3 && s.len() <= 25)
            .map(|s| self.stemmer.stem(s).to_string())
            .collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
