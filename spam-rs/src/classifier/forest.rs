//! Random forest classifier
//!
//! Each tree is a flat node array rooted at index 0. Split nodes send a
//! message left when `weight(token) <= threshold`; leaves hold a spam
//! probability. The forest probability is the mean over trees.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{MemberClassifier, Prediction};
use crate::ensemble::ModelId;
use crate::error::Result;
use crate::text::Features;

/// A tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        token: String,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

/// A decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Children must point forward, which keeps every walk finite
    fn validate(&self) -> AnyResult<()> {
        if self.nodes.is_empty() {
            anyhow::bail!("tree has no nodes");
        }

        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if !threshold.is_finite() {
                        anyhow::bail!("node {} has a non-finite threshold", index);
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            anyhow::bail!("node {} has invalid child {}", index, child);
                        }
                    }
                }
                Node::Leaf { leaf } => {
                    if !(0.0..=1.0).contains(leaf) {
                        anyhow::bail!("leaf {} probability {} outside [0, 1]", index, leaf);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn probability(&self, features: &Features) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    token,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features.weight(token) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Serialized forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<Tree>,
}

impl Forest {
    pub fn validate(&self) -> AnyResult<()> {
        if self.trees.is_empty() {
            anyhow::bail!("forest has no trees");
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().with_context(|| format!("tree {}", i))?;
        }
        Ok(())
    }

    pub fn probability(&self, features: &Features) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.probability(features)).sum();
        total / self.trees.len() as f64
    }
}

/// Random forest member classifier
pub struct ForestClassifier {
    id: ModelId,
    forest: Forest,
}

impl ForestClassifier {
    /// Build from a validated forest
    pub fn new(id: ModelId, forest: Forest) -> AnyResult<Self> {
        forest.validate()?;
        Ok(Self { id, forest })
    }

    /// Load a forest artifact from a JSON file
    pub fn from_file(id: ModelId, path: &Path) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let forest: Forest = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        Self::new(id, forest).with_context(|| format!("validating {}", path.display()))
    }
}

#[async_trait::async_trait]
impl MemberClassifier for ForestClassifier {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "forest"
    }

    async fn classify(&self, features: &Features) -> Result<Prediction> {
        Ok(Prediction::from_probability(self.forest.probability(features)))
    }
}
