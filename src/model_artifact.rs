use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};
use crate::features::{CategoryEncoders, FeatureSchema};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    ValueChange,
    MaximumPrice,
}

impl ModelFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::ValueChange => "value_change",
            ModelFamily::MaximumPrice => "maximum_price",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// sklearn `StandardScaler` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant training columns have zero scale; sklearn divides by 1.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect()
    }

    fn validate(&self, schema: FeatureSchema) -> Result<()> {
        let expected = schema.feature_count();
        for found in [self.mean.len(), self.scale.len()] {
            if found != expected {
                return Err(ValuationError::FeatureMismatch {
                    schema,
                    expected,
                    found,
                });
            }
        }
        if self
            .mean
            .iter()
            .chain(&self.scale)
            .any(|v| !v.is_finite())
        {
            return Err(ValuationError::InvalidArtifact(
                "scaler holds non-finite values".into(),
            ));
        }
        Ok(())
    }
}

/// One regression tree in sklearn's flat `tree_` layout. A node is a leaf when its
/// children are -1; internal nodes go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    pub fn leaf(value: f64) -> Self {
        Self {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![value],
        }
    }

    pub fn node_count(&self) -> usize {
        self.value.len()
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        // Validated trees are acyclic; the bound keeps a malformed one from spinning.
        for _ in 0..=self.node_count() {
            let left = self.children_left.get(node).copied().unwrap_or(-1);
            if left < 0 {
                break;
            }
            let right = self.children_right.get(node).copied().unwrap_or(-1);
            let feature_idx = self.feature.get(node).copied().unwrap_or(0).max(0) as usize;
            let threshold = self.threshold.get(node).copied().unwrap_or(0.0);
            let x = features.get(feature_idx).copied().unwrap_or(0.0);
            let next = if x <= threshold { left } else { right };
            if next < 0 {
                break;
            }
            node = next as usize;
        }
        self.value.get(node).copied().unwrap_or_default()
    }

    fn validate(&self, width: usize) -> Result<()> {
        let n = self.value.len();
        if n == 0 {
            return Err(ValuationError::InvalidArtifact("empty tree".into()));
        }
        let lengths = [
            self.children_left.len(),
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
        ];
        if lengths.iter().any(|len| *len != n) {
            return Err(ValuationError::InvalidArtifact(format!(
                "tree arrays disagree in length: {lengths:?} vs {n} values"
            )));
        }
        for idx in 0..n {
            let (left, right) = (self.children_left[idx], self.children_right[idx]);
            if !self.value[idx].is_finite() {
                return Err(ValuationError::InvalidArtifact(format!(
                    "node {idx} has a non-finite value"
                )));
            }
            match (left < 0, right < 0) {
                (true, true) => continue,
                (false, false) => {}
                _ => {
                    return Err(ValuationError::InvalidArtifact(format!(
                        "node {idx} has exactly one child"
                    )));
                }
            }
            // sklearn numbers children after their parent.
            for child in [left, right] {
                if child as usize <= idx || child as usize >= n {
                    return Err(ValuationError::InvalidArtifact(format!(
                        "node {idx} points at child {child} outside the tree"
                    )));
                }
            }
            let feature = self.feature[idx];
            if feature < 0 || feature as usize >= width {
                return Err(ValuationError::InvalidArtifact(format!(
                    "node {idx} splits on feature {feature}, schema has {width}"
                )));
            }
            if !self.threshold[idx].is_finite() {
                return Err(ValuationError::InvalidArtifact(format!(
                    "node {idx} has a non-finite threshold"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    /// Mean of the trees.
    RandomForest { trees: Vec<DecisionTree> },
    /// `init + learning_rate * sum(trees)`.
    GradientBoosting {
        init: f64,
        learning_rate: f64,
        trees: Vec<DecisionTree>,
    },
    /// Weighted mean of member predictions; equal weights when absent.
    Voting {
        members: Vec<Regressor>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
}

impl Regressor {
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Regressor::Linear {
                intercept,
                coefficients,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(features)
                        .map(|(c, x)| c * x)
                        .sum::<f64>()
            }
            Regressor::RandomForest { trees } => {
                if trees.is_empty() {
                    return 0.0;
                }
                trees.iter().map(|t| t.predict(features)).sum::<f64>() / trees.len() as f64
            }
            Regressor::GradientBoosting {
                init,
                learning_rate,
                trees,
            } => init + learning_rate * trees.iter().map(|t| t.predict(features)).sum::<f64>(),
            Regressor::Voting { members, weights } => {
                let mut total = 0.0;
                let mut weight_sum = 0.0;
                for (idx, member) in members.iter().enumerate() {
                    let w = weights
                        .as_ref()
                        .and_then(|ws| ws.get(idx).copied())
                        .unwrap_or(1.0);
                    total += w * member.predict(features);
                    weight_sum += w;
                }
                if weight_sum > 0.0 {
                    total / weight_sum
                } else {
                    0.0
                }
            }
        }
    }

    /// Short label used in `model_used`.
    pub fn describe(&self) -> String {
        match self {
            Regressor::Linear { .. } => "linear".to_string(),
            Regressor::RandomForest { trees } => format!("random_forest[{}]", trees.len()),
            Regressor::GradientBoosting { trees, .. } => {
                format!("gradient_boosting[{}]", trees.len())
            }
            Regressor::Voting { members, .. } => {
                let inner: Vec<String> = members.iter().map(Regressor::describe).collect();
                format!("voting({})", inner.join(","))
            }
        }
    }

    fn validate(&self, schema: FeatureSchema) -> Result<()> {
        let width = schema.feature_count();
        match self {
            Regressor::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != width {
                    return Err(ValuationError::FeatureMismatch {
                        schema,
                        expected: width,
                        found: coefficients.len(),
                    });
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(ValuationError::InvalidArtifact(
                        "linear model holds non-finite values".into(),
                    ));
                }
            }
            Regressor::RandomForest { trees } => validate_trees(trees, width)?,
            Regressor::GradientBoosting {
                init,
                learning_rate,
                trees,
            } => {
                if !init.is_finite() || !learning_rate.is_finite() {
                    return Err(ValuationError::InvalidArtifact(
                        "boosting init/learning_rate must be finite".into(),
                    ));
                }
                validate_trees(trees, width)?;
            }
            Regressor::Voting { members, weights } => {
                if members.is_empty() {
                    return Err(ValuationError::InvalidArtifact(
                        "voting regressor without members".into(),
                    ));
                }
                if let Some(ws) = weights {
                    if ws.len() != members.len() {
                        return Err(ValuationError::InvalidArtifact(format!(
                            "voting has {} weights for {} members",
                            ws.len(),
                            members.len()
                        )));
                    }
                    if ws.iter().any(|w| !w.is_finite() || *w < 0.0)
                        || ws.iter().sum::<f64>() <= 0.0
                    {
                        return Err(ValuationError::InvalidArtifact(
                            "voting weights must be non-negative with a positive sum".into(),
                        ));
                    }
                }
                for member in members {
                    member.validate(schema)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_trees(trees: &[DecisionTree], width: usize) -> Result<()> {
    if trees.is_empty() {
        return Err(ValuationError::InvalidArtifact(
            "ensemble without trees".into(),
        ));
    }
    for (idx, tree) in trees.iter().enumerate() {
        tree.validate(width).map_err(|err| match err {
            ValuationError::InvalidArtifact(msg) => {
                ValuationError::InvalidArtifact(format!("tree {idx}: {msg}"))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Everything one predictor needs, exported by the training pipeline as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub family: ModelFamily,
    pub schema: FeatureSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub scaler: StandardScaler,
    #[serde(default)]
    pub position_classes: Vec<String>,
    #[serde(default)]
    pub nationality_classes: Vec<String>,
    pub regressor: Regressor,
}

impl ModelArtifact {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read an artifact from disk. A missing or unreadable file is `ModelUnavailable`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| ValuationError::ModelUnavailable {
            model: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Check the artifact can serve `family` with `schema` vectors.
    pub fn validate(&self, family: ModelFamily, schema: FeatureSchema) -> Result<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(ValuationError::InvalidArtifact(format!(
                "unsupported artifact version {} (expected {ARTIFACT_VERSION})",
                self.version
            )));
        }
        if self.family != family {
            return Err(ValuationError::InvalidArtifact(format!(
                "artifact is a {} model, expected {family}",
                self.family
            )));
        }
        if self.schema != schema {
            return Err(ValuationError::FeatureMismatch {
                schema,
                expected: schema.feature_count(),
                found: self.schema.feature_count(),
            });
        }
        self.scaler.validate(schema)?;
        self.regressor.validate(schema)
    }

    pub fn encoders(&self) -> CategoryEncoders {
        CategoryEncoders::from_classes(
            self.position_classes.clone(),
            self.nationality_classes.clone(),
        )
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.schema, self.regressor.describe())
    }

    /// Scale then predict. The vector must match the artifact's schema exactly.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let expected = self.schema.feature_count();
        if features.len() != expected {
            return Err(ValuationError::FeatureMismatch {
                schema: self.schema,
                expected,
                found: features.len(),
            });
        }
        let scaled = self.scaler.transform(features);
        let out = self.regressor.predict(&scaled);
        if out.is_finite() {
            Ok(out)
        } else {
            Err(ValuationError::InvalidArtifact(format!(
                "{} produced a non-finite prediction",
                self.describe()
            )))
        }
    }
}
