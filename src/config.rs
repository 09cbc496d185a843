use std::env;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSchema;

pub const DEFAULT_MODELS_DIR: &str = "models/trained";
pub const DEFAULT_INFLATION: f64 = 1.10;
pub const DEFAULT_ROI_TARGET: f64 = 30.0;
pub const MIN_ROI_TARGET: f64 = 5.0;
pub const MAX_ROI_TARGET: f64 = 100.0;

/// Inclusive clip range. For prices the bounds are multiples of market value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipBounds {
    pub min: f64,
    pub max: f64,
}

impl ClipBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn scaled(&self, factor: f64) -> ClipBounds {
        ClipBounds::new(self.min * factor, self.max * factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub value_change: f64,
    pub price: f64,
}

impl ConfidenceWeights {
    pub fn combine(&self, value_change: u8, price: u8) -> u8 {
        let total = self.value_change + self.price;
        let blended = if total > 0.0 {
            (self.value_change * f64::from(value_change) + self.price * f64::from(price)) / total
        } else {
            (f64::from(value_change) + f64::from(price)) / 2.0
        };
        blended.round().clamp(50.0, 95.0) as u8
    }
}

/// Deterministic value-change estimate used when no model is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueChangeFallback {
    Flat { percent: f64 },
    AgeCurve,
}

impl ValueChangeFallback {
    pub fn percent_for(&self, age: u32) -> f64 {
        match self {
            ValueChangeFallback::Flat { percent } => *percent,
            ValueChangeFallback::AgeCurve => match age {
                0..=20 => 20.0,
                21..=23 => 12.0,
                24..=26 => 8.0,
                27..=29 => 3.0,
                30..=32 => -2.0,
                _ => -8.0,
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            ValueChangeFallback::Flat { percent } => format!("flat {percent:+}%"),
            ValueChangeFallback::AgeCurve => "age curve".to_string(),
        }
    }
}

/// Model generation. Selects schemas, clip ranges, confidence weights, the fallback
/// rule and default artifact names as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelGeneration {
    #[serde(rename = "legacy")]
    Legacy,
    #[default]
    #[serde(rename = "2025")]
    Y2025,
}

impl ModelGeneration {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "2025" | "y2025" | "current" => Some(ModelGeneration::Y2025),
            "legacy" | "v1" => Some(ModelGeneration::Legacy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelGeneration::Legacy => "legacy",
            ModelGeneration::Y2025 => "2025",
        }
    }

    pub fn value_change_schema(self) -> FeatureSchema {
        match self {
            ModelGeneration::Legacy => FeatureSchema::ValueChangeV18,
            ModelGeneration::Y2025 => FeatureSchema::ValueChangeV19,
        }
    }

    pub fn price_schema(self) -> FeatureSchema {
        match self {
            ModelGeneration::Legacy => FeatureSchema::PriceV12,
            ModelGeneration::Y2025 => FeatureSchema::PriceV14,
        }
    }

    pub fn value_change_file(self) -> &'static str {
        match self {
            ModelGeneration::Legacy => "value_change_model_legacy.json",
            ModelGeneration::Y2025 => "value_change_model.json",
        }
    }

    pub fn price_file(self) -> &'static str {
        match self {
            ModelGeneration::Legacy => "maximum_price_model_legacy.json",
            ModelGeneration::Y2025 => "maximum_price_model.json",
        }
    }

    /// Percent change range.
    pub fn value_change_clip(self) -> ClipBounds {
        match self {
            ModelGeneration::Legacy => ClipBounds::new(-30.0, 50.0),
            ModelGeneration::Y2025 => ClipBounds::new(-90.0, 500.0),
        }
    }

    /// Multiples of market value.
    pub fn price_clip(self) -> ClipBounds {
        match self {
            ModelGeneration::Legacy => ClipBounds::new(1.2, 5.0),
            ModelGeneration::Y2025 => ClipBounds::new(1.1, 4.0),
        }
    }

    pub fn confidence_weights(self) -> ConfidenceWeights {
        match self {
            ModelGeneration::Legacy => ConfidenceWeights {
                value_change: 0.5,
                price: 0.5,
            },
            ModelGeneration::Y2025 => ConfidenceWeights {
                value_change: 0.4,
                price: 0.6,
            },
        }
    }

    pub fn value_change_fallback(self) -> ValueChangeFallback {
        match self {
            ModelGeneration::Legacy => ValueChangeFallback::AgeCurve,
            ModelGeneration::Y2025 => ValueChangeFallback::Flat { percent: 30.0 },
        }
    }
}

impl fmt::Display for ModelGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    pub generation: ModelGeneration,
    pub models_dir: PathBuf,
    pub value_change_model: Option<PathBuf>,
    pub price_model: Option<PathBuf>,
    pub club_multipliers: Option<PathBuf>,
    pub inflation: f64,
    pub default_roi_target: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            generation: ModelGeneration::default(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            value_change_model: None,
            price_model: None,
            club_multipliers: None,
            inflation: DEFAULT_INFLATION,
            default_roi_target: DEFAULT_ROI_TARGET,
        }
    }
}

impl ValuationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let opt = |key: &str| {
            lookup(key).and_then(|val| {
                let trimmed = val.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };
        let num = |key: &str| {
            opt(key)
                .and_then(|val| val.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let generation = opt("VALUATION_MODEL_GENERATION")
            .and_then(|val| ModelGeneration::parse(&val))
            .unwrap_or_default();
        let models_dir = opt("VALUATION_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR));
        let inflation = num("VALUATION_INFLATION")
            .unwrap_or(DEFAULT_INFLATION)
            .clamp(1.0, 2.0);
        let default_roi_target = num("VALUATION_DEFAULT_ROI_TARGET")
            .unwrap_or(DEFAULT_ROI_TARGET)
            .clamp(MIN_ROI_TARGET, MAX_ROI_TARGET);

        Self {
            generation,
            models_dir,
            value_change_model: opt("VALUATION_VALUE_CHANGE_MODEL").map(PathBuf::from),
            price_model: opt("VALUATION_PRICE_MODEL").map(PathBuf::from),
            club_multipliers: opt("VALUATION_CLUB_MULTIPLIERS").map(PathBuf::from),
            inflation,
            default_roi_target,
        }
    }

    pub fn value_change_path(&self) -> PathBuf {
        self.value_change_model
            .clone()
            .unwrap_or_else(|| self.models_dir.join(self.generation.value_change_file()))
    }

    pub fn price_path(&self) -> PathBuf {
        self.price_model
            .clone()
            .unwrap_or_else(|| self.models_dir.join(self.generation.price_file()))
    }

    /// Target from the request when usable, otherwise the configured default.
    pub fn normalize_roi_target(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(t) if t.is_finite() && (MIN_ROI_TARGET..=MAX_ROI_TARGET).contains(&t) => t,
            _ => self.default_roi_target,
        }
    }
}
