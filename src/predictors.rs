use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::club_multiplier::ClubIdentity;
use crate::config::{ClipBounds, ModelGeneration, ValueChangeFallback};
use crate::error::Result;
use crate::features::{CategoryEncoders, FeatureSchema, encode};
use crate::model_artifact::{ModelArtifact, ModelFamily};
use crate::player::{PlayerAttributes, PositionGroup};

pub const BASE_CONFIDENCE: i32 = 85;
pub const FALLBACK_CONFIDENCE: u8 = 50;
pub const MIN_CONFIDENCE: u8 = 50;
pub const MAX_CONFIDENCE: u8 = 95;
pub const FALLBACK_PRICE_FACTOR: f64 = 1.5;

/// Acceptable predicted/market ratio for the value-change model.
pub const VALUE_CHANGE_RATIO_BAND: (f64, f64) = (0.5, 2.5);
/// Acceptable predicted/market ratio for the price model.
pub const PRICE_RATIO_BAND: (f64, f64) = (0.7, 2.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub raw_value: f64,
    pub clipped_value: f64,
    pub confidence: u8,
    pub model_used: String,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Load state of one predictor, reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub family: ModelFamily,
    pub loaded: bool,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<FeatureSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Predicted percentage change in market value after the transfer.
pub trait ValueChangeEstimator: Send + Sync {
    fn predict_value_change(
        &self,
        player: &PlayerAttributes,
        club: Option<&ClubIdentity>,
    ) -> PredictionResult;

    fn status(&self) -> ModelStatus;
}

/// Absolute recommended maximum price, before club and inflation adjustments.
pub trait PriceEstimator: Send + Sync {
    fn predict_maximum_price(&self, player: &PlayerAttributes) -> PredictionResult;

    fn status(&self) -> ModelStatus;
}

/// Heuristic confidence in a prediction, clamped to [50, 95].
pub fn confidence_score(
    player: &PlayerAttributes,
    predicted_value: f64,
    ratio_band: (f64, f64),
    goalkeeper_penalty: bool,
) -> u8 {
    let mut score = BASE_CONFIDENCE;
    if player.age < 18 || player.age > 33 {
        score -= 10;
    }
    let mv = player.market_value;
    if mv < 500_000.0 || mv > 150_000_000.0 {
        score -= 5;
    }
    score -= 5 * player.missing_critical_fields() as i32;
    if mv > 0.0 {
        let ratio = predicted_value / mv;
        if !(ratio_band.0..=ratio_band.1).contains(&ratio) {
            score -= 10;
        }
    }
    if goalkeeper_penalty && player.position_group() == PositionGroup::Goalkeeper {
        score -= 5;
    }
    score.clamp(i32::from(MIN_CONFIDENCE), i32::from(MAX_CONFIDENCE)) as u8
}

#[derive(Debug, Clone)]
struct LoadedModel {
    artifact: ModelArtifact,
    encoders: CategoryEncoders,
    source: String,
}

impl LoadedModel {
    fn validated(
        artifact: ModelArtifact,
        family: ModelFamily,
        schema: FeatureSchema,
        source: String,
    ) -> Result<Self> {
        artifact.validate(family, schema)?;
        Ok(Self {
            encoders: artifact.encoders(),
            artifact,
            source,
        })
    }

    fn status(&self, family: ModelFamily) -> ModelStatus {
        ModelStatus {
            family,
            loaded: true,
            model: self.artifact.describe(),
            schema: Some(self.artifact.schema),
            source: Some(self.source.clone()),
            reason: None,
        }
    }
}

fn load_model(
    path: &Path,
    family: ModelFamily,
    schema: FeatureSchema,
) -> std::result::Result<LoadedModel, String> {
    let loaded = ModelArtifact::load(path).and_then(|artifact| {
        LoadedModel::validated(artifact, family, schema, path.display().to_string())
    });
    match loaded {
        Ok(model) => {
            info!(
                family = %family,
                schema = %schema,
                path = %path.display(),
                model = %model.artifact.describe(),
                "model loaded"
            );
            Ok(model)
        }
        Err(err) => {
            warn!(
                family = %family,
                path = %path.display(),
                "model unavailable, using fallback: {err}"
            );
            Err(err.to_string())
        }
    }
}

fn fallback_status(family: ModelFamily, model: String, reason: &Option<String>) -> ModelStatus {
    ModelStatus {
        family,
        loaded: false,
        model,
        schema: None,
        source: None,
        reason: reason.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct ValueChangePredictor {
    model: Option<LoadedModel>,
    schema: FeatureSchema,
    clip: ClipBounds,
    fallback: ValueChangeFallback,
    unavailable: Option<String>,
}

impl ValueChangePredictor {
    /// Rule-based predictor with no model behind it.
    pub fn fallback_only(generation: ModelGeneration) -> Self {
        Self {
            model: None,
            schema: generation.value_change_schema(),
            clip: generation.value_change_clip(),
            fallback: generation.value_change_fallback(),
            unavailable: Some("no model configured".to_string()),
        }
    }

    pub fn from_artifact(artifact: ModelArtifact, generation: ModelGeneration) -> Result<Self> {
        let mut predictor = Self::fallback_only(generation);
        let source = artifact.source.clone().unwrap_or_else(|| "inline".to_string());
        predictor.model = Some(LoadedModel::validated(
            artifact,
            ModelFamily::ValueChange,
            predictor.schema,
            source,
        )?);
        predictor.unavailable = None;
        Ok(predictor)
    }

    /// Never fails: an unusable artifact leaves the predictor on its fallback rule.
    pub fn load(path: &Path, generation: ModelGeneration) -> Self {
        let mut predictor = Self::fallback_only(generation);
        match load_model(path, ModelFamily::ValueChange, predictor.schema) {
            Ok(model) => {
                predictor.model = Some(model);
                predictor.unavailable = None;
            }
            Err(reason) => predictor.unavailable = Some(reason),
        }
        predictor
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn fallback_result(
        &self,
        player: &PlayerAttributes,
        warnings: Vec<String>,
    ) -> PredictionResult {
        let pct = self.fallback.percent_for(player.age);
        PredictionResult {
            raw_value: pct,
            clipped_value: self.clip.clamp(pct),
            confidence: FALLBACK_CONFIDENCE,
            model_used: format!("{} (fallback)", self.fallback.label()),
            fallback: true,
            warnings,
        }
    }
}

impl ValueChangeEstimator for ValueChangePredictor {
    fn predict_value_change(
        &self,
        player: &PlayerAttributes,
        club: Option<&ClubIdentity>,
    ) -> PredictionResult {
        let Some(model) = &self.model else {
            return self.fallback_result(player, Vec::new());
        };

        let features = encode(self.schema, player, &model.encoders, club);
        let warnings: Vec<String> = features.warnings.iter().map(ToString::to_string).collect();
        match model.artifact.predict(&features.values) {
            Ok(raw) => {
                let clipped = self.clip.clamp(raw);
                if clipped != raw {
                    debug!(raw, clipped, "value change clipped");
                }
                let future = player.market_value * (1.0 + clipped / 100.0);
                PredictionResult {
                    raw_value: raw,
                    clipped_value: clipped,
                    confidence: confidence_score(player, future, VALUE_CHANGE_RATIO_BAND, false),
                    model_used: model.artifact.describe(),
                    fallback: false,
                    warnings,
                }
            }
            Err(err) => {
                warn!("value change prediction failed, using fallback: {err}");
                let mut warnings = warnings;
                warnings.push(err.to_string());
                self.fallback_result(player, warnings)
            }
        }
    }

    fn status(&self) -> ModelStatus {
        match &self.model {
            Some(model) => model.status(ModelFamily::ValueChange),
            None => fallback_status(
                ModelFamily::ValueChange,
                format!("{} (fallback)", self.fallback.label()),
                &self.unavailable,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaximumPricePredictor {
    model: Option<LoadedModel>,
    schema: FeatureSchema,
    clip: ClipBounds,
    unavailable: Option<String>,
}

impl MaximumPricePredictor {
    pub fn fallback_only(generation: ModelGeneration) -> Self {
        Self {
            model: None,
            schema: generation.price_schema(),
            clip: generation.price_clip(),
            unavailable: Some("no model configured".to_string()),
        }
    }

    pub fn from_artifact(artifact: ModelArtifact, generation: ModelGeneration) -> Result<Self> {
        let mut predictor = Self::fallback_only(generation);
        let source = artifact.source.clone().unwrap_or_else(|| "inline".to_string());
        predictor.model = Some(LoadedModel::validated(
            artifact,
            ModelFamily::MaximumPrice,
            predictor.schema,
            source,
        )?);
        predictor.unavailable = None;
        Ok(predictor)
    }

    pub fn load(path: &Path, generation: ModelGeneration) -> Self {
        let mut predictor = Self::fallback_only(generation);
        match load_model(path, ModelFamily::MaximumPrice, predictor.schema) {
            Ok(model) => {
                predictor.model = Some(model);
                predictor.unavailable = None;
            }
            Err(reason) => predictor.unavailable = Some(reason),
        }
        predictor
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn fallback_result(
        &self,
        player: &PlayerAttributes,
        warnings: Vec<String>,
    ) -> PredictionResult {
        let price = player.market_value * FALLBACK_PRICE_FACTOR;
        PredictionResult {
            raw_value: price,
            clipped_value: price,
            confidence: FALLBACK_CONFIDENCE,
            model_used: format!("market value x{FALLBACK_PRICE_FACTOR} (fallback)"),
            fallback: true,
            warnings,
        }
    }
}

impl PriceEstimator for MaximumPricePredictor {
    fn predict_maximum_price(&self, player: &PlayerAttributes) -> PredictionResult {
        let Some(model) = &self.model else {
            return self.fallback_result(player, Vec::new());
        };

        let features = encode(self.schema, player, &model.encoders, None);
        let warnings: Vec<String> = features.warnings.iter().map(ToString::to_string).collect();
        match model.artifact.predict(&features.values) {
            Ok(raw) => {
                let bounds = self.clip.scaled(player.market_value.max(0.0));
                let clipped = bounds.clamp(raw);
                if clipped != raw {
                    debug!(raw, clipped, "maximum price clipped");
                }
                PredictionResult {
                    raw_value: raw,
                    clipped_value: clipped,
                    confidence: confidence_score(player, clipped, PRICE_RATIO_BAND, true),
                    model_used: model.artifact.describe(),
                    fallback: false,
                    warnings,
                }
            }
            Err(err) => {
                warn!("price prediction failed, using fallback: {err}");
                let mut warnings = warnings;
                warnings.push(err.to_string());
                self.fallback_result(player, warnings)
            }
        }
    }

    fn status(&self) -> ModelStatus {
        match &self.model {
            Some(model) => model.status(ModelFamily::MaximumPrice),
            None => fallback_status(
                ModelFamily::MaximumPrice,
                format!("market value x{FALLBACK_PRICE_FACTOR} (fallback)"),
                &self.unavailable,
            ),
        }
    }
}
