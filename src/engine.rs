use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::club_multiplier::{ClubMultiplier, ClubMultiplierTable};
use crate::combiner::{CombineParams, ValuationReport, combine};
use crate::config::{ModelGeneration, ValuationConfig};
use crate::error::{Result, ValuationError};
use crate::player::PlayerAttributes;
use crate::predictors::{
    MaximumPricePredictor, ModelStatus, PriceEstimator, ValueChangeEstimator,
    ValueChangePredictor,
};
use crate::response::{ValuationRequest, ValuationResponse};
use crate::roi::{ReconciledReport, reconcile};

static ENGINE: OnceCell<ValuationEngine> = OnceCell::new();

/// Process-wide engine built from the environment on first use.
pub fn global_engine() -> &'static ValuationEngine {
    ENGINE.get_or_init(|| ValuationEngine::load(ValuationConfig::from_env()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub generation: ModelGeneration,
    pub value_change: ModelStatus,
    pub price: ModelStatus,
    pub all_models_loaded: bool,
    pub club_table_size: usize,
    pub club_table_origin: String,
    pub inflation: f64,
    pub default_roi_target: f64,
}

/// Loaded once, then shared read-only across threads. Valuation calls are pure
/// functions of their inputs.
pub struct ValuationEngine {
    config: ValuationConfig,
    value_change: Box<dyn ValueChangeEstimator>,
    price: Box<dyn PriceEstimator>,
    clubs: ClubMultiplierTable,
    params: CombineParams,
}

impl ValuationEngine {
    /// Load models and the club table named by `config`. Missing or invalid models
    /// leave the matching predictor on its fallback rule; an unreadable club CSV
    /// leaves the built-in table in place.
    pub fn load(config: ValuationConfig) -> Self {
        let generation = config.generation;
        let value_change = ValueChangePredictor::load(&config.value_change_path(), generation);
        let price = MaximumPricePredictor::load(&config.price_path(), generation);

        let clubs = match &config.club_multipliers {
            Some(path) => match ClubMultiplierTable::load_csv(path) {
                Ok(table) => {
                    info!(path = %path.display(), clubs = table.len(), "club multipliers loaded");
                    table
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        "club multipliers unavailable, using built-in table: {err}"
                    );
                    ClubMultiplierTable::builtin()
                }
            },
            None => ClubMultiplierTable::builtin(),
        };

        Self::with_estimators(config, Box::new(value_change), Box::new(price), clubs)
    }

    pub fn with_estimators(
        config: ValuationConfig,
        value_change: Box<dyn ValueChangeEstimator>,
        price: Box<dyn PriceEstimator>,
        clubs: ClubMultiplierTable,
    ) -> Self {
        let params = CombineParams {
            inflation: config.inflation,
            weights: config.generation.confidence_weights(),
        };
        Self {
            config,
            value_change,
            price,
            clubs,
            params,
        }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn clubs(&self) -> &ClubMultiplierTable {
        &self.clubs
    }

    pub fn club_multiplier(&self, club: Option<&str>, player_value: f64) -> ClubMultiplier {
        club.map(|name| self.clubs.resolve(name, player_value))
            .unwrap_or_else(ClubMultiplier::neutral)
    }

    /// Run both predictors and combine them for a destination club.
    pub fn value(&self, player: &PlayerAttributes, club: Option<&str>) -> Result<ValuationReport> {
        if !player.market_value.is_finite() || player.market_value < 0.0 {
            return Err(ValuationError::InvalidInput(format!(
                "market value must be a finite non-negative amount, got {}",
                player.market_value
            )));
        }
        let estimated;
        let player = if player.market_value == 0.0 {
            estimated = player.clone().with_estimated_market_value();
            &estimated
        } else {
            player
        };
        let club_multiplier = self.club_multiplier(club, player.market_value);
        let club_identity = club.map(|_| &club_multiplier.club);

        let value_change = self.value_change.predict_value_change(player, club_identity);
        let price = self.price.predict_maximum_price(player);
        Ok(combine(&value_change, &price, player, &club_multiplier, &self.params))
    }

    /// Value and reconcile against `roi_target` percent.
    pub fn valuate(
        &self,
        player: &PlayerAttributes,
        club: Option<&str>,
        roi_target: f64,
    ) -> Result<ReconciledReport> {
        if !roi_target.is_finite() {
            return Err(ValuationError::InvalidInput(format!(
                "ROI target must be finite, got {roi_target}"
            )));
        }
        let report = self.value(player, club)?;
        Ok(reconcile(report, roi_target))
    }

    /// Route-layer entry point: lenient request in, rounded response out.
    pub fn handle(&self, request: &ValuationRequest) -> Result<ValuationResponse> {
        let player = PlayerAttributes::from_raw(&request.player)?;
        let club = request.club_name()?;
        let roi_target = self.config.normalize_roi_target(request.roi_target_value());
        let reconciled = self.valuate(&player, club, roi_target)?;
        Ok(ValuationResponse::from(&reconciled))
    }

    pub fn status(&self) -> EngineStatus {
        let value_change = self.value_change.status();
        let price = self.price.status();
        EngineStatus {
            generation: self.config.generation,
            all_models_loaded: value_change.loaded && price.loaded,
            value_change,
            price,
            club_table_size: self.clubs.len(),
            club_table_origin: self.clubs.origin().to_string(),
            inflation: self.config.inflation,
            default_roi_target: self.config.default_roi_target,
        }
    }
}

impl Default for ValuationEngine {
    /// Built-in club table with both predictors on their fallback rules.
    fn default() -> Self {
        let config = ValuationConfig::default();
        let generation = config.generation;
        Self::with_estimators(
            config,
            Box::new(ValueChangePredictor::fallback_only(generation)),
            Box::new(MaximumPricePredictor::fallback_only(generation)),
            ClubMultiplierTable::builtin(),
        )
    }
}
