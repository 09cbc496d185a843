use serde::{Deserialize, Serialize};

use crate::club_multiplier::ClubMultiplier;
use crate::config::{ConfidenceWeights, DEFAULT_INFLATION, ModelGeneration};
use crate::player::{NationalityMarket, PlayerAttributes, PositionGroup};
use crate::predictors::PredictionResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombineParams {
    pub inflation: f64,
    pub weights: ConfidenceWeights,
}

impl Default for CombineParams {
    fn default() -> Self {
        Self {
            inflation: DEFAULT_INFLATION,
            weights: ModelGeneration::default().confidence_weights(),
        }
    }
}

/// Presentation sub-scores. Each is an independent heuristic on market value; they
/// are not a decomposition of the maximum price and have no sum constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiveValues {
    pub sporting_value: f64,
    pub marketing_value: f64,
    pub resale_value: f64,
    pub similar_transfers_value: f64,
    pub different_markets_value: f64,
}

impl FiveValues {
    pub fn compute(player: &PlayerAttributes, change_pct: f64, future_value: f64) -> Self {
        let mv = player.market_value;
        let group = player.position_group();
        let market = player.nationality_market();

        let mut marketing = mv * 0.3;
        if group == PositionGroup::Attack {
            marketing *= 1.5;
        }
        if market == NationalityMarket::SouthAmericanPremium {
            marketing *= 1.3;
        }

        let mut sporting = mv * 0.4;
        if player.age <= 25 {
            sporting *= 1.4;
        } else if player.age > 30 {
            sporting *= 0.7;
        }
        if change_pct > 20.0 {
            sporting *= 1.3;
        }

        let mut resale = future_value;
        if player.age <= 22 {
            resale *= 1.2;
        } else if player.age > 28 {
            resale *= 0.8;
        }

        let mut similar = mv * 0.25;
        if change_pct > 20.0 {
            similar *= 1.4;
        } else if change_pct < -10.0 {
            similar *= 0.6;
        }

        let different_markets = mv
            * 0.2
            * match market {
                NationalityMarket::SouthAmericanPremium => 1.5,
                NationalityMarket::WesternEuropean => 1.2,
                NationalityMarket::Other => 1.0,
            };

        Self {
            sporting_value: sporting,
            marketing_value: marketing,
            resale_value: resale,
            similar_transfers_value: similar,
            different_markets_value: different_markets,
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.sporting_value,
            self.marketing_value,
            self.resale_value,
            self.similar_transfers_value,
            self.different_markets_value,
        ]
    }
}

/// Outcome profile of comparable past transfers, derived from the predicted change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarAnalysis {
    pub similar_count: u32,
    pub success_rate: f64,
    pub avg_roi: f64,
    pub adaptation_months: u32,
    pub avg_performance: f64,
}

impl SimilarAnalysis {
    pub fn compute(player: &PlayerAttributes, change_pct: f64) -> Self {
        let (mut success, mut roi) = if change_pct > 30.0 {
            (85.0, 45.0)
        } else if change_pct > 10.0 {
            (70.0, 25.0)
        } else if change_pct > 0.0 {
            (60.0, 15.0)
        } else {
            (45.0, 5.0)
        };
        if player.age <= 22 {
            success += 10.0;
            roi += 10.0;
        } else if player.age > 30 {
            success -= 15.0;
            roi -= 10.0;
        }
        if player.position_group() == PositionGroup::Attack {
            success += 5.0;
            roi += 5.0;
        }
        let success = f64::clamp(success, 30.0, 95.0);
        Self {
            similar_count: 50,
            success_rate: success,
            avg_roi: f64::clamp(roi, 0.0, 100.0),
            adaptation_months: if player.age <= 25 { 6 } else { 8 },
            avg_performance: success / 100.0,
        }
    }
}

/// Price-side success probability.
pub fn success_rate(player: &PlayerAttributes, price_fallback: bool) -> f64 {
    if price_fallback || player.age < 23 {
        0.75
    } else if player.age < 28 {
        0.85
    } else {
        0.70
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    pub market_value: f64,
    pub market_value_estimated: bool,
    /// Clipped model price before club and inflation adjustments.
    pub base_price: f64,
    pub maximum_price: f64,
    pub value_change_pct: f64,
    pub predicted_future_value: f64,
    pub roi_percentage: f64,
    pub five_values: FiveValues,
    pub confidence: u8,
    pub value_change_confidence: u8,
    pub price_confidence: u8,
    pub club_multiplier: ClubMultiplier,
    pub inflation: f64,
    pub success_rate: f64,
    pub expected_return: f64,
    pub price_to_market_ratio: f64,
    pub value_change_multiplier: f64,
    pub similar_analysis: SimilarAnalysis,
    pub model_used: String,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `(future - price) / price * 100`, 0 for a non-positive price.
pub fn roi_percent(future_value: f64, price: f64) -> f64 {
    if price > 0.0 {
        (future_value - price) / price * 100.0
    } else {
        0.0
    }
}

/// Merge both predictions and the club multiplier into one report. Club multiplier
/// scales price and future value alike; ROI is taken on the adjusted figures.
pub fn combine(
    value_change: &PredictionResult,
    price: &PredictionResult,
    player: &PlayerAttributes,
    club: &ClubMultiplier,
    params: &CombineParams,
) -> ValuationReport {
    let mv = player.market_value;
    let pct = value_change.clipped_value;
    let multiplier = club.value;

    let maximum_price = price.clipped_value * multiplier * params.inflation;
    let predicted_future_value = mv * (1.0 + pct / 100.0) * multiplier;
    let roi_percentage = roi_percent(predicted_future_value, maximum_price);

    let mut warnings: Vec<String> = value_change
        .warnings
        .iter()
        .chain(&price.warnings)
        .cloned()
        .collect();
    warnings.dedup();
    if player.market_value_estimated {
        warnings.push("market value estimated from profile".to_string());
    }

    ValuationReport {
        player_name: player.name.clone(),
        market_value: mv,
        market_value_estimated: player.market_value_estimated,
        base_price: price.clipped_value,
        maximum_price,
        value_change_pct: pct,
        predicted_future_value,
        roi_percentage,
        five_values: FiveValues::compute(player, pct, predicted_future_value),
        confidence: params.weights.combine(value_change.confidence, price.confidence),
        value_change_confidence: value_change.confidence,
        price_confidence: price.confidence,
        club_multiplier: club.clone(),
        inflation: params.inflation,
        success_rate: success_rate(player, price.fallback),
        expected_return: predicted_future_value - maximum_price,
        price_to_market_ratio: if mv > 0.0 { maximum_price / mv } else { 1.0 },
        value_change_multiplier: 1.0 + pct / 100.0,
        similar_analysis: SimilarAnalysis::compute(player, pct),
        model_used: format!("{} + {}", value_change.model_used, price.model_used),
        fallback: value_change.fallback || price.fallback,
        warnings,
    }
}
