use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::club_multiplier::ClubTier;
use crate::combiner::{FiveValues, SimilarAnalysis};
use crate::error::{Result, ValuationError};
use crate::player::RawPlayer;
use crate::roi::ReconciledReport;

/// Destination club as either a bare name or `{"name": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClubRef {
    Name(String),
    Named { name: String },
}

impl ClubRef {
    pub fn name(&self) -> &str {
        match self {
            ClubRef::Name(name) | ClubRef::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationRequest {
    #[serde(flatten)]
    pub player: RawPlayer,
    #[serde(default, alias = "club_name", alias = "destination_club")]
    pub club: Option<ClubRef>,
    #[serde(default)]
    pub roi_target: Value,
}

impl ValuationRequest {
    pub fn new(player: RawPlayer, club: Option<&str>, roi_target: Option<f64>) -> Self {
        Self {
            player,
            club: club.map(|c| ClubRef::Name(c.to_string())),
            roi_target: roi_target.map(Value::from).unwrap_or(Value::Null),
        }
    }

    /// Club name, or `None` when the request names no club. An explicitly empty
    /// name is rejected.
    pub fn club_name(&self) -> Result<Option<&str>> {
        match &self.club {
            None => Ok(None),
            Some(club) if club.name().trim().is_empty() => Err(ValuationError::InvalidInput(
                "club name must not be empty".into(),
            )),
            Some(club) => Ok(Some(club.name())),
        }
    }

    /// ROI target as sent: a number or numeric string ("30", "30%").
    pub fn roi_target_value(&self) -> Option<f64> {
        match &self.roi_target {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiAnalysis {
    pub roi_target: f64,
    #[serde(rename = "precio_para_roi_objetivo")]
    pub price_for_target: f64,
    #[serde(rename = "cumple_roi_objetivo")]
    pub meets_target: bool,
    #[serde(rename = "fue_ajustado")]
    pub adjusted: bool,
    #[serde(rename = "precio_mostrado")]
    pub shown_price: f64,
    #[serde(rename = "roi_mostrado")]
    pub shown_roi: f64,
    #[serde(rename = "diferencia")]
    pub difference: f64,
    #[serde(rename = "diferencia_porcentual")]
    pub difference_pct: f64,
    #[serde(rename = "valor_futuro")]
    pub future_value: f64,
    #[serde(rename = "recomendacion")]
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Response body. `maximum_price` and `roi_percentage` carry the reconciled figures;
/// the model's own numbers are kept alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    pub maximum_price: f64,
    pub predicted_future_value: f64,
    pub resale_value: f64,
    pub roi_percentage: f64,
    pub five_values: FiveValues,
    pub confidence: u8,
    pub club_multiplier: f64,
    pub club_tier: ClubTier,
    pub model_used: String,
    pub base_price: f64,
    pub market_value: f64,
    pub market_value_estimated: bool,
    pub value_change_pct: f64,
    pub success_rate: f64,
    pub expected_return: f64,
    pub similar_analysis: SimilarAnalysis,
    #[serde(rename = "precio_ml_original")]
    pub model_price: f64,
    #[serde(rename = "roi_ml_original")]
    pub model_roi: f64,
    pub roi_analysis: RoiAnalysis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn money(value: f64) -> f64 {
    value.round()
}

impl From<&ReconciledReport> for ValuationResponse {
    fn from(reconciled: &ReconciledReport) -> Self {
        let report = &reconciled.report;
        let rec = &reconciled.reconciliation;
        let fv = &report.five_values;
        let future = money(report.predicted_future_value);

        Self {
            player_name: report.player_name.clone(),
            maximum_price: money(rec.shown_price),
            predicted_future_value: future,
            resale_value: future,
            roi_percentage: round_to(rec.shown_roi, 2),
            five_values: FiveValues {
                sporting_value: money(fv.sporting_value),
                marketing_value: money(fv.marketing_value),
                resale_value: money(fv.resale_value),
                similar_transfers_value: money(fv.similar_transfers_value),
                different_markets_value: money(fv.different_markets_value),
            },
            confidence: report.confidence,
            club_multiplier: round_to(report.club_multiplier.value, 4),
            club_tier: report.club_multiplier.club.tier,
            model_used: report.model_used.clone(),
            base_price: money(report.base_price),
            market_value: money(report.market_value),
            market_value_estimated: report.market_value_estimated,
            value_change_pct: round_to(report.value_change_pct, 2),
            success_rate: report.success_rate,
            expected_return: money(report.expected_return),
            similar_analysis: report.similar_analysis,
            model_price: money(rec.model_price),
            model_roi: round_to(rec.model_roi, 2),
            roi_analysis: RoiAnalysis {
                roi_target: rec.roi_target,
                price_for_target: money(rec.price_for_target),
                meets_target: rec.meets_target,
                adjusted: rec.adjusted,
                shown_price: money(rec.shown_price),
                shown_roi: round_to(rec.shown_roi, 2),
                difference: money(rec.difference),
                difference_pct: round_to(rec.difference_pct, 2),
                future_value: future,
                recommendation: rec.recommendation.clone(),
                note: rec.note.clone(),
            },
            warnings: report.warnings.clone(),
        }
    }
}
