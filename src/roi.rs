use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combiner::ValuationReport;

/// Outcome of comparing the model's ROI with the user's target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiReconciliation {
    pub roi_target: f64,
    /// `future / (1 + target/100)`, or the model price when back-solving was skipped.
    pub price_for_target: f64,
    pub meets_target: bool,
    pub adjusted: bool,
    pub shown_price: f64,
    pub shown_roi: f64,
    pub model_price: f64,
    pub model_roi: f64,
    pub future_value: f64,
    pub difference: f64,
    pub difference_pct: f64,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledReport {
    pub report: ValuationReport,
    pub reconciliation: RoiReconciliation,
}

impl ReconciledReport {
    pub fn shown_price(&self) -> f64 {
        self.reconciliation.shown_price
    }

    pub fn shown_roi(&self) -> f64 {
        self.reconciliation.shown_roi
    }
}

/// Highest price that still returns `roi_target` percent on `future_value`.
pub fn price_for_target(future_value: f64, roi_target: f64) -> Option<f64> {
    if future_value > 0.0 && roi_target > 0.0 && future_value.is_finite() && roi_target.is_finite()
    {
        Some(future_value / (1.0 + roi_target / 100.0))
    } else {
        None
    }
}

/// Discount a maximum price so that reselling at it yields `roi_target` percent.
pub fn recommended_price_for_target(maximum_price: f64, roi_target: f64) -> Option<f64> {
    let denominator = 1.0 + roi_target / 100.0;
    if maximum_price > 0.0 && denominator > 0.0 && denominator.is_finite() {
        Some(maximum_price / denominator)
    } else {
        None
    }
}

/// Single-threshold policy: keep the model's numbers when its ROI reaches the target,
/// otherwise show the back-solved price with the target ROI.
pub fn reconcile(report: ValuationReport, roi_target: f64) -> ReconciledReport {
    let model_price = report.maximum_price;
    let model_roi = report.roi_percentage;
    let future_value = report.predicted_future_value;

    let reconciliation = match price_for_target(future_value, roi_target) {
        Some(target_price) => {
            let meets_target = model_roi >= roi_target;
            let difference = (model_price - target_price).abs();
            let difference_pct = if model_price > 0.0 {
                difference / model_price * 100.0
            } else {
                0.0
            };
            let (shown_price, shown_roi, recommendation) = if meets_target {
                (
                    model_price,
                    model_roi,
                    format!("Strong investment with an ROI of {model_roi:.1}%"),
                )
            } else {
                (
                    target_price,
                    roi_target,
                    format!(
                        "To reach {roi_target}% ROI, pay at most €{:.1}M",
                        target_price / 1_000_000.0
                    ),
                )
            };
            debug!(
                model_roi,
                roi_target,
                meets_target,
                shown_price,
                "roi target reconciled"
            );
            RoiReconciliation {
                roi_target,
                price_for_target: target_price,
                meets_target,
                adjusted: !meets_target,
                shown_price,
                shown_roi,
                model_price,
                model_roi,
                future_value,
                difference,
                difference_pct,
                recommendation,
                note: None,
            }
        }
        None => {
            let note = if future_value <= 0.0 {
                "predicted future value is not positive; target price not computed"
            } else {
                "ROI target is not positive; target price not computed"
            };
            debug!(future_value, roi_target, "{note}");
            RoiReconciliation {
                roi_target,
                price_for_target: model_price,
                meets_target: false,
                adjusted: false,
                shown_price: model_price,
                shown_roi: model_roi,
                model_price,
                model_roi,
                future_value,
                difference: 0.0,
                difference_pct: 0.0,
                recommendation: "Could not compute a price for the ROI target".to_string(),
                note: Some(note.to_string()),
            }
        }
    };

    ReconciledReport {
        report,
        reconciliation,
    }
}
