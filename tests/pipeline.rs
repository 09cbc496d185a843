use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;
use transfer_valuation::ValuationEngine;
use transfer_valuation::config::{ModelGeneration, ValuationConfig};
use transfer_valuation::player::{Foot, PlayerAttributes};
use transfer_valuation::response::ValuationRequest;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

fn fixture_engine() -> ValuationEngine {
    ValuationEngine::load(ValuationConfig {
        value_change_model: Some(fixture_path("value_change_v19.json")),
        price_model: Some(fixture_path("maximum_price_v14.json")),
        ..ValuationConfig::default()
    })
}

fn empty_models_engine() -> (tempfile::TempDir, ValuationEngine) {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = ValuationEngine::load(ValuationConfig {
        models_dir: dir.path().to_path_buf(),
        ..ValuationConfig::default()
    });
    (dir, engine)
}

fn forward() -> PlayerAttributes {
    PlayerAttributes::new(24, 180.0, 10_000_000.0, "Attack", "Argentina", Foot::Right)
}

#[test]
fn fixture_models_load() {
    let status = fixture_engine().status();
    assert!(status.all_models_loaded);
    assert_eq!(status.generation, ModelGeneration::Y2025);
    assert_eq!(status.price.model, "price_v14 random_forest[2]");
    assert_eq!(status.club_table_origin, "builtin");
}

#[test]
fn barcelona_scenario_scales_price_and_future_by_same_multiplier() {
    let engine = fixture_engine();
    let r = engine
        .valuate(&forward(), Some("FC Barcelona"), 30.0)
        .expect("valuation should succeed");
    let report = &r.report;

    let club = 1.4 * 1.01;
    assert!((report.club_multiplier.value - club).abs() < 1e-12);
    assert_eq!(report.base_price, 25_000_000.0);
    assert!((report.maximum_price - 25_000_000.0 * club * 1.1).abs() < 1e-3);
    assert!((report.predicted_future_value - 11_250_000.0 * club).abs() < 1e-3);

    // Same multiplier on both sides: ROI equals the club-free ROI.
    let unscaled = (11_250_000.0 - 27_500_000.0) / 27_500_000.0 * 100.0;
    assert!((report.roi_percentage - unscaled).abs() < 1e-9);
    assert_eq!(report.value_change_confidence, 85);
    assert_eq!(report.price_confidence, 75);
    assert_eq!(report.confidence, 79);

    let rec = &r.reconciliation;
    assert!(rec.adjusted);
    assert!(!rec.meets_target);
    assert_eq!(rec.shown_roi, 30.0);
    assert!((rec.price_for_target - report.predicted_future_value / 1.3).abs() < 1e-6);
}

#[test]
fn request_fixture_produces_rounded_response() {
    let engine = fixture_engine();
    let request: ValuationRequest =
        serde_json::from_str(&read_fixture("request_barcelona.json")).expect("request parses");
    let response = engine.handle(&request).expect("valuation should succeed");

    assert_eq!(response.player_name.as_deref(), Some("Fixture Forward"));
    assert_eq!(response.model_price, 38_885_000.0);
    assert_eq!(response.predicted_future_value, 15_907_500.0);
    assert_eq!(response.resale_value, response.predicted_future_value);
    assert_eq!(response.model_roi, -59.09);
    assert_eq!(response.roi_percentage, 30.0);
    assert_eq!(response.maximum_price, (15_907_500.0f64 / 1.3).round());
    assert_eq!(response.club_multiplier, 1.414);
    assert!(response.roi_analysis.adjusted);
    assert!(!response.roi_analysis.meets_target);

    let json = serde_json::to_value(&response).expect("response serializes");
    let five = json["five_values"].as_object().expect("five_values object");
    assert_eq!(five.len(), 5);
    let roi = &json["roi_analysis"];
    assert_eq!(roi["roi_target"], 30.0);
    assert_eq!(roi["cumple_roi_objetivo"], false);
    assert_eq!(roi["fue_ajustado"], true);
    assert!(roi["precio_para_roi_objetivo"].as_f64().is_some());
    assert_eq!(json["precio_ml_original"], 38_885_000.0);
}

#[test]
fn met_target_keeps_model_price() {
    let engine = fixture_engine();
    // 500k player: the 24M/26M forest clips at 4x (2M) and the +12.5% change holds.
    let p = PlayerAttributes::new(24, 180.0, 500_000.0, "Attack", "Spain", Foot::Left);
    let r = engine.valuate(&p, None, 5.0).expect("valuation");
    assert_eq!(r.report.base_price, 2_000_000.0);
    assert!(r.report.roi_percentage < 5.0);
    assert!(r.reconciliation.adjusted);

    let rich = PlayerAttributes::new(24, 180.0, 10_000_000.0, "Attack", "Spain", Foot::Left);
    let mut report = engine.value(&rich, None).expect("valuation");
    report.roi_percentage = 40.0;
    let r = transfer_valuation::roi::reconcile(report.clone(), 30.0);
    assert!(!r.reconciliation.adjusted);
    assert_eq!(r.shown_price(), report.maximum_price);
    assert_eq!(r.shown_roi(), 40.0);
}

#[test]
fn missing_models_use_fallback_rules() {
    let (_dir, engine) = empty_models_engine();
    let status = engine.status();
    assert!(!status.value_change.loaded);
    assert!(!status.price.loaded);
    assert!(status.price.reason.is_some());

    let r = engine.valuate(&forward(), Some("FC Barcelona"), 30.0).expect("valuation");
    assert_eq!(r.report.base_price, 15_000_000.0);
    assert_eq!(r.report.price_confidence, 50);
    assert_eq!(r.report.value_change_confidence, 50);
    assert_eq!(r.report.value_change_pct, 30.0);
    assert!(r.report.model_used.contains("fallback"));
    assert!(r.report.fallback);
    assert_eq!(r.report.success_rate, 0.75);
}

#[test]
fn legacy_generation_uses_club_aware_value_change() {
    let engine = ValuationEngine::load(ValuationConfig {
        generation: ModelGeneration::Legacy,
        value_change_model: Some(fixture_path("value_change_v18.json")),
        price_model: Some(fixture_path("does_not_exist.json")),
        ..ValuationConfig::default()
    });
    let status = engine.status();
    assert!(status.value_change.loaded);
    assert!(!status.price.loaded);

    let elite = engine.value(&forward(), Some("Real Madrid")).expect("valuation");
    assert!((elite.value_change_pct - 10.0).abs() < 1e-12);
    let plain = engine.value(&forward(), Some("Brentford")).expect("valuation");
    assert!((plain.value_change_pct - 5.0).abs() < 1e-12);
    let none = engine.value(&forward(), None).expect("valuation");
    assert!((none.value_change_pct - 5.0).abs() < 1e-12);

    // Legacy confidence is a plain average.
    assert_eq!(elite.confidence, ((85.0 + 50.0) / 2.0f64).round() as u8);
}

#[test]
fn schema_mismatch_falls_back_instead_of_truncating() {
    // A 2025 artifact offered to the legacy generation.
    let engine = ValuationEngine::load(ValuationConfig {
        generation: ModelGeneration::Legacy,
        value_change_model: Some(fixture_path("value_change_v19.json")),
        price_model: Some(fixture_path("maximum_price_v14.json")),
        ..ValuationConfig::default()
    });
    let status = engine.status();
    assert!(!status.all_models_loaded);
    let reason = status.value_change.reason.expect("reason recorded");
    assert!(reason.contains("value_change_v18"), "{reason}");
}

#[test]
fn club_csv_replaces_builtin_table() {
    let engine = ValuationEngine::load(ValuationConfig {
        club_multipliers: Some(fixture_path("club_multipliers.csv")),
        ..ValuationConfig::default()
    });
    let status = engine.status();
    assert_eq!(status.club_table_size, 5);
    assert!(status.club_table_origin.starts_with("csv:"));

    let m = engine.club_multiplier(Some("Ajax Amsterdam"), 10_000_000.0);
    assert!((m.value - 1.18 * 1.01).abs() < 1e-12);

    let unreadable = ValuationEngine::load(ValuationConfig {
        club_multipliers: Some(fixture_path("missing.csv")),
        ..ValuationConfig::default()
    });
    assert_eq!(unreadable.status().club_table_origin, "builtin");
}

#[test]
fn estimated_market_value_is_flagged() {
    let engine = fixture_engine();
    let request: ValuationRequest =
        serde_json::from_str(r#"{"age": 22, "position": "Centre-Forward", "club": "Roma"}"#)
            .expect("request parses");
    let response = engine.handle(&request).expect("valuation");
    assert!(response.market_value_estimated);
    assert_eq!(response.market_value, 10_400_000.0);
    assert!(response.warnings.iter().any(|w| w.contains("estimated")));
}

#[test]
fn zero_market_value_request_is_priced_from_profile() {
    let request: ValuationRequest = serde_json::from_str(
        r#"{"age": 24, "market_value": 0, "position": "Attack", "nationality": "Argentina",
            "club": "FC Barcelona", "roi_target": 30}"#,
    )
    .expect("request parses");
    let response = ValuationEngine::default().handle(&request).expect("valuation");
    assert!(response.market_value_estimated);
    assert_eq!(response.market_value, 13_000_000.0);
    assert!(response.model_price > 0.0);
    assert!(response.maximum_price > 0.0);
    assert!(response.predicted_future_value > 0.0);
    assert!(response.warnings.iter().any(|w| w.contains("estimated")));
}

#[test]
fn invalid_requests_are_errors() {
    let engine = fixture_engine();
    let negative: ValuationRequest =
        serde_json::from_str(r#"{"market_value": -1, "club": "Chelsea"}"#).expect("parses");
    assert!(engine.handle(&negative).is_err());

    let empty_club: ValuationRequest =
        serde_json::from_str(r#"{"market_value": 1000000, "club": ""}"#).expect("parses");
    assert!(engine.handle(&empty_club).is_err());
}

#[test]
fn out_of_range_roi_target_uses_default() {
    let engine = fixture_engine();
    let request: ValuationRequest = serde_json::from_str(
        r#"{"age": 24, "market_value": 10000000, "position": "Attack", "club": "Chelsea", "roi_target": 250}"#,
    )
    .expect("parses");
    let response = engine.handle(&request).expect("valuation");
    assert_eq!(response.roi_analysis.roi_target, 30.0);
}

#[test]
fn valuation_is_idempotent_and_thread_safe() {
    let engine = fixture_engine();
    let requests: Vec<ValuationRequest> =
        serde_json::from_str(&read_fixture("batch_requests.json")).expect("batch parses");

    let sequential: Vec<String> = requests
        .iter()
        .map(|r| format!("{:?}", engine.handle(r)))
        .collect();
    let parallel: Vec<String> = requests
        .par_iter()
        .map(|r| format!("{:?}", engine.handle(r)))
        .collect();
    assert_eq!(sequential, parallel);

    let ok = requests.iter().filter(|r| engine.handle(r).is_ok()).count();
    assert_eq!(ok, requests.len() - 1);
}
