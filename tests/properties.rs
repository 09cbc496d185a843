use proptest::prelude::*;
use serde_json::{Value, json};
use transfer_valuation::ValuationEngine;
use transfer_valuation::club_multiplier::{ClubMultiplierTable, value_bracket_multiplier};
use transfer_valuation::player::{Foot, PlayerAttributes};
use transfer_valuation::predictors::{PRICE_RATIO_BAND, VALUE_CHANGE_RATIO_BAND, confidence_score};
use transfer_valuation::response::ValuationRequest;
use transfer_valuation::roi::reconcile;

const POSITIONS: [&str; 6] = ["Attack", "Goalkeeper", "Centre-Back", "Midfield", "Unknown", ""];
const NATIONS: [&str; 5] = ["Argentina", "Brazil", "Spain", "Iceland", ""];
const CLUBS: [&str; 6] = [
    "FC Barcelona",
    "Real Madrid",
    "Sevilla FC",
    "Villarreal B",
    "Brentford",
    "Olympique Lyon",
];

fn player_strategy() -> impl Strategy<Value = PlayerAttributes> {
    (
        14u32..45,
        prop_oneof![Just(0.0), 150.0f64..210.0],
        prop_oneof![Just(0.0), 10_000.0f64..300_000_000.0],
        0usize..POSITIONS.len(),
        0usize..NATIONS.len(),
    )
        .prop_map(|(age, height, value, pos, nat)| {
            PlayerAttributes::new(age, height, value, POSITIONS[pos], NATIONS[nat], Foot::Right)
        })
}

proptest! {
    #[test]
    fn confidence_is_always_clamped(
        player in player_strategy(),
        predicted in 0.0f64..2_000_000_000.0,
        goalkeeper_penalty in any::<bool>(),
    ) {
        for band in [VALUE_CHANGE_RATIO_BAND, PRICE_RATIO_BAND] {
            let c = confidence_score(&player, predicted, band, goalkeeper_penalty);
            prop_assert!((50..=95).contains(&c));
        }
    }

    #[test]
    fn known_club_multiplier_never_rises_with_value(
        a in 0.0f64..400_000_000.0,
        b in 0.0f64..400_000_000.0,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(value_bracket_multiplier(low, true) >= value_bracket_multiplier(high, true));

        let table = ClubMultiplierTable::builtin();
        let m_low = table.multiplier_for("Real Madrid", low);
        let m_high = table.multiplier_for("Real Madrid", high);
        prop_assert!(m_low >= m_high);
        prop_assert!(m_high > 0.0);
    }

    #[test]
    fn prices_and_future_values_are_positive(
        player in player_strategy(),
        club in 0usize..CLUBS.len(),
    ) {
        let engine = ValuationEngine::default();
        let report = engine.value(&player, Some(CLUBS[club])).unwrap();
        prop_assert!(report.maximum_price > 0.0);
        prop_assert!(report.predicted_future_value > 0.0);
        prop_assert!((50..=95).contains(&report.confidence));
    }

    #[test]
    fn requests_with_any_market_value_price_positively(
        age in 14u32..45,
        value in prop_oneof![
            Just(json!(0)),
            Just(json!("0")),
            Just(Value::Null),
            (10_000u64..300_000_000).prop_map(|v| json!(v)),
        ],
        pos in 0usize..POSITIONS.len(),
        club in 0usize..CLUBS.len(),
    ) {
        let request: ValuationRequest = serde_json::from_value(json!({
            "age": age,
            "market_value": value,
            "position": POSITIONS[pos],
            "club": CLUBS[club],
            "roi_target": 30,
        }))
        .unwrap();
        let response = ValuationEngine::default().handle(&request).unwrap();
        prop_assert!(response.market_value > 0.0);
        prop_assert!(response.model_price > 0.0);
        prop_assert!(response.predicted_future_value > 0.0);
        prop_assert!(response.maximum_price > 0.0);
    }

    #[test]
    fn adjusted_price_hits_target_roi_exactly(
        player in player_strategy(),
        club in 0usize..CLUBS.len(),
        target in 5.0f64..100.0,
    ) {
        let engine = ValuationEngine::default();
        let r = engine.valuate(&player, Some(CLUBS[club]), target).unwrap();
        let rec = &r.reconciliation;
        if rec.adjusted {
            let achieved = r.report.predicted_future_value / rec.price_for_target - 1.0;
            prop_assert!((achieved - target / 100.0).abs() < 1e-9);
            prop_assert_eq!(rec.shown_roi, target);
        } else {
            prop_assert!(r.report.roi_percentage >= target);
            prop_assert_eq!(rec.shown_price, r.report.maximum_price);
            prop_assert_eq!(rec.shown_roi, r.report.roi_percentage);
        }
    }

    #[test]
    fn model_roi_above_target_is_never_adjusted(
        player in player_strategy(),
        roi in 0.0f64..400.0,
        target in 5.0f64..100.0,
    ) {
        let engine = ValuationEngine::default();
        let mut report = engine.value(&player, None).unwrap();
        report.roi_percentage = roi;
        let r = reconcile(report, target);
        prop_assert_eq!(r.reconciliation.adjusted, roi < target);
    }
}
