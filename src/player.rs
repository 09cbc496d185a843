use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValuationError};

pub const DEFAULT_AGE: u32 = 25;
pub const DEFAULT_HEIGHT_CM: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Foot {
    Left,
    #[default]
    Right,
    Both,
}

impl Foot {
    pub fn code(self) -> f64 {
        match self {
            Foot::Left => 0.0,
            Foot::Right => 1.0,
            Foot::Both => 2.0,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "izquierdo" => Some(Foot::Left),
            "right" | "r" | "derecho" => Some(Foot::Right),
            "both" | "either" | "ambidextrous" | "ambos" => Some(Foot::Both),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Foot::Right,
            Value::Bool(false) => Foot::Left,
            Value::String(s) => Foot::parse(s).unwrap_or_default(),
            _ => Foot::default(),
        }
    }
}

/// Closed set of positions used by the heuristic rules. The free-text position is
/// kept on [`PlayerAttributes`] because the label encoders were fitted on raw labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionGroup {
    Goalkeeper,
    Defender,
    Midfield,
    Attack,
    Unknown,
}

impl PositionGroup {
    pub fn from_position(raw: &str) -> Self {
        let p = raw.trim().to_ascii_lowercase();
        if p.is_empty() || p == "unknown" {
            return PositionGroup::Unknown;
        }
        let has = |needles: &[&str]| needles.iter().any(|n| p.contains(n));
        // Attack is checked before midfield so "attacking midfield" lands in attack.
        if has(&["goalkeeper", "keeper", "portero"]) {
            PositionGroup::Goalkeeper
        } else if has(&["attack", "forward", "striker", "wing", "delantero", "extremo"]) {
            PositionGroup::Attack
        } else if has(&["midfield", "medio", "centrocampista"]) {
            PositionGroup::Midfield
        } else if has(&["defen", "back", "defensa", "lateral", "central"]) {
            PositionGroup::Defender
        } else {
            PositionGroup::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PositionGroup::Goalkeeper => "Goalkeeper",
            PositionGroup::Defender => "Defender",
            PositionGroup::Midfield => "Midfield",
            PositionGroup::Attack => "Attack",
            PositionGroup::Unknown => "Unknown",
        }
    }
}

/// Commercial market bucket derived from nationality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NationalityMarket {
    SouthAmericanPremium,
    WesternEuropean,
    Other,
}

impl NationalityMarket {
    pub fn from_nationality(raw: &str) -> Self {
        let n = raw.trim().to_ascii_lowercase();
        if n.contains("brazil") || n.contains("brasil") || n.contains("argentin") {
            NationalityMarket::SouthAmericanPremium
        } else if n.contains("spain") || n.contains("españa") || n.contains("france") {
            NationalityMarket::WesternEuropean
        } else {
            NationalityMarket::Other
        }
    }
}

/// Player record as it arrives from the lookup/scrape layer. Every field is kept as a
/// loose JSON value because upstream sources disagree on types ("24", 24, "--").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayer {
    #[serde(default, alias = "player_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Value,
    #[serde(default)]
    pub height: Value,
    #[serde(default)]
    pub market_value: Value,
    #[serde(default)]
    pub position: Value,
    #[serde(default)]
    pub nationality: Value,
    #[serde(default)]
    pub foot: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttributes {
    pub name: Option<String>,
    pub age: u32,
    /// `None` when the source had no usable height; encoded as 180 cm.
    pub height_cm: Option<f64>,
    pub market_value: f64,
    #[serde(default)]
    pub market_value_estimated: bool,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub foot: Foot,
}

impl PlayerAttributes {
    pub fn new(
        age: u32,
        height_cm: f64,
        market_value: f64,
        position: &str,
        nationality: &str,
        foot: Foot,
    ) -> Self {
        Self {
            name: None,
            age,
            height_cm: (height_cm > 0.0).then_some(height_cm),
            market_value,
            market_value_estimated: false,
            position: known_label(position),
            nationality: known_label(nationality),
            foot,
        }
        .with_estimated_market_value()
    }

    /// Replace a zero market value with the profile estimate and flag it.
    pub fn with_estimated_market_value(mut self) -> Self {
        if self.market_value == 0.0 {
            self.market_value = estimate_market_value(self.age, self.position_group());
            self.market_value_estimated = true;
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_raw(raw: &RawPlayer) -> Result<Self> {
        let age = parse_age(&raw.age);
        let height_cm = parse_height(&raw.height);
        let position = value_label(&raw.position);
        let nationality = value_label(&raw.nationality);
        let foot = Foot::from_value(&raw.foot);

        let market_value = market_value_from(&raw.market_value)?.unwrap_or(0.0);

        let player = Self {
            name: raw
                .name
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            age,
            height_cm,
            market_value,
            market_value_estimated: false,
            position,
            nationality,
            foot,
        };
        Ok(player.with_estimated_market_value())
    }

    pub fn height_or_default(&self) -> f64 {
        self.height_cm.unwrap_or(DEFAULT_HEIGHT_CM)
    }

    pub fn position_group(&self) -> PositionGroup {
        self.position
            .as_deref()
            .map(PositionGroup::from_position)
            .unwrap_or(PositionGroup::Unknown)
    }

    pub fn nationality_market(&self) -> NationalityMarket {
        self.nationality
            .as_deref()
            .map(NationalityMarket::from_nationality)
            .unwrap_or(NationalityMarket::Other)
    }

    /// Count of missing critical fields (position, nationality, height).
    pub fn missing_critical_fields(&self) -> usize {
        [
            self.position.is_none(),
            self.nationality.is_none(),
            self.height_cm.is_none(),
        ]
        .iter()
        .filter(|missing| **missing)
        .count()
    }

    pub fn is_young(&self) -> bool {
        self.age < 23
    }

    pub fn is_veteran(&self) -> bool {
        self.age >= 30
    }

    pub fn value_millions(&self) -> f64 {
        self.market_value / 1_000_000.0
    }
}

/// Rough market value for players whose source had none, by age band and position.
pub fn estimate_market_value(age: u32, group: PositionGroup) -> f64 {
    let base: f64 = if age < 21 {
        5_000_000.0
    } else if age < 24 {
        8_000_000.0
    } else if age < 27 {
        10_000_000.0
    } else if age < 30 {
        7_000_000.0
    } else {
        3_000_000.0
    };
    let factor = match group {
        PositionGroup::Attack => 1.3,
        PositionGroup::Midfield => 1.2,
        PositionGroup::Defender => 0.9,
        PositionGroup::Goalkeeper => 0.7,
        PositionGroup::Unknown => 1.0,
    };
    (base * factor).round()
}

/// Parse market value strings like "€10.5m", "750k", "1.2bn", "10,000,000",
/// "10,00 Mio. €" or "500 Tsd. €".
pub fn parse_market_value(raw: &str) -> Option<f64> {
    let mut s = raw.trim().to_ascii_lowercase();
    for token in ["€", "eur", "$", "£", "+"] {
        s = s.replace(token, "");
    }
    let s = s.replace(' ', "");
    let s = s.trim_end_matches('.');
    if s.is_empty() || s == "-" || s == "--" {
        return None;
    }

    let suffixes: [(&str, f64); 9] = [
        ("bn", 1e9),
        ("mio", 1e6),
        ("mill", 1e6),
        ("tsd", 1e3),
        ("th", 1e3),
        ("b", 1e9),
        ("m", 1e6),
        ("k", 1e3),
        ("", 1.0),
    ];
    let (number, scale) = suffixes
        .iter()
        .find_map(|(suffix, scale)| s.strip_suffix(suffix).map(|n| (n, *scale)))?;
    let number = number.trim_end_matches('.');

    let value = normalize_separators(number, scale > 1.0).parse::<f64>().ok()?;
    Some(value * scale)
}

/// Turn thousands separators and decimal commas into a plain float literal.
fn normalize_separators(number: &str, scaled: bool) -> String {
    let last_comma = number.rfind(',');
    let last_dot = number.rfind('.');
    match (last_comma, last_dot) {
        // "1.500,50": dots group thousands, the comma is the decimal point.
        (Some(c), Some(d)) if c > d => number.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => number.replace(',', ""),
        (Some(c), None) => {
            let decimals = number.len() - c - 1;
            let single = number.matches(',').count() == 1;
            // "10,50m" is a decimal comma; "1,500k" groups thousands.
            if scaled && single && (1..=2).contains(&decimals) {
                number.replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
        (None, Some(_)) if number.matches('.').count() > 1 => number.replace('.', ""),
        _ => number.to_string(),
    }
}

fn market_value_from(value: &Value) -> Result<Option<f64>> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_market_value(s),
        _ => None,
    };
    match parsed {
        Some(v) if !v.is_finite() => Err(ValuationError::InvalidInput(format!(
            "market value is not finite: {value}"
        ))),
        Some(v) if v < 0.0 => Err(ValuationError::InvalidInput(format!(
            "market value must not be negative: {v}"
        ))),
        other => Ok(other),
    }
}

fn parse_age(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            // Profile pages render "Jun 24, 1999 (24)".
            let inner = match (s.rfind('('), s.rfind(')')) {
                (Some(open), Some(close)) if open < close => &s[open + 1..close],
                _ => s,
            };
            inner.trim().parse::<f64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(age) if age.is_finite() && age > 0.0 && age < 100.0 => age.trunc() as u32,
        _ => DEFAULT_AGE,
    }
}

fn parse_height(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s
                .trim()
                .trim_end_matches("cm")
                .trim_end_matches('m')
                .trim()
                .replace(',', ".");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return None;
    }
    // Some sources give metres.
    if parsed < 3.0 {
        Some((parsed * 100.0).round())
    } else {
        Some(parsed)
    }
}

fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => known_label(s),
        _ => None,
    }
}

fn known_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("unknown")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed == "--"
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawPlayer {
        serde_json::from_value(v).expect("raw player should deserialize")
    }

    #[test]
    fn parse_market_value_handles_suffixes() {
        assert_eq!(parse_market_value("€10.5m"), Some(10_500_000.0));
        assert_eq!(parse_market_value("750k"), Some(750_000.0));
        assert_eq!(parse_market_value("€1.2bn"), Some(1_200_000_000.0));
        assert_eq!(parse_market_value("10,000,000"), Some(10_000_000.0));
        assert_eq!(parse_market_value("10,50m"), Some(10_500_000.0));
        assert_eq!(parse_market_value("--"), None);
    }

    #[test]
    fn parse_market_value_handles_grouping_and_dotted_suffixes() {
        assert_eq!(parse_market_value("1,500k"), Some(1_500_000.0));
        assert_eq!(parse_market_value("10 mill."), Some(10_000_000.0));
        assert_eq!(parse_market_value("10,00 Mio. €"), Some(10_000_000.0));
        assert_eq!(parse_market_value("500 Tsd. €"), Some(500_000.0));
        assert_eq!(parse_market_value("1.500.000"), Some(1_500_000.0));
        assert_eq!(parse_market_value("2,5 Mio. €"), Some(2_500_000.0));
        assert_eq!(parse_market_value("800 Th."), Some(800_000.0));
        assert_eq!(parse_market_value("Mio."), None);
    }

    #[test]
    fn age_defaults_on_garbage() {
        let p = PlayerAttributes::from_raw(&raw(json!({"age": "--", "market_value": 1e6})))
            .unwrap();
        assert_eq!(p.age, DEFAULT_AGE);
        let p = PlayerAttributes::from_raw(&raw(json!({"age": "Jun 24, 1999 (24)"}))).unwrap();
        assert_eq!(p.age, 24);
        let p = PlayerAttributes::from_raw(&raw(json!({"age": 27.9}))).unwrap();
        assert_eq!(p.age, 27);
    }

    #[test]
    fn height_in_metres_is_converted() {
        let p = PlayerAttributes::from_raw(&raw(json!({"height": "1,85 m"}))).unwrap();
        assert_eq!(p.height_cm, Some(185.0));
        let p = PlayerAttributes::from_raw(&raw(json!({"height": 0}))).unwrap();
        assert_eq!(p.height_cm, None);
        assert_eq!(p.height_or_default(), DEFAULT_HEIGHT_CM);
    }

    #[test]
    fn missing_market_value_is_estimated() {
        let p = PlayerAttributes::from_raw(&raw(json!({"age": 22, "position": "Centre-Forward"})))
            .unwrap();
        assert!(p.market_value_estimated);
        assert_eq!(p.market_value, 10_400_000.0);
    }

    #[test]
    fn zero_market_value_is_estimated() {
        let p = PlayerAttributes::from_raw(&raw(json!({
            "age": 24, "market_value": 0, "position": "Attack"
        })))
        .unwrap();
        assert!(p.market_value_estimated);
        assert_eq!(p.market_value, 13_000_000.0);

        let p = PlayerAttributes::from_raw(&raw(json!({"age": 31, "market_value": "0"}))).unwrap();
        assert!(p.market_value_estimated);
        assert_eq!(p.market_value, 3_000_000.0);

        let p = PlayerAttributes::new(22, 180.0, 0.0, "Goalkeeper", "Spain", Foot::Right);
        assert!(p.market_value_estimated);
        assert_eq!(p.market_value, 5_600_000.0);

        let p = PlayerAttributes::new(22, 180.0, 1.0, "Goalkeeper", "Spain", Foot::Right);
        assert!(!p.market_value_estimated);
    }

    #[test]
    fn negative_market_value_is_rejected() {
        let err = PlayerAttributes::from_raw(&raw(json!({"market_value": -5}))).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidInput(_)));
    }

    #[test]
    fn unknown_labels_count_as_missing() {
        let p = PlayerAttributes::new(24, 0.0, 1e6, "Unknown", "", Foot::Right);
        assert_eq!(p.missing_critical_fields(), 3);
    }

    #[test]
    fn foot_accepts_bool_and_text() {
        let p = PlayerAttributes::from_raw(&raw(json!({"foot": false}))).unwrap();
        assert_eq!(p.foot, Foot::Left);
        let p = PlayerAttributes::from_raw(&raw(json!({"foot": "Both"}))).unwrap();
        assert_eq!(p.foot, Foot::Both);
        let p = PlayerAttributes::from_raw(&raw(json!({"foot": "?"}))).unwrap();
        assert_eq!(p.foot, Foot::Right);
    }

    #[test]
    fn position_groups() {
        assert_eq!(PositionGroup::from_position("Attacking Midfield"), PositionGroup::Attack);
        assert_eq!(PositionGroup::from_position("Defensive Midfield"), PositionGroup::Midfield);
        assert_eq!(PositionGroup::from_position("Left-Back"), PositionGroup::Defender);
        assert_eq!(PositionGroup::from_position("Goalkeeper"), PositionGroup::Goalkeeper);
    }
}
