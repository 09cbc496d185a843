use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::club_multiplier::{ClubIdentity, ClubTier};
use crate::model_artifact::ModelFamily;
use crate::player::PlayerAttributes;

pub const PRICE_V14_FEATURES: [&str; 14] = [
    "age",
    "height_cm",
    "market_value",
    "position_code",
    "nationality_code",
    "foot_code",
    "sqrt_market_value",
    "age_squared",
    "log1p_market_value",
    "value_m",
    "age_x_value_m",
    "position_x_value_m",
    "is_young",
    "is_veteran",
];

pub const VALUE_CHANGE_V19_FEATURES: [&str; 19] = [
    "age",
    "height_cm",
    "market_value",
    "position_code",
    "nationality_code",
    "foot_code",
    "sqrt_market_value",
    "age_squared",
    "age_cubed",
    "height_m",
    "log1p_market_value",
    "value_m",
    "age_x_value_m",
    "position_x_nationality",
    "position_x_value_m",
    "height_x_age",
    "is_young",
    "is_veteran",
    "is_prime",
];

pub const PRICE_V12_FEATURES: [&str; 12] = [
    "age",
    "height_cm",
    "value_m",
    "position_code",
    "nationality_code",
    "foot_code",
    "log1p_market_value",
    "age_squared",
    "height_m",
    "age_x_value_m",
    "is_young",
    "is_veteran",
];

pub const VALUE_CHANGE_V18_FEATURES: [&str; 18] = [
    "age",
    "height_cm",
    "value_m",
    "position_code",
    "nationality_code",
    "foot_code",
    "log1p_market_value",
    "age_squared",
    "age_cubed",
    "height_m",
    "age_x_value_m",
    "position_x_nationality",
    "club_tier_code",
    "club_base_multiplier",
    "is_elite_club",
    "is_top_club",
    "is_good_club",
    "club_multiplier_x_value_m",
];

/// Versioned feature layout. An artifact names the schema it was trained on and the
/// encoder produces exactly that layout; vectors are never padded or truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    PriceV12,
    PriceV14,
    ValueChangeV18,
    ValueChangeV19,
}

impl FeatureSchema {
    pub const ALL: [FeatureSchema; 4] = [
        FeatureSchema::PriceV12,
        FeatureSchema::PriceV14,
        FeatureSchema::ValueChangeV18,
        FeatureSchema::ValueChangeV19,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureSchema::PriceV12 => "price_v12",
            FeatureSchema::PriceV14 => "price_v14",
            FeatureSchema::ValueChangeV18 => "value_change_v18",
            FeatureSchema::ValueChangeV19 => "value_change_v19",
        }
    }

    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            FeatureSchema::PriceV12 => &PRICE_V12_FEATURES,
            FeatureSchema::PriceV14 => &PRICE_V14_FEATURES,
            FeatureSchema::ValueChangeV18 => &VALUE_CHANGE_V18_FEATURES,
            FeatureSchema::ValueChangeV19 => &VALUE_CHANGE_V19_FEATURES,
        }
    }

    pub fn feature_count(self) -> usize {
        self.feature_names().len()
    }

    pub fn family(self) -> ModelFamily {
        match self {
            FeatureSchema::PriceV12 | FeatureSchema::PriceV14 => ModelFamily::MaximumPrice,
            FeatureSchema::ValueChangeV18 | FeatureSchema::ValueChangeV19 => {
                ModelFamily::ValueChange
            }
        }
    }

    pub fn uses_club(self) -> bool {
        matches!(self, FeatureSchema::ValueChangeV18)
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    Position,
    Nationality,
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryField::Position => f.write_str("position"),
            CategoryField::Nationality => f.write_str("nationality"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeWarning {
    /// Label absent from the fitted classes; encoded as code 0.
    UnseenCategory { field: CategoryField, value: String },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeWarning::UnseenCategory { field, value } => {
                write!(f, "unseen {field} '{value}' encoded as 0")
            }
        }
    }
}

/// Fitted label encoder: the code of a label is its index in `classes`.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    classes: Vec<String>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        let mut exact = HashMap::with_capacity(classes.len());
        let mut folded = HashMap::with_capacity(classes.len());
        for (idx, class) in classes.iter().enumerate() {
            exact.entry(class.clone()).or_insert(idx);
            folded.entry(fold(class)).or_insert(idx);
        }
        Self {
            classes,
            exact,
            folded,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Exact class match first, then a case/whitespace-insensitive one.
    pub fn transform(&self, label: &str) -> Option<usize> {
        self.exact
            .get(label)
            .or_else(|| self.folded.get(&fold(label)))
            .copied()
    }

    fn code_for(
        &self,
        field: CategoryField,
        label: Option<&str>,
        warnings: &mut Vec<EncodeWarning>,
    ) -> f64 {
        match label {
            Some(label) => match self.transform(label) {
                Some(code) => code as f64,
                None => {
                    warnings.push(EncodeWarning::UnseenCategory {
                        field,
                        value: label.to_string(),
                    });
                    0.0
                }
            },
            // Missing labels were trained as "Unknown" when that class exists.
            None => self.transform("Unknown").unwrap_or(0) as f64,
        }
    }
}

fn fold(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct CategoryEncoders {
    pub position: LabelEncoder,
    pub nationality: LabelEncoder,
}

impl CategoryEncoders {
    pub fn from_classes(position: Vec<String>, nationality: Vec<String>) -> Self {
        Self {
            position: LabelEncoder::new(position),
            nationality: LabelEncoder::new(nationality),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    pub schema: FeatureSchema,
    pub values: Vec<f64>,
    pub warnings: Vec<EncodeWarning>,
}

impl EncodedFeatures {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .feature_names()
            .iter()
            .position(|n| *n == name)
            .and_then(|idx| self.values.get(idx).copied())
    }
}

/// Build the feature vector for `schema`. Club terms are only read by club-aware
/// schemas; without a club they take the default tier.
pub fn encode(
    schema: FeatureSchema,
    player: &PlayerAttributes,
    encoders: &CategoryEncoders,
    club: Option<&ClubIdentity>,
) -> EncodedFeatures {
    let mut warnings = Vec::new();
    let position = encoders.position.code_for(
        CategoryField::Position,
        player.position.as_deref(),
        &mut warnings,
    );
    let nationality = encoders.nationality.code_for(
        CategoryField::Nationality,
        player.nationality.as_deref(),
        &mut warnings,
    );
    for w in &warnings {
        warn!(schema = %schema, "{w}");
    }

    let age = f64::from(player.age);
    let height = player.height_or_default();
    let mv = player.market_value.max(0.0);
    let value_m = mv / 1_000_000.0;
    let foot = player.foot.code();
    let log_mv = mv.ln_1p();
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let is_young = flag(player.age < 23);
    let is_veteran = flag(player.age >= 30);
    let is_prime = flag((23..30).contains(&player.age));

    let values = match schema {
        FeatureSchema::PriceV14 => vec![
            age,
            height,
            mv,
            position,
            nationality,
            foot,
            mv.sqrt(),
            age * age,
            log_mv,
            value_m,
            age * value_m,
            position * value_m,
            is_young,
            is_veteran,
        ],
        FeatureSchema::ValueChangeV19 => vec![
            age,
            height,
            mv,
            position,
            nationality,
            foot,
            mv.sqrt(),
            age * age,
            age * age * age,
            height / 100.0,
            log_mv,
            value_m,
            age * value_m,
            position * nationality,
            position * value_m,
            height * age,
            is_young,
            is_veteran,
            is_prime,
        ],
        FeatureSchema::PriceV12 => vec![
            age,
            height,
            value_m,
            position,
            nationality,
            foot,
            log_mv,
            age * age,
            height / 100.0,
            age * value_m,
            is_young,
            is_veteran,
        ],
        FeatureSchema::ValueChangeV18 => {
            let (tier, base) = club
                .map(|c| (c.tier, c.base_multiplier))
                .unwrap_or((ClubTier::Default, 1.0));
            vec![
                age,
                height,
                value_m,
                position,
                nationality,
                foot,
                log_mv,
                age * age,
                age * age * age,
                height / 100.0,
                age * value_m,
                position * nationality,
                tier.code(),
                base,
                flag(tier == ClubTier::Elite),
                flag(tier == ClubTier::Top),
                flag(tier == ClubTier::Good),
                base * value_m,
            ]
        }
    };
    debug_assert_eq!(values.len(), schema.feature_count());

    EncodedFeatures {
        schema,
        values,
        warnings,
    }
}
