use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

const ELITE_CLUBS: [&str; 7] = [
    "barcelona",
    "real madrid",
    "manchester city",
    "psg",
    "paris saint-germain",
    "bayern munich",
    "bayern",
];
const TOP_CLUBS: [&str; 9] = [
    "manchester united",
    "chelsea",
    "arsenal",
    "liverpool",
    "juventus",
    "inter",
    "milan",
    "atletico",
    "tottenham",
];
const GOOD_CLUBS: [&str; 8] = [
    "napoli",
    "roma",
    "sevilla",
    "leicester",
    "newcastle",
    "dortmund",
    "leipzig",
    "atalanta",
];

const STATIC_ELITE: [&str; 12] = [
    "real madrid",
    "barcelona",
    "manchester united",
    "manchester city",
    "chelsea",
    "arsenal",
    "liverpool",
    "bayern",
    "psg",
    "juventus",
    "milan",
    "inter",
];
const STATIC_TOP: [&str; 11] = [
    "tottenham",
    "atletico",
    "sevilla",
    "valencia",
    "roma",
    "napoli",
    "dortmund",
    "leipzig",
    "monaco",
    "lyon",
    "marseille",
];
const LOWER_DIVISION_TOKENS: [&str; 11] = [
    "b", "ii", "2", "reserve", "reserves", "youth", "academy", "u19", "u21", "u23", "juvenil",
];

const STATIC_ELITE_MULTIPLIER: f64 = 1.05;
const STATIC_TOP_MULTIPLIER: f64 = 1.02;
const STATIC_LOWER_MULTIPLIER: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClubTier {
    Elite,
    Top,
    Good,
    #[default]
    Default,
}

impl ClubTier {
    pub fn code(self) -> f64 {
        match self {
            ClubTier::Elite => 3.0,
            ClubTier::Top => 2.0,
            ClubTier::Good => 1.0,
            ClubTier::Default => 0.0,
        }
    }

    pub fn builtin_multiplier(self) -> f64 {
        match self {
            ClubTier::Elite => 1.4,
            ClubTier::Top => 1.2,
            ClubTier::Good => 1.1,
            ClubTier::Default => 1.0,
        }
    }

    pub fn from_base_multiplier(base: f64) -> Self {
        if base >= 1.3 {
            ClubTier::Elite
        } else if base >= 1.15 {
            ClubTier::Top
        } else if base >= 1.05 {
            ClubTier::Good
        } else {
            ClubTier::Default
        }
    }
}

impl fmt::Display for ClubTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClubTier::Elite => "elite",
            ClubTier::Top => "top",
            ClubTier::Good => "good",
            ClubTier::Default => "default",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubIdentity {
    pub name: String,
    pub tier: ClubTier,
    pub base_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubEntry {
    pub name: String,
    pub base_multiplier: f64,
    pub tier: ClubTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClubRecord {
    club_name: String,
    final_multiplier: f64,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Exact,
    Substring,
    StaticFallback,
    Unspecified,
}

/// Resolved multiplier for one (club, player value) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubMultiplier {
    pub club: ClubIdentity,
    pub base: f64,
    pub bracket: f64,
    pub value: f64,
    pub source: MatchSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
}

impl ClubMultiplier {
    pub fn neutral() -> Self {
        Self {
            club: ClubIdentity {
                name: String::new(),
                tier: ClubTier::Default,
                base_multiplier: 1.0,
            },
            base: 1.0,
            bracket: 1.0,
            value: 1.0,
            source: MatchSource::Unspecified,
            matched_name: None,
        }
    }
}

/// Player-value bracket factor. Clubs found in the table use the narrow known-club
/// brackets; the static fallback uses the wider, more conservative ones.
pub fn value_bracket_multiplier(player_value: f64, known_club: bool) -> f64 {
    const KNOWN: [f64; 6] = [0.95, 0.98, 1.0, 1.01, 1.02, 1.03];
    const UNKNOWN: [f64; 6] = [0.7, 0.8, 0.9, 0.95, 1.0, 1.1];
    let brackets = if known_club { KNOWN } else { UNKNOWN };
    let idx = if player_value >= 100_000_000.0 {
        0
    } else if player_value >= 50_000_000.0 {
        1
    } else if player_value >= 20_000_000.0 {
        2
    } else if player_value >= 5_000_000.0 {
        3
    } else if player_value >= 1_000_000.0 {
        4
    } else {
        5
    };
    brackets[idx]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOrigin {
    Builtin,
    Csv(String),
}

impl fmt::Display for TableOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOrigin::Builtin => f.write_str("builtin"),
            TableOrigin::Csv(path) => write!(f, "csv:{path}"),
        }
    }
}

/// Club name -> base multiplier, indexed by normalized name.
#[derive(Debug, Clone)]
pub struct ClubMultiplierTable {
    entries: Vec<ClubEntry>,
    norms: Vec<String>,
    by_norm: HashMap<String, usize>,
    origin: TableOrigin,
}

impl ClubMultiplierTable {
    pub fn new(entries: Vec<ClubEntry>, origin: TableOrigin) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(entries.len()),
            norms: Vec::with_capacity(entries.len()),
            by_norm: HashMap::with_capacity(entries.len()),
            origin,
        };
        for entry in entries {
            let norm = normalize_club_name(&entry.name);
            if norm.is_empty() || table.by_norm.contains_key(&norm) {
                debug!(club = %entry.name, "skipping empty or duplicate club entry");
                continue;
            }
            table.by_norm.insert(norm.clone(), table.entries.len());
            table.norms.push(norm);
            table.entries.push(entry);
        }
        table
    }

    pub fn builtin() -> Self {
        let tiers = [
            (ClubTier::Elite, &ELITE_CLUBS[..]),
            (ClubTier::Top, &TOP_CLUBS[..]),
            (ClubTier::Good, &GOOD_CLUBS[..]),
        ];
        let entries = tiers
            .iter()
            .flat_map(|(tier, names)| {
                names.iter().map(move |name| ClubEntry {
                    name: (*name).to_string(),
                    base_multiplier: tier.builtin_multiplier(),
                    tier: *tier,
                    category: None,
                })
            })
            .collect();
        Self::new(entries, TableOrigin::Builtin)
    }

    /// Read `club_name,final_multiplier[,category]` rows. Rows with a non-positive or
    /// non-finite multiplier are skipped.
    pub fn from_csv_reader<R: Read>(reader: R, origin: TableOrigin) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = Vec::new();
        for record in rdr.deserialize::<ClubRecord>() {
            let record = record?;
            if !record.final_multiplier.is_finite() || record.final_multiplier <= 0.0 {
                warn!(
                    club = %record.club_name,
                    multiplier = record.final_multiplier,
                    "ignoring club with unusable multiplier"
                );
                continue;
            }
            entries.push(ClubEntry {
                tier: ClubTier::from_base_multiplier(record.final_multiplier),
                name: record.club_name,
                base_multiplier: record.final_multiplier,
                category: record.category.filter(|c| !c.is_empty()),
            });
        }
        Ok(Self::new(entries, origin))
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, TableOrigin::Csv(path.display().to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn origin(&self) -> &TableOrigin {
        &self.origin
    }

    pub fn entries(&self) -> &[ClubEntry] {
        &self.entries
    }

    pub fn multiplier_for(&self, club_name: &str, player_value: f64) -> f64 {
        self.resolve(club_name, player_value).value
    }

    /// Exact normalized match, then token substring match in either direction, then
    /// the static name lists.
    pub fn resolve(&self, club_name: &str, player_value: f64) -> ClubMultiplier {
        let norm = normalize_club_name(club_name);
        if norm.is_empty() {
            return ClubMultiplier::neutral();
        }

        let (idx, source) = match self.by_norm.get(&norm) {
            Some(idx) => (Some(*idx), MatchSource::Exact),
            None => (self.substring_match(&norm), MatchSource::Substring),
        };

        let resolved = match idx.and_then(|i| self.entries.get(i)) {
            Some(entry) => {
                let bracket = value_bracket_multiplier(player_value, true);
                ClubMultiplier {
                    club: ClubIdentity {
                        name: club_name.trim().to_string(),
                        tier: entry.tier,
                        base_multiplier: entry.base_multiplier,
                    },
                    base: entry.base_multiplier,
                    bracket,
                    value: entry.base_multiplier * bracket,
                    source,
                    matched_name: Some(entry.name.clone()),
                }
            }
            None => static_fallback(club_name, &norm, player_value),
        };
        debug!(
            club = club_name,
            source = ?resolved.source,
            base = resolved.base,
            bracket = resolved.bracket,
            value = resolved.value,
            "club multiplier resolved"
        );
        resolved
    }

    fn substring_match(&self, norm: &str) -> Option<usize> {
        let query: Vec<&str> = norm.split('_').collect();
        let mut best: Option<(usize, usize)> = None;
        for (idx, entry_norm) in self.norms.iter().enumerate() {
            let entry: Vec<&str> = entry_norm.split('_').collect();
            let hit = contains_tokens(&query, &entry)
                || (norm.len() >= 3 && contains_tokens(&entry, &query));
            if hit && best.is_none_or(|(_, len)| entry_norm.len() > len) {
                best = Some((idx, entry_norm.len()));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

impl Default for ClubMultiplierTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn static_fallback(club_name: &str, norm: &str, player_value: f64) -> ClubMultiplier {
    let tokens: Vec<&str> = norm.split('_').collect();
    let listed = |names: &'static [&'static str]| -> Option<&'static &'static str> {
        names.iter().find(|name| {
            let name_norm = normalize_club_name(name);
            let needle: Vec<&str> = name_norm.split('_').collect();
            contains_tokens(&tokens, &needle)
        })
    };

    let (tier, base, matched) = if let Some(name) = listed(&STATIC_ELITE) {
        (ClubTier::Elite, STATIC_ELITE_MULTIPLIER, Some(*name))
    } else if let Some(name) = listed(&STATIC_TOP) {
        (ClubTier::Top, STATIC_TOP_MULTIPLIER, Some(*name))
    } else if tokens.iter().any(|t| LOWER_DIVISION_TOKENS.contains(t)) {
        (ClubTier::Default, STATIC_LOWER_MULTIPLIER, None)
    } else {
        (ClubTier::Default, 1.0, None)
    };

    let bracket = value_bracket_multiplier(player_value, false);
    ClubMultiplier {
        club: ClubIdentity {
            name: club_name.trim().to_string(),
            tier,
            base_multiplier: base,
        },
        base,
        bracket,
        value: base * bracket,
        source: MatchSource::StaticFallback,
        matched_name: matched.map(str::to_string),
    }
}

/// True when `needle` appears as a contiguous run of tokens in `haystack`.
fn contains_tokens(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Lowercase, fold common accents, collapse everything non-alphanumeric to `_`.
pub fn normalize_club_name(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut prev_us = false;
    for ch in lower.chars() {
        let mapped = match fold_accent(ch) {
            c if c.is_ascii_alphanumeric() => Some(c),
            '&' => Some('a'),
            _ => None,
        };

        if let Some(c) = mapped {
            out.push(c);
            prev_us = false;
        } else if !prev_us && !out.is_empty() {
            out.push('_');
            prev_us = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_accents_and_punctuation() {
        assert_eq!(normalize_club_name("  Atlético de Madrid "), "atletico_de_madrid");
        assert_eq!(normalize_club_name("Paris Saint-Germain"), "paris_saint_germain");
        assert_eq!(normalize_club_name("Bayern München"), "bayern_munchen");
        assert_eq!(normalize_club_name("--"), "");
    }

    #[test]
    fn known_brackets_are_exact_and_non_increasing() {
        let values = [150e6, 100e6, 60e6, 50e6, 25e6, 20e6, 7e6, 5e6, 2e6, 1e6, 5e5];
        let got: Vec<f64> = values
            .iter()
            .map(|v| value_bracket_multiplier(*v, true))
            .collect();
        assert_eq!(
            got,
            vec![0.95, 0.95, 0.98, 0.98, 1.0, 1.0, 1.01, 1.01, 1.02, 1.02, 1.03]
        );
        assert!(got.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unknown_brackets_are_more_conservative() {
        assert_eq!(value_bracket_multiplier(120e6, false), 0.7);
        assert_eq!(value_bracket_multiplier(60e6, false), 0.8);
        assert_eq!(value_bracket_multiplier(30e6, false), 0.9);
        assert_eq!(value_bracket_multiplier(6e6, false), 0.95);
        assert_eq!(value_bracket_multiplier(2e6, false), 1.0);
        assert_eq!(value_bracket_multiplier(1e5, false), 1.1);
    }

    #[test]
    fn exact_then_substring_match() {
        let table = ClubMultiplierTable::builtin();
        let exact = table.resolve("Real Madrid", 10e6);
        assert_eq!(exact.source, MatchSource::Exact);
        assert_eq!(exact.club.tier, ClubTier::Elite);
        assert_eq!(exact.bracket, 1.01);

        let sub = table.resolve("FC Barcelona", 10e6);
        assert_eq!(sub.source, MatchSource::Substring);
        assert_eq!(sub.matched_name.as_deref(), Some("barcelona"));
        assert!((sub.value - 1.4 * 1.01).abs() < 1e-12);

        // Query inside a table name.
        let short = table.resolve("Madrid", 10e6);
        assert_eq!(short.matched_name.as_deref(), Some("real madrid"));
    }

    #[test]
    fn longest_match_wins_and_tokens_must_align() {
        let table = ClubMultiplierTable::builtin();
        let m = table.resolve("FC Bayern Munich", 10e6);
        assert_eq!(m.matched_name.as_deref(), Some("bayern munich"));

        // "inter" must not match inside "internacional".
        let m = table.resolve("SC Internacional", 10e6);
        assert_eq!(m.source, MatchSource::StaticFallback);
    }

    #[test]
    fn static_fallback_uses_conservative_brackets() {
        let table = ClubMultiplierTable::new(Vec::new(), TableOrigin::Builtin);
        let m = table.resolve("Olympique Lyon", 10e6);
        assert_eq!(m.source, MatchSource::StaticFallback);
        assert_eq!(m.club.tier, ClubTier::Top);
        assert!((m.value - 1.02 * 0.95).abs() < 1e-12);

        let reserves = table.resolve("Barcelona B", 500_000.0);
        // The elite list is checked first.
        assert_eq!(reserves.club.tier, ClubTier::Elite);

        let lower = table.resolve("Villarreal B", 500_000.0);
        assert!((lower.value - 0.9 * 1.1).abs() < 1e-12);

        let plain = table.resolve("Brentford", 30e6);
        assert!((plain.value - 0.9).abs() < 1e-12);
    }

    #[test]
    fn empty_name_is_neutral() {
        let table = ClubMultiplierTable::builtin();
        let m = table.resolve("   ", 10e6);
        assert_eq!(m.value, 1.0);
        assert_eq!(m.source, MatchSource::Unspecified);
    }

    #[test]
    fn csv_rows_derive_tier_and_skip_bad_multipliers() {
        let csv = "club_name,final_multiplier,category\n\
                   Ajax,1.16,Top\n\
                   Broken FC,0,Unknown\n\
                   Real Sociedad,1.07,\n";
        let table =
            ClubMultiplierTable::from_csv_reader(csv.as_bytes(), TableOrigin::Builtin).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[0].tier, ClubTier::Top);
        assert_eq!(table.entries()[0].category.as_deref(), Some("Top"));
        assert_eq!(table.entries()[1].tier, ClubTier::Good);
        assert_eq!(table.entries()[1].category, None);
    }
}
