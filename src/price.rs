use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Marker written to the sheet when no price could be obtained.
pub const ERROR_MARKER: &str = "ERROR";

static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("parenthesized group pattern"));
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run pattern"));

/// Price per unit of weight, in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPrice {
    Found(u64),
    NotFound,
}

impl UnitPrice {
    pub fn is_found(&self) -> bool {
        matches!(self, UnitPrice::Found(_))
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitPrice::Found(v) => write!(f, "{}", v),
            UnitPrice::NotFound => f.write_str(ERROR_MARKER),
        }
    }
}

/// How the digit runs inside the parenthesized group become one number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitStrategy {
    /// `"4.975"` reads as 4975. Thousands separators in the retailer's
    /// comparison label are dots, so every run belongs to the same number.
    #[default]
    ConcatenateAllDigitGroups,
    /// `"4.975"` reads as 4.
    FirstDigitGroupOnly,
}

impl DigitStrategy {
    fn combine(&self, runs: &[&str]) -> Option<u64> {
        let digits = match self {
            DigitStrategy::ConcatenateAllDigitGroups => runs.concat(),
            DigitStrategy::FirstDigitGroupOnly => runs.first()?.to_string(),
        };
        // Overflow is a miss, not a fault.
        digits.parse().ok()
    }
}

/// Turns the text of a comparison-price label such as `"$1.990 (x kg $4.975)"`
/// into a [`UnitPrice`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceExtractor {
    strategy: DigitStrategy,
}

impl PriceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: DigitStrategy) -> Self {
        Self { strategy }
    }

    pub fn extract(&self, text: &str) -> UnitPrice {
        let Some(group) = PAREN_GROUP.captures(text).and_then(|c| c.get(1)) else {
            return UnitPrice::NotFound;
        };

        let runs: Vec<&str> = DIGIT_RUN
            .find_iter(group.as_str())
            .map(|m| m.as_str())
            .collect();
        if runs.is_empty() {
            return UnitPrice::NotFound;
        }

        match self.strategy.combine(&runs) {
            Some(value) => UnitPrice::Found(value),
            None => UnitPrice::NotFound,
        }
    }
}
