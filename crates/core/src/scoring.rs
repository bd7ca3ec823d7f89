//! Program viability scoring engine.
//!
//! Seven weighted dimensions roll up into a composite score on a 1-10 scale,
//! which maps to one of five recommendation tiers. Three hard override rules
//! can then lower the tier based on a single critical dimension. Historical
//! scores depend on these thresholds, so they must not drift.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Composite score at or above which the base tier is "Strong Go".
pub const STRONG_GO_MIN: f64 = 8.0;
/// Composite score at or above which the base tier is "Conditional Go".
pub const CONDITIONAL_GO_MIN: f64 = 6.5;
/// Composite score at or above which the base tier is "Cautious Proceed".
pub const CAUTIOUS_PROCEED_MIN: f64 = 5.0;
/// Composite score at or above which the base tier is "Defer".
pub const DEFER_MIN: f64 = 3.5;

/// A dimension scoring at or below this caps a "Strong Go" at "Conditional Go".
pub const WEAK_DIMENSION_MAX: f64 = 3.0;
/// Financial Viability or Labor Market Demand below this forces Defer / No Go.
pub const CRITICAL_DIMENSION_FLOOR: f64 = 4.0;

/// Lowest allowed dimension score.
pub const MIN_SCORE: f64 = 1.0;
/// Highest allowed dimension score.
pub const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

/// One of the seven fixed scoring dimensions.
///
/// Serialized by its display label so stored `agent_scores` maps stay
/// readable and compatible with earlier runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "Labor Market Demand")]
    LaborMarketDemand,
    #[serde(rename = "Financial Viability")]
    FinancialViability,
    #[serde(rename = "Employer Demand & Partnerships")]
    EmployerDemand,
    #[serde(rename = "Target Learner Demand")]
    TargetLearnerDemand,
    #[serde(rename = "Competitive Landscape")]
    CompetitiveLandscape,
    #[serde(rename = "Institutional Fit & Capacity")]
    InstitutionalFit,
    #[serde(rename = "Regulatory & Compliance")]
    Regulatory,
}

impl Dimension {
    /// Every dimension, in weight order.
    pub const ALL: [Dimension; 7] = [
        Self::LaborMarketDemand,
        Self::FinancialViability,
        Self::EmployerDemand,
        Self::TargetLearnerDemand,
        Self::CompetitiveLandscape,
        Self::InstitutionalFit,
        Self::Regulatory,
    ];

    /// Human-readable label, also used as the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            Self::LaborMarketDemand => "Labor Market Demand",
            Self::FinancialViability => "Financial Viability",
            Self::EmployerDemand => "Employer Demand & Partnerships",
            Self::TargetLearnerDemand => "Target Learner Demand",
            Self::CompetitiveLandscape => "Competitive Landscape",
            Self::InstitutionalFit => "Institutional Fit & Capacity",
            Self::Regulatory => "Regulatory & Compliance",
        }
    }

    /// Snake-case key accepted as an alternative spelling when parsing.
    pub fn key(self) -> &'static str {
        match self {
            Self::LaborMarketDemand => "labor_market_demand",
            Self::FinancialViability => "financial_viability",
            Self::EmployerDemand => "employer_demand",
            Self::TargetLearnerDemand => "target_learner_demand",
            Self::CompetitiveLandscape => "competitive_landscape",
            Self::InstitutionalFit => "institutional_fit",
            Self::Regulatory => "regulatory",
        }
    }

    /// Fixed weight of this dimension in the composite. Weights sum to 1.0.
    pub fn weight(self) -> f64 {
        match self {
            Self::LaborMarketDemand => 0.25,
            Self::FinancialViability => 0.20,
            Self::EmployerDemand => 0.15,
            Self::TargetLearnerDemand => 0.15,
            Self::CompetitiveLandscape => 0.10,
            Self::InstitutionalFit => 0.10,
            Self::Regulatory => 0.05,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Dimension {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(wanted) || d.key() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|d| d.label()).collect();
                CoreError::Validation(format!(
                    "Unknown dimension: {wanted}. Valid dimensions: {}",
                    valid.join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Recommendation tier, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Go")]
    StrongGo,
    #[serde(rename = "Conditional Go")]
    ConditionalGo,
    #[serde(rename = "Cautious Proceed")]
    CautiousProceed,
    #[serde(rename = "Defer")]
    Defer,
    #[serde(rename = "No Go")]
    NoGo,
}

impl Recommendation {
    /// Base tier for an (unrounded) composite score.
    pub fn from_composite(composite: f64) -> Self {
        if composite >= STRONG_GO_MIN {
            Self::StrongGo
        } else if composite >= CONDITIONAL_GO_MIN {
            Self::ConditionalGo
        } else if composite >= CAUTIOUS_PROCEED_MIN {
            Self::CautiousProceed
        } else if composite >= DEFER_MIN {
            Self::Defer
        } else {
            Self::NoGo
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::StrongGo => "Strong Go",
            Self::ConditionalGo => "Conditional Go",
            Self::CautiousProceed => "Cautious Proceed",
            Self::Defer => "Defer",
            Self::NoGo => "No Go",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Value objects
// ---------------------------------------------------------------------------

/// One dimension's score with its fixed weight and the agent's rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Clamped to `[MIN_SCORE, MAX_SCORE]`.
    pub score: f64,
    pub weight: f64,
    pub rationale: String,
}

impl DimensionScore {
    /// Build a score for a known dimension, clamping `raw_score` into range.
    ///
    /// Non-finite scores are rejected rather than clamped.
    pub fn new(
        dimension: Dimension,
        raw_score: f64,
        rationale: impl Into<String>,
    ) -> Result<Self, CoreError> {
        if !raw_score.is_finite() {
            return Err(CoreError::Validation(format!(
                "Score for {dimension} must be a finite number, got {raw_score}"
            )));
        }
        Ok(Self {
            dimension,
            score: raw_score.clamp(MIN_SCORE, MAX_SCORE),
            weight: dimension.weight(),
            rationale: rationale.into(),
        })
    }
}

/// Build a [`DimensionScore`] from a dimension name as reported by an agent.
///
/// Unknown names are an error, never a silent default.
pub fn score_dimension(
    dimension: &str,
    raw_score: f64,
    rationale: impl Into<String>,
) -> Result<DimensionScore, CoreError> {
    let dimension: Dimension = dimension.parse()?;
    DimensionScore::new(dimension, raw_score, rationale)
}

/// Final scored result for a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramScore {
    pub dimensions: Vec<DimensionScore>,
    /// Weighted sum rounded to one decimal.
    pub composite_score: f64,
    pub recommendation: Recommendation,
    pub override_applied: bool,
    /// Reason of the last override that fired.
    pub override_reason: Option<String>,
    /// Follow-up actions required before launch.
    pub conditions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Score a program from its dimension scores.
///
/// Tier thresholds and the Defer / No Go split are evaluated against the
/// unrounded composite; only the reported `composite_score` is rounded.
///
/// Override A (any dimension <= 3) only fires when the base tier is
/// "Strong Go". Overrides B (Financial Viability < 4) and C (Labor Market
/// Demand < 4) fire regardless of the base tier, and a later override's
/// reason replaces an earlier one.
pub fn calculate_program_score(dimensions: Vec<DimensionScore>) -> ProgramScore {
    let composite: f64 = dimensions.iter().map(|d| d.score * d.weight).sum();
    let base = Recommendation::from_composite(composite);

    let mut recommendation = base;
    let mut override_applied = false;
    let mut override_reason = None;
    let mut conditions = Vec::new();

    // Override A: a weak dimension caps a Strong Go.
    if base == Recommendation::StrongGo {
        if let Some(weakest) = weakest_at_or_below(&dimensions, WEAK_DIMENSION_MAX) {
            recommendation = Recommendation::ConditionalGo;
            override_applied = true;
            override_reason = Some(format!(
                "{} scored {}/10, capping recommendation at Conditional Go",
                weakest.dimension, weakest.score
            ));
            conditions.push(format!(
                "Address weakness in {} before proceeding",
                weakest.dimension
            ));
        }
    }

    // Override B: no launch without a viable financial model.
    if let Some(financial) = find_below_floor(&dimensions, Dimension::FinancialViability) {
        recommendation = floor_tier(composite);
        override_applied = true;
        override_reason = Some(format!(
            "Financial Viability scored {}/10; programs cannot launch without a viable financial model",
            financial.score
        ));
    }

    // Override C: there must be jobs for completers.
    if let Some(labor) = find_below_floor(&dimensions, Dimension::LaborMarketDemand) {
        recommendation = floor_tier(composite);
        override_applied = true;
        override_reason = Some(format!(
            "Labor Market Demand scored {}/10; there must be jobs for completers",
            labor.score
        ));
    }

    ProgramScore {
        dimensions,
        composite_score: round_one_decimal(composite),
        recommendation,
        override_applied,
        override_reason,
        conditions,
    }
}

/// Tier forced by a critical-dimension override.
fn floor_tier(composite: f64) -> Recommendation {
    if composite >= DEFER_MIN {
        Recommendation::Defer
    } else {
        Recommendation::NoGo
    }
}

/// Lowest-scoring dimension at or below `max`; ties keep the earliest entry.
fn weakest_at_or_below(dimensions: &[DimensionScore], max: f64) -> Option<&DimensionScore> {
    dimensions
        .iter()
        .filter(|d| d.score <= max)
        .fold(None, |weakest: Option<&DimensionScore>, d| match weakest {
            Some(w) if w.score <= d.score => Some(w),
            _ => Some(d),
        })
}

fn find_below_floor(dimensions: &[DimensionScore], dimension: Dimension) -> Option<&DimensionScore> {
    dimensions
        .iter()
        .find(|d| d.dimension == dimension)
        .filter(|d| d.score < CRITICAL_DIMENSION_FLOOR)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores in `Dimension::ALL` order.
    fn dims(scores: [f64; 7]) -> Vec<DimensionScore> {
        Dimension::ALL
            .into_iter()
            .zip(scores)
            .map(|(d, s)| DimensionScore::new(d, s, "rationale").unwrap())
            .collect()
    }

    // -- Weights and parsing --

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = Dimension::ALL.iter().map(|d| d.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn parse_accepts_label_and_key() {
        assert_eq!(
            "Financial Viability".parse::<Dimension>().unwrap(),
            Dimension::FinancialViability
        );
        assert_eq!(
            "labor_market_demand".parse::<Dimension>().unwrap(),
            Dimension::LaborMarketDemand
        );
        assert_eq!(
            "regulatory & compliance".parse::<Dimension>().unwrap(),
            Dimension::Regulatory
        );
    }

    #[test]
    fn unknown_dimension_is_rejected() {
        let err = score_dimension("Vibes", 7.0, "").unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref m) if m.contains("Unknown dimension: Vibes")));
    }

    #[test]
    fn score_is_clamped_into_range() {
        let high = score_dimension("Competitive Landscape", 14.0, "").unwrap();
        let low = score_dimension("Competitive Landscape", -2.0, "").unwrap();
        assert_eq!(high.score, 10.0);
        assert_eq!(low.score, 1.0);
        assert_eq!(high.weight, 0.10);
    }

    #[test]
    fn non_finite_score_is_rejected() {
        assert!(DimensionScore::new(Dimension::Regulatory, f64::NAN, "").is_err());
    }

    #[test]
    fn dimension_serializes_as_label() {
        let json = serde_json::to_string(&Dimension::EmployerDemand).unwrap();
        assert_eq!(json, "\"Employer Demand & Partnerships\"");
    }

    // -- Base tiers --

    #[test]
    fn base_tier_boundaries() {
        assert_eq!(Recommendation::from_composite(8.0), Recommendation::StrongGo);
        assert_eq!(Recommendation::from_composite(7.99), Recommendation::ConditionalGo);
        assert_eq!(Recommendation::from_composite(6.5), Recommendation::ConditionalGo);
        assert_eq!(Recommendation::from_composite(5.0), Recommendation::CautiousProceed);
        assert_eq!(Recommendation::from_composite(3.5), Recommendation::Defer);
        assert_eq!(Recommendation::from_composite(3.49), Recommendation::NoGo);
    }

    #[test]
    fn all_nines_is_strong_go_without_override() {
        let result = calculate_program_score(dims([9.0; 7]));
        assert_eq!(result.composite_score, 9.0);
        assert_eq!(result.recommendation, Recommendation::StrongGo);
        assert!(!result.override_applied);
        assert!(result.override_reason.is_none());
        assert!(result.conditions.is_empty());
    }

    #[test]
    fn calculation_is_deterministic() {
        let input = dims([7.0, 6.0, 8.0, 5.0, 9.0, 4.0, 6.0]);
        let a = calculate_program_score(input.clone());
        let b = calculate_program_score(input);
        assert_eq!(a, b);
    }

    // -- Override A --

    #[test]
    fn weak_dimension_at_three_caps_strong_go() {
        let result = calculate_program_score(dims([10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 3.0]));
        assert_eq!(result.recommendation, Recommendation::ConditionalGo);
        assert!(result.override_applied);
        assert_eq!(
            result.override_reason.as_deref(),
            Some("Regulatory & Compliance scored 3/10, capping recommendation at Conditional Go")
        );
        assert_eq!(
            result.conditions,
            vec!["Address weakness in Regulatory & Compliance before proceeding".to_string()]
        );
    }

    #[test]
    fn weak_dimension_at_four_does_not_cap() {
        let result = calculate_program_score(dims([10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 4.0]));
        assert_eq!(result.recommendation, Recommendation::StrongGo);
        assert!(!result.override_applied);
    }

    #[test]
    fn weak_dimension_reason_names_the_weakest() {
        let result = calculate_program_score(dims([10.0, 10.0, 10.0, 10.0, 3.0, 10.0, 10.0]));
        assert_eq!(result.recommendation, Recommendation::ConditionalGo);

        let mut input = dims([10.0; 7]);
        input[4] = DimensionScore::new(Dimension::CompetitiveLandscape, 3.0, "").unwrap();
        input[6] = DimensionScore::new(Dimension::Regulatory, 2.0, "").unwrap();
        let result = calculate_program_score(input);
        assert!(result
            .override_reason
            .as_deref()
            .unwrap()
            .starts_with("Regulatory & Compliance scored 2/10"));
    }

    #[test]
    fn weak_dimension_does_not_touch_lower_tiers() {
        // Composite 6.75 -> Conditional Go; the 3 is not consulted.
        let mut input = dims([6.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0]);
        input[6] = DimensionScore::new(Dimension::Regulatory, 3.0, "").unwrap();
        let result = calculate_program_score(input);
        assert_eq!(result.recommendation, Recommendation::ConditionalGo);
        assert!(!result.override_applied);
    }

    // -- Overrides B and C --

    #[test]
    fn low_financial_viability_forces_defer() {
        let result = calculate_program_score(dims([9.0, 3.0, 9.0, 9.0, 9.0, 9.0, 9.0]));
        assert_eq!(result.composite_score, 7.8);
        assert_eq!(result.recommendation, Recommendation::Defer);
        assert!(result.override_applied);
        assert!(result
            .override_reason
            .as_deref()
            .unwrap()
            .starts_with("Financial Viability scored 3/10"));
    }

    #[test]
    fn financial_viability_just_below_floor_overrides_perfect_scores() {
        let result = calculate_program_score(dims([10.0, 3.9, 10.0, 10.0, 10.0, 10.0, 10.0]));
        assert_eq!(result.composite_score, 8.8);
        assert_eq!(result.recommendation, Recommendation::Defer);
        assert!(result.override_applied);
        assert!(result.conditions.is_empty());
    }

    #[test]
    fn low_labor_market_overrides_after_weak_dimension_cap() {
        let result = calculate_program_score(dims([3.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0]));
        assert_eq!(result.recommendation, Recommendation::Defer);
        assert!(result
            .override_reason
            .as_deref()
            .unwrap()
            .starts_with("Labor Market Demand scored 3/10"));
        // The cap's follow-up condition survives the later override.
        assert_eq!(result.conditions.len(), 1);
    }

    #[test]
    fn critical_override_yields_no_go_for_low_composite() {
        let result = calculate_program_score(dims([2.0; 7]));
        assert_eq!(result.recommendation, Recommendation::NoGo);
        assert!(result.override_applied);
    }

    #[test]
    fn thresholds_use_unrounded_composite() {
        // Raw composite 3.465 reports as 3.5 but stays below the Defer line.
        let result = calculate_program_score(dims([3.6, 3.2, 3.5, 3.5, 3.5, 3.5, 3.5]));
        assert_eq!(result.composite_score, 3.5);
        assert_eq!(result.recommendation, Recommendation::NoGo);
    }

    #[test]
    fn financial_at_floor_does_not_override() {
        let result = calculate_program_score(dims([4.0; 7]));
        assert_eq!(result.recommendation, Recommendation::Defer);
        assert!(!result.override_applied);
    }
}
