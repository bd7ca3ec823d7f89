//! The validation pipeline's fixed phase sequence and agent personas.
//!
//! Each dimension phase is owned by one persona and contributes exactly one
//! [`Dimension`] score. The final synthesis phase has no dimension; it
//! combines earlier phase outputs into the report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scoring::Dimension;

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Agent persona invoked for a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persona {
    MarketAnalyst,
    ResearchDirector,
    CurriculumDirector,
    Cfo,
    Cmo,
    PartnershipsDirector,
    ComplianceOfficer,
    TigerTeam,
}

impl Persona {
    pub const ALL: [Persona; 8] = [
        Self::MarketAnalyst,
        Self::ResearchDirector,
        Self::CurriculumDirector,
        Self::Cfo,
        Self::Cmo,
        Self::PartnershipsDirector,
        Self::ComplianceOfficer,
        Self::TigerTeam,
    ];

    /// Stable persona identifier passed to the agent service.
    pub fn id(self) -> &'static str {
        match self {
            Self::MarketAnalyst => "market-analyst",
            Self::ResearchDirector => "research-director",
            Self::CurriculumDirector => "curriculum-director",
            Self::Cfo => "cfo",
            Self::Cmo => "cmo",
            Self::PartnershipsDirector => "partnerships-director",
            Self::ComplianceOfficer => "compliance-officer",
            Self::TigerTeam => "tiger-team",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Persona {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown persona: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One checkpointable step of the validation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LaborMarket,
    CompetitiveLandscape,
    InstitutionalFit,
    FinancialViability,
    LearnerDemand,
    EmployerPartnerships,
    Regulatory,
    Synthesis,
}

impl Phase {
    /// All phases in execution order.
    pub const SEQUENCE: [Phase; 8] = [
        Self::LaborMarket,
        Self::CompetitiveLandscape,
        Self::InstitutionalFit,
        Self::FinancialViability,
        Self::LearnerDemand,
        Self::EmployerPartnerships,
        Self::Regulatory,
        Self::Synthesis,
    ];

    /// 1-based checkpoint phase number.
    pub fn number(self) -> i32 {
        match self {
            Self::LaborMarket => 1,
            Self::CompetitiveLandscape => 2,
            Self::InstitutionalFit => 3,
            Self::FinancialViability => 4,
            Self::LearnerDemand => 5,
            Self::EmployerPartnerships => 6,
            Self::Regulatory => 7,
            Self::Synthesis => 8,
        }
    }

    /// Stage key used in telemetry and checkpoint rows.
    pub fn key(self) -> &'static str {
        match self {
            Self::LaborMarket => "labor_market",
            Self::CompetitiveLandscape => "competitive_landscape",
            Self::InstitutionalFit => "institutional_fit",
            Self::FinancialViability => "financial_viability",
            Self::LearnerDemand => "learner_demand",
            Self::EmployerPartnerships => "employer_partnerships",
            Self::Regulatory => "regulatory",
            Self::Synthesis => "synthesis",
        }
    }

    /// Human-readable label for logs and event messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::LaborMarket => "Labor Market Analysis",
            Self::CompetitiveLandscape => "Competitive Landscape",
            Self::InstitutionalFit => "Institutional Fit Review",
            Self::FinancialViability => "Financial Projections",
            Self::LearnerDemand => "Learner Demand & Marketing",
            Self::EmployerPartnerships => "Employer Partnerships",
            Self::Regulatory => "Regulatory Review",
            Self::Synthesis => "Tiger Team Synthesis",
        }
    }

    pub fn persona(self) -> Persona {
        match self {
            Self::LaborMarket => Persona::MarketAnalyst,
            Self::CompetitiveLandscape => Persona::ResearchDirector,
            Self::InstitutionalFit => Persona::CurriculumDirector,
            Self::FinancialViability => Persona::Cfo,
            Self::LearnerDemand => Persona::Cmo,
            Self::EmployerPartnerships => Persona::PartnershipsDirector,
            Self::Regulatory => Persona::ComplianceOfficer,
            Self::Synthesis => Persona::TigerTeam,
        }
    }

    /// Scored dimension, or `None` for the synthesis phase.
    pub fn dimension(self) -> Option<Dimension> {
        match self {
            Self::LaborMarket => Some(Dimension::LaborMarketDemand),
            Self::CompetitiveLandscape => Some(Dimension::CompetitiveLandscape),
            Self::InstitutionalFit => Some(Dimension::InstitutionalFit),
            Self::FinancialViability => Some(Dimension::FinancialViability),
            Self::LearnerDemand => Some(Dimension::TargetLearnerDemand),
            Self::EmployerPartnerships => Some(Dimension::EmployerDemand),
            Self::Regulatory => Some(Dimension::Regulatory),
            Self::Synthesis => None,
        }
    }

    pub fn from_number(number: i32) -> Option<Self> {
        Self::SEQUENCE.into_iter().find(|p| p.number() == number)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn sequence_numbers_are_contiguous() {
        for (i, phase) in Phase::SEQUENCE.iter().enumerate() {
            assert_eq!(phase.number(), i as i32 + 1);
            assert_eq!(Phase::from_number(phase.number()), Some(*phase));
        }
        assert_eq!(Phase::from_number(0), None);
    }

    #[test]
    fn every_dimension_is_covered_exactly_once() {
        let covered: Vec<Dimension> = Phase::SEQUENCE.iter().filter_map(|p| p.dimension()).collect();
        let unique: HashSet<Dimension> = covered.iter().copied().collect();
        assert_eq!(covered.len(), Dimension::ALL.len());
        assert_eq!(unique.len(), Dimension::ALL.len());
    }

    #[test]
    fn persona_round_trips_through_id() {
        for persona in Persona::ALL {
            assert_eq!(persona.id().parse::<Persona>().unwrap(), persona);
        }
        assert!("ghost-writer".parse::<Persona>().is_err());
    }

    #[test]
    fn persona_serde_matches_id() {
        let json = serde_json::to_string(&Persona::PartnershipsDirector).unwrap();
        assert_eq!(json, "\"partnerships-director\"");
    }
}
