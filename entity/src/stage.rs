use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pipeline position of a deal.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
pub enum Stage {
    #[default]
    Lead,
    Qualified,
    Discovery,
    Proposal,
    Negotiation,
    #[serde(alias = "Closed Won", alias = "Won")]
    ClosedWon,
    #[serde(alias = "Closed Lost", alias = "Lost")]
    ClosedLost,
    #[serde(alias = "On Hold")]
    OnHold,
    Other,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Lead,
        Stage::Qualified,
        Stage::Discovery,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::ClosedWon,
        Stage::ClosedLost,
        Stage::OnHold,
        Stage::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Lead => "Lead",
            Stage::Qualified => "Qualified",
            Stage::Discovery => "Discovery",
            Stage::Proposal => "Proposal",
            Stage::Negotiation => "Negotiation",
            Stage::ClosedWon => "Closed Won",
            Stage::ClosedLost => "Closed Lost",
            Stage::OnHold => "On Hold",
            Stage::Other => "Other",
        }
    }

    /// Built-in win probability used when no override is configured.
    pub fn default_probability(self) -> u8 {
        match self {
            Stage::Lead => 10,
            Stage::Qualified => 20,
            Stage::Discovery => 40,
            Stage::Proposal => 60,
            Stage::Negotiation => 80,
            Stage::ClosedWon => 100,
            Stage::ClosedLost => 0,
            Stage::OnHold => 10,
            Stage::Other => 10,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    pub fn is_open(self) -> bool {
        !self.is_closed()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stage '{}'", self.0)
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for Stage {
    type Err = UnknownStage;

    /// Accepts display labels, variant names and snake/kebab spellings,
    /// ignoring case ("closed won", "ClosedWon", "closed_won").
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let stage = match key.as_str() {
            "lead" | "new" => Stage::Lead,
            "qualified" | "qualify" => Stage::Qualified,
            "discovery" => Stage::Discovery,
            "proposal" => Stage::Proposal,
            "negotiation" | "negotiate" => Stage::Negotiation,
            "closedwon" | "won" => Stage::ClosedWon,
            "closedlost" | "lost" => Stage::ClosedLost,
            "onhold" | "hold" => Stage::OnHold,
            "other" => Stage::Other,
            _ => return Err(UnknownStage(value.to_string())),
        };
        Ok(stage)
    }
}
