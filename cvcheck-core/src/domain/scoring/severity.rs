// cvcheck-core/src/domain/scoring/severity.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// Declaration order doubles as display priority: High sorts first.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    /// Scoring multiplier. Fixed for the whole process.
    pub const fn weight(&self) -> u64 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Report heading used for this severity's bucket.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "Mandatory",
            Self::Medium => "Recommended",
            Self::Low => "Optional",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

/// Which severities are consulted when forming the overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Criteria {
    Strict,
    #[default]
    Normal,
    Lenient,
}

impl Criteria {
    pub fn severities(&self) -> &'static [Severity] {
        match self {
            Self::Strict => &[Severity::High, Severity::Medium, Severity::Low],
            Self::Normal => &[Severity::High, Severity::Medium],
            Self::Lenient => &[Severity::High],
        }
    }

    pub fn includes(&self, severity: Severity) -> bool {
        self.severities().contains(&severity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Normal => "normal",
            Self::Lenient => "lenient",
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Criteria {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "normal" => Ok(Self::Normal),
            "lenient" => Ok(Self::Lenient),
            _ => Err(format!("Unknown criteria: {}", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_weights_are_fixed() {
        assert_eq!(Severity::High.weight(), 3);
        assert_eq!(Severity::Medium.weight(), 2);
        assert_eq!(Severity::Low.weight(), 1);
    }

    #[test]
    fn test_severity_parsing() -> anyhow::Result<()> {
        assert_eq!(
            Severity::from_str("H").map_err(|e| anyhow::anyhow!(e))?,
            Severity::High
        );
        assert_eq!(
            Severity::from_str("medium").map_err(|e| anyhow::anyhow!(e))?,
            Severity::Medium
        );
        assert_eq!(
            Severity::from_str("LOW").map_err(|e| anyhow::anyhow!(e))?,
            Severity::Low
        );
        assert!(Severity::from_str("urgent").is_err());

        let parsed: Severity = serde_yaml::from_str("HIGH")?;
        assert_eq!(parsed, Severity::High);
        assert_eq!(serde_yaml::to_string(&Severity::Low)?.trim(), "low");
        Ok(())
    }

    #[test]
    fn test_criteria_are_nested() {
        for sev in Severity::ALL {
            if Criteria::Lenient.includes(sev) {
                assert!(Criteria::Normal.includes(sev));
            }
            if Criteria::Normal.includes(sev) {
                assert!(Criteria::Strict.includes(sev));
            }
        }
        assert!(Criteria::Lenient.includes(Severity::High));
        assert_eq!(Criteria::default(), Criteria::Normal);
    }
}
