// cvcheck-core/src/domain/scoring/report.rs

use super::{CheckOutcome, CheckStatus, Criteria, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    High,
    Medium,
    Low,
    All,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::All => "all",
        }
    }
}

impl From<Severity> for Bucket {
    fn from(value: Severity) -> Self {
        match value {
            Severity::High => Self::High,
            Severity::Medium => Self::Medium,
            Severity::Low => Self::Low,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregated result for one file. Immutable once built; holds no clock or
/// host data so identical inputs serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub project_id: String,
    pub file_path: String,
    pub scored_points: u64,
    pub possible_points: u64,
    pub priority_buckets: BTreeMap<Bucket, Vec<String>>,
    pub outcomes: Vec<CheckOutcome>,
}

impl ComplianceReport {
    pub fn new(
        project_id: impl Into<String>,
        file_path: impl Into<String>,
        outcomes: Vec<CheckOutcome>,
    ) -> Self {
        let scored_points = outcomes.iter().map(CheckOutcome::scored_points).sum();
        let possible_points = outcomes.iter().map(CheckOutcome::possible_points).sum();

        let mut priority_buckets: BTreeMap<Bucket, Vec<String>> = [
            Bucket::High,
            Bucket::Medium,
            Bucket::Low,
            Bucket::All,
        ]
        .into_iter()
        .map(|b| (b, Vec::new()))
        .collect();

        for outcome in &outcomes {
            priority_buckets
                .entry(Bucket::from(outcome.severity))
                .or_default()
                .push(outcome.check_id.clone());
            priority_buckets
                .entry(Bucket::All)
                .or_default()
                .push(outcome.check_id.clone());
        }

        Self {
            project_id: project_id.into(),
            file_path: file_path.into(),
            scored_points,
            possible_points,
            priority_buckets,
            outcomes,
        }
    }

    /// (scored, possible) restricted to the severities the criteria consults.
    pub fn points_for(&self, criteria: Criteria) -> (u64, u64) {
        self.outcomes
            .iter()
            .filter(|o| criteria.includes(o.severity))
            .fold((0, 0), |(s, p), o| {
                (s + o.scored_points(), p + o.possible_points())
            })
    }

    /// True only when every assertion within the considered severities passed.
    pub fn verdict(&self, criteria: Criteria) -> bool {
        let (scored, possible) = self.points_for(criteria);
        scored == possible
    }

    pub fn outcomes_in(&self, bucket: Bucket) -> Vec<&CheckOutcome> {
        match bucket {
            Bucket::All => self.outcomes.iter().collect(),
            _ => self
                .outcomes
                .iter()
                .filter(|o| Bucket::from(o.severity) == bucket)
                .collect(),
        }
    }

    pub fn outcome(&self, check_id: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check_id == check_id)
    }

    pub fn count_with_status(&self, status: CheckStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::scoring::{Category, OutcomeBuilder};

    fn outcome(id: &str, severity: Severity, results: &[bool]) -> CheckOutcome {
        let mut b = OutcomeBuilder::new(id, id, Category::Attribute, severity);
        for (i, passed) in results.iter().enumerate() {
            b.record(*passed, format!("assertion {}", i));
        }
        b.finish()
    }

    #[test]
    fn test_points_are_weighted_sums() {
        let report = ComplianceReport::new(
            "CMIP6",
            "tas.nc",
            vec![
                outcome("a", Severity::High, &[true, false]),
                outcome("b", Severity::Medium, &[true]),
                outcome("c", Severity::Low, &[]),
            ],
        );
        assert_eq!(report.scored_points, 3 + 2);
        assert_eq!(report.possible_points, 6 + 2);
        assert!(report.scored_points <= report.possible_points);
        assert_eq!(report.priority_buckets[&Bucket::All], vec!["a", "b", "c"]);
        assert_eq!(report.priority_buckets[&Bucket::Low], vec!["c"]);
        assert_eq!(report.outcomes_in(Bucket::High).len(), 1);
    }

    #[test]
    fn test_low_failure_only_breaks_strict() {
        let report = ComplianceReport::new(
            "CMIP6",
            "tas.nc",
            vec![
                outcome("a", Severity::High, &[true]),
                outcome("b", Severity::Medium, &[true]),
                outcome("c", Severity::Low, &[false]),
            ],
        );
        assert!(!report.verdict(Criteria::Strict));
        assert!(report.verdict(Criteria::Normal));
        assert!(report.verdict(Criteria::Lenient));
        assert_eq!(report.points_for(Criteria::Lenient), (3, 3));
    }

    #[test]
    fn test_high_failure_breaks_every_criteria() {
        let report = ComplianceReport::new(
            "CMIP6",
            "tas.nc",
            vec![outcome("a", Severity::High, &[false, true])],
        );
        assert!(!report.verdict(Criteria::Strict));
        assert!(!report.verdict(Criteria::Normal));
        assert!(!report.verdict(Criteria::Lenient));
    }

    #[test]
    fn test_report_serialization_is_stable() -> anyhow::Result<()> {
        let build = || {
            ComplianceReport::new(
                "CMIP6",
                "tas.nc",
                vec![outcome("a", Severity::High, &[true, false])],
            )
        };
        let first = serde_json::to_string(&build())?;
        let second = serde_json::to_string(&build())?;
        assert_eq!(first, second);

        let back: ComplianceReport = serde_json::from_str(&first)?;
        assert_eq!(back, build());
        Ok(())
    }
}
