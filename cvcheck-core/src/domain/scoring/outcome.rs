// cvcheck-core/src/domain/scoring/outcome.rs

use super::{Category, Severity};
use serde::{Deserialize, Serialize};

/// One pass/fail fact recorded by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finalized result of a single check. Built only through `OutcomeBuilder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check_id: String,
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    pub status: CheckStatus,
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Raw collaborator failure, set only when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn passed_count(&self) -> usize {
        self.assertions.iter().filter(|a| a.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.assertions.len()
    }

    pub fn scored_points(&self) -> u64 {
        if self.status == CheckStatus::Skipped {
            return 0;
        }
        self.passed_count() as u64 * self.severity.weight()
    }

    pub fn possible_points(&self) -> u64 {
        if self.status == CheckStatus::Skipped {
            return 0;
        }
        self.total_count() as u64 * self.severity.weight()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter().filter(|a| !a.passed)
    }
}

/// The assertion ledger a check writes into while it runs.
#[derive(Debug)]
pub struct OutcomeBuilder {
    check_id: String,
    description: String,
    category: Category,
    severity: Severity,
    assertions: Vec<Assertion>,
    notes: Vec<String>,
}

impl OutcomeBuilder {
    pub fn new(
        check_id: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        severity: Severity,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            description: description.into(),
            category,
            severity,
            assertions: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn add_pass(&mut self, message: impl Into<String>) {
        self.record(true, message);
    }

    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.record(false, message);
    }

    /// Records `message` as passed or failed depending on `passed`.
    pub fn record(&mut self, passed: bool, message: impl Into<String>) {
        self.assertions.push(Assertion {
            passed,
            message: message.into(),
        });
    }

    /// Informational message. Never scored.
    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    /// Marks a missing optional prerequisite. The outcome ends up Skipped as
    /// long as no assertion was recorded.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.notes.push(format!("skipped: {}", reason.into()));
    }

    pub fn assertion_count(&self) -> usize {
        self.assertions.len()
    }

    pub fn finish(self) -> CheckOutcome {
        let status = if self.assertions.is_empty() {
            CheckStatus::Skipped
        } else if self.assertions.iter().all(|a| a.passed) {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        self.into_outcome(status, None)
    }

    /// Closes the ledger after a collaborator failure. Assertions recorded so
    /// far are kept and one failed assertion carrying the reason is appended.
    pub fn error(mut self, reason: impl Into<String>) -> CheckOutcome {
        let reason = reason.into();
        self.assertions.push(Assertion {
            passed: false,
            message: format!("check could not complete: {}", reason),
        });
        self.into_outcome(CheckStatus::Error, Some(reason))
    }

    fn into_outcome(self, status: CheckStatus, error: Option<String>) -> CheckOutcome {
        CheckOutcome {
            check_id: self.check_id,
            description: self.description,
            category: self.category,
            severity: self.severity,
            status,
            assertions: self.assertions,
            notes: self.notes,
            error,
        }
    }
}
