// cvcheck/src/output.rs
//
// Text rendering of reports. JSON output is plain serde and lives in the
// check command.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write;

use cvcheck_core::application::FileOutcome;
use cvcheck_core::domain::checks::PlannedCheck;
use cvcheck_core::domain::scoring::{
    Bucket, CheckOutcome, CheckStatus, ComplianceReport, Criteria, Severity,
};

/// How many failure messages are listed per check before eliding the rest.
const MAX_MESSAGES: usize = 5;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub unreadable: usize,
}

impl Summary {
    pub fn of(outcomes: &[FileOutcome], criteria: Criteria) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.report() {
                Some(report) if report.verdict(criteria) => summary.passed += 1,
                Some(_) => summary.failed += 1,
                None => summary.unreadable += 1,
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unreadable == 0
    }
}

pub fn render_text(outcomes: &[FileOutcome], criteria: Criteria) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Checked(report) => render_report(&mut out, report, criteria),
            FileOutcome::Unreadable { path, reason } => {
                let _ = writeln!(out, "\n📄 {}\n   💥 Unreadable: {}", path, reason);
            }
        }
    }
    out
}

fn render_report(out: &mut String, report: &ComplianceReport, criteria: Criteria) {
    let _ = writeln!(out, "\n📄 {}", report.file_path);

    for severity in Severity::ALL {
        let outcomes = report.outcomes_in(Bucket::from(severity));
        if outcomes.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} ({})", severity.label(), severity);
        let _ = writeln!(out, "{}", outcome_table(&outcomes));
    }

    let (scored, possible) = report.points_for(criteria);
    let verdict = if report.verdict(criteria) {
        "✅ PASS"
    } else {
        "❌ FAIL"
    };
    let _ = writeln!(
        out,
        "Score: {}/{} overall, {}/{} under {} criteria: {}",
        report.scored_points, report.possible_points, scored, possible, criteria, verdict
    );
}

fn outcome_table(outcomes: &[&CheckOutcome]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Check", "Status", "Score", "Details"]);

    for outcome in outcomes {
        table.add_row(vec![
            Cell::new(&outcome.check_id),
            status_cell(outcome.status),
            Cell::new(format!("{}/{}", outcome.passed_count(), outcome.total_count())),
            Cell::new(details(outcome)),
        ]);
    }
    table
}

fn status_cell(status: CheckStatus) -> Cell {
    let color = match status {
        CheckStatus::Passed => Color::Green,
        CheckStatus::Failed => Color::Red,
        CheckStatus::Error => Color::Magenta,
        CheckStatus::Skipped => Color::DarkGrey,
    };
    Cell::new(status.as_str()).fg(color)
}

fn details(outcome: &CheckOutcome) -> String {
    if let Some(reason) = &outcome.error {
        return reason.clone();
    }
    let failures: Vec<&str> = outcome.failures().map(|a| a.message.as_str()).collect();
    if failures.is_empty() {
        return outcome.notes.join("\n");
    }
    let mut lines: Vec<String> = failures
        .iter()
        .take(MAX_MESSAGES)
        .map(|m| m.to_string())
        .collect();
    if failures.len() > MAX_MESSAGES {
        lines.push(format!("... {} more", failures.len() - MAX_MESSAGES));
    }
    lines.join("\n")
}

pub fn render_plan(checks: &[PlannedCheck]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Check", "Category", "Severity", "Description"]);

    for (i, check) in checks.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(check.id()),
            Cell::new(check.category()),
            Cell::new(check.severity),
            Cell::new(&check.description),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvcheck_core::domain::scoring::OutcomeBuilder;
    use cvcheck_core::domain::scoring::Category;

    fn report() -> ComplianceReport {
        let mut ok = OutcomeBuilder::new("dim_time", "Dimension 'time' exists", Category::Dimension, Severity::High);
        ok.add_pass("time present");

        let mut bad = OutcomeBuilder::new("attr_source", "Global attribute 'source'", Category::Attribute, Severity::Low);
        for i in 0..7 {
            bad.add_failure(format!("problem {}", i));
        }

        ComplianceReport::new("CMIP6", "/data/tas.nc", vec![ok.finish(), bad.finish()])
    }

    #[test]
    fn test_text_report_groups_by_severity() {
        let text = render_text(&[FileOutcome::Checked(report())], Criteria::Normal);

        assert!(text.contains("Mandatory (high)"));
        assert!(text.contains("Optional (low)"));
        assert!(!text.contains("Recommended"));
        assert!(text.contains("... 2 more"));
        assert!(text.contains("✅ PASS"));
    }

    #[test]
    fn test_summary_counts_unreadable_files() {
        let outcomes = vec![
            FileOutcome::Checked(report()),
            FileOutcome::Unreadable {
                path: "/data/broken.json".into(),
                reason: "EOF".into(),
            },
        ];
        let normal = Summary::of(&outcomes, Criteria::Normal);
        assert_eq!(normal, Summary { passed: 1, failed: 0, unreadable: 1 });
        assert!(!normal.is_success());

        let strict = Summary::of(&outcomes[..1], Criteria::Strict);
        assert_eq!(strict.failed, 1);
    }
}
