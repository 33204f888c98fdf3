// cvcheck-core/src/application/engine.rs

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::checks::{CheckContext, PlannedCheck};
use crate::domain::error::ConfigurationError;
use crate::domain::project::ProjectConfig;
use crate::domain::scoring::{CheckOutcome, CheckStatus, ComplianceReport};
use crate::domain::selection::{self, Selection};
use crate::domain::tokens::TokenResolver;
use crate::ports::{DatasetAccessor, VocabularyClient};

/// Runs a fixed, ordered plan of checks against one file at a time.
///
/// Everything that can be wrong with the configuration is detected in `new`,
/// so `run` always produces a report.
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    config: Arc<ProjectConfig>,
    resolver: TokenResolver,
    plan: Vec<PlannedCheck>,
}

impl ComplianceEngine {
    #[instrument(skip_all, fields(project = %config.project_id))]
    pub fn new(
        config: Arc<ProjectConfig>,
        selection: &Selection,
    ) -> Result<Self, ConfigurationError> {
        let resolver = TokenResolver::new(&config.drs, &config.derivations)?;

        let plan = selection::resolve(&config, selection)?
            .into_iter()
            .map(|check| PlannedCheck::prepare(&config, check, &resolver))
            .collect::<Result<Vec<_>, _>>()?;

        info!(checks = plan.len(), "Check plan resolved");
        Ok(Self {
            config,
            resolver,
            plan,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn checks(&self) -> &[PlannedCheck] {
        &self.plan
    }

    /// Ordered ids of the checks `run` will execute.
    pub fn plan(&self) -> Vec<&str> {
        self.plan.iter().map(PlannedCheck::id).collect()
    }

    /// Executes every planned check sequentially and aggregates the outcomes.
    #[instrument(skip_all, fields(file = %dataset.file_path()))]
    pub fn run(
        &self,
        dataset: &dyn DatasetAccessor,
        vocabulary: &dyn VocabularyClient,
    ) -> ComplianceReport {
        let ctx = CheckContext {
            dataset,
            vocabulary,
            config: &self.config,
            resolver: &self.resolver,
        };

        let outcomes: Vec<CheckOutcome> = self
            .plan
            .iter()
            .map(|check| run_one(&ctx, check))
            .collect();

        let report =
            ComplianceReport::new(&self.config.project_id, dataset.file_path(), outcomes);
        debug!(
            scored = report.scored_points,
            possible = report.possible_points,
            "File checked"
        );
        report
    }
}

// Failure boundary: collaborator errors and panics both end as an Error
// outcome for this check only.
fn run_one(ctx: &CheckContext<'_>, check: &PlannedCheck) -> CheckOutcome {
    let mut ledger = check.ledger();
    let result = catch_unwind(AssertUnwindSafe(|| check.execute(ctx, &mut ledger)));

    let outcome = match result {
        Ok(Ok(())) => ledger.finish(),
        Ok(Err(e)) => ledger.error(e.to_string()),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ledger.error(format!("check panicked: {}", reason))
        }
    };

    match outcome.status {
        CheckStatus::Error => warn!(
            check = %outcome.check_id,
            reason = outcome.error.as_deref().unwrap_or_default(),
            "Check could not complete"
        ),
        status => debug!(check = %outcome.check_id, %status, "Check done"),
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::scoring::{Bucket, Criteria};
    use crate::infrastructure::adapters::memory::InMemoryDataset;
    use crate::infrastructure::adapters::vocabulary::LocalVocabulary;
    use crate::ports::{AttrValue, DataType, DatasetError, VocabularyError};

    const PROJECT: &str = r#"
project_id: CMIP6
drs:
  project_root: CMIP6
  directory: [mip_era, activity_id, source_id, version]
  filename: [variable_id, table_id, source_id, time_range]
checks:
  - {id: tas_values, category: data, check: outlier, variable: tas, min: 150, max: 350, severity: low}
  - {id: attr_activity, category: attribute, check: attribute, attribute: activity_id, vocabulary: true, severity: high}
  - {id: dim_time, category: dimension, check: existence, dimension: time, severity: high}
  - {id: attr_license, category: attribute, check: attribute, attribute: license, required: false}
  - {id: var_tas, category: variable, check: existence, variable: tas, severity: high}
  - {id: drs, category: directory, check: structure}
"#;

    const PATH: &str = "/data/CMIP6/CMIP/MPI-ESM1-2-LR/v1/tas_Amon_MPI-ESM1-2-LR_185001-185002.nc";

    fn engine(selection: &Selection) -> ComplianceEngine {
        let config: ProjectConfig = serde_yaml::from_str(PROJECT).unwrap();
        ComplianceEngine::new(Arc::new(config), selection).unwrap()
    }

    fn dataset(tas: Vec<f64>) -> InMemoryDataset {
        InMemoryDataset::builder(PATH)
            .global("mip_era", AttrValue::Str("CMIP6".into()))
            .global("activity_id", AttrValue::Str("CMIP".into()))
            .global("source_id", AttrValue::Str("MPI-ESM1-2-LR".into()))
            .dimension("time", 2)
            .variable("tas", &["time"], DataType::Float, tas)
            .build()
    }

    fn vocabulary() -> LocalVocabulary {
        LocalVocabulary::from_terms("CMIP6", [("activity_id", vec!["CMIP"])])
    }

    struct OfflineVocabulary;

    impl VocabularyClient for OfflineVocabulary {
        fn valid_term(&self, _: &str, _: &str, _: &str) -> Result<bool, VocabularyError> {
            Err(VocabularyError::Unavailable("timeout".into()))
        }
    }

    /// Delegates to an inner dataset but panics when data is read.
    struct ExplodingReads(InMemoryDataset);

    impl DatasetAccessor for ExplodingReads {
        fn file_path(&self) -> &str {
            self.0.file_path()
        }
        fn global_attribute(&self, name: &str) -> Result<Option<AttrValue>, DatasetError> {
            self.0.global_attribute(name)
        }
        fn global_attribute_names(&self) -> Result<Vec<String>, DatasetError> {
            self.0.global_attribute_names()
        }
        fn dimension_size(&self, name: &str) -> Result<Option<u64>, DatasetError> {
            self.0.dimension_size(name)
        }
        fn dimension_names(&self) -> Result<Vec<String>, DatasetError> {
            self.0.dimension_names()
        }
        fn variable(&self, name: &str) -> Result<Option<crate::ports::VariableInfo>, DatasetError> {
            self.0.variable(name)
        }
        fn variable_names(&self) -> Result<Vec<String>, DatasetError> {
            self.0.variable_names()
        }
        fn read_values(&self, _: &str, _: usize, _: usize) -> Result<Vec<f64>, DatasetError> {
            panic!("corrupt chunk")
        }
        fn decode_time(&self, name: &str) -> Result<Vec<crate::ports::CalendarDate>, DatasetError> {
            self.0.decode_time(name)
        }
        fn storage(&self) -> Result<crate::ports::StorageFormat, DatasetError> {
            self.0.storage()
        }
        fn chunking(&self, name: &str) -> Result<Option<Vec<u64>>, DatasetError> {
            self.0.chunking(name)
        }
        fn compression(&self, name: &str) -> Result<Option<crate::ports::Compression>, DatasetError> {
            self.0.compression(name)
        }
    }

    #[test]
    fn test_plan_follows_category_order() {
        let engine = engine(&Selection::default());
        assert_eq!(
            engine.plan(),
            vec!["dim_time", "var_tas", "attr_activity", "attr_license", "drs", "tas_values"]
        );
    }

    #[test]
    fn test_clean_file_scores_full_marks() {
        let report = engine(&Selection::default()).run(&dataset(vec![280.0, 281.0]), &vocabulary());

        assert_eq!(report.scored_points, report.possible_points);
        assert!(report.verdict(Criteria::Strict));
        assert_eq!(report.outcome("attr_license").unwrap().status, CheckStatus::Skipped);
        assert_eq!(report.priority_buckets[&Bucket::All].len(), 6);
        assert_eq!(
            report.priority_buckets[&Bucket::High],
            vec!["dim_time", "var_tas", "attr_activity"]
        );
    }

    #[test]
    fn test_possible_points_sum_over_non_skipped_outcomes() {
        let report = engine(&Selection::default()).run(&dataset(vec![280.0, 400.0]), &vocabulary());

        let expected: u64 = report
            .outcomes
            .iter()
            .filter(|o| o.status != CheckStatus::Skipped)
            .map(|o| o.total_count() as u64 * o.severity.weight())
            .sum();
        assert_eq!(report.possible_points, expected);
        assert!(report.scored_points < report.possible_points);

        // Only the low-severity outlier check failed.
        assert!(!report.verdict(Criteria::Strict));
        assert!(report.verdict(Criteria::Normal));
        assert!(report.verdict(Criteria::Lenient));
    }

    #[test]
    fn test_vocabulary_outage_only_affects_its_check() {
        let report = engine(&Selection::default()).run(&dataset(vec![280.0, 281.0]), &OfflineVocabulary);

        assert_eq!(report.count_with_status(CheckStatus::Error), 1);
        let failed = report.outcome("attr_activity").unwrap();
        assert_eq!(failed.status, CheckStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("timeout"));
        assert_eq!(report.outcome("tas_values").unwrap().status, CheckStatus::Passed);
        assert_eq!(report.outcomes.len(), 6);
        assert!(!report.verdict(Criteria::Lenient));
    }

    #[test]
    fn test_panicking_check_becomes_error_outcome() {
        let ds = ExplodingReads(dataset(vec![280.0, 281.0]));
        let report = engine(&Selection::default()).run(&ds, &vocabulary());

        let outcome = report.outcome("tas_values").unwrap();
        assert_eq!(outcome.status, CheckStatus::Error);
        assert!(outcome.error.as_deref().unwrap().contains("corrupt chunk"));
        assert_eq!(report.count_with_status(CheckStatus::Passed), 4);
    }

    #[test]
    fn test_panic_keeps_assertions_recorded_before_it() -> anyhow::Result<()> {
        let config: ProjectConfig = serde_yaml::from_str(
            r#"
project_id: CMIP6
checks:
  - {id: time_in_bounds, category: variable, check: bounds, variable: time, severity: high}
"#,
        )?;
        let engine = ComplianceEngine::new(Arc::new(config), &Selection::default())?;
        let ds = ExplodingReads(
            InMemoryDataset::builder(PATH)
                .dimension("time", 2)
                .dimension("bnds", 2)
                .variable("time", &["time"], DataType::Double, vec![15.5, 45.0])
                .var_attr("time", "bounds", AttrValue::Str("time_bnds".into()))
                .variable("time_bnds", &["time", "bnds"], DataType::Double, vec![0.0, 31.0, 31.0, 59.0])
                .build(),
        );

        let report = engine.run(&ds, &vocabulary());
        let outcome = report.outcome("time_in_bounds").unwrap();

        assert_eq!(outcome.status, CheckStatus::Error);
        // shape assertion + the appended error assertion
        assert_eq!(outcome.total_count(), 2);
        assert!(outcome.assertions[0].passed);
        assert!(outcome.assertions[0].message.contains("has shape (2, 2)"));
        assert_eq!(report.possible_points, 2 * 3);
        Ok(())
    }

    #[test]
    fn test_reports_are_byte_identical_across_runs() -> anyhow::Result<()> {
        let engine = engine(&Selection::default());
        let ds = dataset(vec![280.0, 400.0]);
        let first = serde_json::to_vec(&engine.run(&ds, &vocabulary()))?;
        let second = serde_json::to_vec(&engine.run(&ds, &vocabulary()))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_stricter_criteria_never_pass_more() {
        let engine = engine(&Selection::default());
        for tas in [vec![280.0, 281.0], vec![280.0, 400.0], vec![1.0, 400.0]] {
            let report = engine.run(&dataset(tas), &vocabulary());
            if report.verdict(Criteria::Strict) {
                assert!(report.verdict(Criteria::Normal));
            }
            if report.verdict(Criteria::Normal) {
                assert!(report.verdict(Criteria::Lenient));
            }
        }
    }

    #[test]
    fn test_configuration_errors_surface_before_running() {
        let config: ProjectConfig = serde_yaml::from_str(PROJECT).unwrap();
        let err = ComplianceEngine::new(Arc::new(config), &Selection::skip(["nope"])).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownCheck("nope".into()));
    }
}
