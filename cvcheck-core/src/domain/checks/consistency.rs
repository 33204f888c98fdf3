// cvcheck-core/src/domain/checks/consistency.rs

use super::CheckContext;
use crate::domain::error::CollaboratorError;
use crate::domain::scoring::OutcomeBuilder;
use crate::domain::tokens::{CompiledRule, Expectation};
use std::collections::BTreeMap;

/// Compares an attribute to the value derived from its rule, case-sensitively.
pub fn run(
    ctx: &CheckContext<'_>,
    attribute: &str,
    rule: &CompiledRule,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let Some(actual) = ctx.global_attribute(attribute)? else {
        out.skip(format!("global attribute '{}' is missing", attribute));
        return Ok(());
    };
    let actual = actual.as_text();

    match ctx.resolver.expected_value(rule, ctx.dataset)? {
        Expectation::Resolved(expected) => {
            if expected == actual {
                out.add_pass(format!("'{}' is consistent ('{}')", attribute, actual));
            } else {
                out.add_failure(format!(
                    "'{}': expected '{}', found '{}'",
                    attribute, expected, actual
                ));
            }
        }
        Expectation::Unresolvable(reason) => {
            out.skip(format!(
                "expected value of '{}' cannot be derived: {}",
                attribute, reason
            ));
        }
    }
    Ok(())
}

/// `frequency` must be one of the values allowed for the file's `table_id`.
pub fn frequency_table(
    ctx: &CheckContext<'_>,
    mapping: &BTreeMap<String, Vec<String>>,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let table_id = ctx.global_attribute("table_id")?;
    let frequency = ctx.global_attribute("frequency")?;

    let (Some(table_id), Some(frequency)) = (table_id, frequency) else {
        out.add_failure("Missing required attribute 'table_id' or 'frequency'");
        return Ok(());
    };
    let (table_id, frequency) = (table_id.as_text(), frequency.as_text());

    match mapping.get(&table_id) {
        Some(allowed) if allowed.contains(&frequency) => {
            out.add_pass(format!(
                "frequency '{}' is allowed for table_id '{}'",
                frequency, table_id
            ));
        }
        Some(allowed) => {
            out.add_failure(format!(
                "For table_id '{}', frequency should be one of {:?}, but found '{}'",
                table_id, allowed, frequency
            ));
        }
        None => {
            out.note(format!(
                "No frequency mapping found for table_id '{}'",
                table_id
            ));
            out.add_pass(format!("table_id '{}' is not constrained", table_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{cmip6_project, project, run_check, vocabulary};
    use crate::domain::scoring::CheckStatus;
    use crate::infrastructure::adapters::memory::InMemoryDataset;
    use crate::ports::AttrValue;

    const PATH: &str = "/data/CMIP6/CMIP/MPI-M/MPI-ESM1-2-LR/historical/r1i1p1f1/Amon/tas/gn/v20190710/tas_Amon_MPI-ESM1-2-LR_historical_r1i1p1f1_gn_185001-201412.nc";

    fn variant_project() -> crate::domain::project::ProjectConfig {
        let mut p = cmip6_project();
        let extra = project(
            r#"
project_id: CMIP6
derivations:
  variant_label:
    from: compose
    template: "r{realization_index}i{initialization_index}p{physics_index}f{forcing_index}"
  table_id:
    from: filename_token
    position: 1
"#,
        );
        p.derivations = extra.derivations;
        p
    }

    fn dataset(variant: &str, table: &str) -> InMemoryDataset {
        InMemoryDataset::builder(PATH)
            .global("variant_label", AttrValue::Str(variant.into()))
            .global("realization_index", AttrValue::Int(1))
            .global("initialization_index", AttrValue::Int(1))
            .global("physics_index", AttrValue::Int(1))
            .global("forcing_index", AttrValue::Int(1))
            .global("table_id", AttrValue::Str(table.into()))
            .global("frequency", AttrValue::Str("mon".into()))
            .global("experiment_id", AttrValue::Str("historical".into()))
            .build()
    }

    #[test]
    fn test_variant_label_is_composed_from_indices() {
        let check = "{id: v, category: attribute, check: consistency, attribute: variant_label}";
        let ok = run_check(&variant_project(), check, &dataset("r1i1p1f1", "Amon"), &vocabulary());
        assert_eq!(ok.status, CheckStatus::Passed);

        let bad = run_check(&variant_project(), check, &dataset("r2i1p1f1", "Amon"), &vocabulary());
        assert_eq!(bad.status, CheckStatus::Failed);
        assert_eq!(
            bad.assertions[0].message,
            "'variant_label': expected 'r1i1p1f1', found 'r2i1p1f1'"
        );
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        let check = "{id: t, category: attribute, check: consistency, attribute: table_id}";
        let outcome = run_check(&variant_project(), check, &dataset("r1i1p1f1", "amon"), &vocabulary());
        assert_eq!(outcome.status, CheckStatus::Failed);
    }

    #[test]
    fn test_inline_rule_and_unresolvable_expectation() {
        let check = "{id: e, category: attribute, check: consistency, attribute: experiment_id, rule: {from: directory_token, position: 4}}";
        let outcome = run_check(&cmip6_project(), check, &dataset("r1i1p1f1", "Amon"), &vocabulary());
        assert_eq!(outcome.status, CheckStatus::Passed);

        let elsewhere = InMemoryDataset::builder("/tmp/tas.nc")
            .global("experiment_id", AttrValue::Str("historical".into()))
            .build();
        let outcome = run_check(&cmip6_project(), check, &elsewhere, &vocabulary());
        assert_eq!(outcome.status, CheckStatus::Skipped);
        assert!(outcome.notes[0].contains("cannot be derived"));
    }

    #[test]
    fn test_frequency_table() {
        let check = "{id: f, category: attribute, check: frequency_table, mapping: {Amon: [mon], day: [day]}}";
        let ok = run_check(&cmip6_project(), check, &dataset("r1i1p1f1", "Amon"), &vocabulary());
        assert_eq!(ok.status, CheckStatus::Passed);

        let bad = run_check(&cmip6_project(), check, &dataset("r1i1p1f1", "day"), &vocabulary());
        assert_eq!(bad.status, CheckStatus::Failed);

        let unmapped = run_check(&cmip6_project(), check, &dataset("r1i1p1f1", "Omon"), &vocabulary());
        assert_eq!(unmapped.status, CheckStatus::Passed);
        assert_eq!(unmapped.notes.len(), 1);
    }
}
