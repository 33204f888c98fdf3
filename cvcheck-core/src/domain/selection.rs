// cvcheck-core/src/domain/selection.rs

use crate::domain::error::ConfigurationError;
use crate::domain::project::{CheckConfig, ProjectConfig};
use std::collections::HashSet;

/// User filters passed through from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub skip: Vec<String>,
    pub include: Vec<String>,
}

impl Selection {
    pub fn skip<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip: ids.into_iter().map(Into::into).collect(),
            include: vec![],
        }
    }

    pub fn include<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip: vec![],
            include: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Resolves the ordered list of checks to run.
///
/// Enabled checks are filtered by the include list when given, otherwise by
/// the skip list, then stably sorted by category so structural checks run
/// first and declaration order is kept within a category.
pub fn resolve<'a>(
    config: &'a ProjectConfig,
    selection: &Selection,
) -> Result<Vec<&'a CheckConfig>, ConfigurationError> {
    if !selection.skip.is_empty() && !selection.include.is_empty() {
        return Err(ConfigurationError::ConflictingSelection);
    }

    let mut seen = HashSet::new();
    for check in &config.checks {
        if !seen.insert(check.id.as_str()) {
            return Err(ConfigurationError::DuplicateCheck(check.id.clone()));
        }
    }

    for id in config.severity_overrides.keys() {
        if !seen.contains(id.as_str()) {
            return Err(ConfigurationError::UnknownCheck(id.clone()));
        }
    }

    for id in selection.skip.iter().chain(&selection.include) {
        match config.check(id) {
            None => return Err(ConfigurationError::UnknownCheck(id.clone())),
            Some(check) if !check.enabled => {
                return Err(ConfigurationError::CheckNotEnabled(id.clone()));
            }
            Some(_) => {}
        }
    }

    let enabled = config.checks.iter().filter(|c| c.enabled);
    let mut plan: Vec<&CheckConfig> = if selection.include.is_empty() {
        enabled
            .filter(|c| !selection.skip.contains(&c.id))
            .collect()
    } else {
        enabled
            .filter(|c| selection.include.contains(&c.id))
            .collect()
    };

    plan.sort_by_key(|c| c.category());
    Ok(plan)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
project_id: CMIP6
checks:
  - id: tas_nan
    category: data
    check: nan_inf
    variable: tas
  - id: attr_title
    category: attribute
    check: attribute
    attribute: title
  - id: var_tas
    category: variable
    check: existence
    variable: tas
  - id: file_format
    category: file
    check: format
    expected_format: NETCDF4
    severity: high
  - id: dim_time
    category: dimension
    check: existence
    dimension: time
  - id: attr_source
    category: attribute
    check: attribute
    attribute: source
    severity: low
  - id: drs_path
    category: directory
    check: structure
  - id: legacy_units
    category: attribute
    check: attribute
    attribute: units
    enabled: false
"#;

    fn config() -> ProjectConfig {
        serde_yaml::from_str(CATALOG).unwrap()
    }

    fn ids(plan: &[&CheckConfig]) -> Vec<String> {
        plan.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_plan_order_is_by_category_then_declaration() -> anyhow::Result<()> {
        let config = config();
        let plan = resolve(&config, &Selection::default())?;

        let rendered = plan
            .iter()
            .map(|c| format!("{} [{}/{}]", c.id, c.category(), config.severity_for(c)))
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!("plan_order", rendered);
        Ok(())
    }

    #[test]
    fn test_skip_removes_checks() -> anyhow::Result<()> {
        let config = config();
        let plan = resolve(&config, &Selection::skip(["tas_nan", "drs_path"]))?;
        assert_eq!(
            ids(&plan),
            vec!["file_format", "dim_time", "var_tas", "attr_title", "attr_source"]
        );
        Ok(())
    }

    #[test]
    fn test_include_keeps_only_named_checks() -> anyhow::Result<()> {
        let config = config();
        let plan = resolve(&config, &Selection::include(["tas_nan", "file_format"]))?;
        assert_eq!(ids(&plan), vec!["file_format", "tas_nan"]);
        Ok(())
    }

    #[test]
    fn test_conflicting_lists_are_rejected() {
        let config = config();
        let selection = Selection {
            skip: vec!["tas_nan".into()],
            include: vec!["dim_time".into()],
        };
        assert_eq!(
            resolve(&config, &selection).unwrap_err(),
            ConfigurationError::ConflictingSelection
        );
    }

    #[test]
    fn test_unknown_and_disabled_ids_are_rejected() {
        let config = config();
        assert_eq!(
            resolve(&config, &Selection::skip(["no_such_check"])).unwrap_err(),
            ConfigurationError::UnknownCheck("no_such_check".into())
        );
        assert_eq!(
            resolve(&config, &Selection::skip(["legacy_units"])).unwrap_err(),
            ConfigurationError::CheckNotEnabled("legacy_units".into())
        );
        assert_eq!(
            resolve(&config, &Selection::include(["legacy_units"])).unwrap_err(),
            ConfigurationError::CheckNotEnabled("legacy_units".into())
        );
    }

    #[test]
    fn test_duplicate_ids_are_rejected() -> anyhow::Result<()> {
        let config: ProjectConfig = serde_yaml::from_str(
            r#"
project_id: X
checks:
  - {id: a, category: dimension, check: existence, dimension: time}
  - {id: a, category: dimension, check: existence, dimension: lat}
"#,
        )?;
        assert_eq!(
            resolve(&config, &Selection::default()).unwrap_err(),
            ConfigurationError::DuplicateCheck("a".into())
        );
        Ok(())
    }

    #[test]
    fn test_override_for_unknown_check_is_rejected() -> anyhow::Result<()> {
        let mut config = config();
        config
            .severity_overrides
            .insert("ghost".into(), crate::domain::scoring::Severity::Low);
        assert_eq!(
            resolve(&config, &Selection::default()).unwrap_err(),
            ConfigurationError::UnknownCheck("ghost".into())
        );
        Ok(())
    }
}
