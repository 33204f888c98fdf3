// cvcheck-core/src/infrastructure/config/project.rs

use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::project::{CheckConfig, DerivationRule, ProjectConfig};
use crate::infrastructure::error::InfrastructureError;

const MAIN_CONFIG_NAMES: [&str; 2] = ["cvcheck.yaml", "cvcheck_project.yaml"];

// --- LOADER ---

/// Loads, layers and validates the project rule set.
///
/// `path` is either the main YAML file or the directory that holds it.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_project_config(path: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Discovery of the main file
    let config_path = if path.is_file() {
        path.to_path_buf()
    } else {
        find_main_config(path)?
    };
    let project_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    info!(path = ?config_path, "Loading project configuration");

    // 2. Base YAML
    let mut config: ProjectConfig = load_fragment(&config_path)?;

    // 3. Satellites (derivations.yml, checks.yml)
    for folder in &config.config_paths.clone() {
        let config_dir = project_dir.join(folder);
        if config_dir.is_dir() {
            load_satellite_configs(&mut config, &config_dir)?;
        } else {
            warn!(dir = ?config_dir, "Configured satellite directory does not exist");
        }
    }

    // 4. Environment overrides (layering)
    apply_env_overrides(&mut config)?;

    // 5. Validation
    config.validate()?;
    if let Some(check) = config.checks.iter().find(|c| c.id.trim().is_empty()) {
        return Err(InfrastructureError::ConfigError(format!(
            "a '{}' check has an empty id",
            check.category()
        )));
    }

    info!(
        project = %config.project_id,
        checks = config.checks.len(),
        derivations = config.derivations.len(),
        "Project configuration loaded"
    );
    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in MAIN_CONFIG_NAMES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "{} (checked: {:?})",
        root.display(),
        MAIN_CONFIG_NAMES
    )))
}

// --- GENERIC LOGIC ---

/// Loads a typed configuration fragment. `T` is the wrapper expected in the file.
fn load_fragment<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = fs::read_to_string(path).map_err(|e| {
        InfrastructureError::ConfigError(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

fn load_satellite_configs(
    config: &mut ProjectConfig,
    config_dir: &Path,
) -> Result<(), InfrastructureError> {
    // A. Token derivation table
    let derivations_path = config_dir.join("derivations.yml");
    if derivations_path.exists() {
        #[derive(Deserialize)]
        struct DerivationsWrapper {
            derivations: BTreeMap<String, DerivationRule>,
        }

        let wrapper: DerivationsWrapper = load_fragment(&derivations_path)?;
        let count = wrapper.derivations.len();
        config.derivations.extend(wrapper.derivations);
        info!(count, "  🧬 Derivation rules loaded");
    }

    // B. Additional checks, appended after the inline ones
    let checks_path = config_dir.join("checks.yml");
    if checks_path.exists() {
        #[derive(Deserialize)]
        struct ChecksWrapper {
            checks: Vec<CheckConfig>,
        }

        let wrapper: ChecksWrapper = load_fragment(&checks_path)?;
        let count = wrapper.checks.len();
        config.checks.extend(wrapper.checks);
        info!(count, "  ✅ Checks loaded");
    }

    Ok(())
}

fn apply_env_overrides(config: &mut ProjectConfig) -> Result<(), InfrastructureError> {
    if let Ok(val) = std::env::var("CVCHECK_MAX_REPORTED_VIOLATIONS") {
        let limit = val.trim().parse::<usize>().map_err(|_| {
            InfrastructureError::ConfigError(format!(
                "CVCHECK_MAX_REPORTED_VIOLATIONS must be a positive integer, got '{}'",
                val
            ))
        })?;
        info!(
            old = config.reporting.max_reported_violations,
            new = limit,
            "Overriding report truncation via ENV"
        );
        config.reporting.max_reported_violations = limit;
    }
    if let Ok(val) = std::env::var("CVCHECK_PROJECT_ID") {
        info!(old = %config.project_id, new = %val, "Overriding project id via ENV");
        config.project_id = val;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const MAIN: &str = r#"
project_id: CMIP6
config-paths: ["config"]
derivations:
  table_id: {from: filename_token, position: 1}
checks:
  - {id: dim_time, category: dimension, check: existence, dimension: time}
"#;

    #[test]
    fn test_directory_discovery_and_satellites() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("cvcheck.yaml"), MAIN)?;
        fs::create_dir(dir.path().join("config"))?;
        fs::write(
            dir.path().join("config/derivations.yml"),
            "derivations:\n  experiment_id: {from: directory_token, position: 4}\n",
        )?;
        fs::write(
            dir.path().join("config/checks.yml"),
            "checks:\n  - {id: var_tas, category: variable, check: existence, variable: tas}\n",
        )?;

        let config = load_project_config(dir.path())?;

        assert_eq!(config.derivations.len(), 2);
        let ids: Vec<_> = config.checks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["dim_time", "var_tas"]);
        Ok(())
    }

    #[test]
    fn test_file_path_is_accepted() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("my_rules.yaml");
        fs::write(&file, "project_id: CORDEX\n")?;

        let config = load_project_config(&file)?;
        assert_eq!(config.project_id, "CORDEX");
        assert!(config.checks.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_config_is_reported() {
        let dir = tempdir().unwrap();
        let err = load_project_config(dir.path()).unwrap_err();
        assert!(matches!(err, InfrastructureError::ConfigNotFound(_)));
    }

    #[test]
    fn test_validation_rejects_empty_project_and_zero_limit() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("cvcheck.yaml");

        fs::write(&file, "project_id: ''\n")?;
        assert!(matches!(
            load_project_config(&file),
            Err(InfrastructureError::Validation(_))
        ));

        fs::write(&file, "project_id: CMIP6\nreporting: {max_reported_violations: 0}\n")?;
        assert!(matches!(
            load_project_config(&file),
            Err(InfrastructureError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_check_kind_is_a_yaml_error() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("cvcheck.yaml");
        fs::write(
            &file,
            "project_id: CMIP6\nchecks:\n  - {id: x, category: dimension, check: teleport}\n",
        )?;
        assert!(matches!(
            load_project_config(&file),
            Err(InfrastructureError::YamlError(_))
        ));
        Ok(())
    }
}
