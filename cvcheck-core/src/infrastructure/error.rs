// cvcheck-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(cvcheck::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(cvcheck::infra::yaml),
        help("Check your YAML syntax (indentation, types, category/check tags).")
    )]
    YamlError(#[from] serde_yaml::Error),

    // --- DATASET DESCRIPTORS / REPORTS ---
    #[error("JSON Error: {0}")]
    #[diagnostic(code(cvcheck::infra::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(cvcheck::infra::config))]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(
        code(cvcheck::infra::config_missing),
        help("Pass --config with a cvcheck.yaml file or the directory holding it.")
    )]
    ConfigNotFound(String),

    #[error("Invalid project configuration: {0}")]
    #[diagnostic(code(cvcheck::infra::validation))]
    Validation(#[from] validator::ValidationErrors),
}
