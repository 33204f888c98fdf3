// cvcheck-core/src/domain/error.rs

use crate::ports::{DatasetError, VocabularyError};
use miette::Diagnostic;
use thiserror::Error;

/// Fatal problems detected before any check runs.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Unknown check id '{0}'")]
    #[diagnostic(
        code(cvcheck::config::unknown_check),
        help("Run `cvcheck list` to see the checks declared by the project.")
    )]
    UnknownCheck(String),

    #[error("Both a skip list and an include list were given")]
    #[diagnostic(
        code(cvcheck::config::conflicting_selection),
        help("Use either --skip or --include, not both.")
    )]
    ConflictingSelection,

    #[error("Check '{0}' is not enabled by the project configuration")]
    #[diagnostic(
        code(cvcheck::config::check_not_enabled),
        help("Set `enabled: true` on the check or drop it from the selection.")
    )]
    CheckNotEnabled(String),

    #[error("Check id '{0}' is declared more than once")]
    #[diagnostic(code(cvcheck::config::duplicate_check))]
    DuplicateCheck(String),

    #[error("Invalid DRS token schema: {0}")]
    #[diagnostic(
        code(cvcheck::config::token_schema),
        help("Check the `drs` section (directory and filename key lists).")
    )]
    InvalidTokenSchema(String),

    #[error("Invalid derivation rule for '{attribute}': {reason}")]
    #[diagnostic(
        code(cvcheck::config::derivation),
        help("Templates use {{name}} placeholders and positions must exist in the DRS schema.")
    )]
    InvalidDerivation { attribute: String, reason: String },

    #[error("Invalid pattern in check '{check}': {reason}")]
    #[diagnostic(code(cvcheck::config::pattern))]
    InvalidPattern { check: String, reason: String },
}

/// A collaborator failed while a check was running. The engine turns it into
/// an `Error` outcome for that check only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
}
