// cvcheck-core/src/domain/mod.rs

pub mod calendar;
pub mod checks;
pub mod error;
pub mod project;
pub mod scoring;
pub mod selection;
pub mod tokens;

pub use error::{CollaboratorError, ConfigurationError};
