// cvcheck-core/src/error.rs

use crate::domain::error::ConfigurationError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvCheckError {
    // --- CONFIGURATION (selection, token schema, constraints) ---
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    // --- INFRASTRUCTURE (IO, Parsing) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

impl From<std::io::Error> for CvCheckError {
    fn from(err: std::io::Error) -> Self {
        CvCheckError::Infrastructure(InfrastructureError::Io(err))
    }
}
