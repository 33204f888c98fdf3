// cvcheck-core/src/ports/vocabulary.rs

// The controlled-vocabulary store as seen by the checks: a yes/no membership
// query. Implementations are shared across file workers, hence Send + Sync and
// no per-file state.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VocabularyError {
    #[error("Vocabulary service unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown project '{0}' in vocabulary store")]
    UnknownProject(String),

    #[error("Unknown collection '{collection}' for project '{project}'")]
    UnknownCollection { project: String, collection: String },
}

pub trait VocabularyClient: Send + Sync {
    fn valid_term(
        &self,
        value: &str,
        project_id: &str,
        collection_id: &str,
    ) -> Result<bool, VocabularyError>;
}
