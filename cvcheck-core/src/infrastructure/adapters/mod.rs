// cvcheck-core/src/infrastructure/adapters/mod.rs

pub mod memory;
pub mod vocabulary;

pub use memory::{InMemoryDataset, JsonDatasetOpener};
pub use vocabulary::LocalVocabulary;
