// cvcheck-core/src/ports/mod.rs

pub mod dataset;
pub mod vocabulary;

pub use dataset::{
    AttrValue, CalendarDate, Compression, DataType, DatasetAccessor, DatasetError, DatasetOpener,
    StorageFormat, VariableInfo,
};
pub use vocabulary::{VocabularyClient, VocabularyError};
