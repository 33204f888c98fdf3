// cvcheck-core/src/domain/project/mod.rs

pub mod configuration;

pub use configuration::{
    AttributeCheck, AttributeSpec, CheckConfig, CheckKind, DataCheck, DataConfig, DerivationRule,
    DimensionCheck, DirectoryCheck, DrsSchema, FileCheck, Monotonic, OutlierMethod, ProjectConfig,
    ReportingConfig, TypeSet, ValueType, VariableCheck,
};
