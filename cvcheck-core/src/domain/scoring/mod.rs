// cvcheck-core/src/domain/scoring/mod.rs

pub mod category;
pub mod outcome;
pub mod report;
pub mod severity;

pub use category::Category;
pub use outcome::{Assertion, CheckOutcome, CheckStatus, OutcomeBuilder};
pub use report::{Bucket, ComplianceReport};
pub use severity::{Criteria, Severity};
