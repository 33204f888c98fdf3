// cvcheck-core/src/application/mod.rs

pub mod batch;
pub mod engine;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Lets the CLI write `use cvcheck_core::application::{ComplianceEngine, run_batch};`
// without knowing the internal file layout.

pub use batch::{CancellationToken, FileOutcome, run_batch};
pub use engine::ComplianceEngine;
