// cvcheck-core/src/lib.rs

#![allow(missing_docs)]
// 1. Memory safety
#![deny(unsafe_code)]
// 2. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 3. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// Contracts for the collaborators the engine consumes (dataset reader, vocabulary).
pub mod ports;

// 2. Domain (business core)
// Checks, selection, token derivation, scoring.
// Depends only on the ports.
pub mod domain;

// 3. Infrastructure (Adapters)
// Config files, JSON dataset descriptors, local vocabulary store, fs helpers.
pub mod infrastructure;

// 4. Application (Use Cases)
// Per-file engine and the parallel batch runner.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::CvCheckError;
