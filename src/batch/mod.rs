//! Batch and single-pair runs with progress reporting.

pub(crate) mod orchestrator;
