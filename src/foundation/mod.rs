//! Shared primitives: error taxonomy, frame rates and canvas sizes.

pub(crate) mod core;
pub(crate) mod error;
