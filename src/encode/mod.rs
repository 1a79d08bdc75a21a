//! Encoder process execution and output verification.

pub(crate) mod gateway;
