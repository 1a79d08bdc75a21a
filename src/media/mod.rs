//! Directory cataloging, duration probing and stem-based pair resolution.

pub(crate) mod asset;
pub(crate) mod catalog;
pub(crate) mod pairing;
pub(crate) mod probe;
