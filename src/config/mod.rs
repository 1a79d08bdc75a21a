//! Injected configuration: supported formats, encoder settings and overlay tuning.

pub(crate) mod settings;
