//! Branch selection and encoder command construction.

pub(crate) mod planner;
