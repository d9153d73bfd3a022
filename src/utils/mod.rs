//! Shared utilities

pub mod file_utils;
pub mod logging;
pub mod validation;
