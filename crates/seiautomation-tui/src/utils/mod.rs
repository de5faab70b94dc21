//! Utility functions for string formatting.

pub mod format;

pub use format::{format_local_time, truncate_string};
