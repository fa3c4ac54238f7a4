//! Utility functions for string normalization and display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    age_display, eq_ignore_case, normalize_key, parse_leading_int, starts_with_ignore_case,
    strip_line_breaks, strip_whitespace,
};
