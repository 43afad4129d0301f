//! Reserved element values. Anything at or above `NOT_DATA_LIMIT` is a
//! sentinel, not a likelihood.

pub const EMPTY: f64             = 3.29e38;
pub const IGNORED: f64           = 3.28e38;
pub const INFINITY: f64          = 3.40e38;
pub const NEGATIVE_INFINITY: f64 = 3.39e38;
pub const NOT_POSSIBLE: f64      = 3.38e38;
pub const NOT_A_NUMBER: f64      = 3.37e38;
pub const NOT_DATA_LIMIT: f64    = 3.20e38;

/// Does this value fall in the reserved sentinel range?
pub fn is_sentinel(value: f64) -> bool {
    value >= NOT_DATA_LIMIT
}

// Sentinel comparisons allow for the float round trip of 'F' stores.
const SENTINEL_EPS: f64 = 1.0e33;

pub fn is_empty(value: f64) -> bool {
    (value - EMPTY).abs() < SENTINEL_EPS
}

pub fn is_ignored(value: f64) -> bool {
    (value - IGNORED).abs() < SENTINEL_EPS
}
