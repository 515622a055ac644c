//! Shared test utilities for the urban layers dashboard workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A scriptable in-memory backend
//! - Fixtures mirroring the default layer catalog
//! - Synthetic backend response generators
//! - Approximate float assertions

pub mod fake_backend;
pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fake_backend::{FakeBackend, RecordedCall};
pub use generators::*;
pub use paths::*;

/// Assert two numbers differ by at most `epsilon`. NaN never matches.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(report.stats.scalar(Metric::AverageNdvi).unwrap(), 0.27, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        if !((left - right).abs() <= epsilon) {
            panic!(
                "values not within {:e}: left = {}, right = {}",
                epsilon, left, right
            );
        }
    }};
}
