//! Structured error surface shared by every module.
//!
//! All errors are rejected before the first solver sweep or builder mutation
//! that could leave results in a half-written state; hitting an iteration cap
//! is *not* an error (the solver returns whatever it has reached).

use thiserror::Error;

/// Tolerance for "this slice is a probability distribution" checks.
///
/// Base distributions over outcomes and initial-state distributions must sum
/// to 1 within this bound.
pub const DISTRIBUTION_TOL: f64 = 1e-3;

/// Tolerance for "this transition row is normalized" queries.
pub const NORMALIZED_TOL: f64 = 1e-6;

/// Errors raised by builders, solvers, and the simulation layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector's length does not match the container it must index.
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A base or initial distribution has negative entries or does not sum to 1.
    #[error("invalid distribution for {what}: sum {sum}")]
    InvalidDistribution { what: &'static str, sum: f64 },

    /// A scalar parameter is outside its admissible range.
    #[error("invalid parameter {what}: {value}")]
    InvalidParameter { what: &'static str, value: f64 },

    /// A state/action/outcome/sample identifier refers to a slot that cannot
    /// be auto-created (reading before writing).
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A transition's probabilities sum to neither 0 nor 1 at a point where
    /// normalization is required.
    #[error("transition of state {state}, action {action} not normalized: sum {sum}")]
    NotNormalized {
        state: usize,
        action: usize,
        sum: f64,
    },

    /// The operation requires a uniform action count per state.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Check that `p` is non-negative and sums to 1 within [`DISTRIBUTION_TOL`].
///
/// An empty slice is rejected: there is no distribution over nothing.
pub(crate) fn validate_distribution(p: &[f64], what: &'static str) -> Result<()> {
    let mut sum = 0.0;
    for &x in p {
        if !x.is_finite() || x < 0.0 {
            return Err(Error::InvalidDistribution { what, sum: x });
        }
        sum += x;
    }
    if (sum - 1.0).abs() > DISTRIBUTION_TOL {
        return Err(Error::InvalidDistribution { what, sum });
    }
    Ok(())
}

/// Check a value-function-shaped slice against the state count.
///
/// Empty is allowed (meaning "start from zeros").
pub(crate) fn validate_length(v: &[f64], expected: usize, what: &'static str) -> Result<()> {
    if !v.is_empty() && v.len() != expected {
        return Err(Error::ShapeMismatch {
            what,
            expected,
            found: v.len(),
        });
    }
    Ok(())
}

/// Check a discount factor: finite and in `[0, 1]`.
pub(crate) fn validate_discount(discount: f64) -> Result<()> {
    if !discount.is_finite() || !(0.0..=1.0).contains(&discount) {
        return Err(Error::InvalidParameter {
            what: "discount",
            value: discount,
        });
    }
    Ok(())
}
