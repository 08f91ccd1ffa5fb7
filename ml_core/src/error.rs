use std::fmt;

use ndarray::ShapeError;

/// The result type used across the classifier crates.
pub type Result<T> = std::result::Result<T, MlError>;

/// Errors produced by classifiers and layer primitives when inputs are invalid.
#[derive(Debug)]
pub enum MlError {
    /// An unsupported distance-computation selector was requested.
    InvalidAlgorithm { value: usize },

    /// An input is invalid for semantic or domain reasons.
    InvalidInput(&'static str),

    /// An index (label, word id) is not within `0..len`.
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A size invariant was violated (e.g. mismatched lengths).
    SizeMismatch {
        /// Human-readable context for the mismatch (e.g. "labels", "mask").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// The array library refused to reshape an array.
    Shape(ShapeError),
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::InvalidAlgorithm { value } => {
                write!(f, "invalid value {value} for num_loops, expected 0, 1 or 2")
            }
            MlError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlError::IndexOutOfRange { what, index, len } => {
                write!(f, "{what} index {index} is out of range for length {len}")
            }
            MlError::SizeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "size mismatch for {what}: got {got}, expected {expected}")
            }
            MlError::Shape(e) => write!(f, "shape error: {e}"),
        }
    }
}

impl std::error::Error for MlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MlError::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlError {
    fn from(e: ShapeError) -> Self {
        MlError::Shape(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_algorithm_names_the_value() {
        let err = MlError::InvalidAlgorithm { value: 7 };
        assert!(err.to_string().contains('7'));
    }
}
