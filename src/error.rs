use thiserror::Error;

// Unified error type for jfnk-diffusion

#[derive(Error, Debug)]
pub enum JfnkError {
    #[error("invalid discretization: {0}")]
    InvalidDiscretization(String),
    #[error("invalid process topology: {0}")]
    InvalidTopology(String),
    #[error("communication failure: {0}")]
    Comm(String),
    #[error("field shape mismatch: expected {expected:?} (ny, nx), got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("storage holds {got} values, a field of this shape needs {expected}")]
    LengthMismatch {
        expected: usize,
        got: usize,
    },
    #[error("solver breakdown at iteration {iteration}: {quantity} is zero or non-finite")]
    Breakdown {
        iteration: usize,
        quantity: &'static str,
    },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
