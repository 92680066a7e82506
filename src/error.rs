//! Error surface of the reduction driver.
//!
//! Kernels are total; every failure originates in the driver (input
//! validation, the QR factorizer, or exact integer composition). Timeouts
//! and cooperative cancellation are not errors; they are reported through
//! [`crate::metrics::Status`] on an otherwise successful result.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReduceError {
    #[error("basis must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("basis rows must all have the same length")]
    RaggedRows,

    #[error("shape mismatch in {0}x{1} by {2}x{3} product")]
    ShapeMismatch(usize, usize, usize, usize),

    #[error("basis must be non-empty")]
    Empty,

    #[error("delta must lie in (0.25, 1], got {0}")]
    InvalidDelta(f64),

    #[error("insertion depth must be at least 1")]
    InvalidDepth,

    #[error("BKZ block size {beta} not in [2, {max}]")]
    BetaOutOfRange { beta: usize, max: usize },

    #[error("BKZ block size {beta} exceeds working block width {width}")]
    BetaExceedsBlock { beta: usize, width: usize },

    #[error("BKZ tour count must be at least 1")]
    InvalidTours,

    #[error("basis is numerically rank-deficient at row {0}")]
    RankDeficient(usize),

    #[error("Gram matrix entry at ({0}, {1}) is outside the f64 range")]
    GramOverflow(usize, usize),

    #[error(
        "integer overflow while composing the transform; \
         retry with arbitrary-precision entries"
    )]
    Overflow,

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}
