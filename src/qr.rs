//! The floating R-factor of the basis.
//!
//! `R` is the upper-triangular factor of a QR decomposition of Bᵀ,
//! equivalently the transposed Cholesky factor of the Gram matrix B·Bᵀ.
//! The Gram matrix is accumulated exactly in integers and rounded once,
//! which sidesteps the cancellation a floating Gram–Schmidt pass suffers
//! on long, nearly parallel vectors. R is recomputed from B at every
//! driver pass and never persisted.

use crate::coefficient::Coefficient;
use crate::error::ReduceError;
use crate::matrix::Matrix;

/// Row-major dense n×n buffer holding the upper-triangular R.
///
/// Entries below the diagonal are kept at zero; the diagonal is positive
/// by construction.
#[derive(Clone, Debug)]
pub struct RMatrix {
    n: usize,
    data: Vec<f64>,
}

impl RMatrix {
    pub(crate) fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Dense copy of the square window `[lo, hi)`, row-major with stride
    /// `hi - lo`. This is the private view a block kernel works on.
    pub(crate) fn window(&self, lo: usize, hi: usize) -> Vec<f64> {
        let m = hi - lo;
        let mut out = vec![0.0; m * m];
        for i in 0..m {
            for j in 0..m {
                out[i * m + j] = self.at(lo + i, lo + j);
            }
        }
        out
    }

    /// Write a kernel's window back over `[lo, hi)`.
    pub(crate) fn write_window(&mut self, lo: usize, win: &[f64], m: usize) {
        for i in 0..m {
            for j in 0..m {
                *self.at_mut(lo + i, lo + j) = win[i * m + j];
            }
        }
    }

    /// Propagate a block's column transform to the rows above its window,
    /// keeping the full R consistent without a fresh factorization:
    /// `R[0..lo, lo..lo+m] := R[0..lo, lo..lo+m] · U_w`.
    pub(crate) fn apply_window_cols(&mut self, lo: usize, uw: &[i128], m: usize) {
        if lo == 0 {
            return;
        }
        let mut old = vec![0.0; m];
        for row in 0..lo {
            for (j, slot) in old.iter_mut().enumerate() {
                *slot = self.at(row, lo + j);
            }
            for j in 0..m {
                let mut acc = 0.0;
                for i in 0..m {
                    let c = uw[i * m + j];
                    if c != 0 {
                        acc += c as f64 * old[i];
                    }
                }
                *self.at_mut(row, lo + j) = acc;
            }
        }
    }
}

/// Pivot threshold relative to the vector's full squared norm: below it
/// the remaining orthogonal part has drowned in rounding and the basis
/// counts as numerically rank-deficient.
const RANK_EPS: f64 = 1e-13;

/// Compute the R-factor of `basis`.
///
/// Pure function of the basis; fails when a Gram entry falls outside the
/// f64 range or when a Cholesky pivot is not meaningfully positive, i.e.
/// the basis is numerically rank-deficient.
pub(crate) fn rfactor<T: Coefficient>(basis: &Matrix<T>) -> Result<RMatrix, ReduceError> {
    let n = basis.rows();
    let mut gram = vec![0.0; n * n];
    for i in 0..n {
        for j in i..n {
            let g = basis.dot_rows_f64(i, j);
            if !g.is_finite() {
                return Err(ReduceError::GramOverflow(i, j));
            }
            gram[i * n + j] = g;
        }
    }

    let mut r = RMatrix {
        n,
        data: vec![0.0; n * n],
    };
    for i in 0..n {
        for j in i..n {
            let mut s = gram[i * n + j];
            for t in 0..i {
                s -= r.at(t, i) * r.at(t, j);
            }
            if i == j {
                if !s.is_finite() || s <= RANK_EPS * gram[i * n + i].max(1.0) {
                    return Err(ReduceError::RankDeficient(i));
                }
                *r.at_mut(i, i) = s.sqrt();
            } else {
                *r.at_mut(i, j) = s / r.at(i, i);
            }
        }
    }
    Ok(r)
}
