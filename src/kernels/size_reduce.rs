//! Size-reduction over an R range.
//!
//! Both variants operate on the floating R alone and report every column
//! update through a sink, `sink(src, dst, q)` meaning the exact integer
//! operation `b_dst += q · b_src`. The driver points the sink at the
//! basis and the global transform for the inter-block pass; R itself is
//! updated here so later quotients see earlier updates.
//!
//! The classical variant walks columns left to right, reducing each
//! against all earlier ones, and establishes `|R[i,j]| ≤ ½·R[i,i]` up to
//! the eta slack. The Seysen variant halves the range recursively,
//! reduces both halves, then clears the coupling block in one batch whose
//! quotients come from a triangular solve against the reduced upper-left
//! half, i.e. from the inverse of the upper-triangular part. Its
//! fixed points satisfy the same quotient-free criterion; individual
//! entries may overshoot the classical half bound by the accumulated
//! rounding of the batch, which the next pass mops up.

use super::quotient;
use crate::error::ReduceError;

pub(crate) type OpSink<'a> = &'a mut dyn FnMut(usize, usize, i64) -> Result<(), ReduceError>;

/// Classical size-reduction of columns `lo..hi` against each other.
/// Returns the number of emitted operations.
pub(crate) fn size_reduce(
    r: &mut [f64],
    n: usize,
    lo: usize,
    hi: usize,
    sink: OpSink<'_>,
) -> Result<usize, ReduceError> {
    let mut ops = 0;
    for k in lo + 1..hi {
        for i in (lo..k).rev() {
            let q = quotient(r[i * n + k], r[i * n + i]);
            if q != 0 {
                let qf = q as f64;
                for t in 0..=i {
                    r[t * n + k] -= qf * r[t * n + i];
                }
                sink(i, k, -q)?;
                ops += 1;
            }
        }
    }
    Ok(ops)
}

/// Seysen reduction of columns `lo..hi`.
pub(crate) fn seysen_reduce(
    r: &mut [f64],
    n: usize,
    lo: usize,
    hi: usize,
    sink: OpSink<'_>,
) -> Result<usize, ReduceError> {
    if hi - lo <= 1 {
        return Ok(0);
    }
    let mid = lo + (hi - lo) / 2;
    let mut ops = seysen_reduce(r, n, lo, mid, &mut *sink)?;
    ops += seysen_reduce(r, n, mid, hi, &mut *sink)?;

    let h = mid - lo;
    let mut w = vec![0.0; h];
    for j in mid..hi {
        // Triangular solve R11 · w = R[lo..mid, j].
        for ii in (0..h).rev() {
            let i = lo + ii;
            let mut s = r[i * n + j];
            for (tt, wt) in w.iter().enumerate().skip(ii + 1) {
                s -= r[i * n + lo + tt] * wt;
            }
            w[ii] = s / r[i * n + i];
        }
        // All quotients for this column are fixed before any is applied;
        // source columns live left of `mid` and stay untouched, so the
        // batch is order-independent.
        for ii in (0..h).rev() {
            let q = quotient(w[ii], 1.0);
            if q != 0 {
                let i = lo + ii;
                let qf = q as f64;
                for t in 0..=i {
                    r[t * n + j] -= qf * r[t * n + i];
                }
                sink(i, j, -q)?;
                ops += 1;
            }
        }
    }
    Ok(ops)
}
