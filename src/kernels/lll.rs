//! LLL and deep-insertion LLL over an R window.
//!
//! The classical algorithm is the `depth = 1` case of the deep-insertion
//! loop: at index `k` the candidate insertion position `j = k - 1` with
//! condition `‖π_{k-1}(b_k)‖² < δ·R[k-1,k-1]²` is exactly the Lovász swap
//! test, so one state machine serves both kernels.

use super::{
    col_addmul, insert_combination, quotient, LOVASZ_REL_EPS, MIN_DIAG,
};

/// Size-reduce column `k` of the window against columns `lo..k`,
/// accumulating into U_w. Returns the number of column updates.
pub(crate) fn reduce_column(
    r: &mut [f64],
    u: &mut [i128],
    n: usize,
    lo: usize,
    k: usize,
) -> usize {
    let mut ops = 0;
    for i in (lo..k).rev() {
        let q = quotient(r[i * n + k], r[i * n + i]);
        if q != 0 {
            col_addmul(r, u, n, i, k, -q);
            ops += 1;
        }
    }
    ops
}

/// Reduce the index range `[lo, hi)` of the window to LLL(δ), or to
/// deep-LLL(δ, depth) for `depth > 1`. Returns the number of
/// basis-changing operations performed.
///
/// Terminates because every insertion strictly shrinks the GSO potential
/// of the range by more than the Lovász slack; the step budget only backs
/// that up against floating-point ties.
pub(crate) fn lll_window(
    r: &mut [f64],
    u: &mut [i128],
    n: usize,
    lo: usize,
    hi: usize,
    delta: f64,
    depth: usize,
) -> usize {
    debug_assert!(depth >= 1);
    debug_assert!(lo <= hi && hi <= n);
    if hi - lo < 2 {
        return 0;
    }

    let mut ops = 0;
    let budget = 1000 * (hi - lo) * (hi - lo);
    let mut steps = 0;

    let mut k = lo + 1;
    while k < hi {
        steps += 1;
        if steps > budget {
            break;
        }

        ops += reduce_column(r, u, n, lo, k);

        // Walk candidate insertion positions left to right; the leftmost
        // position whose prefix norm strictly beats the Lovász bound wins.
        let jmin = if k - lo > depth { k - depth } else { lo };
        let mut c: f64 = (jmin..=k).map(|t| r[t * n + k] * r[t * n + k]).sum();
        let mut target = None;
        for j in jmin..k {
            let d = r[j * n + j];
            let d2 = d * d;
            if d2 > MIN_DIAG
                && c.is_finite()
                && c < delta * d2 * (1.0 - LOVASZ_REL_EPS)
            {
                target = Some(j);
                break;
            }
            c -= r[j * n + k] * r[j * n + k];
        }

        match target {
            Some(j) => {
                // Cyclic shift of columns [j, k]: insert b_k at position j.
                let mut coeffs = vec![0i64; k - j + 1];
                coeffs[k - j] = 1;
                insert_combination(r, u, n, j, &coeffs);
                ops += 1;
                k = if j > lo { j } else { lo + 1 };
            }
            None => k += 1,
        }
    }
    ops
}
