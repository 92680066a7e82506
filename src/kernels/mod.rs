//! In-block reduction kernels.
//!
//! A kernel operates on a private N×N window of R (row-major `f64`) and a
//! matching transform accumulator U_w (row-major `i128`, starting as the
//! identity), both contiguous. Columns of the window correspond to basis
//! vectors; every update is an elementary column operation, a signed
//! column swap expressed as a combination insertion, or a column negation,
//! so U_w stays unimodular by construction. Row rotations repair the
//! triangular shape of R after an insertion and act on the Q-side only,
//! leaving U_w untouched.
//!
//! Kernels are total: they cannot fail, and a step budget bounds the rare
//! floating-point tie cases that would otherwise oscillate.

pub(crate) mod bkz;
pub(crate) mod enumerate;
pub(crate) mod lll;
pub(crate) mod size_reduce;

/// Size-reduction trigger threshold on |R[i,j] / R[i,i]|.
///
/// Slightly above one half so that entries already reduced up to floating
/// noise are left alone; without the slack a quotient of exactly ±1/2
/// would flip sign on every pass and reduction would never be idempotent.
pub(crate) const SIZE_REDUCTION_ETA: f64 = 0.501;

/// Relative slack on the Lovász test. Violations within this tolerance
/// are treated as satisfied, which guarantees forward progress.
pub(crate) const LOVASZ_REL_EPS: f64 = 1e-10;

/// Diagonal entries below this are treated as underflowed; conditions
/// involving them count as satisfied.
pub(crate) const MIN_DIAG: f64 = f64::MIN_POSITIVE;

/// Largest quotient emitted from the floating R; rounding is exact below
/// 2^53 and the next QR pass refines anything this large.
const MAX_QUOTIENT: f64 = 9_007_199_254_740_992.0;

/// Rounded size-reduction quotient for `num / den`, zero when the ratio is
/// already within the eta threshold or cannot be trusted.
pub(crate) fn quotient(num: f64, den: f64) -> i64 {
    let mu = num / den;
    if !mu.is_finite() || mu.abs() <= SIZE_REDUCTION_ETA {
        return 0;
    }
    mu.round().max(-MAX_QUOTIENT).min(MAX_QUOTIENT) as i64
}

/// Column update `col[dst] += q · col[src]` on the window pair, `src` must
/// be left of `dst`. R is touched on rows `0..=src` only (the rest of the
/// source column is zero); U_w on all rows.
pub(crate) fn col_addmul(
    r: &mut [f64],
    u: &mut [i128],
    n: usize,
    src: usize,
    dst: usize,
    q: i64,
) {
    debug_assert!(src < dst && dst < n);
    let qf = q as f64;
    for t in 0..=src {
        r[t * n + dst] += qf * r[t * n + src];
    }
    let qi = q as i128;
    for t in 0..n {
        u[t * n + dst] += qi * u[t * n + src];
    }
}

/// Negate column `j`, absorbing the sign flip into U_w.
pub(crate) fn negate_col(r: &mut [f64], u: &mut [i128], n: usize, j: usize) {
    for t in 0..=j {
        r[t * n + j] = -r[t * n + j];
    }
    for t in 0..n {
        u[t * n + j] = -u[t * n + j];
    }
}

/// Givens rotation of rows `ra` (upper) and `rb = ra + 1`, chosen to zero
/// `R[rb, col_from]`. Applies to columns `col_from..` and leaves the new
/// pivot `R[ra, col_from]` positive. Q-side only: U_w is not involved.
pub(crate) fn givens_rows(r: &mut [f64], n: usize, ra: usize, rb: usize, col_from: usize) {
    let a = r[ra * n + col_from];
    let b = r[rb * n + col_from];
    if b == 0.0 {
        return;
    }
    let h = a.hypot(b);
    let (c, s) = (a / h, b / h);
    for col in col_from..n {
        let x = r[ra * n + col];
        let y = r[rb * n + col];
        r[ra * n + col] = c * x + s * y;
        r[rb * n + col] = c * y - s * x;
    }
    r[ra * n + col_from] = h;
    r[rb * n + col_from] = 0.0;
}

/// Replace column `j` by the combination `Σ coeffs[i] · col[j + i]` and
/// shift the displaced columns one slot right.
///
/// `coeffs` spans columns `j..j + coeffs.len()` and its trailing
/// coefficient must be ±1, which is what makes the induced transform
/// unimodular. The classical Lovász swap is the special case
/// `coeffs = [0, 1]`; a deep insertion is `[0, …, 0, 1]`; BKZ inserts a
/// general enumerated combination. Triangularity of R is restored by a
/// bottom-up chain of row rotations and any diagonal entry driven
/// negative is repaired by column negation.
pub(crate) fn insert_combination(
    r: &mut [f64],
    u: &mut [i128],
    n: usize,
    j: usize,
    coeffs: &[i64],
) {
    let l = coeffs.len();
    debug_assert!(l >= 1 && j + l <= n);
    let last = coeffs[l - 1];
    debug_assert!(last == 1 || last == -1);

    let mut newr = vec![0.0; n];
    let mut newu = vec![0i128; n];
    for t in 0..n {
        let mut sr = 0.0;
        let mut su = 0i128;
        for (idx, &c0) in coeffs.iter().enumerate() {
            let c = i128::from(last) * i128::from(c0);
            if c != 0 {
                sr += c as f64 * r[t * n + j + idx];
                su += c * u[t * n + j + idx];
            }
        }
        newr[t] = sr;
        newu[t] = su;
    }

    for col in (j..j + l - 1).rev() {
        for t in 0..n {
            r[t * n + col + 1] = r[t * n + col];
            u[t * n + col + 1] = u[t * n + col];
        }
    }
    for t in 0..n {
        r[t * n + j] = newr[t];
        u[t * n + j] = newu[t];
    }

    for t in (j + 1..j + l).rev() {
        givens_rows(r, n, t - 1, t, j);
    }
    for t in j..j + l {
        if r[t * n + t] < 0.0 {
            negate_col(r, u, n, t);
        }
    }
}

/// The in-block kernel selected by the driver, dispatched once per block.
#[derive(Clone, Copy, Debug)]
pub(crate) enum BlockKernel {
    Lll { delta: f64 },
    DeepLll { delta: f64, depth: usize },
    Bkz { delta: f64, beta: usize },
}

impl BlockKernel {
    /// Run the kernel on one window; returns the number of basis-changing
    /// operations (zero means U_w is still the identity).
    pub(crate) fn run(&self, n: usize, r: &mut [f64], u: &mut [i128]) -> usize {
        if n < 2 {
            return 0;
        }
        match *self {
            BlockKernel::Lll { delta } => lll::lll_window(r, u, n, 0, n, delta, 1),
            BlockKernel::DeepLll { delta, depth } => {
                lll::lll_window(r, u, n, 0, n, delta, depth)
            }
            BlockKernel::Bkz { delta, beta } => bkz::bkz_tour(r, u, n, delta, beta),
        }
    }
}
