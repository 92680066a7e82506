//! Segmented parallel lattice basis reduction.
//!
//! # Introduction
//! `block-lll` reduces an integer lattice basis to a shorter, nearly
//! orthogonal one with the LLL family of algorithms: classical LLL,
//! deep-insertion LLL, and BKZ with pruned enumeration. The engine keeps
//! three coupled representations consistent: the exact integer basis B,
//! the exact unimodular transform U with `U·B_original = B_reduced`, and
//! a floating R-factor recomputed from B on every pass. Work is
//! partitioned into disjoint windows of R that are reduced in parallel
//! and recombined deterministically, with the window grid staggered
//! between passes so boundary pairs are not starved.
//!
//! Basis entries are either `i64` (all arithmetic checked, overflow is a
//! reported error) or `rug::Integer`.
//!
//! # Examples
//!
//! ```rust
//! use block_lll::{lll_reduce, Matrix, Options};
//!
//! let basis = Matrix::from_rows(vec![
//!     vec![1i64, 2, 3],
//!     vec![2, 3, 4],
//!     vec![3, 4, 6],
//! ])
//! .unwrap();
//!
//! let reduction = lll_reduce(basis, &Options::default()).unwrap();
//! assert!(reduction.metrics.rhf < 1.05);
//! ```

pub mod coefficient;
pub mod driver;
pub mod error;
pub mod matrix;
pub mod metrics;

mod kernels;
mod pruning;
mod qr;

pub use crate::coefficient::Coefficient;
pub use crate::driver::{Algorithm, Options, Reduction};
pub use crate::error::ReduceError;
pub use crate::matrix::Matrix;
pub use crate::metrics::{Metrics, Status};
pub use crate::pruning::MAX_ENUM_N;

/// Reduce `basis` with LLL(δ), or deep-insertion LLL when
/// `opts.depth > 1`.
pub fn lll_reduce<T: Coefficient>(
    basis: Matrix<T>,
    opts: &Options,
) -> Result<Reduction<T>, ReduceError> {
    let algorithm = if opts.depth > 1 {
        Algorithm::DeepLll { depth: opts.depth }
    } else {
        Algorithm::Lll
    };
    driver::reduce(basis, algorithm, opts)
}

/// Reduce `basis` with BKZ: `tours` sweeps of β-wide enumeration windows
/// on top of the LLL pass structure.
pub fn bkz_reduce<T: Coefficient>(
    basis: Matrix<T>,
    beta: usize,
    tours: usize,
    opts: &Options,
) -> Result<Reduction<T>, ReduceError> {
    driver::reduce(basis, Algorithm::Bkz { beta, tours }, opts)
}

/// Check the LLL(δ) postconditions of `basis`: size-reduction and the
/// Lovász condition on every adjacent pair, both up to the numerical
/// tolerance the kernels themselves use.
pub fn is_lll_reduced<T: Coefficient>(
    basis: &Matrix<T>,
    delta: f64,
) -> Result<bool, ReduceError> {
    if !basis.is_square() {
        return Err(ReduceError::NotSquare {
            rows: basis.rows(),
            cols: basis.cols(),
        });
    }
    if !(delta > 0.25 && delta <= 1.0) {
        return Err(ReduceError::InvalidDelta(delta));
    }
    let r = qr::rfactor(basis)?;
    let n = basis.rows();
    for i in 0..n {
        for j in i + 1..n {
            if r.at(i, j).abs() > kernels::SIZE_REDUCTION_ETA * r.at(i, i) + 1e-9 {
                return Ok(false);
            }
        }
    }
    for k in 1..n {
        let lhs = delta * r.at(k - 1, k - 1) * r.at(k - 1, k - 1);
        let rhs = r.at(k, k) * r.at(k, k) + r.at(k - 1, k) * r.at(k - 1, k);
        if lhs > rhs * (1.0 + 1e-9) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Exact check that `transform · original == reduced`.
pub fn verify_transform<T: Coefficient>(
    original: &Matrix<T>,
    transform: &Matrix<T>,
    reduced: &Matrix<T>,
) -> Result<bool, ReduceError> {
    Ok(&transform.gemm(original)? == reduced)
}

#[cfg(test)]
mod test {
    use crate::{
        bkz_reduce, is_lll_reduced, lll_reduce, metrics, qr, verify_transform,
        Matrix, Options, ReduceError, Status,
    };

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rug::Integer;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn small(rows: Vec<Vec<i64>>) -> Matrix<i64> {
        Matrix::from_rows(rows).unwrap()
    }

    fn big(m: &Matrix<i64>) -> Matrix<Integer> {
        Matrix::from_rows(
            (0..m.rows())
                .map(|i| m.row(i).iter().map(|&v| Integer::from(v)).collect())
                .collect(),
        )
        .unwrap()
    }

    /// Fraction-free (Bareiss) determinant.
    fn det_big(m: &Matrix<Integer>) -> Integer {
        let n = m.rows();
        let mut a: Vec<Vec<Integer>> = (0..n).map(|i| m.row(i).to_vec()).collect();
        let mut sign = 1;
        let mut prev = Integer::from(1);
        for k in 0..n {
            if a[k][k] == 0 {
                match (k + 1..n).find(|&i| a[i][k] != 0) {
                    Some(i) => {
                        a.swap(k, i);
                        sign = -sign;
                    }
                    None => return Integer::new(),
                }
            }
            for i in k + 1..n {
                for j in k + 1..n {
                    let t = Integer::from(&a[i][j] * &a[k][k])
                        - Integer::from(&a[i][k] * &a[k][j]);
                    a[i][j] = t / &prev;
                }
                a[i][k] = Integer::new();
            }
            prev = a[k][k].clone();
        }
        let d = a[n - 1][n - 1].clone();
        if sign < 0 {
            -d
        } else {
            d
        }
    }

    fn unimodular(m: &Matrix<i64>) -> bool {
        let d = det_big(&big(m));
        d == 1 || d == -1
    }

    fn min_row_norm_sq<T: crate::Coefficient>(m: &Matrix<T>) -> f64 {
        (0..m.rows())
            .map(|i| m.dot_rows_f64(i, i))
            .fold(f64::INFINITY, f64::min)
    }

    /// Subset-sum embedding: rows `(e_i | K·w_i)` plus `(0 … 0 | K·M)`.
    fn knapsack(weights: &[i64], target: i64, scale: i64) -> Matrix<i64> {
        let n = weights.len() + 1;
        let mut rows = Vec::with_capacity(n);
        for (i, &w) in weights.iter().enumerate() {
            let mut row = vec![0i64; n];
            row[i] = 1;
            row[n - 1] = scale * w;
            rows.push(row);
        }
        let mut last = vec![0i64; n];
        last[n - 1] = scale * target;
        rows.push(last);
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn unimodular_lattice_reduces_to_unit_rows() {
        let basis = small(vec![vec![1, 2, 3], vec![2, 3, 4], vec![3, 4, 6]]);
        let red = lll_reduce(basis.clone(), &Options::default()).unwrap();

        assert!(verify_transform(&basis, &red.transform, &red.basis).unwrap());
        assert!(unimodular(&red.transform));
        assert_eq!(red.metrics.status, Status::Converged);
        assert!(red.metrics.rhf <= 1.05);
        assert!(is_lll_reduced(&red.basis, 0.99).unwrap());
        // det B = -1, so the lattice is all of Z³ and a δ = 0.99
        // reduction must land on signed unit vectors.
        for i in 0..3 {
            let row = red.basis.row(i);
            assert_eq!(row.iter().filter(|&&v| v != 0).count(), 1);
            assert_eq!(row.iter().map(|&v| v * v).sum::<i64>(), 1);
        }
    }

    #[test]
    fn identity_is_a_fixed_point() {
        let basis: Matrix<i64> = Matrix::identity(6);
        let red = lll_reduce(basis.clone(), &Options::default()).unwrap();
        assert_eq!(red.basis, basis);
        assert_eq!(red.transform, Matrix::identity(6));
        assert_eq!(red.metrics.status, Status::Converged);
        assert!((red.metrics.rhf - 1.0).abs() < 1e-9);
        assert!(red.metrics.potential.abs() < 1e-9);
    }

    #[test]
    fn knapsack_reduction_exposes_the_subset_vector() {
        // 15 + 17 + 38 + 52 + 78 = 200: the embedding hides a vector of
        // squared norm 5.
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let red = lll_reduce(basis.clone(), &Options::default()).unwrap();

        assert!(verify_transform(&basis, &red.transform, &red.basis).unwrap());
        assert!(unimodular(&red.transform));
        assert!(is_lll_reduced(&red.basis, 0.99).unwrap());
        assert!(min_row_norm_sq(&red.basis) <= 6.0);
        assert!(!is_lll_reduced(&basis, 0.99).unwrap());
        // The lattice volume is untouched.
        let before = det_big(&big(&basis));
        let after = det_big(&big(&red.basis));
        assert_eq!(after.abs(), before.abs());
    }

    #[test]
    fn bignum_agrees_with_fixed_width() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let red = lll_reduce(basis.clone(), &Options::default()).unwrap();
        let red_big = lll_reduce(big(&basis), &Options::default()).unwrap();
        assert_eq!(big(&red.basis), red_big.basis);
        assert_eq!(big(&red.transform), red_big.transform);
    }

    #[test]
    fn orthogonal_diagonal_is_untouched_at_three_quarters() {
        let basis = small(vec![
            vec![100, 0, 0, 0],
            vec![0, 99, 0, 0],
            vec![0, 0, 98, 0],
            vec![0, 0, 0, 97],
        ]);
        let opts = Options {
            delta: 0.75,
            ..Options::default()
        };
        let red = lll_reduce(basis.clone(), &opts).unwrap();
        assert_eq!(red.basis, basis);
        assert_eq!(red.transform, Matrix::identity(4));
    }

    #[test]
    fn bkz_does_not_trail_lll() {
        // Entry scale is capped so the exact Gram stays well inside what
        // the f64 Cholesky can resolve.
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let weights: Vec<i64> = (0..19).map(|_| rng.gen_range(1..10_000)).collect();
        let mut target: i64 = weights
            .iter()
            .filter(|_| rng.gen_bool(0.5))
            .sum();
        if target == 0 {
            target = weights[0];
        }
        let basis = knapsack(&weights, target, 100);

        let lll = lll_reduce(basis.clone(), &Options::default()).unwrap();
        let opts = Options {
            block_size: Some(20),
            ..Options::default()
        };
        let bkz = bkz_reduce(basis.clone(), 10, 3, &opts).unwrap();

        assert!(verify_transform(&basis, &lll.transform, &lll.basis).unwrap());
        assert!(verify_transform(&basis, &bkz.transform, &bkz.basis).unwrap());
        assert!(unimodular(&lll.transform));
        assert!(unimodular(&bkz.transform));
        assert!(min_row_norm_sq(&bkz.basis) <= min_row_norm_sq(&lll.basis) * 1.02);
    }

    #[test]
    fn reduction_is_idempotent() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let opts = Options::default();
        let once = lll_reduce(basis, &opts).unwrap();
        let twice = lll_reduce(once.basis.clone(), &opts).unwrap();
        assert_eq!(twice.basis, once.basis);
        assert_eq!(twice.transform, Matrix::identity(once.basis.rows()));
    }

    #[test]
    fn reduction_is_deterministic() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let a = lll_reduce(basis.clone(), &Options::default()).unwrap();
        let b = lll_reduce(basis, &Options::default()).unwrap();
        assert_eq!(a.basis, b.basis);
        assert_eq!(a.transform, b.transform);
    }

    #[test]
    fn potential_never_increases() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let before = {
            let r = qr::rfactor(&basis).unwrap();
            metrics::from_profile(&r, basis.dot_rows_f64(0, 0)).2
        };
        let red = lll_reduce(basis, &Options::default()).unwrap();
        assert!(red.metrics.potential <= before + 1e-9);
    }

    #[test]
    fn seysen_pass_reaches_the_same_invariants() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let opts = Options {
            use_seysen: true,
            ..Options::default()
        };
        let red = lll_reduce(basis.clone(), &opts).unwrap();
        assert!(verify_transform(&basis, &red.transform, &red.basis).unwrap());
        assert!(unimodular(&red.transform));
        assert!(min_row_norm_sq(&red.basis) <= 6.0);
    }

    #[test]
    fn deep_insertion_driver_runs() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let opts = Options {
            depth: 4,
            ..Options::default()
        };
        let red = lll_reduce(basis.clone(), &opts).unwrap();
        assert!(verify_transform(&basis, &red.transform, &red.basis).unwrap());
        assert!(unimodular(&red.transform));
        assert!(is_lll_reduced(&red.basis, 0.99).unwrap());
    }

    #[test]
    fn zero_deadline_times_out_with_the_input_basis() {
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let opts = Options {
            timeout: Some(Duration::from_secs(0)),
            ..Options::default()
        };
        let red = lll_reduce(basis.clone(), &opts).unwrap();
        assert_eq!(red.metrics.status, Status::TimedOut);
        assert_eq!(red.metrics.passes, 0);
        assert_eq!(red.basis, basis);
        assert_eq!(red.transform, Matrix::identity(7));
    }

    #[test]
    fn raised_flag_cancels_before_the_first_pass() {
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        let basis = knapsack(&[15, 92, 17, 38, 52, 78], 200, 100);
        let opts = Options {
            cancel: Some(flag),
            ..Options::default()
        };
        let red = lll_reduce(basis, &opts).unwrap();
        assert_eq!(red.metrics.status, Status::Cancelled);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let basis = small(vec![vec![1, 0], vec![0, 1]]);

        let opts = Options {
            delta: 0.2,
            ..Options::default()
        };
        assert_eq!(
            lll_reduce(basis.clone(), &opts).unwrap_err(),
            ReduceError::InvalidDelta(0.2)
        );

        assert!(matches!(
            bkz_reduce(basis.clone(), 100, 1, &Options::default()).unwrap_err(),
            ReduceError::BetaOutOfRange { beta: 100, .. }
        ));

        let wide = Matrix::from_rows(vec![vec![1i64, 0, 0], vec![0, 1, 0]]).unwrap();
        assert!(matches!(
            lll_reduce(wide, &Options::default()).unwrap_err(),
            ReduceError::NotSquare { rows: 2, cols: 3 }
        ));

        let singular = small(vec![vec![1, 2], vec![2, 4]]);
        assert!(matches!(
            lll_reduce(singular, &Options::default()).unwrap_err(),
            ReduceError::RankDeficient(_)
        ));

        let opts = Options {
            block_size: Some(8),
            ..Options::default()
        };
        let tall: Matrix<i64> = Matrix::identity(16);
        assert_eq!(
            bkz_reduce(tall, 10, 1, &opts).unwrap_err(),
            ReduceError::BetaExceedsBlock { beta: 10, width: 8 }
        );
    }
}
