//! The segmented reduction driver.
//!
//! One pass refactorizes R from the exact basis, runs the selected kernel
//! on every window of the block grid in parallel, folds the resulting
//! block transforms into B and U in block order, and finishes with an
//! inter-block size-reduction sweep. The grid alternates between offset 0
//! and offset w/2 so that vector pairs straddling a window boundary on
//! one pass fall inside a window on the next.
//!
//! Kernels work on private copies of their R window and never touch
//! shared state; composition is sequential in block index order, which
//! makes a pass deterministic for any worker schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use crate::coefficient::Coefficient;
use crate::error::ReduceError;
use crate::kernels::{size_reduce, BlockKernel};
use crate::matrix::Matrix;
use crate::metrics::{self, Metrics, Status};
use crate::pruning::MAX_ENUM_N;
use crate::qr::{rfactor, RMatrix};

/// Kernel family driven inside the blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Lll,
    DeepLll { depth: usize },
    Bkz { beta: usize, tours: usize },
}

/// Tuning knobs shared by [`crate::lll_reduce`] and [`crate::bkz_reduce`].
#[derive(Clone, Debug)]
pub struct Options {
    /// Lovász parameter δ ∈ (¼, 1].
    pub delta: f64,
    /// Working block width; `None` picks ≈ √n clamped to [8, 128].
    pub block_size: Option<usize>,
    /// Deep-insertion depth for `lll_reduce`; 1 (or 0) is classical LLL.
    pub depth: usize,
    /// Worker thread count. `None` falls back to the BLOCK_LLL_THREADS
    /// environment variable, then to the hardware default.
    pub cores: Option<usize>,
    /// Run the inter-block pass with batched Seysen reduction.
    pub use_seysen: bool,
    /// Emit per-pass progress events at info level.
    pub verbose: bool,
    /// Soft deadline, checked between passes.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation, checked between passes.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            delta: 0.99,
            block_size: None,
            depth: 1,
            cores: None,
            use_seysen: false,
            verbose: false,
            timeout: None,
            cancel: None,
        }
    }
}

/// Outcome of a reduction call.
#[derive(Clone, Debug)]
pub struct Reduction<T> {
    pub basis: Matrix<T>,
    pub transform: Matrix<T>,
    pub metrics: Metrics,
}

/// Relative tolerance under which two consecutive diagonal profiles count
/// as unchanged.
const PROFILE_REL_TOL: f64 = 1e-9;

struct BlockOutcome {
    lo: usize,
    m: usize,
    rw: Vec<f64>,
    uw: Vec<i128>,
    ops: usize,
}

/// Reduce `basis` with an explicit kernel choice. The `lll_reduce` and
/// `bkz_reduce` wrappers cover the common cases.
pub fn reduce<T: Coefficient>(
    basis: Matrix<T>,
    algorithm: Algorithm,
    opts: &Options,
) -> Result<Reduction<T>, ReduceError> {
    validate(&basis, algorithm, opts)?;
    let n = basis.rows();
    let delta = opts.delta;
    let w = block_width(n, opts);
    if let Algorithm::Bkz { beta, .. } = algorithm {
        if beta > w {
            return Err(ReduceError::BetaExceedsBlock { beta, width: w });
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads(opts))
        .build()
        .map_err(|e| ReduceError::WorkerPool(e.to_string()))?;

    let started = Instant::now();
    let mut b = basis;
    let mut u: Matrix<T> = Matrix::identity(n);

    let target_tours = match algorithm {
        Algorithm::Bkz { tours, .. } => tours,
        _ => 0,
    };

    let mut offset = 0usize;
    let mut passes = 0usize;
    let mut kernel_invocations = 0usize;
    let mut quiet = 0usize;
    let mut tours_done = 0usize;
    let mut prev_profile: Option<Vec<f64>> = None;
    let mut status = Status::Converged;

    loop {
        if cancelled(&opts.cancel) {
            status = Status::Cancelled;
            break;
        }
        if let Some(limit) = opts.timeout {
            if started.elapsed() >= limit {
                status = Status::TimedOut;
                break;
            }
        }

        let mut r = rfactor(&b)?;
        let profile: Vec<f64> = (0..n).map(|i| r.at(i, i).ln()).collect();
        let stable = prev_profile.as_ref().map_or(false, |prev| {
            prev.iter()
                .zip(&profile)
                .all(|(a, c)| (a - c).abs() <= PROFILE_REL_TOL * a.abs().max(1.0))
        });
        if stable && quiet >= 1 && tours_done >= target_tours {
            break;
        }
        prev_profile = Some(profile);

        let kernel = match algorithm {
            Algorithm::Lll => BlockKernel::Lll { delta },
            Algorithm::DeepLll { depth } => BlockKernel::DeepLll { delta, depth },
            Algorithm::Bkz { beta, .. } => {
                // Enumeration windows are only aligned with the grid at
                // offset zero; the staggered pass runs plain LLL instead.
                if offset == 0 && tours_done < target_tours {
                    BlockKernel::Bkz { delta, beta }
                } else {
                    BlockKernel::Lll { delta }
                }
            }
        };
        let is_tour = matches!(kernel, BlockKernel::Bkz { .. });

        let grid = block_grid(n, w, offset);
        kernel_invocations += grid.len();

        let outcomes: Vec<BlockOutcome> = pool.install(|| {
            grid.par_iter()
                .map(|&(lo, hi)| {
                    let m = hi - lo;
                    let mut rw = r.window(lo, hi);
                    let mut uw = identity_window(m);
                    let ops = kernel.run(m, &mut rw, &mut uw);
                    BlockOutcome { lo, m, rw, uw, ops }
                })
                .collect()
        });

        // Composition in block index order; windows own disjoint row
        // strips of B and U, so the result does not depend on the worker
        // schedule above.
        let mut active = 0usize;
        for out in &outcomes {
            if out.ops == 0 {
                continue;
            }
            active += 1;
            b.apply_window_transform(out.lo, &out.uw, out.m)?;
            u.apply_window_transform(out.lo, &out.uw, out.m)?;
            r.apply_window_cols(out.lo, &out.uw, out.m);
            r.write_window(out.lo, &out.rw, out.m);
        }

        let boundary_ops = global_size_reduce(&mut r, &mut b, &mut u, opts.use_seysen)?;

        if is_tour {
            tours_done += 1;
        }
        passes += 1;

        if opts.verbose {
            info!(
                "pass {}: offset {}, {} blocks, {} active, {} boundary ops",
                passes,
                offset,
                grid.len(),
                active,
                boundary_ops
            );
        } else {
            debug!(
                "pass {}: offset {}, active {}, boundary ops {}",
                passes, offset, active, boundary_ops
            );
        }

        if active == 0 && boundary_ops == 0 && tours_done >= target_tours {
            quiet += 1;
        } else {
            quiet = 0;
        }
        if quiet >= 2 {
            break;
        }

        offset = if offset == 0 { w / 2 } else { 0 };
    }

    let r = rfactor(&b)?;
    let (rhf, slope, potential) = metrics::from_profile(&r, b.dot_rows_f64(0, 0));
    Ok(Reduction {
        basis: b,
        transform: u,
        metrics: Metrics {
            rhf,
            slope,
            potential,
            total_time: started.elapsed(),
            passes,
            kernel_invocations,
            status,
        },
    })
}

/// Inter-block reduction: one size-reduction sweep over the full R,
/// emitting exact elementary row operations onto the basis and the
/// transform.
fn global_size_reduce<T: Coefficient>(
    r: &mut RMatrix,
    basis: &mut Matrix<T>,
    transform: &mut Matrix<T>,
    use_seysen: bool,
) -> Result<usize, ReduceError> {
    let n = r.n();
    let rs = r.as_mut_slice();
    let mut sink = |src: usize, dst: usize, q: i64| -> Result<(), ReduceError> {
        basis.row_addmul(dst, src, q)?;
        transform.row_addmul(dst, src, q)
    };
    if use_seysen {
        size_reduce::seysen_reduce(rs, n, 0, n, &mut sink)
    } else {
        size_reduce::size_reduce(rs, n, 0, n, &mut sink)
    }
}

fn validate<T: Coefficient>(
    basis: &Matrix<T>,
    algorithm: Algorithm,
    opts: &Options,
) -> Result<(), ReduceError> {
    if basis.rows() == 0 {
        return Err(ReduceError::Empty);
    }
    if !basis.is_square() {
        return Err(ReduceError::NotSquare {
            rows: basis.rows(),
            cols: basis.cols(),
        });
    }
    if !(opts.delta > 0.25 && opts.delta <= 1.0) {
        return Err(ReduceError::InvalidDelta(opts.delta));
    }
    if let Algorithm::DeepLll { depth } = algorithm {
        if depth == 0 {
            return Err(ReduceError::InvalidDepth);
        }
    }
    if let Algorithm::Bkz { beta, tours } = algorithm {
        if beta < 2 || beta > MAX_ENUM_N {
            return Err(ReduceError::BetaOutOfRange {
                beta,
                max: MAX_ENUM_N,
            });
        }
        if tours == 0 {
            return Err(ReduceError::InvalidTours);
        }
    }
    Ok(())
}

fn cancelled(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref()
        .map_or(false, |f| f.load(Ordering::Relaxed))
}

fn worker_threads(opts: &Options) -> usize {
    opts.cores
        .or_else(|| {
            std::env::var("BLOCK_LLL_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(0)
}

fn block_width(n: usize, opts: &Options) -> usize {
    let w = opts.block_size.unwrap_or_else(|| {
        let root = (n as f64).sqrt().round() as usize;
        root.max(8).min(128)
    });
    w.max(2).min(n.max(2))
}

/// Contiguous windows of width ≤ w covering [0, n), staggered by
/// `offset`.
fn block_grid(n: usize, w: usize, offset: usize) -> Vec<(usize, usize)> {
    let mut grid = Vec::new();
    let mut s = 0;
    if offset > 0 && offset < n {
        grid.push((0, offset));
        s = offset;
    }
    while s < n {
        let e = (s + w).min(n);
        grid.push((s, e));
        s = e;
    }
    grid
}

fn identity_window(m: usize) -> Vec<i128> {
    let mut uw = vec![0i128; m * m];
    for i in 0..m {
        uw[i * m + i] = 1;
    }
    uw
}
