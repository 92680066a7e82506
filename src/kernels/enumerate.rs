//! Schnorr–Euchner enumeration over an R block.
//!
//! Finds a non-zero integer combination `x` of the block's basis vectors
//! minimising `‖R·x‖²`, walking the coefficient tree depth-first from the
//! last coordinate down to the first. Coordinate values are tried in the
//! zig-zag order `round(c), round(c)±1, …` around the projected centre
//! `c`, so the partial norm at a level grows monotonically and the first
//! value past the pruning bound cuts the whole remaining sibling range.
//!
//! `pruning[k]` caps the partial norm accumulated by rows `k..n` against
//! `pruning[k] · radius²`; the all-ones vector gives exact enumeration.
//! Whenever a full candidate beats the current radius the radius shrinks
//! to it and the search continues.

use crate::pruning::MAX_ENUM_N;

/// Best non-zero combination within `radius²`, or `None` when the pruned
/// tree contains no such vector. `rr` is the block, row-major n×n.
pub(crate) fn enumerate(
    rr: &[f64],
    n: usize,
    pruning: &[f64],
    radius_sq: f64,
) -> Option<(Vec<i64>, f64)> {
    search(rr, n, pruning, radius_sq, None)
}

/// Variant with the leading coordinate pinned: the coefficient at `fixed`
/// is exactly 1 and later coordinates are zero. BKZ uses this to obtain a
/// combination it can insert at a fixed position with a unimodular shift.
pub(crate) fn enumerate_last_one(
    rr: &[f64],
    n: usize,
    pruning: &[f64],
    radius_sq: f64,
    fixed: usize,
) -> Option<(Vec<i64>, f64)> {
    debug_assert!(fixed < n);
    search(rr, n, pruning, radius_sq, Some(fixed))
}

fn search(
    rr: &[f64],
    n: usize,
    pruning: &[f64],
    mut radius_sq: f64,
    fixed: Option<usize>,
) -> Option<(Vec<i64>, f64)> {
    debug_assert!(n >= 1 && n <= MAX_ENUM_N);
    debug_assert!(pruning.len() >= n);
    debug_assert!(radius_sq > 0.0);

    let levels = fixed.unwrap_or(n);
    let mut x = vec![0i64; n];
    let mut tail = 0.0;
    if let Some(m) = fixed {
        x[m] = 1;
        let v = rr[m * n + m];
        tail = v * v;
        if tail > pruning[m] * radius_sq {
            return None;
        }
        if m == 0 {
            return if tail < radius_sq { Some((x, tail)) } else { None };
        }
    }

    let top = levels - 1;
    // The top level of a full enumeration only walks x ≥ 0: the tree is
    // symmetric under negation.
    let half_tree = fixed.is_none();

    let mut center = vec![0.0; levels];
    let mut base = vec![0i64; levels];
    let mut dir = vec![1i64; levels];
    let mut step = vec![0u64; levels];
    // acc[i]: partial norm contributed by rows above level i.
    let mut acc = vec![0.0; levels];

    let enter = |i: usize,
                 x: &mut [i64],
                 center: &mut [f64],
                 base: &mut [i64],
                 dir: &mut [i64],
                 step: &mut [u64]| {
        let mut s = 0.0;
        for j in i + 1..n {
            if x[j] != 0 {
                s += rr[i * n + j] * x[j] as f64;
            }
        }
        let c = -s / rr[i * n + i];
        let c = if c.is_finite() { c } else { 0.0 };
        center[i] = c;
        let b = c.round();
        base[i] = b as i64;
        dir[i] = if c >= b { 1 } else { -1 };
        step[i] = 0;
        x[i] = base[i];
    };

    let advance = |i: usize, x: &mut [i64], base: &[i64], dir: &[i64], step: &mut [u64]| {
        if half_tree && i == top {
            x[i] += 1;
        } else {
            step[i] += 1;
            let t = step[i];
            let off = if t % 2 == 1 {
                ((t + 1) / 2) as i64
            } else {
                -((t / 2) as i64)
            };
            x[i] = base[i] + dir[i] * off;
        }
    };

    let mut best: Option<(Vec<i64>, f64)> = None;
    acc[top] = tail;
    enter(top, &mut x, &mut center, &mut base, &mut dir, &mut step);

    let mut i = top;
    'walk: loop {
        let diff = x[i] as f64 - center[i];
        let val = rr[i * n + i] * diff;
        let partial = acc[i] + val * val;

        if partial <= pruning[i] * radius_sq {
            if i == 0 {
                if partial < radius_sq && x.iter().any(|&v| v != 0) {
                    radius_sq = partial;
                    best = Some((x.clone(), partial));
                }
                advance(0, &mut x, &base, &dir, &mut step);
            } else {
                acc[i - 1] = partial;
                i -= 1;
                enter(i, &mut x, &mut center, &mut base, &mut dir, &mut step);
            }
        } else {
            // Every remaining sibling at this level is even farther from
            // the centre; abandon the subtree.
            i += 1;
            if i > top {
                break 'walk;
            }
            advance(i, &mut x, &base, &dir, &mut step);
        }
    }

    best
}
