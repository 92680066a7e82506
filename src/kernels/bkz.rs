//! One BKZ tour over a window.
//!
//! For each window start the profile right of it is LLL-reduced, the
//! leading β-wide sub-block is enumerated, and a strictly shorter
//! combination, when one exists, is inserted at the front of the
//! sub-block followed by a local re-LLL. Tour repetition is the driver's
//! job, not this kernel's.

use super::{enumerate, insert_combination, lll};
use crate::pruning;

pub(crate) fn bkz_tour(
    r: &mut [f64],
    u: &mut [i128],
    n: usize,
    delta: f64,
    beta: usize,
) -> usize {
    let bet = beta.min(n);
    if bet < 2 {
        return 0;
    }
    let coeffs = pruning::coefficients(bet);
    let mut ops = 0;

    for j in 0..=(n - bet) {
        ops += lll::lll_window(r, u, n, j, n, delta, 1);

        let mut sub = vec![0.0; bet * bet];
        for a in 0..bet {
            for b in a..bet {
                sub[a * bet + b] = r[(j + a) * n + (j + b)];
            }
        }
        let d0 = sub[0];
        // Insert only on strict improvement over the block's first GSO
        // vector; δ keeps the improvement large enough to terminate.
        let radius_sq = delta * d0 * d0;

        if let Some((v, _)) = enumerate::enumerate(&sub, bet, coeffs, radius_sq) {
            if let Some(ins) = insertion_coefficients(&sub, bet, coeffs, radius_sq, v) {
                insert_combination(r, u, n, j, &ins);
                ops += 1;
                ops += lll::lll_window(r, u, n, j, j + bet, delta, 1);
            }
        }
    }
    ops
}

/// Shape an enumerated combination so its trailing coefficient is ±1,
/// which the insertion primitive needs for unimodularity.
///
/// The gcd strip keeps only primitive vectors; when the trailing
/// coefficient still is not a unit, the last-one enumeration retries with
/// that coordinate pinned and may conclude no insertable vector exists.
fn insertion_coefficients(
    sub: &[f64],
    bet: usize,
    pruning: &[f64],
    radius_sq: f64,
    v: Vec<i64>,
) -> Option<Vec<i64>> {
    let m = v.iter().rposition(|&c| c != 0)?;
    let mut v: Vec<i64> = v[..=m].to_vec();
    let g = v.iter().fold(0i64, |acc, &c| gcd(acc, c.abs()));
    if g > 1 {
        for c in &mut v {
            *c /= g;
        }
    }
    if v[m].abs() == 1 {
        return Some(v);
    }
    enumerate::enumerate_last_one(sub, bet, pruning, radius_sq, m)
        .map(|(w, _)| w[..=m].to_vec())
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod test {
    use super::super::test_util::{det, identity};
    use super::*;

    #[test]
    fn tour_shortens_the_leading_vector() {
        // R of the basis (4, 0), (3, 2): the combination (-1, 1) has norm
        // √5 and must end up in front.
        let mut r = vec![4.0, 3.0, 0.0, 2.0];
        let mut u = identity(2);
        let ops = bkz_tour(&mut r, &mut u, 2, 0.99, 2);
        assert!(ops > 0);
        assert!((r[0] * r[0] - 5.0).abs() < 1e-9);
        assert_eq!(det(&u, 2).abs(), 1);
    }

    #[test]
    fn reduced_block_is_a_fixed_point() {
        // Orthogonal, sorted: nothing to enumerate below the radius.
        let n = 4;
        let mut r = vec![0.0; n * n];
        for i in 0..n {
            r[i * n + i] = 2.0 + i as f64;
        }
        let mut u = identity(n);
        let ops = bkz_tour(&mut r, &mut u, n, 0.99, 3);
        assert_eq!(ops, 0);
        assert_eq!(u, identity(n));
    }

    #[test]
    fn first_gso_length_matches_exhaustive_search() {
        let n = 3;
        // Basis rows (5,0,0), (4,3,0), (2,2,2) in R form.
        let mut r = vec![5.0, 4.0, 2.0, 0.0, 3.0, 2.0, 0.0, 0.0, 2.0];
        let mut u = identity(n);
        bkz_tour(&mut r, &mut u, n, 0.99, 3);
        assert_eq!(det(&u, n).abs(), 1);
        // After the tour no enumerable vector in the full window may beat
        // the first diagonal entry.
        let ones = [1.0; 3];
        let radius = 0.99 * r[0] * r[0];
        assert!(enumerate::enumerate(&r, n, &ones, radius).is_none());
    }
}
