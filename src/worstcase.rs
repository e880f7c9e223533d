//! Worst-case expectation over an L1 ambiguity ball.
//!
//! The inner problem of every robust backup:
//!
//! ```text
//! min  pᵀz   subject to   ‖p − q‖₁ ≤ t,   1ᵀp = 1,   p ≥ 0
//! ```
//!
//! The feasible set is a polytope whose vertices move mass from high-`z`
//! entries of `q` toward the minimizer of `z`, so a greedy exchange is exact:
//! no general LP solver is needed (the test suite checks against one).

use crate::{validate_distribution, Error, Result};

/// Solve `min pᵀz` over the L1 ball of radius `t` around `q`, intersected
/// with the probability simplex.
///
/// Returns the minimizing distribution and its objective value. Complexity is
/// O(n log n) from one argsort of `z`; ties are broken by input position
/// (stable sort), so the result is deterministic.
///
/// Budgets above 2 saturate: an L1 ball of radius 2 already contains the
/// whole simplex.
pub fn worstcase_l1(z: &[f64], q: &[f64], t: f64) -> Result<(Vec<f64>, f64)> {
    if z.len() != q.len() {
        return Err(Error::ShapeMismatch {
            what: "outcome values vs. base distribution",
            expected: q.len(),
            found: z.len(),
        });
    }
    validate_distribution(q, "base distribution")?;
    if !t.is_finite() || t < 0.0 {
        return Err(Error::InvalidParameter {
            what: "l1 budget",
            value: t,
        });
    }

    let n = z.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| z[a].total_cmp(&z[b]));
    let k = order[0];

    let mut p = q.to_vec();
    // Moving δ mass into k costs 2δ of L1 budget, and at most 1 − q[k] can move.
    let mut epsilon = (t / 2.0).min(1.0 - q[k]);
    p[k] += epsilon;

    for &j in order.iter().rev() {
        if epsilon <= 0.0 {
            break;
        }
        if j == k {
            continue;
        }
        let taken = epsilon.min(p[j]);
        p[j] -= taken;
        epsilon -= taken;
    }

    let value = p.iter().zip(z).map(|(&pi, &zi)| pi * zi).sum();
    Ok((p, value))
}

/// Solve `max pᵀz` over the same feasible set (the optimistic inner problem).
///
/// Equivalent to the worst case on `−z`.
pub fn bestcase_l1(z: &[f64], q: &[f64], t: f64) -> Result<(Vec<f64>, f64)> {
    let negated: Vec<f64> = z.iter().map(|&x| -x).collect();
    let (p, value) = worstcase_l1(&negated, q, t)?;
    Ok((p, -value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l1(p: &[f64], q: &[f64]) -> f64 {
        p.iter().zip(q).map(|(&a, &b)| (a - b).abs()).sum()
    }

    #[test]
    fn zero_budget_returns_nominal() {
        let q = [0.2, 0.3, 0.5];
        let z = [3.0, 1.0, 2.0];
        let (p, v) = worstcase_l1(&z, &q, 0.0).unwrap();
        assert_eq!(p, q.to_vec());
        let nominal: f64 = q.iter().zip(&z).map(|(&a, &b)| a * b).sum();
        assert!((v - nominal).abs() < 1e-12);
    }

    #[test]
    fn full_budget_collapses_to_argmin() {
        let q = [0.25, 0.25, 0.25, 0.25];
        let z = [4.0, -1.0, 2.0, 0.0];
        let (p, v) = worstcase_l1(&z, &q, 2.0).unwrap();
        assert_eq!(p, vec![0.0, 1.0, 0.0, 0.0]);
        assert!((v + 1.0).abs() < 1e-12);
    }

    #[test]
    fn half_budget_moves_mass_from_worst_entry() {
        // z = (1, 2, 3), uniform q, t = 0.5: shift 0.25 of mass from the
        // z = 3 entry onto z = 1.
        let q = [1.0 / 3.0; 3];
        let z = [1.0, 2.0, 3.0];
        let (p, v) = worstcase_l1(&z, &q, 0.5).unwrap();
        assert!((p[0] - (1.0 / 3.0 + 0.25)).abs() < 1e-12);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-12);
        assert!((p[2] - (1.0 / 3.0 - 0.25)).abs() < 1e-12);
        assert!((v - 1.5).abs() < 1e-12);
        assert!(l1(&p, &q) <= 0.5 + 1e-12);
    }

    #[test]
    fn drains_multiple_entries_when_needed() {
        let q = [0.2, 0.3, 0.5];
        let z = [0.0, 5.0, 4.0];
        // t/2 = 0.5 empties the z=5 entry (mass 0.3) and takes the remaining
        // 0.2 out of the z=4 entry.
        let (p, v) = worstcase_l1(&z, &q, 1.0).unwrap();
        assert!((p[0] - 0.7).abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);
        assert!((p[2] - 0.3).abs() < 1e-12);
        assert!((v - 1.2).abs() < 1e-12);
    }

    #[test]
    fn budget_larger_than_drainable_mass_saturates() {
        let q = [0.9, 0.1];
        let z = [0.0, 1.0];
        let (p, v) = worstcase_l1(&z, &q, 1.5).unwrap();
        // Only 0.1 can move even though t/2 = 0.75.
        assert_eq!(p, vec![1.0, 0.0]);
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn bestcase_mirrors_worstcase() {
        let q = [0.5, 0.5];
        let z = [-1.0, 1.0];
        let (_, worst) = worstcase_l1(&z, &q, 0.5).unwrap();
        let (_, best) = bestcase_l1(&z, &q, 0.5).unwrap();
        assert!((worst + 0.5).abs() < 1e-12);
        assert!((best - 0.5).abs() < 1e-12);
    }

    #[test]
    fn singleton_is_fixed() {
        let (p, v) = worstcase_l1(&[7.0], &[1.0], 2.0).unwrap();
        assert_eq!(p, vec![1.0]);
        assert!((v - 7.0).abs() < 1e-12);
    }

    #[test]
    fn equal_values_are_deterministic() {
        let q = [0.25, 0.25, 0.25, 0.25];
        let z = [1.0, 1.0, 1.0, 1.0];
        let (p1, v1) = worstcase_l1(&z, &q, 1.0).unwrap();
        let (p2, v2) = worstcase_l1(&z, &q, 1.0).unwrap();
        assert_eq!(p1, p2);
        assert!((v1 - 1.0).abs() < 1e-12);
        assert!((v2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_inputs_rejected() {
        assert!(matches!(
            worstcase_l1(&[1.0, 2.0], &[1.0], 0.5),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            worstcase_l1(&[1.0, 2.0], &[0.4, 0.4], 0.5),
            Err(Error::InvalidDistribution { .. })
        ));
        assert!(matches!(
            worstcase_l1(&[1.0], &[1.0], -0.1),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
