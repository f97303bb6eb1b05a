//! Brute-force certification of Shapley values.
//!
//! The [`Oracle`] evaluates the coalition game `v(S)` for every subset of
//! `var(root)` by weighted model counting with the variables of `S` clamped to
//! the entity, and sums the Shapley formula directly. It is exponential in the
//! number of variables and exists to cross-check the polynomial DP.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::circuit::{Circuit, GateId};
use crate::combinatorics::BinomialTable;
use crate::dependency::Dependencies;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::types::Var;

/// Largest game the oracle agrees to enumerate.
pub const MAX_CERTIFY_VARS: usize = 24;

/// Comparison tolerance: `|dp - exact| <= atol + rtol * max(1, |exact|)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { atol: 1e-9, rtol: 1e-7 }
    }
}

impl Tolerance {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    pub fn accepts(&self, dp: f64, exact: f64) -> bool {
        (dp - exact).abs() <= self.atol + self.rtol * exact.abs().max(1.0)
    }
}

/// Exhaustive evaluation of the coalition game over `var(root)`.
#[derive(Debug, Clone)]
pub struct Oracle {
    players: Vec<Var>,
    /// `v(S)` indexed by the bit mask of `S` over `players`.
    values: Vec<f64>,
    /// Shapley weight `w(k)` of a coalition of size `k`.
    weights: Vec<f64>,
}

impl Oracle {
    pub fn new(circuit: &Circuit, root: GateId, instance: &Instance) -> Result<Self> {
        let deps = Dependencies::analyze(circuit, root)?;
        let players = deps.support();
        let n = players.len();
        if n > MAX_CERTIFY_VARS {
            return Err(Error::TooManyVariables {
                vars: n,
                limit: MAX_CERTIFY_VARS,
            });
        }

        let len = players.last().map_or(1, |v| v.index() + 1);
        let (p, e) = instance.dense(len);
        let mut pos = vec![0.0; len];
        let mut neg = vec![0.0; len];

        let mut values = Vec::with_capacity(1 << n);
        for mask in 0..1usize << n {
            for (i, v) in players.iter().enumerate() {
                let weight = if mask >> i & 1 == 1 { e[v.index()] } else { p[v.index()] };
                pos[v.index()] = weight;
                neg[v.index()] = 1.0 - weight;
            }
            values.push(circuit.local_wmc(&deps, &pos, &neg));
        }

        let binomials = BinomialTable::new(n.saturating_sub(1));
        let weights = (0..n).map(|k| binomials.shapley_weight(n, k)).collect::<Result<_>>()?;

        debug!("Oracle: enumerated {} coalitions over {} players", values.len(), n);
        Ok(Self {
            players,
            values,
            weights,
        })
    }

    pub fn players(&self) -> &[Var] {
        &self.players
    }

    fn mask_of(&self, coalition: impl IntoIterator<Item = Var>) -> usize {
        let mut mask = 0;
        for var in coalition {
            if let Ok(i) = self.players.binary_search(&var) {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// `v(S)`; variables outside the game are ignored.
    pub fn value(&self, coalition: impl IntoIterator<Item = Var>) -> f64 {
        self.values[self.mask_of(coalition)]
    }

    /// Shapley value of `x`, summed over all coalitions without it.
    pub fn score(&self, x: Var) -> f64 {
        let Ok(i) = self.players.binary_search(&x) else {
            return 0.0;
        };
        let bit = 1 << i;

        let mut score = 0.0;
        for mask in 0..self.values.len() {
            if mask & bit != 0 {
                continue;
            }
            let k = mask.count_ones() as usize;
            score += self.weights[k] * (self.values[mask | bit] - self.values[mask]);
        }
        score
    }

    pub fn scores(&self, features: impl IntoIterator<Item = Var>) -> BTreeMap<Var, f64> {
        features.into_iter().map(|x| (x, self.score(x))).collect()
    }
}

/// Compares DP scores to exact ones, feature by feature.
///
/// Fails on the feature with the largest absolute difference, reporting how
/// many features were out of tolerance. Features missing from `exact` are
/// compared against zero.
pub fn check(dp: &BTreeMap<Var, f64>, exact: &BTreeMap<Var, f64>, tolerance: &Tolerance) -> Result<()> {
    let mut worst: Option<(Var, f64, f64)> = None;
    let mut mismatches = 0;

    for (&var, &a) in dp {
        let b = exact.get(&var).copied().unwrap_or(0.0);
        if tolerance.accepts(a, b) && a.is_finite() {
            continue;
        }
        mismatches += 1;
        warn!("Certification mismatch for {}: dp = {}, exact = {}", var, a, b);
        let diff = (a - b).abs();
        match worst {
            Some((_, wa, wb)) if (wa - wb).abs() >= diff => {}
            _ => worst = Some((var, a, b)),
        }
    }

    match worst {
        None => Ok(()),
        Some((feature, dp, exact)) => Err(Error::CertificationMismatch {
            feature,
            dp,
            exact,
            mismatches,
            atol: tolerance.atol,
            rtol: tolerance.rtol,
        }),
    }
}

/// Shapley values of `features` by exhaustive enumeration.
///
/// Features outside `var(root)` score `0.0`.
pub fn exact_scores(
    circuit: &Circuit,
    root: GateId,
    instance: &Instance,
    features: impl IntoIterator<Item = Var>,
) -> Result<BTreeMap<Var, f64>> {
    let oracle = Oracle::new(circuit, root, instance)?;
    Ok(oracle.scores(features))
}

/// Recomputes `dp`'s features by enumeration and [`check`]s them.
pub fn certify(
    circuit: &Circuit,
    root: GateId,
    instance: &Instance,
    dp: &BTreeMap<Var, f64>,
    tolerance: &Tolerance,
) -> Result<()> {
    let oracle = Oracle::new(circuit, root, instance)?;
    let exact = oracle.scores(dp.keys().copied());
    check(dp, &exact, tolerance)?;
    debug!("Certified {} features against {} coalitions", dp.len(), oracle.values.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::shapley::compute_shapley;

    #[test]
    fn test_oracle_values() {
        let mut circuit = Circuit::new(2);
        let a = circuit.var(1);
        let b = circuit.var(2);
        let f = circuit.conjoin(a, b);

        let oracle = Oracle::new(&circuit, f, &Instance::new()).unwrap();
        assert_eq!(oracle.players(), &[Var::new(1), Var::new(2)]);
        assert_eq!(oracle.value(Vec::<Var>::new()), 0.25);
        assert_eq!(oracle.value([Var::new(1)]), 0.5);
        assert_eq!(oracle.value([Var::new(1), Var::new(2)]), 1.0);
        // Not a player.
        assert_eq!(oracle.value([Var::new(7)]), 0.25);
        assert!((oracle.score(Var::new(1)) - 0.375).abs() < 1e-12);
        assert_eq!(oracle.score(Var::new(7)), 0.0);
    }

    #[test]
    fn test_certify_accepts_dp() {
        let mut circuit = Circuit::new(3);
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let b = circuit.var(2);
        let c = circuit.neg_var(3);
        let root = circuit.decision([(a, b), (na, c)]);
        let instance = Instance::from_slices(&[0.2, 0.7, 0.4], &[true, false, false]);

        let dp = compute_shapley(&circuit, root, &instance).unwrap();
        certify(&circuit, root, &instance, &dp, &Tolerance::default()).unwrap();
    }

    #[test]
    fn test_exact_scores() {
        // (x1 ∧ x2) ∨ (¬x1 ∧ ¬x2)
        let mut circuit = Circuit::new(2);
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let b = circuit.var(2);
        let nb = circuit.neg_var(2);
        let f = circuit.decision([(a, b), (na, nb)]);
        let instance = Instance::from_slices(&[0.2, 0.7], &[true, false]);

        let exact = exact_scores(&circuit, f, &instance, [Var::new(1), Var::new(2), Var::new(5)]).unwrap();
        assert!((exact[&Var::new(1)] + 0.24).abs() < 1e-12);
        assert!((exact[&Var::new(2)] + 0.14).abs() < 1e-12);
        assert_eq!(exact[&Var::new(5)], 0.0);
    }

    #[test]
    fn test_check_reports_worst() {
        let x1 = Var::new(1);
        let x2 = Var::new(2);
        let x3 = Var::new(3);
        let dp = BTreeMap::from([(x1, 0.5), (x2, 0.3), (x3, 0.0)]);
        let exact = BTreeMap::from([(x1, 0.4), (x2, 0.1), (x3, 0.0)]);

        match check(&dp, &exact, &Tolerance::default()) {
            Err(Error::CertificationMismatch {
                feature, mismatches, ..
            }) => {
                assert_eq!(feature, x2);
                assert_eq!(mismatches, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        check(&dp, &dp, &Tolerance::default()).unwrap();
    }

    #[test]
    fn test_tolerance() {
        let tol = Tolerance::default();
        assert!(tol.accepts(1.0, 1.0 + 1e-8));
        assert!(!tol.accepts(1.0, 1.0 + 1e-6));
        assert!(tol.accepts(1e6, 1e6 + 0.05));
        assert!(!Tolerance::new(0.0, 0.0).accepts(0.1, 0.1 + 1e-15));
    }

    #[test]
    fn test_too_many_variables() {
        let mut circuit = Circuit::new(30);
        let lits: Vec<_> = (1..=30).map(|v| circuit.var(v)).collect();
        let root = circuit.conjoin_all(lits);
        let err = Oracle::new(&circuit, root, &Instance::new()).unwrap_err();
        assert!(matches!(err, Error::TooManyVariables { vars: 30, limit: MAX_CERTIFY_VARS }));
    }
}
