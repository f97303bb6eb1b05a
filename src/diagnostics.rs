//! Diagnostic sinks for the Shapley engine.
//!
//! The engine never configures logging itself. Callers pass a
//! [`ShapleySink`] that receives the per-feature reduction; [`LogSink`]
//! forwards it to the `log` facade, [`Breakdown`] keeps it for inspection.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::types::Var;

/// One cardinality term of the final reduction for a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    /// Number of other variables fixed to the entity.
    pub k: usize,
    /// `1 / n` for a game of `n` players.
    pub weight: f64,
    /// Mean of `v` over size-`k` coalitions with `x = 1`, before scaling by the marginal gap.
    pub gamma: f64,
    pub delta: f64,
    /// `weight · (e[x] - p[x]) · (gamma - delta)`
    pub contribution: f64,
}

pub trait ShapleySink {
    /// A DP pass for `var` starts over a game with `players` variables.
    fn feature_started(&mut self, _var: Var, _players: usize) {}

    /// `var` is outside the circuit's support and scores exactly zero.
    fn feature_skipped(&mut self, _var: Var) {}

    fn term(&mut self, _var: Var, _term: &Term) {}

    fn feature_finished(&mut self, _var: Var, _score: f64) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ShapleySink for NullSink {}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ShapleySink for LogSink {
    fn feature_started(&mut self, var: Var, players: usize) {
        debug!("Computing SHAP for {} ({} players)", var, players);
    }

    fn feature_skipped(&mut self, var: Var) {
        debug!("{} is a dummy: not in the circuit support", var);
    }

    fn term(&mut self, var: Var, term: &Term) {
        trace!(
            "{}: k = {}, weight = {}, gamma = {}, delta = {}, contribution = {}",
            var,
            term.k,
            term.weight,
            term.gamma,
            term.delta,
            term.contribution
        );
    }

    fn feature_finished(&mut self, var: Var, score: f64) {
        debug!("SHAP score for {}: {}", var, score);
    }
}

/// Records every term of every feature.
#[derive(Debug, Default, Clone)]
pub struct Breakdown {
    terms: BTreeMap<Var, Vec<Term>>,
    scores: BTreeMap<Var, f64>,
    dummies: Vec<Var>,
}

impl Breakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terms(&self, var: Var) -> &[Term] {
        self.terms.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn score(&self, var: Var) -> Option<f64> {
        self.scores.get(&var).copied()
    }

    /// Features that were scored without a DP pass.
    pub fn dummies(&self) -> &[Var] {
        &self.dummies
    }

    /// Number of DP passes that ran.
    pub fn passes(&self) -> usize {
        self.terms.len()
    }
}

impl ShapleySink for Breakdown {
    fn feature_started(&mut self, var: Var, _players: usize) {
        self.terms.entry(var).or_default().clear();
    }

    fn feature_skipped(&mut self, var: Var) {
        self.dummies.push(var);
        self.scores.insert(var, 0.0);
    }

    fn term(&mut self, var: Var, term: &Term) {
        self.terms.entry(var).or_default().push(*term);
    }

    fn feature_finished(&mut self, var: Var, score: f64) {
        self.scores.insert(var, score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_records() {
        let mut breakdown = Breakdown::new();
        let x1 = Var::new(1);
        let x2 = Var::new(2);
        let term = Term {
            k: 0,
            weight: 1.0,
            gamma: 1.0,
            delta: 0.0,
            contribution: 0.5,
        };

        breakdown.feature_started(x1, 1);
        breakdown.term(x1, &term);
        breakdown.feature_finished(x1, 0.5);
        breakdown.feature_skipped(x2);

        assert_eq!(breakdown.terms(x1), &[term]);
        assert_eq!(breakdown.score(x1), Some(0.5));
        assert_eq!(breakdown.score(x2), Some(0.0));
        assert_eq!(breakdown.dummies(), &[x2]);
        assert_eq!(breakdown.passes(), 1);
        assert!(breakdown.terms(x2).is_empty());
    }
}
