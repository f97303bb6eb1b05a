//! Exact Shapley values by dynamic programming over the circuit.
//!
//! # Game
//!
//! For an entity `e` and marginals `p`, the value of a coalition `S` is
//!
//! ```text
//! v(S) = E[ C(z) ],  z_i = e_i for i ∈ S,  z_i ~ Bernoulli(p_i) otherwise
//! ```
//!
//! and the Shapley value of `x` among the `n` variables of `var(root)` is
//!
//! ```text
//! SHAP(x) = Σ_{S ⊆ var(root) \ {x}} w(|S|) · (v(S ∪ {x}) − v(S)),
//! w(k)    = k! (n − k − 1)! / n!
//! ```
//!
//! # Recursion
//!
//! For a fixed `x`, every gate `g` carries two arrays indexed by cardinality
//! `ℓ = 0 ..= m`, `m = |var(g) \ {x}|`:
//!
//! - `gamma[g][ℓ]`: mean over size-`ℓ` subsets `S ⊆ var(g) \ {x}` of
//!   `E[g]` with `S` fixed to the entity and `x = 1`;
//! - `delta[g][ℓ]`: the same with `x = 0`.
//!
//! Means rather than sums keep every entry in `[0, 1]`; the sum over subsets
//! is `C(m, ℓ) · gamma[g][ℓ]`. Since `v(S ∪ {x}) − v(S) = (e[x] − p[x]) ·
//! (γ_S − δ_S)` and `w(k) · C(n − 1, k) = 1 / n`, the root arrays give the
//! score directly:
//!
//! ```text
//! SHAP(x) = (e[x] − p[x]) / n · Σ_k (gamma[root][k] − delta[root][k])
//! ```
//!
//! Decision gates are processed in two phases, with
//! `h(a, i, b, j) = C(a, i) · C(b, j) / C(a + b, i + j)`:
//!
//! 1. **AND**: the prime and sub of an element have disjoint scopes, so a
//!    size-`ℓ` subset splits into `i` prime and `ℓ − i` sub variables:
//!
//!    ```text
//!    gamma_elem[ℓ] = Σ_i h(m_p, i, m_s, ℓ − i) · gamma[p][i] · gamma[s][ℓ − i]
//!    ```
//!
//! 2. **OR**: elements are mutually exclusive, so their expectations add up.
//!    An element only covers part of the parent scope; the `missing`
//!    variables it ignores can be in `S` or not without changing its value,
//!    hence the lift
//!
//!    ```text
//!    gamma[g][ℓ] += Σ_j h(m_e, j, missing, ℓ − j) · gamma_elem[j]
//!    ```
//!
//! Variables outside `var(root)` are dummies and score exactly zero without
//! running the recursion.

use std::collections::BTreeMap;

use log::debug;

use crate::circuit::{Circuit, Gate, GateId};
use crate::combinatorics::BinomialTable;
use crate::dependency::Dependencies;
use crate::diagnostics::{LogSink, ShapleySink, Term};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::types::Var;

/// Reusable Shapley engine for one circuit and root.
///
/// The dependency analysis and the binomial table are computed once and
/// shared, read-only, by every per-feature pass.
#[derive(Debug)]
pub struct ShapleyEngine<'a> {
    circuit: &'a Circuit,
    deps: Dependencies,
    binomials: BinomialTable,
}

/// Per-feature DP tables, indexed by arena index and reused across features.
#[derive(Debug, Default)]
struct Tables {
    gamma: Vec<Vec<f64>>,
    delta: Vec<Vec<f64>>,
    elem_gamma: Vec<f64>,
    elem_delta: Vec<f64>,
}

impl Tables {
    fn new(num_gates: usize, max_scope: usize) -> Self {
        Self {
            gamma: vec![Vec::new(); num_gates],
            delta: vec![Vec::new(); num_gates],
            elem_gamma: Vec::with_capacity(max_scope + 1),
            elem_delta: Vec::with_capacity(max_scope + 1),
        }
    }
}

/// Dense lookups of `p` and `e` for the query.
struct Point {
    p: Vec<f64>,
    e: Vec<f64>,
}

impl<'a> ShapleyEngine<'a> {
    pub fn new(circuit: &'a Circuit, root: GateId) -> Result<Self> {
        let deps = Dependencies::analyze(circuit, root)?;
        let binomials = BinomialTable::new(deps.max_scope());
        Ok(Self {
            circuit,
            deps,
            binomials,
        })
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    /// Variables that take part in the game.
    pub fn support(&self) -> Vec<Var> {
        self.deps.support()
    }

    fn point(&self, instance: &Instance) -> Point {
        let len = self.deps.support().last().map_or(1, |v| v.index() + 1);
        let (p, e) = instance.dense(len);
        Point { p, e }
    }

    /// Scores a single feature.
    pub fn score(&self, x: Var, instance: &Instance, sink: &mut dyn ShapleySink) -> Result<f64> {
        let point = self.point(instance);
        let mut tables = Tables::new(self.deps.root().index() + 1, self.deps.max_scope());
        self.score_with(x, &point, &mut tables, sink)
    }

    /// Scores the support plus every variable declared by the instance.
    pub fn scores(&self, instance: &Instance, sink: &mut dyn ShapleySink) -> Result<BTreeMap<Var, f64>> {
        let features: Vec<Var> = self.support().into_iter().chain(instance.declared()).collect();
        self.scores_for(features, instance, sink)
    }

    /// Scores the given features; duplicates are scored once.
    pub fn scores_for(
        &self,
        features: impl IntoIterator<Item = Var>,
        instance: &Instance,
        sink: &mut dyn ShapleySink,
    ) -> Result<BTreeMap<Var, f64>> {
        let point = self.point(instance);
        let mut tables = Tables::new(self.deps.root().index() + 1, self.deps.max_scope());
        let mut scores = BTreeMap::new();
        for x in features {
            if scores.contains_key(&x) {
                continue;
            }
            let score = self.score_with(x, &point, &mut tables, sink)?;
            scores.insert(x, score);
        }
        Ok(scores)
    }

    fn score_with(&self, x: Var, point: &Point, tables: &mut Tables, sink: &mut dyn ShapleySink) -> Result<f64> {
        if !self.deps.depends_on(x) {
            sink.feature_skipped(x);
            return Ok(0.0);
        }

        let n = self.deps.num_support();
        sink.feature_started(x, n);
        self.run(x, point, tables)?;

        let root = self.deps.root().index();
        let (gamma, delta) = (&tables.gamma[root], &tables.delta[root]);
        if gamma.len() != n {
            return Err(Error::InternalInvariantViolation(format!(
                "root arrays for {} have {} entries, expected {}",
                x,
                gamma.len(),
                n
            )));
        }

        let diff = point.e[x.index()] - point.p[x.index()];
        let weight = 1.0 / n as f64;
        let mut score = 0.0;
        for k in 0..n {
            let contribution = weight * diff * (gamma[k] - delta[k]);
            if !contribution.is_finite() {
                return Err(Error::InternalInvariantViolation(format!(
                    "non-finite term for {} at k = {}: gamma = {}, delta = {}",
                    x, k, gamma[k], delta[k]
                )));
            }
            score += contribution;
            sink.term(
                x,
                &Term {
                    k,
                    weight,
                    gamma: gamma[k],
                    delta: delta[k],
                    contribution,
                },
            );
        }

        sink.feature_finished(x, score);
        Ok(score)
    }

    /// Fills `gamma`/`delta` for every reachable gate, bottom-up.
    fn run(&self, x: Var, point: &Point, tables: &mut Tables) -> Result<()> {
        let Tables {
            gamma,
            delta,
            elem_gamma,
            elem_delta,
        } = tables;

        for &g in self.deps.order() {
            let len = self.deps.scope(g).len_without(x.index()) + 1;
            let mut gamma_g = std::mem::take(&mut gamma[g.index()]);
            let mut delta_g = std::mem::take(&mut delta[g.index()]);
            gamma_g.clear();
            delta_g.clear();
            gamma_g.resize(len, 0.0);
            delta_g.resize(len, 0.0);

            match self.circuit.gate(g) {
                Gate::Constant(a) => {
                    let a = *a as u8 as f64;
                    gamma_g.fill(a);
                    delta_g.fill(a);
                }

                Gate::Literal(lit) if lit.var() == x => {
                    gamma_g[0] = lit.select(1.0, 0.0);
                    delta_g[0] = lit.select(0.0, 1.0);
                }

                Gate::Literal(lit) => {
                    let y = lit.var().index();
                    let marginal = lit.select(point.p[y], 1.0 - point.p[y]);
                    let fixed = lit.select(point.e[y], 1.0 - point.e[y]);
                    gamma_g[0] = marginal;
                    delta_g[0] = marginal;
                    gamma_g[1] = fixed;
                    delta_g[1] = fixed;
                }

                Gate::Decision(elements) => {
                    let parent = len - 1;
                    for e in elements {
                        let (gp, dp) = (&gamma[e.prime.index()], &delta[e.prime.index()]);
                        let (gs, ds) = (&gamma[e.sub.index()], &delta[e.sub.index()]);

                        // AND phase: convolution over cardinalities.
                        let (m_prime, m_sub) = (gp.len() - 1, gs.len() - 1);
                        let child = m_prime + m_sub;
                        elem_gamma.clear();
                        elem_delta.clear();
                        elem_gamma.resize(child + 1, 0.0);
                        elem_delta.resize(child + 1, 0.0);
                        for i in 0..=m_prime {
                            for j in 0..=m_sub {
                                let h = self.binomials.hypergeometric(m_prime, i, m_sub, j)?;
                                elem_gamma[i + j] += h * gp[i] * gs[j];
                                elem_delta[i + j] += h * dp[i] * ds[j];
                            }
                        }

                        // OR phase: lift the element to the parent scope.
                        let missing = parent.checked_sub(child).ok_or_else(|| {
                            Error::InternalInvariantViolation(format!(
                                "element {} of {} covers {} variables besides {}, parent only {}",
                                e, g, child, x, parent
                            ))
                        })?;
                        for l_parent in 0..=parent {
                            let lo = l_parent.saturating_sub(missing);
                            let hi = l_parent.min(child);
                            let mut acc_gamma = 0.0;
                            let mut acc_delta = 0.0;
                            for l_child in lo..=hi {
                                let h = self.binomials.hypergeometric(child, l_child, missing, l_parent - l_child)?;
                                acc_gamma += elem_gamma[l_child] * h;
                                acc_delta += elem_delta[l_child] * h;
                            }
                            gamma_g[l_parent] += acc_gamma;
                            delta_g[l_parent] += acc_delta;
                        }
                    }
                }
            }

            gamma[g.index()] = gamma_g;
            delta[g.index()] = delta_g;
        }

        Ok(())
    }
}

/// Computes Shapley values of `var(root)` and of every variable declared by
/// `instance`, reporting through the `log` facade.
pub fn compute_shapley(circuit: &Circuit, root: GateId, instance: &Instance) -> Result<BTreeMap<Var, f64>> {
    let engine = ShapleyEngine::new(circuit, root)?;
    debug!(
        "compute_shapley(root = {}): {} players, {} gates",
        root,
        engine.dependencies().num_support(),
        engine.dependencies().order().len()
    );
    engine.scores(instance, &mut LogSink)
}
