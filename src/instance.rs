//! The point being explained: marginals `p` and entity `e` over variables.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::Var;

pub const DEFAULT_MARGINAL: f64 = 0.5;
pub const DEFAULT_ENTITY: bool = true;

/// Per-variable Bernoulli marginals and a concrete entity.
///
/// Lookups of variables that were never set fall back to the defaults
/// (`p = 0.5`, `e = 1` unless configured otherwise). Callers that need strict
/// completeness must check [`declared`](Self::declared) themselves.
#[derive(Debug, Clone)]
pub struct Instance {
    marginals: BTreeMap<Var, f64>,
    entity: BTreeMap<Var, bool>,
    default_marginal: f64,
    default_entity: bool,
}

impl Default for Instance {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_MARGINAL, DEFAULT_ENTITY)
    }
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `default_marginal` is not a probability.
    pub fn with_defaults(default_marginal: f64, default_entity: bool) -> Self {
        assert!(
            (0.0..=1.0).contains(&default_marginal),
            "Default marginal must lie in [0, 1], got {}",
            default_marginal
        );
        Self {
            marginals: BTreeMap::new(),
            entity: BTreeMap::new(),
            default_marginal,
            default_entity,
        }
    }

    /// Builds an instance from dense slices: `p[i]`, `e[i]` belong to `x<i+1>`.
    pub fn from_slices(p: &[f64], e: &[bool]) -> Self {
        let mut instance = Self::new();
        for (i, &pi) in p.iter().enumerate() {
            instance.set_marginal(Var::new(i as u32 + 1), pi);
        }
        for (i, &ei) in e.iter().enumerate() {
            instance.set_entity(Var::new(i as u32 + 1), ei);
        }
        instance
    }

    /// # Panics
    ///
    /// Panics if `p` is not a probability.
    pub fn set_marginal(&mut self, var: Var, p: f64) {
        assert!((0.0..=1.0).contains(&p), "Marginal of {} must lie in [0, 1], got {}", var, p);
        self.marginals.insert(var, p);
    }

    pub fn set_entity(&mut self, var: Var, value: bool) {
        self.entity.insert(var, value);
    }

    pub fn with_marginal(mut self, var: Var, p: f64) -> Self {
        self.set_marginal(var, p);
        self
    }

    pub fn with_entity(mut self, var: Var, value: bool) -> Self {
        self.set_entity(var, value);
        self
    }

    #[inline]
    pub fn marginal(&self, var: Var) -> f64 {
        self.marginals.get(&var).copied().unwrap_or(self.default_marginal)
    }

    #[inline]
    pub fn entity(&self, var: Var) -> bool {
        self.entity.get(&var).copied().unwrap_or(self.default_entity)
    }

    /// Entity value as a number in `{0, 1}`.
    #[inline]
    pub fn entity_value(&self, var: Var) -> f64 {
        self.entity(var) as u8 as f64
    }

    /// Variables mentioned by either the marginals or the entity.
    pub fn declared(&self) -> BTreeSet<Var> {
        self.marginals.keys().chain(self.entity.keys()).copied().collect()
    }

    /// Dense `(p, e)` tables indexed by variable id, covering ids `0..len`.
    pub(crate) fn dense(&self, len: usize) -> (Vec<f64>, Vec<f64>) {
        let mut p = vec![self.default_marginal; len];
        let mut e = vec![self.default_entity as u8 as f64; len];
        for id in 1..len {
            let var = Var::new(id as u32);
            p[id] = self.marginal(var);
            e[id] = self.entity_value(var);
        }
        (p, e)
    }
}
