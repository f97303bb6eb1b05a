//! Dependency analysis: `var(g)` for every gate reachable from a root.
//!
//! ```text
//! var(⊥) = var(⊤) = ∅
//! var(ℓ)          = { variable of ℓ }
//! var(D)          = ⋃ over elements (p, s) of var(p) ∪ var(s)
//! ```
//!
//! The analysis runs once per circuit and root, and is shared by every
//! per-feature pass of the Shapley engine as well as by weighted model
//! counting. It also validates the structural contracts that the arena
//! cannot enforce on its own:
//!
//! - every child precedes its parent in the arena (acyclicity);
//! - primes and subs of the same element have disjoint scopes
//!   (decomposability).

use log::debug;

use crate::bitset::BitSet;
use crate::circuit::{Circuit, Element, Gate, GateId};
use crate::error::{Error, Result};
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct Dependencies {
    root: GateId,
    /// Reachable gates, children before parents.
    order: Vec<GateId>,
    /// `var(g)`, indexed by arena index (empty for unreachable gates).
    scopes: Vec<BitSet>,
    max_scope: usize,
}

impl Dependencies {
    /// Analyzes the sub-circuit rooted at `root`.
    ///
    /// Each distinct gate is visited exactly once, no matter how many parents
    /// share it.
    pub fn analyze(circuit: &Circuit, root: GateId) -> Result<Self> {
        if !circuit.contains(root) {
            return Err(Error::InvalidCircuit(format!(
                "root {} is not part of a circuit with {} gates",
                root,
                circuit.len()
            )));
        }

        let order = circuit.topological(root);
        let mut scopes = vec![BitSet::empty(); root.index() + 1];
        let mut max_scope = 0;

        for &id in &order {
            let scope = match circuit.gate(id) {
                Gate::Constant(_) => BitSet::empty(),
                Gate::Literal(lit) => std::iter::once(lit.var().index()).collect(),
                Gate::Decision(elements) => {
                    let mut scope = BitSet::empty();
                    for e in elements {
                        for child in [e.prime, e.sub] {
                            if child >= id {
                                return Err(Error::MalformedCircuit {
                                    gate: id,
                                    reason: format!("child {} does not precede its parent", child),
                                });
                            }
                        }
                        let (prime, sub) = (&scopes[e.prime.index()], &scopes[e.sub.index()]);
                        if let Some(shared) = prime.first_common(sub) {
                            return Err(Error::MalformedCircuit {
                                gate: id,
                                reason: format!(
                                    "element {} is not decomposable: both sides depend on x{}",
                                    e, shared
                                ),
                            });
                        }
                        scope.union_with(prime);
                        scope.union_with(sub);
                    }
                    scope
                }
            };
            max_scope = max_scope.max(scope.len());
            scopes[id.index()] = scope;
        }

        debug!(
            "analyze(root = {}): {} gates, {} variables, max scope {}",
            root,
            order.len(),
            scopes[root.index()].len(),
            max_scope
        );

        Ok(Self {
            root,
            order,
            scopes,
            max_scope,
        })
    }

    #[inline]
    pub fn root(&self) -> GateId {
        self.root
    }

    /// Reachable gates in leaves-first order.
    #[inline]
    pub fn order(&self) -> &[GateId] {
        &self.order
    }

    /// `var(g)` as a bit set over variable ids.
    ///
    /// # Panics
    ///
    /// Panics if `id` lies beyond the analyzed root.
    #[inline]
    pub fn scope(&self, id: GateId) -> &BitSet {
        &self.scopes[id.index()]
    }

    /// `var(prime) ∪ var(sub)` of an element.
    pub fn element_scope(&self, element: &Element) -> BitSet {
        let mut scope = self.scope(element.prime).clone();
        scope.union_with(self.scope(element.sub));
        scope
    }

    /// Variables the root depends on, in increasing order.
    pub fn support(&self) -> Vec<Var> {
        self.scope(self.root).iter().map(|v| Var::new(v as u32)).collect()
    }

    /// Returns true if the root depends on `var`.
    #[inline]
    pub fn depends_on(&self, var: Var) -> bool {
        self.scope(self.root).contains(var.index())
    }

    /// Number of variables the root depends on.
    #[inline]
    pub fn num_support(&self) -> usize {
        self.scope(self.root).len()
    }

    /// Largest `|var(g)|` over reachable gates.
    #[inline]
    pub fn max_scope(&self) -> usize {
        self.max_scope
    }
}
