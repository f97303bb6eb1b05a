//! Decomposable, deterministic circuits stored in an append-only arena.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Circuit                             │
//! │                                                              │
//! │  gates: Vec<Gate>                 unique: HashMap<Gate, Id>  │
//! │  ┌──────────────────────────┐     (hash consing: equal gates │
//! │  │ [0] Constant(false)  ⊥   │      share a single GateId)    │
//! │  │ [1] Constant(true)   ⊤   │                                │
//! │  │ [2] Literal(x1)          │     num_vars: declared number  │
//! │  │ [3] Literal(¬x1)         │     of variables               │
//! │  │ [4] Decision[(2,..),..]  │                                │
//! │  │ ...                      │                                │
//! │  └──────────────────────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A decision gate is the disjunction over its elements of `prime ∧ sub`.
//! Children are always created before their parents, so every child has a
//! smaller [`GateId`] than the decision referencing it. This keeps the
//! structure acyclic and lets bottom-up passes run over arena indices.
//!
//! The arena itself does not enforce decomposability or determinism: those
//! are contracts of whoever builds the circuit (the [`Compiler`] honors
//! both). Decomposability is checked by [`Dependencies::analyze`].
//!
//! [`Compiler`]: crate::compile::Compiler
//! [`Dependencies::analyze`]: crate::dependency::Dependencies::analyze

use std::collections::HashMap;
use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::bitset::BitSet;
use crate::dependency::Dependencies;
use crate::error::Result;
use crate::types::{Literal, Var};

/// Stable identity of a gate: its index in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(u32);

impl GateId {
    pub const FALSE: Self = Self(0);
    pub const TRUE: Self = Self(1);

    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_constant(self) -> bool {
        self.0 <= 1
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FALSE => write!(f, "⊥"),
            Self::TRUE => write!(f, "⊤"),
            _ => write!(f, "g{}", self.0),
        }
    }
}

/// A `(prime, sub)` pair of a decision gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    pub prime: GateId,
    pub sub: GateId,
}

impl Element {
    #[inline]
    pub const fn new(prime: GateId, sub: GateId) -> Self {
        Self { prime, sub }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.prime, self.sub)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gate {
    Constant(bool),
    Literal(Literal),
    /// Disjunction over elements of `prime ∧ sub`.
    Decision(Vec<Element>),
}

impl Gate {
    pub fn kind(&self) -> &'static str {
        match self {
            Gate::Constant(_) => "constant",
            Gate::Literal(_) => "literal",
            Gate::Decision(_) => "decision",
        }
    }

    /// Children in element order, prime before sub.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = GateId> + '_ {
        let elements: &[Element] = match self {
            Gate::Decision(elements) => elements,
            _ => &[],
        };
        elements.iter().flat_map(|e| [e.prime, e.sub])
    }
}

/// Arena of gates with hash consing.
#[derive(Clone)]
pub struct Circuit {
    gates: Vec<Gate>,
    unique: HashMap<Gate, GateId>,
    num_vars: u32,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Circuit {
    /// Creates a circuit declaring `num_vars` variables (`x1..=x<num_vars>`).
    ///
    /// The declared count only matters for queries that range over all
    /// variables (model counting, default feature set); it grows when a
    /// literal over a larger variable is created.
    pub fn new(num_vars: u32) -> Self {
        let mut circuit = Self {
            gates: Vec::new(),
            unique: HashMap::new(),
            num_vars,
        };
        let f = circuit.add(Gate::Constant(false));
        let t = circuit.add(Gate::Constant(true));
        debug_assert_eq!((f, t), (GateId::FALSE, GateId::TRUE));
        circuit
    }

    #[inline]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Iterates over the declared variables.
    pub fn vars(&self) -> impl Iterator<Item = Var> {
        (1..=self.num_vars).map(Var::new)
    }

    /// Number of gates in the arena (including both constants).
    #[inline]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// An arena always holds the two constants, so it is never empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, id: GateId) -> bool {
        id.index() < self.gates.len()
    }

    /// # Panics
    ///
    /// Panics if `id` is not part of this circuit.
    #[inline]
    pub fn gate(&self, id: GateId) -> &Gate {
        &self.gates[id.index()]
    }

    pub fn constant(&self, value: bool) -> GateId {
        if value {
            GateId::TRUE
        } else {
            GateId::FALSE
        }
    }

    pub fn is_false(&self, id: GateId) -> bool {
        id == GateId::FALSE
    }

    pub fn is_true(&self, id: GateId) -> bool {
        id == GateId::TRUE
    }

    /// Returns the literal if `id` is a literal gate.
    pub fn literal_of(&self, id: GateId) -> Option<Literal> {
        match self.gate(id) {
            Gate::Literal(lit) => Some(*lit),
            _ => None,
        }
    }

    /// Returns the elements of a decision gate, or an empty slice.
    pub fn elements(&self, id: GateId) -> &[Element] {
        match self.gate(id) {
            Gate::Decision(elements) => elements,
            _ => &[],
        }
    }

    fn add(&mut self, gate: Gate) -> GateId {
        if let Some(&id) = self.unique.get(&gate) {
            return id;
        }
        let id = GateId::new(self.gates.len() as u32);
        self.unique.insert(gate.clone(), id);
        self.gates.push(gate);
        id
    }

    /// Creates (or reuses) the gate for a literal.
    pub fn literal(&mut self, lit: Literal) -> GateId {
        self.num_vars = self.num_vars.max(lit.var().id());
        self.add(Gate::Literal(lit))
    }

    /// Positive literal gate for variable `var` (1-indexed).
    pub fn var(&mut self, var: u32) -> GateId {
        self.literal(Literal::positive(var))
    }

    /// Negative literal gate for variable `var` (1-indexed).
    pub fn neg_var(&mut self, var: u32) -> GateId {
        self.literal(Literal::negative(var))
    }

    /// Creates (or reuses) a decision gate.
    ///
    /// Elements are kept in the given order. An empty element list is the
    /// constant false.
    ///
    /// # Panics
    ///
    /// Panics if a prime or sub is not already part of this circuit.
    pub fn decision(&mut self, elements: impl IntoIterator<Item = (GateId, GateId)>) -> GateId {
        let elements: Vec<Element> = elements
            .into_iter()
            .map(|(prime, sub)| {
                assert!(self.contains(prime), "Unknown prime {}", prime);
                assert!(self.contains(sub), "Unknown sub {}", sub);
                Element::new(prime, sub)
            })
            .collect();
        if elements.is_empty() {
            return GateId::FALSE;
        }
        self.add(Gate::Decision(elements))
    }

    /// Conjunction of two gates over disjoint variables, as a one-element decision.
    pub fn conjoin(&mut self, a: GateId, b: GateId) -> GateId {
        if self.is_false(a) || self.is_false(b) {
            return GateId::FALSE;
        }
        if self.is_true(a) {
            return b;
        }
        if self.is_true(b) {
            return a;
        }
        self.decision([(a, b)])
    }

    /// Conjunction of many gates over pairwise disjoint variables.
    pub fn conjoin_all(&mut self, gates: impl IntoIterator<Item = GateId>) -> GateId {
        let gates: Vec<GateId> = gates.into_iter().collect();
        gates.into_iter().rev().fold(GateId::TRUE, |acc, g| self.conjoin(g, acc))
    }

    /// Reachable gates in leaves-first order.
    ///
    /// Depth-first from `root`, visiting elements in order and primes before
    /// subs; every gate appears once, after all of its children.
    pub fn topological(&self, root: GateId) -> Vec<GateId> {
        let mut visited = BitSet::new(self.len());
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id.index()) {
                continue;
            }
            stack.push((id, true));
            for child in self.gate(id).children().rev() {
                if !visited.contains(child.index()) {
                    stack.push((child, false));
                }
            }
        }

        order
    }

    /// Number of distinct gates reachable from `root`.
    pub fn size(&self, root: GateId) -> usize {
        self.topological(root).len()
    }

    /// Evaluates the circuit under a full assignment.
    ///
    /// `assignment[v]` is the value of variable `v`; index 0 is unused and
    /// variables beyond the slice are false.
    pub fn evaluate(&self, root: GateId, assignment: &[bool]) -> bool {
        let mut values = vec![false; root.index() + 1];
        for id in self.topological(root) {
            values[id.index()] = match self.gate(id) {
                Gate::Constant(a) => *a,
                Gate::Literal(lit) => lit.eval(assignment.get(lit.var().index()).copied().unwrap_or(false)),
                Gate::Decision(elements) => elements
                    .iter()
                    .any(|e| values[e.prime.index()] && values[e.sub.index()]),
            };
        }
        values[root.index()]
    }

    /// Computes the weighted model count relative to `var(root)`.
    ///
    /// Each variable contributes `pos_weights[v]` when true and
    /// `neg_weights[v]` when false (index 0 unused). Variables a decision
    /// depends on but one of its elements does not are summed out with
    /// `pos + neg`, so weights need not be normalized.
    ///
    /// When both weights of every variable sum to one, this is the
    /// probability that the circuit is true under the product distribution.
    pub fn local_wmc(&self, deps: &Dependencies, pos_weights: &[f64], neg_weights: &[f64]) -> f64 {
        let mut values = vec![0.0; deps.root().index() + 1];
        for &id in deps.order() {
            values[id.index()] = match self.gate(id) {
                Gate::Constant(a) => *a as u8 as f64,
                Gate::Literal(lit) => lit.select(pos_weights[lit.var().index()], neg_weights[lit.var().index()]),
                Gate::Decision(elements) => {
                    let scope = deps.scope(id);
                    let mut total = 0.0;
                    for e in elements {
                        let local = values[e.prime.index()] * values[e.sub.index()];
                        if local == 0.0 {
                            continue;
                        }
                        let (prime_scope, sub_scope) = (deps.scope(e.prime), deps.scope(e.sub));
                        let gap: f64 = scope
                            .iter()
                            .filter(|&v| !prime_scope.contains(v) && !sub_scope.contains(v))
                            .map(|v| pos_weights[v] + neg_weights[v])
                            .product();
                        total += local * gap;
                    }
                    total
                }
            };
        }
        values[deps.root().index()]
    }

    /// Computes the weighted model count over all declared variables.
    ///
    /// Weight slices are indexed by variable and must be longer than
    /// [`num_vars`](Self::num_vars).
    pub fn wmc(&self, root: GateId, pos_weights: &[f64], neg_weights: &[f64]) -> Result<f64> {
        assert!(
            pos_weights.len() > self.num_vars as usize,
            "pos_weights must have length > num_vars"
        );
        assert!(
            neg_weights.len() > self.num_vars as usize,
            "neg_weights must have length > num_vars"
        );

        let deps = Dependencies::analyze(self, root)?;
        let local = self.local_wmc(&deps, pos_weights, neg_weights);
        let support = deps.scope(root);
        let gap: f64 = self
            .vars()
            .filter(|v| !support.contains(v.index()))
            .map(|v| pos_weights[v.index()] + neg_weights[v.index()])
            .product();
        Ok(local * gap)
    }

    /// Counts the satisfying assignments over all declared variables.
    pub fn model_count(&self, root: GateId) -> Result<BigUint> {
        let deps = Dependencies::analyze(self, root)?;
        let mut counts: Vec<BigUint> = vec![BigUint::zero(); root.index() + 1];

        for &id in deps.order() {
            let count = match self.gate(id) {
                Gate::Constant(false) => BigUint::zero(),
                Gate::Constant(true) | Gate::Literal(_) => BigUint::one(),
                Gate::Decision(elements) => {
                    let scope = deps.scope(id).len();
                    let mut total = BigUint::zero();
                    for e in elements {
                        let covered = deps.scope(e.prime).len() + deps.scope(e.sub).len();
                        let local = &counts[e.prime.index()] * &counts[e.sub.index()];
                        total += local << (scope - covered);
                    }
                    total
                }
            };
            counts[id.index()] = count;
        }

        let gap = self.num_vars as usize - deps.scope(root).len();
        Ok(std::mem::take(&mut counts[root.index()]) << gap)
    }

    /// Returns a human-readable formula for the circuit rooted at `id`.
    ///
    /// A decision gate with several parents is spelled out once as
    /// `gN: [...]` and written as `gN` at every later occurrence, so the text
    /// grows with the number of gates rather than the number of paths.
    pub fn display(&self, id: GateId) -> String {
        let mut seen = BitSet::new(self.len());
        let mut shared = BitSet::new(self.len());
        for g in self.topological(id) {
            if let Gate::Decision(elements) = self.gate(g) {
                for e in elements {
                    for child in [e.prime, e.sub] {
                        if matches!(self.gate(child), Gate::Decision(_)) && !seen.insert(child.index()) {
                            shared.insert(child.index());
                        }
                    }
                }
            }
        }

        let mut out = String::new();
        self.write_formula(id, &shared, &mut BitSet::new(self.len()), &mut out);
        out
    }

    fn write_formula(&self, id: GateId, shared: &BitSet, written: &mut BitSet, out: &mut String) {
        match self.gate(id) {
            Gate::Constant(false) => out.push('⊥'),
            Gate::Constant(true) => out.push('⊤'),
            Gate::Literal(lit) => out.push_str(&lit.to_string()),
            Gate::Decision(elements) => {
                let labelled = shared.contains(id.index());
                if labelled {
                    out.push_str(&id.to_string());
                    if !written.insert(id.index()) {
                        return;
                    }
                    out.push_str(": [");
                }
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" ∨ ");
                    }
                    out.push('(');
                    self.write_formula(e.prime, shared, written, out);
                    out.push_str(" ∧ ");
                    self.write_formula(e.sub, shared, written, out);
                    out.push(')');
                }
                if labelled {
                    out.push(']');
                }
            }
        }
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("num_vars", &self.num_vars)
            .field("num_gates", &self.gates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn xnor(circuit: &mut Circuit) -> GateId {
        let a = circuit.var(1);
        let b = circuit.var(2);
        let na = circuit.neg_var(1);
        let nb = circuit.neg_var(2);
        circuit.decision([(a, b), (na, nb)])
    }

    #[test]
    fn test_constants_are_reserved() {
        let circuit = Circuit::new(2);
        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.gate(GateId::FALSE), &Gate::Constant(false));
        assert_eq!(circuit.gate(GateId::TRUE), &Gate::Constant(true));
        assert_eq!(circuit.constant(true), GateId::TRUE);
    }

    #[test]
    fn test_hash_consing() {
        let mut circuit = Circuit::new(2);
        let f = xnor(&mut circuit);
        let g = xnor(&mut circuit);
        assert_eq!(f, g);
        assert_eq!(circuit.len(), 7);
        assert_eq!(circuit.var(1), circuit.var(1));
    }

    #[test]
    fn test_literal_grows_num_vars() {
        let mut circuit = Circuit::new(1);
        circuit.neg_var(5);
        assert_eq!(circuit.num_vars(), 5);
        assert_eq!(circuit.vars().count(), 5);
    }

    #[test]
    fn test_empty_decision_is_false() {
        let mut circuit = Circuit::new(0);
        assert_eq!(circuit.decision(std::iter::empty()), GateId::FALSE);
    }

    #[test]
    #[should_panic(expected = "Unknown prime")]
    fn test_decision_rejects_unknown_children() {
        let mut circuit = Circuit::new(1);
        circuit.decision([(GateId::new(42), GateId::TRUE)]);
    }

    #[test]
    fn test_conjoin_simplifies() {
        let mut circuit = Circuit::new(2);
        let a = circuit.var(1);
        let b = circuit.var(2);
        assert_eq!(circuit.conjoin(a, GateId::TRUE), a);
        assert_eq!(circuit.conjoin(GateId::FALSE, b), GateId::FALSE);
        let ab = circuit.conjoin(a, b);
        assert_eq!(circuit.elements(ab), &[Element::new(a, b)]);
        assert_eq!(circuit.conjoin_all(std::iter::empty()), GateId::TRUE);
    }

    #[test]
    fn test_topological_shares_subgraphs() {
        let mut circuit = Circuit::new(3);
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let c = circuit.var(3);
        let b = circuit.var(2);
        let shared = circuit.decision([(b, c)]);
        let root = circuit.decision([(a, shared), (na, shared)]);

        let order = circuit.topological(root);
        assert_eq!(order.len(), 6);
        assert_eq!(*order.last().unwrap(), root);
        for (pos, &id) in order.iter().enumerate() {
            for child in circuit.gate(id).children() {
                let child_pos = order.iter().position(|&g| g == child).unwrap();
                assert!(child_pos < pos);
            }
        }
        assert_eq!(circuit.size(root), 6);
    }

    #[test]
    fn test_evaluate() {
        let mut circuit = Circuit::new(2);
        let f = xnor(&mut circuit);
        assert!(circuit.evaluate(f, &[false, true, true]));
        assert!(circuit.evaluate(f, &[false, false, false]));
        assert!(!circuit.evaluate(f, &[false, true, false]));
        assert!(!circuit.evaluate(f, &[false, false, true]));
    }

    #[test]
    fn test_model_count() {
        let mut circuit = Circuit::new(3);
        let f = xnor(&mut circuit);
        assert_eq!(circuit.model_count(f).unwrap(), BigUint::from(4u32));
        assert_eq!(circuit.model_count(GateId::TRUE).unwrap(), BigUint::from(8u32));
        assert_eq!(circuit.model_count(GateId::FALSE).unwrap(), BigUint::zero());

        // x1 ∨ (¬x1 ∧ x2): the first element does not mention x2.
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let b = circuit.var(2);
        let g = circuit.decision([(a, GateId::TRUE), (na, b)]);
        assert_eq!(circuit.model_count(g).unwrap(), BigUint::from(6u32));
    }

    #[test]
    fn test_wmc() {
        let mut circuit = Circuit::new(2);
        let x = circuit.var(1);

        // Uniform weights: WMC equals model count.
        let pos = vec![0.0, 1.0, 1.0];
        let neg = vec![0.0, 1.0, 1.0];
        assert_eq!(circuit.wmc(x, &pos, &neg).unwrap(), 2.0);

        let pos = vec![0.0, 0.3, 0.5];
        let neg = vec![0.0, 0.7, 0.5];
        assert!((circuit.wmc(x, &pos, &neg).unwrap() - 0.3).abs() < 1e-12);

        let f = xnor(&mut circuit);
        // 0.3 * 0.5 + 0.7 * 0.5
        assert!((circuit.wmc(f, &pos, &neg).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wmc_smooths_missing_variables() {
        let mut circuit = Circuit::new(2);
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let b = circuit.var(2);
        let g = circuit.decision([(a, GateId::TRUE), (na, b)]);

        // Unnormalized weights expose missing smoothing factors.
        let pos = vec![0.0, 2.0, 3.0];
        let neg = vec![0.0, 1.0, 5.0];
        // x1 ∧ (x2 ∨ ¬x2): 2 * 8; ¬x1 ∧ x2: 1 * 3
        assert!((circuit.wmc(g, &pos, &neg).unwrap() - 19.0).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        let mut circuit = Circuit::new(2);
        let f = xnor(&mut circuit);
        assert_eq!(circuit.display(f), "(x1 ∧ x2) ∨ (¬x1 ∧ ¬x2)");
        assert_eq!(circuit.display(GateId::TRUE), "⊤");
    }

    #[test]
    fn test_display_shared_gate() {
        let mut circuit = Circuit::new(3);
        let a = circuit.var(1);
        let na = circuit.neg_var(1);
        let b = circuit.var(2);
        let c = circuit.var(3);
        let h = circuit.conjoin(b, c);
        let f = circuit.decision([(a, h), (na, h)]);
        assert_eq!(circuit.display(f), format!("(x1 ∧ {h}: [(x2 ∧ x3)]) ∨ (¬x1 ∧ {h})", h = h));
    }

    #[test]
    fn test_display_ladder_stays_linear() {
        // Every level refers to the previous one twice: 2^40 paths.
        let mut circuit = Circuit::new(41);
        let mut levels = vec![circuit.var(41)];
        for v in 1..=40 {
            let x = circuit.var(v);
            let nx = circuit.neg_var(v);
            let g = levels[levels.len() - 1];
            levels.push(circuit.decision([(x, g), (nx, g)]));
        }
        let below = levels[39];
        let text = circuit.display(levels[40]);
        assert!(text.len() < 10_000, "{} bytes", text.len());
        assert!(text.starts_with(&format!("(x40 ∧ {}: [", below)));
        assert!(text.ends_with(&format!("(¬x40 ∧ {})", below)));
    }
}
