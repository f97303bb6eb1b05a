//! Reference compiler from CNF to decomposable, deterministic circuits.
//!
//! The formula is expanded on one variable at a time, following a variable
//! order (by default `x1, x2, ...`, the order of a right-linear vtree):
//!
//! ```text
//! F = (v ∧ F|v) ∨ (¬v ∧ F|¬v)
//! ```
//!
//! The two elements are mutually exclusive (determinism) and `v` never occurs
//! in the residual formulas (decomposability). Before branching, clauses are
//! split into connected components over their variables, compiled separately
//! and conjoined. Residual formulas are cached by their canonical clause list,
//! so equal sub-problems share one gate.
//!
//! This is a test and demo collaborator. It makes no attempt at competitive
//! compilation and is exponential in the worst case.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::circuit::{Circuit, GateId};
use crate::dimacs::Cnf;
use crate::error::{Error, Result};
use crate::types::{Literal, Var};

type Clauses = Vec<Vec<Literal>>;

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Branching order. Variables left out are branched on last, by id.
    pub order: Option<Vec<Var>>,
}

#[derive(Debug)]
pub struct Compiler {
    circuit: Circuit,
    /// Branching rank of each variable, indexed by variable id.
    rank: Vec<usize>,
    cache: HashMap<Clauses, GateId>,
    cache_hits: usize,
}

impl Compiler {
    /// Compiler branching in increasing variable id.
    pub fn new(num_vars: u32) -> Self {
        Self {
            circuit: Circuit::new(num_vars),
            rank: (0..=num_vars as usize).collect(),
            cache: HashMap::new(),
            cache_hits: 0,
        }
    }

    pub fn with_config(num_vars: u32, config: &CompilerConfig) -> Result<Self> {
        let mut compiler = Self::new(num_vars);
        if let Some(order) = &config.order {
            let unranked = usize::MAX;
            let mut rank = vec![unranked; num_vars as usize + 1];
            for (i, &var) in order.iter().enumerate() {
                if var.id() > num_vars {
                    return Err(Error::InvalidInput(format!(
                        "variable order mentions {} but the formula has {} variables",
                        var, num_vars
                    )));
                }
                if rank[var.index()] != unranked {
                    return Err(Error::InvalidInput(format!("variable order lists {} twice", var)));
                }
                rank[var.index()] = i;
            }
            for id in 1..=num_vars as usize {
                if rank[id] == unranked {
                    rank[id] = order.len() + id;
                }
            }
            compiler.rank = rank;
        }
        Ok(compiler)
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn into_circuit(self) -> Circuit {
        self.circuit
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    /// Compiles the conjunction of `clauses` into the owned circuit.
    ///
    /// # Panics
    ///
    /// Panics if a literal mentions a variable beyond the compiler's range.
    pub fn compile_clauses(&mut self, clauses: &[Vec<Literal>]) -> GateId {
        let mut normalized = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let mut clause = clause.clone();
            clause.sort();
            clause.dedup();
            // Tautology.
            if clause.iter().any(|&l| clause.contains(&-l)) {
                continue;
            }
            normalized.push(clause);
        }
        canonicalize(&mut normalized);
        self.compile_rec(normalized)
    }

    fn compile_rec(&mut self, clauses: Clauses) -> GateId {
        if clauses.is_empty() {
            return GateId::TRUE;
        }
        if clauses.iter().any(|c| c.is_empty()) {
            return GateId::FALSE;
        }
        if let Some(&id) = self.cache.get(&clauses) {
            self.cache_hits += 1;
            return id;
        }

        let components = self.components(&clauses);
        let result = if components.len() > 1 {
            let mut parts = Vec::with_capacity(components.len());
            for component in components {
                let part = self.compile_rec(component);
                if part == GateId::FALSE {
                    parts.clear();
                    parts.push(GateId::FALSE);
                    break;
                }
                parts.push(part);
            }
            self.circuit.conjoin_all(parts)
        } else {
            let v = self.branch_var(&clauses);
            let hi = self.compile_rec(condition(&clauses, v.pos()));
            let lo = self.compile_rec(condition(&clauses, v.neg()));
            if hi == lo {
                hi
            } else {
                let pos = self.circuit.literal(v.pos());
                let neg = self.circuit.literal(v.neg());
                if lo == GateId::FALSE {
                    self.circuit.conjoin(pos, hi)
                } else if hi == GateId::FALSE {
                    self.circuit.conjoin(neg, lo)
                } else {
                    self.circuit.decision([(pos, hi), (neg, lo)])
                }
            }
        };

        self.cache.insert(clauses, result);
        result
    }

    /// Variable of lowest rank among the clauses.
    fn branch_var(&self, clauses: &Clauses) -> Var {
        clauses
            .iter()
            .flatten()
            .map(|lit| lit.var())
            .min_by_key(|v| self.rank[v.index()])
            .unwrap_or(Var::new(1))
    }

    /// Splits clauses into groups with pairwise disjoint variables.
    fn components(&self, clauses: &Clauses) -> Vec<Clauses> {
        let mut parent: Vec<usize> = (0..self.rank.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for clause in clauses {
            let first = clause[0].var().index();
            for lit in &clause[1..] {
                let a = find(&mut parent, first);
                let b = find(&mut parent, lit.var().index());
                if a != b {
                    parent[b] = a;
                }
            }
        }

        let mut groups: BTreeMap<usize, Clauses> = BTreeMap::new();
        for clause in clauses {
            let root = find(&mut parent, clause[0].var().index());
            groups.entry(root).or_default().push(clause.clone());
        }
        groups.into_values().collect()
    }
}

/// Sorts and deduplicates a clause list so equal formulas get equal keys.
fn canonicalize(clauses: &mut Clauses) {
    clauses.sort();
    clauses.dedup();
}

/// `F | lit`: drops satisfied clauses and the falsified literal.
fn condition(clauses: &Clauses, lit: Literal) -> Clauses {
    let mut result: Clauses = clauses
        .iter()
        .filter(|c| !c.contains(&lit))
        .map(|c| c.iter().copied().filter(|&l| l != -lit).collect())
        .collect();
    canonicalize(&mut result);
    result
}

/// Compiles a formula, branching in increasing variable id.
pub fn compile(cnf: &Cnf) -> (Circuit, GateId) {
    let mut compiler = Compiler::new(cnf.num_vars());
    let root = compiler.compile_clauses(cnf.clauses());
    log_result(&compiler, root);
    (compiler.into_circuit(), root)
}

/// Compiles a formula with the given configuration.
pub fn compile_with(cnf: &Cnf, config: &CompilerConfig) -> Result<(Circuit, GateId)> {
    let mut compiler = Compiler::with_config(cnf.num_vars(), config)?;
    let root = compiler.compile_clauses(cnf.clauses());
    log_result(&compiler, root);
    Ok((compiler.into_circuit(), root))
}

fn log_result(compiler: &Compiler, root: GateId) {
    debug!(
        "compile: root {} with {} gates ({} in arena, {} cache hits)",
        root,
        compiler.circuit().size(root),
        compiler.circuit().len(),
        compiler.cache_hits()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use num_bigint::BigUint;
    use test_log::test;

    use crate::dependency::Dependencies;

    fn assignments(n: u32) -> impl Iterator<Item = Vec<bool>> {
        (0..1u32 << n).map(move |mask| {
            let mut values = vec![false; n as usize + 1];
            for v in 1..=n as usize {
                values[v] = mask >> (v - 1) & 1 == 1;
            }
            values
        })
    }

    fn assert_equivalent(cnf: &Cnf, circuit: &Circuit, root: GateId) {
        Dependencies::analyze(circuit, root).unwrap();
        let mut models = 0u32;
        for values in assignments(cnf.num_vars()) {
            assert_eq!(circuit.evaluate(root, &values), cnf.evaluate(&values), "{:?}", values);
            models += cnf.evaluate(&values) as u32;
        }
        assert_eq!(circuit.model_count(root).unwrap(), BigUint::from(models));
    }

    #[test]
    fn test_xnor() {
        let cnf = Cnf::from_dimacs(2, &[vec![1, -2], vec![-1, 2]]);
        let (circuit, root) = compile(&cnf);
        assert_equivalent(&cnf, &circuit, root);
        assert_eq!(circuit.elements(root).len(), 2);
    }

    #[test]
    fn test_constants() {
        let (_, root) = compile(&Cnf::from_dimacs(2, &[]));
        assert_eq!(root, GateId::TRUE);

        let (_, root) = compile(&Cnf::from_dimacs(1, &[vec![1], vec![-1]]));
        assert_eq!(root, GateId::FALSE);

        let (_, root) = compile(&Cnf::from_dimacs(1, &[vec![1, -1]]));
        assert_eq!(root, GateId::TRUE);
    }

    #[test]
    fn test_unit_clause_is_literal() {
        let (circuit, root) = compile(&Cnf::from_dimacs(3, &[vec![-2]]));
        assert_eq!(circuit.literal_of(root), Some(Literal::negative(2)));
    }

    #[test]
    fn test_components_are_conjoined() {
        // (x1 ∨ x2) ∧ (x3 ∨ x4)
        let cnf = Cnf::from_dimacs(4, &[vec![1, 2], vec![3, 4]]);
        let (circuit, root) = compile(&cnf);
        assert_equivalent(&cnf, &circuit, root);
        assert_eq!(circuit.elements(root).len(), 1);
    }

    #[test]
    fn test_custom_order() {
        let cnf = Cnf::from_dimacs(3, &[vec![1, 2], vec![-2, 3], vec![-1, -3]]);
        let config = CompilerConfig {
            order: Some(vec![Var::new(3), Var::new(1)]),
        };
        let (circuit, root) = compile_with(&cnf, &config).unwrap();
        assert_equivalent(&cnf, &circuit, root);
        // x3 is branched on first.
        let first = circuit.elements(root)[0].prime;
        assert_eq!(circuit.literal_of(first).map(|l| l.var()), Some(Var::new(3)));
    }

    #[test]
    fn test_bad_order() {
        let cnf = Cnf::from_dimacs(2, &[vec![1, 2]]);
        let twice = CompilerConfig {
            order: Some(vec![Var::new(1), Var::new(1)]),
        };
        assert!(matches!(compile_with(&cnf, &twice), Err(Error::InvalidInput(_))));
        let out_of_range = CompilerConfig {
            order: Some(vec![Var::new(3)]),
        };
        assert!(matches!(compile_with(&cnf, &out_of_range), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_random_formulas() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..30 {
            let n = rng.gen_range(1..=7u32);
            let m = rng.gen_range(0..=10);
            let clauses: Vec<Vec<i32>> = (0..m)
                .map(|_| {
                    let k = rng.gen_range(1..=3);
                    (0..k)
                        .map(|_| {
                            let v = rng.gen_range(1..=n) as i32;
                            if rng.gen_bool(0.5) {
                                v
                            } else {
                                -v
                            }
                        })
                        .collect()
                })
                .collect();
            let cnf = Cnf::from_dimacs(n, &clauses);
            let (circuit, root) = compile(&cnf);
            assert_equivalent(&cnf, &circuit, root);
        }
    }
}
