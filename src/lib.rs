//! # sdd-shap: exact Shapley attributions over decomposable, deterministic circuits
//!
//! **`sdd-shap`** computes exact Shapley values for the inputs of a Boolean
//! function represented as a **decomposable, deterministic circuit** (an
//! SDD-like DAG of constants, literals, and OR-of-AND decision gates), given
//! per-feature marginal probabilities and a concrete entity to explain.
//!
//! ## The game
//!
//! For a coalition `S` of features, `v(S)` is the probability that the
//! circuit is true when the features in `S` take the entity's values and every
//! other feature is drawn independently from its marginal. The Shapley value
//! of a feature splits `v(all) − v(∅)` among the features, averaging its
//! marginal contribution over all orders in which features join.
//!
//! Enumerating coalitions is exponential. On decomposable, deterministic
//! circuits, a bottom-up pass over the gates that tracks, per gate, averages over
//! coalitions of each *size* is enough, so each feature costs one polynomial
//! pass over the circuit.
//!
//! ## Key Features
//!
//! - **Arena-backed circuits**: gates are addressed by [`GateId`], hash-consed
//!   and created bottom-up, so shared sub-circuits are visited once.
//! - **Exact combinatorics**: binomials are computed with [`num_bigint`] and
//!   only then cast to `f64`; tables hold averages, so wide circuits whose
//!   binomials overflow `f64` still score finitely.
//! - **Certification**: an exhaustive [`Oracle`][certify::Oracle] recomputes
//!   the values for small circuits and flags any divergence.
//! - **1-Based Variables**: features are named `x1`, `x2`, ..., matching DIMACS.
//!
//! ## Basic Usage
//!
//! ```rust
//! use sdd_shap::{compute_shapley, Circuit, Instance, Var};
//!
//! // f = (x1 ∧ x2) ∨ (¬x1 ∧ ¬x2)
//! let mut circuit = Circuit::new(2);
//! let a = circuit.var(1);
//! let b = circuit.var(2);
//! let na = circuit.neg_var(1);
//! let nb = circuit.neg_var(2);
//! let f = circuit.decision([(a, b), (na, nb)]);
//!
//! // p = 0.5 everywhere, entity = (1, 1)
//! let scores = compute_shapley(&circuit, f, &Instance::new()).unwrap();
//! assert!((scores[&Var::new(1)] - 0.25).abs() < 1e-12);
//! assert!((scores[&Var::new(2)] - 0.25).abs() < 1e-12);
//! ```
//!
//! Starting from a CNF and named inputs:
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use sdd_shap::attribution::{compute_attribution, AttributionConfig};
//! use sdd_shap::compile::compile;
//! use sdd_shap::dimacs::Cnf;
//!
//! let cnf = Cnf::parse("p cnf 3 2\n1 2 0\n-2 3 0\n").unwrap();
//! let (circuit, root) = compile(&cnf);
//!
//! let marginals = BTreeMap::from([("x1".to_string(), 0.3)]);
//! let scores = compute_attribution(&circuit, Some(root), Some(&marginals), None, &AttributionConfig::certified()).unwrap();
//! assert_eq!(scores.len(), 3);
//! ```
//!
//! ## Core Components
//!
//! - **[`circuit`]**: the [`Circuit`] arena, builders, evaluation and (weighted) model counting.
//! - **[`dependency`]**: variable scopes `var(g)` and the leaves-first order.
//! - **[`shapley`]**: the per-feature dynamic program.
//! - **[`certify`]**: brute-force cross-check.
//! - **[`attribution`]**: the `"x<id>"`-keyed entry point.
//!
//! Supporting modules: [`compile`] (reference CNF compiler), [`dimacs`],
//! [`json`], [`io`] (libsdd `.sdd` files) and [`dot`] (Graphviz).

pub mod attribution;
pub mod bitset;
pub mod certify;
pub mod circuit;
pub mod combinatorics;
pub mod compile;
pub mod dependency;
pub mod diagnostics;
pub mod dimacs;
pub mod dot;
pub mod error;
pub mod instance;
pub mod io;
pub mod json;
pub mod shapley;
pub mod types;

pub use attribution::{compute_attribution, AttributionConfig};
pub use circuit::{Circuit, Element, Gate, GateId};
pub use error::{Error, Result};
pub use instance::Instance;
pub use shapley::{compute_shapley, ShapleyEngine};
pub use types::{Literal, Var};
