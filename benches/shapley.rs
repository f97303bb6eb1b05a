//! Compilation and attribution benchmarks on synthetic formulas.
//!
//! Run with:
//! ```bash
//! cargo bench --bench shapley
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sdd_shap::compile::compile;
use sdd_shap::dimacs::Cnf;
use sdd_shap::diagnostics::NullSink;
use sdd_shap::{Circuit, GateId, Instance, ShapleyEngine, Var};

// ============================================================================
// Helpers
// ============================================================================

/// Random 3-CNF with `ratio * num_vars` clauses.
fn random_cnf(num_vars: u32, ratio: f64, seed: u64) -> Cnf {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let num_clauses = (ratio * num_vars as f64) as usize;
    let clauses: Vec<Vec<i32>> = (0..num_clauses)
        .map(|_| {
            (0..3)
                .map(|_| {
                    let v = rng.gen_range(1..=num_vars) as i32;
                    if rng.gen_bool(0.5) {
                        v
                    } else {
                        -v
                    }
                })
                .collect()
        })
        .collect();
    Cnf::from_dimacs(num_vars, &clauses)
}

fn random_instance(num_vars: u32, seed: u64) -> Instance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut instance = Instance::new();
    for v in 1..=num_vars {
        instance.set_marginal(Var::new(v), rng.gen());
        instance.set_entity(Var::new(v), rng.gen_bool(0.5));
    }
    instance
}

/// (x1 ∧ x2) ∨ (x3 ∧ x4) ∨ ... over `2 * pairs` variables, deterministic.
fn chain_of_pairs(pairs: u32) -> (Circuit, GateId) {
    let mut circuit = Circuit::new(2 * pairs);
    let mut acc = GateId::FALSE;
    for i in (0..pairs).rev() {
        let a = circuit.var(2 * i + 1);
        let na = circuit.neg_var(2 * i + 1);
        let b = circuit.var(2 * i + 2);
        let nb = circuit.neg_var(2 * i + 2);
        // pair ∨ (¬pair ∧ acc)
        let pair = circuit.conjoin(a, b);
        let not_pair = circuit.decision([(a, nb), (na, GateId::TRUE)]);
        acc = circuit.decision([(pair, GateId::TRUE), (not_pair, acc)]);
    }
    (circuit, acc)
}

// ============================================================================
// Benchmark: compilation
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("shap/compile");
    group.sample_size(20);

    for num_vars in [10, 20, 30] {
        let cnf = random_cnf(num_vars, 2.0, 42);
        group.bench_with_input(BenchmarkId::new("3cnf,ratio=2", num_vars), &cnf, |b, cnf| {
            b.iter(|| compile(black_box(cnf)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: attribution of every feature
// ============================================================================

fn bench_attribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("shap/attribution");
    group.sample_size(20);

    for num_vars in [10, 20, 30] {
        let cnf = random_cnf(num_vars, 2.0, 42);
        let (circuit, root) = compile(&cnf);
        let instance = random_instance(num_vars, 7);

        group.throughput(Throughput::Elements(num_vars as u64));
        group.bench_with_input(
            BenchmarkId::new("3cnf,ratio=2", format!("v={},gates={}", num_vars, circuit.size(root))),
            &(circuit, root),
            |b, (circuit, root)| {
                b.iter(|| {
                    let engine = ShapleyEngine::new(circuit, *root).unwrap();
                    engine.scores(black_box(&instance), &mut NullSink).unwrap()
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: scaling with the number of players
// ============================================================================

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("shap/scaling");

    for pairs in [8, 16, 32, 64] {
        let (circuit, root) = chain_of_pairs(pairs);
        let engine = ShapleyEngine::new(&circuit, root).unwrap();
        let instance = random_instance(2 * pairs, 11);

        group.bench_with_input(BenchmarkId::new("pairs", pairs), &instance, |b, instance| {
            b.iter(|| engine.scores(black_box(instance), &mut NullSink).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_attribution, bench_scaling);

criterion_main!(benches);
