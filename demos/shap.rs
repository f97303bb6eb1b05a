//! Explains a CNF formula (or a compiled `.sdd` file) with exact Shapley values.
//!
//! Run with:
//! ```bash
//! cargo run --example shap -- formula.cnf --marginals p.json --entity e.json --certify --dot out/sdd.dot
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;
use sdd_shap::attribution::{compute_attribution, AttributionConfig};
use sdd_shap::certify::Tolerance;
use sdd_shap::compile::{compile_with, CompilerConfig};
use sdd_shap::dimacs::Cnf;
use sdd_shap::json::{load_entity, load_marginals};
use sdd_shap::{Circuit, Var};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// DIMACS CNF, compiled on the fly.
    Cnf,
    /// libsdd `.sdd` file.
    Sdd,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Exact Shapley attribution over compiled circuits")]
struct Cli {
    /// Input formula.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Input format.
    #[arg(long, value_enum, default_value = "cnf")]
    format: Format,

    /// Marginals, as a JSON object {"x<i>": p}.
    #[arg(long, value_name = "FILE")]
    marginals: Option<PathBuf>,

    /// Entity, as a JSON object {"x<i>": 0|1}.
    #[arg(long, value_name = "FILE")]
    entity: Option<PathBuf>,

    /// Branching order for the compiler, e.g. "3,1,2".
    #[arg(long, value_name = "VARS", value_delimiter = ',')]
    order: Option<Vec<u32>>,

    /// Cross-check the result by exhaustive enumeration.
    #[arg(long)]
    certify: bool,

    /// Absolute tolerance for certification.
    #[arg(long, value_name = "FLOAT", default_value = "1e-9")]
    atol: f64,

    /// Relative tolerance for certification.
    #[arg(long, value_name = "FLOAT", default_value = "1e-7")]
    rtol: f64,

    /// Write the circuit in Graphviz DOT format.
    #[arg(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Write the compiled circuit in libsdd format.
    #[arg(long, value_name = "FILE")]
    save_sdd: Option<PathBuf>,

    /// Log per-feature diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = Instant::now();

    let (circuit, root) = match args.format {
        Format::Cnf => {
            let cnf = Cnf::load(&args.input)?;
            println!("Loaded CNF with {} variables and {} clauses", cnf.num_vars(), cnf.clauses().len());
            let config = CompilerConfig {
                order: args
                    .order
                    .as_ref()
                    .map(|ids| {
                        ids.iter()
                            .map(|&id| if id == 0 { Err(eyre!("variable ids start at 1")) } else { Ok(Var::new(id)) })
                            .collect::<color_eyre::Result<Vec<_>>>()
                    })
                    .transpose()?,
            };
            let time_compile = Instant::now();
            let compiled = compile_with(&cnf, &config)?;
            println!("Compiled in {:.3} s", time_compile.elapsed().as_secs_f64());
            compiled
        }
        Format::Sdd => Circuit::load(&args.input)?,
    };
    println!(
        "Circuit: {} gates reachable from {}, {} declared variables",
        circuit.size(root),
        root,
        circuit.num_vars()
    );

    let marginals = args.marginals.as_ref().map(load_marginals).transpose()?;
    let entity = args.entity.as_ref().map(load_entity).transpose()?;

    let config = AttributionConfig {
        certify: args.certify,
        tolerance: Tolerance::new(args.atol, args.rtol),
        ..AttributionConfig::default()
    };

    let time_shap = Instant::now();
    let scores = compute_attribution(&circuit, Some(root), marginals.as_ref(), entity.as_ref(), &config)?;
    println!("Computed {} scores in {:.3} s", scores.len(), time_shap.elapsed().as_secs_f64());
    if args.certify {
        println!("Certified against exhaustive enumeration");
    }

    println!("SHAP scores:");
    let mut total = 0.0;
    for (name, score) in &scores {
        println!("  {:>6}: {:+.6}", name, score);
        total += score;
    }
    println!("  {:>6}: {:+.6}", "sum", total);

    if let Some(path) = &args.dot {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, circuit.to_dot(root)?)?;
        println!("Circuit visualization saved to '{}'", path.display());
    }
    if let Some(path) = &args.save_sdd {
        circuit.save(root, path)?;
        println!("Circuit saved to '{}'", path.display());
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
