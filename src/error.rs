//! Error type shared by the whole crate.

use std::fmt;
use std::io;

use crate::circuit::GateId;
use crate::types::Var;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The root is absent or not part of the circuit.
    InvalidCircuit(String),
    /// The circuit breaks a structural contract (dangling child, decomposability).
    MalformedCircuit { gate: GateId, reason: String },
    /// A serialized gate is neither constant, literal, nor decision.
    UnsupportedGateKind { kind: String },
    /// Scope accounting went out of the combinatorial domain.
    InternalInvariantViolation(String),
    /// The DP result diverges from the brute-force result.
    CertificationMismatch {
        feature: Var,
        dp: f64,
        exact: f64,
        mismatches: usize,
        atol: f64,
        rtol: f64,
    },
    /// Brute-force enumeration was requested over too many variables.
    TooManyVariables { vars: usize, limit: usize },
    /// Caller-provided marginals or entity are not usable.
    InvalidInput(String),
    /// Syntax error in a DIMACS or `.sdd` document.
    Parse(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCircuit(msg) => write!(f, "Invalid circuit: {}", msg),
            Error::MalformedCircuit { gate, reason } => write!(f, "Malformed circuit at {}: {}", gate, reason),
            Error::UnsupportedGateKind { kind } => write!(f, "Unsupported gate kind: {}", kind),
            Error::InternalInvariantViolation(msg) => write!(f, "Internal invariant violation: {}", msg),
            Error::CertificationMismatch {
                feature,
                dp,
                exact,
                mismatches,
                atol,
                rtol,
            } => write!(
                f,
                "Certification failed for {} feature(s); worst is {}: dp = {:e}, exact = {:e}, |diff| = {:e} (atol = {:e}, rtol = {:e})",
                mismatches,
                feature,
                dp,
                exact,
                (dp - exact).abs(),
                atol,
                rtol
            ),
            Error::TooManyVariables { vars, limit } => {
                write!(f, "Too many variables for exhaustive enumeration: {} > {}", vars, limit)
            }
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}
