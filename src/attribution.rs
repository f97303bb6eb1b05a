//! Feature-name boundary: `"x<id>"`-keyed inputs and outputs.
//!
//! This is the only place that knows the naming convention. Names are
//! resolved to [`Var`]s, inputs are validated and turned into an
//! [`Instance`], and the integer-keyed engines do the rest.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::certify::{certify, Tolerance};
use crate::circuit::{Circuit, GateId};
use crate::diagnostics::{LogSink, ShapleySink};
use crate::error::{Error, Result};
use crate::instance::{Instance, DEFAULT_ENTITY, DEFAULT_MARGINAL};
use crate::shapley::ShapleyEngine;
use crate::types::Var;

/// Configuration for [`compute_attribution`].
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    /// Marginal of variables the caller did not mention.
    pub default_marginal: f64,
    /// Entity value of variables the caller did not mention.
    pub default_entity: bool,
    /// Cross-check the result by exhaustive enumeration.
    pub certify: bool,
    pub tolerance: Tolerance,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            default_marginal: DEFAULT_MARGINAL,
            default_entity: DEFAULT_ENTITY,
            certify: false,
            tolerance: Tolerance::default(),
        }
    }
}

impl AttributionConfig {
    pub fn certified() -> Self {
        Self {
            certify: true,
            ..Self::default()
        }
    }
}

/// Parses a feature name of the form `x<id>`.
pub fn parse_feature(name: &str) -> Result<Var> {
    name.parse()
}

/// Formats a variable as its feature name.
pub fn feature_name(var: Var) -> String {
    var.to_string()
}

pub(crate) fn validate_marginal(name: &str, p: f64) -> Result<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(Error::InvalidInput(format!(
            "marginal of '{}' must lie in [0, 1], got {}",
            name, p
        )));
    }
    Ok(())
}

pub(crate) fn validate_entity(name: &str, value: u8) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidInput(format!(
            "entity value of '{}' must be 0 or 1, got {}",
            name, value
        ))),
    }
}

/// Builds an [`Instance`] from named inputs.
pub fn build_instance(
    marginals: Option<&BTreeMap<String, f64>>,
    entity: Option<&BTreeMap<String, u8>>,
    config: &AttributionConfig,
) -> Result<Instance> {
    validate_marginal("<default>", config.default_marginal)?;
    let mut instance = Instance::with_defaults(config.default_marginal, config.default_entity);

    match marginals {
        Some(marginals) => {
            for (name, &p) in marginals {
                let var = parse_feature(name)?;
                validate_marginal(name, p)?;
                instance.set_marginal(var, p);
            }
        }
        None => warn!("No marginals given, using p = {} for every feature", config.default_marginal),
    }

    match entity {
        Some(entity) => {
            for (name, &value) in entity {
                let var = parse_feature(name)?;
                instance.set_entity(var, validate_entity(name, value)?);
            }
        }
        None => warn!(
            "No entity given, using e = {} for every feature",
            config.default_entity as u8
        ),
    }

    Ok(instance)
}

/// Computes the Shapley value of every feature, keyed by feature name.
///
/// The scored features are the circuit's declared variables `x1..=xN` plus
/// every feature named in `marginals` or `entity`. Features the root does not
/// depend on score exactly `0.0`.
///
/// # Errors
///
/// - [`Error::InvalidCircuit`] if `root` is `None` or not in the circuit;
/// - [`Error::InvalidInput`] on a malformed name or out-of-range value;
/// - [`Error::CertificationMismatch`] if `config.certify` is set and the
///   enumeration disagrees.
pub fn compute_attribution(
    circuit: &Circuit,
    root: Option<GateId>,
    marginals: Option<&BTreeMap<String, f64>>,
    entity: Option<&BTreeMap<String, u8>>,
    config: &AttributionConfig,
) -> Result<BTreeMap<String, f64>> {
    compute_attribution_with(circuit, root, marginals, entity, config, &mut LogSink)
}

/// Same as [`compute_attribution`], reporting to the given sink.
pub fn compute_attribution_with(
    circuit: &Circuit,
    root: Option<GateId>,
    marginals: Option<&BTreeMap<String, f64>>,
    entity: Option<&BTreeMap<String, u8>>,
    config: &AttributionConfig,
    sink: &mut dyn ShapleySink,
) -> Result<BTreeMap<String, f64>> {
    let root = root.ok_or_else(|| Error::InvalidCircuit("no circuit root given".to_string()))?;
    let instance = build_instance(marginals, entity, config)?;

    let features: BTreeSet<Var> = circuit.vars().chain(instance.declared()).collect();
    debug!("Attributing {} features", features.len());

    let engine = ShapleyEngine::new(circuit, root)?;
    let scores = engine.scores_for(features, &instance, sink)?;

    if config.certify {
        certify(circuit, root, &instance, &scores, &config.tolerance)?;
    }

    Ok(scores.into_iter().map(|(var, score)| (feature_name(var), score)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn names<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> BTreeMap<String, f64> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_keys_and_defaults() {
        let mut circuit = Circuit::new(3);
        let a = circuit.var(1);
        let b = circuit.var(2);
        let root = circuit.conjoin(a, b);

        let result = compute_attribution(&circuit, Some(root), None, None, &AttributionConfig::default()).unwrap();
        let keys: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x1", "x2", "x3"]);
        assert!((result["x1"] - 0.375).abs() < 1e-12);
        assert_eq!(result["x3"], 0.0);
    }

    #[test]
    fn test_declared_feature_is_scored() {
        let mut circuit = Circuit::new(1);
        let root = circuit.var(1);
        let marginals = names([("x1", 0.3), ("x9", 0.2)]);

        let result =
            compute_attribution(&circuit, Some(root), Some(&marginals), None, &AttributionConfig::certified()).unwrap();
        assert_eq!(result.len(), 2);
        assert!((result["x1"] - 0.7).abs() < 1e-12);
        assert_eq!(result["x9"], 0.0);
    }

    #[test]
    fn test_missing_root() {
        let circuit = Circuit::new(1);
        let err = compute_attribution(&circuit, None, None, None, &AttributionConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCircuit(_)));
    }

    #[test]
    fn test_invalid_inputs() {
        let mut circuit = Circuit::new(1);
        let root = circuit.var(1);
        let config = AttributionConfig::default();

        let bad_name = names([("y1", 0.5)]);
        let err = compute_attribution(&circuit, Some(root), Some(&bad_name), None, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let bad_p = names([("x1", 1.5)]);
        let err = compute_attribution(&circuit, Some(root), Some(&bad_p), None, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let nan_p = names([("x1", f64::NAN)]);
        let err = compute_attribution(&circuit, Some(root), Some(&nan_p), None, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let bad_e = BTreeMap::from([("x1".to_string(), 2u8)]);
        let err = compute_attribution(&circuit, Some(root), None, Some(&bad_e), &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let zero = names([("x0", 0.5)]);
        let err = compute_attribution(&circuit, Some(root), Some(&zero), None, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_spellings_of_one_feature_are_rejected() {
        // "x01" would otherwise overwrite the marginal given for "x1".
        let mut circuit = Circuit::new(1);
        let root = circuit.var(1);
        let config = AttributionConfig::default();

        let padded = names([("x1", 0.2), ("x01", 0.9)]);
        let err = compute_attribution(&circuit, Some(root), Some(&padded), None, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let signed = BTreeMap::from([("x+1".to_string(), 0u8)]);
        let err = compute_attribution(&circuit, Some(root), None, Some(&signed), &config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_custom_defaults() {
        let mut circuit = Circuit::new(1);
        let root = circuit.var(1);
        let config = AttributionConfig {
            default_marginal: 0.25,
            default_entity: false,
            ..AttributionConfig::default()
        };

        let result = compute_attribution(&circuit, Some(root), None, None, &config).unwrap();
        assert!((result["x1"] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(parse_feature("x12").unwrap(), Var::new(12));
        assert_eq!(feature_name(Var::new(4)), "x4");
        assert!(parse_feature("x").is_err());
        assert!(parse_feature("12").is_err());
        assert!(parse_feature("x007").is_err());
    }
}
