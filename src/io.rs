//! Reading and writing circuits in the libsdd `.sdd` text format.
//!
//! # Format
//!
//! ```text
//! sdd <node_count>
//! F <id>                                     # false node
//! T <id>                                     # true node
//! L <id> <vtree_id> <literal>                # literal node
//! D <id> <vtree_id> <size> {<prime> <sub>}*  # decision node
//! ```
//!
//! Nodes appear bottom-up (children before parents) and the last node is the
//! root. Circuits carry no vtree, so written files use vtree id `0`
//! everywhere and vtree ids are ignored on read.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::circuit::{Circuit, Gate, GateId};
use crate::error::{Error, Result};
use crate::types::Literal;

const HEADER: &str = "\
c ids of sdd nodes start at 0
c sdd nodes appear bottom-up, children before parents
c
c file syntax:
c sdd count-of-sdd-nodes
c F id-of-false-sdd-node
c T id-of-true-sdd-node
c L id-of-literal-sdd-node id-of-vtree literal
c D id-of-decomposition-sdd-node id-of-vtree number-of-elements {id-of-prime id-of-sub}*
c
";

impl Circuit {
    /// Writes the sub-circuit rooted at `root` in libsdd format.
    ///
    /// Node ids are renumbered densely in leaves-first order, so the root is
    /// always the last line.
    pub fn to_sdd_string(&self, root: GateId) -> String {
        let order = self.topological(root);
        let mut file_id: HashMap<GateId, usize> = HashMap::with_capacity(order.len());

        let mut output = String::from(HEADER);
        output.push_str(&format!("sdd {}\n", order.len()));

        for (i, &id) in order.iter().enumerate() {
            let line = match self.gate(id) {
                Gate::Constant(false) => format!("F {}\n", i),
                Gate::Constant(true) => format!("T {}\n", i),
                Gate::Literal(lit) => format!("L {} 0 {}\n", i, lit.to_dimacs()),
                Gate::Decision(elements) => {
                    let mut line = format!("D {} 0 {}", i, elements.len());
                    for e in elements {
                        line.push_str(&format!(" {} {}", file_id[&e.prime], file_id[&e.sub]));
                    }
                    line.push('\n');
                    line
                }
            };
            output.push_str(&line);
            file_id.insert(id, i);
        }

        output
    }

    /// Saves the sub-circuit rooted at `root` to a `.sdd` file.
    pub fn save(&self, root: GateId, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_sdd_string(root))?;
        Ok(())
    }

    /// Parses a libsdd document into a fresh circuit and its root.
    pub fn from_sdd_string(content: &str) -> Result<(Circuit, GateId)> {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with('c') && !line.is_empty());

        let header = lines.next().ok_or_else(|| Error::Parse("missing header".into()))?;
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 2 || parts[0] != "sdd" {
            return Err(Error::Parse(format!("invalid header: {}", header)));
        }
        let node_count: usize = parts[1]
            .parse()
            .map_err(|_| Error::Parse(format!("invalid node count: {}", parts[1])))?;

        let mut circuit = Circuit::new(0);
        // The header count is advisory; it never sizes an allocation.
        let mut id_to_gate: HashMap<u32, GateId> = HashMap::new();
        let mut root = None;

        for line in lines {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let child = |i: usize, what: &str| -> Result<GateId> {
                let raw = number(&parts, i, what, line)?;
                u32::try_from(raw)
                    .ok()
                    .and_then(|id| id_to_gate.get(&id).copied())
                    .ok_or_else(|| Error::Parse(format!("unknown {} {} in: {}", what, raw, line)))
            };

            let tag = field(&parts, 0, "node type", line)?;
            let id = u32::try_from(number(&parts, 1, "id", line)?).map_err(|_| Error::Parse(format!("invalid id in: {}", line)))?;

            let gate = match tag {
                "F" => circuit.constant(false),
                "T" => circuit.constant(true),
                "L" => {
                    let literal = number(&parts, 3, "literal", line)?;
                    let literal = i32::try_from(literal)
                        .ok()
                        .filter(|&l| l != 0 && l != i32::MIN)
                        .ok_or_else(|| Error::Parse(format!("invalid literal in: {}", line)))?;
                    circuit.literal(Literal::from_dimacs(literal))
                }
                "D" => {
                    let size = number(&parts, 3, "size", line)?;
                    let size = usize::try_from(size).map_err(|_| Error::Parse(format!("invalid size in: {}", line)))?;
                    if size.checked_mul(2).and_then(|n| n.checked_add(4)) != Some(parts.len()) {
                        return Err(Error::Parse(format!(
                            "decision declares {} elements but lists {} ids in: {}",
                            size,
                            parts.len().saturating_sub(4),
                            line
                        )));
                    }
                    let mut elements = Vec::with_capacity(size);
                    for i in 0..size {
                        elements.push((child(4 + 2 * i, "prime")?, child(5 + 2 * i, "sub")?));
                    }
                    circuit.decision(elements)
                }
                other => {
                    return Err(Error::UnsupportedGateKind {
                        kind: other.to_string(),
                    })
                }
            };

            if id_to_gate.insert(id, gate).is_some() {
                return Err(Error::Parse(format!("duplicate node id {}", id)));
            }
            root = Some(gate);
        }

        let root = root.ok_or_else(|| Error::Parse("no nodes".into()))?;
        if id_to_gate.len() != node_count {
            log::warn!("Header declares {} nodes but {} were read", node_count, id_to_gate.len());
        }
        Ok((circuit, root))
    }

    /// Loads a circuit from a `.sdd` file.
    pub fn load(path: impl AsRef<Path>) -> Result<(Circuit, GateId)> {
        let content = fs::read_to_string(path)?;
        Self::from_sdd_string(&content)
    }
}

fn field<'a>(parts: &[&'a str], i: usize, what: &str, line: &str) -> Result<&'a str> {
    parts
        .get(i)
        .copied()
        .ok_or_else(|| Error::Parse(format!("missing {} in: {}", what, line)))
}

fn number(parts: &[&str], i: usize, what: &str, line: &str) -> Result<i64> {
    let raw = field(parts, i, what, line)?;
    raw.parse()
        .map_err(|_| Error::Parse(format!("invalid {} '{}' in: {}", what, raw, line)))
}
