//! Graphviz DOT export for circuits.
//!
//! The output can be rendered using `dot -Tpdf file.dot -o file.pdf`.
//!
//! Two layouts are available:
//! - **HTML tables** (default): each element is a `[prime|sub]` table, with
//!   constants and literals inlined in the cells;
//! - **basic**: elements are points with a solid edge to their prime and a
//!   dashed edge to their sub, and every gate is drawn once.
//!
//! ```
//! use sdd_shap::circuit::Circuit;
//!
//! let mut circuit = Circuit::new(2);
//! let a = circuit.var(1);
//! let b = circuit.var(2);
//! let f = circuit.conjoin(a, b);
//!
//! let dot = circuit.to_dot(f).unwrap();
//! assert!(dot.contains("digraph"));
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::bitset::BitSet;
use crate::circuit::{Circuit, Gate, GateId};
use crate::types::{Literal, Var};

/// Configuration for DOT export.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Draw constant gates in basic mode.
    pub show_terminals: bool,
    /// Use horizontal layout (rankdir=LR).
    pub horizontal: bool,
    pub font_size: u32,
    /// Show arena ids on decision gates.
    pub show_ids: bool,
    /// Draw elements as `[prime|sub]` tables (default) or as points.
    pub use_html_tables: bool,
    /// Display names for variables; unnamed variables print as `x<id>`.
    pub var_names: BTreeMap<Var, String>,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            show_terminals: true,
            horizontal: false,
            font_size: 12,
            show_ids: true,
            use_html_tables: true,
            var_names: BTreeMap::new(),
        }
    }
}

impl DotConfig {
    /// Basic mode: point elements and shared gates.
    pub fn basic() -> Self {
        Self {
            use_html_tables: false,
            ..Default::default()
        }
    }

    fn literal_label(&self, lit: Literal) -> String {
        let name = match self.var_names.get(&lit.var()) {
            Some(name) => name.clone(),
            None => lit.var().to_string(),
        };
        lit.select(name.clone(), format!("¬{}", name))
    }
}

impl Circuit {
    /// Exports the sub-circuit rooted at `root` to DOT.
    pub fn to_dot(&self, root: GateId) -> Result<String, fmt::Error> {
        self.to_dot_with_config(root, &DotConfig::default())
    }

    /// Exports the sub-circuit rooted at `root` to DOT with custom configuration.
    pub fn to_dot_with_config(&self, root: GateId, config: &DotConfig) -> Result<String, fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph SDD {{")?;
        if config.horizontal {
            writeln!(dot, "  rankdir=LR;")?;
        }
        writeln!(dot, "  node [fontsize={}];", config.font_size)?;

        if config.use_html_tables {
            self.write_html(&mut dot, root, config)?;
        } else {
            self.write_basic(&mut dot, root, config)?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    fn write_leaf(&self, dot: &mut String, id: GateId, config: &DotConfig) -> fmt::Result {
        match self.gate(id) {
            Gate::Constant(value) => writeln!(
                dot,
                "  n{} [label=\"{}\", shape=box, style=filled, fillcolor=lightgray];",
                id.raw(),
                if *value { "⊤" } else { "⊥" }
            ),
            Gate::Literal(lit) => writeln!(
                dot,
                "  n{} [label=\"{}\", shape=ellipse];",
                id.raw(),
                config.literal_label(*lit)
            ),
            Gate::Decision(_) => Ok(()),
        }
    }

    fn write_decision(&self, dot: &mut String, id: GateId, config: &DotConfig) -> fmt::Result {
        let label = if config.show_ids { id.raw().to_string() } else { String::new() };
        writeln!(dot, "  n{} [label=\"{}\", shape=circle];", id.raw(), label)
    }

    /// Label of a table cell: inlined for leaves, a reference for decisions.
    fn cell(&self, id: GateId, config: &DotConfig) -> String {
        match self.gate(id) {
            Gate::Constant(true) => "⊤".to_string(),
            Gate::Constant(false) => "⊥".to_string(),
            Gate::Literal(lit) => config.literal_label(*lit),
            Gate::Decision(_) => format!("○{}", id.raw()),
        }
    }

    fn write_html(&self, dot: &mut String, root: GateId, config: &DotConfig) -> fmt::Result {
        if !matches!(self.gate(root), Gate::Decision(_)) {
            return self.write_leaf(dot, root, config);
        }

        let mut visited = BitSet::new(self.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id.index()) {
                continue;
            }
            self.write_decision(dot, id, config)?;

            for (i, e) in self.elements(id).iter().enumerate() {
                let elem = format!("n{}_e{}", id.raw(), i);
                writeln!(
                    dot,
                    "  {} [label=<<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\"><TR><TD PORT=\"p\">{}</TD><TD PORT=\"s\">{}</TD></TR></TABLE>>, shape=none];",
                    elem,
                    self.cell(e.prime, config),
                    self.cell(e.sub, config)
                )?;
                writeln!(dot, "  n{} -> {};", id.raw(), elem)?;

                for (port, child, style) in [("p", e.prime, "solid"), ("s", e.sub, "dashed")] {
                    if matches!(self.gate(child), Gate::Decision(_)) {
                        writeln!(dot, "  {}:{} -> n{} [style={}];", elem, port, child.raw(), style)?;
                        stack.push(child);
                    }
                }
            }
        }
        Ok(())
    }

    fn write_basic(&self, dot: &mut String, root: GateId, config: &DotConfig) -> fmt::Result {
        for id in self.topological(root) {
            match self.gate(id) {
                Gate::Constant(_) => {
                    if config.show_terminals || id == root {
                        self.write_leaf(dot, id, config)?;
                    }
                }
                Gate::Literal(_) => self.write_leaf(dot, id, config)?,
                Gate::Decision(elements) => {
                    self.write_decision(dot, id, config)?;
                    for (i, e) in elements.iter().enumerate() {
                        let elem = format!("n{}_e{}", id.raw(), i);
                        writeln!(dot, "  {} [label=\"\", shape=point, width=0.1];", elem)?;
                        writeln!(dot, "  n{} -> {};", id.raw(), elem)?;
                        for (child, label, style) in [(e.prime, "p", "solid"), (e.sub, "s", "dashed")] {
                            if child.is_constant() && !config.show_terminals {
                                continue;
                            }
                            writeln!(dot, "  {} -> n{} [label=\"{}\", style={}];", elem, child.raw(), label, style)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
