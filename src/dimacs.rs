//! DIMACS CNF formulas.
//!
//! Format:
//! - Comments start with `c`
//! - Problem line: `p cnf <num_vars> <num_clauses>`, required before clauses
//! - Clauses are whitespace-separated literals terminated by `0`; a clause may
//!   span several lines
//! - A line starting with `%` ends the formula (SATLIB benchmarks)

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::warn;

use crate::error::{Error, Result};
use crate::types::{Literal, Var};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Vec<Literal>>,
}

impl Cnf {
    /// # Panics
    ///
    /// Panics if a clause mentions a variable beyond `num_vars`.
    pub fn new(num_vars: u32, clauses: Vec<Vec<Literal>>) -> Self {
        for clause in &clauses {
            for lit in clause {
                assert!(
                    lit.var().id() <= num_vars,
                    "Literal {} is out of range for {} variables",
                    lit,
                    num_vars
                );
            }
        }
        Self { num_vars, clauses }
    }

    /// Builds a formula from DIMACS-style integer clauses.
    pub fn from_dimacs(num_vars: u32, clauses: &[Vec<i32>]) -> Self {
        let clauses = clauses
            .iter()
            .map(|c| c.iter().map(|&l| Literal::from_dimacs(l)).collect())
            .collect();
        Self::new(num_vars, clauses)
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> {
        (1..=self.num_vars).map(Var::new)
    }

    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::read(text.as_bytes())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(File::open(path)?)
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut header: Option<(u32, usize)> = None;
        let mut clauses = Vec::new();
        let mut clause = Vec::new();

        for (line_num, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            if line.starts_with('%') {
                break;
            }

            if line.starts_with('p') {
                if header.is_some() {
                    return Err(Error::Parse(format!("line {}: duplicate problem line", line_num + 1)));
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() != 4 || parts[0] != "p" || parts[1] != "cnf" {
                    return Err(Error::Parse(format!("line {}: invalid problem line '{}'", line_num + 1, line)));
                }
                let num_vars = parts[2]
                    .parse::<u32>()
                    .map_err(|_| Error::Parse(format!("line {}: invalid number of variables", line_num + 1)))?;
                let num_clauses = parts[3]
                    .parse::<usize>()
                    .map_err(|_| Error::Parse(format!("line {}: invalid number of clauses", line_num + 1)))?;
                if num_vars == 0 {
                    return Err(Error::Parse("formula declares zero variables".to_string()));
                }
                if num_vars > i32::MAX as u32 {
                    return Err(Error::Parse(format!(
                        "line {}: {} variables exceed the literal range",
                        line_num + 1,
                        num_vars
                    )));
                }
                header = Some((num_vars, num_clauses));
                continue;
            }

            let Some((num_vars, _)) = header else {
                return Err(Error::Parse(format!(
                    "line {}: clause before the problem line",
                    line_num + 1
                )));
            };

            for token in line.split_whitespace() {
                let lit = token
                    .parse::<i32>()
                    .map_err(|_| Error::Parse(format!("line {}: invalid literal '{}'", line_num + 1, token)))?;
                if lit == 0 {
                    clauses.push(std::mem::take(&mut clause));
                    continue;
                }
                if lit.unsigned_abs() > num_vars {
                    return Err(Error::Parse(format!(
                        "line {}: literal {} is out of range for {} variables",
                        line_num + 1,
                        lit,
                        num_vars
                    )));
                }
                clause.push(Literal::from_dimacs(lit));
            }
        }

        let Some((num_vars, num_clauses)) = header else {
            return Err(Error::Parse("missing problem line 'p cnf <vars> <clauses>'".to_string()));
        };
        if !clause.is_empty() {
            warn!("Last clause is not terminated by 0, accepting it anyway");
            clauses.push(clause);
        }
        if clauses.len() != num_clauses {
            warn!("Expected {} clauses but parsed {}", num_clauses, clauses.len());
        }

        Ok(Self { num_vars, clauses })
    }

    /// Evaluates the formula; `assignment[v]` is the value of `x<v>`.
    pub fn evaluate(&self, assignment: &[bool]) -> bool {
        self.clauses.iter().all(|clause| {
            clause
                .iter()
                .any(|lit| lit.eval(assignment.get(lit.var().index()).copied().unwrap_or(false)))
        })
    }
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for lit in clause {
                write!(f, "{} ", lit.to_dimacs())?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let text = "c xnor\np cnf 2 2\n1 -2 0\n-1 2 0\n";
        let cnf = Cnf::parse(text).unwrap();
        assert_eq!(cnf.num_vars(), 2);
        assert_eq!(cnf, Cnf::from_dimacs(2, &[vec![1, -2], vec![-1, 2]]));
        assert!(cnf.evaluate(&[false, true, true]));
        assert!(!cnf.evaluate(&[false, true, false]));
    }

    #[test]
    fn test_clause_spanning_lines() {
        let cnf = Cnf::parse("p cnf 3 2\n1 2\n3 0 -1\n0\n%\n0\n").unwrap();
        assert_eq!(cnf, Cnf::from_dimacs(3, &[vec![1, 2, 3], vec![-1]]));
    }

    #[test]
    fn test_empty_clause() {
        let cnf = Cnf::parse("p cnf 1 1\n0\n").unwrap();
        assert_eq!(cnf.clauses().len(), 1);
        assert!(!cnf.evaluate(&[false, true]));
    }

    #[test]
    fn test_display_roundtrip() {
        let cnf = Cnf::from_dimacs(3, &[vec![1, -3], vec![2]]);
        let text = cnf.to_string();
        assert_eq!(text, "p cnf 3 2\n1 -3 0\n2 0\n");
        assert_eq!(Cnf::parse(&text).unwrap(), cnf);
    }

    #[test]
    fn test_errors() {
        for bad in [
            "1 2 0\n",
            "",
            "p cnf 0 0\n",
            "p cnf 2 1\n1 3 0\n",
            "p cnf 2 1\n1 x 0\n",
            "p dnf 2 1\n1 0\n",
            "p cnf 2 1\np cnf 2 1\n",
            "p cnf 2147483648 1\n-2147483648 0\n",
        ] {
            assert!(matches!(Cnf::parse(bad), Err(Error::Parse(_))), "accepted {:?}", bad);
        }
    }
}
