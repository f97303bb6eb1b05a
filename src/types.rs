//! Type-safe wrappers for circuit variables and literals.
//!
//! Variables are 1-indexed (0 is reserved), which keeps them aligned with
//! DIMACS and with the `"x<id>"` feature names used at the attribution
//! boundary.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use crate::error::Error;

/// A variable identifier (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub const fn new(id: u32) -> Self {
        assert!(id != 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the ID as an index into dense per-variable tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Positive literal of this variable.
    pub const fn pos(self) -> Literal {
        Literal::positive(self.0)
    }

    /// Negative literal of this variable.
    pub const fn neg(self) -> Literal {
        Literal::negative(self.0)
    }
}

/// Feature names are `x<id>`.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl FromStr for Var {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .strip_prefix('x')
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()) && !digits.starts_with('0'))
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(|| Error::InvalidInput(format!("invalid feature name '{}', expected x<id> with id >= 1", s)))?;
        Ok(Var(id))
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A Boolean literal: a variable or its negation.
///
/// Stored as a signed integer: positive for `x`, negative for `¬x`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Literal(i32);

impl Literal {
    /// # Panics
    ///
    /// Panics if `var` is zero or does not fit a DIMACS literal.
    #[inline]
    pub const fn positive(var: u32) -> Self {
        assert!(var > 0, "Variable must be positive (1-indexed)");
        assert!(var <= i32::MAX as u32, "Variable exceeds the DIMACS literal range");
        Self(var as i32)
    }

    /// # Panics
    ///
    /// Panics if `var` is zero or does not fit a DIMACS literal.
    #[inline]
    pub const fn negative(var: u32) -> Self {
        assert!(var > 0, "Variable must be positive (1-indexed)");
        assert!(var <= i32::MAX as u32, "Variable exceeds the DIMACS literal range");
        Self(-(var as i32))
    }

    /// Creates a literal from its DIMACS form.
    ///
    /// # Panics
    ///
    /// Panics if `lit` is zero or `i32::MIN`, which has no negation.
    #[inline]
    pub const fn from_dimacs(lit: i32) -> Self {
        assert!(lit != 0, "Literal cannot be zero");
        assert!(lit != i32::MIN, "Literal has no negation");
        Self(lit)
    }

    #[inline]
    pub const fn to_dimacs(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Truth value of the literal when its variable is set to `value`.
    #[inline]
    pub const fn eval(self, value: bool) -> bool {
        value == self.is_positive()
    }

    /// Picks `pos` or `neg` depending on polarity.
    #[inline]
    pub fn select<T>(self, pos: T, neg: T) -> T {
        if self.is_positive() {
            pos
        } else {
            neg
        }
    }
}

impl Neg for Literal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positive() {
            write!(f, "{}", self.var())
        } else {
            write!(f, "¬{}", self.var())
        }
    }
}
