//! Binomial coefficients, hypergeometric mixing weights and Shapley weights.
//!
//! Coefficients are computed with arbitrary precision (Pascal's rule over
//! [`BigUint`]) and only then cast to `f64`, once per entry, so deep circuits
//! never accumulate rounding error from the combinatorics themselves.
//!
//! Rows beyond `n ≈ 1030` no longer fit in an `f64`. The table therefore also
//! keeps `ln C(n, k)`, taken from the exact value, and ratios of coefficients
//! fall back to log space when their denominator overflows.

use std::f64::consts::LN_2;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

use crate::error::{Error, Result};

/// Natural logarithm of a positive big integer.
fn ln_big(value: &BigUint) -> f64 {
    let bits = value.bits();
    if bits <= 1000 {
        return value.to_f64().unwrap_or(f64::INFINITY).ln();
    }
    // Keep the top 64 bits; the rest only moves the result by < 2^-63.
    let shift = bits - 64;
    let top = (value >> shift).to_f64().unwrap_or(f64::INFINITY);
    top.ln() + shift as f64 * LN_2
}

/// Table of `C(n, k)` for all `n <= max_n`, as `f64` and as `ln`.
#[derive(Debug, Clone)]
pub struct BinomialTable {
    rows: Vec<Vec<f64>>,
    ln_rows: Vec<Vec<f64>>,
}

impl BinomialTable {
    pub fn new(max_n: usize) -> Self {
        let mut rows = Vec::with_capacity(max_n + 1);
        let mut ln_rows = Vec::with_capacity(max_n + 1);
        let mut exact = vec![BigUint::one()];
        for n in 0..=max_n {
            if n > 0 {
                let mut next = Vec::with_capacity(n + 1);
                next.push(BigUint::one());
                for k in 1..n {
                    next.push(&exact[k - 1] + &exact[k]);
                }
                next.push(BigUint::one());
                exact = next;
            }
            rows.push(exact.iter().map(|c| c.to_f64().unwrap_or(f64::INFINITY)).collect());
            ln_rows.push(exact.iter().map(ln_big).collect());
        }
        Self { rows, ln_rows }
    }

    /// Largest `n` covered by the table.
    pub fn max_n(&self) -> usize {
        self.rows.len() - 1
    }

    fn row<'a>(&self, rows: &'a [Vec<f64>], n: usize, k: usize) -> Result<&'a [f64]> {
        rows.get(n).map(Vec::as_slice).ok_or_else(|| {
            Error::InternalInvariantViolation(format!(
                "binomial C({}, {}) requested from a table of size {}",
                n,
                k,
                self.max_n()
            ))
        })
    }

    /// `C(n, k)`; zero when `k > n`, `inf` when it exceeds `f64`.
    ///
    /// Asking for a row beyond the table means the caller's scope sizes are
    /// inconsistent with the analysis the table was sized from.
    #[inline]
    pub fn get(&self, n: usize, k: usize) -> Result<f64> {
        Ok(self.row(&self.rows, n, k)?.get(k).copied().unwrap_or(0.0))
    }

    /// `ln C(n, k)`; `-inf` when `k > n`.
    #[inline]
    pub fn ln_get(&self, n: usize, k: usize) -> Result<f64> {
        Ok(self.row(&self.ln_rows, n, k)?.get(k).copied().unwrap_or(f64::NEG_INFINITY))
    }

    /// Probability that a uniform `(i + j)`-subset of `a + b` items takes
    /// exactly `i` of the first `a`:
    ///
    /// ```text
    /// h(a, i, b, j) = C(a, i) · C(b, j) / C(a + b, i + j)
    /// ```
    ///
    /// For fixed `a`, `b` and `i + j` these weights sum to one.
    pub fn hypergeometric(&self, a: usize, i: usize, b: usize, j: usize) -> Result<f64> {
        if i > a || j > b {
            return Ok(0.0);
        }
        let whole = self.get(a + b, i + j)?;
        if whole.is_finite() {
            // C(a, i) · C(b, j) <= C(a + b, i + j), so the product is finite too.
            return Ok(self.get(a, i)? * self.get(b, j)? / whole);
        }
        Ok((self.ln_get(a, i)? + self.ln_get(b, j)? - self.ln_get(a + b, i + j)?).exp())
    }

    /// Shapley weight of a coalition of `k` other players among `n` players.
    ///
    /// ```text
    /// w(k) = k! (n-k-1)! / n! = 1 / (n · C(n-1, k))
    /// ```
    pub fn shapley_weight(&self, n: usize, k: usize) -> Result<f64> {
        if n == 0 || k >= n {
            return Err(Error::InternalInvariantViolation(format!(
                "Shapley weight w({}) requested for {} players",
                k, n
            )));
        }
        if n == 1 {
            return Ok(1.0);
        }
        Ok(1.0 / (n as f64 * self.get(n - 1, k)?))
    }
}
