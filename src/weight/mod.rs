//! Symbolic weight expressions.
//!
//! A [`WeightExpr`] is an arithmetic tree over literal constants and named
//! parameters. Machines carry these trees on their transitions; nothing is
//! computed until [`eval`] folds a tree against a [`Params`] binding.
//!
//! Expressions are built through the smart constructors in this module,
//! which apply the usual identities (`x·1 = x`, `x + 0 = x`, `x·0 = 0`),
//! fold literal subtrees and flatten nested sums and products. Structural
//! equality on the simplified form is expression equality.

mod error;

pub use self::error::WeightError;

use smol_str::SmolStr;

use crate::params::Params;

/// A node in a symbolic weight expression.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightExpr {
    /// Literal non-negative constant.
    Lit(f64),
    /// Reference to a named parameter, resolved at evaluation time.
    Param(SmolStr),
    /// n-ary sum.
    Sum(Vec<WeightExpr>),
    /// n-ary product.
    Product(Vec<WeightExpr>),
    /// Difference of two subexpressions.
    Sub(Box<WeightExpr>, Box<WeightExpr>),
    /// Multiplicative inverse.
    Reciprocal(Box<WeightExpr>),
    /// Natural logarithm.
    Log(Box<WeightExpr>),
    /// Natural exponential.
    Exp(Box<WeightExpr>),
    /// Integer power of a base expression.
    Pow(Box<WeightExpr>, i32),
}

/// Literal constant. Weights are multiplicative, so negatives are rejected.
pub fn lit(x: f64) -> WeightExpr {
    debug_assert!(x >= 0.0, "literal weights are non-negative");
    WeightExpr::Lit(x)
}

/// The multiplicative identity.
#[inline]
pub fn one() -> WeightExpr {
    WeightExpr::Lit(1.0)
}

/// The additive identity.
#[inline]
pub fn zero() -> WeightExpr {
    WeightExpr::Lit(0.0)
}

/// Reference to a named parameter.
pub fn param<N: Into<SmolStr>>(name: N) -> WeightExpr {
    WeightExpr::Param(name.into())
}

/// Sum of the given terms. Nested sums are flattened, literal terms folded
/// together, and zero terms dropped.
pub fn sum(terms: Vec<WeightExpr>) -> WeightExpr {
    let mut flat = Vec::with_capacity(terms.len());
    let mut folded = 0.0;
    for term in terms {
        match term {
            WeightExpr::Lit(x) => folded += x,
            WeightExpr::Sum(inner) => {
                for sub in inner {
                    match sub {
                        WeightExpr::Lit(x) => folded += x,
                        other => flat.push(other),
                    }
                }
            }
            other => flat.push(other),
        }
    }
    if flat.is_empty() {
        return WeightExpr::Lit(folded);
    }
    if folded != 0.0 {
        flat.push(WeightExpr::Lit(folded));
    }
    if flat.len() == 1 {
        return flat.remove(0);
    }
    WeightExpr::Sum(flat)
}

/// Product of the given factors. Nested products are flattened, literal
/// factors folded together, unit factors dropped, and a zero factor
/// collapses the whole product.
pub fn product(factors: Vec<WeightExpr>) -> WeightExpr {
    let mut flat = Vec::with_capacity(factors.len());
    let mut folded = 1.0;
    for factor in factors {
        match factor {
            WeightExpr::Lit(x) => folded *= x,
            WeightExpr::Product(inner) => {
                for sub in inner {
                    match sub {
                        WeightExpr::Lit(x) => folded *= x,
                        other => flat.push(other),
                    }
                }
            }
            other => flat.push(other),
        }
    }
    if folded == 0.0 || flat.is_empty() {
        return WeightExpr::Lit(folded);
    }
    if folded != 1.0 {
        flat.push(WeightExpr::Lit(folded));
    }
    if flat.len() == 1 {
        return flat.remove(0);
    }
    WeightExpr::Product(flat)
}

/// Difference `minuend − subtrahend`.
pub fn sub(minuend: WeightExpr, subtrahend: WeightExpr) -> WeightExpr {
    match (minuend, subtrahend) {
        (m, WeightExpr::Lit(x)) if x == 0.0 => m,
        (WeightExpr::Lit(m), WeightExpr::Lit(s)) => WeightExpr::Lit(m - s),
        (m, s) => WeightExpr::Sub(Box::new(m), Box::new(s)),
    }
}

/// Multiplicative inverse. `reciprocal(reciprocal(x))` collapses to `x`;
/// a reciprocal of zero is left symbolic and fails at evaluation.
pub fn reciprocal(x: WeightExpr) -> WeightExpr {
    match x {
        WeightExpr::Lit(v) if v != 0.0 => WeightExpr::Lit(1.0 / v),
        WeightExpr::Reciprocal(inner) => *inner,
        other => WeightExpr::Reciprocal(Box::new(other)),
    }
}

/// Natural logarithm. `log(exp(x))` collapses to `x`.
pub fn log_of(x: WeightExpr) -> WeightExpr {
    match x {
        WeightExpr::Exp(inner) => *inner,
        other => WeightExpr::Log(Box::new(other)),
    }
}

/// Natural exponential. `exp(log(x))` collapses to `x`.
pub fn exp_of(x: WeightExpr) -> WeightExpr {
    match x {
        WeightExpr::Log(inner) => *inner,
        other => WeightExpr::Exp(Box::new(other)),
    }
}

/// Integer power of a base expression.
pub fn pow_of(base: WeightExpr, exponent: i32) -> WeightExpr {
    match (base, exponent) {
        (_, 0) => one(),
        (b, 1) => b,
        (WeightExpr::Lit(v), k) => WeightExpr::Lit(v.powi(k)),
        (b, k) => WeightExpr::Pow(Box::new(b), k),
    }
}

/// Closed form of the geometric series `1 + w + w² + …`, i.e.
/// `1 / (1 − w)`. Convergence is the caller's concern: for a literal
/// argument at or above one the series diverges.
pub fn geometric_sum(w: WeightExpr) -> WeightExpr {
    reciprocal(sub(one(), w))
}

/// Evaluate an expression against a parameter binding.
pub fn eval(expr: &WeightExpr, params: &Params) -> Result<f64, WeightError> {
    match expr {
        WeightExpr::Lit(x) => Ok(*x),
        WeightExpr::Param(name) => params
            .get(name)
            .ok_or_else(|| WeightError::UnboundParameter(name.clone())),
        WeightExpr::Sum(terms) => {
            let mut total = 0.0;
            for term in terms {
                total += eval(term, params)?;
            }
            Ok(total)
        }
        WeightExpr::Product(factors) => {
            let mut total = 1.0;
            for factor in factors {
                total *= eval(factor, params)?;
            }
            Ok(total)
        }
        WeightExpr::Sub(minuend, subtrahend) => {
            Ok(eval(minuend, params)? - eval(subtrahend, params)?)
        }
        WeightExpr::Reciprocal(x) => {
            let v = eval(x, params)?;
            if v == 0.0 {
                return Err(WeightError::Domain("reciprocal of zero"));
            }
            Ok(1.0 / v)
        }
        WeightExpr::Log(x) => {
            let v = eval(x, params)?;
            if v <= 0.0 {
                return Err(WeightError::Domain("log of a non-positive value"));
            }
            Ok(v.ln())
        }
        WeightExpr::Exp(x) => Ok(eval(x, params)?.exp()),
        WeightExpr::Pow(base, exponent) => Ok(eval(base, params)?.powi(*exponent)),
    }
}

/// Names of the free parameters of an expression, in first-use order.
pub fn param_names(expr: &WeightExpr) -> Vec<SmolStr> {
    let mut names = Vec::new();
    collect_params(expr, &mut names);
    names
}

fn collect_params(expr: &WeightExpr, names: &mut Vec<SmolStr>) {
    match expr {
        WeightExpr::Lit(_) => {}
        WeightExpr::Param(name) => {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        WeightExpr::Sum(xs) | WeightExpr::Product(xs) => {
            for x in xs {
                collect_params(x, names);
            }
        }
        WeightExpr::Sub(a, b) => {
            collect_params(a, names);
            collect_params(b, names);
        }
        WeightExpr::Reciprocal(x) | WeightExpr::Log(x) | WeightExpr::Exp(x) => {
            collect_params(x, names)
        }
        WeightExpr::Pow(base, _) => collect_params(base, names),
    }
}
