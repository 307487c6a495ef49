use smol_str::SmolStr;

/// Errors raised while evaluating a weight expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WeightError {
    /// A parameter reference had no value in the binding.
    #[error("parameter \"{0}\" is not bound")]
    UnboundParameter(SmolStr),

    /// An operation left its numeric domain (log or reciprocal of a
    /// non-positive argument).
    #[error("domain error: {0}")]
    Domain(&'static str),
}
