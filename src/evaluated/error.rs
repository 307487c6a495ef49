use smol_str::SmolStr;

use crate::weight::WeightError;

/// Errors raised while building or querying an evaluated machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum EvalError {
    /// A transition label was missing from the machine's own alphabet.
    #[error("symbol \"{0}\" is not in the alphabet")]
    MissingSymbol(SmolStr),

    /// The machine has a silent transition to an earlier state; evaluation
    /// requires an advancing machine.
    #[error("machine is not advancing")]
    NotAdvancing,

    /// The silent-transition system is singular: the geometric path sum
    /// does not converge.
    #[error("silent transition weights do not converge")]
    NonConvergent,

    /// A transition weight failed to evaluate.
    #[error("weight evaluation failed")]
    Weight(#[from] WeightError),
}
