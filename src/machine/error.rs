/// Errors raised by machine rewrites.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MachineError {
    /// The weights of a silent cycle form a divergent geometric series.
    #[error("silent cycle weights do not converge")]
    NonConvergent,
}
