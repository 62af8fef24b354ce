use std::fmt::Debug;

/// Errors that happen when we evaluate the logp and gradient function
pub trait LogpError: std::error::Error {
    /// Unrecoverable errors during logp computation stop sampling,
    /// recoverable errors are seen as divergences.
    fn is_recoverable(&self) -> bool;
}

/// A log density with gradient, evaluated on an unconstrained position.
///
/// This is the boundary to a gradient based sampler. Each chain owns its own
/// instance, so implementations may keep scratch space in `self`.
pub trait CpuLogpFunc {
    type LogpError: Debug + Send + Sync + LogpError + 'static;

    /// The number of unconstrained parameters.
    fn dim(&self) -> usize;

    /// Compute the unnormalized log probability density and store its
    /// gradient in `gradient`.
    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError>;
}
