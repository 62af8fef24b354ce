//! Non-centered reparametrization of hierarchical Gaussian models.
//!
//! Gradient based samplers struggle with hierarchical models where the scale
//! of a group of variables is itself a parameter: for small scales the
//! posterior forms a narrow funnel that no single step size can traverse, and
//! the sampler reports divergences. Writing the group members as
//! `theta = theta_raw * tau + mu` with `theta_raw ~ N(0, 1)` leaves the
//! distribution of `theta` unchanged and removes the funnel.
//!
//! [`NonCenteredGaussian`] implements that transform and its inverse,
//! [`ModelBuilder`] assembles models that use it as a deterministic node, and
//! the resulting [`ModelDensity`] is the log density with gradient that a
//! sampler evaluates through [`CpuLogpFunc`].
//!
//! ```
//! use noncentered::{eight_schools, CpuLogpFunc, Parametrization};
//!
//! let model = eight_schools(Parametrization::NonCentered).unwrap();
//! let mut density = model.density();
//! let position = vec![0f64; model.dim()];
//! let mut gradient = vec![0f64; model.dim()];
//! let logp = density.logp(&position, &mut gradient).unwrap();
//! assert!(logp.is_finite());
//! ```

pub(crate) mod broadcast;
pub(crate) mod distributions;
pub(crate) mod draws;
pub(crate) mod graph;
pub(crate) mod logp;
pub(crate) mod math;
pub(crate) mod models;
pub(crate) mod transform;

pub use broadcast::{broadcast_all, broadcast_shapes, BroadcastError};
pub use distributions::{DistributionError, Family, LogpGrad};
pub use draws::{extract, sample_prior_chains, summarize, ChainDraws, DrawSettings, Summary};
pub use graph::{Input, Model, ModelBuilder, ModelDensity, ModelError, ModelSettings, NodeId};
pub use logp::{CpuLogpFunc, LogpError};
pub use models::{
    eight_schools, eight_schools_with, varying_intercepts, Parametrization, EIGHT_SCHOOLS_SIGMA,
    EIGHT_SCHOOLS_Y,
};
pub use transform::{
    log_abs_det_jacobian, transform, untransform, NonCenteredGaussian, Operand, ScaleCheck,
    TransformError, TransformSettings,
};
