//! Ready made hierarchical models, each in both parametrizations.

use crate::graph::{Input, Model, ModelBuilder, ModelSettings, NodeId, Result};

/// Estimated treatment effects of the eight schools study.
pub const EIGHT_SCHOOLS_Y: [f64; 8] = [28., 8., -3., 7., -1., 1., 18., 12.];
/// Standard errors of the treatment effects.
pub const EIGHT_SCHOOLS_SIGMA: [f64; 8] = [15., 10., 16., 11., 9., 11., 10., 18.];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parametrization {
    /// Group members are free variables drawn around the group mean.
    Centered,
    /// Group members are deterministic offsets of standard normal variables.
    NonCentered,
}

impl Parametrization {
    fn group_members(
        self,
        builder: &mut ModelBuilder,
        name: &str,
        loc: impl Into<Input>,
        scale: impl Into<Input>,
        len: usize,
    ) -> Result<NodeId> {
        match self {
            Parametrization::Centered => builder.normal(name, loc, scale, len),
            Parametrization::NonCentered => builder.non_centered_normal(name, loc, scale, len),
        }
    }
}

/// The eight schools model.
///
/// ```text
/// mu ~ N(0, 5)
/// tau ~ HalfCauchy(5)
/// theta ~ N(mu, tau)
/// y ~ N(theta, sigma)
/// ```
pub fn eight_schools(parametrization: Parametrization) -> Result<Model> {
    eight_schools_with(
        &EIGHT_SCHOOLS_Y,
        &EIGHT_SCHOOLS_SIGMA,
        parametrization,
        ModelSettings::default(),
    )
}

pub fn eight_schools_with(
    y: &[f64],
    sigma: &[f64],
    parametrization: Parametrization,
    settings: ModelSettings,
) -> Result<Model> {
    let mut builder = ModelBuilder::with_settings(settings);
    let mu = builder.normal("mu", 0., 5., 1)?;
    let tau = builder.half_cauchy("tau", 5., 1)?;
    let theta = parametrization.group_members(&mut builder, "theta", mu, tau, y.len())?;
    let sigma = builder.data("sigma", sigma)?;
    builder.observed_normal("y", theta, sigma, y, None)?;
    Ok(builder.build())
}

/// Varying intercepts for grouped observations.
///
/// ```text
/// mu_a ~ N(0, 1)
/// sigma_a ~ HalfCauchy(5)
/// a ~ N(mu_a, sigma_a)        one per group
/// eps ~ HalfCauchy(5)
/// y[i] ~ N(a[group[i]], eps)
/// ```
pub fn varying_intercepts(
    y: &[f64],
    group: &[usize],
    n_groups: usize,
    parametrization: Parametrization,
) -> Result<Model> {
    let mut builder = ModelBuilder::new();
    let mu_a = builder.normal("mu_a", 0., 1., 1)?;
    let sigma_a = builder.half_cauchy("sigma_a", 5., 1)?;
    let a = parametrization.group_members(&mut builder, "a", mu_a, sigma_a, n_groups)?;
    let eps = builder.half_cauchy("eps", 5., 1)?;
    builder.observed_normal("y", a, eps, y, Some(group.to_vec()))?;
    Ok(builder.build())
}
