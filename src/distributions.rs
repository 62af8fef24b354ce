//! Prior distributions for hierarchical models.
//!
//! Each family evaluates its log density together with the partial
//! derivatives with respect to the value and to its parameters, which is all
//! the model graph needs to assemble the gradient of the joint density.

use rand::Rng;
use rand_distr::{Cauchy, Distribution, Exp, Normal};
use thiserror::Error;

use crate::math::LN_SQRT_2PI;

const LN_2: f64 = std::f64::consts::LN_2;
const LN_PI: f64 = 1.144_729_885_849_400_2;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("{family} parameter `{param}` must be positive and finite, found {value}")]
    InvalidParameter {
        family: &'static str,
        param: &'static str,
        value: f64,
    },
    #[error("value {value} is outside the support of {family}")]
    OutOfSupport { family: &'static str, value: f64 },
}

/// A log density value with its partial derivatives.
///
/// `d_params` follows the parameter order of the family, unused entries are 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogpGrad {
    pub logp: f64,
    pub d_value: f64,
    pub d_params: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Parameters `[loc, scale]`
    Normal,
    /// Parameters `[scale]`
    HalfNormal,
    /// Parameters `[rate]`
    Exponential,
    /// Parameters `[scale]`
    HalfCauchy,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Normal => "Normal",
            Family::HalfNormal => "HalfNormal",
            Family::Exponential => "Exponential",
            Family::HalfCauchy => "HalfCauchy",
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Family::Normal => &["loc", "scale"],
            Family::HalfNormal | Family::HalfCauchy => &["scale"],
            Family::Exponential => &["rate"],
        }
    }

    /// Whether the support is the positive half line.
    pub fn is_positive(&self) -> bool {
        !matches!(self, Family::Normal)
    }

    pub fn logp(&self, value: f64, params: [f64; 2]) -> Result<LogpGrad, DistributionError> {
        self.check_params(params)?;
        if self.is_positive() && value < 0f64 {
            return Err(DistributionError::OutOfSupport {
                family: self.name(),
                value,
            });
        }

        let out = match self {
            Family::Normal => {
                let [loc, scale] = params;
                let inv_var = (scale * scale).recip();
                let diff = value - loc;
                LogpGrad {
                    logp: -LN_SQRT_2PI - scale.ln() - 0.5 * diff * diff * inv_var,
                    d_value: -diff * inv_var,
                    d_params: [diff * inv_var, -scale.recip() + diff * diff * inv_var / scale],
                }
            }
            Family::HalfNormal => {
                let scale = params[0];
                let inv_var = (scale * scale).recip();
                LogpGrad {
                    logp: LN_2 - LN_SQRT_2PI - scale.ln() - 0.5 * value * value * inv_var,
                    d_value: -value * inv_var,
                    d_params: [-scale.recip() + value * value * inv_var / scale, 0f64],
                }
            }
            Family::Exponential => {
                let rate = params[0];
                LogpGrad {
                    logp: rate.ln() - rate * value,
                    d_value: -rate,
                    d_params: [rate.recip() - value, 0f64],
                }
            }
            Family::HalfCauchy => {
                let scale = params[0];
                let denom = (scale * scale + value * value).recip();
                LogpGrad {
                    logp: LN_2 - LN_PI - scale.ln() - (value / scale).powi(2).ln_1p(),
                    d_value: -2f64 * value * denom,
                    d_params: [-scale.recip() + 2f64 * value * value * denom / scale, 0f64],
                }
            }
        };
        Ok(out)
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        params: [f64; 2],
    ) -> Result<f64, DistributionError> {
        self.check_params(params)?;
        let invalid = |idx: usize| self.invalid_param(idx, params[idx]);

        let draw = match self {
            Family::Normal => Normal::new(params[0], params[1])
                .map_err(|_| invalid(1))?
                .sample(rng),
            Family::HalfNormal => Normal::new(0f64, params[0])
                .map_err(|_| invalid(0))?
                .sample(rng)
                .abs(),
            Family::Exponential => Exp::new(params[0]).map_err(|_| invalid(0))?.sample(rng),
            Family::HalfCauchy => Cauchy::new(0f64, params[0])
                .map_err(|_| invalid(0))?
                .sample(rng)
                .abs(),
        };
        Ok(draw)
    }

    fn check_params(&self, params: [f64; 2]) -> Result<(), DistributionError> {
        let positive = match self {
            Family::Normal => 1..2,
            _ => 0..1,
        };
        if let Family::Normal = self {
            if !params[0].is_finite() {
                return Err(self.invalid_param(0, params[0]));
            }
        }
        for idx in positive {
            let val = params[idx];
            if !(val > 0f64) || !val.is_finite() {
                return Err(self.invalid_param(idx, val));
            }
        }
        Ok(())
    }

    fn invalid_param(&self, idx: usize, value: f64) -> DistributionError {
        DistributionError::InvalidParameter {
            family: self.name(),
            param: self.param_names()[idx],
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;

    const EPS: f64 = 1e-6;

    fn check_grad(family: Family, value: f64, params: [f64; 2]) {
        let out = family.logp(value, params).unwrap();

        let up = family.logp(value + EPS, params).unwrap().logp;
        let down = family.logp(value - EPS, params).unwrap().logp;
        assert_abs_diff_eq!(out.d_value, (up - down) / (2. * EPS), epsilon = 1e-5);

        for idx in 0..family.param_names().len() {
            let mut p_up = params;
            let mut p_down = params;
            p_up[idx] += EPS;
            p_down[idx] -= EPS;
            let up = family.logp(value, p_up).unwrap().logp;
            let down = family.logp(value, p_down).unwrap().logp;
            assert_abs_diff_eq!(out.d_params[idx], (up - down) / (2. * EPS), epsilon = 1e-5);
        }
    }

    proptest! {
        #[test]
        fn normal_gradients(x in -5f64..5f64, loc in -3f64..3f64, scale in 0.2f64..4f64) {
            check_grad(Family::Normal, x, [loc, scale]);
        }

        #[test]
        fn positive_gradients(x in 0.1f64..5f64, scale in 0.2f64..4f64) {
            check_grad(Family::HalfNormal, x, [scale, 0.]);
            check_grad(Family::Exponential, x, [scale, 0.]);
            check_grad(Family::HalfCauchy, x, [scale, 0.]);
        }
    }

    #[test]
    fn known_values() {
        let std_normal = Family::Normal.logp(0., [0., 1.]).unwrap();
        assert_abs_diff_eq!(std_normal.logp, -0.918_938_533_204_672_8, epsilon = 1e-14);

        let exp = Family::Exponential.logp(2., [0.5, 0.]).unwrap();
        assert_abs_diff_eq!(exp.logp, 0.5f64.ln() - 1., epsilon = 1e-14);

        // The half distributions carry twice the mass of their full counterparts.
        let half = Family::HalfNormal.logp(1.5, [2., 0.]).unwrap();
        let full = Family::Normal.logp(1.5, [0., 2.]).unwrap();
        assert_abs_diff_eq!(half.logp, full.logp + LN_2, epsilon = 1e-14);

        let cauchy = Family::HalfCauchy.logp(0., [1., 0.]).unwrap();
        assert_abs_diff_eq!(cauchy.logp, (2. / std::f64::consts::PI).ln(), epsilon = 1e-14);
    }

    #[test]
    fn rejects_invalid_parameters() {
        let err = Family::Normal.logp(0., [0., 0.]).unwrap_err();
        assert_eq!(
            err,
            DistributionError::InvalidParameter {
                family: "Normal",
                param: "scale",
                value: 0.
            }
        );
        assert!(Family::Normal.logp(0., [f64::NAN, 1.]).is_err());
        assert!(Family::Exponential.logp(1., [-1., 0.]).is_err());
        assert!(Family::HalfCauchy.logp(1., [f64::INFINITY, 0.]).is_err());

        let err = Family::HalfNormal.logp(-1., [1., 0.]).unwrap_err();
        assert!(matches!(err, DistributionError::OutOfSupport { .. }));

        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert!(Family::HalfNormal.sample(&mut rng, [-2., 0.]).is_err());
    }

    #[test]
    fn samples_in_support() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for family in [Family::HalfNormal, Family::Exponential, Family::HalfCauchy] {
            for _ in 0..1000 {
                let draw = family.sample(&mut rng, [1.5, 0.]).unwrap();
                assert!(draw >= 0.);
            }
        }
    }

    #[test]
    fn sample_moments() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let n = 50_000;

        let mean = (0..n)
            .map(|_| Family::Exponential.sample(&mut rng, [0.5, 0.]).unwrap())
            .sum::<f64>()
            / n as f64;
        assert_abs_diff_eq!(mean, 2., epsilon = 0.05);

        let mean = (0..n)
            .map(|_| Family::Normal.sample(&mut rng, [-3., 2.]).unwrap())
            .sum::<f64>()
            / n as f64;
        assert_abs_diff_eq!(mean, -3., epsilon = 0.05);

        // E|X| = scale * sqrt(2 / pi)
        let mean = (0..n)
            .map(|_| Family::HalfNormal.sample(&mut rng, [2., 0.]).unwrap())
            .sum::<f64>()
            / n as f64;
        assert_abs_diff_eq!(
            mean,
            2. * (2. / std::f64::consts::PI).sqrt(),
            epsilon = 0.05
        );
    }
}
