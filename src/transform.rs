//! The non-centered parametrization of a Gaussian variable.
//!
//! A hierarchical Gaussian variable `x ~ N(loc, scale)` is written as a
//! deterministic function of a standard normal variable
//! `raw ~ N(0, 1)`:
//!
//! ```text
//! x = raw * scale + loc
//! ```
//!
//! For every `scale > 0` the two are equal in distribution, but the geometry
//! a gradient based sampler sees in terms of `raw` does not depend on `scale`,
//! which removes the funnel between group level scale parameters and the
//! group members.

use ndarray::{ArrayD, ArrayViewD, AsArray, Dimension, Zip};
use thiserror::Error;

use crate::broadcast::{broadcast_all, BroadcastError};
use crate::math::{
    affine_out, axpy_out, first_invalid_scale, first_zero, fma_out, is_valid_scale,
    scaled_shift_out,
};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("scale must be strictly positive and finite, found {value} at index {index}")]
    InvalidParameter { index: usize, value: f64 },
    #[error("inverse transform is undefined for zero scale (index {index})")]
    DivisionUndefined { index: usize },
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error("expected {expected} elements, found {found}")]
    Length { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// How the transform treats the `scale > 0` precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleCheck {
    /// Reject zero, negative, infinite and NaN scales with
    /// `TransformError::InvalidParameter`.
    #[default]
    Strict,
    /// Skip the check. The caller guarantees positivity, usually because the
    /// scale comes from a prior with positive support.
    ///
    /// A zero scale in the forward transform then returns `loc` exactly.
    /// The inverse transform still rejects a zero scale.
    Trusted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformSettings {
    pub scale_check: ScaleCheck,
}

/// A location or scale operand for the slice level transform.
///
/// A slice of length 1 broadcasts like a scalar.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(f64),
    Slice(&'a [f64]),
}

impl<'a> Operand<'a> {
    #[inline]
    pub fn get(&self, idx: usize) -> f64 {
        match self {
            Operand::Scalar(val) => *val,
            Operand::Slice(vals) if vals.len() == 1 => vals[0],
            Operand::Slice(vals) => vals[idx],
        }
    }

    fn check_len(&self, n: usize) -> Result<()> {
        match self {
            Operand::Slice(vals) if vals.len() != 1 && vals.len() != n => {
                Err(TransformError::Length {
                    expected: n,
                    found: vals.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Replace single element slices by scalars.
    fn squeeze(self) -> Self {
        match self {
            Operand::Slice(&[val]) => Operand::Scalar(val),
            other => other,
        }
    }

    fn first_invalid_scale(&self) -> Option<(usize, f64)> {
        match self {
            Operand::Scalar(val) => first_invalid_scale(std::slice::from_ref(val)),
            Operand::Slice(vals) => first_invalid_scale(vals),
        }
    }

    fn first_zero(&self) -> Option<usize> {
        match self {
            Operand::Scalar(val) => first_zero(std::slice::from_ref(val)),
            Operand::Slice(vals) => first_zero(vals),
        }
    }
}

impl From<f64> for Operand<'_> {
    fn from(val: f64) -> Self {
        Operand::Scalar(val)
    }
}

impl<'a> From<&'a [f64]> for Operand<'a> {
    fn from(vals: &'a [f64]) -> Self {
        Operand::Slice(vals)
    }
}

impl<'a> From<&'a Vec<f64>> for Operand<'a> {
    fn from(vals: &'a Vec<f64>) -> Self {
        Operand::Slice(vals.as_slice())
    }
}

/// Forward and inverse non-centered transform.
///
/// The transform holds no state apart from its settings and can be shared
/// between threads freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonCenteredGaussian {
    settings: TransformSettings,
}

impl NonCenteredGaussian {
    pub fn new(settings: TransformSettings) -> Self {
        Self { settings }
    }

    /// A transform that does not validate the scale in the forward direction.
    pub fn trusted() -> Self {
        Self::new(TransformSettings {
            scale_check: ScaleCheck::Trusted,
        })
    }

    pub fn settings(&self) -> TransformSettings {
        self.settings
    }

    /// Compute `raw * scale + loc` with broadcasting.
    pub fn transform<'r, 'l, 's, DR, DL, DS>(
        &self,
        raw: impl AsArray<'r, f64, DR>,
        loc: impl AsArray<'l, f64, DL>,
        scale: impl AsArray<'s, f64, DS>,
    ) -> Result<ArrayD<f64>>
    where
        DR: Dimension,
        DL: Dimension,
        DS: Dimension,
    {
        let raw = raw.into().into_dyn();
        let loc = loc.into().into_dyn();
        let scale = scale.into().into_dyn();

        self.check_forward(scale.iter().copied())?;

        let shape = broadcast_all([raw.shape(), loc.shape(), scale.shape()])?;
        let raw = broadcast_to(&raw, &shape)?;
        let loc = broadcast_to(&loc, &shape)?;
        let scale = broadcast_to(&scale, &shape)?;

        Ok(Zip::from(raw)
            .and(loc)
            .and(scale)
            .map_collect(|&raw, &loc, &scale| raw * scale + loc))
    }

    /// Compute `(effective - loc) / scale` with broadcasting.
    pub fn untransform<'e, 'l, 's, DE, DL, DS>(
        &self,
        effective: impl AsArray<'e, f64, DE>,
        loc: impl AsArray<'l, f64, DL>,
        scale: impl AsArray<'s, f64, DS>,
    ) -> Result<ArrayD<f64>>
    where
        DE: Dimension,
        DL: Dimension,
        DS: Dimension,
    {
        let effective = effective.into().into_dyn();
        let loc = loc.into().into_dyn();
        let scale = scale.into().into_dyn();

        self.check_inverse(scale.iter().copied())?;

        let shape = broadcast_all([effective.shape(), loc.shape(), scale.shape()])?;
        let effective = broadcast_to(&effective, &shape)?;
        let loc = broadcast_to(&loc, &shape)?;
        let scale = broadcast_to(&scale, &shape)?;

        Ok(Zip::from(effective)
            .and(loc)
            .and(scale)
            .map_collect(|&effective, &loc, &scale| (effective - loc) / scale))
    }

    pub fn transform_scalar(&self, raw: f64, loc: f64, scale: f64) -> Result<f64> {
        self.check_forward(std::iter::once(scale))?;
        Ok(raw * scale + loc)
    }

    pub fn untransform_scalar(&self, effective: f64, loc: f64, scale: f64) -> Result<f64> {
        self.check_inverse(std::iter::once(scale))?;
        Ok((effective - loc) / scale)
    }

    /// Slice version of [`NonCenteredGaussian::transform`] that writes into `out`.
    ///
    /// `loc` and `scale` must be scalars or have length 1 or `raw.len()`.
    pub fn transform_into(
        &self,
        raw: &[f64],
        loc: Operand,
        scale: Operand,
        out: &mut [f64],
    ) -> Result<()> {
        let n = raw.len();
        check_out_len(n, out)?;
        loc.check_len(n)?;
        scale.check_len(n)?;

        if self.settings.scale_check == ScaleCheck::Strict {
            if let Some((index, value)) = scale.first_invalid_scale() {
                return Err(TransformError::InvalidParameter { index, value });
            }
        }

        match (loc.squeeze(), scale.squeeze()) {
            (Operand::Scalar(loc), Operand::Scalar(scale)) => affine_out(raw, scale, loc, out),
            (Operand::Slice(loc), Operand::Scalar(scale)) => axpy_out(raw, loc, scale, out),
            (Operand::Scalar(loc), Operand::Slice(scale)) => {
                scaled_shift_out(raw, scale, loc, out)
            }
            (Operand::Slice(loc), Operand::Slice(scale)) => fma_out(raw, scale, loc, out),
        }
        Ok(())
    }

    /// Slice version of [`NonCenteredGaussian::untransform`] that writes into `out`.
    pub fn untransform_into(
        &self,
        effective: &[f64],
        loc: Operand,
        scale: Operand,
        out: &mut [f64],
    ) -> Result<()> {
        let n = effective.len();
        check_out_len(n, out)?;
        loc.check_len(n)?;
        scale.check_len(n)?;

        if let Some(index) = scale.first_zero() {
            return Err(TransformError::DivisionUndefined { index });
        }
        if self.settings.scale_check == ScaleCheck::Strict {
            if let Some((index, value)) = scale.first_invalid_scale() {
                return Err(TransformError::InvalidParameter { index, value });
            }
        }

        out.iter_mut()
            .zip(effective)
            .enumerate()
            .for_each(|(i, (out, &effective))| {
                *out = (effective - loc.get(i)) / scale.get(i);
            });
        Ok(())
    }

    fn check_forward(&self, scale: impl Iterator<Item = f64>) -> Result<()> {
        if self.settings.scale_check == ScaleCheck::Trusted {
            return Ok(());
        }
        match scale.enumerate().find(|&(_, val)| !is_valid_scale(val)) {
            Some((index, value)) => Err(TransformError::InvalidParameter { index, value }),
            None => Ok(()),
        }
    }

    fn check_inverse(&self, scale: impl Iterator<Item = f64>) -> Result<()> {
        let mut invalid = None;
        for (index, value) in scale.enumerate() {
            if value == 0f64 {
                return Err(TransformError::DivisionUndefined { index });
            }
            if invalid.is_none() && !is_valid_scale(value) {
                invalid = Some((index, value));
            }
        }
        match invalid {
            Some((index, value)) if self.settings.scale_check == ScaleCheck::Strict => {
                Err(TransformError::InvalidParameter { index, value })
            }
            _ => Ok(()),
        }
    }
}

/// `sum(ln |scale|)` over `n` broadcast elements.
///
/// This is the log absolute determinant of the Jacobian of the forward
/// transform with respect to `raw`, so a density written in terms of `raw`
/// equals the density in terms of the effective variable plus this term.
pub fn log_abs_det_jacobian(scale: Operand, n: usize) -> Result<f64> {
    scale.check_len(n)?;
    Ok(match scale.squeeze() {
        Operand::Scalar(val) => n as f64 * val.abs().ln(),
        Operand::Slice(vals) => vals.iter().map(|val| val.abs().ln()).sum(),
    })
}

/// Forward transform with the default (strict) settings.
pub fn transform<'r, 'l, 's, DR, DL, DS>(
    raw: impl AsArray<'r, f64, DR>,
    loc: impl AsArray<'l, f64, DL>,
    scale: impl AsArray<'s, f64, DS>,
) -> Result<ArrayD<f64>>
where
    DR: Dimension,
    DL: Dimension,
    DS: Dimension,
{
    NonCenteredGaussian::default().transform(raw, loc, scale)
}

/// Inverse transform with the default (strict) settings.
pub fn untransform<'e, 'l, 's, DE, DL, DS>(
    effective: impl AsArray<'e, f64, DE>,
    loc: impl AsArray<'l, f64, DL>,
    scale: impl AsArray<'s, f64, DS>,
) -> Result<ArrayD<f64>>
where
    DE: Dimension,
    DL: Dimension,
    DS: Dimension,
{
    NonCenteredGaussian::default().untransform(effective, loc, scale)
}

fn broadcast_to<'a>(view: &'a ArrayViewD<'_, f64>, shape: &[usize]) -> Result<ArrayViewD<'a, f64>> {
    view.broadcast(shape).ok_or_else(|| {
        BroadcastError {
            lhs: view.shape().to_vec(),
            rhs: shape.to_vec(),
        }
        .into()
    })
}

fn check_out_len(n: usize, out: &[f64]) -> Result<()> {
    if out.len() != n {
        return Err(TransformError::Length {
            expected: n,
            found: out.len(),
        });
    }
    Ok(())
}
