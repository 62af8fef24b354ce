use itertools::izip;
use multiversion::multiversion;

/// `ln(sqrt(2 * pi))`
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

#[multiversion(targets("x86_64+avx+avx2+fma", "x86+sse", "arm+neon"))]
pub(crate) fn affine_out(x: &[f64], a: f64, b: f64, out: &mut [f64]) {
    let n = x.len();
    assert!(out.len() == n);

    izip!(x, out).for_each(|(x, out)| {
        *out = x * a + b;
    });
}

#[multiversion(targets("x86_64+avx+avx2+fma", "x86+sse", "arm+neon"))]
pub(crate) fn axpy_out(x: &[f64], y: &[f64], a: f64, out: &mut [f64]) {
    let n = x.len();
    assert!(y.len() == n);
    assert!(out.len() == n);

    izip!(x, y, out).for_each(|(x, y, out)| {
        *out = x * a + y;
    });
}

/// `out = x * a + b` with a per-element `a` and scalar `b`
#[multiversion(targets("x86_64+avx+avx2+fma", "x86+sse", "arm+neon"))]
pub(crate) fn scaled_shift_out(x: &[f64], a: &[f64], b: f64, out: &mut [f64]) {
    let n = x.len();
    assert!(a.len() == n);
    assert!(out.len() == n);

    izip!(x, a, out).for_each(|(x, a, out)| {
        *out = x * a + b;
    });
}

#[multiversion(targets("x86_64+avx+avx2+fma", "x86+sse", "arm+neon"))]
pub(crate) fn fma_out(x: &[f64], a: &[f64], b: &[f64], out: &mut [f64]) {
    let n = x.len();
    assert!(a.len() == n);
    assert!(b.len() == n);
    assert!(out.len() == n);

    izip!(x, a, b, out).for_each(|(x, a, b, out)| {
        *out = x * a + b;
    });
}

/// A usable scale is strictly positive and finite, NaN is neither.
#[inline]
pub(crate) fn is_valid_scale(val: f64) -> bool {
    val > 0f64 && val.is_finite()
}

/// Index and value of the first element that is not a valid scale.
pub(crate) fn first_invalid_scale(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|&(_, val)| !is_valid_scale(val))
}

pub(crate) fn first_zero(values: &[f64]) -> Option<usize> {
    values.iter().position(|&val| val == 0f64)
}
