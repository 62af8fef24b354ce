use ndarray::{arr0, arr1, Array1};
use noncentered::{
    summarize, transform, untransform, NonCenteredGaussian, Operand, TransformError,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

proptest! {
    #[test]
    fn round_trip(
        raw in prop::collection::vec(-1e3f64..1e3f64, 1..20),
        loc in -1e3f64..1e3f64,
        scale in prop_oneof![1e-3f64..1e3f64, -1e3f64..-1e-3f64],
    ) {
        let transform = NonCenteredGaussian::trusted();
        let effective = transform.transform(&raw, &arr0(loc), &arr0(scale)).unwrap();
        let back = transform.untransform(&effective, &arr0(loc), &arr0(scale)).unwrap();
        for (&a, &b) in raw.iter().zip(back.iter()) {
            let tol = 1e-9 * a.abs().max(1.) * (1. + loc.abs() / scale.abs());
            prop_assert!((a - b).abs() <= tol, "{} != {}", a, b);
        }
    }

    #[test]
    fn round_trip_elementwise(
        values in prop::collection::vec((-50f64..50f64, -50f64..50f64, 0.01f64..50f64), 1..20),
    ) {
        let raw: Vec<f64> = values.iter().map(|v| v.0).collect();
        let loc: Vec<f64> = values.iter().map(|v| v.1).collect();
        let scale: Vec<f64> = values.iter().map(|v| v.2).collect();

        let transform = NonCenteredGaussian::default();
        let mut effective = vec![0f64; raw.len()];
        transform
            .transform_into(&raw, Operand::from(&loc), Operand::from(&scale), &mut effective)
            .unwrap();
        let mut back = vec![0f64; raw.len()];
        transform
            .untransform_into(&effective, Operand::from(&loc), Operand::from(&scale), &mut back)
            .unwrap();
        for (&a, &b) in raw.iter().zip(back.iter()) {
            prop_assert!((a - b).abs() <= 1e-9 * (1. + a.abs()) * 1e3);
        }
    }

    #[test]
    fn zero_raw_is_loc(
        loc in prop::collection::vec(-1e6f64..1e6f64, 1..10),
        scale in 1e-6f64..1e6f64,
    ) {
        let zeros = vec![0f64; loc.len()];
        let effective = transform(&zeros, &loc, &arr0(scale)).unwrap();
        prop_assert_eq!(effective.as_slice().unwrap(), loc.as_slice());
    }
}

#[test]
fn matches_direct_normal_draws() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let n = 100_000;
    let raw: Array1<f64> = (0..n)
        .map(|_| {
            let draw: f64 = StandardNormal.sample(&mut rng);
            draw
        })
        .collect();

    let effective = transform(&raw, &arr0(5.), &arr0(2.)).unwrap();
    let summary = summarize(effective.iter().copied());

    assert_eq!(summary.count, n as u64);
    assert!((summary.mean - 5.).abs() < 0.05, "mean {}", summary.mean);
    assert!((summary.std - 2.).abs() < 0.05, "std {}", summary.std);
}

#[test]
fn zero_scale_is_rejected() {
    let err = transform(&[0.3], &arr0(0.), &arr0(0.)).unwrap_err();
    assert!(matches!(err, TransformError::InvalidParameter { index: 0, .. }));
}

#[test]
fn negative_scale_is_rejected() {
    let err = transform(&[0.5], &arr0(0.), &arr0(-1.)).unwrap_err();
    assert!(matches!(err, TransformError::InvalidParameter { .. }));
}

#[test]
fn broadcasts_location() {
    let out = transform(&[1., 1., 1.], &[0., 1., 2.], &[1., 1., 1.]).unwrap();
    assert_eq!(out, arr1(&[1., 2., 3.]).into_dyn());
}

#[test]
fn inverse_rejects_zero_scale() {
    let err = untransform(&[1.], &arr0(0.), &arr0(0.)).unwrap_err();
    assert_eq!(err, TransformError::DivisionUndefined { index: 0 });
    assert_eq!(
        err.to_string(),
        "inverse transform is undefined for zero scale (index 0)"
    );
}
