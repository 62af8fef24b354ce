//! Prior draws for several chains and post-processing of traces.

use itertools::Itertools;
use log::trace;
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::graph::{Model, ModelError, Result};

#[derive(Debug, Clone, Copy)]
pub struct DrawSettings {
    /// The number of independent chains
    pub num_chains: usize,
    /// The number of draws per chain
    pub num_draws: usize,
    pub seed: u64,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            num_chains: 4,
            num_draws: 1000,
            seed: 0,
        }
    }
}

/// Unconstrained positions drawn by one chain.
#[derive(Debug, Clone)]
pub struct ChainDraws {
    pub chain: u64,
    pub draws: Vec<Box<[f64]>>,
}

/// Draw from the prior of `model`, one random stream per chain.
///
/// The result only depends on the seed and the chain index, not on how the
/// chains are scheduled.
pub fn sample_prior_chains(model: &Model, settings: &DrawSettings) -> Result<Vec<ChainDraws>> {
    (0..settings.num_chains as u64)
        .into_par_iter()
        .map(|chain| {
            let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
            rng.set_stream(chain);
            trace!(
                "Drawing {} prior samples for chain {}",
                settings.num_draws,
                chain
            );
            let draws = (0..settings.num_draws)
                .map(|_| model.sample_prior(&mut rng).map(Vec::into_boxed_slice))
                .collect::<Result<Vec<_>>>()?;
            Ok(ChainDraws { chain, draws })
        })
        .collect()
}

/// Values of the variable `name` for every draw, one row per draw.
pub fn extract(model: &Model, draws: &[Box<[f64]>], name: &str) -> Result<Array2<f64>> {
    let len = model.len_of(name)?;
    let rows = draws
        .par_iter()
        .map(|draw| {
            let mut values = model.expand_draw(draw)?;
            values
                .remove(name)
                .ok_or_else(|| ModelError::UnknownName(name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let flat = rows.into_iter().flatten().collect_vec();
    let found = flat.len();
    Array2::from_shape_vec((draws.len(), len), flat).map_err(|_| ModelError::Shape {
        name: name.to_string(),
        expected: draws.len() * len,
        found,
    })
}

/// Mean and standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    pub std: f64,
}

/// Summarize a sample with a running (Welford) variance.
///
/// The mean of an empty sample and the standard deviation of a sample with
/// less than two values are NaN.
pub fn summarize(values: impl IntoIterator<Item = f64>) -> Summary {
    let mut count = 0u64;
    let mut mean = 0f64;
    let mut m2 = 0f64;
    for val in values {
        count += 1;
        let diff = val - mean;
        mean += diff / count as f64;
        m2 += diff * (val - mean);
    }
    let std = if count > 1 {
        (m2 / (count - 1) as f64).sqrt()
    } else {
        f64::NAN
    };
    if count == 0 {
        mean = f64::NAN;
    }
    Summary { count, mean, std }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModelBuilder;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn model() -> Model {
        let mut builder = ModelBuilder::new();
        let mu = builder.normal("mu", 1., 0.5, 1).unwrap();
        let tau = builder.exponential("tau", 2., 1).unwrap();
        builder.non_centered_normal("theta", mu, tau, 4).unwrap();
        builder.build()
    }

    #[test]
    fn chains_are_reproducible() {
        let model = model();
        let settings = DrawSettings {
            num_chains: 3,
            num_draws: 20,
            seed: 7,
        };
        let first = sample_prior_chains(&model, &settings).unwrap();
        let second = sample_prior_chains(&model, &settings).unwrap();
        assert_eq!(first.len(), 3);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.chain, b.chain);
            assert_eq!(a.draws, b.draws);
        }
        assert!(first[0].draws != first[1].draws);
    }

    #[test]
    fn extract_rows() {
        let model = model();
        let draws: Vec<Box<[f64]>> = vec![
            vec![1., 0., 1., 2., 3., 4.].into(),
            vec![0., 0., -1., 0., 0., 1.].into(),
        ];
        let theta = extract(&model, &draws, "theta").unwrap();
        assert_eq!(theta.shape(), &[2, 4]);
        assert_eq!(theta.row(0).to_vec(), vec![2., 3., 4., 5.]);
        assert_eq!(theta.row(1).to_vec(), vec![-1., 0., 0., 1.]);

        assert!(matches!(
            extract(&model, &draws, "y"),
            Err(ModelError::UnknownName(_))
        ));
    }

    #[test]
    fn welford_summary() {
        let summary = summarize([1., 2., 3., 4.]);
        assert_eq!(summary.count, 4);
        assert_abs_diff_eq!(summary.mean, 2.5, epsilon = 1e-15);
        assert_abs_diff_eq!(summary.std, (5f64 / 3.).sqrt(), epsilon = 1e-15);
        assert!(summarize([1.]).std.is_nan());
        assert_eq!(summarize([1.]).mean, 1.);

        let empty = summarize(std::iter::empty());
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.std.is_nan());
    }
}
