//! Simulated fold-change experiments.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{
    data::{DataError, ExperimentConstants, FoldChangeData},
    model::Parameters,
    thermo::MwcModel,
};

/// `n` points from `start` to `stop` (both included) evenly spaced on a log
/// scale.
pub fn log_spaced(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let (lo, hi) = (start.ln(), stop.ln());
            (0..n)
                .map(|i| (lo + (hi - lo) * i as f64 / (n - 1) as f64).exp())
                .collect()
        }
    }
}

/// Simulate `replicates` measurements at every concentration, with normal
/// noise of scale `truth.sigma` around the predicted fold-change.
pub fn simulate<R: Rng + ?Sized>(
    constants: ExperimentConstants,
    concentrations: &[f64],
    replicates: usize,
    truth: &Parameters,
    rng: &mut R,
) -> Result<FoldChangeData, DataError> {
    if !(truth.sigma > 0.) {
        return Err(DataError::NoiseScale(truth.sigma));
    }
    let noise = Normal::new(0., truth.sigma).map_err(|_| DataError::NoiseScale(truth.sigma))?;
    let model = MwcModel::new(constants, truth.ep_a, truth.ep_i);

    let mut c = Vec::with_capacity(concentrations.len() * replicates);
    let mut fc = Vec::with_capacity(concentrations.len() * replicates);
    for &conc in concentrations {
        let mean = model.fold_change(conc);
        for _ in 0..replicates {
            c.push(conc);
            fc.push(mean + noise.sample(rng));
        }
    }
    FoldChangeData::new(constants, c, fc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn constants() -> ExperimentConstants {
        ExperimentConstants {
            repressors: 100.,
            nonspecific_sites: 4.6e6,
            ep_ai: -8.,
            ep_r: -12.,
            n_sites: 2,
        }
    }

    #[test]
    fn log_spacing() {
        let points = log_spaced(1e-6, 1e-2, 5);
        assert_eq!(points.len(), 5);
        for (point, expected) in points.iter().zip([1e-6, 1e-5, 1e-4, 1e-3, 1e-2]) {
            assert_relative_eq!(*point, expected, max_relative = 1e-12);
        }
        assert!(log_spaced(1., 2., 0).is_empty());
        assert_eq!(log_spaced(3., 4., 1), vec![3.]);
    }

    #[test]
    fn replicates_scatter_around_prediction() {
        let mut rng = StdRng::seed_from_u64(3);
        let truth = Parameters::new(-14., -9.7, 0.05);
        let concentrations = [0., 1e-5, 1e-3];
        let data = simulate(constants(), &concentrations, 400, &truth, &mut rng).unwrap();
        assert_eq!(data.len(), 1200);

        let model = MwcModel::new(constants(), truth.ep_a, truth.ep_i);
        for (i, &conc) in concentrations.iter().enumerate() {
            let values = &data.fold_changes()[i * 400..(i + 1) * 400];
            assert!(data.concentrations()[i * 400..(i + 1) * 400]
                .iter()
                .all(|&c| c == conc));
            let mean = values.iter().sum::<f64>() / 400.;
            // standard error 0.0025
            assert!((mean - model.fold_change(conc)).abs() < 0.01);
        }
    }

    #[test]
    fn invalid_noise() {
        let mut rng = StdRng::seed_from_u64(3);
        for sigma in [0., -1., f64::NAN] {
            let truth = Parameters::new(-14., -9.7, sigma);
            assert!(matches!(
                simulate(constants(), &[1e-4], 2, &truth, &mut rng),
                Err(DataError::NoiseScale(_))
            ));
        }
    }
}
