//! The Bayesian fold-change model.
//!
//! Observed fold-changes are normally distributed around the prediction of
//! the thermodynamic model, with a shared noise scale `sigma`:
//!
//! ```text
//! ep_a  ~ Normal(0, 10)
//! ep_i  ~ Normal(0, 10)
//! sigma ~ Beta(0.5, 0.5)
//! fc[k] ~ Normal(fold_change(c[k], ep_a, ep_i), sigma)
//! ```
//!
//! [`FoldChangePosterior`] evaluates the log posterior density of
//! `(ep_a, ep_i, sigma)`. [`UnconstrainedPosterior`] exposes the same density
//! to the sampler on `(ep_a, ep_i, logit(sigma))`.

use itertools::izip;
use nuts_rs::{CpuLogpFunc, LogpError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data::FoldChangeData,
    math::softplus,
    priors::{Priors, LN_SQRT_2PI},
    thermo::MwcModel,
};

/// A point in parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub ep_a: f64,
    pub ep_i: f64,
    pub sigma: f64,
}

impl Parameters {
    pub const DIM: usize = 3;

    pub fn new(ep_a: f64, ep_i: f64, sigma: f64) -> Self {
        Self { ep_a, ep_i, sigma }
    }

    /// Map a sampler position `(ep_a, ep_i, logit(sigma))` back to the
    /// parameters.
    pub fn from_unconstrained(position: &[f64]) -> Self {
        let sigma = (-softplus(-position[2])).exp();
        Self::new(position[0], position[1], sigma)
    }

    pub fn to_unconstrained(&self) -> [f64; 3] {
        [self.ep_a, self.ep_i, self.sigma.ln() - (-self.sigma).ln_1p()]
    }

    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::EpA => self.ep_a,
            Parameter::EpI => self.ep_i,
            Parameter::Sigma => self.sigma,
        }
    }
}

/// Names of the model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    EpA,
    EpI,
    Sigma,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [Parameter::EpA, Parameter::EpI, Parameter::Sigma];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::EpA => "ep_a",
            Parameter::EpI => "ep_i",
            Parameter::Sigma => "sigma",
        }
    }
}

/// Log posterior density of the fold-change model for fixed data.
///
/// Evaluation is pure, so a posterior can be shared between threads.
#[derive(Debug, Clone, Copy)]
pub struct FoldChangePosterior<'data> {
    data: &'data FoldChangeData,
    priors: Priors,
}

impl<'data> FoldChangePosterior<'data> {
    pub fn new(data: &'data FoldChangeData, priors: Priors) -> Self {
        Self { data, priors }
    }

    pub fn data(&self) -> &'data FoldChangeData {
        self.data
    }

    pub fn priors(&self) -> &Priors {
        &self.priors
    }

    pub fn log_prior(&self, params: &Parameters) -> f64 {
        self.priors.ep_a.logp(params.ep_a)
            + self.priors.ep_i.logp(params.ep_i)
            + self.priors.sigma.logp(params.sigma)
    }

    pub fn log_likelihood(&self, params: &Parameters) -> f64 {
        let mwc = MwcModel::new(*self.data.constants(), params.ep_a, params.ep_i);
        let sum_sq: f64 = izip!(self.data.concentrations(), self.data.fold_changes())
            .map(|(&c, &fc)| {
                let resid = fc - mwc.fold_change(c);
                resid * resid
            })
            .sum();
        let n = self.data.len() as f64;
        -n * (LN_SQRT_2PI + params.sigma.ln()) - 0.5 * sum_sq / (params.sigma * params.sigma)
    }

    /// Unnormalized log posterior density.
    ///
    /// Returns `-inf` instead of NaN whenever the density is not finite, in
    /// particular for `sigma <= 0` and `sigma >= 1`.
    pub fn log_density(&self, params: &Parameters) -> f64 {
        if !(params.sigma > 0.) {
            return f64::NEG_INFINITY;
        }
        let logp = self.log_prior(params) + self.log_likelihood(params);
        if logp.is_finite() {
            logp
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Log posterior density and its gradient with respect to
    /// `(ep_a, ep_i, sigma)`.
    ///
    /// The gradient is only meaningful if the returned density is finite.
    pub fn log_density_with_gradient(&self, params: &Parameters, grad: &mut [f64; 3]) -> f64 {
        let Parameters { ep_a, ep_i, sigma } = *params;
        if !(sigma > 0.) {
            *grad = [0.; 3];
            return f64::NEG_INFINITY;
        }

        let mwc = MwcModel::new(*self.data.constants(), ep_a, ep_i);
        let inv_var = (sigma * sigma).recip();

        let mut d_ep_a = self.priors.ep_a.dlogp(ep_a);
        let mut d_ep_i = self.priors.ep_i.dlogp(ep_i);
        let mut sum_sq = 0.;
        for (&c, &fc) in izip!(self.data.concentrations(), self.data.fold_changes()) {
            let (expected, d_fc_a, d_fc_i) = mwc.fold_change_with_gradient(c);
            let resid = fc - expected;
            sum_sq += resid * resid;
            d_ep_a += resid * inv_var * d_fc_a;
            d_ep_i += resid * inv_var * d_fc_i;
        }

        let n = self.data.len() as f64;
        let logp = self.log_prior(params) - n * (LN_SQRT_2PI + sigma.ln()) - 0.5 * sum_sq * inv_var;
        let d_sigma = self.priors.sigma.dlogp(sigma) - n / sigma + sum_sq * inv_var / sigma;

        *grad = [d_ep_a, d_ep_i, d_sigma];
        if logp.is_finite() {
            logp
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Error, Debug)]
pub enum FoldChangeLogpError {
    #[error("log density or gradient is not finite at {0:?}")]
    NonFinite([f64; 3]),
    #[error("expected a position of length 3, got {0}")]
    BadDimension(usize),
    #[error("the fold-change posterior has no normalizing transformation")]
    NoTransformation,
}

impl LogpError for FoldChangeLogpError {
    fn is_recoverable(&self) -> bool {
        matches!(self, FoldChangeLogpError::NonFinite(_))
    }
}

/// The posterior on `(ep_a, ep_i, u)` with `sigma = 1 / (1 + e^-u)`.
///
/// Includes the log Jacobian `ln sigma + ln(1 - sigma)` of the transformation.
#[derive(Debug, Clone, Copy)]
pub struct UnconstrainedPosterior<'data> {
    posterior: FoldChangePosterior<'data>,
}

impl<'data> UnconstrainedPosterior<'data> {
    pub fn new(posterior: FoldChangePosterior<'data>) -> Self {
        Self { posterior }
    }

    pub fn posterior(&self) -> &FoldChangePosterior<'data> {
        &self.posterior
    }
}

impl CpuLogpFunc for UnconstrainedPosterior<'_> {
    type LogpError = FoldChangeLogpError;
    type TransformParams = ();

    fn dim(&self) -> usize {
        Parameters::DIM
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError> {
        let &[ep_a, ep_i, u] = position else {
            return Err(FoldChangeLogpError::BadDimension(position.len()));
        };
        if gradient.len() != Parameters::DIM {
            return Err(FoldChangeLogpError::BadDimension(gradient.len()));
        }

        let log_sigma = -softplus(-u);
        let log_1m_sigma = -softplus(u);
        let sigma = log_sigma.exp();

        let mut grad = [0f64; 3];
        let logp = self
            .posterior
            .log_density_with_gradient(&Parameters::new(ep_a, ep_i, sigma), &mut grad);
        let logp = logp + log_sigma + log_1m_sigma;
        let d_u = grad[2] * sigma * log_1m_sigma.exp() + 1. - 2. * sigma;

        let grad = [grad[0], grad[1], d_u];
        if !logp.is_finite() | grad.iter().any(|g| !g.is_finite()) {
            return Err(FoldChangeLogpError::NonFinite([ep_a, ep_i, u]));
        }
        gradient.copy_from_slice(&grad);
        Ok(logp)
    }

    // Only the transforming adaptation of nuts-rs calls the methods below.
    // The diagonal sampler used by `fit` never does.

    fn inv_transform_normalize(
        &mut self,
        _params: &Self::TransformParams,
        _untransformed_position: &[f64],
        _untransformed_gradient: &[f64],
        _transformed_position: &mut [f64],
        _transformed_gradient: &mut [f64],
    ) -> Result<f64, Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }

    fn init_from_untransformed_position(
        &mut self,
        _params: &Self::TransformParams,
        _untransformed_position: &[f64],
        _untransformed_gradient: &mut [f64],
        _transformed_position: &mut [f64],
        _transformed_gradient: &mut [f64],
    ) -> Result<(f64, f64), Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }

    fn init_from_transformed_position(
        &mut self,
        _params: &Self::TransformParams,
        _untransformed_position: &mut [f64],
        _untransformed_gradient: &mut [f64],
        _transformed_position: &[f64],
        _transformed_gradient: &mut [f64],
    ) -> Result<(f64, f64), Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }

    fn update_transformation<'b, R: rand::Rng + ?Sized>(
        &'b mut self,
        _rng: &mut R,
        _untransformed_positions: impl Iterator<Item = &'b [f64]>,
        _untransformed_gradients: impl Iterator<Item = &'b [f64]>,
        _untransformed_logp: impl Iterator<Item = &'b f64>,
        _params: &'b mut Self::TransformParams,
    ) -> Result<(), Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }

    fn new_transformation<R: rand::Rng + ?Sized>(
        &mut self,
        _rng: &mut R,
        _untransformed_position: &[f64],
        _untransformed_gradient: &[f64],
        _chain: u64,
    ) -> Result<Self::TransformParams, Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }

    fn transformation_id(&self, _params: &Self::TransformParams) -> Result<i64, Self::LogpError> {
        Err(FoldChangeLogpError::NoTransformation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ExperimentConstants;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn data() -> FoldChangeData {
        let constants = ExperimentConstants {
            repressors: 100.,
            nonspecific_sites: 4.6e6,
            ep_ai: -8.,
            ep_r: -12.,
            n_sites: 2,
        };
        FoldChangeData::new(
            constants,
            vec![0., 1e-6, 1e-5, 5e-5, 1e-4, 1e-3],
            vec![0.97, 0.91, 0.62, 0.41, 0.35, 0.33],
        )
        .unwrap()
    }

    #[test]
    fn density_is_prior_plus_likelihood() {
        let data = data();
        let posterior = FoldChangePosterior::new(&data, Priors::default());
        let params = Parameters::new(-14., -9.7, 0.05);

        let mwc = MwcModel::new(*data.constants(), -14., -9.7);
        let expected_likelihood: f64 = data
            .observations()
            .map(|obs| {
                let z = (obs.fold_change - mwc.fold_change(obs.concentration)) / 0.05;
                -0.5 * z * z - 0.05f64.ln() - LN_SQRT_2PI
            })
            .sum();
        let expected_prior = Priors::default().ep_a.logp(-14.)
            + Priors::default().ep_i.logp(-9.7)
            + Priors::default().sigma.logp(0.05);

        assert_relative_eq!(
            posterior.log_density(&params),
            expected_prior + expected_likelihood,
            max_relative = 1e-12
        );
    }

    #[test]
    fn invalid_sigma_is_rejected() {
        let data = data();
        let posterior = FoldChangePosterior::new(&data, Priors::default());
        for sigma in [0., -0.1, -1e300, 1., 2., f64::NAN, f64::INFINITY] {
            let logp = posterior.log_density(&Parameters::new(-14., -9.7, sigma));
            assert_eq!(logp, f64::NEG_INFINITY);

            let mut grad = [0.; 3];
            let logp =
                posterior.log_density_with_gradient(&Parameters::new(-14., -9.7, sigma), &mut grad);
            assert_eq!(logp, f64::NEG_INFINITY);
        }
    }

    #[test]
    fn overflowing_energies_are_rejected() {
        let data = data();
        let posterior = FoldChangePosterior::new(&data, Priors::default());
        let logp = posterior.log_density(&Parameters::new(f64::NEG_INFINITY, 1e308, 0.1));
        assert_eq!(logp, f64::NEG_INFINITY);
    }

    #[test]
    fn wider_prior_flattens_density() {
        let data = data();
        let wide = Priors {
            ep_a: crate::priors::NormalPrior::new(0., 20.),
            ep_i: crate::priors::NormalPrior::new(0., 20.),
            ..Priors::default()
        };
        let narrow = FoldChangePosterior::new(&data, Priors::default());
        let wide = FoldChangePosterior::new(&data, wide);

        let near = Parameters::new(-1., -1., 0.1);
        let far = Parameters::new(-15., -10., 0.1);
        let narrow_spread = narrow.log_prior(&near) - narrow.log_prior(&far);
        let wide_spread = wide.log_prior(&near) - wide.log_prior(&far);
        assert_relative_eq!(narrow_spread, 4. * wide_spread, max_relative = 1e-12);
        assert!(wide.log_prior(&near) < narrow.log_prior(&near));
        assert_eq!(narrow.log_likelihood(&far), wide.log_likelihood(&far));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let data = data();
        let posterior = FoldChangePosterior::new(&data, Priors::default());
        let params = Parameters::new(-13.6, -9.9, 0.08);
        let mut grad = [0.; 3];
        let logp = posterior.log_density_with_gradient(&params, &mut grad);
        assert_relative_eq!(logp, posterior.log_density(&params), max_relative = 1e-12);

        let h = 1e-6;
        for (i, &analytic) in grad.iter().enumerate() {
            let mut up = params;
            let mut down = params;
            match i {
                0 => {
                    up.ep_a += h;
                    down.ep_a -= h;
                }
                1 => {
                    up.ep_i += h;
                    down.ep_i -= h;
                }
                _ => {
                    up.sigma += h;
                    down.sigma -= h;
                }
            }
            let fd = (posterior.log_density(&up) - posterior.log_density(&down)) / (2. * h);
            assert_relative_eq!(analytic, fd, epsilon = 1e-4, max_relative = 1e-5);
        }
    }

    #[test]
    fn unconstrained_adds_jacobian() -> anyhow::Result<()> {
        let data = data();
        let posterior = FoldChangePosterior::new(&data, Priors::default());
        let mut density = UnconstrainedPosterior::new(posterior);

        let params = Parameters::new(-13.6, -9.9, 0.08);
        let position = params.to_unconstrained();
        assert_relative_eq!(
            Parameters::from_unconstrained(&position).sigma,
            0.08,
            max_relative = 1e-14
        );

        let mut grad = [0.; 3];
        let logp = density.logp(&position, &mut grad)?;
        let jacobian = 0.08f64.ln() + 0.92f64.ln();
        assert_relative_eq!(
            logp,
            posterior.log_density(&params) + jacobian,
            max_relative = 1e-12
        );

        let h = 1e-6;
        let mut scratch = [0.; 3];
        for i in 0..3 {
            let mut up = position;
            let mut down = position;
            up[i] += h;
            down[i] -= h;
            let fd = (density.logp(&up, &mut scratch)? - density.logp(&down, &mut scratch)?)
                / (2. * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-4, max_relative = 1e-5);
        }
        Ok(())
    }

    #[test]
    fn unconstrained_errors() {
        let data = data();
        let mut density = UnconstrainedPosterior::new(FoldChangePosterior::new(
            &data,
            Priors::default(),
        ));
        let mut grad = [0.; 3];

        let err = density.logp(&[-14., -9.7, -1000.], &mut grad).unwrap_err();
        assert!(err.is_recoverable());

        let err = density.logp(&[-14., -9.7], &mut grad).unwrap_err();
        assert!(!err.is_recoverable());

        let err = density.transformation_id(&()).unwrap_err();
        assert!(!err.is_recoverable());
    }
}
