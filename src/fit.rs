//! Fit the fold-change model to data and collect the posterior draws.

use anyhow::{Context, Result};
use nuts_rs::DiagGradNutsSettings;
use rand::Rng;

use crate::{
    data::FoldChangeData,
    model::{FoldChangePosterior, Parameter, Parameters, UnconstrainedPosterior},
    priors::Priors,
    sampler::{sample_parallel, ChainOutput, DrawStats, Model},
    summary::{summarize, Summary},
};

/// Initial points of the chains, drawn uniformly from
/// `center ± jitter` in unconstrained coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitPoint {
    /// `(ep_a, ep_i, logit(sigma))`
    pub center: [f64; 3],
    pub jitter: f64,
}

impl InitPoint {
    /// Puts both energies at the log of the geometric mean of the positive
    /// concentrations and sigma at 0.5.
    pub fn from_data(data: &FoldChangeData) -> Self {
        let (sum, count) = data
            .concentrations()
            .iter()
            .filter(|&&c| c > 0.)
            .fold((0f64, 0usize), |(sum, count), c| (sum + c.ln(), count + 1));
        let energy = if count > 0 { sum / count as f64 } else { 0. };
        InitPoint {
            center: [energy, energy, 0.],
            jitter: 2.,
        }
    }
}

/// The fold-change model as seen by the sampler.
#[derive(Debug, Clone, Copy)]
pub struct FoldChangeModel<'data> {
    data: &'data FoldChangeData,
    priors: Priors,
    init: InitPoint,
}

impl<'data> FoldChangeModel<'data> {
    pub fn new(data: &'data FoldChangeData, priors: Priors) -> Self {
        Self {
            data,
            priors,
            init: InitPoint::from_data(data),
        }
    }

    pub fn with_init(self, init: InitPoint) -> Self {
        Self { init, ..self }
    }

    pub fn posterior(&self) -> FoldChangePosterior<'data> {
        FoldChangePosterior::new(self.data, self.priors)
    }
}

impl Model for FoldChangeModel<'_> {
    type Density<'model>
        = UnconstrainedPosterior<'model>
    where
        Self: 'model;

    fn density(&self) -> Result<Self::Density<'_>> {
        Ok(UnconstrainedPosterior::new(self.posterior()))
    }

    fn init_position<R: Rng + ?Sized>(&self, rng: &mut R, position: &mut [f64]) -> Result<()> {
        for (pos, center) in position.iter_mut().zip(self.init.center) {
            let jitter: f64 = rng.random();
            *pos = center + self.init.jitter * (2. * jitter - 1.);
        }
        Ok(())
    }
}

/// One draw of the sampler, on the scale of the model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorSample {
    pub chain: u64,
    pub draw: u64,
    pub params: Parameters,
    /// Log density of the sampler coordinates, including the log Jacobian
    /// of the sigma transformation.
    pub lp: f64,
    pub step_size: f64,
    pub n_steps: u64,
    pub diverging: bool,
}

impl PosteriorSample {
    fn new(position: &[f64], stats: &DrawStats) -> Self {
        PosteriorSample {
            chain: stats.chain,
            draw: stats.draw,
            params: Parameters::from_unconstrained(position),
            lp: stats.logp,
            step_size: stats.step_size,
            n_steps: stats.n_steps,
            diverging: stats.diverging,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorChain {
    pub chain_id: u64,
    /// Draws made while tuning the sampler.
    pub warmup: Vec<PosteriorSample>,
    pub samples: Vec<PosteriorSample>,
}

impl From<ChainOutput> for PosteriorChain {
    fn from(output: ChainOutput) -> Self {
        let (warmup, samples) = output
            .draws
            .iter()
            .zip(output.stats.iter())
            .map(|(position, stats)| (stats.tuning, PosteriorSample::new(position, stats)))
            .partition::<Vec<_>, _>(|(tuning, _)| *tuning);
        PosteriorChain {
            chain_id: output.chain_id,
            warmup: warmup.into_iter().map(|(_, sample)| sample).collect(),
            samples: samples.into_iter().map(|(_, sample)| sample).collect(),
        }
    }
}

/// Posterior draws of all chains.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    chains: Vec<PosteriorChain>,
}

impl Posterior {
    pub fn new(chains: Vec<PosteriorChain>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[PosteriorChain] {
        &self.chains
    }

    /// Post warm-up draws of all chains.
    pub fn samples(&self) -> impl Iterator<Item = &PosteriorSample> + '_ {
        self.chains.iter().flat_map(|chain| chain.samples.iter())
    }

    pub fn draws(&self, parameter: Parameter) -> Vec<f64> {
        self.samples()
            .map(|sample| sample.params.get(parameter))
            .collect()
    }

    pub fn chain_draws(&self, parameter: Parameter) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|chain| {
                chain
                    .samples
                    .iter()
                    .map(|sample| sample.params.get(parameter))
                    .collect()
            })
            .collect()
    }

    /// Number of divergent transitions after warm-up.
    pub fn divergences(&self) -> usize {
        self.samples().filter(|sample| sample.diverging).count()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            ep_a: summarize(&self.chain_draws(Parameter::EpA)),
            ep_i: summarize(&self.chain_draws(Parameter::EpI)),
            sigma: summarize(&self.chain_draws(Parameter::Sigma)),
        }
    }
}

/// Sample the posterior of `(ep_a, ep_i, sigma)` given `data`.
pub fn fit(
    data: &FoldChangeData,
    priors: Priors,
    settings: &DiagGradNutsSettings,
) -> Result<Posterior> {
    fit_model(&FoldChangeModel::new(data, priors), settings)
}

/// Like [`fit`], with control over the initial points.
pub fn fit_model(model: &FoldChangeModel<'_>, settings: &DiagGradNutsSettings) -> Result<Posterior> {
    log::info!(
        "fitting {} observations with {} chains ({} tuning, {} draws)",
        model.data.len(),
        settings.num_chains,
        settings.num_tune,
        settings.num_draws
    );
    let trace = sample_parallel(model, settings, 0).context("Sampling the posterior failed")?;
    let posterior = Posterior::new(trace.chains.into_iter().map(PosteriorChain::from).collect());

    let divergences = posterior.divergences();
    if divergences > 0 {
        log::warn!("{} divergent transitions after warm-up", divergences);
    }
    Ok(posterior)
}
