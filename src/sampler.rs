//! Independent NUTS chains of nuts-rs, run on a rayon pool.

use anyhow::{Context, Result};
use nuts_rs::{Chain, CpuLogpFunc, CpuMath, DiagGradNutsSettings, Settings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::{iter::IntoParallelIterator, iter::ParallelIterator, ThreadPoolBuilder};

/// Initial points tried per chain before the chain gives up.
const INIT_ATTEMPTS: usize = 500;

/// A posterior the sampler can run chains on.
///
/// Every chain asks for its own density object, so the model itself only
/// needs to be shared between threads.
pub trait Model: Send + Sync {
    type Density<'model>: CpuLogpFunc
    where
        Self: 'model;

    fn density(&self) -> Result<Self::Density<'_>>;
    fn init_position<R: Rng + ?Sized>(&self, rng: &mut R, position: &mut [f64]) -> Result<()>;
}

/// Sampler statistics of one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStats {
    pub chain: u64,
    pub draw: u64,
    /// Log density of the draw in sampler coordinates.
    pub logp: f64,
    pub step_size: f64,
    /// Leapfrog steps of the trajectory.
    pub n_steps: u64,
    pub diverging: bool,
    pub tuning: bool,
}

/// Draws and sampler statistics of one chain, tuning draws included.
#[derive(Debug)]
pub struct ChainOutput {
    pub chain_id: u64,
    pub draws: Vec<Box<[f64]>>,
    pub stats: Vec<DrawStats>,
}

impl ChainOutput {
    pub fn num_divergences(&self) -> usize {
        self.stats
            .iter()
            .filter(|stat| !stat.tuning & stat.diverging)
            .count()
    }
}

/// The output of all chains, ordered by chain id.
#[derive(Debug)]
pub struct Trace {
    pub chains: Vec<ChainOutput>,
}

fn run_chain<M: Model>(
    model: &M,
    settings: &DiagGradNutsSettings,
    chain_id: u64,
) -> Result<ChainOutput> {
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    rng.set_stream(chain_id);

    let mut density = model.density().context("Failed to create model density")?;
    let math = CpuMath::new(model.density().context("Failed to create model density")?);
    let dim = density.dim();
    let mut sampler = settings.new_chain(chain_id, math, &mut rng);

    let mut initval = vec![0f64; dim];
    let mut error = None;
    for attempt in 0..INIT_ATTEMPTS {
        model
            .init_position(&mut rng, &mut initval)
            .context("Failed to generate a new initial position")?;
        if let Err(err) = sampler.set_position(&initval) {
            log::debug!(
                "chain {}: initial point {} rejected: {}",
                chain_id,
                attempt,
                err
            );
            error = Some(err);
            continue;
        }
        error = None;
        break;
    }

    if let Some(error) = error {
        return Err(error.context("All initialization points failed"));
    }

    log::info!("chain {} started", chain_id);
    let total = settings.num_tune + settings.num_draws;
    let mut draws = Vec::with_capacity(total as usize);
    let mut stats = Vec::with_capacity(total as usize);
    let mut grad = vec![0f64; dim];
    for _ in 0..total {
        let (draw, info) = sampler
            .draw()
            .with_context(|| format!("Sampling failed in chain {}", chain_id))?;
        let logp = density
            .logp(&draw, &mut grad)
            .with_context(|| format!("Draw {} of chain {} has no density", info.draw, chain_id))?;
        stats.push(DrawStats {
            chain: info.chain,
            draw: info.draw,
            logp,
            step_size: info.step_size,
            n_steps: info.num_steps,
            diverging: info.diverging,
            tuning: info.draw < settings.num_tune,
        });
        draws.push(draw);
    }

    let output = ChainOutput {
        chain_id,
        draws,
        stats,
    };
    let divergences = output.num_divergences();
    if divergences > 0 {
        log::warn!(
            "chain {} finished with {} divergences after tuning",
            chain_id,
            divergences
        );
    } else {
        log::info!("chain {} finished", chain_id);
    }
    Ok(output)
}

/// Run `settings.num_chains` chains on a rayon pool with `num_cores`
/// threads. `num_cores == 0` lets rayon pick the number of threads.
///
/// Chain `i` uses stream `i` of a ChaCha8 generator seeded with
/// `settings.seed`, so the trace does not depend on scheduling.
pub fn sample_parallel<M: Model>(
    model: &M,
    settings: &DiagGradNutsSettings,
    num_cores: usize,
) -> Result<Trace> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_cores)
        .thread_name(|i| format!("mwc-worker-{}", i))
        .build()
        .context("Could not start thread pool")?;

    let mut chains = pool.install(|| {
        (0..settings.num_chains as u64)
            .into_par_iter()
            .map(|chain_id| run_chain(model, settings, chain_id))
            .collect::<Result<Vec<_>>>()
    })?;
    chains.sort_by_key(|chain| chain.chain_id);

    Ok(Trace { chains })
}
