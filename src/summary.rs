//! Posterior summaries: moments, percentile intervals and split R-hat.

use serde::{Deserialize, Serialize};

use crate::model::Parameter;

/// Summary statistics of the draws of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub mean: f64,
    pub sd: f64,
    /// 5 % percentile
    pub q05: f64,
    /// 95 % percentile
    pub q95: f64,
    /// Split R-hat over all chains. NaN if it is undefined.
    pub r_hat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub ep_a: ParameterSummary,
    pub ep_i: ParameterSummary,
    pub sigma: ParameterSummary,
}

impl Summary {
    pub fn get(&self, parameter: Parameter) -> &ParameterSummary {
        match parameter {
            Parameter::EpA => &self.ep_a,
            Parameter::EpI => &self.ep_i,
            Parameter::Sigma => &self.sigma,
        }
    }
}

/// Summarize the draws of a parameter, one vector per chain.
pub fn summarize(chains: &[Vec<f64>]) -> ParameterSummary {
    let mut all: Vec<f64> = chains.iter().flatten().copied().collect();
    let (mean, variance) = mean_and_variance(&all);
    all.sort_by(f64::total_cmp);
    ParameterSummary {
        mean,
        sd: variance.sqrt(),
        q05: quantile(&all, 0.05),
        q95: quantile(&all, 0.95),
        r_hat: split_r_hat(chains),
    }
}

/// Sample mean and unbiased variance.
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sq = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>();
    (mean, sq / (n - 1.))
}

/// Quantile of sorted values with linear interpolation between order
/// statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0., 1.);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Potential scale reduction factor of Gelman et al., computed on chains
/// split in half.
///
/// All chains are truncated to the shortest one. Returns NaN with fewer than
/// two draws per half chain or without within-chain variance.
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let Some(len) = chains.iter().map(|chain| chain.len()).min() else {
        return f64::NAN;
    };
    let n = len / 2;
    if n < 2 {
        return f64::NAN;
    }

    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|chain| [&chain[..n], &chain[len - n..len]])
        .collect();
    let m = halves.len() as f64;
    let n = n as f64;

    let stats: Vec<(f64, f64)> = halves.iter().map(|half| mean_and_variance(half)).collect();
    let grand_mean = stats.iter().map(|(mean, _)| mean).sum::<f64>() / m;
    let between = n / (m - 1.)
        * stats
            .iter()
            .map(|(mean, _)| (mean - grand_mean) * (mean - grand_mean))
            .sum::<f64>();
    let within = stats.iter().map(|(_, var)| var).sum::<f64>() / m;
    if within == 0. {
        return f64::NAN;
    }

    let var_plus = (n - 1.) / n * within + between / n;
    (var_plus / within).sqrt()
}
