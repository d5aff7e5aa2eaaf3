//! Prior distributions over the model parameters.

use serde::{Deserialize, Serialize};

/// `ln(sqrt(2 pi))`
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Normal prior for an unbounded parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalPrior {
    pub mu: f64,
    pub sigma: f64,
}

impl NormalPrior {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    pub fn logp(&self, x: f64) -> f64 {
        let z = (x - self.mu) / self.sigma;
        -0.5 * z * z - self.sigma.ln() - LN_SQRT_2PI
    }

    pub fn dlogp(&self, x: f64) -> f64 {
        -(x - self.mu) / (self.sigma * self.sigma)
    }
}

/// Beta prior on the unit interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPrior {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Log density, `-inf` outside of `(0, 1)`.
    pub fn logp(&self, x: f64) -> f64 {
        if !((x > 0.) & (x < 1.)) {
            return f64::NEG_INFINITY;
        }
        (self.alpha - 1.) * x.ln() + (self.beta - 1.) * (-x).ln_1p()
            - ln_beta(self.alpha, self.beta)
    }

    pub fn dlogp(&self, x: f64) -> f64 {
        (self.alpha - 1.) / x - (self.beta - 1.) / (1. - x)
    }
}

/// Priors of the fold-change model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Priors {
    pub ep_a: NormalPrior,
    pub ep_i: NormalPrior,
    pub sigma: BetaPrior,
}

impl Default for Priors {
    fn default() -> Self {
        Self {
            ep_a: NormalPrior::new(0., 10.),
            ep_i: NormalPrior::new(0., 10.),
            sigma: BetaPrior::new(0.5, 0.5),
        }
    }
}

/// Lanczos approximation (g = 7, n = 9)
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // reflection
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1. - x);
    }

    let x = x - 1.;
    let t = x + 7.5;
    let series = COEFFICIENTS[1..]
        .iter()
        .enumerate()
        .fold(COEFFICIENTS[0], |acc, (i, &coef)| acc + coef / (x + i as f64 + 1.));
    LN_SQRT_2PI + (x + 0.5) * t.ln() - t + series.ln()
}

pub(crate) fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}
