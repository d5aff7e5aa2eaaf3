//! Thermodynamic model of allosteric induction.
//!
//! A repressor switches between an active and an inactive conformation
//! (Monod-Wyman-Changeux). Inducer binding shifts that equilibrium, and the
//! active fraction sets how strongly the promoter is repressed. Energies are
//! in units of kBT, concentrations in the same units as the dissociation
//! constants `exp(ep_a)` and `exp(ep_i)`.

use crate::{
    data::ExperimentConstants,
    math::{logistic, softplus},
};

/// Probability that the repressor is in its active state at inducer
/// concentration `c`.
///
/// This is `(1 + c e^-ep_a)^n / ((1 + c e^-ep_a)^n + e^-ep_ai (1 + c e^-ep_i)^n)`,
/// evaluated in logistic form so that large concentrations do not overflow
/// the power terms. Without inducer the result is `1 / (1 + e^-ep_ai)` for
/// any finite `ep_a` and `ep_i`.
#[inline]
pub fn activation_probability(c: f64, ep_a: f64, ep_i: f64, ep_ai: f64, n_sites: u32) -> f64 {
    let n = n_sites as f64;
    let ln_c = c.ln();
    let log_active = softplus(ln_c - ep_a);
    let log_inactive = softplus(ln_c - ep_i);
    1. / (1. + (-ep_ai + n * (log_inactive - log_active)).exp())
}

/// Inverse fold-change, `1 + pact (R / Nns) e^-ep_r`.
#[inline]
pub fn repression(pact: f64, repressors: f64, nonspecific_sites: f64, ep_r: f64) -> f64 {
    1. + pact * repressor_weight(repressors, nonspecific_sites, ep_r)
}

/// Expected fold-change in gene expression at inducer concentration `c`.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn fold_change(
    repressors: f64,
    nonspecific_sites: f64,
    ep_r: f64,
    c: f64,
    ep_a: f64,
    ep_i: f64,
    ep_ai: f64,
    n_sites: u32,
) -> f64 {
    let pact = activation_probability(c, ep_a, ep_i, ep_ai, n_sites);
    repression(pact, repressors, nonspecific_sites, ep_r).recip()
}

/// Fold-change together with its partial derivatives with respect to
/// `ep_a` and `ep_i`, returned as `(fc, dfc/dep_a, dfc/dep_i)`.
#[allow(clippy::too_many_arguments)]
pub fn fold_change_with_gradient(
    repressors: f64,
    nonspecific_sites: f64,
    ep_r: f64,
    c: f64,
    ep_a: f64,
    ep_i: f64,
    ep_ai: f64,
    n_sites: u32,
) -> (f64, f64, f64) {
    let n = n_sites as f64;
    let pact = activation_probability(c, ep_a, ep_i, ep_ai, n_sites);
    let weight = repressor_weight(repressors, nonspecific_sites, ep_r);
    let fc = (1. + pact * weight).recip();

    // d fc / d z where pact = 1 / (1 + e^z)
    let dfc_dz = weight * fc * fc * pact * (1. - pact);
    // x / (1 + x) with x = c e^-ep
    let ln_c = c.ln();
    let frac_a = logistic(ln_c - ep_a);
    let frac_i = logistic(ln_c - ep_i);

    (fc, dfc_dz * n * frac_a, -dfc_dz * n * frac_i)
}

#[inline]
fn repressor_weight(repressors: f64, nonspecific_sites: f64, ep_r: f64) -> f64 {
    repressors / nonspecific_sites * (-ep_r).exp()
}

/// The thermodynamic model for one strain with a fixed pair of inducer
/// binding energies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MwcModel {
    pub constants: ExperimentConstants,
    pub ep_a: f64,
    pub ep_i: f64,
}

impl MwcModel {
    pub fn new(constants: ExperimentConstants, ep_a: f64, ep_i: f64) -> Self {
        Self {
            constants,
            ep_a,
            ep_i,
        }
    }

    pub fn pact(&self, c: f64) -> f64 {
        activation_probability(
            c,
            self.ep_a,
            self.ep_i,
            self.constants.ep_ai,
            self.constants.n_sites,
        )
    }

    pub fn fold_change(&self, c: f64) -> f64 {
        let ExperimentConstants {
            repressors,
            nonspecific_sites,
            ep_ai,
            ep_r,
            n_sites,
        } = self.constants;
        fold_change(
            repressors,
            nonspecific_sites,
            ep_r,
            c,
            self.ep_a,
            self.ep_i,
            ep_ai,
            n_sites,
        )
    }

    pub fn fold_change_with_gradient(&self, c: f64) -> (f64, f64, f64) {
        let ExperimentConstants {
            repressors,
            nonspecific_sites,
            ep_ai,
            ep_r,
            n_sites,
        } = self.constants;
        fold_change_with_gradient(
            repressors,
            nonspecific_sites,
            ep_r,
            c,
            self.ep_a,
            self.ep_i,
            ep_ai,
            n_sites,
        )
    }
}
