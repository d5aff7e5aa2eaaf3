//! Bayesian inference of MWC induction energies from fold-change data.
//!
//! The fold-change of a simple repression circuit is predicted by a
//! Monod-Wyman-Changeux model of an allosteric repressor ([`fold_change`]).
//! Given measurements at several inducer concentrations, [`fit`] samples the
//! posterior of the inducer dissociation energies `ep_a`, `ep_i` and the
//! noise scale `sigma` with the No-U-Turn sampler of [`nuts_rs`].
//!
//! ```no_run
//! use mwc_induction::{fit, DiagGradNutsSettings, FitInput, Parameter, Priors};
//!
//! let data = FitInput::from_json_file("induction.json")?.into_data()?;
//! let posterior = fit(&data, Priors::default(), &DiagGradNutsSettings::default())?;
//! let summary = posterior.summary();
//! println!("ep_a = {:.2}", summary.get(Parameter::EpA).mean);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub(crate) mod csv_storage;
pub(crate) mod data;
pub(crate) mod fit;
pub(crate) mod math;
pub(crate) mod model;
pub(crate) mod priors;
pub(crate) mod sampler;
pub(crate) mod summary;
pub(crate) mod synthetic;
pub(crate) mod thermo;

pub use csv_storage::{write_posterior, CsvConfig};
pub use data::{DataError, ExperimentConstants, FitInput, FoldChangeData, Observation};
pub use fit::{
    fit, fit_model, FoldChangeModel, InitPoint, Posterior, PosteriorChain, PosteriorSample,
};
pub use model::{
    FoldChangeLogpError, FoldChangePosterior, Parameter, Parameters, UnconstrainedPosterior,
};
pub use nuts_rs::{CpuLogpFunc, DiagGradNutsSettings, LogpError};
pub use priors::{BetaPrior, NormalPrior, Priors};
pub use sampler::{sample_parallel, ChainOutput, DrawStats, Model, Trace};
pub use summary::{quantile, split_r_hat, summarize, ParameterSummary, Summary};
pub use synthetic::{log_spaced, simulate};
pub use thermo::{
    activation_probability, fold_change, fold_change_with_gradient, repression, MwcModel,
};
