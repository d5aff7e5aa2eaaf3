//! Measurements and the fixed constants of one induction experiment.

use std::fs;
use std::path::Path;

use itertools::izip;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in the input data of a fit.
///
/// All of these are detected when the data is constructed, before any
/// sampling starts.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DataError {
    #[error("expected {declared} observations, got {concentrations} concentrations and {fold_changes} fold-changes")]
    LengthMismatch {
        declared: usize,
        concentrations: usize,
        fold_changes: usize,
    },
    #[error("no observations")]
    Empty,
    #[error("n_sites must be at least 1")]
    NoBindingSites,
    #[error("number of nonspecific sites must be positive, got {0}")]
    NonspecificSites(f64),
    #[error("repressor copy number must be positive, got {0}")]
    Repressors(f64),
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("concentration {value} at index {index} is negative")]
    NegativeConcentration { index: usize, value: f64 },
    #[error("noise scale must be positive and finite, got {0}")]
    NoiseScale(f64),
    #[error("could not read input file")]
    Io(#[from] std::io::Error),
    #[error("could not parse input")]
    Json(#[from] serde_json::Error),
}

/// Constants shared by every observation of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConstants {
    /// Repressor copy number per cell
    #[serde(rename = "R")]
    pub repressors: f64,
    /// Nonspecific binding sites competing for the repressor
    #[serde(rename = "Nns")]
    pub nonspecific_sites: f64,
    /// Energy difference between the inactive and the active state
    pub ep_ai: f64,
    /// Repressor-operator binding energy
    pub ep_r: f64,
    /// Inducer binding sites per repressor
    pub n_sites: u32,
}

impl ExperimentConstants {
    pub fn validate(&self) -> Result<(), DataError> {
        for (name, value) in [
            ("R", self.repressors),
            ("Nns", self.nonspecific_sites),
            ("ep_ai", self.ep_ai),
            ("ep_r", self.ep_r),
        ] {
            if !value.is_finite() {
                return Err(DataError::NonFinite { name, value });
            }
        }
        if self.n_sites < 1 {
            return Err(DataError::NoBindingSites);
        }
        if self.nonspecific_sites <= 0. {
            return Err(DataError::NonspecificSites(self.nonspecific_sites));
        }
        if self.repressors <= 0. {
            return Err(DataError::Repressors(self.repressors));
        }
        Ok(())
    }
}

/// A single fold-change measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub concentration: f64,
    pub fold_change: f64,
}

/// Validated measurements of one experiment.
///
/// The data is immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldChangeData {
    constants: ExperimentConstants,
    concentrations: Box<[f64]>,
    fold_changes: Box<[f64]>,
}

impl FoldChangeData {
    pub fn new(
        constants: ExperimentConstants,
        concentrations: Vec<f64>,
        fold_changes: Vec<f64>,
    ) -> Result<Self, DataError> {
        if concentrations.len() != fold_changes.len() {
            return Err(DataError::LengthMismatch {
                declared: concentrations.len(),
                concentrations: concentrations.len(),
                fold_changes: fold_changes.len(),
            });
        }
        if concentrations.is_empty() {
            return Err(DataError::Empty);
        }
        constants.validate()?;

        for (index, (&c, &fc)) in concentrations.iter().zip(fold_changes.iter()).enumerate() {
            if !c.is_finite() {
                return Err(DataError::NonFinite {
                    name: "c",
                    value: c,
                });
            }
            if c < 0. {
                return Err(DataError::NegativeConcentration { index, value: c });
            }
            if !fc.is_finite() {
                return Err(DataError::NonFinite {
                    name: "fc",
                    value: fc,
                });
            }
        }

        Ok(Self {
            constants,
            concentrations: concentrations.into(),
            fold_changes: fold_changes.into(),
        })
    }

    pub fn from_observations(
        constants: ExperimentConstants,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<Self, DataError> {
        let (concentrations, fold_changes) = observations
            .into_iter()
            .map(|obs| (obs.concentration, obs.fold_change))
            .unzip();
        Self::new(constants, concentrations, fold_changes)
    }

    pub fn constants(&self) -> &ExperimentConstants {
        &self.constants
    }

    pub fn concentrations(&self) -> &[f64] {
        &self.concentrations
    }

    pub fn fold_changes(&self) -> &[f64] {
        &self.fold_changes
    }

    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        izip!(self.concentrations.iter(), self.fold_changes.iter()).map(|(&c, &fc)| {
            Observation {
                concentration: c,
                fold_change: fc,
            }
        })
    }

    pub fn len(&self) -> usize {
        self.concentrations.len()
    }

    /// Always false for validated data.
    pub fn is_empty(&self) -> bool {
        self.concentrations.is_empty()
    }
}

/// The input of a fit in its serialized form.
///
/// ```json
/// {"N": 3, "c": [0, 1e-5, 1e-4], "fc": [0.02, 0.3, 0.9],
///  "R": 260, "Nns": 4.6e6, "ep_ai": 4.5, "ep_r": -13.9, "n_sites": 2}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitInput {
    #[serde(rename = "N")]
    pub num_observations: usize,
    #[serde(rename = "c")]
    pub concentrations: Vec<f64>,
    #[serde(rename = "fc")]
    pub fold_changes: Vec<f64>,
    #[serde(flatten)]
    pub constants: ExperimentConstants,
}

impl FitInput {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let input = Self::from_json_str(&contents)?;
        log::info!(
            "Loaded {} observations from {}",
            input.num_observations,
            path.display()
        );
        Ok(input)
    }

    pub fn into_data(self) -> Result<FoldChangeData, DataError> {
        self.try_into()
    }
}

impl TryFrom<FitInput> for FoldChangeData {
    type Error = DataError;

    fn try_from(input: FitInput) -> Result<Self, Self::Error> {
        let FitInput {
            num_observations,
            concentrations,
            fold_changes,
            constants,
        } = input;
        if (num_observations != concentrations.len()) | (num_observations != fold_changes.len()) {
            return Err(DataError::LengthMismatch {
                declared: num_observations,
                concentrations: concentrations.len(),
                fold_changes: fold_changes.len(),
            });
        }
        FoldChangeData::new(constants, concentrations, fold_changes)
    }
}

impl From<&FoldChangeData> for FitInput {
    fn from(data: &FoldChangeData) -> Self {
        Self {
            num_observations: data.len(),
            concentrations: data.concentrations().to_vec(),
            fold_changes: data.fold_changes().to_vec(),
            constants: *data.constants(),
        }
    }
}
