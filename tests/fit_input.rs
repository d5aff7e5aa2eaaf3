use std::path::PathBuf;

use mwc_induction::{
    fit, write_posterior, CsvConfig, DataError, DiagGradNutsSettings, FitInput, FoldChangeData,
    Priors,
};
use pretty_assertions::assert_eq;

const INPUT: &str = r#"{
    "N": 6,
    "c": [0, 1e-6, 1e-5, 1e-4, 1e-3, 1e-2],
    "fc": [0.98, 0.95, 0.7, 0.35, 0.31, 0.3],
    "R": 100,
    "Nns": 4.6e6,
    "ep_ai": -8,
    "ep_r": -12,
    "n_sites": 2
}"#;

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mwc-induction-{}-{}", name, std::process::id()))
}

#[test]
fn load_from_file() -> anyhow::Result<()> {
    let dir = scratch_dir("input");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("input.json");
    std::fs::write(&path, INPUT)?;

    let data = FitInput::from_json_file(&path)?.into_data()?;
    assert_eq!(data.len(), 6);
    assert_eq!(data.constants().repressors, 100.);
    assert_eq!(data.constants().n_sites, 2);
    assert_eq!(data.fold_changes()[2], 0.7);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn invalid_inputs_are_rejected() {
    let mut input = FitInput::from_json_str(INPUT).unwrap();
    input.num_observations = 5;
    assert!(matches!(
        FoldChangeData::try_from(input),
        Err(DataError::LengthMismatch { declared: 5, .. })
    ));

    let mut input = FitInput::from_json_str(INPUT).unwrap();
    input.constants.repressors = 0.;
    assert!(matches!(input.into_data(), Err(DataError::Repressors(_))));

    let mut input = FitInput::from_json_str(INPUT).unwrap();
    input.concentrations[1] = -1e-6;
    assert!(matches!(
        input.into_data(),
        Err(DataError::NegativeConcentration { index: 1, .. })
    ));

    let missing = INPUT.replace("\"n_sites\": 2", "\"unused\": 2");
    assert!(matches!(
        FitInput::from_json_str(&missing),
        Err(DataError::Json(_))
    ));
}

#[test]
fn fit_and_write_csv() -> anyhow::Result<()> {
    let data = FitInput::from_json_str(INPUT)?.into_data()?;
    let settings = DiagGradNutsSettings {
        num_tune: 100,
        num_draws: 40,
        num_chains: 2,
        ..Default::default()
    };
    let posterior = fit(&data, Priors::default(), &settings)?;

    let dir = scratch_dir("csv");
    let paths = write_posterior(&CsvConfig::new(&dir).with_precision(4), &posterior)?;
    assert_eq!(paths.len(), 2);
    for path in &paths {
        let content = std::fs::read_to_string(path)?;
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("lp__,stepsize__,n_leapfrog__,divergent__,ep_a,ep_i,sigma")
        );
        assert_eq!(lines.count(), 40);
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
