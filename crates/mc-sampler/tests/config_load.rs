use std::fs;

use mc_core::McError;
use mc_sampler::{RngConfig, SamplerConfig};
use tempfile::tempdir;

#[test]
fn minimal_yaml_fills_defaults() {
    let config = SamplerConfig::from_yaml_str("n_cycles: 500\n").unwrap();
    assert_eq!(config.n_cycles, 500);
    assert_eq!(config.cycle_length, 1);
    assert_eq!(config.warmup_cycles, 0);
    assert_eq!(config.verbosity, 1);
    assert_eq!(config.rng, RngConfig::default());
    assert_eq!(config.rng.name, "std");
    config.validate().unwrap();
}

#[test]
fn full_yaml_round_trips_through_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.yaml");
    fs::write(
        &path,
        "n_cycles: 2000\ncycle_length: 16\nwarmup_cycles: 200\nverbosity: 3\nrng:\n  name: small\n  seed: 99\n",
    )
    .unwrap();
    let config = SamplerConfig::load(&path).unwrap();
    assert_eq!(
        config,
        SamplerConfig::new(2000, 16, 200)
            .with_rng("small", 99)
            .with_verbosity(3)
    );
    assert_eq!(config.total_cycles(), 2200);
    assert_eq!(config.rng.build().unwrap().name(), "small");
}

#[test]
fn zero_budgets_fail_validation() {
    let err = SamplerConfig::new(0, 1, 10).validate().unwrap_err();
    assert_eq!(err.info().code, "invalid-cycles");
    let err = SamplerConfig::new(10, 0, 0).validate().unwrap_err();
    assert_eq!(err.info().code, "invalid-cycle-length");
    assert!(matches!(err, McError::Configuration(_)));
}

#[test]
fn unreadable_or_malformed_files_are_reported_with_the_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");
    let err = SamplerConfig::load(&missing).unwrap_err();
    assert_eq!(err.info().code, "config-read");
    assert!(err.info().context["path"].ends_with("missing.yaml"));

    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "cycle_length: [1, 2\n").unwrap();
    let err = SamplerConfig::load(&broken).unwrap_err();
    assert_eq!(err.info().code, "config-parse");

    let err = SamplerConfig::from_yaml_str("cycle_length: 4\n").unwrap_err();
    assert!(matches!(err, McError::Serde(_)));
}

#[test]
fn unknown_generator_is_rejected_when_built() {
    let config = SamplerConfig::from_yaml_str("n_cycles: 1\nrng:\n  name: mt19937\n").unwrap();
    let err = config.rng.build().unwrap_err();
    assert_eq!(err.info().code, "unknown-generator");
}
