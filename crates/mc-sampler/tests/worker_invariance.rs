mod common;

use std::collections::BTreeSet;

use common::{FixedRatio, InvocationCounter, Walker};
use mc_core::{Communicator, Complex64, McError, SingleProcess};
use mc_sampler::{
    run_on_threads, Measure, RunReport, Sampler, SamplerConfig, StopCondition, WeightedMean,
};

fn base_config(n_cycles: u64) -> SamplerConfig {
    SamplerConfig::new(n_cycles, 3, 4)
        .with_rng("std", 2024)
        .with_verbosity(0)
}

fn run_worker(
    config: SamplerConfig,
    ratio: f64,
    comm: &dyn Communicator,
) -> Result<(RunReport<f64>, Option<u64>), McError> {
    let config = SamplerConfig {
        rng: config.rng.for_worker(comm.rank()),
        ..config
    };
    let mut sampler = Sampler::new(config, Walker::default())?;
    sampler.add_move(FixedRatio::new(ratio), "fixed", 1.0)?;
    let counter = sampler.add_measure(InvocationCounter::default(), "counter")?;
    sampler.start(1.0, StopCondition::Never)?;
    let report = sampler.collect_results(comm)?;
    let total_calls = sampler.measure(counter)?.total_calls;
    Ok((report, total_calls))
}

#[test]
fn totals_do_not_depend_on_worker_count() {
    let (single, single_calls) = run_worker(base_config(120), 1.0, &SingleProcess).unwrap();

    let reports = run_on_threads(4, |comm| run_worker(base_config(30), 1.0, &comm)).unwrap();
    assert_eq!(reports.len(), 4);
    for (report, calls) in &reports {
        assert_eq!(report.workers, 4);
        assert_eq!(report.total_measures, single.total_measures);
        assert_eq!(report.average_sign, single.average_sign);
        assert_eq!(*calls, single_calls);
    }
    assert_eq!(single.total_measures, 120);
    assert_eq!(single.average_sign, 1.0);
}

#[test]
fn every_worker_receives_the_same_reduction() {
    let reports = run_on_threads(3, |comm| run_worker(base_config(50), 0.5, &comm)).unwrap();
    let first = &reports[0].0;
    for (report, _) in &reports {
        assert_eq!(report.moves, first.moves);
        assert_eq!(report.average_sign, first.average_sign);
    }
    assert_eq!(first.moves[0].attempted, 3 * 54 * 3);
    assert!(first.moves[0].accepted < first.moves[0].attempted);
}

#[test]
fn alternating_sign_averages_out_across_workers() {
    // Each worker measures an even number of cycles with a sign flipping every step.
    let config = SamplerConfig::new(10, 1, 0).with_rng("small", 5).with_verbosity(0);
    let reports = run_on_threads(2, |comm| run_worker(config.clone(), -1.0, &comm)).unwrap();
    for (report, _) in &reports {
        assert_eq!(report.total_measures, 20);
        assert_eq!(report.average_sign, 0.0);
    }
}

#[test]
fn worker_streams_are_distinct() {
    let rng = base_config(1).rng;
    let seeds: BTreeSet<u64> = (0..16).map(|rank| rng.for_worker(rank).seed).collect();
    assert_eq!(seeds.len(), 16);
    assert_eq!(rng.for_worker(3), rng.for_worker(3));
}

#[test]
fn weighted_mean_merges_partial_sums() {
    let values: Vec<(f64, f64)> = vec![
        (1.0, 1.0),
        (2.0, -1.0),
        (3.0, 1.0),
        (4.0, 1.0),
        (5.5, -1.0),
        (0.5, 1.0),
    ];

    let mut single = WeightedMean::<f64, f64, _>::new(|x: &f64| *x);
    for &(x, sign) in &values {
        single.accumulate(&x, sign).unwrap();
    }
    single.collect_results(&SingleProcess).unwrap();
    let expected = single.result().cloned().unwrap();
    assert_eq!(expected.samples, 6);
    assert_eq!(expected.sign_sum, 2.0);
    assert_eq!(expected.mean, (1.0 - 2.0 + 3.0 + 4.0 - 5.5 + 0.5) / 2.0);

    let merged = run_on_threads(3, |comm| {
        let mut mean = WeightedMean::<f64, f64, _>::new(|x: &f64| *x);
        for &(x, sign) in values.iter().skip(comm.rank()).step_by(3) {
            mean.accumulate(&x, sign)?;
        }
        mean.collect_results(&comm)?;
        Ok(mean.result().cloned())
    })
    .unwrap();
    for result in merged {
        assert_eq!(result, Some(expected.clone()));
    }
}

#[test]
fn weighted_mean_handles_complex_signs_and_rejects_nan() {
    let mut mean = WeightedMean::<f64, Complex64, _>::new(|x: &f64| *x);
    mean.accumulate(&2.0, Complex64::new(0.0, 1.0)).unwrap();
    mean.accumulate(&4.0, Complex64::new(0.0, 1.0)).unwrap();
    assert!(matches!(
        mean.accumulate(&f64::NAN, Complex64::new(1.0, 0.0)),
        Err(McError::Measure(_))
    ));
    assert_eq!(mean.samples(), 2);
    mean.collect_results(&SingleProcess).unwrap();
    let result = mean.result().unwrap();
    assert_eq!(result.sign_sum, Complex64::new(0.0, 2.0));
    assert_eq!(result.mean, Complex64::new(3.0, 0.0));
}

#[test]
fn weighted_mean_with_zero_sign_sum_reports_zero() {
    let mut mean = WeightedMean::<f64, f64, _>::new(|x: &f64| *x);
    mean.accumulate(&3.0, 1.0).unwrap();
    mean.accumulate(&3.0, -1.0).unwrap();
    mean.collect_results(&SingleProcess).unwrap();
    assert_eq!(mean.result().unwrap().mean, 0.0);
}

#[test]
fn panicking_worker_fails_the_run_instead_of_hanging() {
    let outcome = run_on_threads(3, |comm| {
        if comm.rank() == 1 {
            panic!("worker lost");
        }
        comm.sum_u64s(&[1])
    });
    let err = outcome.unwrap_err();
    assert!(matches!(err, McError::Reduction(_)));
    assert_eq!(err.info().code, "worker-panicked");
    assert_eq!(err.info().context["rank"], "1");
}

#[test]
fn worker_error_before_a_collective_releases_its_peers() {
    let outcome = run_on_threads(2, |comm| {
        if comm.rank() == 0 {
            return Err(McError::configuration("bad-setup", "worker could not start"));
        }
        run_worker(base_config(5), 1.0, &comm).map(|_| ())
    });
    assert_eq!(outcome.unwrap_err().info().code, "bad-setup");
}

#[test]
fn peers_see_an_aborted_collective() {
    let outcome = run_on_threads(2, |comm| {
        if comm.rank() == 1 {
            return Ok(None);
        }
        Ok(Some(comm.sum_u64s(&[1]).map_err(|err| err.info().code.clone())))
    })
    .unwrap();
    assert_eq!(outcome[0], Some(Err("worker-aborted".to_string())));
    assert_eq!(outcome[1], None);
}
