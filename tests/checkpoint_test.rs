//! Checkpoint round trips: an interrupted-and-resumed chain must
//! reproduce the uninterrupted chain sample for sample, and a resume
//! against the wrong geometry must be refused.

use lattice::observables::GaugeObservableSpec;
use lattice::run::{
    resume_gauge, resume_ising, run_gauge, run_ising, CheckpointPolicy, Model, RunConfig, Start,
    UpdateAlgorithm,
};
use lattice::Error;

use std::path::PathBuf;

fn ising_cfg(measurements: usize, checkpoint: Option<CheckpointPolicy>) -> RunConfig {
    RunConfig {
        dims: [4, 4, 4],
        model: Model::Ising { beta: 0.23 },
        algorithm: UpdateAlgorithm::HeatBath,
        start: Start::Hot,
        therm_sweeps: 50,
        measurements,
        meas_interval: 1,
        seed: 0x5EED,
        reunit_interval: 100,
        checkpoint,
    }
}

fn small_gauge_spec() -> GaugeObservableSpec {
    GaugeObservableSpec {
        r_max: 2,
        t_max: 2,
        ape_alpha: 0.5,
        ape_levels: vec![2],
        wilson_smear_steps: 0,
    }
}

fn gauge_cfg(measurements: usize, checkpoint: Option<CheckpointPolicy>) -> RunConfig {
    RunConfig {
        dims: [4, 4, 4],
        model: Model::Gauge {
            beta: 3.0,
            observables: small_gauge_spec(),
        },
        algorithm: UpdateAlgorithm::HeatBath,
        start: Start::Cold,
        therm_sweeps: 30,
        measurements,
        meas_interval: 1,
        seed: 0xFACADE,
        reunit_interval: 10,
        checkpoint,
    }
}

#[test]
fn ising_resume_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("ising.ckpt");

    // Reference: one uninterrupted chain of 40 measurements.
    let full = run_ising(&ising_cfg(40, None)).unwrap();

    // Interrupted: stop after 20 (checkpoint written at measurement 20),
    // then resume to 40 from the file.
    let policy = CheckpointPolicy {
        path: path.clone(),
        every: 20,
    };
    run_ising(&ising_cfg(20, Some(policy.clone()))).unwrap();
    let resumed = resume_ising(&ising_cfg(40, Some(policy)), &path).unwrap();

    assert_eq!(full.samples.len(), resumed.samples.len());
    for (a, b) in full.samples.iter().zip(&resumed.samples) {
        assert_eq!(a.magnetization, b.magnetization);
        assert_eq!(a.energy, b.energy);
    }
}

#[test]
fn gauge_resume_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("gauge.ckpt");

    let full = run_gauge(&gauge_cfg(20, None)).unwrap();

    let policy = CheckpointPolicy {
        path: path.clone(),
        every: 10,
    };
    run_gauge(&gauge_cfg(10, Some(policy.clone()))).unwrap();
    let resumed = resume_gauge(&gauge_cfg(20, Some(policy)), &path).unwrap();

    assert_eq!(full.samples.len(), resumed.samples.len());
    for (a, b) in full.samples.iter().zip(&resumed.samples) {
        assert_eq!(a.plaquette, b.plaquette);
        assert_eq!(a.wilson, b.wilson);
    }
}

#[test]
fn resume_refuses_mismatched_observable_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("gauge.ckpt");

    let policy = CheckpointPolicy {
        path: path.clone(),
        every: 10,
    };
    run_gauge(&gauge_cfg(10, Some(policy))).unwrap();

    // Same geometry, but the samples would change shape mid-series.
    let mut wrong = gauge_cfg(20, None);
    if let Model::Gauge { observables, .. } = &mut wrong.model {
        observables.r_max = 3;
    }
    match resume_gauge(&wrong, &path) {
        Err(Error::CheckpointMismatch(_)) => {}
        other => panic!("expected CheckpointMismatch, got {other:?}"),
    }
}

#[test]
fn resume_refuses_mismatched_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("ising.ckpt");

    let policy = CheckpointPolicy {
        path: path.clone(),
        every: 10,
    };
    run_ising(&ising_cfg(10, Some(policy))).unwrap();

    let mut wrong = ising_cfg(20, None);
    wrong.dims = [6, 6, 6];
    match resume_ising(&wrong, &path) {
        Err(Error::CheckpointMismatch(_)) => {}
        other => panic!("expected CheckpointMismatch, got {other:?}"),
    }
}
