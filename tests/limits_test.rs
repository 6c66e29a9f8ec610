//! Decoupled limits and start-independence: at beta = 0 both models
//! reduce to uncorrelated noise with known means, and at finite beta
//! cold and hot starts must equilibrate to the same plaquette.

use lattice::analysis::SeriesStats;
use lattice::observables::GaugeObservableSpec;
use lattice::run::{run_gauge, run_ising, Model, RunConfig, Start, UpdateAlgorithm};

fn small_spec() -> GaugeObservableSpec {
    GaugeObservableSpec {
        r_max: 2,
        t_max: 2,
        ape_alpha: 0.5,
        ape_levels: vec![2],
        wilson_smear_steps: 0,
    }
}

#[test]
fn free_spins_have_zero_mean_energy_and_magnetization() {
    let cfg = RunConfig {
        dims: [6, 6, 6],
        model: Model::Ising { beta: 0.0 },
        algorithm: UpdateAlgorithm::HeatBath,
        start: Start::Hot,
        therm_sweeps: 100,
        measurements: 2000,
        meas_interval: 1,
        seed: 11,
        reunit_interval: 100,
        checkpoint: None,
    };
    let out = run_ising(&cfg).unwrap();

    let m: Vec<f64> = out.samples.iter().map(|s| s.magnetization).collect();
    let e: Vec<f64> = out.samples.iter().map(|s| s.energy).collect();
    let (ms, es) = (SeriesStats::from_series(&m), SeriesStats::from_series(&e));

    // Independent coin flips: both means vanish within five sigma.
    assert!(
        ms.mean.abs() < 5.0 * ms.error.max(1e-3),
        "free-spin magnetization {:.4} ± {:.4} not compatible with 0",
        ms.mean,
        ms.error
    );
    assert!(
        es.mean.abs() < 5.0 * es.error.max(1e-3),
        "free-spin energy {:.4} ± {:.4} not compatible with 0",
        es.mean,
        es.error
    );
}

#[test]
fn free_links_have_zero_mean_plaquette() {
    let cfg = RunConfig {
        dims: [4, 4, 4],
        model: Model::Gauge {
            beta: 0.0,
            observables: small_spec(),
        },
        algorithm: UpdateAlgorithm::HeatBath,
        start: Start::Hot,
        therm_sweeps: 20,
        measurements: 400,
        meas_interval: 1,
        seed: 13,
        reunit_interval: 50,
        checkpoint: None,
    };
    let out = run_gauge(&cfg).unwrap();

    let p: Vec<f64> = out.samples.iter().map(|s| s.plaquette).collect();
    let ps = SeriesStats::from_series(&p);
    assert!(
        ps.mean.abs() < 5.0 * ps.error.max(1e-3),
        "Haar-random plaquette {:.4} ± {:.4} not compatible with 0",
        ps.mean,
        ps.error
    );
}

#[test]
fn cold_and_hot_starts_agree_after_thermalization() {
    let base = RunConfig {
        dims: [6, 6, 6],
        model: Model::Gauge {
            beta: 3.5,
            observables: small_spec(),
        },
        algorithm: UpdateAlgorithm::HeatBath,
        start: Start::Cold,
        therm_sweeps: 300,
        measurements: 300,
        meas_interval: 1,
        seed: 17,
        reunit_interval: 50,
        checkpoint: None,
    };
    let cold = run_gauge(&base).unwrap();

    let mut hot_cfg = base.clone();
    hot_cfg.start = Start::Hot;
    hot_cfg.seed = 19;
    let hot = run_gauge(&hot_cfg).unwrap();

    let pc: Vec<f64> = cold.samples.iter().map(|s| s.plaquette).collect();
    let ph: Vec<f64> = hot.samples.iter().map(|s| s.plaquette).collect();
    let (sc, sh) = (SeriesStats::from_series(&pc), SeriesStats::from_series(&ph));

    let sigma = (sc.error.powi(2) + sh.error.powi(2)).sqrt().max(1e-4);
    assert!(
        (sc.mean - sh.mean).abs() < 6.0 * sigma,
        "cold start {:.4} and hot start {:.4} disagree beyond 6 sigma ({sigma:.4})",
        sc.mean,
        sh.mean
    );
}
