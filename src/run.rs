//! Run driver: validated configuration, thermalization, measurement
//! cadence, and time-series collection.
//!
//! The model kind is a tagged variant fixed at configuration time; the
//! driver dispatches on it exactly once. All randomness flows from the
//! explicit `seed`, so a run is reproducible bit for bit, and the RNG
//! state travels with checkpoints so a resumed chain continues the
//! uninterrupted one exactly.

use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, GaugeCheckpoint, IsingCheckpoint};
use crate::error::{Error, Result};
use crate::gauge::GaugeField;
use crate::ising::SpinField;
use crate::lattice::Lattice;
use crate::observables::{
    measure_gauge, measure_ising, GaugeObservableSpec, GaugeSample, IsingSample,
};

/// How links/spins are updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateAlgorithm {
    /// Accept/reject with a near-identity (gauge) or single-flip (spin)
    /// proposal; `epsilon` is the initial gauge proposal spread.
    Metropolis { epsilon: f64 },
    /// Exact conditional redraw; every update is accepted.
    HeatBath,
    /// Rejection-free cluster flip (spin models only); one update grows
    /// and flips a single cluster.
    Wolff,
}

/// Initial configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Start {
    /// Ordered: identity links / all spins up.
    Cold,
    /// Disordered: Haar-random links / random spins.
    Hot,
}

/// Which theory the chain samples, fixed at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    Gauge {
        beta: f64,
        observables: GaugeObservableSpec,
    },
    Ising {
        beta: f64,
    },
}

/// Periodic checkpointing of the chain (optional; atomic on disk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    pub path: PathBuf,
    /// Measurements between checkpoints.
    pub every: usize,
}

/// Run-time configuration (single source of truth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dims: [usize; 3],
    pub model: Model,
    pub algorithm: UpdateAlgorithm,
    pub start: Start,
    pub therm_sweeps: usize,
    /// Number of measurements to record.
    pub measurements: usize,
    /// Sweeps between consecutive measurements.
    pub meas_interval: usize,
    pub seed: u64,
    /// Measurements between reunitarization passes (gauge only).
    pub reunit_interval: usize,
    pub checkpoint: Option<CheckpointPolicy>,
}

impl RunConfig {
    /// Reject bad parameters before any simulation work begins.
    pub fn validate(&self) -> Result<()> {
        Lattice::new(self.dims)?;
        if self.measurements == 0 {
            return Err(Error::Config("measurements must be positive".into()));
        }
        if self.meas_interval == 0 {
            return Err(Error::Config("measurement interval must be positive".into()));
        }
        if self.reunit_interval == 0 {
            return Err(Error::Config("reunitarization interval must be positive".into()));
        }
        let beta = match &self.model {
            Model::Gauge { beta, .. } | Model::Ising { beta } => *beta,
        };
        if !beta.is_finite() || beta < 0.0 {
            return Err(Error::Config(format!(
                "coupling beta must be finite and non-negative, got {beta}"
            )));
        }
        if let UpdateAlgorithm::Metropolis { epsilon } = self.algorithm {
            if !(0.0..1.0).contains(&epsilon) || epsilon == 0.0 {
                return Err(Error::Config(format!(
                    "metropolis spread epsilon must be in (0, 1), got {epsilon}"
                )));
            }
        }
        if matches!(self.algorithm, UpdateAlgorithm::Wolff)
            && matches!(self.model, Model::Gauge { .. })
        {
            return Err(Error::Config(
                "cluster updates apply to spin models only".into(),
            ));
        }
        if let Model::Ising { .. } = self.model {
            if self.dims.iter().any(|d| d % 2 != 0) {
                return Err(Error::Config(format!(
                    "Ising extents must be even for checkerboard sweeps, got {:?}",
                    self.dims
                )));
            }
        }
        if let Some(cp) = &self.checkpoint {
            if cp.every == 0 {
                return Err(Error::Config("checkpoint interval must be positive".into()));
            }
        }
        Ok(())
    }
}

/// Adaptive proposal-spread tuner, active during thermalization only so
/// the measured chain has a fixed transition kernel.
struct Tuner {
    epsilon: f64,
    sweeps: usize,
    attempted: usize,
    accepted: usize,
    win: usize,
    tgt: f64,
    band: f64,
}

impl Tuner {
    fn new(epsilon: f64) -> Self {
        Tuner {
            epsilon,
            sweeps: 0,
            attempted: 0,
            accepted: 0,
            win: 10,
            tgt: 0.5,
            band: 0.1,
        }
    }

    fn update(&mut self, info: crate::gauge::SweepInfo) {
        self.sweeps += 1;
        self.attempted += info.attempted;
        self.accepted += info.accepted;
        if self.sweeps == self.win {
            let r = self.accepted as f64 / self.attempted.max(1) as f64;
            if r > self.tgt + self.band {
                self.epsilon = (self.epsilon * 1.1).min(0.99);
            } else if r < self.tgt - self.band {
                self.epsilon *= 0.9;
            }
            self.sweeps = 0;
            self.attempted = 0;
            self.accepted = 0;
        }
    }
}

/// Completed gauge run.
#[derive(Debug, Clone)]
pub struct GaugeRunOutput {
    pub samples: Vec<GaugeSample>,
    pub acceptance: f64,
    /// Final (possibly tuned) Metropolis spread.
    pub epsilon: f64,
}

/// Completed Ising run.
#[derive(Debug, Clone)]
pub struct IsingRunOutput {
    pub samples: Vec<IsingSample>,
    pub acceptance: f64,
}

fn gauge_params(cfg: &RunConfig) -> Result<(f64, &GaugeObservableSpec)> {
    match &cfg.model {
        Model::Gauge { beta, observables } => Ok((*beta, observables)),
        Model::Ising { .. } => Err(Error::Config(
            "gauge driver invoked with an Ising model".into(),
        )),
    }
}

fn ising_beta(cfg: &RunConfig) -> Result<f64> {
    match &cfg.model {
        Model::Ising { beta } => Ok(*beta),
        Model::Gauge { .. } => Err(Error::Config(
            "Ising driver invoked with a gauge model".into(),
        )),
    }
}

fn gauge_sweep(
    field: &mut GaugeField,
    beta: f64,
    algorithm: UpdateAlgorithm,
    epsilon: f64,
    rng: &mut impl Rng,
) -> crate::gauge::SweepInfo {
    match algorithm {
        UpdateAlgorithm::Metropolis { .. } => field.metropolis_sweep(beta, epsilon, rng),
        UpdateAlgorithm::HeatBath => field.heatbath_sweep(beta, rng),
        // validate() refuses Wolff for gauge models.
        UpdateAlgorithm::Wolff => unreachable!("cluster update on a gauge field"),
    }
}

/// Run a fresh gauge chain: thermalize (tuning the Metropolis spread),
/// then measure every `meas_interval` sweeps.
pub fn run_gauge(cfg: &RunConfig) -> Result<GaugeRunOutput> {
    cfg.validate()?;
    let (beta, obs) = gauge_params(cfg)?;
    let lattice = Lattice::new(cfg.dims)?;
    let mut rng = ChaCha20Rng::seed_from_u64(cfg.seed);
    let mut field = match cfg.start {
        Start::Cold => GaugeField::cold(lattice),
        Start::Hot => GaugeField::hot(lattice, &mut rng),
    };
    obs.validate(&field)?;

    let epsilon0 = match cfg.algorithm {
        UpdateAlgorithm::Metropolis { epsilon } => epsilon,
        UpdateAlgorithm::HeatBath | UpdateAlgorithm::Wolff => 0.0,
    };
    let mut tuner = Tuner::new(epsilon0);
    for s in 0..cfg.therm_sweeps {
        let info = gauge_sweep(&mut field, beta, cfg.algorithm, tuner.epsilon, &mut rng);
        if matches!(cfg.algorithm, UpdateAlgorithm::Metropolis { .. }) {
            tuner.update(info);
        }
        if (s + 1) % cfg.reunit_interval == 0 {
            field.reunitarize();
        }
    }
    let epsilon = tuner.epsilon;
    field.reunitarize();
    field.check_unitarity()?;

    measure_gauge_chain(cfg, beta, epsilon, field, rng, Vec::new())
}

/// Continue a checkpointed gauge chain to the configured number of
/// measurements. The restored RNG state makes the continuation identical
/// to the uninterrupted run.
pub fn resume_gauge(cfg: &RunConfig, path: &std::path::Path) -> Result<GaugeRunOutput> {
    cfg.validate()?;
    let (beta, obs) = gauge_params(cfg)?;
    let cp = checkpoint::load_gauge(path)?;
    if cp.field.lattice != Lattice::new(cfg.dims)? {
        return Err(Error::CheckpointMismatch(format!(
            "checkpoint lattice {:?} does not match configured dims {:?}",
            cp.field.lattice.dims, cfg.dims
        )));
    }
    if cp.observables != *obs {
        return Err(Error::CheckpointMismatch(format!(
            "checkpoint measured {:?}, configuration wants {:?}",
            cp.observables, obs
        )));
    }
    measure_gauge_chain(cfg, beta, cp.epsilon, cp.field, cp.rng, cp.samples)
}

fn measure_gauge_chain(
    cfg: &RunConfig,
    beta: f64,
    epsilon: f64,
    mut field: GaugeField,
    mut rng: ChaCha20Rng,
    mut samples: Vec<GaugeSample>,
) -> Result<GaugeRunOutput> {
    let (_, obs) = gauge_params(cfg)?;
    let mut attempted = 0usize;
    let mut accepted = 0usize;

    let start = samples.len();
    for i in start..cfg.measurements {
        for _ in 0..cfg.meas_interval {
            let info = gauge_sweep(&mut field, beta, cfg.algorithm, epsilon, &mut rng);
            attempted += info.attempted;
            accepted += info.accepted;
        }
        if (i + 1) % cfg.reunit_interval == 0 {
            field.reunitarize();
            field.check_unitarity()?;
        }
        samples.push(measure_gauge(&field, obs)?);

        if let Some(cp) = &cfg.checkpoint {
            if (i + 1) % cp.every == 0 {
                checkpoint::save_gauge(
                    &cp.path,
                    &GaugeCheckpoint {
                        field: field.clone(),
                        rng: rng.clone(),
                        epsilon,
                        observables: obs.clone(),
                        samples: samples.clone(),
                    },
                )?;
            }
        }
    }

    let acceptance = if attempted > 0 {
        accepted as f64 / attempted as f64
    } else {
        1.0
    };
    Ok(GaugeRunOutput {
        samples,
        acceptance,
        epsilon,
    })
}

/// Run a fresh Ising chain.
pub fn run_ising(cfg: &RunConfig) -> Result<IsingRunOutput> {
    cfg.validate()?;
    let beta = ising_beta(cfg)?;
    let lattice = Lattice::new(cfg.dims)?;
    let mut rng = ChaCha20Rng::seed_from_u64(cfg.seed);
    let mut field = match cfg.start {
        Start::Cold => SpinField::cold(lattice),
        Start::Hot => SpinField::hot(lattice, &mut rng),
    };
    for _ in 0..cfg.therm_sweeps {
        ising_sweep(&mut field, beta, cfg.algorithm, &mut rng);
    }
    measure_ising_chain(cfg, beta, field, rng, Vec::new())
}

/// Continue a checkpointed Ising chain.
pub fn resume_ising(cfg: &RunConfig, path: &std::path::Path) -> Result<IsingRunOutput> {
    cfg.validate()?;
    let beta = ising_beta(cfg)?;
    let mut cp = checkpoint::load_ising(path)?;
    if cp.field.lattice != Lattice::new(cfg.dims)? {
        return Err(Error::CheckpointMismatch(format!(
            "checkpoint lattice {:?} does not match configured dims {:?}",
            cp.field.lattice.dims, cfg.dims
        )));
    }
    cp.field.rebuild_tables();
    measure_ising_chain(cfg, beta, cp.field, cp.rng, cp.samples)
}

fn ising_sweep(
    field: &mut SpinField,
    beta: f64,
    algorithm: UpdateAlgorithm,
    rng: &mut impl Rng,
) -> crate::gauge::SweepInfo {
    match algorithm {
        UpdateAlgorithm::Metropolis { .. } => field.metropolis_sweep(beta, rng),
        UpdateAlgorithm::HeatBath => field.heatbath_sweep(beta, rng),
        UpdateAlgorithm::Wolff => field.wolff_step(beta, rng),
    }
}

fn measure_ising_chain(
    cfg: &RunConfig,
    beta: f64,
    mut field: SpinField,
    mut rng: ChaCha20Rng,
    mut samples: Vec<IsingSample>,
) -> Result<IsingRunOutput> {
    let mut attempted = 0usize;
    let mut accepted = 0usize;
    let start = samples.len();
    for i in start..cfg.measurements {
        for _ in 0..cfg.meas_interval {
            let info = ising_sweep(&mut field, beta, cfg.algorithm, &mut rng);
            attempted += info.attempted;
            accepted += info.accepted;
        }
        samples.push(measure_ising(&field));

        if let Some(cp) = &cfg.checkpoint {
            if (i + 1) % cp.every == 0 {
                checkpoint::save_ising(
                    &cp.path,
                    &IsingCheckpoint {
                        field: field.clone(),
                        rng: rng.clone(),
                        samples: samples.clone(),
                    },
                )?;
            }
        }
    }
    let acceptance = if attempted > 0 {
        accepted as f64 / attempted as f64
    } else {
        1.0
    };
    Ok(IsingRunOutput {
        samples,
        acceptance,
    })
}
