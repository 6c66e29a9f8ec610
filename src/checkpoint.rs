//! Atomic on-disk checkpoints of a running chain.
//!
//! A checkpoint carries the field, the RNG state, and the samples
//! collected so far, so a resumed run continues the uninterrupted chain
//! bit for bit. Files are written to a sibling temp path and renamed
//! into place; a crash mid-write never leaves a corrupt checkpoint.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand_chacha::ChaCha20Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::gauge::GaugeField;
use crate::ising::SpinField;
use crate::observables::{GaugeObservableSpec, GaugeSample, IsingSample};

/// Saved state of a gauge chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeCheckpoint {
    pub field: GaugeField,
    pub rng: ChaCha20Rng,
    /// Tuned Metropolis spread in effect when the checkpoint was taken.
    pub epsilon: f64,
    /// Measurement layout of `samples`; a resume must use the same one
    /// or the series would change shape mid-chain.
    pub observables: GaugeObservableSpec,
    pub samples: Vec<GaugeSample>,
}

/// Saved state of an Ising chain. Call
/// [`SpinField::rebuild_tables`] after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsingCheckpoint {
    pub field: SpinField,
    pub rng: ChaCha20Rng,
    pub samples: Vec<IsingSample>,
}

fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn save_gauge(path: &Path, cp: &GaugeCheckpoint) -> Result<()> {
    save_atomic(path, cp)
}

pub fn load_gauge(path: &Path) -> Result<GaugeCheckpoint> {
    load(path)
}

pub fn save_ising(path: &Path, cp: &IsingCheckpoint) -> Result<()> {
    save_atomic(path, cp)
}

pub fn load_ising(path: &Path) -> Result<IsingCheckpoint> {
    load(path)
}
