//! Single 3D SU(2) gauge run: thermalize, measure, and write the raw
//! observable time series to CSV for offline analysis (`su2_analysis`).

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use csv::WriterBuilder;
use indicatif::{ProgressBar, ProgressStyle};

use lattice::observables::GaugeObservableSpec;
use lattice::run::{
    resume_gauge, run_gauge, CheckpointPolicy, GaugeRunOutput, Model, RunConfig, Start,
    UpdateAlgorithm,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Metropolis,
    Heatbath,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartKind {
    Cold,
    Hot,
}

#[derive(Parser, Debug)]
#[command(about = "3D SU(2) pure gauge Monte Carlo run")]
struct Cli {
    /// Cubic lattice extent L (lattice is L³).
    #[arg(long, default_value_t = 16)]
    size: usize,

    /// Wilson action coupling β.
    #[arg(long, default_value_t = 6.0)]
    beta: f64,

    #[arg(long, value_enum, default_value_t = Algorithm::Metropolis)]
    algorithm: Algorithm,

    /// Initial Metropolis proposal spread (tuned during thermalization).
    #[arg(long, default_value_t = 0.3)]
    epsilon: f64,

    #[arg(long, value_enum, default_value_t = StartKind::Cold)]
    start: StartKind,

    /// Thermalization sweeps.
    #[arg(long, default_value_t = 1_000)]
    therm: usize,

    /// Recorded measurements.
    #[arg(long, default_value_t = 3_000)]
    measurements: usize,

    /// Sweeps between measurements.
    #[arg(long, default_value_t = 5)]
    interval: usize,

    #[arg(long, default_value_t = 0xDECADE)]
    seed: u64,

    /// Largest Wilson loop spatial extent.
    #[arg(long, default_value_t = 6)]
    r_max: usize,

    /// Largest Wilson loop temporal extent.
    #[arg(long, default_value_t = 6)]
    t_max: usize,

    /// APE smearing weight.
    #[arg(long, default_value_t = 0.5)]
    ape_alpha: f64,

    /// Cumulative APE levels for the glueball operator basis.
    #[arg(long, value_delimiter = ',', default_value = "10,20,30")]
    smear_levels: Vec<usize>,

    /// APE steps applied before Wilson loop measurement.
    #[arg(long, default_value_t = 10)]
    wilson_smear: usize,

    /// Time-series output file.
    #[arg(long, default_value = "su2_series.csv")]
    output: PathBuf,

    /// Checkpoint file; written atomically every --checkpoint-every
    /// measurements.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    #[arg(long, default_value_t = 500)]
    checkpoint_every: usize,

    /// Resume the chain from --checkpoint instead of starting fresh.
    #[arg(long)]
    resume: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    println!("--- 3D SU(2) run: L={} beta={} seed={:#x} ---", cli.size, cli.beta, cli.seed);

    let observables = GaugeObservableSpec {
        r_max: cli.r_max,
        t_max: cli.t_max,
        ape_alpha: cli.ape_alpha,
        ape_levels: cli.smear_levels.clone(),
        wilson_smear_steps: cli.wilson_smear,
    };
    let cfg = RunConfig {
        dims: [cli.size; 3],
        model: Model::Gauge {
            beta: cli.beta,
            observables,
        },
        algorithm: match cli.algorithm {
            Algorithm::Metropolis => UpdateAlgorithm::Metropolis { epsilon: cli.epsilon },
            Algorithm::Heatbath => UpdateAlgorithm::HeatBath,
        },
        start: match cli.start {
            StartKind::Cold => Start::Cold,
            StartKind::Hot => Start::Hot,
        },
        therm_sweeps: cli.therm,
        measurements: cli.measurements,
        meas_interval: cli.interval,
        seed: cli.seed,
        reunit_interval: 100,
        checkpoint: cli.checkpoint.as_ref().map(|path| CheckpointPolicy {
            path: path.clone(),
            every: cli.checkpoint_every,
        }),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template(" {spinner} {msg} [{elapsed_precise}]")?);
    spinner.enable_steady_tick(Duration::from_millis(200));
    spinner.set_message(format!(
        "{} sweeps thermalization + {}x{} measurement sweeps",
        cli.therm, cli.measurements, cli.interval
    ));

    let output: GaugeRunOutput = if cli.resume {
        let path = cli
            .checkpoint
            .as_deref()
            .ok_or("--resume requires --checkpoint")?;
        resume_gauge(&cfg, path)?
    } else {
        run_gauge(&cfg)?
    };
    spinner.finish_and_clear();

    write_series(&cli, &output)?;

    let mean_plaq: f64 =
        output.samples.iter().map(|s| s.plaquette).sum::<f64>() / output.samples.len() as f64;
    println!("Acceptance: {:.3}  (final epsilon {:.3})", output.acceptance, output.epsilon);
    println!("Mean plaquette: {mean_plaq:.6}");
    println!("Wrote {} measurements to {}", output.samples.len(), cli.output.display());
    Ok(())
}

/// Column layout: plaquette, then w_r{R}_t{T} row-major, then
/// op_l{level}_t{slice}. `su2_analysis` reconstructs the shapes from
/// these headers.
fn write_series(cli: &Cli, output: &GaugeRunOutput) -> Result<(), Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().from_path(&cli.output)?;

    let nt = cli.size;
    let mut header = vec!["plaquette".to_string()];
    for r in 1..=cli.r_max {
        for t in 1..=cli.t_max {
            header.push(format!("w_r{r}_t{t}"));
        }
    }
    for &level in &cli.smear_levels {
        for z in 0..nt {
            header.push(format!("op_l{level}_t{z}"));
        }
    }
    wtr.write_record(&header)?;

    for sample in &output.samples {
        let mut record = vec![sample.plaquette.to_string()];
        record.extend(sample.wilson.iter().map(|w| w.to_string()));
        for level_ops in &sample.glueball_ops {
            record.extend(level_ops.iter().map(|o| o.to_string()));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
