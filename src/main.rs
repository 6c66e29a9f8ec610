//! Finite-size scan for the 3D Ising model: heat-bath or Wolff cluster
//! chains over a (lattice size, β) grid, one summary CSV per size for
//! the downstream Binder-crossing and scaling analysis (`ising_fss`).
//! A grid of one point serves as the production stage after a wide
//! scouting scan has located the transition.

use std::sync::Mutex;

use clap::Parser;
use csv::WriterBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use lattice::analysis::{binder_cumulant, jackknife_columns, mean, SeriesStats};
use lattice::ising::SpinField;
use lattice::lattice::Lattice;
use lattice::observables::measure_ising;

#[derive(Parser, Debug)]
#[command(about = "Heat-bath scan of the 3D Ising model over lattice sizes and couplings")]
struct Cli {
    /// Lattice sizes (cubic L³), comma separated.
    #[arg(long, value_delimiter = ',', default_value = "8,12,16")]
    sizes: Vec<usize>,

    /// Lowest coupling β of the scan grid.
    #[arg(long, default_value_t = 0.20)]
    beta_min: f64,

    /// Highest coupling β of the scan grid.
    #[arg(long, default_value_t = 0.24)]
    beta_max: f64,

    /// Number of grid points between beta_min and beta_max (inclusive).
    #[arg(long, default_value_t = 9)]
    beta_steps: usize,

    /// Thermalization sweeps per point.
    #[arg(long, default_value_t = 2_000)]
    therm: usize,

    /// Recorded measurements per point.
    #[arg(long, default_value_t = 20_000)]
    measurements: usize,

    /// Sweeps between measurements.
    #[arg(long, default_value_t = 2)]
    interval: usize,

    /// Master seed; every task seed derives from it.
    #[arg(long, default_value_t = 0xC0FFEE)]
    seed: u64,

    /// Output prefix; per-size files land at {prefix}_n{L}.csv.
    #[arg(long, default_value = "ising_scan")]
    prefix: String,

    /// Also dump raw per-measurement series (needed for reweighting).
    #[arg(long)]
    raw: bool,

    /// Update with Wolff cluster flips instead of heat-bath sweeps; use
    /// for production at a single coupling near the transition, where
    /// local updates suffer critical slowing down.
    #[arg(long)]
    wolff: bool,
}

/// Welford online stats.
#[derive(Default, Clone)]
struct OnlineStats {
    n: u64,
    mean: f64,
    m2: f64,
}
impl OnlineStats {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }
    fn mean(&self) -> f64 {
        self.mean
    }
}

/// Coupling grid. A single point (production runs at one β across
/// sizes) is allowed when beta_max == beta_min.
fn beta_grid(beta_min: f64, beta_max: f64, steps: usize) -> Result<Vec<f64>, String> {
    match steps {
        0 => Err("need at least 1 beta grid point".into()),
        1 => {
            if beta_max != beta_min {
                return Err("a single-point grid needs beta_max == beta_min".into());
            }
            Ok(vec![beta_min])
        }
        _ => {
            if beta_max <= beta_min {
                return Err("need beta_max > beta_min for a multi-point grid".into());
            }
            Ok((0..steps)
                .map(|i| beta_min + (beta_max - beta_min) * i as f64 / (steps - 1) as f64)
                .collect())
        }
    }
}

/// Row to be written to the per-size CSV.
#[derive(Debug)]
struct Row {
    size: usize,
    beta: f64,
    mean_abs_m: f64,
    err_abs_m: f64,
    mean_energy: f64,
    err_energy: f64,
    m2: f64,
    m4: f64,
    binder: f64,
    susceptibility: f64,
    err_susceptibility: f64,
    specific_heat: f64,
    tau_int_m: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    println!("Configuration:\n{cli:#?}");
    println!("Master seed: {:#x}", cli.seed);

    let betas = beta_grid(cli.beta_min, cli.beta_max, cli.beta_steps)?;

    // Derive every task seed serially from the master stream so the
    // parallel schedule cannot change the physics.
    let mut master = ChaCha20Rng::seed_from_u64(cli.seed);
    let tasks: Vec<(usize, f64, u64)> = cli
        .sizes
        .iter()
        .flat_map(|&l| betas.iter().map(move |&b| (l, b)))
        .map(|(l, b)| (l, b, master.next_u64()))
        .collect();

    let bar = ProgressBar::new(tasks.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        " {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]",
    )?);

    let results: Mutex<Vec<Row>> = Mutex::new(Vec::new());

    tasks.par_iter().try_for_each(|&(size, beta, task_seed)| {
        let lat = Lattice::cubic(size).map_err(|e| e.to_string())?;
        let vol = lat.volume();
        // Fast per-task generator, seeded from the master stream.
        let mut rng = Pcg64::seed_from_u64(task_seed);
        let mut field = SpinField::hot(lat, &mut rng);
        let update = |field: &mut SpinField, rng: &mut Pcg64| {
            if cli.wolff {
                field.wolff_step(beta, rng);
            } else {
                field.heatbath_sweep(beta, rng);
            }
        };

        for _ in 0..cli.therm {
            update(&mut field, &mut rng);
        }

        let mut m_series = Vec::with_capacity(cli.measurements);
        let mut e_series = Vec::with_capacity(cli.measurements);
        let mut stats_m2 = OnlineStats::default();
        let mut stats_m4 = OnlineStats::default();
        for _ in 0..cli.measurements {
            for _ in 0..cli.interval {
                update(&mut field, &mut rng);
            }
            let s = measure_ising(&field);
            m_series.push(s.magnetization);
            e_series.push(s.energy);
            stats_m2.push(s.magnetization * s.magnetization);
            stats_m4.push(s.magnetization.powi(4));
        }

        let abs_m: Vec<f64> = m_series.iter().map(|m| m.abs()).collect();
        let m_stats = SeriesStats::from_series(&abs_m);
        let e_stats = SeriesStats::from_series(&e_series);
        let m2 = stats_m2.mean();
        let m4 = stats_m4.mean();
        let m2_series: Vec<f64> = m_series.iter().map(|m| m * m).collect();
        // Jackknife χ over bins; the estimator mixes ⟨m²⟩ and ⟨|m|⟩.
        let n_bins = 20.min(cli.measurements / 2).max(2);
        let (chi, chi_err) = jackknife_columns(
            &[m2_series, abs_m.clone()],
            n_bins,
            |means| beta * vol as f64 * (means[0] - means[1] * means[1]),
        );
        let c_v = lattice::analysis::specific_heat(beta, vol, &e_series);

        if cli.raw {
            let path = format!("{}_raw_n{}_b{:.4}.csv", cli.prefix, size, beta);
            let mut wtr = WriterBuilder::new()
                .from_path(&path)
                .map_err(|e| e.to_string())?;
            wtr.write_record(["m", "e"]).map_err(|e| e.to_string())?;
            for (m, e) in m_series.iter().zip(&e_series) {
                wtr.write_record(&[m.to_string(), e.to_string()])
                    .map_err(|e| e.to_string())?;
            }
            wtr.flush().map_err(|e| e.to_string())?;
        }

        results.lock().unwrap().push(Row {
            size,
            beta,
            mean_abs_m: m_stats.mean,
            err_abs_m: m_stats.error,
            mean_energy: mean(&e_series),
            err_energy: e_stats.error,
            m2,
            m4,
            binder: binder_cumulant(m2, m4),
            susceptibility: chi,
            err_susceptibility: chi_err,
            specific_heat: c_v,
            tau_int_m: m_stats.tau_int,
        });
        bar.inc(1);
        Ok::<(), String>(())
    })?;
    bar.finish();

    // Sort for deterministic CSV order.
    let mut rows = results.into_inner().unwrap();
    rows.sort_by(|a, b| {
        a.size
            .cmp(&b.size)
            .then(a.beta.partial_cmp(&b.beta).unwrap())
    });

    for &size in &cli.sizes {
        let path = format!("{}_n{}.csv", cli.prefix, size);
        let mut wtr = WriterBuilder::new().from_path(&path)?;
        wtr.write_record([
            "size",
            "beta",
            "mean_abs_m",
            "err_abs_m",
            "mean_energy",
            "err_energy",
            "m2",
            "m4",
            "binder",
            "susceptibility",
            "err_susceptibility",
            "specific_heat",
            "tau_int_m",
        ])?;
        for r in rows.iter().filter(|r| r.size == size) {
            wtr.write_record(&[
                r.size.to_string(),
                r.beta.to_string(),
                r.mean_abs_m.to_string(),
                r.err_abs_m.to_string(),
                r.mean_energy.to_string(),
                r.err_energy.to_string(),
                r.m2.to_string(),
                r.m4.to_string(),
                r.binder.to_string(),
                r.susceptibility.to_string(),
                r.err_susceptibility.to_string(),
                r.specific_heat.to_string(),
                r.tau_int_m.to_string(),
            ])?;
        }
        wtr.flush()?;
        println!("Wrote {path}");
    }
    println!("Scan complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::beta_grid;

    #[test]
    fn grid_endpoints_are_inclusive() {
        let betas = beta_grid(0.20, 0.24, 9).unwrap();
        assert_eq!(betas.len(), 9);
        assert!((betas[0] - 0.20).abs() < 1e-15);
        assert!((betas[8] - 0.24).abs() < 1e-15);
    }

    #[test]
    fn single_point_grid_is_a_production_run() {
        let betas = beta_grid(0.2217, 0.2217, 1).unwrap();
        assert_eq!(betas, vec![0.2217]);
        // But a single point with a nonzero window is a mistake.
        assert!(beta_grid(0.20, 0.24, 1).is_err());
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        assert!(beta_grid(0.20, 0.24, 0).is_err());
        assert!(beta_grid(0.24, 0.20, 5).is_err());
    }
}
