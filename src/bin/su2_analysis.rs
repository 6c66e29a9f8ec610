//! Offline analysis of a stored SU(2) time series: GEVP over the
//! smeared operator basis, effective-mass plateau and cosh fit for the
//! glueball mass, static potential and Creutz ratios for the string
//! tension. Pure function of the input file, so re-running reproduces
//! identical numbers.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use csv::ReaderBuilder;

use lattice::analysis::{
    cosh_fit, correlation_matrices, creutz_ratio, effective_mass_plateau, gevp_ground_state,
    jackknife_columns, static_potential, string_tension_fit, FitQuality, FitResult, SeriesStats,
};

#[derive(Parser, Debug)]
#[command(about = "Glueball mass and string tension from a stored SU(2) time series")]
struct Cli {
    /// Time-series CSV written by su2_run.
    #[arg(long)]
    input: PathBuf,

    /// Jackknife bins over the configuration sequence.
    #[arg(long, default_value_t = 20)]
    n_bins: usize,

    /// GEVP reference time t0.
    #[arg(long, default_value_t = 0)]
    t0: usize,

    /// Effective-mass plateau window [plateau-min, plateau-max).
    #[arg(long, default_value_t = 1)]
    plateau_min: usize,

    #[arg(long, default_value_t = 5)]
    plateau_max: usize,

    /// Cosh fit window [fit-start, fit-end).
    #[arg(long, default_value_t = 1)]
    fit_start: usize,

    #[arg(long, default_value_t = 5)]
    fit_end: usize,

    /// Reference T for the potential V(R) = ln W(R,T)/W(R,T+1).
    #[arg(long, default_value_t = 3)]
    t_ref: usize,
}

/// Parsed column layout of the time-series file.
struct Layout {
    plaquette: usize,
    r_max: usize,
    t_max: usize,
    /// wilson[(r-1)*t_max + (t-1)] = column index
    wilson: Vec<usize>,
    levels: Vec<usize>,
    nt: usize,
    /// ops[level_idx][z] = column index
    ops: Vec<Vec<usize>>,
}

fn parse_layout(headers: &csv::StringRecord) -> Result<Layout, Box<dyn Error>> {
    let mut plaquette = None;
    let mut wilson_cols = Vec::new(); // (r, t, idx)
    let mut op_cols = Vec::new(); // (level, z, idx)
    for (idx, name) in headers.iter().enumerate() {
        if name == "plaquette" {
            plaquette = Some(idx);
        } else if let Some(rest) = name.strip_prefix("w_r") {
            let (r, t) = rest
                .split_once("_t")
                .ok_or_else(|| format!("bad wilson column {name}"))?;
            wilson_cols.push((r.parse::<usize>()?, t.parse::<usize>()?, idx));
        } else if let Some(rest) = name.strip_prefix("op_l") {
            let (l, z) = rest
                .split_once("_t")
                .ok_or_else(|| format!("bad operator column {name}"))?;
            op_cols.push((l.parse::<usize>()?, z.parse::<usize>()?, idx));
        }
    }
    let plaquette = plaquette.ok_or("no plaquette column")?;
    let r_max = wilson_cols.iter().map(|&(r, _, _)| r).max().unwrap_or(0);
    let t_max = wilson_cols.iter().map(|&(_, t, _)| t).max().unwrap_or(0);
    let mut wilson = vec![0; r_max * t_max];
    for &(r, t, idx) in &wilson_cols {
        wilson[(r - 1) * t_max + (t - 1)] = idx;
    }
    let levels: Vec<usize> = op_cols
        .iter()
        .map(|&(l, _, _)| l)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let nt = op_cols.iter().map(|&(_, z, _)| z + 1).max().unwrap_or(0);
    let mut ops = vec![vec![0; nt]; levels.len()];
    for &(l, z, idx) in &op_cols {
        let li = levels.iter().position(|&x| x == l).unwrap();
        ops[li][z] = idx;
    }
    Ok(Layout {
        plaquette,
        r_max,
        t_max,
        wilson,
        levels,
        nt,
        ops,
    })
}

fn quality_str(q: &FitQuality) -> String {
    match q {
        FitQuality::Good => "good".into(),
        FitQuality::Marginal(r) => format!("MARGINAL: {r}"),
        FitQuality::Poor(r) => format!("POOR: {r}"),
    }
}

fn print_fit(name: &str, fit: &FitResult) {
    println!(
        "{:<22} {:>12.6} ± {:<12.6} [{}]",
        name,
        fit.value,
        fit.error,
        quality_str(&fit.quality)
    );
}

/// Jackknife of the GEVP ground-state correlator over contiguous
/// configuration blocks. The GEVP is nonlinear in the correlation
/// matrices, so resampling happens at the configuration level.
fn gevp_with_errors(
    ops_history: &[Vec<Vec<f64>>],
    t0: usize,
    n_bins: usize,
) -> Option<(Vec<f64>, Vec<f64>)> {
    let full = gevp_ground_state(&correlation_matrices(ops_history), t0)?;
    let n = ops_history.len();
    let n_bins = n_bins.min(n).max(2);
    let block = n / n_bins;
    let mut jacks: Vec<Vec<f64>> = Vec::with_capacity(n_bins);
    for k in 0..n_bins {
        let (lo, hi) = (k * block, (k + 1) * block);
        let reduced: Vec<Vec<Vec<f64>>> = ops_history
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < lo || *i >= hi)
            .map(|(_, cfg)| cfg.clone())
            .collect();
        jacks.push(gevp_ground_state(&correlation_matrices(&reduced), t0)?);
    }
    let half = full.len();
    let mut errs = vec![0.0; half];
    for t in 0..half {
        let jm: f64 = jacks.iter().map(|j| j[t]).sum::<f64>() / n_bins as f64;
        let var: f64 = jacks.iter().map(|j| (j[t] - jm).powi(2)).sum::<f64>()
            * (n_bins - 1) as f64
            / n_bins as f64;
        errs[t] = var.sqrt();
    }
    Some((full, errs))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(&cli.input)?;
    let layout = parse_layout(rdr.headers()?)?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|f| f.parse::<f64>())
                .collect::<Result<_, _>>()?,
        );
    }
    if rows.is_empty() {
        return Err("time series is empty".into());
    }
    println!(
        "Loaded {} measurements: R_max={} T_max={} levels={:?} Nt={}",
        rows.len(),
        layout.r_max,
        layout.t_max,
        layout.levels,
        layout.nt
    );

    println!("\n{:=<64}", "");
    println!("PLAQUETTE");
    println!("{:=<64}", "");
    let plaq: Vec<f64> = rows.iter().map(|r| r[layout.plaquette]).collect();
    let stats = SeriesStats::from_series(&plaq);
    println!(
        "<P> = {:.6} ± {:.6}   tau_int = {:.2}   N_eff = {:.0}",
        stats.mean, stats.error, stats.tau_int, stats.n_eff
    );

    // ----- string tension -------------------------------------------
    println!("\n{:=<64}", "");
    println!("STATIC POTENTIAL / STRING TENSION (T_ref = {})", cli.t_ref);
    println!("{:=<64}", "");
    if cli.t_ref < 1 {
        return Err("t_ref must be at least 1".into());
    }
    if cli.t_ref + 1 > layout.t_max {
        return Err(format!(
            "t_ref {} needs loops up to T={}, file has T_max={}",
            cli.t_ref,
            cli.t_ref + 1,
            layout.t_max
        )
        .into());
    }
    let column = |idx: usize| -> Vec<f64> { rows.iter().map(|r| r[idx]).collect() };
    let w_mean: Vec<f64> = layout
        .wilson
        .iter()
        .map(|&idx| {
            let c = column(idx);
            c.iter().sum::<f64>() / c.len() as f64
        })
        .collect();
    let potential = static_potential(&w_mean, layout.r_max, layout.t_max, cli.t_ref);
    let mut pot_err = vec![0.0; layout.r_max];
    for r in 1..=layout.r_max {
        let w_t = column(layout.wilson[(r - 1) * layout.t_max + (cli.t_ref - 1)]);
        let w_t1 = column(layout.wilson[(r - 1) * layout.t_max + cli.t_ref]);
        let (_, e) = jackknife_columns(&[w_t, w_t1], cli.n_bins, |means| {
            if means[0] > 0.0 && means[1] > 0.0 {
                (means[0] / means[1]).ln()
            } else {
                f64::NAN
            }
        });
        pot_err[r - 1] = e;
        let v = potential[r - 1];
        if v.is_finite() {
            println!("  V({r}) = {v:.5} ± {e:.5}");
        } else {
            println!("  V({r}) = (noise dominated)");
        }
    }
    let sigma = string_tension_fit(&potential, &pot_err);
    print_fit("string tension a²σ", &sigma);

    // Creutz ratios as a cross-check on the potential fit.
    for r in 2..=layout.r_max.min(layout.t_max) {
        match creutz_ratio(&w_mean, layout.r_max, layout.t_max, r) {
            Some(chi) => println!("  chi({r},{r}) = {chi:.5}"),
            None => println!("  chi({r},{r}) = (loops non-positive)"),
        }
    }

    // ----- glueball mass --------------------------------------------
    println!("\n{:=<64}", "");
    println!("GLUEBALL CORRELATOR (GEVP t0 = {})", cli.t0);
    println!("{:=<64}", "");
    if cli.plateau_max >= layout.nt {
        return Err(format!(
            "plateau window end {} must stay below Nt = {}",
            cli.plateau_max, layout.nt
        )
        .into());
    }
    let ops_history: Vec<Vec<Vec<f64>>> = rows
        .iter()
        .map(|row| {
            layout
                .ops
                .iter()
                .map(|level| level.iter().map(|&idx| row[idx]).collect())
                .collect()
        })
        .collect();

    match gevp_with_errors(&ops_history, cli.t0, cli.n_bins) {
        Some((lambda0, lambda_err)) => {
            for (t, (l, e)) in lambda0.iter().zip(&lambda_err).enumerate() {
                println!("  C(t={t}) = {l:.6e} ± {e:.6e}");
            }
            let plateau =
                effective_mass_plateau(&lambda0, &lambda_err, cli.plateau_min, cli.plateau_max);
            print_fit("effective mass a·m", &plateau);
            let cosh = cosh_fit(&lambda0, &lambda_err, layout.nt, cli.fit_start, cli.fit_end);
            print_fit("cosh fit a·m", &cosh);

            if plateau.quality.is_good() && sigma.quality.is_good() && sigma.value > 0.0 {
                let ratio = plateau.value / sigma.value.sqrt();
                println!("\nm / sqrt(sigma) = {ratio:.4}");
            }
        }
        None => {
            println!("GEVP failed: C(t0) not positive definite; increase statistics");
            println!("or lower the smearing levels.");
        }
    }

    Ok(())
}
