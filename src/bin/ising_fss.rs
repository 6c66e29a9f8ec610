//! Finite-size scaling over a set of ising_scan outputs: Binder-cumulant
//! crossings locate beta_c, optionally sharpened by single-histogram
//! reweighting of the raw series, then power-law fits of chi(L) and
//! |m|(L) at beta_c give gamma/nu and beta/nu.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use csv::ReaderBuilder;

use lattice::analysis::{
    bisect_root, grid_crossing, power_law_fit, reweight_binder, reweight_susceptibility,
    FitQuality, FitResult,
};

#[derive(Parser, Debug)]
#[command(about = "Critical point and exponents from Binder-cumulant crossings")]
struct Cli {
    /// Prefix the scan files were written under: {prefix}_n{L}.csv.
    #[arg(long, default_value = "ising_scan")]
    prefix: String,

    /// Directory holding the scan files.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Lattice sizes to include, smallest first.
    #[arg(long, default_value = "8,12,16", value_delimiter = ',')]
    sizes: Vec<usize>,

    /// Refine each crossing by reweighting the raw series (requires the
    /// scan to have been run with --raw).
    #[arg(long)]
    raw: bool,
}

/// One row of a per-size scan file.
#[derive(Debug, Clone)]
struct ScanPoint {
    beta: f64,
    binder: f64,
    mean_abs_m: f64,
    err_abs_m: f64,
    susceptibility: f64,
    err_susceptibility: f64,
}

fn load_scan(path: &Path) -> Result<Vec<ScanPoint>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let col = |name: &str| -> Result<usize, Box<dyn Error>> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("{}: missing column {name}", path.display()).into())
    };
    let (i_beta, i_binder) = (col("beta")?, col("binder")?);
    let (i_m, i_me) = (col("mean_abs_m")?, col("err_abs_m")?);
    let (i_chi, i_chie) = (col("susceptibility")?, col("err_susceptibility")?);
    let mut points = Vec::new();
    for result in rdr.records() {
        let r = result?;
        let get = |i: usize| -> Result<f64, Box<dyn Error>> { Ok(r[i].parse::<f64>()?) };
        points.push(ScanPoint {
            beta: get(i_beta)?,
            binder: get(i_binder)?,
            mean_abs_m: get(i_m)?,
            err_abs_m: get(i_me)?,
            susceptibility: get(i_chi)?,
            err_susceptibility: get(i_chie)?,
        });
    }
    points.sort_by(|a, b| a.beta.partial_cmp(&b.beta).unwrap_or(std::cmp::Ordering::Equal));
    Ok(points)
}

/// Raw per-measurement series at one simulated coupling, converted to
/// the extensive quantities the reweighting formulas want.
struct RawSeries {
    energy: Vec<f64>,
    m2: Vec<f64>,
    m4: Vec<f64>,
}

fn load_raw(path: &Path, volume: usize) -> Result<RawSeries, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let (mut energy, mut m2, mut m4) = (Vec::new(), Vec::new(), Vec::new());
    for result in rdr.records() {
        let r = result?;
        let m: f64 = r[0].parse()?;
        let e: f64 = r[1].parse()?;
        let big_m = m * volume as f64;
        energy.push(e * volume as f64);
        m2.push(big_m * big_m);
        m4.push(big_m * big_m * big_m * big_m);
    }
    if energy.is_empty() {
        return Err(format!("{}: raw series is empty", path.display()).into());
    }
    Ok(RawSeries { energy, m2, m4 })
}

/// Linear interpolation of a scan column at an off-grid beta.
fn interp(points: &[ScanPoint], beta: f64, f: impl Fn(&ScanPoint) -> f64) -> f64 {
    for w in points.windows(2) {
        if beta >= w[0].beta && beta <= w[1].beta {
            let t = (beta - w[0].beta) / (w[1].beta - w[0].beta);
            return f(&w[0]) + t * (f(&w[1]) - f(&w[0]));
        }
    }
    // Off the grid: clamp to the nearest end.
    if beta < points[0].beta {
        f(&points[0])
    } else {
        f(&points[points.len() - 1])
    }
}

fn nearest_grid_beta(points: &[ScanPoint], beta: f64) -> f64 {
    points
        .iter()
        .map(|p| p.beta)
        .min_by(|a, b| {
            (a - beta)
                .abs()
                .partial_cmp(&(b - beta).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(beta)
}

fn quality_note(q: &FitQuality) -> String {
    match q {
        FitQuality::Good => "good".into(),
        FitQuality::Marginal(r) => format!("MARGINAL: {r}"),
        FitQuality::Poor(r) => format!("POOR: {r}"),
    }
}

fn print_exponent(name: &str, fit: &FitResult) {
    println!(
        "  {name:<10} = {:>8.4} ± {:<8.4} [{}]",
        fit.value,
        fit.error,
        quality_note(&fit.quality)
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.sizes.len() < 2 {
        return Err("need at least two lattice sizes for a crossing".into());
    }

    let mut scans = Vec::new();
    for &size in &cli.sizes {
        let path = cli.dir.join(format!("{}_n{}.csv", cli.prefix, size));
        let points = load_scan(&path)?;
        if points.len() < 2 {
            return Err(format!("{}: fewer than 2 beta points", path.display()).into());
        }
        println!("loaded {} ({} beta points)", path.display(), points.len());
        scans.push((size, points));
    }

    // ----- Binder crossings -----------------------------------------
    println!("\n{:=<60}", "");
    println!("BINDER CROSSINGS");
    println!("{:=<60}", "");
    let mut crossings = Vec::new();
    for pair in scans.windows(2) {
        let (la, pa) = (&pair[0].0, &pair[0].1);
        let (lb, pb) = (&pair[1].0, &pair[1].1);
        let betas: Vec<f64> = pa.iter().map(|p| p.beta).collect();
        let ua: Vec<f64> = pa.iter().map(|p| p.binder).collect();
        // pb is evaluated on pa's grid so the difference is pointwise.
        let ub: Vec<f64> = betas.iter().map(|&b| interp(pb, b, |q| q.binder)).collect();
        match grid_crossing(&betas, &ua, &ub) {
            Some(bc) => {
                println!("  U({la}) x U({lb}): beta_c = {bc:.5}");
                let refined = if cli.raw {
                    refine_crossing(&cli, *la, pa, *lb, pb, bc)?
                } else {
                    None
                };
                if let Some(rbc) = refined {
                    println!("    reweighted:  beta_c = {rbc:.5}");
                    crossings.push(rbc);
                } else {
                    crossings.push(bc);
                }
            }
            None => println!("  U({la}) x U({lb}): no crossing inside the scanned window"),
        }
    }
    if crossings.is_empty() {
        return Err("no Binder crossing found; widen the beta window".into());
    }
    let beta_c = crossings.iter().sum::<f64>() / crossings.len() as f64;
    println!("\nbeta_c = {beta_c:.5}  (literature 3D Ising: 0.22165)");

    // ----- exponents at beta_c --------------------------------------
    println!("\n{:=<60}", "");
    println!("EXPONENTS AT beta_c");
    println!("{:=<60}", "");
    let chi_points: Vec<(f64, f64, f64)> = scans
        .iter()
        .map(|(size, points)| {
            let chi = if cli.raw {
                reweighted_chi(&cli, *size, points, beta_c)
                    .unwrap_or_else(|_| interp(points, beta_c, |p| p.susceptibility))
            } else {
                interp(points, beta_c, |p| p.susceptibility)
            };
            let err = interp(points, beta_c, |p| p.err_susceptibility);
            (*size as f64, chi, err)
        })
        .collect();
    for (l, chi, err) in &chi_points {
        println!("  L = {l:>3.0}: chi = {chi:.4} ± {err:.4}");
    }
    let gamma_nu = power_law_fit(&chi_points);
    print_exponent("gamma/nu", &gamma_nu);
    if gamma_nu.value.is_finite() {
        println!("  eta        = {:>8.4}  (2 - gamma/nu)", 2.0 - gamma_nu.value);
    }

    let m_points: Vec<(f64, f64, f64)> = scans
        .iter()
        .map(|(size, points)| {
            (
                *size as f64,
                interp(points, beta_c, |p| p.mean_abs_m),
                interp(points, beta_c, |p| p.err_abs_m),
            )
        })
        .collect();
    let m_slope = power_law_fit(&m_points);
    // |m|(L) ~ L^{-beta/nu} at criticality, so the fitted slope is negated.
    let beta_nu = FitResult {
        value: -m_slope.value,
        error: m_slope.error,
        quality: m_slope.quality,
    };
    print_exponent("beta/nu", &beta_nu);

    Ok(())
}

/// Sharpen one crossing estimate: reweight both sizes' raw series from
/// the grid point nearest the crossing and bisect U_a(beta) - U_b(beta).
fn refine_crossing(
    cli: &Cli,
    la: usize,
    pa: &[ScanPoint],
    lb: usize,
    pb: &[ScanPoint],
    bc: f64,
) -> Result<Option<f64>, Box<dyn Error>> {
    let spacing = (pa[1].beta - pa[0].beta).abs();
    let (ba, bb) = (nearest_grid_beta(pa, bc), nearest_grid_beta(pb, bc));
    let raw_a = load_raw(
        &cli.dir.join(format!("{}_raw_n{}_b{:.4}.csv", cli.prefix, la, ba)),
        la * la * la,
    )?;
    let raw_b = load_raw(
        &cli.dir.join(format!("{}_raw_n{}_b{:.4}.csv", cli.prefix, lb, bb)),
        lb * lb * lb,
    )?;
    let diff = |beta: f64| {
        reweight_binder(beta, ba, &raw_a.energy, &raw_a.m2, &raw_a.m4)
            - reweight_binder(beta, bb, &raw_b.energy, &raw_b.m2, &raw_b.m4)
    };
    Ok(bisect_root(diff, bc - spacing, bc + spacing, 1e-7))
}

/// Reweighted chi(beta_c) from the raw series at the nearest grid point.
fn reweighted_chi(
    cli: &Cli,
    size: usize,
    points: &[ScanPoint],
    beta_c: f64,
) -> Result<f64, Box<dyn Error>> {
    let bs = nearest_grid_beta(points, beta_c);
    let raw = load_raw(
        &cli.dir.join(format!("{}_raw_n{}_b{:.4}.csv", cli.prefix, size, bs)),
        size * size * size,
    )?;
    Ok(reweight_susceptibility(
        beta_c,
        bs,
        &raw.energy,
        &raw.m2,
        size * size * size,
    ))
}
