//! Observable measurement: pure reads of a configuration producing
//! fixed-shape records for the time series.
//!
//! Gauge observables follow the usual 3D setup with directions 0, 1
//! spatial and direction 2 the "time" axis: plaquette average, planar
//! R×T Wilson loops in the (0, 2) plane on spatially smeared links, and
//! glueball operators (spatial-plaquette averages per time slice) at a
//! ladder of APE smearing levels for the variational basis.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gauge::GaugeField;
use crate::ising::SpinField;
use crate::su2::Su2;

/// Spatial directions and the correlator/time axis.
pub const SPATIAL_DIRS: [usize; 2] = [0, 1];
pub const TIME_DIR: usize = 2;

/// What to measure on each gauge configuration. Smearing amounts are
/// tunable analysis parameters, defaults matching common practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeObservableSpec {
    /// Largest spatial extent R of the Wilson loops.
    pub r_max: usize,
    /// Largest temporal extent T of the Wilson loops.
    pub t_max: usize,
    /// APE smearing weight.
    pub ape_alpha: f64,
    /// Cumulative smearing levels for the glueball operator basis.
    pub ape_levels: Vec<usize>,
    /// Smearing steps applied to spatial links before Wilson loops.
    pub wilson_smear_steps: usize,
}

impl Default for GaugeObservableSpec {
    fn default() -> Self {
        GaugeObservableSpec {
            r_max: 6,
            t_max: 6,
            ape_alpha: 0.5,
            ape_levels: vec![10, 20, 30],
            wilson_smear_steps: 10,
        }
    }
}

impl GaugeObservableSpec {
    /// Reject loop extents that would wrap around the lattice.
    pub fn validate(&self, field: &GaugeField) -> Result<()> {
        let r_extent = field.lattice.dims[SPATIAL_DIRS[0]];
        let t_extent = field.lattice.dims[TIME_DIR];
        if self.r_max >= r_extent {
            return Err(Error::LoopTooLarge {
                requested: self.r_max,
                extent: r_extent,
            });
        }
        if self.t_max >= t_extent {
            return Err(Error::LoopTooLarge {
                requested: self.t_max,
                extent: t_extent,
            });
        }
        if self.r_max == 0 || self.t_max == 0 {
            return Err(Error::Config(
                "wilson loop extents must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.ape_alpha) {
            return Err(Error::Config(format!(
                "APE alpha must be in [0, 1), got {}",
                self.ape_alpha
            )));
        }
        if self.ape_levels.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Config(
                "APE smearing levels must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

/// One gauge measurement: fixed shape for a given spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeSample {
    /// Average plaquette of the unsmeared configuration.
    pub plaquette: f64,
    /// Normalized W(R,T), row-major over R = 1..r_max, T = 1..t_max.
    pub wilson: Vec<f64>,
    /// Glueball operator per time slice, one row per smearing level.
    pub glueball_ops: Vec<Vec<f64>>,
}

/// One Ising measurement; moments are formed downstream by the analyzer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IsingSample {
    pub magnetization: f64,
    pub energy: f64,
}

/// Measure an Ising configuration.
pub fn measure_ising(field: &SpinField) -> IsingSample {
    IsingSample {
        magnetization: field.magnetization(),
        energy: field.energy(),
    }
}

/// Product of `len` links along direction `mu` starting at `site`.
fn line_product(field: &GaugeField, site: usize, mu: usize, len: usize) -> Su2 {
    let mut u = Su2::IDENTITY;
    let mut x = site;
    for _ in 0..len {
        u = u.mul(&field.link(x, mu));
        x = field.lattice.neighbor_up(x, mu);
    }
    u
}

/// Normalized planar Wilson loops W(R,T) in the (0, 2) plane,
/// ½ Re Tr averaged over all sites, for R = 1..=r_max, T = 1..=t_max.
pub fn wilson_loops(field: &GaugeField, r_max: usize, t_max: usize) -> Result<Vec<f64>> {
    let (mu, nu) = (SPATIAL_DIRS[0], TIME_DIR);
    if r_max >= field.lattice.dims[mu] {
        return Err(Error::LoopTooLarge {
            requested: r_max,
            extent: field.lattice.dims[mu],
        });
    }
    if t_max >= field.lattice.dims[nu] {
        return Err(Error::LoopTooLarge {
            requested: t_max,
            extent: field.lattice.dims[nu],
        });
    }
    let lat = &field.lattice;
    let vol = lat.volume() as f64;
    let mut w = vec![0.0; r_max * t_max];
    for site in lat.sites() {
        for r in 1..=r_max {
            let bottom = line_product(field, site, mu, r);
            let corner_r = lat.shift(site, mu, r);
            for t in 1..=t_max {
                let right = line_product(field, corner_r, nu, t);
                let corner_t = lat.shift(site, nu, t);
                let top = line_product(field, corner_t, mu, r);
                let left = line_product(field, site, nu, t);
                let loop_u = bottom
                    .mul(&right)
                    .mul(&top.dagger())
                    .mul(&left.dagger());
                w[(r - 1) * t_max + (t - 1)] += 0.5 * loop_u.re_trace();
            }
        }
    }
    for val in &mut w {
        *val /= vol;
    }
    Ok(w)
}

/// One APE smearing pass over the spatial links: each spatial link is
/// replaced by the SU(2) projection of
/// (1 − α)·U + (α/2)·Σ spatial staples. Temporal links are untouched.
fn ape_smear_pass(field: &GaugeField, alpha: f64) -> GaugeField {
    let lat = field.lattice;
    let mut out = field.clone();
    for site in lat.sites() {
        for &mu in &SPATIAL_DIRS {
            let mut sum = field.link(site, mu).scale(1.0 - alpha);
            for &nu in &SPATIAL_DIRS {
                if nu == mu {
                    continue;
                }
                let x_up_mu = lat.neighbor_up(site, mu);
                let x_up_nu = lat.neighbor_up(site, nu);
                let fwd = field
                    .link(site, nu)
                    .mul(&field.link(x_up_nu, mu))
                    .mul(&field.link(x_up_mu, nu).dagger());
                let x_dn_nu = lat.neighbor_down(site, nu);
                let x_up_mu_dn_nu = lat.neighbor_up(x_dn_nu, mu);
                let bwd = field
                    .link(x_dn_nu, nu)
                    .dagger()
                    .mul(&field.link(x_dn_nu, mu))
                    .mul(&field.link(x_up_mu_dn_nu, nu));
                sum = sum.add(&fwd.add(&bwd).scale(0.5 * alpha));
            }
            out.set_link(site, mu, sum.normalized());
        }
    }
    out
}

/// Apply `steps` APE smearing passes to the spatial links.
pub fn ape_smear_spatial(field: &GaugeField, alpha: f64, steps: usize) -> GaugeField {
    let mut smeared = field.clone();
    for _ in 0..steps {
        smeared = ape_smear_pass(&smeared, alpha);
    }
    smeared
}

/// Glueball interpolating operator per time slice: the spatial
/// plaquette ½ Re Tr P₀₁ averaged over each constant-z slice.
pub fn glueball_operators(field: &GaugeField) -> Vec<f64> {
    let lat = &field.lattice;
    let nt = lat.dims[TIME_DIR];
    let slice_vol = (lat.volume() / nt) as f64;
    let mut ops = vec![0.0; nt];
    for site in lat.sites() {
        let z = lat.coords(site)[TIME_DIR];
        ops[z] += field.plaquette(site, SPATIAL_DIRS[0], SPATIAL_DIRS[1]);
    }
    for op in &mut ops {
        *op /= slice_vol;
    }
    ops
}

/// Full gauge measurement for one configuration. The smearing ladder is
/// walked incrementally so level k reuses the passes of level k−1, as
/// the cost is dominated by smearing.
pub fn measure_gauge(field: &GaugeField, spec: &GaugeObservableSpec) -> Result<GaugeSample> {
    spec.validate(field)?;

    let plaquette = field.average_plaquette();

    let mut glueball_ops = Vec::with_capacity(spec.ape_levels.len());
    let mut smeared = field.clone();
    let mut done = 0usize;
    for &level in &spec.ape_levels {
        smeared = ape_smear_spatial(&smeared, spec.ape_alpha, level - done);
        done = level;
        glueball_ops.push(glueball_operators(&smeared));
    }

    let wilson_field = ape_smear_spatial(field, spec.ape_alpha, spec.wilson_smear_steps);
    let wilson = wilson_loops(&wilson_field, spec.r_max, spec.t_max)?;

    Ok(GaugeSample {
        plaquette,
        wilson,
        glueball_ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;

    #[test]
    fn cold_wilson_loops_are_unity() {
        let field = GaugeField::cold(Lattice::cubic(5).unwrap());
        let w = wilson_loops(&field, 3, 3).unwrap();
        for val in w {
            assert!((val - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn oversized_loop_is_rejected() {
        let field = GaugeField::cold(Lattice::cubic(4).unwrap());
        assert!(matches!(
            wilson_loops(&field, 4, 2),
            Err(Error::LoopTooLarge { requested: 4, extent: 4 })
        ));
        assert!(matches!(
            wilson_loops(&field, 2, 5),
            Err(Error::LoopTooLarge { .. })
        ));
    }

    #[test]
    fn smearing_preserves_unitarity_and_cold_field() {
        let field = GaugeField::cold(Lattice::cubic(4).unwrap());
        let smeared = ape_smear_spatial(&field, 0.5, 5);
        assert!(smeared.check_unitarity().is_ok());
        // Identity links are a fixed point of APE smearing.
        assert!((smeared.average_plaquette() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn glueball_ops_have_one_entry_per_slice() {
        let field = GaugeField::cold(Lattice::new([4, 4, 6]).unwrap());
        let ops = glueball_operators(&field);
        assert_eq!(ops.len(), 6);
        for op in ops {
            assert!((op - 1.0).abs() < 1e-12);
        }
    }
}
