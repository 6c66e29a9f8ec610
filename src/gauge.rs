//! SU(2) gauge field and its Monte Carlo update engine.
//!
//! Links live on the outgoing directions of each site, Wilson action
//! S = β Σ_p (1 − ½ Re Tr U_p). Both sweeps visit links in lexicographic
//! site order with the direction index innermost; the order affects the
//! autocorrelation time but not the stationary distribution.

use rand::Rng;
use rand_distr::{Distribution, UnitSphere};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lattice::{Lattice, NDIM};
use crate::su2::Su2;

/// Drift tolerance before a link counts as off the group.
pub const UNITARITY_TOL: f64 = 1e-8;

/// Per-sweep bookkeeping, lets the driver tune the proposal spread.
#[derive(Debug, Clone, Copy)]
pub struct SweepInfo {
    pub attempted: usize,
    pub accepted: usize,
}

impl SweepInfo {
    pub fn acceptance(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

/// SU(2) link configuration on a periodic 3D lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeField {
    pub lattice: Lattice,
    links: Vec<Su2>,
}

impl GaugeField {
    /// Cold start: every link the identity (ordered, zero action density).
    pub fn cold(lattice: Lattice) -> Self {
        GaugeField {
            lattice,
            links: vec![Su2::IDENTITY; lattice.volume() * NDIM],
        }
    }

    /// Hot start: every link Haar-random.
    pub fn hot(lattice: Lattice, rng: &mut impl Rng) -> Self {
        let links = (0..lattice.volume() * NDIM)
            .map(|_| Su2::random_uniform(rng))
            .collect();
        GaugeField { lattice, links }
    }

    #[inline(always)]
    pub fn link(&self, site: usize, mu: usize) -> Su2 {
        self.links[site * NDIM + mu]
    }

    #[inline(always)]
    pub fn set_link(&mut self, site: usize, mu: usize, u: Su2) {
        self.links[site * NDIM + mu] = u;
    }

    /// Staple sum A for the link (site, μ):
    /// A = Σ_{ν≠μ} U_ν(x+μ̂) U_μ†(x+ν̂) U_ν†(x)
    ///   + U_ν†(x+μ̂−ν̂) U_μ†(x−ν̂) U_ν(x−ν̂),
    /// so the local action term is −(β/2) Re Tr(U_μ(x) A).
    pub fn staple(&self, site: usize, mu: usize) -> Su2 {
        let lat = &self.lattice;
        let x_up_mu = lat.neighbor_up(site, mu);
        let mut sum = Su2::from_components(0.0, 0.0, 0.0, 0.0);
        for nu in 0..NDIM {
            if nu == mu {
                continue;
            }
            // forward staple
            let x_up_nu = lat.neighbor_up(site, nu);
            let fwd = self
                .link(x_up_mu, nu)
                .mul(&self.link(x_up_nu, mu).dagger())
                .mul(&self.link(site, nu).dagger());
            sum = sum.add(&fwd);
            // backward staple
            let x_dn_nu = lat.neighbor_down(site, nu);
            let x_up_mu_dn_nu = lat.neighbor_up(x_dn_nu, mu);
            let bwd = self
                .link(x_up_mu_dn_nu, nu)
                .dagger()
                .mul(&self.link(x_dn_nu, mu).dagger())
                .mul(&self.link(x_dn_nu, nu));
            sum = sum.add(&bwd);
        }
        sum
    }

    /// ½ Re Tr of the plaquette U_μν(x).
    pub fn plaquette(&self, site: usize, mu: usize, nu: usize) -> f64 {
        let lat = &self.lattice;
        let p = self
            .link(site, mu)
            .mul(&self.link(lat.neighbor_up(site, mu), nu))
            .mul(&self.link(lat.neighbor_up(site, nu), mu).dagger())
            .mul(&self.link(site, nu).dagger());
        0.5 * p.re_trace()
    }

    /// Average plaquette over all sites and orientations, in [−1, 1].
    pub fn average_plaquette(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for site in self.lattice.sites() {
            for mu in 0..NDIM {
                for nu in (mu + 1)..NDIM {
                    sum += self.plaquette(site, mu, nu);
                    count += 1;
                }
            }
        }
        sum / count as f64
    }

    /// Wilson action S = β Σ_p (1 − ½ Re Tr U_p).
    pub fn action(&self, beta: f64) -> f64 {
        let n_plaq = self.lattice.volume() * NDIM * (NDIM - 1) / 2;
        beta * (1.0 - self.average_plaquette()) * n_plaq as f64
    }

    /// One Metropolis sweep: propose U' = R·U with R near the identity
    /// (spread `epsilon`), accept with min(1, exp(−ΔS)).
    pub fn metropolis_sweep(&mut self, beta: f64, epsilon: f64, rng: &mut impl Rng) -> SweepInfo {
        let mut accepted = 0usize;
        let n = self.lattice.volume();
        for site in 0..n {
            for mu in 0..NDIM {
                let staple = self.staple(site, mu);
                let old = self.link(site, mu);
                let new = Su2::random_near_identity(rng, epsilon).mul(&old);
                // ΔS = −(β/2) Re Tr((U' − U) A)
                let delta_s = -0.5
                    * beta
                    * (new.mul(&staple).re_trace() - old.mul(&staple).re_trace());
                let accept = delta_s <= 0.0 || rng.gen::<f64>() < (-delta_s).exp();
                if accept {
                    self.set_link(site, mu, new);
                    accepted += 1;
                }
            }
        }
        SweepInfo {
            attempted: n * NDIM,
            accepted,
        }
    }

    /// One heat-bath sweep (Kennedy–Pendleton). Each link is redrawn
    /// from its exact conditional distribution, so every visit counts
    /// as accepted.
    pub fn heatbath_sweep(&mut self, beta: f64, rng: &mut impl Rng) -> SweepInfo {
        let n = self.lattice.volume();
        for site in 0..n {
            for mu in 0..NDIM {
                let staple = self.staple(site, mu);
                let new = heatbath_link(beta, &staple, rng);
                self.set_link(site, mu, new);
            }
        }
        SweepInfo {
            attempted: n * NDIM,
            accepted: n * NDIM,
        }
    }

    /// Rescale every link back onto the group. Call periodically;
    /// repeated products accumulate floating-point drift.
    pub fn reunitarize(&mut self) {
        for u in &mut self.links {
            *u = u.normalized();
        }
    }

    /// Fatal diagnostic: a link beyond `UNITARITY_TOL` means the update
    /// algorithm itself is defective.
    pub fn check_unitarity(&self) -> Result<()> {
        for (idx, u) in self.links.iter().enumerate() {
            let dev = u.unitarity_deviation();
            if dev > UNITARITY_TOL {
                return Err(Error::UnitarityLost {
                    site: idx / NDIM,
                    dir: idx % NDIM,
                    deviation: dev,
                });
            }
        }
        Ok(())
    }
}

/// Draw one link from P(U) ∝ exp((β/2) Re Tr(U A)) given the staple
/// sum A = k·V̄. Writing X = U·V̄ reduces this to sampling
/// x₀ ∈ [−1, 1] with weight √(1−x₀²)·exp(βk·x₀) (Kennedy–Pendleton),
/// a uniform axis for the vector part, then U = X·V̄†.
fn heatbath_link(beta: f64, staple: &Su2, rng: &mut impl Rng) -> Su2 {
    let k = staple.norm();
    let a = beta * k;
    if a < 1e-12 {
        // Decoupled link (β = 0 or vanishing staple): Haar-uniform.
        return Su2::random_uniform(rng);
    }
    let v_bar_dag = staple.scale(1.0 / k).dagger();

    let mut lambda2;
    loop {
        let r1: f64 = 1.0 - rng.gen::<f64>(); // in (0, 1]
        let r2: f64 = rng.gen();
        let r3: f64 = 1.0 - rng.gen::<f64>();
        let c = (2.0 * std::f64::consts::PI * r2).cos();
        lambda2 = -(r1.ln() + c * c * r3.ln()) / (2.0 * a);
        let r4: f64 = rng.gen();
        if r4 * r4 <= 1.0 - lambda2 {
            break;
        }
    }
    let x0 = 1.0 - 2.0 * lambda2;
    let r = (1.0 - x0 * x0).max(0.0).sqrt();
    let axis: [f64; 3] = UnitSphere.sample(rng);
    let x = Su2::from_components(x0, r * axis[0], r * axis[1], r * axis[2]);
    x.mul(&v_bar_dag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn cold_start_has_unit_plaquette() {
        let lat = Lattice::cubic(4).unwrap();
        let field = GaugeField::cold(lat);
        assert!((field.average_plaquette() - 1.0).abs() < 1e-12);
        assert!(field.check_unitarity().is_ok());
    }

    #[test]
    fn sweeps_preserve_unitarity() {
        let lat = Lattice::cubic(4).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let mut field = GaugeField::hot(lat, &mut rng);
        for _ in 0..5 {
            field.metropolis_sweep(2.0, 0.3, &mut rng);
            field.heatbath_sweep(2.0, &mut rng);
        }
        field.reunitarize();
        assert!(field.check_unitarity().is_ok());
    }

    #[test]
    fn heatbath_link_lands_on_group() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let staple = Su2::random_uniform(&mut rng).scale(3.7);
        for _ in 0..50 {
            let u = heatbath_link(2.5, &staple, &mut rng);
            assert!(u.unitarity_deviation() < 1e-10);
        }
    }
}
