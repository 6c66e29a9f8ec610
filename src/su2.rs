//! SU(2) group elements in the quaternion parametrization.
//!
//! An element U = a0·1 + i(a1·σ1 + a2·σ2 + a3·σ3) is stored as the real
//! 4-vector (a0, a1, a2, a3) with a0² + |a|² = 1. Group multiplication,
//! conjugation, and the trace are all cheap real arithmetic in this form,
//! and any real linear combination of SU(2) elements is proportional to
//! an SU(2) element, which makes staple sums and APE smearing trivial to
//! project back onto the group.

use nalgebra::Matrix2;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};
use serde::{Deserialize, Serialize};

/// One SU(2) group element (unit quaternion).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Su2 {
    pub a: [f64; 4],
}

impl Su2 {
    /// The identity element.
    pub const IDENTITY: Su2 = Su2 { a: [1.0, 0.0, 0.0, 0.0] };

    /// Build from raw quaternion components without normalizing.
    pub fn from_components(a0: f64, a1: f64, a2: f64, a3: f64) -> Self {
        Su2 { a: [a0, a1, a2, a3] }
    }

    /// Quaternion norm; equals √det of the associated 2×2 matrix.
    pub fn norm(&self) -> f64 {
        self.a.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Rescale onto the group manifold. Used to undo floating-point
    /// drift and to project staple-weighted link sums back onto SU(2).
    pub fn normalized(&self) -> Su2 {
        let n = self.norm();
        Su2 {
            a: [self.a[0] / n, self.a[1] / n, self.a[2] / n, self.a[3] / n],
        }
    }

    /// |det − 1| in matrix language; zero for an exact group element.
    pub fn unitarity_deviation(&self) -> f64 {
        (self.a.iter().map(|x| x * x).sum::<f64>() - 1.0).abs()
    }

    /// Hermitian conjugate (quaternion conjugate).
    pub fn dagger(&self) -> Su2 {
        Su2 {
            a: [self.a[0], -self.a[1], -self.a[2], -self.a[3]],
        }
    }

    /// Re Tr U = 2·a0.
    pub fn re_trace(&self) -> f64 {
        2.0 * self.a[0]
    }

    /// Group product. For quaternions u, v:
    /// (uv)₀ = u₀v₀ − u⃗·v⃗, (uv)ₖ = u₀vₖ + v₀uₖ − (u⃗×v⃗)ₖ.
    pub fn mul(&self, rhs: &Su2) -> Su2 {
        let [a0, a1, a2, a3] = self.a;
        let [b0, b1, b2, b3] = rhs.a;
        Su2 {
            a: [
                a0 * b0 - a1 * b1 - a2 * b2 - a3 * b3,
                a0 * b1 + b0 * a1 - (a2 * b3 - a3 * b2),
                a0 * b2 + b0 * a2 - (a3 * b1 - a1 * b3),
                a0 * b3 + b0 * a3 - (a1 * b2 - a2 * b1),
            ],
        }
    }

    /// Componentwise sum (leaves the group; norm carries the weight).
    pub fn add(&self, rhs: &Su2) -> Su2 {
        Su2 {
            a: [
                self.a[0] + rhs.a[0],
                self.a[1] + rhs.a[1],
                self.a[2] + rhs.a[2],
                self.a[3] + rhs.a[3],
            ],
        }
    }

    /// Componentwise scale (leaves the group).
    pub fn scale(&self, s: f64) -> Su2 {
        Su2 {
            a: [self.a[0] * s, self.a[1] * s, self.a[2] * s, self.a[3] * s],
        }
    }

    /// Uniformly random group element (hot start).
    pub fn random_uniform(rng: &mut impl Rng) -> Su2 {
        // Rejection-sample the unit 4-ball, then push to the surface:
        // uniform on S³, which is the Haar measure for SU(2).
        loop {
            let a: [f64; 4] = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let n2: f64 = a.iter().map(|x| x * x).sum();
            // Reject outside the unit ball so the direction is uniform.
            if n2 > 1e-12 && n2 <= 1.0 {
                let n = n2.sqrt();
                return Su2 {
                    a: [a[0] / n, a[1] / n, a[2] / n, a[3] / n],
                };
            }
        }
    }

    /// Random element close to the identity, spread controlled by
    /// `epsilon` in (0, 1): a0 = ±√(1−ε²), |a⃗| = ε along a uniform axis.
    pub fn random_near_identity(rng: &mut impl Rng, epsilon: f64) -> Su2 {
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let a0 = sign * (1.0 - epsilon * epsilon).sqrt();
        let axis: [f64; 3] = UnitSphere.sample(rng);
        Su2 {
            a: [a0, epsilon * axis[0], epsilon * axis[1], epsilon * axis[2]],
        }
    }

    /// The 2×2 complex matrix form
    /// [[a0 + i·a3, a2 + i·a1], [−a2 + i·a1, a0 − i·a3]].
    pub fn matrix(&self) -> Matrix2<Complex64> {
        let [a0, a1, a2, a3] = self.a;
        Matrix2::new(
            Complex64::new(a0, a3),
            Complex64::new(a2, a1),
            Complex64::new(-a2, a1),
            Complex64::new(a0, -a3),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn product_stays_on_group() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..100 {
            let u = Su2::random_uniform(&mut rng);
            let v = Su2::random_uniform(&mut rng);
            let w = u.mul(&v);
            assert!(w.unitarity_deviation() < 1e-12);
        }
    }

    #[test]
    fn dagger_inverts() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let u = Su2::random_uniform(&mut rng);
        let id = u.mul(&u.dagger());
        assert!((id.a[0] - 1.0).abs() < 1e-12);
        assert!(id.a[1].abs() < 1e-12 && id.a[2].abs() < 1e-12 && id.a[3].abs() < 1e-12);
    }

    #[test]
    fn matrix_form_matches_quaternion_algebra() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let u = Su2::random_uniform(&mut rng);
        let v = Su2::random_uniform(&mut rng);

        let quat = u.mul(&v).matrix();
        let mat = u.matrix() * v.matrix();
        for i in 0..2 {
            for j in 0..2 {
                assert!((quat[(i, j)] - mat[(i, j)]).norm() < 1e-12);
            }
        }

        // det U = 1 in matrix language.
        let det = u.matrix().determinant();
        assert!((det - Complex64::new(1.0, 0.0)).norm() < 1e-12);
        // Re Tr agrees.
        assert!((u.matrix().trace().re - u.re_trace()).abs() < 1e-12);
    }

    #[test]
    fn near_identity_proposal_is_on_group() {
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        for _ in 0..100 {
            let r = Su2::random_near_identity(&mut rng, 0.3);
            assert!(r.unitarity_deviation() < 1e-12);
            assert!(r.a[0].abs() > 0.9);
        }
    }
}
