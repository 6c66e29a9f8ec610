//! Periodic 3D cubic lattice geometry.
//!
//! Sites are stored flat in lexicographic order (x fastest); all field
//! types index through this struct so the wrap arithmetic lives in one
//! place. Extents and topology are fixed for the lifetime of a run.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of spatial directions.
pub const NDIM: usize = 3;

/// Geometry of a periodic L_x × L_y × L_z lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lattice {
    pub dims: [usize; NDIM],
}

impl Lattice {
    pub fn new(dims: [usize; NDIM]) -> Result<Self> {
        if dims.iter().any(|&d| d < 2) {
            return Err(Error::Config(format!(
                "lattice extent must be at least 2 in every direction, got {dims:?}"
            )));
        }
        Ok(Lattice { dims })
    }

    /// Cubic L³ lattice.
    pub fn cubic(l: usize) -> Result<Self> {
        Self::new([l, l, l])
    }

    /// Total number of sites.
    #[inline(always)]
    pub fn volume(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Smallest extent; loops and correlator separations must stay below it.
    pub fn min_extent(&self) -> usize {
        *self.dims.iter().min().unwrap_or(&0)
    }

    /// Flat index of the site at `coords` (assumed in range).
    #[inline(always)]
    pub fn site(&self, coords: [usize; NDIM]) -> usize {
        (coords[2] * self.dims[1] + coords[1]) * self.dims[0] + coords[0]
    }

    /// Coordinates of the flat site index.
    #[inline(always)]
    pub fn coords(&self, site: usize) -> [usize; NDIM] {
        let x = site % self.dims[0];
        let y = (site / self.dims[0]) % self.dims[1];
        let z = site / (self.dims[0] * self.dims[1]);
        [x, y, z]
    }

    /// Site one step forward in direction `mu`, wrapping periodically.
    #[inline(always)]
    pub fn neighbor_up(&self, site: usize, mu: usize) -> usize {
        let mut c = self.coords(site);
        c[mu] = (c[mu] + 1) % self.dims[mu];
        self.site(c)
    }

    /// Site one step backward in direction `mu`, wrapping periodically.
    #[inline(always)]
    pub fn neighbor_down(&self, site: usize, mu: usize) -> usize {
        let mut c = self.coords(site);
        c[mu] = (c[mu] + self.dims[mu] - 1) % self.dims[mu];
        self.site(c)
    }

    /// Site shifted by `steps` in direction `mu` (periodic).
    #[inline(always)]
    pub fn shift(&self, site: usize, mu: usize, steps: usize) -> usize {
        let mut c = self.coords(site);
        c[mu] = (c[mu] + steps) % self.dims[mu];
        self.site(c)
    }

    /// Checkerboard color of a site: (x + y + z) mod 2.
    #[inline(always)]
    pub fn parity(&self, site: usize) -> usize {
        let c = self.coords(site);
        (c[0] + c[1] + c[2]) % 2
    }

    /// Iterator over all flat site indices.
    pub fn sites(&self) -> impl Iterator<Item = usize> {
        0..self.volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_site_coords() {
        let lat = Lattice::new([4, 6, 8]).unwrap();
        for s in lat.sites() {
            assert_eq!(lat.site(lat.coords(s)), s);
        }
    }

    #[test]
    fn neighbors_wrap() {
        let lat = Lattice::cubic(4).unwrap();
        let s = lat.site([3, 0, 2]);
        assert_eq!(lat.coords(lat.neighbor_up(s, 0)), [0, 0, 2]);
        assert_eq!(lat.coords(lat.neighbor_down(s, 1)), [3, 3, 2]);
        // up then down is the identity
        for mu in 0..NDIM {
            assert_eq!(lat.neighbor_down(lat.neighbor_up(s, mu), mu), s);
        }
    }

    #[test]
    fn shift_matches_repeated_steps() {
        let lat = Lattice::new([4, 4, 4]).unwrap();
        let s = lat.site([1, 2, 3]);
        let mut t = s;
        for _ in 0..6 {
            t = lat.neighbor_up(t, 2);
        }
        assert_eq!(lat.shift(s, 2, 6), t);
    }

    #[test]
    fn rejects_degenerate_extent() {
        assert!(Lattice::new([1, 4, 4]).is_err());
    }
}
