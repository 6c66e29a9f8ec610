//! Lattice Monte Carlo core: 3D SU(2) pure gauge theory and the 3D
//! Ising model on periodic cubic lattices, with the statistical
//! machinery to turn raw chains into physics numbers with honest
//! error bars.

pub mod analysis;
pub mod checkpoint;
pub mod error;
pub mod gauge;
pub mod ising;
pub mod lattice;
pub mod observables;
pub mod run;
pub mod su2;

pub use error::{Error, Result};
