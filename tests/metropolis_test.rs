//! Sanity checks on the local gauge updates: Metropolis acceptance in a
//! plausible band and unitarity preserved by long heat-bath chains.

use lattice::gauge::GaugeField;
use lattice::lattice::Lattice;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[test]
fn metropolis_acceptance_rate_is_plausible() {
    // Deterministic RNG so the test is repeatable.
    let mut rng = ChaCha20Rng::seed_from_u64(0xDEADBEEF);

    let lattice = Lattice::cubic(6).unwrap();
    let mut field = GaugeField::hot(lattice, &mut rng);

    let beta = 4.0;
    let epsilon = 0.3;
    let n_sweeps = 50;

    let mut attempted = 0usize;
    let mut accepted = 0usize;
    for _ in 0..n_sweeps {
        let info = field.metropolis_sweep(beta, epsilon, &mut rng);
        attempted += info.attempted;
        accepted += info.accepted;
    }

    let acc_rate = accepted as f64 / attempted as f64;

    // For a sensible spread we expect a rate strictly between 0% and
    // 100%. The bounds are generous enough to cope with RNG variance
    // while still catching pathological behaviour.
    assert!(
        (0.01..=0.99).contains(&acc_rate),
        "Acceptance rate {acc_rate:.3} is outside plausible range"
    );
}

#[test]
fn heatbath_chain_stays_unitary() {
    let mut rng = ChaCha20Rng::seed_from_u64(0xBADC0DE);
    let lattice = Lattice::cubic(4).unwrap();
    let mut field = GaugeField::hot(lattice, &mut rng);

    for _ in 0..200 {
        field.heatbath_sweep(2.5, &mut rng);
    }
    // No reunitarization along the way: the accumulated drift must stay
    // below the tolerance on its own.
    field.check_unitarity().expect("links drifted off SU(2)");
}

#[test]
fn heatbath_reaches_strong_coupling_plaquette() {
    // At beta = 2.0 the 3D SU(2) plaquette sits well away from both the
    // cold (1.0) and free (0.0) limits.
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let lattice = Lattice::cubic(6).unwrap();
    let mut field = GaugeField::cold(lattice);

    for _ in 0..300 {
        field.heatbath_sweep(2.0, &mut rng);
    }
    let mut plaq = 0.0;
    let n = 100;
    for _ in 0..n {
        field.heatbath_sweep(2.0, &mut rng);
        plaq += field.average_plaquette();
    }
    plaq /= n as f64;
    assert!(
        (0.2..0.9).contains(&plaq),
        "equilibrium plaquette {plaq:.3} outside the expected band"
    );
}
