//! Element distributor: bucket a rank's particles into zone elements.

use log::warn;

use super::{Communicator, CumulativeWeight, RandomStream, allocate};
use crate::schema::Zone;

/// Distribute `n_local` particles over the elements of a cumulative weight
/// array (not yet normalized).
///
/// Returns the exclusive prefix-sum index (`n_elts + 1` entries): particles
/// of element `i` are `index[i]..index[i + 1]`, and the last entry is the
/// number of particles actually placed. Draws one uniform per particle.
pub fn distribute(n_local: u64, mut cm: CumulativeWeight, rng: &mut RandomStream) -> Vec<usize> {
    let n_elts = cm.len();
    let mut index = vec![0usize; n_elts + 1];

    let mut n_local = n_local;
    if n_local > 0 && n_elts == 0 {
        n_local = 0;
    }
    if n_local > 0 && cm.total() <= 0.0 {
        warn!(
            "{} particles assigned to a zone part with zero total weight; none injected",
            n_local
        );
        n_local = 0;
    }

    cm.normalize();

    for _ in 0..n_local {
        let r = rng.uniform();
        let e_id = cm.sample(r);
        index[e_id + 1] += 1;
    }

    if cm.overshoots() > 0 {
        warn!(
            "Element distribution clamped {} draws beyond the cumulative weight total",
            cm.overshoots()
        );
    }

    for i in 0..n_elts {
        index[i + 1] += index[i];
    }

    index
}

/// Two-level distribution of `n_global` particles over a zone split across
/// ranks.
///
/// `parent_weights` holds the weights of all local elements of the zone's
/// kind (face surfaces or cell volumes); `profile` optionally scales each
/// zone element.
pub fn distribute_particles(
    n_global: u64,
    zone: &Zone,
    parent_weights: &[f64],
    profile: Option<&[f64]>,
    comm: &dyn Communicator,
    rng: &mut RandomStream,
) -> Vec<usize> {
    let cm = CumulativeWeight::build_indexed(parent_weights, zone.elt_ids(), profile);
    let n_local = allocate(n_global, cm.total(), comm, rng);
    distribute(n_local, cm, rng)
}
