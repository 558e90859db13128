//! Rank allocator: apportion a global particle count across ranks.

use log::{debug, warn};

use super::{Communicator, CumulativeWeight, RandomStream};

/// Number of particles the local rank injects out of `n_global`.
///
/// Ranks are drawn proportionally to their local weight. Only the coordinator
/// draws (`n_global` uniforms), then scatters one count per rank, so the
/// counts over all ranks sum to exactly `n_global`, or to 0 when the total
/// weight is 0. A single rank returns `n_global` without drawing.
pub fn allocate(
    n_global: u64,
    local_weight: f64,
    comm: &dyn Communicator,
    rng: &mut RandomStream,
) -> u64 {
    if comm.n_ranks() <= 1 {
        return n_global;
    }

    let counts = comm.gather_f64(local_weight).map(|weights| {
        let mut counts = vec![0u64; weights.len()];
        let mut cm = CumulativeWeight::build(&weights, None);
        if cm.total() > 0.0 {
            cm.normalize();
            for _ in 0..n_global {
                let r = rng.uniform();
                counts[cm.sample(r)] += 1;
            }
            if cm.overshoots() > 0 {
                warn!(
                    "Rank allocation clamped {} draws beyond the cumulative weight total",
                    cm.overshoots()
                );
            }
        }
        debug!("Rank allocation of {} particles: {:?}", n_global, counts);
        counts
    });

    comm.scatter_u64(counts.as_deref())
}
