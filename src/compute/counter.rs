//! Global particle counters.

use serde::{Deserialize, Serialize};

use super::Communicator;

/// Process-wide cumulative particle counts.
///
/// Owned by the simulation context and persisted by the restart layer. The
/// injection engine reads it for the ceiling check and updates it through
/// [`commit_injection`](Self::commit_injection) once per step; every commit
/// bumps `version`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleCounter {
    /// Particles injected since the start of the calculation (restarts included).
    pub n_g_cumulative_total: u64,
    /// Particles that failed to be placed since the start of the calculation.
    pub n_g_cumulative_failed: u64,
    /// Particles currently in the domain.
    pub n_g_total: u64,
    /// Particles injected at the current step.
    pub n_g_new: u64,
    /// Particles that left the domain at the current step.
    pub n_g_exit: u64,
    /// Particles deposited at the current step.
    pub n_g_deposited: u64,
    /// Particles lost at the current step.
    pub n_g_failed: u64,
    /// Statistical weight of particles in the domain.
    pub w_total: f64,
    /// Statistical weight injected at the current step.
    pub w_new: f64,
    pub version: u64,
}

/// Local contribution of one rank to an injection commit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalInjection {
    pub n_new: u64,
    pub weight_new: f64,
    pub n_failed: u64,
}

impl ParticleCounter {
    /// Global count after `n_requested` more particles would be injected.
    #[inline]
    pub fn projected_total(&self, n_requested: u64) -> u64 {
        self.n_g_total.saturating_add(n_requested)
    }

    /// Reduce the local injection results over all ranks and apply them.
    ///
    /// Collective: every rank must call it.
    pub fn commit_injection(&mut self, local: LocalInjection, comm: &dyn Communicator) {
        let n_new = comm.sum_u64(local.n_new);
        let n_failed = comm.sum_u64(local.n_failed);
        let w_new = comm.sum_f64(local.weight_new);

        self.n_g_new = n_new;
        self.n_g_total += n_new;
        self.n_g_cumulative_total += n_new;
        self.n_g_failed = n_failed;
        self.n_g_cumulative_failed += n_failed;
        self.w_new = w_new;
        self.w_total += w_new;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{SerialComm, ThreadGroup};
    use std::thread;

    #[test]
    fn test_commit_serial() {
        let mut counter = ParticleCounter {
            n_g_total: 10,
            n_g_cumulative_total: 25,
            w_total: 10.0,
            ..Default::default()
        };
        counter.commit_injection(
            LocalInjection {
                n_new: 5,
                weight_new: 2.5,
                n_failed: 1,
            },
            &SerialComm,
        );
        assert_eq!(counter.n_g_new, 5);
        assert_eq!(counter.n_g_total, 15);
        assert_eq!(counter.n_g_cumulative_total, 30);
        assert_eq!(counter.n_g_failed, 1);
        assert_eq!(counter.n_g_cumulative_failed, 1);
        assert_eq!(counter.w_total, 12.5);
        assert_eq!(counter.version, 1);
    }

    #[test]
    fn test_commit_reduces_over_ranks() {
        let comms = ThreadGroup::split(3);
        let counters: Vec<ParticleCounter> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let mut counter = ParticleCounter::default();
                        let local = LocalInjection {
                            n_new: comm.rank() as u64 + 1,
                            weight_new: 1.0,
                            n_failed: 0,
                        };
                        counter.commit_injection(local, comm);
                        counter
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for counter in &counters {
            assert_eq!(counter.n_g_new, 6);
            assert_eq!(counter.w_new, 3.0);
        }
        assert_eq!(counters[0], counters[2]);
    }

    #[test]
    fn test_projected_total() {
        let counter = ParticleCounter {
            n_g_total: u64::MAX - 1,
            ..Default::default()
        };
        assert_eq!(counter.projected_total(5), u64::MAX);
    }
}
