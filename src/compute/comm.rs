//! Blocking collectives between ranks.
//!
//! Every rank must call the same collectives in the same order; a rank that
//! skips one deadlocks the group.

use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

/// Rank performing serialized operations (gather target, scatter source).
pub const COORDINATOR: usize = 0;

/// Collective operations over a static group of ranks.
pub trait Communicator {
    /// Id of the local rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn n_ranks(&self) -> usize;

    #[inline]
    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Gather one value per rank on the coordinator (rank order).
    ///
    /// Returns `None` on every other rank.
    fn gather_f64(&self, value: f64) -> Option<Vec<f64>>;

    /// Scatter one value per rank from the coordinator.
    ///
    /// `values` is only read on the coordinator; missing entries scatter 0.
    fn scatter_u64(&self, values: Option<&[u64]>) -> u64;

    /// Logical-or across ranks.
    fn any(&self, flag: bool) -> bool;

    /// Sum across ranks.
    fn sum_u64(&self, value: u64) -> u64;

    /// Sum across ranks, accumulated in rank order.
    fn sum_f64(&self, value: f64) -> f64;
}

/// Single-rank communicator; every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn gather_f64(&self, value: f64) -> Option<Vec<f64>> {
        Some(vec![value])
    }

    fn scatter_u64(&self, values: Option<&[u64]>) -> u64 {
        values.and_then(|v| v.first().copied()).unwrap_or(0)
    }

    fn any(&self, flag: bool) -> bool {
        flag
    }

    fn sum_u64(&self, value: u64) -> u64 {
        value
    }

    fn sum_f64(&self, value: f64) -> f64 {
        value
    }
}

#[derive(Debug)]
struct Shared {
    n_ranks: usize,
    barrier: Barrier,
    reals: Mutex<Vec<f64>>,
    counts: Mutex<Vec<u64>>,
}

impl Shared {
    fn reals(&self) -> MutexGuard<'_, Vec<f64>> {
        self.reals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counts(&self) -> MutexGuard<'_, Vec<u64>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process group of ranks, one per thread.
#[derive(Debug)]
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create communicators for `n_ranks` ranks; hand one to each thread.
    pub fn split(n_ranks: usize) -> Vec<ThreadComm> {
        let n_ranks = n_ranks.max(1);
        let shared = Arc::new(Shared {
            n_ranks,
            barrier: Barrier::new(n_ranks),
            reals: Mutex::new(vec![0.0; n_ranks]),
            counts: Mutex::new(vec![0; n_ranks]),
        });
        (0..n_ranks)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

/// Communicator of one rank of a [`ThreadGroup`].
///
/// Each collective writes its contribution, waits for the group, reads, and
/// waits again so slots are not overwritten before every rank has read them.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    fn exchange_counts(&self, value: u64) -> Vec<u64> {
        self.shared.counts()[self.rank] = value;
        self.shared.barrier.wait();
        let all = self.shared.counts().clone();
        self.shared.barrier.wait();
        all
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_ranks(&self) -> usize {
        self.shared.n_ranks
    }

    fn gather_f64(&self, value: f64) -> Option<Vec<f64>> {
        self.shared.reals()[self.rank] = value;
        self.shared.barrier.wait();
        let gathered = self.is_coordinator().then(|| self.shared.reals().clone());
        self.shared.barrier.wait();
        gathered
    }

    fn scatter_u64(&self, values: Option<&[u64]>) -> u64 {
        if self.is_coordinator() {
            let mut slots = self.shared.counts();
            for (i, slot) in slots.iter_mut().enumerate() {
                *slot = values.and_then(|v| v.get(i).copied()).unwrap_or(0);
            }
        }
        self.shared.barrier.wait();
        let value = self.shared.counts()[self.rank];
        self.shared.barrier.wait();
        value
    }

    fn any(&self, flag: bool) -> bool {
        self.exchange_counts(flag as u64).iter().any(|&v| v != 0)
    }

    fn sum_u64(&self, value: u64) -> u64 {
        self.exchange_counts(value).iter().sum()
    }

    fn sum_f64(&self, value: f64) -> f64 {
        self.shared.reals()[self.rank] = value;
        self.shared.barrier.wait();
        let total = self.shared.reals().iter().sum();
        self.shared.barrier.wait();
        total
    }
}
