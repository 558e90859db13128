//! Particle records and the growable particle set.

use std::collections::TryReserveError;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Particle state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticleFlags(u32);

impl ParticleFlags {
    /// Particle is marked for removal.
    pub const TO_DELETE: Self = Self(1 << 0);
    /// Particle does not move.
    pub const FIXED: Self = Self(1 << 1);
    /// Particle is deposited on a wall.
    pub const DEPOSITED: Self = Self(1 << 2);
    /// Deposited particle rolls along the wall.
    pub const ROLLING: Self = Self(1 << 3);
    /// Particle motion is imposed.
    pub const IMPOSED_MOTION: Self = Self(1 << 4);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ParticleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Rebound bookkeeping for wall interaction models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReboundState {
    /// No rebound since injection.
    #[default]
    None,
    /// Number of time steps elapsed since the last rebound.
    StepsSince(u32),
}

/// Layered coal attributes (one entry per layer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoalLayers {
    pub water_mass: Vec<f64>,
    pub coal_mass: Vec<f64>,
    pub coke_mass: Vec<f64>,
    pub coal_density: Vec<f64>,
    pub shrinking_diameter: f64,
    pub initial_diameter: f64,
}

impl CoalLayers {
    pub fn new(n_layers: usize) -> Self {
        Self {
            water_mass: vec![0.0; n_layers],
            coal_mass: vec![0.0; n_layers],
            coke_mass: vec![0.0; n_layers],
            coal_density: vec![0.0; n_layers],
            shrinking_diameter: 0.0,
            initial_diameter: 0.0,
        }
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.coal_mass.len()
    }
}

/// State of one computational particle.
///
/// The default value is the zero-filled record every fresh particle starts
/// from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    /// Host cell.
    pub cell_id: usize,
    pub rank_id: usize,
    pub coords: [f64; 3],
    pub velocity: [f64; 3],
    /// Fluid velocity seen by the particle.
    pub velocity_seen: [f64; 3],

    pub prev_cell_id: usize,
    pub prev_rank_id: usize,
    pub prev_coords: [f64; 3],
    pub prev_velocity: [f64; 3],

    pub residence_time: f64,
    /// Uniform value drawn once at injection.
    pub random_value: f64,
    pub flags: ParticleFlags,
    pub rebound: ReboundState,
    pub truncated: f64,

    pub diameter: f64,
    pub mass: f64,
    pub density: f64,
    pub stat_weight: f64,
    pub stat_class: usize,

    pub cp: f64,
    pub temperature: f64,
    /// Fluid temperature seen by the particle.
    pub temperature_seen: f64,
    pub emissivity: f64,

    pub aggregate_class_id: i32,
    pub aggregate_fractal_dim: f64,
    pub fouling_index: f64,

    pub radii: [f64; 3],
    pub orientation: [f64; 3],
    pub angular_velocity: [f64; 3],
    pub shape_param: [f64; 4],
    pub euler: [f64; 4],

    /// Coal number (1-based, 0 when not a coal particle).
    pub coal_number: usize,
    pub coal: Option<CoalLayers>,
}

impl ParticleRecord {
    /// Copy the current state into the previous-step state.
    pub fn current_to_previous(&mut self) {
        self.prev_cell_id = self.cell_id;
        self.prev_rank_id = self.rank_id;
        self.prev_coords = self.coords;
        self.prev_velocity = self.velocity;
    }
}

/// Growable array of particle records.
///
/// Indices are stable within a step: growth never moves a record to another
/// index, and only [`compact_tail`](Self::compact_tail) and
/// [`retain`](Self::retain) remove records.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    particles: Vec<ParticleRecord>,
    n_part_new: usize,
    weight_new: f64,
}

impl ParticleSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            n_part_new: 0,
            weight_new: 0.0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    /// Particles injected during the current step.
    #[inline]
    pub fn n_part_new(&self) -> usize {
        self.n_part_new
    }

    /// Statistical weight injected during the current step.
    #[inline]
    pub fn weight_new(&self) -> f64 {
        self.weight_new
    }

    /// Reset the per-step injection counters.
    pub fn begin_step(&mut self) {
        self.n_part_new = 0;
        self.weight_new = 0.0;
    }

    /// Account for particles injected during the current step.
    pub fn record_new(&mut self, n: usize, weight: f64) {
        self.n_part_new += n;
        self.weight_new += weight;
    }

    /// Grow the backing store to hold at least `new_size` records, doubling
    /// the capacity when growth is needed.
    pub fn ensure_capacity(&mut self, new_size: usize) -> Result<(), TryReserveError> {
        let capacity = self.particles.capacity();
        if new_size <= capacity {
            return Ok(());
        }
        let target = new_size.max(capacity.saturating_mul(2));
        self.particles
            .try_reserve_exact(target - self.particles.len())
    }

    /// Reset one record to the zero-filled default.
    pub fn zero_fill(&mut self, index: usize) {
        self.particles[index] = ParticleRecord::default();
    }

    /// Append `n` zero-filled records, returning their index range.
    pub fn append_zeroed(&mut self, n: usize) -> Result<Range<usize>, TryReserveError> {
        let start = self.particles.len();
        self.ensure_capacity(start + n)?;
        self.particles.resize_with(start + n, ParticleRecord::default);
        Ok(start..start + n)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ParticleRecord> {
        self.particles.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ParticleRecord> {
        self.particles.get_mut(index)
    }

    #[inline]
    pub fn slice(&self, range: Range<usize>) -> &[ParticleRecord] {
        &self.particles[range]
    }

    #[inline]
    pub fn slice_mut(&mut self, range: Range<usize>) -> &mut [ParticleRecord] {
        &mut self.particles[range]
    }

    #[inline]
    pub fn as_slice(&self) -> &[ParticleRecord] {
        &self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticleRecord> {
        self.particles.iter()
    }

    /// Remove particles of the tail starting at `start`, given their indices
    /// relative to `start`. Older particles keep their indices.
    ///
    /// Returns the number of particles removed.
    pub fn compact_tail(&mut self, start: usize, lost: &[usize]) -> usize {
        if lost.is_empty() || start >= self.particles.len() {
            return 0;
        }
        let mut is_lost = vec![false; self.particles.len() - start];
        for &i in lost {
            if let Some(flag) = is_lost.get_mut(i) {
                *flag = true;
            }
        }
        let before = self.particles.len();
        let tail = self.particles.split_off(start);
        self.particles.extend(
            tail.into_iter()
                .zip(is_lost)
                .filter_map(|(p, lost)| (!lost).then_some(p)),
        );
        before - self.particles.len()
    }

    /// Keep only particles matching the predicate (between steps).
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&ParticleRecord) -> bool,
    {
        self.particles.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = ParticleFlags::empty();
        assert!(flags.is_empty());
        flags.insert(ParticleFlags::DEPOSITED | ParticleFlags::ROLLING);
        assert!(flags.contains(ParticleFlags::DEPOSITED));
        flags.remove(ParticleFlags::ROLLING);
        assert!(!flags.contains(ParticleFlags::ROLLING));
        assert_eq!(flags.bits(), 1 << 2);
    }

    #[test]
    fn test_append_preserves_indices() {
        let mut set = ParticleSet::with_capacity(2);
        let r = set.append_zeroed(2).unwrap();
        assert_eq!(r, 0..2);
        set.get_mut(1).unwrap().diameter = 3.0;

        let r = set.append_zeroed(5).unwrap();
        assert_eq!(r, 2..7);
        assert!(set.capacity() >= 7);
        assert_eq!(set.get(1).unwrap().diameter, 3.0);
        assert_eq!(set.get(6).unwrap(), &ParticleRecord::default());
    }

    #[test]
    fn test_capacity_doubles() {
        let mut set = ParticleSet::with_capacity(0);
        set.append_zeroed(4).unwrap();
        let cap = set.capacity();
        set.append_zeroed(1).unwrap();
        assert!(set.capacity() >= 2 * cap);
    }

    #[test]
    fn test_zero_fill() {
        let mut set = ParticleSet::default();
        set.append_zeroed(1).unwrap();
        set.get_mut(0).unwrap().mass = 1.0;
        set.zero_fill(0);
        assert_eq!(set.get(0).unwrap().mass, 0.0);
    }

    #[test]
    fn test_compact_tail() {
        let mut set = ParticleSet::default();
        set.append_zeroed(6).unwrap();
        for (i, p) in set.slice_mut(0..6).iter_mut().enumerate() {
            p.mass = i as f64;
        }
        // Tail starts at 2; drop relative 0 and 2 (absolute 2 and 4)
        let removed = set.compact_tail(2, &[0, 2, 99]);
        assert_eq!(removed, 2);
        let masses: Vec<f64> = set.iter().map(|p| p.mass).collect();
        assert_eq!(masses, vec![0.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_step_counters() {
        let mut set = ParticleSet::default();
        set.record_new(3, 1.5);
        set.record_new(2, 0.5);
        assert_eq!(set.n_part_new(), 5);
        assert_eq!(set.weight_new(), 2.0);
        set.begin_step();
        assert_eq!(set.n_part_new(), 0);

        set.append_zeroed(3).unwrap();
        set.get_mut(1).unwrap().flags.insert(ParticleFlags::TO_DELETE);
        set.retain(|p| !p.flags.contains(ParticleFlags::TO_DELETE));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_current_to_previous() {
        let mut p = ParticleRecord {
            cell_id: 4,
            coords: [1.0, 2.0, 3.0],
            ..Default::default()
        };
        p.current_to_previous();
        assert_eq!(p.prev_cell_id, 4);
        assert_eq!(p.prev_coords, [1.0, 2.0, 3.0]);
    }
}
