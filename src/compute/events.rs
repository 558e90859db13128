//! Tracking events and injection statistics handed to the statistics layer.

use serde::{Deserialize, Serialize};

use super::ParticleRecord;
use crate::schema::ZoneKind;

/// Boundary interaction flags of a tracking event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFlags(u32);

impl EventFlags {
    pub const INFLOW: Self = Self(1 << 0);
    pub const OUTFLOW: Self = Self(1 << 1);
    pub const REBOUND: Self = Self(1 << 2);
    pub const DEPOSITED: Self = Self(1 << 3);
    pub const RESUSPENDED: Self = Self(1 << 4);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// Snapshot of a particle interacting with a boundary face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub particle: ParticleRecord,
    /// Local boundary face id.
    pub face_id: usize,
    /// Global numbering of the face, as given by its zone.
    pub face_global_id: u64,
    pub flags: EventFlags,
}

impl TrackingEvent {
    /// Inflow event for a particle injected through a boundary face.
    pub fn inflow(particle: &ParticleRecord, face_id: usize, face_global_id: u64) -> Self {
        let mut flags = EventFlags::empty();
        flags.insert(EventFlags::INFLOW);
        Self {
            particle: particle.clone(),
            face_id,
            face_global_id,
            flags,
        }
    }
}

/// Mass flow rate accumulators per location, zone and statistical class.
///
/// Slot 0 of each zone holds all classes; slot `c` holds class `c`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRates {
    n_stats: usize,
    boundary: Vec<f64>,
    volume: Vec<f64>,
}

impl FlowRates {
    pub fn new(n_boundary_zones: usize, n_volume_zones: usize, n_stats: usize) -> Self {
        let n_stats = n_stats.max(1);
        Self {
            n_stats,
            boundary: vec![0.0; n_boundary_zones * n_stats],
            volume: vec![0.0; n_volume_zones * n_stats],
        }
    }

    /// Resize for the given zone counts and zero every accumulator.
    pub fn reset(&mut self, n_boundary_zones: usize, n_volume_zones: usize, n_stats: usize) {
        *self = Self::new(n_boundary_zones, n_volume_zones, n_stats);
    }

    #[inline]
    pub fn n_stats(&self) -> usize {
        self.n_stats
    }

    fn slots(&self, kind: ZoneKind) -> &[f64] {
        match kind {
            ZoneKind::BoundaryFaces => &self.boundary,
            ZoneKind::VolumeCells => &self.volume,
        }
    }

    fn slots_mut(&mut self, kind: ZoneKind) -> &mut [f64] {
        match kind {
            ZoneKind::BoundaryFaces => &mut self.boundary,
            ZoneKind::VolumeCells => &mut self.volume,
        }
    }

    /// Add a particle's mass flow to its zone and, if classes are active and
    /// `class` is a valid class, to the class slot.
    pub fn add(&mut self, kind: ZoneKind, zone_id: usize, class: usize, value: f64) {
        let n_stats = self.n_stats;
        let slots = self.slots_mut(kind);
        slots[zone_id * n_stats] += value;
        if class > 0 && class < n_stats {
            slots[zone_id * n_stats + class] += value;
        }
    }

    /// Accumulated flow of one zone and class (class 0 = all classes).
    pub fn get(&self, kind: ZoneKind, zone_id: usize, class: usize) -> f64 {
        self.slots(kind)
            .get(zone_id * self.n_stats + class)
            .copied()
            .unwrap_or(0.0)
    }

    /// Zone flows of a location (all classes).
    pub fn zone_totals(&self, kind: ZoneKind) -> Vec<f64> {
        self.slots(kind)
            .iter()
            .step_by(self.n_stats)
            .copied()
            .collect()
    }
}

/// Statistics collaborator receiving tracking events and flow rates.
pub trait StatisticsSink {
    /// Whether tracking events are collected.
    fn tracking_events_active(&self) -> bool;

    /// Consume a batch of tracking events.
    fn update_events(&mut self, events: &[TrackingEvent]);

    /// Receive the flow rates accumulated during an injection step.
    fn update_flow_rates(&mut self, _rates: &FlowRates) {}
}

/// Sink ignoring everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatistics;

impl StatisticsSink for NullStatistics {
    fn tracking_events_active(&self) -> bool {
        false
    }

    fn update_events(&mut self, _events: &[TrackingEvent]) {}
}

/// Sink keeping every event it receives in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<TrackingEvent>,
    /// Number of batches received.
    pub batches: usize,
    pub last_flow_rates: Option<FlowRates>,
}

impl StatisticsSink for EventLog {
    fn tracking_events_active(&self) -> bool {
        true
    }

    fn update_events(&mut self, events: &[TrackingEvent]) {
        self.batches += 1;
        self.events.extend_from_slice(events);
    }

    fn update_flow_rates(&mut self, rates: &FlowRates) {
        self.last_flow_rates = Some(rates.clone());
    }
}

/// Bounded event buffer flushed to a sink when full.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Vec<TrackingEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow the buffer capacity to at least `min_capacity`.
    pub fn ensure_capacity(&mut self, min_capacity: usize) {
        if self.capacity < min_capacity {
            self.capacity = min_capacity;
            self.events
                .reserve(min_capacity.saturating_sub(self.events.len()));
        }
    }

    /// Append an event, flushing first if the buffer is full.
    pub fn push(&mut self, event: TrackingEvent, sink: &mut dyn StatisticsSink) {
        if self.events.len() >= self.capacity {
            self.flush(sink);
        }
        self.events.push(event);
    }

    /// Hand all buffered events to the sink.
    pub fn flush(&mut self, sink: &mut dyn StatisticsSink) {
        if !self.events.is_empty() {
            sink.update_events(&self.events);
            self.events.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_flushes_when_full() {
        let mut buffer = EventBuffer::new(3);
        let mut sink = EventLog::default();
        let p = ParticleRecord::default();

        for face in 0..7 {
            buffer.push(TrackingEvent::inflow(&p, face, face as u64), &mut sink);
        }
        assert_eq!(sink.batches, 2);
        assert_eq!(sink.events.len(), 6);
        assert_eq!(buffer.len(), 1);

        buffer.flush(&mut sink);
        let faces: Vec<usize> = sink.events.iter().map(|e| e.face_id).collect();
        assert_eq!(faces, (0..7).collect::<Vec<_>>());
        assert!(sink.events.iter().all(|e| e.flags.contains(EventFlags::INFLOW)));
    }

    #[test]
    fn test_ensure_capacity() {
        let mut buffer = EventBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.ensure_capacity(10);
        assert_eq!(buffer.capacity(), 10);
        buffer.ensure_capacity(4);
        assert_eq!(buffer.capacity(), 10);
    }

    #[test]
    fn test_flow_rates() {
        let mut rates = FlowRates::new(2, 1, 3);
        rates.add(ZoneKind::BoundaryFaces, 1, 2, 0.5);
        rates.add(ZoneKind::BoundaryFaces, 1, 0, 0.25);
        rates.add(ZoneKind::BoundaryFaces, 1, 7, 1.0);
        rates.add(ZoneKind::VolumeCells, 0, 1, 2.0);

        assert_eq!(rates.get(ZoneKind::BoundaryFaces, 1, 0), 1.75);
        assert_eq!(rates.get(ZoneKind::BoundaryFaces, 1, 2), 0.5);
        assert_eq!(rates.get(ZoneKind::VolumeCells, 0, 1), 2.0);
        assert_eq!(rates.zone_totals(ZoneKind::BoundaryFaces), vec![0.0, 1.75]);

        rates.reset(2, 1, 3);
        assert_eq!(rates.get(ZoneKind::BoundaryFaces, 1, 0), 0.0);
    }
}
