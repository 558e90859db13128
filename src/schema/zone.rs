//! Injection zones and the zone/set registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfigError, InjectionSet};

/// Mesh location of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Boundary faces (weights are face surfaces).
    #[default]
    BoundaryFaces,
    /// Volume cells (weights are cell volumes).
    VolumeCells,
}

impl ZoneKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::BoundaryFaces => "boundary",
            Self::VolumeCells => "volume",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Particle/boundary interaction nature of a boundary zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryNature {
    #[default]
    Undefined,
    Symmetry,
    Inlet,
    Outlet,
    Rebound,
    Deposition1,
    Deposition2,
    DepositionDlvo,
    Fouling,
    User,
}

/// Named subset of mesh elements eligible for injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: usize,
    pub name: String,
    pub kind: ZoneKind,
    /// Local element ids (faces or cells).
    elt_ids: Vec<usize>,
    /// Optional global numbering of the zone elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global_ids: Option<Vec<u64>>,
}

impl Zone {
    pub fn new(id: usize, name: impl Into<String>, kind: ZoneKind, elt_ids: Vec<usize>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            elt_ids,
            global_ids: None,
        }
    }

    /// Attach a global numbering, one id per local element.
    pub fn with_global_ids(mut self, global_ids: Vec<u64>) -> Result<Self, ConfigError> {
        if global_ids.len() != self.elt_ids.len() {
            return Err(ConfigError::GlobalIdCount {
                zone_id: self.id,
                expected: self.elt_ids.len(),
                got: global_ids.len(),
            });
        }
        self.global_ids = Some(global_ids);
        Ok(self)
    }

    #[inline]
    pub fn n_elts(&self) -> usize {
        self.elt_ids.len()
    }

    #[inline]
    pub fn elt_ids(&self) -> &[usize] {
        &self.elt_ids
    }

    /// Global id of the i-th zone element.
    ///
    /// Falls back to the local element id when the zone carries no global
    /// numbering (or a numbering too short for `i`).
    pub fn global_id(&self, i: usize) -> Option<u64> {
        let local = *self.elt_ids.get(i)?;
        let global = self
            .global_ids
            .as_ref()
            .and_then(|ids| ids.get(i))
            .copied();
        Some(global.unwrap_or(local as u64))
    }
}

/// A zone together with its injection sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub zone: Zone,
    /// Boundary interaction (ignored for volume zones).
    #[serde(default)]
    pub nature: BoundaryNature,
    #[serde(default)]
    pub sets: Vec<InjectionSet>,
}

impl ZoneEntry {
    pub fn new(zone: Zone) -> Self {
        Self {
            zone,
            nature: BoundaryNature::Undefined,
            sets: Vec::new(),
        }
    }

    pub fn with_nature(mut self, nature: BoundaryNature) -> Self {
        self.nature = nature;
        self
    }

    /// Add a set, assigning its zone id, set id and location from this entry.
    pub fn with_set(mut self, mut set: InjectionSet) -> Self {
        set.zone_id = self.zone.id;
        set.set_id = self.sets.len();
        set.location = self.zone.kind;
        self.sets.push(set);
        self
    }
}

/// Boundary and volume injection conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionRegistry {
    #[serde(default)]
    pub boundary: Vec<ZoneEntry>,
    #[serde(default)]
    pub volume: Vec<ZoneEntry>,
}

impl InjectionRegistry {
    /// Zone entries of a given location.
    pub fn zones(&self, kind: ZoneKind) -> &[ZoneEntry] {
        match kind {
            ZoneKind::BoundaryFaces => &self.boundary,
            ZoneKind::VolumeCells => &self.volume,
        }
    }

    /// Number of zones of a given location.
    pub fn n_zones(&self, kind: ZoneKind) -> usize {
        self.zones(kind).len()
    }

    /// All injection sets, boundary zones first.
    pub fn sets(&self) -> impl Iterator<Item = (ZoneKind, &ZoneEntry, &InjectionSet)> {
        [ZoneKind::BoundaryFaces, ZoneKind::VolumeCells]
            .into_iter()
            .flat_map(move |kind| {
                self.zones(kind)
                    .iter()
                    .flat_map(move |entry| entry.sets.iter().map(move |set| (kind, entry, set)))
            })
    }

    /// Sum of requested global counts over all sets.
    pub fn total_requested(&self) -> u64 {
        self.sets()
            .fold(0u64, |acc, (_, _, set)| acc.saturating_add(set.n_inject))
    }
}
