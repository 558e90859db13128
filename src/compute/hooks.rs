//! User override hooks and particle relocation.

use super::{Mesh, ParticleRecord};
use crate::schema::InjectionSet;

/// Optional user modifications applied to freshly injected particles.
///
/// `face_ids` holds the injection face of each particle for boundary zones.
pub trait InjectionHooks {
    /// May move particles. Previous positions are restored afterwards and
    /// displaced particles are relocated.
    fn force_coords(
        &mut self,
        _particles: &mut [ParticleRecord],
        _set: &InjectionSet,
        _face_ids: Option<&[usize]>,
        _visc_length: &[f64],
    ) {
    }

    /// May modify any attribute once physical attributes are initialized.
    fn modify_attributes(
        &mut self,
        _particles: &mut [ParticleRecord],
        _set: &InjectionSet,
        _face_ids: Option<&[usize]>,
        _visc_length: &[f64],
    ) {
    }
}

/// No user modification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl InjectionHooks for NoHooks {}

/// Relocation of particles moved by a hook, without integrating any physics.
pub trait ParticleTracker {
    /// Update the host cell of each particle.
    ///
    /// Returns the indices (into `particles`) of particles that could not be
    /// located in the local partition.
    fn relocate(
        &mut self,
        mesh: &dyn Mesh,
        particles: &mut [ParticleRecord],
        visc_length: &[f64],
    ) -> Vec<usize>;
}

/// Tracker placing each particle in the cell containing its position.
#[derive(Debug, Clone, Default)]
pub struct NearestCellTracker {
    /// Number of relocation passes performed.
    pub passes: usize,
}

impl ParticleTracker for NearestCellTracker {
    fn relocate(
        &mut self,
        mesh: &dyn Mesh,
        particles: &mut [ParticleRecord],
        _visc_length: &[f64],
    ) -> Vec<usize> {
        self.passes += 1;
        let mut lost = Vec::new();
        for (i, p) in particles.iter_mut().enumerate() {
            match mesh.locate_cell(p.coords) {
                Some(cell_id) => p.cell_id = cell_id,
                None => lost.push(i),
            }
        }
        lost
    }
}
