//! Injection engine - once-per-step driver of particle injection.
//!
//! For each due zone/set pair: distribute the requested particles over ranks
//! and zone elements, append and initialize them, apply user hooks (with
//! relocation of displaced particles), record inflow events, check
//! admissibility and accumulate flow rates. Counters are committed once at
//! the end of the step.

use std::collections::TryReserveError;
use std::ops::Range;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    AdmissibilityViolation, AttributeContext, Communicator, EventBuffer, FlowRates, FluidState,
    InjectionHooks, LocalInjection, Mesh, ParticleCounter, ParticleRecord, ParticleSet,
    ParticleTracker, RandomStream, StatisticsSink, TrackingEvent, ValidationReport,
    advance_partial_step, check_particles, check_registry, distribute_particles, init_attributes,
    init_particles, is_displaced, particle_face_global_ids, particle_face_ids, place_particles,
};
use crate::schema::{
    ConfigError, EngineConfig, InjectionRegistry, InjectionSet, Zone, ZoneEntry, ZoneKind,
};

/// Time stepping state of the Lagrangian solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    /// Current time step number.
    pub nt_cur: u64,
    /// Time step number at the start of the run (restart point).
    pub nt_prev: u64,
    /// Lagrangian time step duration.
    pub dtp: f64,
}

/// Per-step inputs of the injection.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    /// Fluid time level selector (0: current, 1: previous).
    pub time_id: usize,
    /// Boundary face types (not interpreted by the injection).
    pub boundary_face_types: &'a [i32],
    /// Viscous sublayer thickness per boundary face, forwarded to hooks and
    /// the tracker.
    pub visc_length: &'a [f64],
}

/// External subsystems the injection works with.
pub struct Collaborators<'a> {
    pub mesh: &'a dyn Mesh,
    pub fluid: &'a dyn FluidState,
    pub comm: &'a dyn Communicator,
    pub tracker: &'a mut dyn ParticleTracker,
    pub hooks: &'a mut dyn InjectionHooks,
    pub statistics: &'a mut dyn StatisticsSink,
}

/// Local result of one zone/set injection.
#[derive(Debug, Clone, PartialEq)]
pub struct SetSummary {
    pub location: ZoneKind,
    pub zone_id: usize,
    pub set_id: usize,
    /// Particles kept on this rank.
    pub n_local: usize,
    /// Particles lost during relocation on this rank.
    pub n_failed: usize,
}

/// Result of an injection step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionSummary {
    /// Particles injected on this rank.
    pub n_local: usize,
    /// Particles lost during relocation on this rank.
    pub n_failed: usize,
    /// Statistical weight injected on this rank.
    pub weight: f64,
    /// Particles injected over all ranks.
    pub n_global: u64,
    pub sets: Vec<SetSummary>,
}

/// Outcome of [`InjectionEngine::inject`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The global particle ceiling would be exceeded; nothing was injected.
    Skipped {
        current: u64,
        projected: u64,
        max: u64,
    },
    Injected(InjectionSummary),
}

fn describe_violations(violations: &[AdmissibilityViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("\n  {}", v))
        .collect()
}

/// Fatal injection errors.
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    #[error("Invalid injection parameters:\n{0}")]
    Configuration(ValidationReport),

    #[error("Particle set cannot grow to {requested} particles: {source}")]
    Capacity {
        requested: usize,
        source: TryReserveError,
    },

    #[error(
        "Lagrangian {location} zone {zone_id}, set {set_id}: inadmissible particles{}",
        describe_violations(.violations)
    )]
    Admissibility {
        location: ZoneKind,
        zone_id: usize,
        set_id: usize,
        violations: Vec<AdmissibilityViolation>,
    },

    #[error("Lagrangian {location} zone {zone_id}: element {element} has no weight ({available} available)")]
    MissingWeights {
        location: ZoneKind,
        zone_id: usize,
        element: usize,
        available: usize,
    },

    #[error(
        "Lagrangian {location} zone {zone_id}, set {set_id}: injection profile gave {got} values for {expected} elements"
    )]
    ProfileLength {
        location: ZoneKind,
        zone_id: usize,
        set_id: usize,
        expected: usize,
        got: usize,
    },

    /// Another rank hit a fatal error on this zone/set; the step is aborted
    /// on every rank.
    #[error("Lagrangian {location} zone {zone_id}, set {set_id}: injection failed on another rank")]
    PeerFailure {
        location: ZoneKind,
        zone_id: usize,
        set_id: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Particle injection engine of one rank.
///
/// Owns the local particle set, the random stream, the tracking event buffer
/// and the flow rate accumulators.
#[derive(Debug)]
pub struct InjectionEngine {
    config: EngineConfig,
    rng: RandomStream,
    particles: ParticleSet,
    events: EventBuffer,
    flow_rates: FlowRates,
}

impl InjectionEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, InjectionError> {
        config.validate()?;
        Ok(Self {
            rng: RandomStream::new(config.seed),
            particles: ParticleSet::with_capacity(config.initial_capacity),
            events: EventBuffer::new(0),
            flow_rates: FlowRates::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Mutable particle set, for removal of particles between steps.
    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    /// Flow rates accumulated during the last step.
    pub fn flow_rates(&self) -> &FlowRates {
        &self.flow_rates
    }

    /// Number of random values drawn since creation.
    pub fn random_draws(&self) -> u64 {
        self.rng.draws()
    }

    /// Number of tracking events waiting to be flushed.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Hand buffered tracking events to the statistics layer.
    pub fn flush_events(&mut self, sink: &mut dyn StatisticsSink) {
        self.events.flush(sink);
    }

    /// Inject new particles for the current time step.
    ///
    /// Collective: every rank must call it with the same registry and time
    /// step. Configuration issues of all zones and sets are reported together
    /// before anything is injected. If the global particle ceiling would be
    /// exceeded, the step is skipped for every zone. A fatal error on one rank
    /// makes every rank return an error for the same zone/set.
    pub fn inject(
        &mut self,
        registry: &InjectionRegistry,
        time_step: &TimeStep,
        counter: &mut ParticleCounter,
        inputs: &StepInputs<'_>,
        collab: &mut Collaborators<'_>,
    ) -> Result<StepOutcome, InjectionError> {
        check_registry(registry, &self.config.model).map_err(InjectionError::Configuration)?;

        self.particles.begin_step();
        self.flow_rates.reset(
            registry.n_zones(ZoneKind::BoundaryFaces),
            registry.n_zones(ZoneKind::VolumeCells),
            self.config.model.n_stats(),
        );

        let projected = counter.projected_total(registry.total_requested());
        if projected > self.config.max_global_particles {
            warn!(
                "Injecting particles at time step {} would increase the number of particles \
                 in the domain from {} to {}, exceeding the maximum {}; no particles injected",
                time_step.nt_cur, counter.n_g_total, projected, self.config.max_global_particles
            );
            return Ok(StepOutcome::Skipped {
                current: counter.n_g_total,
                projected,
                max: self.config.max_global_particles,
            });
        }

        let time_level = inputs
            .time_id
            .min(collab.fluid.n_time_levels().saturating_sub(1));

        let mut summary = InjectionSummary::default();
        for kind in [ZoneKind::BoundaryFaces, ZoneKind::VolumeCells] {
            for (zone_index, entry) in registry.zones(kind).iter().enumerate() {
                for set in &entry.sets {
                    if !set.is_due(
                        time_step.nt_cur,
                        time_step.nt_prev,
                        counter.n_g_cumulative_total,
                    ) {
                        continue;
                    }
                    let set_summary = self.inject_set(
                        kind, zone_index, entry, set, time_step.dtp, time_level, inputs, collab,
                    )?;
                    summary.n_local += set_summary.n_local;
                    summary.n_failed += set_summary.n_failed;
                    summary.sets.push(set_summary);
                }
            }
        }
        summary.weight = self.particles.weight_new();

        counter.commit_injection(
            LocalInjection {
                n_new: self.particles.n_part_new() as u64,
                weight_new: self.particles.weight_new(),
                n_failed: summary.n_failed as u64,
            },
            collab.comm,
        );
        summary.n_global = counter.n_g_new;
        collab.statistics.update_flow_rates(&self.flow_rates);

        info!(
            "Time step {}: injected {} particles ({} on rank {}), {} failed, total {}",
            time_step.nt_cur,
            counter.n_g_new,
            summary.n_local,
            collab.comm.rank(),
            counter.n_g_failed,
            counter.n_g_total
        );

        Ok(StepOutcome::Injected(summary))
    }

    #[allow(clippy::too_many_arguments)]
    fn inject_set(
        &mut self,
        kind: ZoneKind,
        zone_index: usize,
        entry: &ZoneEntry,
        set: &InjectionSet,
        dtp: f64,
        time_level: usize,
        inputs: &StepInputs<'_>,
        collab: &mut Collaborators<'_>,
    ) -> Result<SetSummary, InjectionError> {
        let zone = &entry.zone;
        let mesh = collab.mesh;
        let rank = collab.comm.rank();

        let weights = mesh.element_weights(kind);
        let profile = set.profile_values(zone);
        agree(
            collab.comm,
            check_set_inputs(kind, zone, set.set_id, weights, profile.as_deref()),
            kind,
            zone.id,
            set.set_id,
        )?;

        let index = distribute_particles(
            set.n_inject,
            zone,
            weights,
            profile.as_deref(),
            collab.comm,
            &mut self.rng,
        );
        let n_inject = index.last().copied().unwrap_or(0);
        debug!(
            "Lagrangian {} zone {}, set {}: {} of {} particles on rank {}",
            kind, zone.id, set.set_id, n_inject, set.n_inject, rank
        );

        let requested = self.particles.len() + n_inject;
        let appended = self
            .particles
            .append_zeroed(n_inject)
            .map_err(|source| InjectionError::Capacity { requested, source });
        let mut range = agree(collab.comm, appended, kind, zone.id, set.set_id)?;

        place_particles(self.particles.slice_mut(range.clone()), zone, &index, mesh, rank);
        let mut face_ids =
            (kind == ZoneKind::BoundaryFaces).then(|| particle_face_ids(zone, &index));
        let mut face_global_ids =
            (kind == ZoneKind::BoundaryFaces).then(|| particle_face_global_ids(zone, &index));

        init_particles(
            self.particles.slice_mut(range.clone()),
            set,
            face_ids.as_deref(),
            mesh,
            dtp,
            &mut self.rng,
        );

        // Coordinates may be forced by the user, previous positions may not
        let saved = save_locations(self.particles.slice(range.clone()));
        collab.hooks.force_coords(
            self.particles.slice_mut(range.clone()),
            set,
            face_ids.as_deref(),
            inputs.visc_length,
        );
        let particles = self.particles.slice_mut(range.clone());
        for (p, &(cell_id, coords)) in particles.iter_mut().zip(&saved) {
            p.current_to_previous();
            p.cell_id = cell_id;
            p.prev_rank_id = rank;
            p.prev_coords = coords;
        }

        let volumes = mesh.cell_volumes();
        let local_displaced = particles
            .par_iter()
            .any(|p| is_displaced(p, volumes[p.cell_id]));

        let mut n_failed = 0;
        if collab.comm.any(local_displaced) {
            let lost = collab
                .tracker
                .relocate(mesh, particles, inputs.visc_length);
            if !lost.is_empty() {
                n_failed = self.particles.compact_tail(range.start, &lost);
                if let Some(ids) = face_ids.as_mut() {
                    remove_indices(ids, &lost);
                }
                if let Some(ids) = face_global_ids.as_mut() {
                    remove_indices(ids, &lost);
                }
                range = range.start..self.particles.len();
                warn!(
                    "Lagrangian {} zone {}, set {}: {} particles could not be located after \
                     coordinate modification",
                    kind, zone.id, set.set_id, n_failed
                );
            }
        }

        let ctx = AttributeContext {
            model: &self.config.model,
            fluid: collab.fluid,
            time_level,
            dtp,
        };
        init_attributes(
            self.particles.slice_mut(range.clone()),
            set,
            &ctx,
            &mut self.rng,
        );

        let saved = save_locations(self.particles.slice(range.clone()));
        collab.hooks.modify_attributes(
            self.particles.slice_mut(range.clone()),
            set,
            face_ids.as_deref(),
            inputs.visc_length,
        );
        let particles = self.particles.slice_mut(range.clone());
        for (p, &(cell_id, coords)) in particles.iter_mut().zip(&saved) {
            p.cell_id = cell_id;
            p.prev_coords = coords;
        }
        advance_partial_step(particles, dtp);

        if let (Some(ids), Some(global_ids)) = (&face_ids, &face_global_ids)
            && self.config.collect_tracking_events
            && collab.statistics.tracking_events_active()
        {
            self.events.ensure_capacity(2 * mesh.n_b_faces());
            let fresh = self.particles.slice(range.clone());
            for ((p, &face_id), &global_id) in fresh.iter().zip(ids).zip(global_ids) {
                self.events.push(
                    TrackingEvent::inflow(p, face_id, global_id),
                    &mut *collab.statistics,
                );
            }
        }

        let violations = check_particles(
            self.particles.slice(range.clone()),
            range.start,
            &self.config.model,
        );
        let admissible = if violations.is_empty() {
            Ok(())
        } else {
            Err(InjectionError::Admissibility {
                location: kind,
                zone_id: zone.id,
                set_id: set.set_id,
                violations,
            })
        };
        agree(collab.comm, admissible, kind, zone.id, set.set_id)?;

        self.account(kind, zone_index, range.clone());

        Ok(SetSummary {
            location: kind,
            zone_id: zone.id,
            set_id: set.set_id,
            n_local: range.len(),
            n_failed,
        })
    }

    /// Accumulate mass flow rates and injected weight of fresh particles.
    fn account(&mut self, kind: ZoneKind, zone_index: usize, range: Range<usize>) {
        let mut weight = 0.0;
        for p in self.particles.slice(range.clone()) {
            self.flow_rates
                .add(kind, zone_index, p.stat_class, p.stat_weight * p.mass);
            weight += p.stat_weight;
        }
        self.particles.record_new(range.len(), weight);
    }
}

/// Check that the mesh weights and the profile cover every zone element.
fn check_set_inputs(
    kind: ZoneKind,
    zone: &Zone,
    set_id: usize,
    weights: &[f64],
    profile: Option<&[f64]>,
) -> Result<(), InjectionError> {
    if let Some(&element) = zone.elt_ids().iter().find(|&&e| e >= weights.len()) {
        return Err(InjectionError::MissingWeights {
            location: kind,
            zone_id: zone.id,
            element,
            available: weights.len(),
        });
    }
    if let Some(values) = profile
        && values.len() != zone.n_elts()
    {
        return Err(InjectionError::ProfileLength {
            location: kind,
            zone_id: zone.id,
            set_id,
            expected: zone.n_elts(),
            got: values.len(),
        });
    }
    Ok(())
}

/// Make a local fatal outcome collective: if any rank failed, every rank
/// returns an error before reaching the next collective.
fn agree<T>(
    comm: &dyn Communicator,
    local: Result<T, InjectionError>,
    location: ZoneKind,
    zone_id: usize,
    set_id: usize,
) -> Result<T, InjectionError> {
    let any_failed = comm.any(local.is_err());
    match local {
        Ok(_) if any_failed => Err(InjectionError::PeerFailure {
            location,
            zone_id,
            set_id,
        }),
        other => other,
    }
}

fn save_locations(particles: &[ParticleRecord]) -> Vec<(usize, [f64; 3])> {
    particles.iter().map(|p| (p.cell_id, p.coords)).collect()
}

fn remove_indices<T>(values: &mut Vec<T>, removed: &[usize]) {
    let mut is_removed = vec![false; values.len()];
    for &i in removed {
        if let Some(flag) = is_removed.get_mut(i) {
            *flag = true;
        }
    }
    let mut flags = is_removed.into_iter();
    values.retain(|_| !flags.next().unwrap_or(false));
}
