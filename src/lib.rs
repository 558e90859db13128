//! Lagrangian particle injection.
//!
//! Injects new particles into a dispersed-phase simulation at each time
//! step: for every boundary or volume zone with due injection sets, the
//! requested particle count is split across ranks and zone elements by
//! weighted random sampling, particles are positioned and initialized, user
//! hooks may override them, and global counters and flow rates are updated.
//!
//! # Architecture
//!
//! - `schema`: Configuration, zones, injection sets and scenarios
//! - `compute`: Sampling, rank allocation, particle storage and the engine
//!
//! # Example
//!
//! ```rust,no_run
//! use lagrangian_injection::{
//!     compute::{
//!         Collaborators, InjectionEngine, MeshData, NearestCellTracker, NoHooks,
//!         NullStatistics, ParticleCounter, SerialComm, StepInputs, TimeStep, UniformFluid,
//!     },
//!     schema::Scenario,
//! };
//!
//! let scenario = Scenario::default();
//! let mesh = MeshData::from_box(&scenario.mesh);
//! let fluid = UniformFluid::default();
//! let mut engine = InjectionEngine::new(scenario.config.clone()).unwrap();
//! let mut counter = ParticleCounter::default();
//! let mut tracker = NearestCellTracker::default();
//! let mut collab = Collaborators {
//!     mesh: &mesh,
//!     fluid: &fluid,
//!     comm: &SerialComm,
//!     tracker: &mut tracker,
//!     hooks: &mut NoHooks,
//!     statistics: &mut NullStatistics,
//! };
//! let inputs = StepInputs { time_id: 0, boundary_face_types: &[], visc_length: &[] };
//! let time_step = TimeStep { nt_cur: 1, nt_prev: 0, dtp: scenario.dtp };
//!
//! engine
//!     .inject(&scenario.registry, &time_step, &mut counter, &inputs, &mut collab)
//!     .unwrap();
//! println!("Particles in the domain: {}", counter.n_g_total);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{InjectionEngine, InjectionError, ParticleCounter, StepOutcome};
pub use schema::{EngineConfig, InjectionRegistry, InjectionSet, Scenario};
