//! Compute module - Sampling, distribution and initialization of injected particles.

mod allocator;
mod comm;
mod counter;
mod distributor;
mod engine;
mod events;
mod hooks;
mod initializer;
mod mesh;
mod particle;
mod random;
mod sampler;
mod validation;

pub use allocator::*;
pub use comm::*;
pub use counter::*;
pub use distributor::*;
pub use engine::*;
pub use events::*;
pub use hooks::*;
pub use initializer::*;
pub use mesh::*;
pub use particle::*;
pub use random::*;
pub use sampler::*;
pub use validation::*;
