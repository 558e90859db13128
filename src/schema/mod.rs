//! Schema module - Configuration and data-model types for particle injection.

mod config;
mod injection;
mod scenario;
mod zone;

pub use config::*;
pub use injection::*;
pub use scenario::*;
pub use zone::*;
