//! Configuration types for the injection engine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_max_global_particles() -> u64 {
    u64::MAX
}

fn default_initial_capacity() -> usize {
    1024
}

fn default_seed() -> u64 {
    0x5eed_1a9e
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed of the process-wide uniform random stream.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Ceiling on the global number of particles in the domain.
    #[serde(default = "default_max_global_particles")]
    pub max_global_particles: u64,
    /// Whether boundary injections are logged as tracking events.
    #[serde(default)]
    pub collect_tracking_events: bool,
    /// Initial capacity of the particle set.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Lagrangian model options.
    #[serde(default)]
    pub model: LagrangianModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_global_particles: default_max_global_particles(),
            collect_tracking_events: false,
            initial_capacity: default_initial_capacity(),
            model: LagrangianModel::default(),
        }
    }
}

/// Physical model carried by the particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhysicalModel {
    /// Inert particles.
    #[default]
    None,
    /// Heat transfer (temperature, diameter, mass may be solved).
    Heat,
    /// Pulverized coal combustion.
    Coal,
}

/// Particle shape model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeModel {
    #[default]
    Sphere,
    /// Spheroids following Jeffery's equations.
    SpheroidJeffery,
}

/// Composition of one coal, as defined by the combustion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoalComposition {
    /// Initial coal density.
    pub density: f64,
    /// Coal specific heat.
    pub cp: f64,
    /// Water mass fraction.
    pub water_fraction: f64,
    /// Ash mass fraction.
    pub ash_fraction: f64,
}

/// Lagrangian model options relevant to injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagrangianModel {
    #[serde(default)]
    pub physical_model: PhysicalModel,
    /// Number of statistical classes (0 = none).
    #[serde(default)]
    pub n_stat_classes: usize,
    #[serde(default)]
    pub agglomeration: bool,
    #[serde(default)]
    pub shape: ShapeModel,
    /// Coal particle fouling on boundaries.
    #[serde(default)]
    pub fouling: bool,
    #[serde(default)]
    pub solve_temperature: bool,
    #[serde(default)]
    pub solve_temperature_seen: bool,
    #[serde(default)]
    pub solve_diameter: bool,
    #[serde(default)]
    pub solve_mass: bool,
    /// Radiative coupling with the carrier phase.
    #[serde(default)]
    pub radiative_coupling: bool,
    /// Number of layers of coal particles.
    #[serde(default = "default_coal_layers")]
    pub n_coal_layers: usize,
    /// Coal table, indexed by `coal_number - 1`.
    #[serde(default)]
    pub coals: Vec<CoalComposition>,
}

fn default_coal_layers() -> usize {
    1
}

impl Default for LagrangianModel {
    fn default() -> Self {
        Self {
            physical_model: PhysicalModel::None,
            n_stat_classes: 0,
            agglomeration: false,
            shape: ShapeModel::Sphere,
            fouling: false,
            solve_temperature: false,
            solve_temperature_seen: false,
            solve_diameter: false,
            solve_mass: false,
            radiative_coupling: false,
            n_coal_layers: default_coal_layers(),
            coals: Vec::new(),
        }
    }
}

impl LagrangianModel {
    /// Whether the heat model solves a particle temperature.
    #[inline]
    pub fn heat_with_temperature(&self) -> bool {
        self.physical_model == PhysicalModel::Heat
            && (self.solve_temperature || self.solve_temperature_seen)
    }

    /// Whether particles carry a specific heat attribute.
    #[inline]
    pub fn has_cp(&self) -> bool {
        self.heat_with_temperature() || self.physical_model == PhysicalModel::Coal
    }

    /// Whether particles carry layered coal attributes.
    #[inline]
    pub fn has_coal(&self) -> bool {
        self.physical_model == PhysicalModel::Coal
    }

    /// Number of flow-rate slots per zone (all classes + one per class).
    #[inline]
    pub fn n_stats(&self) -> usize {
        self.n_stat_classes + 1
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_global_particles == 0 {
            return Err(ConfigError::InvalidParticleCeiling);
        }
        let model = &self.model;
        if model.has_coal() {
            if model.coals.is_empty() {
                return Err(ConfigError::MissingCoalTable);
            }
            if model.n_coal_layers == 0 {
                return Err(ConfigError::InvalidCoalLayers);
            }
        }
        if model.fouling && !model.has_coal() {
            return Err(ConfigError::FoulingWithoutCoal);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Global particle ceiling must be non-zero")]
    InvalidParticleCeiling,
    #[error("Coal model requires at least one coal composition")]
    MissingCoalTable,
    #[error("Coal model requires at least one particle layer")]
    InvalidCoalLayers,
    #[error("Fouling is only available with the coal model")]
    FoulingWithoutCoal,
    #[error("Zone {zone_id}: {got} global ids given for {expected} elements")]
    GlobalIdCount {
        zone_id: usize,
        expected: usize,
        got: usize,
    },
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}
