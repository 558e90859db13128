//! Scenario description used by the command-line driver.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    BoundaryNature, ConfigError, EngineConfig, InjectionRegistry, InjectionSet, VelocityProfile,
    Zone, ZoneEntry, ZoneKind,
};

/// Side of a box mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxSide {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl BoxSide {
    pub const ALL: [BoxSide; 6] = [
        BoxSide::XMin,
        BoxSide::XMax,
        BoxSide::YMin,
        BoxSide::YMax,
        BoxSide::ZMin,
        BoxSide::ZMax,
    ];

    /// Axis normal to the side.
    #[inline]
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// Whether the side lies at the upper end of its axis.
    #[inline]
    pub fn is_max(self) -> bool {
        self as usize % 2 == 1
    }
}

/// Structured box mesh made of `n[0] x n[1] x n[2]` hexahedral cells.
///
/// Cells are numbered x-fastest. Boundary faces are numbered side by side in
/// [`BoxSide::ALL`] order, each side following the same fastest-first order
/// over its two tangential axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxMesh {
    pub n: [usize; 3],
    pub lengths: [f64; 3],
}

impl Default for BoxMesh {
    fn default() -> Self {
        Self {
            n: [10, 10, 10],
            lengths: [1.0, 1.0, 1.0],
        }
    }
}

impl BoxMesh {
    pub fn n_cells(&self) -> usize {
        self.n[0] * self.n[1] * self.n[2]
    }

    /// Tangential axes of a side, fastest first.
    pub fn tangential_axes(side: BoxSide) -> (usize, usize) {
        match side.axis() {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }

    /// Number of boundary faces on one side.
    pub fn n_side_faces(&self, side: BoxSide) -> usize {
        let (a, b) = Self::tangential_axes(side);
        self.n[a] * self.n[b]
    }

    pub fn n_b_faces(&self) -> usize {
        BoxSide::ALL.iter().map(|&s| self.n_side_faces(s)).sum()
    }

    /// Id of the first boundary face of a side.
    pub fn side_offset(&self, side: BoxSide) -> usize {
        BoxSide::ALL
            .iter()
            .take_while(|&&s| s != side)
            .map(|&s| self.n_side_faces(s))
            .sum()
    }

    /// Boundary face ids of one side.
    pub fn side_faces(&self, side: BoxSide) -> Vec<usize> {
        let start = self.side_offset(side);
        (start..start + self.n_side_faces(side)).collect()
    }

    /// Ids of all cells.
    pub fn all_cells(&self) -> Vec<usize> {
        (0..self.n_cells()).collect()
    }
}

fn default_steps() -> u64 {
    10
}

fn default_dtp() -> f64 {
    1.0e-3
}

/// Complete injection scenario: engine configuration, mesh and registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub mesh: BoxMesh,
    #[serde(default)]
    pub registry: InjectionRegistry,
    /// Number of time steps to run.
    #[serde(default = "default_steps")]
    pub steps: u64,
    /// Lagrangian time step duration.
    #[serde(default = "default_dtp")]
    pub dtp: f64,
    /// Uniform carrier fluid velocity.
    #[serde(default)]
    pub fluid_velocity: [f64; 3],
    /// Uniform carrier fluid temperature (Kelvin).
    #[serde(default = "default_fluid_temperature")]
    pub fluid_temperature: f64,
}

fn default_fluid_temperature() -> f64 {
    293.15
}

impl Default for Scenario {
    fn default() -> Self {
        let mesh = BoxMesh::default();
        let inlet = Zone::new(
            0,
            "inlet",
            ZoneKind::BoundaryFaces,
            mesh.side_faces(BoxSide::XMin),
        );
        let domain = Zone::new(0, "domain", ZoneKind::VolumeCells, mesh.all_cells());

        let registry = InjectionRegistry {
            boundary: vec![
                ZoneEntry::new(inlet)
                    .with_nature(BoundaryNature::Inlet)
                    .with_set(InjectionSet {
                        n_inject: 100,
                        velocity: VelocityProfile::ImposedNorm { magnitude: 1.0 },
                        ..Default::default()
                    }),
            ],
            volume: vec![ZoneEntry::new(domain).with_set(InjectionSet {
                n_inject: 50,
                injection_frequency: 0,
                velocity: VelocityProfile::ImposedComponents {
                    components: [0.0, 0.0, 0.0],
                },
                ..Default::default()
            })],
        };

        Self {
            config: EngineConfig::default(),
            mesh,
            registry,
            steps: default_steps(),
            dtp: default_dtp(),
            fluid_velocity: [1.0, 0.0, 0.0],
            fluid_temperature: default_fluid_temperature(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a JSON file, validating its engine configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&text)?;
        scenario.config.validate()?;
        Ok(scenario)
    }
}
