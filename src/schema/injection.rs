//! Injection set records: one particle "recipe" per zone and set.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Zone, ZoneKind};

/// Strategy computing per-element injection profile values for a zone.
///
/// The returned values multiply the geometric element weights, so a profile
/// of all ones leaves the distribution unchanged.
pub trait InjectionProfile: fmt::Debug + Send + Sync {
    /// Compute one profile value per element of `elements` (local ids).
    fn compute(&self, zone: &Zone, elements: &[usize]) -> Vec<f64>;
}

/// Constant profile (the default when no profile is attached).
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformProfile;

impl InjectionProfile for UniformProfile {
    fn compute(&self, _zone: &Zone, elements: &[usize]) -> Vec<f64> {
        vec![1.0; elements.len()]
    }
}

/// Velocity condition of injected particles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VelocityProfile {
    /// Take the fluid velocity at the particle location.
    FluidValue,
    /// Impose a magnitude along the inward face normal (boundary zones only).
    ImposedNorm { magnitude: f64 },
    /// Impose explicit velocity components.
    ImposedComponents { components: [f64; 3] },
}

impl Default for VelocityProfile {
    fn default() -> Self {
        Self::FluidValue
    }
}

/// Temperature condition of injected particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureProfile {
    /// Temperature seen by the particle (fluid temperature).
    #[default]
    Seen,
    /// Imposed particle temperature.
    Imposed,
}

/// Injection parameters for a given zone and particle set.
///
/// Temperatures are absolute (Kelvin).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionSet {
    /// Associated zone id.
    pub zone_id: usize,
    /// Set id within the zone.
    pub set_id: usize,
    /// Mesh location of the zone.
    pub location: ZoneKind,
    /// Global number of particles injected at a time.
    pub n_inject: u64,
    /// Injection period in time steps (<= 0: first step only).
    pub injection_frequency: i64,
    /// Optional injection profile.
    #[serde(skip)]
    pub profile: Option<Arc<dyn InjectionProfile>>,
    pub velocity: VelocityProfile,
    pub temperature_profile: TemperatureProfile,
    pub temperature: f64,
    pub diameter: f64,
    pub diameter_variance: f64,
    pub density: f64,
    /// Specific heat.
    pub cp: f64,
    pub emissivity: f64,
    /// Statistical weight (used when `flow_rate` is not positive).
    pub stat_weight: f64,
    /// Mass flow rate.
    pub flow_rate: f64,
    /// Statistical class.
    pub cluster: usize,
    pub aggregate_class_id: i32,
    pub aggregate_fractal_dim: f64,
    pub fouling_index: f64,
    /// Coal number (1-based) for the coal model.
    pub coal_number: usize,
    /// Ellipsoid radii.
    pub radii: [f64; 3],
    pub orientation: [f64; 3],
    pub angular_velocity: [f64; 3],
    pub shape_param: [f64; 4],
    /// Euler parameters.
    pub euler: [f64; 4],
}

impl Default for InjectionSet {
    fn default() -> Self {
        Self {
            zone_id: 0,
            set_id: 0,
            location: ZoneKind::BoundaryFaces,
            n_inject: 0,
            injection_frequency: 1,
            profile: None,
            velocity: VelocityProfile::FluidValue,
            temperature_profile: TemperatureProfile::Seen,
            temperature: 293.15,
            diameter: 1.0e-5,
            diameter_variance: 0.0,
            density: 2500.0,
            cp: 1400.0,
            emissivity: 1.0,
            stat_weight: 1.0,
            flow_rate: 0.0,
            cluster: 0,
            aggregate_class_id: 1,
            aggregate_fractal_dim: 3.0,
            fouling_index: 0.0,
            coal_number: 1,
            radii: [0.0; 3],
            orientation: [1.0, 0.0, 0.0],
            angular_velocity: [0.0; 3],
            shape_param: [0.0; 4],
            euler: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl InjectionSet {
    /// Create a set for a zone with default particle properties.
    pub fn new(zone_id: usize, set_id: usize, location: ZoneKind) -> Self {
        Self {
            zone_id,
            set_id,
            location,
            ..Default::default()
        }
    }

    /// Attach an injection profile.
    pub fn with_profile(mut self, profile: Arc<dyn InjectionProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Whether this set injects particles at time step `nt_cur`.
    ///
    /// A non-positive frequency injects only at the first step of a fresh
    /// run (no particle ever injected before).
    pub fn is_due(&self, nt_cur: u64, nt_prev: u64, cumulative_injected: u64) -> bool {
        let frequency = if self.injection_frequency <= 0 {
            if nt_cur == nt_prev + 1 && cumulative_injected == 0 {
                nt_cur
            } else {
                nt_cur + 1
            }
        } else {
            self.injection_frequency as u64
        };
        frequency > 0 && nt_cur % frequency == 0
    }

    /// Evaluate the profile values for a zone, if a profile is attached.
    pub fn profile_values(&self, zone: &Zone) -> Option<Vec<f64>> {
        self.profile
            .as_ref()
            .map(|profile| profile.compute(zone, zone.elt_ids()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_profile_serialization() {
        let v = VelocityProfile::ImposedNorm { magnitude: 2.0 };
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("ImposedNorm"));
        let parsed: VelocityProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn test_partial_set_deserializes_with_defaults() {
        let json = r#"{ "zone_id": 2, "n_inject": 10, "location": "VolumeCells" }"#;
        let set: InjectionSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.zone_id, 2);
        assert_eq!(set.n_inject, 10);
        assert_eq!(set.location, ZoneKind::VolumeCells);
        assert_eq!(set.injection_frequency, 1);
        assert!(set.profile.is_none());
    }

    #[test]
    fn test_injection_frequency() {
        let mut set = InjectionSet {
            injection_frequency: 3,
            ..Default::default()
        };
        assert!(!set.is_due(1, 0, 0));
        assert!(set.is_due(3, 0, 0));
        assert!(set.is_due(6, 0, 100));

        set.injection_frequency = 0;
        // First step of a fresh run only
        assert!(set.is_due(1, 0, 0));
        assert!(!set.is_due(2, 0, 0));
        assert!(!set.is_due(1, 0, 5));
        // Restart: first step after restart but particles already injected
        assert!(!set.is_due(11, 10, 5));
    }

    #[test]
    fn test_uniform_profile() {
        let zone = Zone::new(0, "inlet", ZoneKind::BoundaryFaces, vec![3, 4, 5]);
        let set = InjectionSet::default().with_profile(Arc::new(UniformProfile));
        let values = set.profile_values(&zone).unwrap();
        assert_eq!(values, vec![1.0, 1.0, 1.0]);
    }
}
