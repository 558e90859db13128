//! Initialization of freshly injected particles.
//!
//! Particles of a zone/set pair are laid out element by element following the
//! distribution index, so particle `k` of the fresh tail belongs to the
//! element `i` with `index[i] <= k < index[i + 1]`.

use std::f64::consts::PI;

use super::{CoalLayers, FluidState, Mesh, ParticleFlags, ParticleRecord, RandomStream, ReboundState};
use crate::schema::{
    InjectionSet, LagrangianModel, PhysicalModel, ShapeModel, TemperatureProfile, VelocityProfile,
    Zone, ZoneKind,
};

/// Relative displacement under which a particle is considered unmoved.
pub const DISPLACEMENT_TOLERANCE: f64 = 1.0e-15;

/// Number of standard deviations at which sampled diameters are clipped.
const DIAMETER_CLIP: f64 = 3.0;

/// Element (zone-local position) of each fresh particle.
fn particle_elements(index: &[usize]) -> impl Iterator<Item = usize> + '_ {
    index
        .windows(2)
        .enumerate()
        .flat_map(|(i, w)| std::iter::repeat_n(i, w[1] - w[0]))
}

/// Injection face of each fresh particle of a boundary zone.
pub fn particle_face_ids(zone: &Zone, index: &[usize]) -> Vec<usize> {
    let elt_ids = zone.elt_ids();
    particle_elements(index).map(|i| elt_ids[i]).collect()
}

/// Global id of the injection face of each fresh particle.
pub fn particle_face_global_ids(zone: &Zone, index: &[usize]) -> Vec<u64> {
    particle_elements(index)
        .filter_map(|i| zone.global_id(i))
        .collect()
}

/// Place fresh particles at the centroid of their element.
///
/// Boundary particles sit at the face centroid, hosted by the adjacent cell.
pub fn place_particles(
    particles: &mut [ParticleRecord],
    zone: &Zone,
    index: &[usize],
    mesh: &dyn Mesh,
    rank: usize,
) {
    let elt_ids = zone.elt_ids();
    for (p, i) in particles.iter_mut().zip(particle_elements(index)) {
        let elt_id = elt_ids[i];
        match zone.kind {
            ZoneKind::BoundaryFaces => {
                p.coords = mesh.b_face_center(elt_id);
                p.cell_id = mesh.b_face_cell(elt_id);
            }
            ZoneKind::VolumeCells => {
                p.coords = mesh.cell_center(elt_id);
                p.cell_id = elt_id;
            }
        }
        p.rank_id = rank;
    }
}

/// Set state flags, random value, velocity and residence time.
///
/// Draws exactly one uniform per particle. With a fluid-value velocity
/// policy the velocity is left for [`init_attributes`].
pub fn init_particles(
    particles: &mut [ParticleRecord],
    set: &InjectionSet,
    face_ids: Option<&[usize]>,
    mesh: &dyn Mesh,
    dtp: f64,
    rng: &mut RandomStream,
) {
    for (k, p) in particles.iter_mut().enumerate() {
        p.flags = ParticleFlags::empty();
        p.rebound = ReboundState::None;
        p.truncated = 0.0;

        let r = rng.uniform();
        p.random_value = r;

        match set.velocity {
            VelocityProfile::ImposedComponents { components } => p.velocity = components,
            VelocityProfile::ImposedNorm { magnitude } => {
                if let Some(&face_id) = face_ids.and_then(|f| f.get(k)) {
                    let n = mesh.b_face_normal(face_id);
                    p.velocity = [-n[0] * magnitude, -n[1] * magnitude, -n[2] * magnitude];
                }
            }
            VelocityProfile::FluidValue => {}
        }

        // Stagger continuous injection over the step
        p.residence_time = if set.injection_frequency == 1 {
            -r * dtp
        } else {
            0.0
        };
    }
}

/// Context of the physical attribute initialization.
pub struct AttributeContext<'a> {
    pub model: &'a LagrangianModel,
    pub fluid: &'a dyn FluidState,
    /// Fluid time level (already clamped to the available levels).
    pub time_level: usize,
    pub dtp: f64,
}

/// Initialize physical attributes of fresh particles at their final location.
///
/// Draws one normal deviate (two uniforms) per particle when the diameter
/// variance is positive, none otherwise.
pub fn init_attributes(
    particles: &mut [ParticleRecord],
    set: &InjectionSet,
    ctx: &AttributeContext<'_>,
    rng: &mut RandomStream,
) {
    let model = ctx.model;
    let coal = (model.physical_model == PhysicalModel::Coal)
        .then(|| set.coal_number.checked_sub(1).and_then(|id| model.coals.get(id)))
        .flatten();

    for p in particles.iter_mut() {
        let fluid_velocity = ctx.fluid.velocity(p.cell_id, ctx.time_level);
        p.velocity_seen = fluid_velocity;
        if set.velocity == VelocityProfile::FluidValue {
            p.velocity = fluid_velocity;
        }

        let mut diameter = set.diameter;
        if set.diameter_variance > 0.0 {
            let sigma = set.diameter_variance;
            let d = set.diameter + rng.normal() * sigma;
            diameter = d.clamp(
                set.diameter - DIAMETER_CLIP * sigma,
                set.diameter + DIAMETER_CLIP * sigma,
            );
        }
        p.diameter = diameter;

        p.density = coal.map_or(set.density, |c| c.density);
        p.mass = p.density * PI * diameter.powi(3) / 6.0;

        p.stat_weight = if set.flow_rate > 0.0 && set.n_inject > 0 && p.mass > 0.0 {
            set.flow_rate * ctx.dtp / (set.n_inject as f64 * p.mass)
        } else {
            set.stat_weight
        };

        p.stat_class = set.cluster;
        p.aggregate_class_id = set.aggregate_class_id;
        p.aggregate_fractal_dim = set.aggregate_fractal_dim;
        p.fouling_index = set.fouling_index;

        if model.heat_with_temperature() || coal.is_some() {
            let fluid_temperature = ctx.fluid.temperature(p.cell_id);
            p.temperature_seen = fluid_temperature;
            p.temperature = match set.temperature_profile {
                TemperatureProfile::Imposed => set.temperature,
                TemperatureProfile::Seen => fluid_temperature,
            };
            p.cp = coal.map_or(set.cp, |c| c.cp);
            p.emissivity = set.emissivity;
        }

        if model.shape == ShapeModel::SpheroidJeffery {
            p.radii = set.radii;
            p.orientation = set.orientation;
            p.angular_velocity = set.angular_velocity;
            p.shape_param = set.shape_param;
            p.euler = set.euler;
        }

        if let Some(c) = coal {
            let n_layers = model.n_coal_layers.max(1);
            let layer_mass = p.mass / n_layers as f64;
            let mut layers = CoalLayers::new(n_layers);
            layers.water_mass.fill(c.water_fraction * layer_mass);
            layers
                .coal_mass
                .fill((1.0 - c.water_fraction - c.ash_fraction) * layer_mass);
            layers.coal_density.fill(c.density);
            layers.shrinking_diameter = diameter;
            layers.initial_diameter = diameter;
            p.coal_number = set.coal_number;
            p.coal = Some(layers);
        }
    }
}

/// Whether a particle moved away from its previous position, relative to
/// the characteristic length of its cell.
pub fn is_displaced(p: &ParticleRecord, cell_volume: f64) -> bool {
    let inv_length = 1.0 / cell_volume.cbrt();
    (0..3).any(|k| ((p.coords[k] - p.prev_coords[k]) * inv_length).abs() > DISPLACEMENT_TOLERANCE)
}

/// Continue injected particles along their velocity for the remainder of the
/// step (`dtp + residence_time`) when their residence time is negative.
pub fn advance_partial_step(particles: &mut [ParticleRecord], dtp: f64) {
    for p in particles.iter_mut() {
        if p.residence_time < 0.0 {
            let t_fraction = dtp + p.residence_time;
            for k in 0..3 {
                p.coords[k] += t_fraction * p.velocity[k];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{MeshData, UniformFluid};
    use crate::schema::{BoxMesh, BoxSide, CoalComposition};

    fn mesh() -> (BoxMesh, MeshData) {
        let spec = BoxMesh {
            n: [2, 2, 2],
            lengths: [1.0, 1.0, 1.0],
        };
        let mesh = MeshData::from_box(&spec);
        (spec, mesh)
    }

    #[test]
    fn test_face_ids_follow_index() {
        let zone = Zone::new(0, "b", ZoneKind::BoundaryFaces, vec![7, 3, 5]);
        let ids = particle_face_ids(&zone, &[0, 2, 2, 3]);
        assert_eq!(ids, vec![7, 7, 5]);

        let zone = zone.with_global_ids(vec![107, 103, 105]).unwrap();
        let global = particle_face_global_ids(&zone, &[0, 2, 2, 3]);
        assert_eq!(global, vec![107, 107, 105]);
    }

    #[test]
    fn test_place_on_faces_and_cells() {
        let (spec, mesh) = mesh();
        let faces = spec.side_faces(BoxSide::XMax);
        let zone = Zone::new(0, "out", ZoneKind::BoundaryFaces, faces.clone());
        let mut particles = vec![ParticleRecord::default(); 2];
        place_particles(&mut particles, &zone, &[0, 0, 2, 2, 2], &mesh, 3);
        assert_eq!(particles[0].coords, mesh.b_face_center(faces[1]));
        assert_eq!(particles[1].cell_id, mesh.b_face_cell(faces[1]));
        assert_eq!(particles[0].rank_id, 3);

        let zone = Zone::new(0, "v", ZoneKind::VolumeCells, vec![6]);
        let mut particles = vec![ParticleRecord::default()];
        place_particles(&mut particles, &zone, &[0, 1], &mesh, 0);
        assert_eq!(particles[0].cell_id, 6);
        assert_eq!(particles[0].coords, mesh.cell_center(6));
    }

    #[test]
    fn test_imposed_norm_velocity_points_inward() {
        let (spec, mesh) = mesh();
        let faces = spec.side_faces(BoxSide::XMin);
        let set = InjectionSet {
            velocity: VelocityProfile::ImposedNorm { magnitude: 2.0 },
            ..Default::default()
        };
        let mut particles = vec![ParticleRecord::default(); faces.len()];
        let mut rng = RandomStream::new(0);
        init_particles(&mut particles, &set, Some(&faces), &mesh, 0.1, &mut rng);
        for p in &particles {
            assert_eq!(p.velocity, [2.0, 0.0, 0.0]);
        }
        assert_eq!(rng.draws(), faces.len() as u64);
    }

    #[test]
    fn test_residence_time() {
        let (_, mesh) = mesh();
        let mut set = InjectionSet {
            injection_frequency: 1,
            ..Default::default()
        };
        let mut particles = vec![ParticleRecord::default(); 50];
        let mut rng = RandomStream::new(4);
        init_particles(&mut particles, &set, None, &mesh, 0.5, &mut rng);
        for p in &particles {
            assert!(p.residence_time <= 0.0 && p.residence_time > -0.5);
            assert_eq!(p.residence_time, -p.random_value * 0.5);
        }

        set.injection_frequency = 2;
        init_particles(&mut particles, &set, None, &mesh, 0.5, &mut rng);
        assert!(particles.iter().all(|p| p.residence_time == 0.0));
    }

    #[test]
    fn test_attributes_mass_and_weight() {
        let model = LagrangianModel::default();
        let fluid = UniformFluid {
            velocity: [1.0, 2.0, 3.0],
            temperature: 300.0,
        };
        let ctx = AttributeContext {
            model: &model,
            fluid: &fluid,
            time_level: 0,
            dtp: 0.01,
        };
        let set = InjectionSet {
            diameter: 2.0e-4,
            density: 1000.0,
            flow_rate: 1.0e-3,
            n_inject: 10,
            ..Default::default()
        };
        let mut particles = vec![ParticleRecord::default(); 3];
        let mut rng = RandomStream::new(0);
        init_attributes(&mut particles, &set, &ctx, &mut rng);

        let mass = 1000.0 * PI * 8.0e-12 / 6.0;
        for p in &particles {
            assert!((p.mass - mass).abs() < 1e-20);
            assert!((p.stat_weight * 10.0 * p.mass - 1.0e-5).abs() < 1e-15);
            assert_eq!(p.velocity, [1.0, 2.0, 3.0]);
            assert_eq!(p.velocity_seen, [1.0, 2.0, 3.0]);
        }
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_diameter_variance_clipped() {
        let model = LagrangianModel::default();
        let fluid = UniformFluid::default();
        let ctx = AttributeContext {
            model: &model,
            fluid: &fluid,
            time_level: 0,
            dtp: 0.01,
        };
        let set = InjectionSet {
            diameter: 1.0,
            diameter_variance: 0.1,
            ..Default::default()
        };
        let mut particles = vec![ParticleRecord::default(); 500];
        let mut rng = RandomStream::new(8);
        init_attributes(&mut particles, &set, &ctx, &mut rng);
        // Two uniforms per normal deviate
        assert_eq!(rng.draws(), 1000);
        for p in &particles {
            assert!(p.diameter >= 0.7 - 1e-12 && p.diameter <= 1.3 + 1e-12);
        }
    }

    #[test]
    fn test_coal_layers() {
        let model = LagrangianModel {
            physical_model: PhysicalModel::Coal,
            n_coal_layers: 2,
            coals: vec![CoalComposition {
                density: 1200.0,
                cp: 1800.0,
                water_fraction: 0.1,
                ash_fraction: 0.2,
            }],
            ..Default::default()
        };
        let fluid = UniformFluid::default();
        let ctx = AttributeContext {
            model: &model,
            fluid: &fluid,
            time_level: 0,
            dtp: 0.01,
        };
        let set = InjectionSet {
            diameter: 1.0e-4,
            temperature_profile: TemperatureProfile::Imposed,
            temperature: 400.0,
            ..Default::default()
        };
        let mut particles = vec![ParticleRecord::default()];
        let mut rng = RandomStream::new(0);
        init_attributes(&mut particles, &set, &ctx, &mut rng);

        let p = &particles[0];
        let coal = p.coal.as_ref().unwrap();
        assert_eq!(coal.n_layers(), 2);
        assert!((coal.water_mass[0] - 0.1 * p.mass / 2.0).abs() < 1e-24);
        assert!((coal.coal_mass[1] - 0.7 * p.mass / 2.0).abs() < 1e-24);
        assert_eq!(coal.coke_mass, vec![0.0, 0.0]);
        assert_eq!(coal.initial_diameter, 1.0e-4);
        assert_eq!(p.cp, 1800.0);
        assert_eq!(p.temperature, 400.0);
        assert_eq!(p.density, 1200.0);
    }

    #[test]
    fn test_displacement_is_dimensionless() {
        let mut p = ParticleRecord {
            coords: [0.5, 0.5, 0.5],
            prev_coords: [0.5, 0.5, 0.5],
            ..Default::default()
        };
        assert!(!is_displaced(&p, 1.0e-9));
        p.coords[1] += 1.0e-14;
        assert!(is_displaced(&p, 1.0));
        assert!(!is_displaced(&p, 1.0e6));
    }

    #[test]
    fn test_advance_partial_step() {
        let mut particles = vec![
            ParticleRecord {
                residence_time: -0.25,
                velocity: [2.0, 0.0, 0.0],
                ..Default::default()
            },
            ParticleRecord {
                velocity: [2.0, 0.0, 0.0],
                ..Default::default()
            },
        ];
        advance_partial_step(&mut particles, 1.0);
        assert_eq!(particles[0].coords, [1.5, 0.0, 0.0]);
        assert_eq!(particles[1].coords, [0.0, 0.0, 0.0]);
    }
}
