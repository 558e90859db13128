//! Injection parameter checks and admissibility of injected particles.
//!
//! Pre-checks gather every issue of every zone and set into one
//! [`ValidationReport`] so a faulty setup is reported in full. Post-checks
//! scan the particles of one zone/set pair after initialization.

use std::fmt;

use rayon::prelude::*;

use super::ParticleRecord;
use crate::schema::{
    BoundaryNature, InjectionRegistry, InjectionSet, LagrangianModel, PhysicalModel, ShapeModel,
    TemperatureProfile, VelocityProfile, ZoneEntry, ZoneKind,
};

/// Lowest admissible temperature (Kelvin).
pub const ABSOLUTE_ZERO: f64 = 0.0;

/// One invalid injection parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub location: ZoneKind,
    pub zone_id: usize,
    /// `None` for zone-level issues.
    pub set_id: Option<usize>,
    pub field: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lagrangian {} zone {}", self.location.name(), self.zone_id)?;
        if let Some(set_id) = self.set_id {
            write!(f, ", set {}", set_id)?;
        }
        write!(f, ": {} ({}) {}", self.field, self.value, self.reason)
    }
}

/// All issues found by the pre-injection checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ConfigIssue>,
}

impl ValidationReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether some issue concerns the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

/// Collects issues for one zone or set.
struct IssueSink<'a> {
    report: &'a mut ValidationReport,
    location: ZoneKind,
    zone_id: usize,
    set_id: Option<usize>,
}

impl IssueSink<'_> {
    fn push(&mut self, field: &'static str, value: f64, reason: &'static str) {
        self.report.issues.push(ConfigIssue {
            location: self.location,
            zone_id: self.zone_id,
            set_id: self.set_id,
            field,
            value,
            reason,
        });
    }

    fn check(&mut self, failed: bool, field: &'static str, value: f64, reason: &'static str) {
        if failed {
            self.push(field, value, reason);
        }
    }
}

/// Check every zone and injection set of the registry.
pub fn check_registry(
    registry: &InjectionRegistry,
    model: &LagrangianModel,
) -> Result<(), ValidationReport> {
    let mut report = ValidationReport::default();
    for kind in [ZoneKind::BoundaryFaces, ZoneKind::VolumeCells] {
        for entry in registry.zones(kind) {
            check_zone(entry, kind, model, &mut report);
        }
    }
    report.into_result()
}

/// Check a zone and its sets, appending issues to `report`.
pub fn check_zone(
    entry: &ZoneEntry,
    kind: ZoneKind,
    model: &LagrangianModel,
    report: &mut ValidationReport,
) {
    let mut zone_issues = IssueSink {
        report,
        location: kind,
        zone_id: entry.zone.id,
        set_id: None,
    };
    if kind == ZoneKind::BoundaryFaces && entry.nature == BoundaryNature::Fouling {
        zone_issues.check(
            model.physical_model != PhysicalModel::Coal,
            "nature",
            entry.zone.id as f64,
            "is fouling but the physical model is not coal",
        );
        zone_issues.check(
            !model.fouling,
            "nature",
            entry.zone.id as f64,
            "is fouling but fouling is not activated",
        );
    }
    zone_issues.check(
        entry.zone.kind != kind,
        "zone kind",
        entry.zone.id as f64,
        "does not match the zone container",
    );

    for set in &entry.sets {
        if set.location != kind {
            report.issues.push(ConfigIssue {
                location: kind,
                zone_id: entry.zone.id,
                set_id: Some(set.set_id),
                field: "location",
                value: set.zone_id as f64,
                reason: "does not match the zone container",
            });
        }
        check_set(set, model, report);
    }
}

/// Check one injection set, appending issues to `report`.
pub fn check_set(set: &InjectionSet, model: &LagrangianModel, report: &mut ValidationReport) {
    let mut s = IssueSink {
        report,
        location: set.location,
        zone_id: set.zone_id,
        set_id: Some(set.set_id),
    };

    if model.n_stat_classes > 0 {
        s.check(
            set.cluster > model.n_stat_classes,
            "statistical class",
            set.cluster as f64,
            "is greater than the number of statistical classes",
        );
    }

    if model.agglomeration {
        s.check(
            set.aggregate_class_id < 1,
            "aggregate class id",
            set.aggregate_class_id as f64,
            "is smaller than 1",
        );
        s.check(
            set.aggregate_fractal_dim > 3.0,
            "aggregate fractal dimension",
            set.aggregate_fractal_dim,
            "is greater than 3",
        );
    }

    if let VelocityProfile::ImposedNorm { magnitude } = set.velocity {
        s.check(
            set.location != ZoneKind::BoundaryFaces,
            "velocity magnitude",
            magnitude,
            "is imposed along face normals, which volume zones do not have",
        );
    }

    s.check(
        set.stat_weight <= 0.0 && set.flow_rate <= 0.0,
        "statistical weight",
        set.stat_weight,
        "must be positive when no flow rate is given",
    );
    s.check(
        set.flow_rate > 0.0 && set.n_inject == 0,
        "flow rate",
        set.flow_rate,
        "is positive while the number of injected particles is 0",
    );

    if model.physical_model != PhysicalModel::Coal {
        s.check(set.density < 0.0, "density", set.density, "is negative");
        s.check(set.diameter < 0.0, "diameter", set.diameter, "is negative");
        s.check(
            set.diameter_variance < 0.0,
            "diameter variance",
            set.diameter_variance,
            "is negative",
        );
    }
    s.check(
        set.diameter < 3.0 * set.diameter_variance,
        "diameter",
        set.diameter,
        "is smaller than 3 times its standard deviation",
    );

    if model.shape == ShapeModel::SpheroidJeffery {
        for &r in &set.radii {
            s.check(r < 0.0, "ellipsoid radius", r, "is negative");
        }
    }

    if model.heat_with_temperature() {
        s.check(
            set.cp < 0.0 && model.solve_temperature,
            "specific heat",
            set.cp,
            "is negative",
        );
        s.check(
            set.temperature_profile == TemperatureProfile::Imposed
                && set.temperature < ABSOLUTE_ZERO,
            "temperature",
            set.temperature,
            "is below absolute zero",
        );
    }

    if model.physical_model == PhysicalModel::Heat
        && model.solve_temperature
        && model.radiative_coupling
    {
        s.check(
            !(0.0..=1.0).contains(&set.emissivity),
            "emissivity",
            set.emissivity,
            "is not in [0, 1]",
        );
    }

    if model.physical_model == PhysicalModel::Coal {
        let n_coals = model.coals.len();
        s.check(
            set.coal_number < 1 || set.coal_number > n_coals,
            "coal number",
            set.coal_number as f64,
            "is not a defined coal",
        );
        s.check(
            set.temperature < ABSOLUTE_ZERO,
            "temperature",
            set.temperature,
            "is below absolute zero",
        );

        if let Some(coal) = set
            .coal_number
            .checked_sub(1)
            .and_then(|id| model.coals.get(id))
        {
            s.check(coal.density < 0.0, "coal density", coal.density, "is negative");
            s.check(coal.cp < 0.0, "coal specific heat", coal.cp, "is negative");
            s.check(
                !(0.0..=1.0).contains(&coal.water_fraction),
                "coal water mass fraction",
                coal.water_fraction,
                "is not in [0, 1]",
            );
            s.check(
                !(0.0..=1.0).contains(&coal.ash_fraction),
                "coal ash mass fraction",
                coal.ash_fraction,
                "is not in [0, 1]",
            );
            let sum = coal.water_fraction + coal.ash_fraction;
            s.check(
                sum > 1.0,
                "coal water and ash mass fractions",
                sum,
                "sum to more than 1",
            );
        }
    }
}

/// An injected particle with an inadmissible attribute value.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissibilityViolation {
    /// Particle index in the particle set.
    pub particle: usize,
    pub attribute: &'static str,
    /// Coal layer, for layered attributes.
    pub layer: Option<usize>,
    pub value: f64,
}

impl fmt::Display for AdmissibilityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "particle {} has a negative {}", self.particle, self.attribute)?;
        if let Some(layer) = self.layer {
            write!(f, " in layer {}", layer)?;
        }
        write!(f, ": {}", self.value)
    }
}

fn particle_violations(
    index: usize,
    p: &ParticleRecord,
    model: &LagrangianModel,
) -> Vec<AdmissibilityViolation> {
    let mut out = Vec::new();
    let mut push = |attribute: &'static str, layer: Option<usize>, value: f64| {
        out.push(AdmissibilityViolation {
            particle: index,
            attribute,
            layer,
            value,
        });
    };

    for (attribute, value) in [
        ("diameter", p.diameter),
        ("mass", p.mass),
        ("statistical weight", p.stat_weight),
    ] {
        if value <= 0.0 {
            push(attribute, None, value);
        }
    }
    if model.has_cp() && p.cp <= 0.0 {
        push("specific heat", None, p.cp);
    }

    if model.has_coal()
        && let Some(coal) = &p.coal
    {
        for (attribute, values) in [
            ("water mass", &coal.water_mass),
            ("coal mass", &coal.coal_mass),
            ("coke mass", &coal.coke_mass),
            ("coal density", &coal.coal_density),
        ] {
            let layered = values.len() > 1;
            for (l, &v) in values.iter().enumerate() {
                if v < 0.0 {
                    push(attribute, layered.then_some(l), v);
                }
            }
        }
        for (attribute, value) in [
            ("shrinking diameter", coal.shrinking_diameter),
            ("initial diameter", coal.initial_diameter),
        ] {
            if value < 0.0 {
                push(attribute, None, value);
            }
        }
    }
    out
}

/// Check the admissibility of freshly injected particles.
///
/// `first_index` is the particle-set index of `particles[0]`. Violations are
/// returned in particle order.
pub fn check_particles(
    particles: &[ParticleRecord],
    first_index: usize,
    model: &LagrangianModel,
) -> Vec<AdmissibilityViolation> {
    particles
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, p)| particle_violations(first_index + i, p, model))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CoalLayers;
    use crate::schema::{CoalComposition, Zone};

    fn boundary_set() -> InjectionSet {
        InjectionSet {
            n_inject: 10,
            ..Default::default()
        }
    }

    fn check(set: &InjectionSet, model: &LagrangianModel) -> ValidationReport {
        let mut report = ValidationReport::default();
        check_set(set, model, &mut report);
        report
    }

    fn coal_model() -> LagrangianModel {
        LagrangianModel {
            physical_model: PhysicalModel::Coal,
            coals: vec![CoalComposition {
                density: 1200.0,
                cp: 1800.0,
                water_fraction: 0.1,
                ash_fraction: 0.2,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_set_valid() {
        assert!(check(&boundary_set(), &LagrangianModel::default()).is_empty());
    }

    #[test]
    fn test_diameter_smaller_than_three_sigma() {
        let set = InjectionSet {
            diameter: 1.0,
            diameter_variance: 0.5,
            ..boundary_set()
        };
        let report = check(&set, &LagrangianModel::default());
        assert_eq!(report.len(), 1);
        assert_eq!(report.issues[0].field, "diameter");
        assert_eq!(report.issues[0].value, 1.0);
    }

    #[test]
    fn test_imposed_norm_on_volume_zone() {
        let set = InjectionSet {
            location: ZoneKind::VolumeCells,
            velocity: VelocityProfile::ImposedNorm { magnitude: 2.0 },
            ..boundary_set()
        };
        let report = check(&set, &LagrangianModel::default());
        assert!(report.has_field("velocity magnitude"));
    }

    #[test]
    fn test_weight_and_flow_rate() {
        let set = InjectionSet {
            stat_weight: 0.0,
            ..boundary_set()
        };
        assert!(check(&set, &LagrangianModel::default()).has_field("statistical weight"));

        let set = InjectionSet {
            stat_weight: 0.0,
            flow_rate: 1.0,
            n_inject: 0,
            ..boundary_set()
        };
        let report = check(&set, &LagrangianModel::default());
        assert!(!report.has_field("statistical weight"));
        assert!(report.has_field("flow rate"));
    }

    #[test]
    fn test_sign_checks_skipped_for_coal() {
        let set = InjectionSet {
            density: -1.0,
            ..boundary_set()
        };
        assert!(check(&set, &LagrangianModel::default()).has_field("density"));
        assert!(check(&set, &coal_model()).is_empty());
    }

    #[test]
    fn test_coal_checks() {
        let model = coal_model();
        let set = InjectionSet {
            coal_number: 2,
            ..boundary_set()
        };
        assert!(check(&set, &model).has_field("coal number"));

        let mut model = coal_model();
        model.coals[0].water_fraction = 0.9;
        let report = check(&boundary_set(), &model);
        assert!(report.has_field("coal water and ash mass fractions"));
    }

    #[test]
    fn test_heat_model_checks() {
        let model = LagrangianModel {
            physical_model: PhysicalModel::Heat,
            solve_temperature: true,
            radiative_coupling: true,
            ..Default::default()
        };
        let set = InjectionSet {
            cp: -1.0,
            temperature: -5.0,
            temperature_profile: TemperatureProfile::Imposed,
            emissivity: 1.5,
            ..boundary_set()
        };
        let report = check(&set, &model);
        assert!(report.has_field("specific heat"));
        assert!(report.has_field("temperature"));
        assert!(report.has_field("emissivity"));
    }

    #[test]
    fn test_classes_and_agglomeration() {
        let model = LagrangianModel {
            n_stat_classes: 2,
            agglomeration: true,
            ..Default::default()
        };
        let set = InjectionSet {
            cluster: 3,
            aggregate_class_id: 0,
            aggregate_fractal_dim: 3.5,
            ..boundary_set()
        };
        assert_eq!(check(&set, &model).len(), 3);
    }

    #[test]
    fn test_registry_collects_across_zones() {
        let bad = InjectionSet {
            diameter: 1.0,
            diameter_variance: 0.5,
            ..boundary_set()
        };
        let registry = InjectionRegistry {
            boundary: vec![
                ZoneEntry::new(Zone::new(0, "a", ZoneKind::BoundaryFaces, vec![0]))
                    .with_nature(BoundaryNature::Fouling)
                    .with_set(bad.clone()),
            ],
            volume: vec![
                ZoneEntry::new(Zone::new(0, "b", ZoneKind::VolumeCells, vec![0])).with_set(bad),
            ],
        };
        let report = check_registry(&registry, &LagrangianModel::default()).unwrap_err();
        // Two fouling issues plus one diameter issue per zone
        assert_eq!(report.len(), 4);
        assert_eq!(report.issues[3].location, ZoneKind::VolumeCells);
        let text = report.to_string();
        assert!(text.contains("Lagrangian boundary zone 0, set 0: diameter"));
    }

    #[test]
    fn test_location_mismatch() {
        let mut entry = ZoneEntry::new(Zone::new(1, "a", ZoneKind::BoundaryFaces, vec![0]))
            .with_set(boundary_set());
        entry.sets[0].location = ZoneKind::VolumeCells;
        let mut report = ValidationReport::default();
        check_zone(&entry, ZoneKind::BoundaryFaces, &LagrangianModel::default(), &mut report);
        assert!(report.has_field("location"));
    }

    #[test]
    fn test_post_check() {
        let model = LagrangianModel::default();
        let good = ParticleRecord {
            diameter: 1e-5,
            mass: 1e-12,
            stat_weight: 1.0,
            ..Default::default()
        };
        let bad = ParticleRecord {
            mass: -1.0,
            ..good.clone()
        };
        let violations = check_particles(&[good.clone(), bad, good], 10, &model);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].particle, 11);
        assert_eq!(violations[0].attribute, "mass");
    }

    #[test]
    fn test_post_check_cp_and_coal_layers() {
        let model = coal_model();
        let mut coal = CoalLayers::new(2);
        coal.coke_mass[1] = -0.1;
        let p = ParticleRecord {
            diameter: 1e-5,
            mass: 1e-12,
            stat_weight: 1.0,
            cp: 0.0,
            coal: Some(coal),
            ..Default::default()
        };
        let violations = check_particles(&[p], 0, &model);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].attribute, "specific heat");
        assert_eq!(violations[1].layer, Some(1));
        assert!(violations[1].to_string().contains("in layer 1"));
    }
}
