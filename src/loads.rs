//! Force_BC / Displacement_BC / IC application (spec §4.5, §6).
//!
//! Grounded structurally on the teacher's constraint pattern
//! (`src/physics/constraint/*`: a constraint is built once from its
//! definition, then has a separate "compute, then apply" step every
//! substep) — here a `Load` is built once from its deck entry (resolving
//! its node set), then applied every step by evaluating `g(t) * shape(x_ref)`.
//!
//! `fix` (spec §3's "dof d is velocity-clamped") is reserved for *zero*
//! velocity: walls, `all_dofs_constrained` particles, and
//! `zero_displacement` Displacement_BC entries. A nonzero prescribed
//! velocity is never folded into `fix` — doing so would break the state
//! invariant "a node with bit d of `fix` set has `v[i][d] = 0`" (spec §3)
//! — it is instead applied as a direct overwrite at the integrator's
//! velocity-write step, matching "enforce prescribed velocities (overwrite
//! those dofs)" (spec §4.5).

use vek::Vec3;

use crate::config::bc::{BcDeck, IcEntry, Selection};
use crate::particle::Particle;
use crate::state::{ModelState, DOF_X, DOF_Y, DOF_Z};

fn dof_bit(d: u8) -> u8 {
    match d {
        0 => DOF_X,
        1 => DOF_Y,
        _ => DOF_Z,
    }
}

fn write_dof(v: &mut Vec3<f64>, d: u8, value: f64) {
    match d {
        0 => v.x = value,
        1 => v.y = value,
        _ => v.z = value,
    }
}

fn selects_particle(deck: &BcDeck, particle: &Particle) -> bool {
    match deck.selection {
        Selection::Particle => {
            deck.include_particles.is_empty() || deck.include_particles.contains(&particle.id)
        }
        Selection::Region => true,
        Selection::RegionWithIncludeList => deck.include_particles.contains(&particle.id),
        Selection::RegionWithExcludeList => !deck.exclude_particles.contains(&particle.id),
        Selection::Combined => {
            let included = deck.include_particles.is_empty() || deck.include_particles.contains(&particle.id);
            included && !deck.exclude_particles.contains(&particle.id)
        }
    }
}

fn selects_node(deck: &BcDeck, particle: &Particle, x_ref: Vec3<f64>) -> bool {
    if !selects_particle(deck, particle) {
        return false;
    }
    match deck.selection {
        Selection::Particle => true,
        _ => deck.region.as_ref().map(|g| g.is_inside(x_ref)).unwrap_or(true),
    }
}

fn resolve_node_set(deck: &BcDeck, particles: &[Particle], state: &ModelState) -> Vec<usize> {
    let mut ids = Vec::new();
    for particle in particles {
        for local in 0..particle.node_count() {
            let i = particle.slice.start + local;
            if selects_node(deck, particle, state.x_ref[i]) {
                ids.push(i);
            }
        }
    }
    ids
}

/// A Force_BC entry, or a nonzero-velocity Displacement_BC entry: both
/// evaluate `g(t) * shape(x_ref)` every step and write it into a fixed
/// node set on the listed direction dofs.
struct TimeVaryingLoad {
    deck: BcDeck,
    node_ids: Vec<usize>,
    as_force: bool,
}

impl TimeVaryingLoad {
    fn apply(&self, t: f64, state: &mut ModelState) {
        let magnitude = self.deck.time_function.value(t);
        for &i in &self.node_ids {
            let value = magnitude * self.deck.spatial_function.value(state.x_ref[i]);
            for &d in &self.deck.direction {
                if self.as_force {
                    match d {
                        0 => state.f[i].x += value,
                        1 => state.f[i].y += value,
                        _ => state.f[i].z += value,
                    }
                } else {
                    write_dof(&mut state.v[i], d, value);
                }
            }
        }
    }
}

/// The full set of boundary loads and initial conditions for a run.
pub struct LoadSet {
    force_loads: Vec<TimeVaryingLoad>,
    velocity_loads: Vec<TimeVaryingLoad>,
}

impl LoadSet {
    /// Resolve every BC's node set once (reference coordinates don't
    /// change) and bake zero-displacement entries directly into `fix`;
    /// apply initial conditions once.
    pub fn build(
        force_bc: &[BcDeck],
        displacement_bc: &[BcDeck],
        ic: &[IcEntry],
        particles: &[Particle],
        state: &mut ModelState,
    ) -> Self {
        let force_loads = force_bc
            .iter()
            .map(|deck| TimeVaryingLoad {
                deck: deck.clone(),
                node_ids: resolve_node_set(deck, particles, state),
                as_force: true,
            })
            .collect();

        let mut velocity_loads = Vec::new();
        for deck in displacement_bc {
            let node_ids = resolve_node_set(deck, particles, state);
            if deck.zero_displacement {
                for &i in &node_ids {
                    for &d in &deck.direction {
                        state.fix[i] |= dof_bit(d);
                        write_dof(&mut state.v[i], d, 0.0);
                    }
                }
            } else {
                velocity_loads.push(TimeVaryingLoad {
                    deck: deck.clone(),
                    node_ids,
                    as_force: false,
                });
            }
        }

        apply_initial_conditions(ic, particles, state);

        Self { force_loads, velocity_loads }
    }

    /// Add every Force_BC contribution for time `t` into `state.f`. Called
    /// once per step, alongside bond/contact forces.
    pub fn apply_force(&self, t: f64, state: &mut ModelState) {
        for load in &self.force_loads {
            load.apply(t, state);
        }
    }

    /// Overwrite the prescribed-velocity dofs for time `t`. Called at every
    /// v-write of the integrator (spec §4.5: "with the same fixity
    /// overrides at each v-write").
    pub fn apply_prescribed_velocity(&self, t: f64, state: &mut ModelState) {
        for load in &self.velocity_loads {
            load.apply(t, state);
        }
    }
}

/// `IC` deck: per-zone initial velocity plus a rigid angular velocity about
/// each particle's own center (`v = v0 + omega x r`), matching spec §8
/// scenario 5's "prescribed initial angular velocity about z-axis".
fn apply_initial_conditions(ic: &[IcEntry], particles: &[Particle], state: &mut ModelState) {
    for entry in ic {
        let v0 = Vec3::from(entry.velocity);
        let omega = Vec3::from(entry.angular_velocity);

        for particle in particles.iter().filter(|p| p.zone == entry.zone) {
            for local in 0..particle.node_count() {
                let i = particle.slice.start + local;
                let r = state.x_ref[i] - particle.bounding_center;
                state.v[i] = v0 + omega.cross(r);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bc::{SpatialFunction, TimeFunction};
    use crate::config::material::{InfluenceFnKind, MaterialKind};
    use crate::geometry::Geometry;
    use crate::influence::InfluenceFn;
    use crate::math::Transform;
    use crate::mesh::Mesh;
    use crate::particle::{MaterialParams, ParticleRegistry};

    fn one_node_particle(id: u32, zone: u32) -> (ModelState, Vec<Particle>) {
        let mut registry = ParticleRegistry::default();
        let geometry = Geometry::Circle { center: [0.0; 3], radius: 0.002 };
        let mesh = Mesh {
            nodes: vec![Vec3::new(0.001, 0.0, 0.0)],
            elements: Vec::new(),
            nodal_volumes: vec![1e-9],
        };
        let refp = crate::particle::ReferenceParticle::new(geometry, mesh, 0.2, 0.001);
        let refp_id = registry.reference_particles.insert(refp);

        let mat = MaterialParams {
            kind: MaterialKind::PMBBond,
            density: 1200.0,
            bulk_modulus: 2.16e7,
            shear_modulus: 0.0,
            horizon: 0.001,
            critical_strain: 1e-4,
            influence_fn: InfluenceFn::new(InfluenceFnKind::Constant, &[], 2),
            pmb_constant: 1.0,
        };

        let mut state = ModelState::default();
        registry.instantiate(id, zone, refp_id, Transform::identity(), mat, 0.0009, true, false, &mut state);
        (state, registry.particles)
    }

    #[test]
    fn zero_displacement_bc_sets_fix_and_zeroes_velocity() {
        let (mut state, particles) = one_node_particle(0, 0);
        state.v[0] = Vec3::new(5.0, 0.0, 0.0);

        let deck = BcDeck {
            selection: Selection::Particle,
            include_particles: vec![0],
            exclude_particles: Vec::new(),
            region: None,
            time_function: TimeFunction::Constant,
            spatial_function: SpatialFunction::Constant,
            direction: vec![0],
            zero_displacement: true,
        };

        let _loads = LoadSet::build(&[], std::slice::from_ref(&deck), &[], &particles, &mut state);

        assert_eq!(state.fix[0] & DOF_X, DOF_X);
        assert_eq!(state.v[0].x, 0.0);
    }

    #[test]
    fn prescribed_velocity_overwrites_dof_every_call() {
        let (mut state, particles) = one_node_particle(0, 0);

        let deck = BcDeck {
            selection: Selection::Particle,
            include_particles: vec![0],
            exclude_particles: Vec::new(),
            region: None,
            time_function: TimeFunction::Linear { slope: 2.0 },
            spatial_function: SpatialFunction::Constant,
            direction: vec![0],
            zero_displacement: false,
        };

        let loads = LoadSet::build(&[], std::slice::from_ref(&deck), &[], &particles, &mut state);
        assert_eq!(state.fix[0] & DOF_X, 0, "nonzero prescribed velocity must not set fix");

        loads.apply_prescribed_velocity(3.0, &mut state);
        assert!((state.v[0].x - 6.0).abs() < 1e-12);
    }

    #[test]
    fn initial_condition_angular_velocity_gives_tangential_v() {
        let (mut state, particles) = one_node_particle(0, 0);
        let ic = [IcEntry {
            zone: 0,
            velocity: [0.0, 0.0, 0.0],
            angular_velocity: [0.0, 0.0, 10.0],
        }];

        apply_initial_conditions(&ic, &particles, &mut state);

        // Node at reference (0.001, 0, 0) relative to the particle's
        // bounding center (approximately the origin here); v = omega x r.
        assert!(state.v[0].y.abs() > 1e-6);
    }
}
