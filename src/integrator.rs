//! Explicit time integration: central-difference and velocity-Verlet
//! (spec §4.5), both driving the same `a = f/rho` dof-masked update.
//!
//! Grounded on the teacher's fixed-step physics loop (`src/physics/mod.rs`'s
//! `step` function), which also separates "integrate velocity" from
//! "integrate position" as two small free functions rather than one combined
//! euler step — that separation is what lets velocity-Verlet reuse the same
//! half-kick primitive twice.

use vek::Vec3;

use crate::loads::LoadSet;
use crate::particle::Particle;
use crate::state::{ModelState, DOF_X, DOF_Y, DOF_Z};

/// `a = f/rho + gravity`, zeroing any dof whose `fix` bit is set (spec §4.5
/// step 2). Gravity is added only for non-wall particles (spec §4.5:
/// "added to a for all non-wall particles when enabled"); wall particles
/// (`compute_force == false`) still take `f/rho` (always zero, since their
/// forces are never evaluated) and fixity.
fn compute_acceleration(state: &ModelState, particles: &[Particle], gravity: Vec3<f64>) -> Vec<Vec3<f64>> {
    let mut accel = vec![Vec3::zero(); state.len()];
    for particle in particles {
        let density = particle.material.density;
        let g = if particle.compute_force { gravity } else { Vec3::zero() };
        for i in particle.slice.clone() {
            let mut a = state.f[i] / density + g;
            let fix = state.fix[i];
            if fix & DOF_X != 0 {
                a.x = 0.0;
            }
            if fix & DOF_Y != 0 {
                a.y = 0.0;
            }
            if fix & DOF_Z != 0 {
                a.z = 0.0;
            }
            accel[i] = a;
        }
    }
    accel
}

/// `v += dt * a`, then zero any fixed dof (spec §3 invariant: a fixed dof
/// always reads back zero velocity) and overwrite nonzero-prescribed-
/// velocity dofs from `loads`.
fn integrate_velocity(state: &mut ModelState, accel: &[Vec3<f64>], dt: f64, t: f64, loads: &LoadSet) {
    for i in 0..state.len() {
        state.v[i] += accel[i] * dt;
        let fix = state.fix[i];
        if fix & DOF_X != 0 {
            state.v[i].x = 0.0;
        }
        if fix & DOF_Y != 0 {
            state.v[i].y = 0.0;
        }
        if fix & DOF_Z != 0 {
            state.v[i].z = 0.0;
        }
    }
    loads.apply_prescribed_velocity(t, state);
}

/// `u += dt * v; x = x_ref + u` (spec §4.1 invariant, maintained exactly
/// rather than drifting through independent integration of `x`).
fn integrate_position(state: &mut ModelState, dt: f64) {
    for i in 0..state.len() {
        state.u[i] += state.v[i] * dt;
        state.x[i] = state.x_ref[i] + state.u[i];
    }
}

/// Which explicit scheme drives `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    CentralDifference,
    VelocityVerlet,
}

impl Scheme {
    pub fn from_time_scheme(scheme: crate::config::model::TimeScheme) -> Self {
        match scheme {
            crate::config::model::TimeScheme::CentralDifference => Scheme::CentralDifference,
            crate::config::model::TimeScheme::VelocityVerlet => Scheme::VelocityVerlet,
        }
    }
}

/// Advance `state` by one step of size `dt`, given the force array already
/// populated for time `t` (bond + contact + Force_BC) by the caller. `t` is
/// the current step's time, used to evaluate prescribed-velocity loads.
///
/// Central difference: one velocity half-step, one position step.
/// Velocity-Verlet needs a second force evaluation mid-step, so it takes a
/// closure to recompute forces at the half-stepped position — this mirrors
/// the teacher's `step` taking a `resolve_forces` callback rather than
/// hardcoding a single force source.
pub fn advance_central_difference(
    state: &mut ModelState,
    particles: &[Particle],
    gravity: Vec3<f64>,
    dt: f64,
    t: f64,
    loads: &LoadSet,
) {
    let accel = compute_acceleration(state, particles, gravity);
    integrate_velocity(state, &accel, dt, t, loads);
    integrate_position(state, dt);
}

/// Velocity-Verlet: half-kick with the force at `t`, drift, let the caller
/// recompute forces at `t + dt`, then finish with a half-kick using the new
/// force. `recompute_forces` must clear and refill `state.f` (bond + contact
/// + Force_BC) for the drifted position.
pub fn advance_velocity_verlet(
    state: &mut ModelState,
    particles: &[Particle],
    gravity: Vec3<f64>,
    dt: f64,
    t: f64,
    loads: &LoadSet,
    mut recompute_forces: impl FnMut(&mut ModelState),
) {
    let accel_old = compute_acceleration(state, particles, gravity);
    integrate_velocity(state, &accel_old, dt * 0.5, t, loads);
    integrate_position(state, dt);

    recompute_forces(state);
    loads.apply_force(t + dt, state);

    let accel_new = compute_acceleration(state, particles, gravity);
    integrate_velocity(state, &accel_new, dt * 0.5, t + dt, loads);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::material::MaterialKind;
    use crate::influence::InfluenceFn;

    fn one_free_node(density: f64) -> (ModelState, Vec<Particle>) {
        let mut state = ModelState::default();
        state.push_node(Vec3::zero(), 1e-9, 0);

        let material = crate::particle::MaterialParams {
            kind: MaterialKind::PMBBond,
            density,
            bulk_modulus: 1.0,
            shear_modulus: 0.0,
            horizon: 1.0,
            critical_strain: 1.0,
            influence_fn: InfluenceFn::new(
                crate::config::material::InfluenceFnKind::Constant,
                &[],
                2,
            ),
            pmb_constant: 1.0,
        };
        let particle = Particle {
            id: 0,
            zone: 0,
            slice: 0..1,
            reference_particle: Default::default(),
            transform: crate::math::Transform::identity(),
            material,
            contact_radius: 0.0,
            horizon: 1.0,
            mesh_size: 1.0,
            compute_force: true,
            all_dofs_constrained: false,
            bounding_center: Vec3::zero(),
            bounding_radius: 0.0,
        };
        (state, vec![particle])
    }

    #[test]
    fn gravity_accelerates_a_free_node() {
        let (mut state, particles) = one_free_node(1.0);
        let loads = LoadSet::build(&[], &[], &[], &particles, &mut state);
        let gravity = Vec3::new(0.0, -9.8, 0.0);

        advance_central_difference(&mut state, &particles, gravity, 1e-3, 0.0, &loads);

        assert!((state.v[0].y - (-9.8e-3)).abs() < 1e-12);
        assert!(state.u[0].y < 0.0);
        assert!(state.check_position_invariant(1e-12));
    }

    #[test]
    fn fixed_dof_never_gains_velocity() {
        let (mut state, particles) = one_free_node(1.0);
        state.fix[0] = DOF_X | DOF_Y | DOF_Z;
        let loads = LoadSet::build(&[], &[], &[], &particles, &mut state);
        let gravity = Vec3::new(0.0, -9.8, 0.0);

        advance_central_difference(&mut state, &particles, gravity, 1e-3, 0.0, &loads);

        assert_eq!(state.v[0], Vec3::zero());
        assert_eq!(state.u[0], Vec3::zero());
        assert!(state.check_fixity_invariant());
    }

    #[test]
    fn wall_particle_is_unaffected_by_gravity() {
        let (mut state, mut particles) = one_free_node(1.0);
        particles[0].compute_force = false;
        let loads = LoadSet::build(&[], &[], &[], &particles, &mut state);
        let gravity = Vec3::new(0.0, -9.8, 0.0);

        advance_central_difference(&mut state, &particles, gravity, 1e-3, 0.0, &loads);

        assert_eq!(state.v[0], Vec3::zero());
        assert_eq!(state.u[0], Vec3::zero());
    }

    #[test]
    fn velocity_verlet_matches_central_difference_for_constant_force() {
        let (mut state_cd, particles) = one_free_node(1.0);
        let (mut state_vv, _) = one_free_node(1.0);
        let loads_cd = LoadSet::build(&[], &[], &[], &particles, &mut state_cd);
        let loads_vv = LoadSet::build(&[], &[], &[], &particles, &mut state_vv);
        let gravity = Vec3::new(0.0, -9.8, 0.0);
        let dt = 1e-3;

        advance_central_difference(&mut state_cd, &particles, gravity, dt, 0.0, &loads_cd);
        advance_velocity_verlet(&mut state_vv, &particles, gravity, dt, 0.0, &loads_vv, |s| {
            s.clear_forces();
        });

        assert!((state_cd.v[0].y - state_vv.v[0].y).abs() < 1e-9);
        assert!((state_cd.u[0].y - state_vv.u[0].y).abs() < 1e-9);
    }
}
