//! Particle registry: particle id -> node slice + reference-particle handle
//! + transform + material + contact parameters. Reference particles are
//! kept in an append-only `slotmap` arena rather than behind `Rc`/`shared_ptr`
//! (spec §9 "shared reference particles").

use std::ops::Range;

use slotmap::{new_key_type, SlotMap};
use vek::Vec3;

use crate::config::material::MaterialKind;
use crate::geometry::Geometry;
use crate::influence::InfluenceFn;
use crate::math::Transform;
use crate::mesh::Mesh;
use crate::state::ModelState;

new_key_type! {
    pub struct ReferenceParticleId;
}

/// A deduplicated mesh + geometry + precomputed derived sets, shared by
/// every particle built from it.
#[derive(Debug, Clone)]
pub struct ReferenceParticle {
    pub geometry: Geometry,
    pub mesh: Mesh,
    /// Index into `mesh.nodes` of the node nearest the geometric center.
    pub center_node: usize,
    /// Indices of nodes within `near_bd_tolerance * horizon` of the
    /// geometric boundary — the only nodes eligible for contact queries
    /// (spec §4.4).
    pub boundary_nodes: Vec<usize>,
}

impl ReferenceParticle {
    pub fn new(geometry: Geometry, mesh: Mesh, near_bd_tolerance: f64, horizon: f64) -> Self {
        let center = geometry.center();
        let center_node = mesh
            .nodes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (**a - center)
                    .magnitude_squared()
                    .total_cmp(&(**b - center).magnitude_squared())
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        let tol = near_bd_tolerance * horizon;
        let boundary_nodes = mesh
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, &p)| geometry.is_near_boundary(p, tol))
            .map(|(i, _)| i)
            .collect();

        Self {
            geometry,
            mesh,
            center_node,
            boundary_nodes,
        }
    }
}

pub type ReferenceParticleArena = SlotMap<ReferenceParticleId, ReferenceParticle>;

/// Precomputed material parameters, derived once from `config::MaterialDeck`
/// and reused every step without re-parsing the deck.
#[derive(Debug, Clone)]
pub struct MaterialParams {
    pub kind: MaterialKind,
    pub density: f64,
    pub bulk_modulus: f64,
    pub shear_modulus: f64,
    pub horizon: f64,
    pub critical_strain: f64,
    pub influence_fn: InfluenceFn,
    pub pmb_constant: f64,
}

impl MaterialParams {
    /// Self-contact stiffness for a zone with no configured `(zone, zone)`
    /// contact pair entry, matching `original_source/src/particle/wall.cpp`:
    /// one horizon power higher than the bond constant since it feeds a
    /// surface (contact) force rather than a volumetric (bond) force.
    /// Mirrors `config::material::MaterialDeck::self_contact_kn`.
    pub fn self_contact_kn(&self) -> f64 {
        18.0 * self.bulk_modulus / (std::f64::consts::PI * self.horizon.powi(5))
    }
}

/// One particle: a contiguous node slice plus everything the bond/contact/
/// integrator passes need to process it.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: u32,
    pub zone: u32,
    pub slice: Range<usize>,
    pub reference_particle: ReferenceParticleId,
    pub transform: Transform,
    pub material: MaterialParams,
    pub contact_radius: f64,
    pub horizon: f64,
    pub mesh_size: f64,
    /// `false` => wall-like: forces never evaluated, dofs held (spec §3).
    pub compute_force: bool,
    pub all_dofs_constrained: bool,
    /// Current bounding-sphere center and radius, recomputed whenever the
    /// particle's nodes move past the coarse-index rebuild threshold.
    pub bounding_center: Vec3<f64>,
    pub bounding_radius: f64,
}

impl Particle {
    pub fn node_count(&self) -> usize {
        self.slice.end - self.slice.start
    }

    /// Recompute the bounding sphere from the current positions of this
    /// particle's nodes (spec §3 invariant: "always contains every current
    /// node").
    pub fn recompute_bounding_sphere(&mut self, state: &ModelState) {
        let slice = self.slice.clone();
        if slice.is_empty() {
            return;
        }

        let center: Vec3<f64> =
            state.x[slice.clone()].iter().copied().sum::<Vec3<f64>>() / slice.len() as f64;
        let radius = state.x[slice.clone()]
            .iter()
            .map(|&p| (p - center).magnitude())
            .fold(0.0, f64::max);

        self.bounding_center = center;
        self.bounding_radius = radius;
    }
}

/// The full set of particles plus the reference-particle arena they share.
#[derive(Debug, Clone, Default)]
pub struct ParticleRegistry {
    pub particles: Vec<Particle>,
    pub reference_particles: ReferenceParticleArena,
}

impl ParticleRegistry {
    /// Apply a particle's transform to its reference mesh once, producing
    /// the `x_ref` entries for every node of the particle (spec §4.2: "the
    /// transform is not re-applied; deformation is carried entirely by
    /// `u`").
    pub fn instantiate(
        &mut self,
        id: u32,
        zone: u32,
        reference_particle: ReferenceParticleId,
        transform: Transform,
        material: MaterialParams,
        contact_radius: f64,
        compute_force: bool,
        all_dofs_constrained: bool,
        state: &mut ModelState,
    ) -> usize {
        let refp = &self.reference_particles[reference_particle];
        let pivot = refp.geometry.center();
        let mut transform = transform;
        transform.pivot = pivot;

        let start = state.len();
        for (i, &p) in refp.mesh.nodes.iter().enumerate() {
            let x_ref = transform.apply(p);
            let vol = refp.mesh.nodal_volumes.get(i).copied().unwrap_or(0.0);
            state.push_node(x_ref, vol, id);
        }
        let end = state.len();

        let horizon = material.horizon;
        let mesh_size = refp.mesh.characteristic_size();

        let particle = Particle {
            id,
            zone,
            slice: start..end,
            reference_particle,
            transform,
            material,
            contact_radius,
            horizon,
            mesh_size,
            compute_force,
            all_dofs_constrained,
            bounding_center: Vec3::zero(),
            bounding_radius: 0.0,
        };

        let idx = self.particles.len();
        self.particles.push(particle);
        self.particles[idx].recompute_bounding_sphere(state);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::material::{InfluenceFnKind, MaterialKind};

    fn sample_material() -> MaterialParams {
        MaterialParams {
            kind: MaterialKind::PMBBond,
            density: 1200.0,
            bulk_modulus: 2.16e7,
            shear_modulus: 0.0,
            horizon: 0.001,
            critical_strain: 1e-4,
            influence_fn: InfluenceFn::new(InfluenceFnKind::Constant, &[], 2),
            pmb_constant: 18.0 * 2.16e7 / (std::f64::consts::PI * 0.001f64.powi(4)),
        }
    }

    #[test]
    fn instantiate_places_nodes_via_transform() {
        let mut registry = ParticleRegistry::default();
        let geometry = Geometry::Circle {
            center: [0.0, 0.0, 0.0],
            radius: 0.002,
        };
        let mesh = Mesh {
            nodes: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.001, 0.0, 0.0)],
            elements: vec![],
            nodal_volumes: vec![1e-9, 1e-9],
        };
        let refp = ReferenceParticle::new(geometry, mesh, 0.2, 0.001);
        let refp_id = registry.reference_particles.insert(refp);

        let mut state = ModelState::default();
        let transform = Transform::new(
            Vec3::zero(),
            Vec3::new(5.0, 0.0, 0.0),
            crate::math::AxisAngle::identity(),
            1.0,
        );
        registry.instantiate(
            0,
            0,
            refp_id,
            transform,
            sample_material(),
            0.0009,
            true,
            false,
            &mut state,
        );

        assert_eq!(state.len(), 2);
        assert_eq!(state.x_ref[0], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(state.x_ref[1], Vec3::new(5.001, 0.0, 0.0));
    }
}
