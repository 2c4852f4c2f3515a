//! The `Model`: wires config, mesh I/O, particle generation, bond/contact
//! engines, loads, and the integrator into the fixed per-step order spec §5
//! names (bond pass -> contact pass -> external loads -> integrator).
//!
//! Grounded on the teacher's top-level `Game`/`World` struct
//! (`src/game.rs`, `src/world.rs`): one struct owning every subsystem,
//! built once from config, with a single `step`-style method the driver
//! calls in a loop.

use std::collections::HashMap;
use std::path::Path;

use vek::Vec3;

use crate::bond::{self, BondTopology};
use crate::config::generation::ParticleGenerationDeck;
use crate::config::material::MaterialDeck;
use crate::config::mesh::MeshDeck;
use crate::config::particle::ParticleZoneDeck;
use crate::config::Config;
use crate::contact::{ContactEngine, ContactLookup};
use crate::error::ModelError;
use crate::integrator::{self, Scheme};
use crate::loads::LoadSet;
use crate::math::{AxisAngle, Transform};
use crate::mesh_io;
use crate::neighbor_update::NeighborController;
use crate::output::RestartState;
use crate::particle::{MaterialParams, ParticleRegistry, ReferenceParticleId};
use crate::state::{ModelState, DOF_X, DOF_Y, DOF_Z};

fn build_material_params(deck: &MaterialDeck, dimension: u8) -> Result<MaterialParams, ModelError> {
    let kind = deck
        .material_kind()
        .map_err(|_| ModelError::UnknownZone { particle: deck.zone, zone: deck.zone })?;
    Ok(MaterialParams {
        kind,
        density: deck.density,
        bulk_modulus: deck.bulk_modulus,
        shear_modulus: deck.shear_modulus,
        horizon: deck.horizon,
        critical_strain: deck.critical_strain,
        influence_fn: deck.influence_fn(dimension),
        pmb_constant: deck.pmb_constant(dimension),
    })
}

/// Loads and caches one reference particle per template zone: the geometry
/// comes from that zone's `Particle` deck entry, the mesh from its `Mesh`
/// deck entry. Shared by every instance generated from the same zone
/// (spec §9 "shared reference particles").
struct ReferenceParticleLoader<'a> {
    particle_decks: &'a HashMap<u32, &'a ParticleZoneDeck>,
    mesh_decks: &'a HashMap<u32, &'a MeshDeck>,
    near_bd_tolerance: f64,
    cache: HashMap<u32, ReferenceParticleId>,
}

impl<'a> ReferenceParticleLoader<'a> {
    fn get_or_build(
        &mut self,
        zone: u32,
        horizon: f64,
        registry: &mut ParticleRegistry,
    ) -> Result<(ReferenceParticleId, f64), ModelError> {
        if let Some(&id) = self.cache.get(&zone) {
            let mesh_size = registry.reference_particles[id].mesh.characteristic_size();
            return Ok((id, mesh_size));
        }

        let particle_deck = self
            .particle_decks
            .get(&zone)
            .ok_or(ModelError::UnknownZone { particle: zone, zone })?;
        let mesh_deck = self
            .mesh_decks
            .get(&zone)
            .ok_or(ModelError::UnknownZone { particle: zone, zone })?;

        let mesh = mesh_io::load(Path::new(&mesh_deck.file))?;
        let mesh_size = mesh_deck.mesh_size.unwrap_or_else(|| mesh.characteristic_size());

        // A geometry_id is assumed to carry one material (the common case:
        // identical particles in a pile), so the horizon used for the
        // boundary-node precompute is the first material seen for this
        // zone. Mixing materials under one geometry_id would make that
        // precompute approximate for the others; spec's Particle_Generation
        // model doesn't describe that case.
        let refp = crate::particle::ReferenceParticle::new(
            particle_deck.geometry.clone(),
            mesh,
            self.near_bd_tolerance,
            horizon,
        );
        let id = registry.reference_particles.insert(refp);
        self.cache.insert(zone, id);
        Ok((id, mesh_size))
    }
}

/// The fully built simulation: state, particle registry, engines, and the
/// bookkeeping needed to advance one step at a time.
pub struct Model {
    pub state: ModelState,
    pub registry: ParticleRegistry,
    pub bonds: BondTopology,
    pub contacts: ContactLookup,
    pub contact_engine: ContactEngine,
    pub neighbor: NeighborController,
    pub loads: LoadSet,
    pub scheme: Scheme,
    pub dt: f64,
    pub dimension: u8,
    pub gravity: Vec3<f64>,
    pub step: u64,
    pub time: f64,
}

impl Model {
    /// Build a full `Model` from a validated config: load every zone's
    /// mesh, instantiate every particle (`From_File` or
    /// `Use_Particle_Geometry`), build the bond topology, resolve contact
    /// parameters, and apply initial conditions.
    pub fn build(config: &Config) -> Result<Self, ModelError> {
        let dimension = config.model.dimension;

        let particle_decks: HashMap<u32, &ParticleZoneDeck> =
            config.particle.iter().map(|p| (p.zone, p)).collect();
        let mesh_decks: HashMap<u32, &MeshDeck> = config.mesh.iter().map(|m| (m.zone, m)).collect();
        let material_decks: HashMap<u32, &MaterialDeck> =
            config.material.iter().map(|m| (m.zone, m)).collect();

        let mut loader = ReferenceParticleLoader {
            particle_decks: &particle_decks,
            mesh_decks: &mesh_decks,
            near_bd_tolerance: config.neighbor.near_bd_tolerance,
            cache: HashMap::new(),
        };

        let mut registry = ParticleRegistry::default();
        let mut state = ModelState::default();
        let mut next_id: u32 = 0;

        match &config.particle_generation {
            ParticleGenerationDeck::UseParticleGeometry => {
                for pz in &config.particle {
                    let material_deck = material_decks
                        .get(&pz.zone)
                        .ok_or(ModelError::UnknownZone { particle: next_id, zone: pz.zone })?;
                    let material = build_material_params(material_deck, dimension)?;
                    let (refp_id, mesh_size) =
                        loader.get_or_build(pz.zone, material.horizon, &mut registry)?;

                    let contact_radius = 0.9 * mesh_size;
                    let id = next_id;
                    next_id += 1;

                    registry.instantiate(
                        id,
                        pz.zone,
                        refp_id,
                        Transform::identity(),
                        material,
                        contact_radius,
                        !pz.is_wall,
                        pz.all_dofs_constrained,
                        &mut state,
                    );
                }
            }
            ParticleGenerationDeck::FromFile { particles } => {
                for entry in particles {
                    let template = particle_decks
                        .get(&entry.geometry_id)
                        .ok_or(ModelError::UnknownZone { particle: next_id, zone: entry.geometry_id })?;
                    let material_deck = material_decks
                        .get(&entry.material_id)
                        .ok_or(ModelError::UnknownZone { particle: next_id, zone: entry.material_id })?;
                    let material = build_material_params(material_deck, dimension)?;
                    let (refp_id, mesh_size) =
                        loader.get_or_build(entry.geometry_id, material.horizon, &mut registry)?;

                    let transform = Transform::new(
                        Vec3::zero(), // overwritten by `instantiate` with the geometry's own center
                        Vec3::new(entry.x, entry.y, entry.z),
                        AxisAngle::new(Vec3::unit_z(), entry.theta),
                        entry.scale,
                    );

                    let contact_radius = 0.9 * mesh_size * entry.scale;
                    let id = next_id;
                    next_id += 1;

                    registry.instantiate(
                        id,
                        entry.contact_id,
                        refp_id,
                        transform,
                        material,
                        contact_radius,
                        !template.is_wall,
                        template.all_dofs_constrained,
                        &mut state,
                    );
                }
            }
        }

        for particle in &registry.particles {
            if particle.all_dofs_constrained {
                for i in particle.slice.clone() {
                    state.fix[i] |= DOF_X | DOF_Y | DOF_Z;
                }
            }
        }

        let bonds = BondTopology::build(&state, &registry.particles);
        bond::compute_weighted_volumes(&bonds, &mut state, &registry.particles);

        let contacts = ContactLookup::build(&config.contact, &registry)?;

        let mut contact_engine = ContactEngine::default();
        let mut neighbor = NeighborController::new(&config.neighbor);
        neighbor.maybe_rebuild(&mut contact_engine, &state, &registry, 0);

        let loads = LoadSet::build(
            &config.force_bc,
            &config.displacement_bc,
            &config.ic,
            &registry.particles,
            &mut state,
        );

        let gravity = config.gravity.map(Vec3::from).unwrap_or_else(Vec3::zero);
        let scheme = Scheme::from_time_scheme(config.model.time_scheme);
        let dt = config.model.dt();

        Ok(Self {
            state,
            registry,
            bonds,
            contacts,
            contact_engine,
            neighbor,
            loads,
            scheme,
            dt,
            dimension,
            gravity,
            step: 0,
            time: 0.0,
        })
    }

    /// Advance the model by one step: bond pass, contact pass, external
    /// loads, integrator (spec §5's fixed total order), then the
    /// neighbor-update controller's rebuild decision.
    pub fn advance(&mut self) -> Result<(), ModelError> {
        #[cfg(feature = "profile")]
        puffin::profile_scope!("Model step");

        self.state.clear_forces();

        {
            #[cfg(feature = "profile")]
            puffin::profile_scope!("Bond pass");
            bond::step(&self.bonds, &mut self.state, &self.registry.particles, self.dimension);
        }

        {
            #[cfg(feature = "profile")]
            puffin::profile_scope!("Contact pass");
            self.contact_engine.step(&mut self.state, &self.registry.particles, &self.contacts)?;
        }

        self.loads.apply_force(self.time, &mut self.state);

        match self.scheme {
            Scheme::CentralDifference => {
                #[cfg(feature = "profile")]
                puffin::profile_scope!("Integrate: central difference");
                integrator::advance_central_difference(
                    &mut self.state,
                    &self.registry.particles,
                    self.gravity,
                    self.dt,
                    self.time,
                    &self.loads,
                );
            }
            Scheme::VelocityVerlet => {
                #[cfg(feature = "profile")]
                puffin::profile_scope!("Integrate: velocity verlet");

                let bonds = &self.bonds;
                let particles = &self.registry.particles;
                let contact_engine = &self.contact_engine;
                let contacts = &self.contacts;
                let loads = &self.loads;
                let dimension = self.dimension;
                let gravity = self.gravity;
                let dt = self.dt;
                let t = self.time;

                let mut err = None;
                integrator::advance_velocity_verlet(&mut self.state, particles, gravity, dt, t, loads, |s| {
                    s.clear_forces();
                    bond::step(bonds, s, particles, dimension);
                    if let Err(e) = contact_engine.step(s, particles, contacts) {
                        err = Some(e);
                    }
                });
                if let Some(e) = err {
                    return Err(e);
                }
            }
        }

        self.step += 1;
        self.time += self.dt;

        {
            #[cfg(feature = "profile")]
            puffin::profile_scope!("Recompute bounding spheres");
            for particle in &mut self.registry.particles {
                particle.recompute_bounding_sphere(&self.state);
            }
        }
        self.neighbor.maybe_rebuild(&mut self.contact_engine, &self.state, &self.registry, self.step);

        Ok(())
    }

    /// Replace the live state with one loaded from a restart blob and
    /// rebuild the spatial index against it, so the step loop can resume
    /// exactly where it left off.
    pub fn restore_from_restart(&mut self, restart: RestartState) {
        self.state = restart.state;
        self.step = restart.step;
        self.time = restart.time;

        for particle in &mut self.registry.particles {
            particle.recompute_bounding_sphere(&self.state);
        }
        self.neighbor.maybe_rebuild(&mut self.contact_engine, &self.state, &self.registry, self.step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::contact::ContactPairDeck;
    use crate::config::material::{InfluenceFnKind, MaterialKind};
    use crate::geometry::Geometry;
    use crate::influence::InfluenceFn;
    use crate::mesh::Mesh;
    use crate::particle::ReferenceParticle;

    fn single_free_particle_config() -> Config {
        let json = serde_json::json!({
            "Model": {
                "Dimension": 2,
                "FinalTime": 1.0e-4,
                "NSteps": 100,
                "TimeScheme": "central_difference"
            },
            "Particle": [
                {"Zone": 0, "Geometry": {"kind": "circle", "center": [0.0, 0.0, 0.0], "radius": 0.002}}
            ],
            "Mesh": [
                {"Zone": 0, "File": "does-not-exist.msh"}
            ],
            "Material": [
                {
                    "Zone": 0, "Type": "PMBBond", "Density": 1200.0, "Horizon": 0.001,
                    "BulkModulus": 2.16e7, "CriticalStrain": 1.0e-4
                }
            ],
            "Neighbor": {
                "UpdateCriterion": "simple_all", "UpdateInterval": 50
            },
            "Particle_Generation": {
                "mode": "use_particle_geometry"
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn missing_mesh_file_surfaces_as_model_error() {
        let config = single_free_particle_config();
        let result = Model::build(&config);
        assert!(matches!(result, Err(ModelError::MeshIo { .. })));
    }

    fn pmb_material(horizon: f64, critical_strain: f64) -> MaterialParams {
        MaterialParams {
            kind: MaterialKind::PMBBond,
            density: 1200.0,
            bulk_modulus: 2.16e7,
            shear_modulus: 0.0,
            horizon,
            critical_strain,
            influence_fn: InfluenceFn::new(InfluenceFnKind::Constant, &[], 2),
            pmb_constant: 18.0 * 2.16e7 / (std::f64::consts::PI * horizon.powi(4)),
        }
    }

    /// Spec §8 scenario 1 / §8 invariant: an isolated particle's internal
    /// bond forces must conserve total momentum. On a uniform mesh (equal
    /// nodal volumes) every intact bond's contribution to node i is exactly
    /// cancelled by its reciprocal contribution to node j, even though each
    /// is written by a different thread from its own node's perspective
    /// (DESIGN.md Open Question 1) — this checks that cancellation holds
    /// end to end through the bond pass and the integrator.
    #[test]
    fn isolated_particle_bond_forces_conserve_total_momentum() {
        let h = 1.0e-3;
        let mut nodes = Vec::new();
        for iy in 0..3 {
            for ix in 0..3 {
                nodes.push(Vec3::new(ix as f64 * h, iy as f64 * h, 0.0));
            }
        }
        let mesh = Mesh {
            nodes,
            elements: Vec::new(),
            nodal_volumes: vec![h * h; 9],
        };
        let geometry = Geometry::Rectangle {
            center: [h, h, 0.0],
            extents: [2.0 * h, 2.0 * h, 0.0],
        };
        let refp = ReferenceParticle::new(geometry, mesh, 0.2, 1.5e-3);

        let mut registry = ParticleRegistry::default();
        let refp_id = registry.reference_particles.insert(refp);

        let mut state = ModelState::default();
        registry.instantiate(
            0,
            0,
            refp_id,
            Transform::identity(),
            pmb_material(1.5e-3, 1.0),
            0.0,
            true,
            false,
            &mut state,
        );
        let particles = registry.particles;
        let density = particles[0].material.density;

        // Perturb one node, everything else starts at rest.
        state.v[4] = Vec3::new(1.0e-3, 0.0, 0.0);

        let topology = BondTopology::build(&state, &particles);
        let loads = LoadSet::build(&[], &[], &[], &particles, &mut state);
        let dt = 1.0e-8;

        let total_momentum = |state: &ModelState| -> Vec3<f64> {
            (0..state.len())
                .map(|i| state.v[i] * density * state.vol[i])
                .fold(Vec3::zero(), |a, b| a + b)
        };
        let initial = total_momentum(&state);

        for step in 0..20u32 {
            state.clear_forces();
            bond::step(&topology, &mut state, &particles, 2);
            integrator::advance_central_difference(
                &mut state,
                &particles,
                Vec3::zero(),
                dt,
                step as f64 * dt,
                &loads,
            );

            let current = total_momentum(&state);
            assert!(
                (current - initial).magnitude() < 1.0e-12,
                "momentum drifted at step {step}: {current:?} vs {initial:?}"
            );
        }
    }

    /// Builds a single-node, deformable "particle" at `center` for contact-
    /// only tests, where the bond engine has nothing to do (no in-particle
    /// neighbors) and every interaction comes from the contact engine.
    fn point_particle(
        id: u32,
        zone: u32,
        center: Vec3<f64>,
        contact_radius: f64,
        registry: &mut ParticleRegistry,
        state: &mut ModelState,
    ) {
        let refp = ReferenceParticle {
            geometry: Geometry::Circle { center: [0.0, 0.0, 0.0], radius: 1.0e-6 },
            mesh: Mesh {
                nodes: vec![Vec3::zero()],
                elements: Vec::new(),
                nodal_volumes: vec![1.0],
            },
            center_node: 0,
            boundary_nodes: vec![0],
        };
        let refp_id = registry.reference_particles.insert(refp);
        let transform = Transform::new(Vec3::zero(), center, AxisAngle::identity(), 1.0);

        registry.instantiate(
            id,
            zone,
            refp_id,
            transform,
            pmb_material(1.0e-3, 1.0),
            contact_radius,
            true,
            false,
            state,
        );
    }

    /// Spec §8 scenario 2: two particles approaching head-on with equal and
    /// opposite velocity, zero friction/no-fail elastic contact, must
    /// separate with each particle's speed restored to its initial value
    /// and direction reversed.
    #[test]
    fn two_particle_head_on_collision_restores_speed_and_reverses_direction() {
        let rc = 1.0;
        let mut registry = ParticleRegistry::default();
        let mut state = ModelState::default();

        point_particle(0, 0, Vec3::new(0.6, 0.0, 0.0), rc, &mut registry, &mut state);
        point_particle(1, 1, Vec3::new(-0.6, 0.0, 0.0), rc, &mut registry, &mut state);

        state.v[0] = Vec3::new(-1.0, 0.0, 0.0);
        state.v[1] = Vec3::new(1.0, 0.0, 0.0);

        let contact_deck = ContactPairDeck {
            zone_a: 0,
            zone_b: 1,
            kn: Some(3.0e6),
            v_max: None,
            delta_max: None,
            damping_on: false,
            eps: 1.0,
            beta_n_factor: 1.0,
            friction_on: false,
            mu: 0.0,
            k: 0.0,
            contact_radius: Some(rc),
            contact_radius_factor: None,
        };
        let contacts = ContactLookup::build(&[contact_deck], &registry).unwrap();
        let loads = LoadSet::build(&[], &[], &[], &registry.particles, &mut state);

        let mut engine = ContactEngine::default();
        let dt = 5.0e-5;

        for step in 0..8000u32 {
            engine.rebuild(&state, &registry, 0.0);
            state.clear_forces();
            engine.step(&mut state, &registry.particles, &contacts).unwrap();
            integrator::advance_central_difference(
                &mut state,
                &registry.particles,
                Vec3::zero(),
                dt,
                step as f64 * dt,
                &loads,
            );
            for particle in &mut registry.particles {
                particle.recompute_bounding_sphere(&state);
            }
        }

        // By the end of the run the particles have separated again (no
        // overlap), so their velocities are whatever the elastic bounce
        // left them with.
        assert!((state.x[0] - state.x[1]).magnitude() > rc);
        assert!((state.v[0].x - 1.0).abs() < 0.02, "v0 = {:?}", state.v[0]);
        assert!((state.v[1].x - (-1.0)).abs() < 0.02, "v1 = {:?}", state.v[1]);
        // Total momentum is exactly conserved throughout (equal masses,
        // equal and opposite contact force).
        assert!((state.v[0] + state.v[1]).magnitude() < 0.02);
    }
}
