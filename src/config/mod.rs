//! JSON input deck: one `serde`-derived tree mirroring the top-level keys
//! `Model, Output, Restart, Test, Force_BC, Displacement_BC, IC, Particle,
//! Mesh, Material, Contact, Neighbor, Particle_Generation`. Deserialization
//! alone can't express "every zone referenced by Particle_Generation has a
//! matching Material/Mesh/Contact entry" — that's `Config::validate`.

pub mod bc;
pub mod contact;
pub mod generation;
pub mod material;
pub mod mesh;
pub mod model;
pub mod neighbor;
pub mod output;
pub mod particle;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use bc::{BcDeck, IcEntry};
pub use contact::ContactPairDeck;
pub use generation::ParticleGenerationDeck;
pub use material::MaterialDeck;
pub use mesh::MeshDeck;
pub use model::ModelDeck;
pub use neighbor::NeighborDeck;
pub use output::{OutputDeck, RestartDeck};
pub use particle::ParticleZoneDeck;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(rename = "Model")]
    pub model: ModelDeck,
    #[serde(rename = "Output", default)]
    pub output: OutputDeck,
    #[serde(rename = "Restart", default)]
    pub restart: RestartDeck,
    /// Free-form test metadata; not interpreted by the core, only
    /// round-tripped.
    #[serde(rename = "Test", default)]
    pub test: Option<serde_json::Value>,
    #[serde(rename = "Force_BC", default)]
    pub force_bc: Vec<BcDeck>,
    #[serde(rename = "Displacement_BC", default)]
    pub displacement_bc: Vec<BcDeck>,
    #[serde(rename = "IC", default)]
    pub ic: Vec<IcEntry>,
    /// Uniform gravitational acceleration, applied to every non-wall
    /// particle when present (spec §4.5). Mirrors the upstream
    /// `d_gravityActive`/`d_gravity` pair (`original_source/src/inp/
    /// pdecks/particleDeck.h`) collapsed into a single `Option`.
    #[serde(rename = "Gravity", default)]
    pub gravity: Option<[f64; 3]>,
    #[serde(rename = "Particle")]
    pub particle: Vec<ParticleZoneDeck>,
    #[serde(rename = "Mesh")]
    pub mesh: Vec<MeshDeck>,
    #[serde(rename = "Material")]
    pub material: Vec<MaterialDeck>,
    #[serde(rename = "Contact", default)]
    pub contact: Vec<ContactPairDeck>,
    #[serde(rename = "Neighbor")]
    pub neighbor: NeighborDeck,
    #[serde(rename = "Particle_Generation")]
    pub particle_generation: ParticleGenerationDeck,
}

impl Config {
    /// Load and validate a deck from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Cross-reference validation that `serde` can't express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;

        let material_zones: HashSet<u32> = self.material.iter().map(|m| m.zone).collect();
        let mesh_zones: HashSet<u32> = self.mesh.iter().map(|m| m.zone).collect();
        let particle_zones: HashSet<u32> = self.particle.iter().map(|p| p.zone).collect();

        // `Use_Particle_Geometry` instantiates one particle per `Particle`
        // zone directly, so that zone must also carry a `Material` entry of
        // the same id. `From_File` instead looks materials up by each
        // instance's own `Material_Id`, so a `Particle` zone there is only
        // a geometry/mesh template and isn't required to have a same-id
        // material (checked separately below, against `Material_Id`).
        let requires_same_zone_material = matches!(
            self.particle_generation,
            ParticleGenerationDeck::UseParticleGeometry
        );

        for &zone in &particle_zones {
            if requires_same_zone_material && !material_zones.contains(&zone) {
                return Err(ConfigError::DanglingZoneReference {
                    zone,
                    kind: "Material",
                });
            }
            if !mesh_zones.contains(&zone) {
                return Err(ConfigError::DanglingZoneReference {
                    zone,
                    kind: "Mesh",
                });
            }
        }

        for m in &self.material {
            m.material_kind()?;
        }

        for pair in &self.contact {
            if pair.resolve_kn().is_none() {
                return Err(ConfigError::MissingField {
                    field: "Kn or V_max".to_string(),
                    context: format!("Contact pair ({}, {})", pair.zone_a, pair.zone_b),
                });
            }
            // Matches the upstream deck's own check: a friction coefficient
            // or tangential stiffness of zero with friction enabled is a
            // modeling error, not a silently-inert setting (spec §7).
            if pair.friction_on && pair.mu < 1e-10 {
                return Err(ConfigError::InvalidValue {
                    field: format!("Contact[{}, {}].mu", pair.zone_a, pair.zone_b),
                    reason: "friction coefficient can not be zero when Friction_On is set".to_string(),
                });
            }
            if pair.friction_on && pair.k < 1e-10 {
                return Err(ConfigError::InvalidValue {
                    field: format!("Contact[{}, {}].k", pair.zone_a, pair.zone_b),
                    reason: "tangential stiffness K can not be zero when Friction_On is set".to_string(),
                });
            }
        }

        // The zone id actually used for *contact* resolution (spec §4.4):
        // `Use_Particle_Geometry` contacts by `Particle.Zone` directly,
        // `From_File` contacts by each instance's own `Contact_Id` instead
        // (`simulation.rs::Model::build` passes exactly these as the
        // `zone` argument to `ParticleRegistry::instantiate`).
        let contact_zones: HashSet<u32> = match &self.particle_generation {
            ParticleGenerationDeck::UseParticleGeometry => particle_zones.clone(),
            ParticleGenerationDeck::FromFile { particles } => {
                particles.iter().map(|p| p.contact_id).collect()
            }
        };

        if let ParticleGenerationDeck::FromFile { particles } = &self.particle_generation {
            for entry in particles {
                if !material_zones.contains(&entry.material_id) {
                    return Err(ConfigError::DanglingZoneReference {
                        zone: entry.material_id,
                        kind: "Material",
                    });
                }
                if !particle_zones.contains(&entry.geometry_id) {
                    return Err(ConfigError::DanglingZoneReference {
                        zone: entry.geometry_id,
                        kind: "Particle",
                    });
                }
                if !mesh_zones.contains(&entry.geometry_id) {
                    return Err(ConfigError::DanglingZoneReference {
                        zone: entry.geometry_id,
                        kind: "Mesh",
                    });
                }
            }
        }

        // Every *distinct* pair of contact zones that will actually be
        // instantiated must have a `Contact` entry: `ContactLookup` only
        // falls back to the self-contact formula for same-zone pairs
        // (spec §9 Open Question 2), so two different zones with no
        // explicit entry would otherwise surface as a runtime
        // `ModelError::MissingContactPair` the first time they touch,
        // rather than the fatal startup error spec §7/§4.7 require.
        let configured_pairs: HashSet<(u32, u32)> = self
            .contact
            .iter()
            .map(|p| (p.zone_a.min(p.zone_b), p.zone_a.max(p.zone_b)))
            .collect();

        let mut zones: Vec<u32> = contact_zones.into_iter().collect();
        zones.sort_unstable();
        for (idx, &za) in zones.iter().enumerate() {
            for &zb in &zones[idx + 1..] {
                if !configured_pairs.contains(&(za, zb)) {
                    return Err(ConfigError::MissingContactPair { zone_a: za, zone_b: zb });
                }
            }
        }

        Ok(())
    }
}
