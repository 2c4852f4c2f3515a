use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Spatial discretization used to turn mesh data into node quantities.
/// The simulator core only cares that a scheme was named; it does not
/// itself implement "weak_finite_element"/"nodal_finite_element" assembly
/// (those are mesh-input concerns), so this field round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialScheme {
    FiniteDifference,
    WeakFiniteElement,
    NodalFiniteElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScheme {
    CentralDifference,
    VelocityVerlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleSimType {
    SingleParticle,
    MultiParticle,
}

/// `Model` top-level deck key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelDeck {
    pub dimension: u8,
    pub final_time: f64,
    pub n_steps: u64,
    #[serde(default = "default_spatial_scheme")]
    pub spatial_scheme: SpatialScheme,
    pub time_scheme: TimeScheme,
    #[serde(default = "default_sim_type")]
    pub particle_sim_type: ParticleSimType,
    #[serde(default = "default_quadrature_order")]
    pub quadrature_order: u32,
    /// Round-tripped from the deck (spec §6) but not consumed anywhere: every
    /// operation this crate implements (bond pass, contact pass, integrator)
    /// is a deterministic function of the mesh and config, with no sampling
    /// step — spec §8's "fixed seed" invariant is about thread-count
    /// independence of that deterministic computation, not about seeding an
    /// RNG.
    #[serde(default)]
    pub seed: u64,
}

fn default_spatial_scheme() -> SpatialScheme {
    SpatialScheme::FiniteDifference
}

fn default_sim_type() -> ParticleSimType {
    ParticleSimType::MultiParticle
}

fn default_quadrature_order() -> u32 {
    1
}

impl ModelDeck {
    /// Time step size, derived once at startup from `final_time / n_steps`.
    /// Stability is the caller's responsibility (spec §4.5: "no adaptive
    /// control").
    pub fn dt(&self) -> f64 {
        self.final_time / self.n_steps as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension != 2 && self.dimension != 3 {
            return Err(ConfigError::InvalidValue {
                field: "Model.dimension".to_string(),
                reason: "must be 2 or 3".to_string(),
            });
        }
        if self.n_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "Model.n_steps".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.final_time <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "Model.final_time".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
