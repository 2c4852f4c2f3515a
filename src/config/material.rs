use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::influence::InfluenceFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    PMBBond,
    RNPBond,
    PDElasticBond,
    PDState,
}

impl MaterialKind {
    /// Dispatch table matching the per-material string keys used by the
    /// upstream wall/particle material factory.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "PMBBond" => Ok(Self::PMBBond),
            "RNPBond" => Ok(Self::RNPBond),
            "PDElasticBond" => Ok(Self::PDElasticBond),
            "PDState" => Ok(Self::PDState),
            other => Err(ConfigError::UnknownMaterialKind(other.to_string())),
        }
    }

    /// Whether this material kind ever breaks bonds ("no-fail mode" per
    /// spec §4.3 is PD-elastic only).
    pub fn breakable(&self) -> bool {
        !matches!(self, MaterialKind::PDElasticBond)
    }

    /// Whether this material requires the state-based dilatation pre-pass.
    pub fn state_based(&self) -> bool {
        matches!(self, MaterialKind::PDState)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InfluenceFnKind {
    Constant,
    Linear,
    Gaussian,
}

/// `Material` deck entry, one per zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaterialDeck {
    pub zone: u32,
    #[serde(rename = "Type")]
    pub kind: String,
    pub density: f64,
    pub horizon: f64,
    pub bulk_modulus: f64,
    #[serde(default)]
    pub shear_modulus: f64,
    pub critical_strain: f64,
    #[serde(default = "default_influence_kind")]
    pub influence_fn: InfluenceFnKind,
    #[serde(default)]
    pub influence_fn_params: Vec<f64>,
    #[serde(default)]
    pub plane_strain: bool,
}

fn default_influence_kind() -> InfluenceFnKind {
    InfluenceFnKind::Constant
}

impl MaterialDeck {
    pub fn material_kind(&self) -> Result<MaterialKind, ConfigError> {
        MaterialKind::parse(&self.kind)
    }

    /// PMB bond-stiffness constant `c = 18K / (pi * delta^4)`, shared by
    /// PMB, RNP and PD-elastic force laws (spec §4.3 table).
    pub fn pmb_constant(&self, dimension: u8) -> f64 {
        let _ = dimension;
        18.0 * self.bulk_modulus / (std::f64::consts::PI * self.horizon.powi(4))
    }

    /// Self-contact stiffness for a zone with no configured contact pair,
    /// derived exactly as the upstream wall code derives it:
    /// `Kn = 18K / (pi * delta^5)` — one horizon power higher than the bond
    /// constant above, since this feeds a contact (surface) force rather
    /// than a bond (volumetric) force. See DESIGN.md Open Question 2.
    pub fn self_contact_kn(&self) -> f64 {
        18.0 * self.bulk_modulus / (std::f64::consts::PI * self.horizon.powi(5))
    }

    pub fn influence_fn(&self, dimension: u8) -> InfluenceFn {
        InfluenceFn::new(self.influence_fn, &self.influence_fn_params, dimension)
    }
}
