use serde::{Deserialize, Serialize};

use crate::geometry::Geometry as GeometryDeck;

/// `Particle` deck entry, one per zone: binds a zone id to its geometry and
/// the flags that make it wall-like or fully constrained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticleZoneDeck {
    pub zone: u32,
    pub geometry: GeometryDeck,
    #[serde(default)]
    pub is_wall: bool,
    #[serde(default)]
    pub all_dofs_constrained: bool,
}
