use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborPolicy {
    SimpleAll,
    MaxDistanceTravel,
}

/// `Neighbor` top-level deck key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NeighborDeck {
    pub update_criterion: NeighborPolicy,
    #[serde(default = "default_search_factor")]
    pub search_factor: f64,
    #[serde(default = "default_update_interval")]
    pub update_interval: u32,
    /// Fraction of a node's particle's horizon `delta`, per DESIGN.md Open
    /// Question 3.
    #[serde(default = "default_near_bd_tolerance")]
    pub near_bd_tolerance: f64,
}

fn default_search_factor() -> f64 {
    1.0
}

fn default_update_interval() -> u32 {
    50
}

fn default_near_bd_tolerance() -> f64 {
    0.2
}
