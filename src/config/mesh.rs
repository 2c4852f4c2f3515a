use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshFileType {
    Msh,
    Vtu,
}

/// `Mesh` deck entry, one per zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeshDeck {
    pub zone: u32,
    pub file: String,
    #[serde(default = "default_file_type")]
    pub file_data_type: MeshFileType,
    /// Mesh size `h`, used when `Contact_Radius_Factor` or near-boundary
    /// tolerance is expressed relative to mesh size rather than read from
    /// the element data.
    #[serde(default)]
    pub mesh_size: Option<f64>,
}

fn default_file_type() -> MeshFileType {
    MeshFileType::Msh
}
