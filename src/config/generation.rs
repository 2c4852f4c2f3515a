use serde::{Deserialize, Serialize};

/// One `From_File`-style particle instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticleEntry {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub geometry_id: u32,
    pub material_id: u32,
    pub contact_id: u32,
}

fn default_scale() -> f64 {
    1.0
}

/// `Particle_Generation` top-level deck key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ParticleGenerationDeck {
    FromFile { particles: Vec<ParticleEntry> },
    UseParticleGeometry,
}
