use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Particle,
    Region,
    RegionWithIncludeList,
    RegionWithExcludeList,
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TimeFunction {
    Constant,
    Linear { slope: f64 },
    LinearStep { slope: f64, step_time: f64 },
    LinearSlowFast { slope_slow: f64, slope_fast: f64, switch_time: f64 },
    Sinusoidal { amplitude: f64, frequency: f64 },
    Rotation { angular_velocity: f64 },
}

impl TimeFunction {
    /// `g(t)`, the scalar time-dependent load magnitude (spec §4.5).
    pub fn value(&self, t: f64) -> f64 {
        match *self {
            TimeFunction::Constant => 1.0,
            TimeFunction::Linear { slope } => slope * t,
            TimeFunction::LinearStep { slope, step_time } => {
                if t < step_time {
                    slope * t
                } else {
                    slope * step_time
                }
            }
            TimeFunction::LinearSlowFast {
                slope_slow,
                slope_fast,
                switch_time,
            } => {
                if t < switch_time {
                    slope_slow * t
                } else {
                    slope_slow * switch_time + slope_fast * (t - switch_time)
                }
            }
            TimeFunction::Sinusoidal { amplitude, frequency } => {
                amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()
            }
            TimeFunction::Rotation { angular_velocity } => angular_velocity * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SpatialFunction {
    Constant,
    HatX { half_width: f64 },
    HatY { half_width: f64 },
    SinX { frequency: f64 },
    SinY { frequency: f64 },
    LinearX { slope: f64 },
    LinearY { slope: f64 },
}

impl SpatialFunction {
    /// Shape factor at reference position `x_ref` (spec §4.5's spatial
    /// shape functions, combined multiplicatively with `TimeFunction`).
    pub fn value(&self, x_ref: vek::Vec3<f64>) -> f64 {
        match *self {
            SpatialFunction::Constant => 1.0,
            SpatialFunction::HatX { half_width } => (1.0 - (x_ref.x / half_width).abs()).max(0.0),
            SpatialFunction::HatY { half_width } => (1.0 - (x_ref.y / half_width).abs()).max(0.0),
            SpatialFunction::SinX { frequency } => {
                (2.0 * std::f64::consts::PI * frequency * x_ref.x).sin()
            }
            SpatialFunction::SinY { frequency } => {
                (2.0 * std::f64::consts::PI * frequency * x_ref.y).sin()
            }
            SpatialFunction::LinearX { slope } => slope * x_ref.x,
            SpatialFunction::LinearY { slope } => slope * x_ref.y,
        }
    }
}

/// Shared shape for both `Force_BC` and `Displacement_BC` deck entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BcDeck {
    pub selection: Selection,
    #[serde(default)]
    pub include_particles: Vec<u32>,
    #[serde(default)]
    pub exclude_particles: Vec<u32>,
    #[serde(default)]
    pub region: Option<Geometry>,
    pub time_function: TimeFunction,
    #[serde(default = "default_spatial_function")]
    pub spatial_function: SpatialFunction,
    /// Which dofs (0=x, 1=y, 2=z) this BC drives.
    pub direction: Vec<u8>,
    #[serde(default)]
    pub zero_displacement: bool,
}

fn default_spatial_function() -> SpatialFunction {
    SpatialFunction::Constant
}

/// `IC` top-level deck key: per-zone initial velocity / angular velocity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IcEntry {
    pub zone: u32,
    #[serde(default)]
    pub velocity: [f64; 3],
    #[serde(default)]
    pub angular_velocity: [f64; 3],
}
