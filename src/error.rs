//! The error taxonomy: configuration errors, modeling errors, runtime
//! numerical events, and resource errors. The first three categories are
//! always fatal at startup (or, for modeling, as soon as the offending
//! state is reached); runtime numerical events are logged, never fatal, and
//! so are not part of this enum — see `log::warn!` call sites in
//! `bond.rs`/`contact.rs`.

use thiserror::Error;

/// Failures discovered while parsing or validating the JSON input deck.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read input file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON input deck {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field `{field}` in {context}")]
    MissingField { field: String, context: String },

    #[error("zone {zone} is referenced by Particle_Generation but has no matching {kind} entry")]
    DanglingZoneReference { zone: u32, kind: &'static str },

    #[error("unknown time discretization `{0}`, expected `central_difference` or `velocity_verlet`")]
    UnknownTimeDiscretization(String),

    #[error("unknown material kind `{0}`")]
    UnknownMaterialKind(String),

    #[error("unknown neighbor update policy `{0}`")]
    UnknownNeighborPolicy(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("contact pair ({zone_a}, {zone_b}) is never configured in Contact and neither zone falls back to self-contact")]
    MissingContactPair { zone_a: u32, zone_b: u32 },
}

/// Failures discovered while building the in-memory model from a validated
/// config (geometry that can't be meshed, a mesh file that doesn't parse,
/// particle counts that don't add up).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read mesh file {path}: {source}")]
    MeshIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mesh file {path}: {reason}")]
    MeshParse { path: String, reason: String },

    #[error("particle {particle} references unknown zone {zone}")]
    UnknownZone { particle: u32, zone: u32 },

    #[error("particle {particle} has zero volume after mesh generation")]
    DegenerateParticle { particle: u32 },

    #[error("contact pair ({zone_a}, {zone_b}) has no configured parameters")]
    MissingContactPair { zone_a: u32, zone_b: u32 },
}

/// Errors that abort the run for operational reasons unrelated to the
/// physical model itself — out of memory, output directory not writable,
/// thread pool construction failure.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to build {nthreads}-thread pool: {source}")]
    ThreadPool {
        nthreads: usize,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("failed to write output file {path}: {source}")]
    OutputIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write restart file {path}: {source}")]
    RestartIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read restart file {path}: {reason}")]
    RestartParse { path: String, reason: String },
}

/// The union of all fatal error categories, returned by the driver's `run`
/// function and converted into an exit code (`1` for configuration/modeling,
/// `2` for resource errors) by `main`.
#[derive(Debug, Error)]
pub enum PeridemError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl PeridemError {
    /// Process exit code matching spec §6 ("non-zero on unrecoverable
    /// errors"): configuration and modeling failures are the user's to fix
    /// (`1`), resource failures are the environment's (`2`).
    pub fn exit_code(&self) -> i32 {
        match self {
            PeridemError::Config(_) | PeridemError::Model(_) => 1,
            PeridemError::Resource(_) => 2,
        }
    }
}
