//! Command-line interface (spec §6: `-i <input-json>`, `-nThreads <N>`,
//! `-h`), built with `clap`'s derive API the way the teacher's own crates
//! in the retrieved pack do for their binaries.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "peridem", about = "Explicit peridynamics + DEM simulator for fracturable granular media")]
pub struct Cli {
    /// Path to the JSON input deck.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Worker-thread count for the rayon pool; defaults to the available
    /// parallelism reported by the OS.
    #[arg(short = 'n', long = "nthreads")]
    pub nthreads: Option<usize>,
}
