mod bond;
mod cli;
mod config;
mod contact;
mod error;
mod geometry;
mod influence;
mod integrator;
mod loads;
mod logging;
mod math;
mod mesh;
mod mesh_io;
mod neighbor_update;
mod output;
mod particle;
mod simulation;
mod state;

use std::path::Path;

use clap::Parser;

use cli::Cli;
use config::Config;
use error::{PeridemError, ResourceError};
use simulation::Model;

fn main() {
    let cli = Cli::parse();
    logging::init();

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn run(cli: &Cli) -> Result<(), PeridemError> {
    let nthreads = cli
        .nthreads
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .build()
        .map_err(|source| ResourceError::ThreadPool { nthreads, source })?;

    pool.install(|| run_model(cli))
}

fn run_model(cli: &Cli) -> Result<(), PeridemError> {
    #[cfg(feature = "profile")]
    let _puffin_server = {
        puffin::set_scopes_on(true);
        let addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
        match puffin_http::Server::new(&addr) {
            Ok(server) => {
                log::info!("puffin profiling server listening on {addr}");
                Some(server)
            }
            Err(source) => {
                log::warn!("could not start puffin profiling server on {addr}: {source}");
                None
            }
        }
    };

    let config = Config::load(&cli.input)?;
    let mut model = Model::build(&config)?;

    if let Some(restart_file) = &config.restart.restart_file {
        let restart = output::read_restart(Path::new(restart_file))?;
        log::info!("resuming from restart file {restart_file} at step {}", restart.step);
        model.restore_from_restart(restart);
    }

    let out_dir = Path::new(&config.output.path);
    std::fs::create_dir_all(out_dir).map_err(|source| ResourceError::OutputIo {
        path: out_dir.display().to_string(),
        source,
    })?;

    let start_step = model.step;
    log::info!("running steps {start_step}..{} (dt = {})", config.model.n_steps, model.dt);

    for _ in start_step..config.model.n_steps {
        #[cfg(feature = "profile")]
        puffin::GlobalProfiler::lock().new_frame();

        model.advance()?;

        if model.step % config.output.output_interval == 0 {
            let path = output::vtu_path(out_dir, &config.output.tag, model.step);
            output::write_vtu(&path, &model.state)?;
        }

        if config.restart.restart_interval > 0 && model.step % config.restart.restart_interval == 0 {
            let path = out_dir.join(format!("{}_{}.restart", config.output.tag, model.step));
            output::write_restart(&path, &model.state, model.step, model.time)?;
        }
    }

    log::info!("completed {} steps", model.step);
    Ok(())
}
