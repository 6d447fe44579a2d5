use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::config;
use crate::display;
use crate::error::Result;
use crate::nwp::{convert, NwpFetcher, MODELS};
use crate::renderer::Renderer;

/// Keep `save_dir/<model>` supplied with the latest model runs
///
/// With `netcdf_only`, grib files already in `save_dir` are converted
/// instead.
pub async fn fetch(
    save_dir: &Path,
    model: &str,
    chunksize: Option<usize>,
    once: bool,
    netcdf_only: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    convert::check_tools()?;
    let config = config::load_or_default(config_path)?;

    if netcdf_only {
        let written = convert::optimize_only(save_dir, model).await?;
        for path in written {
            println!("Wrote {}", path.display());
        }
        return Ok(());
    }

    let chunksize = chunksize.unwrap_or(config.nwp.chunksize_kb);
    let fetcher = NwpFetcher::new(&config.nwp)?;
    info!("Fetching {} into {}", model, save_dir.display());
    until_signal(fetcher.run(save_dir, model, chunksize, once)).await
}

/// Run `task` until it finishes or the process is signalled
///
/// SIGINT and SIGTERM exit cleanly, SIGUSR1 exits with status 1.
async fn until_signal<F>(task: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut user1 = signal(SignalKind::user_defined1())?;

    select! {
        result = task => result,
        _ = interrupt.recv() => {
            info!("Received SIGINT, exiting");
            std::process::exit(0);
        },
        _ = terminate.recv() => {
            info!("Received SIGTERM, exiting");
            std::process::exit(0);
        },
        _ = user1.recv() => {
            error!("Received SIGUSR1, exiting with error");
            std::process::exit(1);
        },
    }
}

/// List the models that can be fetched
pub fn models(config_path: Option<PathBuf>) -> Result<()> {
    let config = config::load_or_default(config_path)?;
    display::print_markdown(&Renderer::new(&config).render_models(&MODELS));
    Ok(())
}
