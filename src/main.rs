use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use solarfetch::cli;
use solarfetch::nwp::MODELS;
use solarfetch::reference::NETWORK_OPTIONS;

#[derive(Parser)]
#[command(name = "solarfetch")]
#[command(
    about = "Fetch reference observations and NWP model runs for the Solar Forecast Arbiter",
    long_about = None
)]
struct Cli {
    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Reference site and observation commands
    Reference {
        #[command(subcommand)]
        command: ReferenceCommands,
    },
    /// NOMADS weather model commands
    Nwp {
        #[command(subcommand)]
        command: NwpCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize solarfetch.toml configuration file
    Init {
        /// Path where to create the config file
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ReferenceCommands {
    /// Create reference sites and observations from a site list CSV
    Init {
        /// Site list CSV
        #[arg(long)]
        sites: PathBuf,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API base URL, overriding the config
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Post data between two times to existing reference observations
    Update {
        /// Start time (RFC 3339)
        #[arg(long)]
        start: String,

        /// End time (RFC 3339)
        #[arg(long)]
        end: String,

        /// Only update these networks (repeatable, defaults to all)
        #[arg(long = "network", value_parser = clap::builder::PossibleValuesParser::new(NETWORK_OPTIONS))]
        networks: Vec<String>,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API base URL, overriding the config
        #[arg(long)]
        base_url: Option<String>,
    },
    /// List reference networks
    Networks {
        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum NwpCommands {
    /// Fetch model runs as they are published and convert them to netCDF
    Fetch {
        /// Directory to save model runs in
        save_dir: PathBuf,

        /// Model to fetch
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(MODELS.map(|m| m.key)))]
        model: String,

        /// Download buffer size in KB
        #[arg(long)]
        chunksize: Option<usize>,

        /// Fetch a single run then exit
        #[arg(long)]
        once: bool,

        /// Only convert grib files already in SAVE_DIR to netCDF
        #[arg(long)]
        netcdf_only: bool,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the models that can be fetched
    Models {
        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Init { path } => cli::config::init(path),
        },
        Commands::Reference { command } => match command {
            ReferenceCommands::Init {
                sites,
                config,
                base_url,
            } => cli::reference::init(&sites, config, base_url).await,
            ReferenceCommands::Update {
                start,
                end,
                networks,
                config,
                base_url,
            } => cli::reference::update(&start, &end, networks, config, base_url).await,
            ReferenceCommands::Networks { config } => cli::reference::networks(config),
        },
        Commands::Nwp { command } => match command {
            NwpCommands::Fetch {
                save_dir,
                model,
                chunksize,
                once,
                netcdf_only,
                config,
            } => cli::nwp::fetch(&save_dir, &model, chunksize, once, netcdf_only, config).await,
            NwpCommands::Models { config } => cli::nwp::models(config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
