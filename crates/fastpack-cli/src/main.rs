#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;
mod watch;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fastpack")]
#[command(author, version, about = "A config-driven single-file bundler", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build the bundle once
    Build {
        /// Config file (default: fastpack.config.json or fastpack.json in the working directory)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Build, watch for changes and serve the output directory
    Serve {
        /// Config file (default: fastpack.config.json or fastpack.json in the working directory)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,

        /// Host to bind to (overrides devServer.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides devServer.port)
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Resolve an import specifier the way the bundler would
    Resolve {
        /// The specifier, e.g. `./Main` or `left-pad`
        specifier: String,

        /// Directory the import is made from (default: the project root)
        #[arg(long, value_name = "DIR")]
        from: Option<PathBuf>,

        /// Config file (default: fastpack.config.json or fastpack.json in the working directory)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the module graph in bundle order with the transform for each file
    Graph {
        /// Config file (default: fastpack.config.json or fastpack.json in the working directory)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Build { config } => commands::build::run(&cwd, config.as_deref(), cli.json),
        Commands::Serve { config, host, port } => {
            let action = commands::serve::ServeAction {
                cwd,
                config,
                host,
                port,
            };
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::serve::run(action))
        }
        Commands::Resolve {
            specifier,
            from,
            config,
        } => commands::resolve::run(
            &cwd,
            config.as_deref(),
            &specifier,
            from.as_deref(),
            cli.json,
        ),
        Commands::Graph { config } => commands::graph::run(&cwd, config.as_deref(), cli.json),
    }
}
