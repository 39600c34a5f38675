mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "postmortem",
    about = "Turn raw incident notes into post-mortem reports, streamed from an AI CLI",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./postmortem.yaml when present)
    #[arg(long, global = true, env = "POSTMORTEM_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server that streams reports over Server-Sent Events
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (0 picks a free port)
        #[arg(long, env = "POSTMORTEM_PORT")]
        port: Option<u16>,
        /// Report CLI to invoke instead of the configured one
        #[arg(long)]
        command: Option<String>,
        /// Open a browser once the server is listening
        #[arg(long)]
        open: bool,
    },

    /// Generate one report locally and print it as it streams
    Generate {
        /// Report format key (default: the configured default format)
        #[arg(long)]
        format: Option<String>,
        /// Read incident notes from a file; `-` or omitted reads stdin
        #[arg(long, value_name = "PATH")]
        notes_file: Option<PathBuf>,
        /// Report CLI to invoke instead of the configured one
        #[arg(long)]
        command: Option<String>,
    },

    /// List the available report formats
    Formats,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            command,
            open,
        } => cmd::serve::run(
            config_path,
            settings::Overrides {
                host,
                port,
                command,
            },
            open,
        ),
        Commands::Generate {
            format,
            notes_file,
            command,
        } => cmd::generate::run(
            config_path,
            format.as_deref(),
            notes_file.as_deref(),
            settings::Overrides {
                command,
                ..Default::default()
            },
            cli.json,
        ),
        Commands::Formats => cmd::formats::run(config_path, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
