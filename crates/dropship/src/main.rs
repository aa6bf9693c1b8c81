mod build;
mod commands;
mod config;
mod confirm;
mod logging;
mod service;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use commands::ServiceCommand;
use config::DropshipConfig;
use dropship_platform::Platform;

#[derive(Parser)]
#[command(name = "dropship", version, about = "Build, publish, and self-update the game stack")]
struct Cli {
    /// Path to an alternate config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on the terminal.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Build, archive, upload, and repoint the latest alias
    Publish {
        #[arg(long, value_enum, default_value_t = PlatformArg::All)]
        platform: PlatformArg,

        /// Use already-built binaries from the target directory.
        #[arg(long)]
        skip_build: bool,

        /// Skip interactive confirmations for the remote rollout.
        #[arg(long)]
        yes: bool,
    },
    /// Compare against the remote latest version and update in place
    Update {
        /// Apply without the interactive confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Show the installed and remote latest versions
    Status,
    /// Control the lobby service on the remote host
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Windows,
    Linux,
    All,
}

impl PlatformArg {
    fn platforms(self) -> Vec<Platform> {
        match self {
            Self::Windows => vec![Platform::Windows],
            Self::Linux => vec![Platform::Linux],
            Self::All => Platform::ALL.to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum ServiceAction {
    /// Query whether the service is active
    Status,
    /// Start the service
    Start {
        #[arg(long)]
        yes: bool,
    },
    /// Restart the service
    Restart {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = DropshipConfig::load(cli.config.as_ref());
    logging::init(cli.debug || config.debug_logging);

    match cli.command {
        CliCommand::Publish {
            platform,
            skip_build,
            yes,
        } => commands::publish(&config, &platform.platforms(), skip_build, yes).await,
        CliCommand::Update { yes } => commands::update(&config, yes).await,
        CliCommand::Status => commands::status(&config).await,
        CliCommand::Service { action } => {
            let (command, yes) = match action {
                ServiceAction::Status => (ServiceCommand::Status, false),
                ServiceAction::Start { yes } => (ServiceCommand::Start, yes),
                ServiceAction::Restart { yes } => (ServiceCommand::Restart, yes),
            };
            commands::service(&config, &command, yes).await
        }
    }
}
