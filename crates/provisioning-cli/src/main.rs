//! `provisioner`: operator tool for orchestrator deployments

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "provisioner")]
#[command(about = "Provision hosts through a TOSCA orchestrator and inspect job ids")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Orchestrator host, overrides the configuration file
    #[arg(long, global = true)]
    host: Option<String>,

    /// Orchestrator port, overrides the configuration file
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Bearer token for the orchestrator
    #[arg(long, global = true, env = "PROVISIONER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a deployment and wait until it is ready
    Deploy {
        /// Deployment template
        #[arg(short, long)]
        template: PathBuf,

        /// Pause between status polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Maximum number of status polls
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Print the access password instead of redacting it
        #[arg(long)]
        show_password: bool,
    },

    /// Show the current status of a deployment
    Status {
        /// Deployment id
        deployment_id: String,
    },

    /// Delete a deployment
    Release {
        /// Deployment id or composite job id
        id: String,
    },

    /// Decode a composite job id
    Inspect {
        /// Composite job id
        job_id: String,
    },
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.host.clone(),
        cli.port,
        cli.token.clone(),
    )
    .await?;

    match cli.command {
        Commands::Deploy {
            template,
            interval_ms,
            max_attempts,
            show_password,
        } => commands::deploy::run(config, template, interval_ms, max_attempts, show_password).await,
        Commands::Status { deployment_id } => commands::status::run(config, &deployment_id).await,
        Commands::Release { id } => commands::release::run(config, &id).await,
        Commands::Inspect { job_id } => commands::inspect::run(&job_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "provisioner",
            "deploy",
            "--template",
            "vm.yaml",
            "--max-attempts",
            "3",
            "--host",
            "orchestrator.local",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("orchestrator.local"));
        assert_eq!(cli.log_level(), Level::DEBUG);
        match cli.command {
            Commands::Deploy {
                template,
                max_attempts,
                interval_ms,
                show_password,
            } => {
                assert_eq!(template, PathBuf::from("vm.yaml"));
                assert_eq!(max_attempts, Some(3));
                assert_eq!(interval_ms, None);
                assert!(!show_password);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["provisioner", "-v", "-q", "inspect", "x"]).is_err());
    }
}
