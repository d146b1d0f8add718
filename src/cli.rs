use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::commands::{CompletionsCommand, RunCommand, StatusCommand};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "rolechain",
    version,
    about = "Keep MFA-backed assumed-role AWS credentials fresh",
    long_about = None
)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "Base AWS profile holding long-term keys"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Obtain (and optionally keep renewing) assumed-role credentials")]
    Run(RunCommand),
    #[command(about = "Show expiration and validity of stored profiles")]
    Status(StatusCommand),
    #[command(about = "Generate shell completion scripts for rolechain")]
    Completions(CompletionsCommand),
}

impl Cli {
    pub async fn execute(self, shutdown: CancellationToken) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute(&self.profile, shutdown).await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}
