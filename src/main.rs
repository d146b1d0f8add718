use std::process::ExitCode;

use clap::Parser;
use rolechain::cli::Cli;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, subscriber};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    // One thread: every step of the chain runs strictly in sequence.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(cli));

    // An abandoned MFA prompt must not hold the process open.
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> ExitCode {
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    match cli.execute(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe_failure(&e));
            ExitCode::FAILURE
        }
    }
}

fn describe_failure(e: &anyhow::Error) -> String {
    match e.downcast_ref::<rolechain::Error>() {
        Some(err) if err.is_interrupted() => {
            "Interrupted while waiting for the MFA code".to_string()
        }
        _ => format!("Error: {e:#}"),
    }
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
    shutdown.cancel();
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over -v
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // Stdout carries the operator-facing status lines.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3)
        .compact()
        .finish();

    subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_interrupted_prompt_has_its_own_message() {
        let err = anyhow::Error::from(rolechain::Error::io(
            "Failed to read MFA code",
            io::Error::new(io::ErrorKind::Interrupted, "read interrupted"),
        ));
        assert!(describe_failure(&err).starts_with("Interrupted while waiting"));
    }

    #[test]
    fn test_other_failures_show_the_error_chain() {
        let err = anyhow::Error::from(rolechain::Error::provider("AssumeRole", "AccessDenied"))
            .context("Failed to renew");
        assert_eq!(
            describe_failure(&err),
            "Error: Failed to renew: AssumeRole failed: AccessDenied"
        );
    }
}
