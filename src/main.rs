mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::{DrainArgs, IsActiveArgs};
use tracing_subscriber::EnvFilter;

/// Check whether an EC2 instance is ACTIVE in its ECS cluster, or set it to
/// DRAINING and optionally wait until all tasks have left.
///
/// Credentials come from instance profiles or environment variables.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Also log success statements and debug output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exit non-zero unless the instance is ACTIVE
    IsActive(IsActiveArgs),
    /// Set the instance to DRAINING
    Drain(DrainArgs),
}

/// Usage errors exit 1 like every other failure; `--help` and `--version`
/// exit 0.
fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            std::process::exit(usage_exit_code(&e));
        }
    };

    // RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "ecs_instance_health=debug,info"
        } else {
            "info"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    use Commands::*;
    match cli.command {
        IsActive(args) => args.main().await,
        Drain(args) => args.main().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_code(args: &[&str]) -> i32 {
        let args: Vec<&str> = std::iter::once("ecs-instance-health")
            .chain(args.iter().copied())
            .collect();
        match Cli::try_parse_from(args.clone()) {
            Ok(_) => panic!("{args:?} should not parse"),
            Err(e) => usage_exit_code(&e),
        }
    }

    #[test]
    fn test_usage_errors_exit_one() {
        assert_eq!(exit_code(&["drain", "-i", "i-0aaa"]), 1);
        assert_eq!(exit_code(&["is-active", "-c", "prod"]), 1);
        assert_eq!(
            exit_code(&["drain", "-c", "prod", "-i", "i-0aaa", "--wait", "--check-interval", "0"]),
            1
        );
        assert_eq!(exit_code(&[]), 1);
    }

    #[test]
    fn test_help_and_version_exit_zero() {
        assert_eq!(exit_code(&["--help"]), 0);
        assert_eq!(exit_code(&["--version"]), 0);
        assert_eq!(exit_code(&["drain", "--help"]), 0);
    }

    #[test]
    fn test_wait_flags_accepted_without_wait() {
        let cli = Cli::try_parse_from([
            "ecs-instance-health",
            "drain",
            "-c",
            "prod",
            "-i",
            "-",
            "--wait-timeout",
            "30",
            "--check-interval",
            "5",
        ]);
        assert!(matches!(cli, Ok(Cli { command: Commands::Drain(_), .. })));
    }
}
