//! # bazaar CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bazaar_cli::routes::{run_routes, RoutesArgs};
use bazaar_cli::statuses::{run_statuses, StatusesArgs};
use bazaar_cli::token::{run_token, TokenArgs};

/// Operator tooling for the bazaar commerce backend.
#[derive(Parser, Debug)]
#[command(name = "bazaar", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Gateway route table checks.
    Routes(RoutesArgs),

    /// Development token minting.
    Token(TokenArgs),

    /// Order status tooling.
    Statuses(StatusesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so `token issue` output can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Routes(args) => run_routes(&args),
        Commands::Token(args) => run_token(&args),
        Commands::Statuses(args) => run_statuses(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_cli::routes::RoutesCommand;
    use bazaar_cli::statuses::StatusesCommand;
    use bazaar_cli::token::TokenCommand;

    #[test]
    fn parse_routes_check() {
        let cli = Cli::try_parse_from(["bazaar", "routes", "check", "routes.yaml", "--env"]).unwrap();
        match cli.command {
            Commands::Routes(RoutesArgs {
                command: RoutesCommand::Check { file, env },
            }) => {
                assert_eq!(file.to_str(), Some("routes.yaml"));
                assert!(env);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_token_issue_with_explicit_secret() {
        let cli = Cli::try_parse_from([
            "bazaar", "token", "issue", "--sub", "admin-1", "--role", "admin", "--ttl-secs", "60",
            "--secret", "s3cret",
        ])
        .unwrap();
        match cli.command {
            Commands::Token(TokenArgs {
                command:
                    TokenCommand::Issue {
                        sub,
                        role,
                        ttl_secs,
                        secret,
                    },
            }) => {
                assert_eq!(sub, "admin-1");
                assert_eq!(role, "admin");
                assert_eq!(ttl_secs, 60);
                assert_eq!(secret, "s3cret");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_statuses_graph_dot() {
        let cli = Cli::try_parse_from(["bazaar", "-v", "statuses", "graph", "--dot"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Commands::Statuses(StatusesArgs {
                command: StatusesCommand::Graph { dot: true }
            })
        ));
    }

    #[test]
    fn token_issue_requires_sub() {
        assert!(Cli::try_parse_from(["bazaar", "token", "issue", "--role", "admin", "--secret", "x"]).is_err());
    }
}
