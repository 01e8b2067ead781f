//! # Token Subcommand
//!
//! Mints HS256 tokens for local development and smoke tests. The secret is
//! read from `JWT_SECRET`, the same variable the services verify with.

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use bazaar_auth::TokenVerifier;
use bazaar_core::{Role, UserId};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Sign a token and print it to stdout.
    Issue {
        /// Subject (user id).
        #[arg(long)]
        sub: String,

        /// Claimed role. Services resolve the effective role from the role
        /// store regardless.
        #[arg(long)]
        role: String,

        /// Lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,

        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

pub fn run_token(args: &TokenArgs) -> Result<u8> {
    match &args.command {
        TokenCommand::Issue {
            sub,
            role,
            ttl_secs,
            secret,
        } => {
            let token = issue(secret, sub, role, *ttl_secs, Utc::now())?;
            println!("{token}");
            Ok(0)
        }
    }
}

pub fn issue(
    secret: &str,
    subject: &str,
    role: &str,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Result<String> {
    ensure!(ttl_secs > 0, "--ttl-secs must be positive, got {ttl_secs}");
    let subject = UserId::new(subject).context("invalid --sub")?;
    let role: Role = role.parse().with_context(|| {
        let names: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
        format!("invalid --role (expected one of {})", names.join(", "))
    })?;
    let signer = TokenVerifier::new(secret, 0).context("JWT_SECRET")?;
    let token = signer.issue(&subject, role, ttl_secs, now)?;
    tracing::debug!(subject = %subject, role = %role, ttl_secs, "token issued");
    Ok(token)
}
