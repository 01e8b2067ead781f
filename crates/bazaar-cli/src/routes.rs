//! # Routes Subcommand
//!
//! ```bash
//! bazaar routes check crates/bazaar-gateway/config/routes.yaml
//! bazaar routes check routes.yaml --env   # apply <SERVICE>_SERVICE_URL overrides
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use bazaar_gateway::{RouteTable, Rewrite};

#[derive(Args, Debug)]
pub struct RoutesArgs {
    #[command(subcommand)]
    pub command: RoutesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RoutesCommand {
    /// Parse and validate a route table, then print the resolved rules.
    Check {
        /// Route table YAML file.
        file: PathBuf,

        /// Apply `<SERVICE>_SERVICE_URL` overrides from the environment.
        #[arg(long)]
        env: bool,
    },
}

pub fn run_routes(args: &RoutesArgs) -> Result<u8> {
    match &args.command {
        RoutesCommand::Check { file, env } => {
            let yaml = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let table = if *env {
                RouteTable::from_yaml_with(&yaml, |var| std::env::var(var).ok())
            } else {
                RouteTable::from_yaml(&yaml)
            }
            .with_context(|| format!("invalid route table {}", file.display()))?;

            tracing::info!(rules = table.rules().len(), "route table is valid");
            print!("{}", render_table(&table));
            Ok(0)
        }
    }
}

/// One block per rule, in match order (longest prefix first).
pub fn render_table(table: &RouteTable) -> String {
    let mut out = String::new();
    for rule in table.rules() {
        let rewrite = match &rule.rewrite {
            Rewrite::Strip => "strip".to_string(),
            Rewrite::Preserve => "preserve".to_string(),
            Rewrite::Replace(to) => format!("replace {to}"),
        };
        let _ = writeln!(
            out,
            "{:<12} -> {} ({})  rewrite={}  access={}",
            rule.prefix, rule.service, rule.target, rewrite, rule.access
        );
        for policy in rule.policies() {
            let methods = policy
                .methods()
                .map(|ms| ms.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(","))
                .unwrap_or_else(|| "*".to_string());
            let _ = writeln!(
                out,
                "    {:<24} {:<16} access={}",
                policy.pattern(),
                methods,
                policy.access()
            );
        }
    }
    out
}
