//! # bazaar-cli: Operator Tooling
//!
//! Provides the `bazaar` command-line interface.
//!
//! ## Subcommands
//!
//! - `bazaar routes check <file>`: parse a gateway route table and print the
//!   compiled rules.
//! - `bazaar token issue --sub <id> --role <role>`: mint a development token
//!   signed with `JWT_SECRET`.
//! - `bazaar statuses graph`: print the order transition graph.
//!
//! Argument parsing lives in `main.rs`; each module exposes a `run_*`
//! handler returning the process exit code.

pub mod routes;
pub mod statuses;
pub mod token;
