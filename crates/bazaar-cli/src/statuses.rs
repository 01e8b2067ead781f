//! # Statuses Subcommand
//!
//! Prints the order transition graph, either as an adjacency list or as
//! Graphviz `dot` source:
//!
//! ```bash
//! bazaar statuses graph
//! bazaar statuses graph --dot | dot -Tsvg > statuses.svg
//! ```

use std::fmt::Write as _;

use anyhow::Result;
use clap::{Args, Subcommand};

use bazaar_state::OrderStatus;

#[derive(Args, Debug)]
pub struct StatusesArgs {
    #[command(subcommand)]
    pub command: StatusesCommand,
}

#[derive(Subcommand, Debug)]
pub enum StatusesCommand {
    /// Print the transition graph.
    Graph {
        /// Emit Graphviz dot instead of an adjacency list.
        #[arg(long)]
        dot: bool,
    },
}

pub fn run_statuses(args: &StatusesArgs) -> Result<u8> {
    match &args.command {
        StatusesCommand::Graph { dot } => {
            let out = if *dot { render_dot() } else { render_adjacency() };
            print!("{out}");
            Ok(0)
        }
    }
}

pub fn render_adjacency() -> String {
    let mut out = String::new();
    for status in OrderStatus::ALL {
        let next = status.adjacent();
        if next.is_empty() {
            let _ = writeln!(out, "{:<11} (terminal)", status.as_str());
        } else {
            let names: Vec<&str> = next.iter().map(OrderStatus::as_str).collect();
            let _ = writeln!(out, "{:<11} -> {}", status.as_str(), names.join(", "));
        }
    }
    out
}

pub fn render_dot() -> String {
    let mut out = String::from("digraph order_status {\n    rankdir=LR;\n");
    for status in OrderStatus::ALL {
        if status.is_terminal() {
            let _ = writeln!(out, "    {} [shape=doublecircle];", status.as_str());
        }
        for next in status.adjacent() {
            let _ = writeln!(out, "    {} -> {};", status.as_str(), next.as_str());
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_has_one_line_per_status() {
        let out = render_adjacency();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), OrderStatus::ALL.len());
        assert_eq!(lines[0], "pending     -> confirmed, cancelled");
        assert!(out.contains("shipped     -> delivered, returned"));
        assert!(out.contains("delivered   (terminal)"));
    }

    #[test]
    fn dot_lists_every_edge() {
        let out = render_dot();
        let edges = out.lines().filter(|l| l.contains("->")).count();
        let expected: usize = OrderStatus::ALL.iter().map(|s| s.adjacent().len()).sum();
        assert_eq!(edges, expected);
        assert!(out.contains("pending -> cancelled;"));
        assert!(out.contains("returned [shape=doublecircle];"));
        assert!(out.ends_with("}\n"));
    }
}
