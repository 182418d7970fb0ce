//! CLI argument definitions for trellis.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    version,
    about = "Dependency graph walking, analysis and constraint solving",
    long_about = "Trellis builds nearest-wins dependency graphs from a package universe, \
                  reports cycles, downgrades and version conflicts, and solves install \
                  plans with a backtracking constraint search."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of ~/.trellis/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// The universe file and the root request shared by `tree` and `analyze`.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Package universe (TOML with [[package]] entries)
    pub universe: PathBuf,
    /// Root library name
    pub root: String,
    /// Version range for the root, e.g. "1.0" or "[1.0,2.0)"
    #[arg(long = "version", value_name = "RANGE")]
    pub range: Option<String>,
    /// Target framework; repeat for one graph per framework
    #[arg(short, long = "framework", value_name = "TFM")]
    pub frameworks: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dependency graph of a root library
    Tree {
        #[command(flatten)]
        graph: GraphArgs,
        /// Maximum depth to display
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Report cycles, downgrades and version conflicts
    Analyze {
        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Choose one version per package for a target
    Solve {
        /// Package universe (TOML with [[package]] entries)
        universe: PathBuf,
        /// Target package id
        target: String,
        /// Target version; defaults to the highest available
        #[arg(long)]
        version: Option<String>,
        /// Currently installed package, as ID@VERSION
        #[arg(long, value_name = "ID@VERSION")]
        installed: Vec<String>,
        /// Package id that may be left out of the plan
        #[arg(long, value_name = "ID")]
        absent: Vec<String>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
