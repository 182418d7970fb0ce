//! Command dispatch and handler modules.

mod analyze;
mod solve;
mod tree;

use std::path::Path;

use miette::Result;
use trellis_core::config::GlobalConfig;
use trellis_core::framework::TargetFramework;
use trellis_core::library::LibraryRange;
use trellis_core::version::VersionRange;
use trellis_resolver::graph::DependencyGraph;
use trellis_resolver::provider::MemoryProvider;
use trellis_resolver::walker::{GraphWalker, WalkOptions};
use trellis_util::errors::TrellisResult;

use crate::cli::{Cli, Command, GraphArgs};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Tree { graph, depth } => tree::exec(&config, &graph, depth).await,
        Command::Analyze { graph } => analyze::exec(&config, &graph).await,
        Command::Solve {
            universe,
            target,
            version,
            installed,
            absent,
        } => solve::exec(
            &config,
            &universe,
            &target,
            version.as_deref(),
            &installed,
            &absent,
        ),
    }
}

fn load_config(path: Option<&Path>) -> TrellisResult<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::from_path(path),
        None => GlobalConfig::load(),
    }
}

/// Load the universe and walk one graph per requested framework.
async fn walk_graphs(config: &GlobalConfig, args: &GraphArgs) -> Result<Vec<DependencyGraph<()>>> {
    let provider = MemoryProvider::load(&args.universe)?;
    tracing::debug!(
        "loaded {} packages from {}",
        provider.len(),
        args.universe.display()
    );

    let range = args
        .range
        .as_deref()
        .map(VersionRange::parse)
        .transpose()?;
    let root = LibraryRange::new(args.root.clone(), range);
    let frameworks = args
        .frameworks
        .iter()
        .map(|f| f.parse::<TargetFramework>())
        .collect::<TrellisResult<Vec<_>>>()?;

    let walker = GraphWalker::new(provider).with_options(WalkOptions::from(&config.walk));
    Ok(walker.walk_all(&root, &frameworks).await?)
}
