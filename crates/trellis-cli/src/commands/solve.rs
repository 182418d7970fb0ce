//! Handler for `trellis solve`.

use std::path::Path;

use miette::Result;
use trellis_core::config::GlobalConfig;
use trellis_core::dependency::PackageIdentity;
use trellis_core::library::names_equal;
use trellis_core::version::Version;
use trellis_resolver::provider::MemoryProvider;
use trellis_resolver::solver::{ResolverPackage, Solver, SolverOptions};
use trellis_util::errors::{TrellisError, TrellisResult};
use trellis_util::progress::status;

pub fn exec(
    config: &GlobalConfig,
    universe: &Path,
    target: &str,
    version: Option<&str>,
    installed: &[String],
    absent: &[String],
) -> Result<()> {
    let provider = MemoryProvider::load(universe)?;
    let mut candidates = provider.resolver_packages();
    let target = select_target(&candidates, target, version)?;

    candidates.extend(absent.iter().map(ResolverPackage::absent));
    let installed = installed
        .iter()
        .map(|s| s.parse::<PackageIdentity>())
        .collect::<TrellisResult<Vec<_>>>()?;

    let solution = Solver::new()
        .with_options(SolverOptions::from(&config.solver))
        .with_installed(installed)
        .resolve(&target, &candidates)?;

    let chosen: Vec<&ResolverPackage> = solution.iter().filter(|p| !p.absent).collect();
    for package in &chosen {
        println!("{package}");
    }
    status("Resolved", &format!("{} package(s) for {target}", chosen.len()));
    Ok(())
}

/// The exact version when one is given, otherwise the highest available.
fn select_target(
    candidates: &[ResolverPackage],
    id: &str,
    version: Option<&str>,
) -> TrellisResult<ResolverPackage> {
    let mut matching = candidates.iter().filter(|p| names_equal(&p.id, id));

    let found = match version {
        Some(v) => {
            let wanted = Version::parse(v)?;
            matching.find(|p| p.version.as_ref() == Some(&wanted))
        }
        None => matching.max_by(|a, b| a.version.cmp(&b.version)),
    };

    found.cloned().ok_or_else(|| TrellisError::InvalidInput {
        message: match version {
            Some(v) => format!("package '{id}' has no version {v} in the universe"),
            None => format!("package '{id}' is not in the universe"),
        },
    })
}
