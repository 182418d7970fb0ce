//! Dependency providers: the walker's only window onto package metadata.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use serde::Deserialize;
use trellis_core::dependency::PackageDependency;
use trellis_core::framework::TargetFramework;
use trellis_core::library::{LibraryIdentity, LibraryRange, LibraryType};
use trellis_core::version::{Version, VersionRange};
use trellis_util::errors::{TrellisError, TrellisResult};

use crate::graph::GraphItem;
use crate::solver::ResolverPackage;

/// Resolves a library request for a target framework.
///
/// Implementations must be deterministic for a fixed request within one
/// walk. `None` means the request could not be satisfied; the walker keeps
/// the node as unresolved instead of failing.
pub trait DependencyProvider: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> impl Future<Output = Option<GraphItem<Self::Item>>> + Send;
}

/// A dependency as written in a universe file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DependencySpec {
    pub id: String,
    #[serde(default)]
    pub version: Option<VersionRange>,
    #[serde(default, rename = "type")]
    pub library_type: LibraryType,
}

impl DependencySpec {
    pub fn new(id: impl Into<String>, version: Option<VersionRange>) -> Self {
        Self {
            id: id.into(),
            version,
            library_type: LibraryType::Package,
        }
    }

    pub fn to_library_range(&self) -> LibraryRange {
        LibraryRange::new(self.id.clone(), self.version.clone()).with_type(self.library_type)
    }

    pub fn to_package_dependency(&self) -> PackageDependency {
        PackageDependency::new(self.id.clone(), self.version.clone())
    }
}

/// One package version available in a [`MemoryProvider`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub version: Version,
    #[serde(default, rename = "type")]
    pub library_type: LibraryType,
    /// Dependencies that apply to every framework.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Extra dependencies keyed by target framework.
    #[serde(default, rename = "framework-dependencies")]
    pub framework_dependencies: BTreeMap<String, Vec<DependencySpec>>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            library_type: LibraryType::Package,
            dependencies: Vec::new(),
            framework_dependencies: BTreeMap::new(),
        }
    }

    /// Add a framework-independent dependency, parsing `range` as a version range.
    pub fn depends_on(mut self, id: &str, range: &str) -> TrellisResult<Self> {
        self.dependencies
            .push(DependencySpec::new(id, Some(VersionRange::parse(range)?)));
        Ok(self)
    }

    /// Add a dependency that only applies to `framework`.
    pub fn depends_on_for(
        mut self,
        framework: &str,
        id: &str,
        range: &str,
    ) -> TrellisResult<Self> {
        self.framework_dependencies
            .entry(framework.to_string())
            .or_default()
            .push(DependencySpec::new(id, Some(VersionRange::parse(range)?)));
        Ok(self)
    }

    pub fn identity(&self) -> LibraryIdentity {
        LibraryIdentity::new(self.name.clone(), self.version.clone(), self.library_type)
    }

    /// Common dependencies first, then the group for `framework`.
    pub fn dependencies_for(&self, framework: &TargetFramework) -> Vec<LibraryRange> {
        let group = self
            .framework_dependencies
            .iter()
            .find(|(name, _)| TargetFramework::new(name.as_str()) == *framework)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or_default();

        self.dependencies
            .iter()
            .chain(group)
            .map(DependencySpec::to_library_range)
            .collect()
    }

    fn satisfies(&self, range: &LibraryRange) -> bool {
        range.is_named(&self.name)
            && range.type_constraint == self.library_type
            && range
                .version_range
                .as_ref()
                .map_or(true, |r| r.satisfies(&self.version))
    }
}

#[derive(Debug, Deserialize)]
struct UniverseFile {
    #[serde(default, rename = "package")]
    packages: Vec<PackageSpec>,
}

/// A fixed set of packages held in memory, typically loaded from a TOML
/// universe file:
///
/// ```toml
/// [[package]]
/// name = "A"
/// version = "1.0"
/// dependencies = [{ id = "B", version = "[1.0,2.0)" }]
///
/// [package.framework-dependencies]
/// "net8.0" = [{ id = "C", version = "1.0" }]
/// ```
///
/// A request resolves to the lowest version satisfying its range.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    packages: Vec<PackageSpec>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.add(package);
        self
    }

    pub fn add(&mut self, package: PackageSpec) {
        self.packages.push(package);
    }

    pub fn parse_toml(content: &str) -> TrellisResult<Self> {
        let file: UniverseFile = toml::from_str(content).map_err(|e| TrellisError::Config {
            message: format!("Failed to parse package universe: {e}"),
        })?;
        Ok(Self {
            packages: file.packages,
        })
    }

    pub fn load(path: &Path) -> TrellisResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Config {
            message: format!("Failed to read package universe {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// The lowest version satisfying `range`.
    pub fn lookup(&self, range: &LibraryRange) -> Option<&PackageSpec> {
        self.packages
            .iter()
            .filter(|p| p.satisfies(range))
            .min_by(|a, b| a.version.cmp(&b.version))
    }

    /// Every package as a solver candidate, in file order, with its
    /// framework-independent dependencies.
    pub fn resolver_packages(&self) -> Vec<ResolverPackage> {
        self.packages
            .iter()
            .map(|p| {
                ResolverPackage::new(
                    p.name.clone(),
                    p.version.clone(),
                    p.dependencies
                        .iter()
                        .map(DependencySpec::to_package_dependency)
                        .collect(),
                )
            })
            .collect()
    }
}

impl DependencyProvider for MemoryProvider {
    type Item = ();

    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> impl Future<Output = Option<GraphItem<()>>> + Send {
        let found = self
            .lookup(range)
            .map(|p| GraphItem::new(p.identity(), p.dependencies_for(framework), ()));
        std::future::ready(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIVERSE: &str = r#"
[[package]]
name = "A"
version = "1.0"
dependencies = [{ id = "B", version = "[1.0,2.0)" }]

[package.framework-dependencies]
"net8.0" = [{ id = "C" }]

[[package]]
name = "B"
version = "1.5"

[[package]]
name = "B"
version = "1.2"

[[package]]
name = "Tool"
version = "3.0"
type = "project"
"#;

    fn range(name: &str, spec: &str) -> LibraryRange {
        LibraryRange::package(name, spec).unwrap()
    }

    #[test]
    fn parses_universe() {
        let provider = MemoryProvider::parse_toml(UNIVERSE).unwrap();
        assert_eq!(provider.len(), 4);
        let a = &provider.packages()[0];
        assert_eq!(a.dependencies[0].id, "B");
        assert_eq!(a.framework_dependencies["net8.0"][0].version, None);
        assert_eq!(provider.packages()[3].library_type, LibraryType::Project);
    }

    #[test]
    fn rejects_bad_version() {
        let err = MemoryProvider::parse_toml("[[package]]\nname = \"A\"\nversion = \"x\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("package universe"), "got: {err}");
    }

    #[test]
    fn lookup_picks_lowest_match() {
        let provider = MemoryProvider::parse_toml(UNIVERSE).unwrap();
        let found = provider.lookup(&range("b", "1.0")).unwrap();
        assert_eq!(found.version, Version::parse("1.2").unwrap());
        assert!(provider.lookup(&range("B", "2.0")).is_none());
    }

    #[test]
    fn lookup_respects_type_constraint() {
        let provider = MemoryProvider::parse_toml(UNIVERSE).unwrap();
        assert!(provider.lookup(&range("Tool", "1.0")).is_none());
        let project = range("Tool", "1.0").with_type(LibraryType::Project);
        assert!(provider.lookup(&project).is_some());
    }

    #[test]
    fn framework_groups_follow_common_dependencies() {
        let provider = MemoryProvider::parse_toml(UNIVERSE).unwrap();
        let a = &provider.packages()[0];

        let any = a.dependencies_for(&TargetFramework::any());
        assert_eq!(any.len(), 1);

        let net = a.dependencies_for(&TargetFramework::new("NET8.0"));
        let names: Vec<_> = net.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn find_library_returns_item() {
        let provider = MemoryProvider::new().with_package(
            PackageSpec::new("A", Version::new(1, 0, 0))
                .depends_on("B", "1.0")
                .unwrap(),
        );
        let item = provider
            .find_library(&range("A", "1.0"), &TargetFramework::any())
            .await
            .unwrap();
        assert_eq!(item.key.to_string(), "A 1.0.0");
        assert_eq!(item.dependencies, vec![range("B", "1.0")]);
    }

    #[test]
    fn exports_solver_candidates() {
        let provider = MemoryProvider::parse_toml(UNIVERSE).unwrap();
        let candidates = provider.resolver_packages();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0].dependencies[0].id, "B");
        assert!(candidates.iter().all(|c| !c.absent));
    }
}
