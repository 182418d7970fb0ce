//! User-facing explanations for failed solves and unresolved graph nodes.

use std::fmt;

use trellis_core::dependency::PackageDependency;
use trellis_core::version::Version;
use trellis_util::errors::TrellisError;

use crate::analyze::NodeRef;
use crate::graph::{DependencyGraph, Disposition};

/// A chosen package and the dependency it declares on the failing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSource {
    /// `A 1.0.0`
    pub package: String,
    pub dependency: PackageDependency,
}

impl fmt::Display for ConstraintSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{} constraint: {}'", self.package, self.dependency)
    }
}

/// Why the solver could not place a package id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub id: String,
    pub constraints: Vec<ConstraintSource>,
    /// Every concrete version of `id` in the candidate pool.
    pub available: Vec<Version>,
}

impl ResolutionFailure {
    pub fn message(&self) -> String {
        if self.available.is_empty() || self.constraints.is_empty() {
            return format!("Unable to resolve dependency '{}'.", self.id);
        }

        let mut constraints: Vec<String> =
            self.constraints.iter().map(ToString::to_string).collect();
        constraints.sort_by_key(|c| c.to_ascii_lowercase());
        constraints.dedup();
        let constraints = constraints.join(", ");

        if let [only] = self.available.as_slice() {
            format!("'{} {only}' is not compatible with {constraints}.", self.id)
        } else {
            format!(
                "Unable to find a version of '{}' compatible with {constraints}.",
                self.id
            )
        }
    }

    pub fn into_error(self) -> TrellisError {
        let message = self.message();
        TrellisError::NoSolution {
            id: self.id,
            message,
        }
    }
}

/// Live nodes the provider could not resolve. Rejected and placeholder
/// nodes are not reported since they take no part in the result.
pub fn unresolved<T>(graph: &DependencyGraph<T>) -> Vec<NodeRef> {
    graph
        .breadth_first()
        .into_iter()
        .filter(|&idx| {
            let node = graph.node(idx);
            !node.is_resolved()
                && matches!(
                    node.disposition,
                    Disposition::Acceptable | Disposition::Accepted
                )
        })
        .map(|idx| NodeRef::capture(graph, idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::version::VersionRange;

    fn source(package: &str, id: &str, range: &str) -> ConstraintSource {
        ConstraintSource {
            package: package.to_string(),
            dependency: PackageDependency::new(id, Some(VersionRange::parse(range).unwrap())),
        }
    }

    #[test]
    fn lists_constraints_sorted() {
        let failure = ResolutionFailure {
            id: "B".into(),
            constraints: vec![source("Z 1.0.0", "B", "3.0"), source("A 1.0.0", "B", "2.0")],
            available: vec![Version::new(1, 0, 0), Version::new(1, 5, 0)],
        };
        assert_eq!(
            failure.message(),
            "Unable to find a version of 'B' compatible with \
             'A 1.0.0 constraint: B (>= 2.0.0)', 'Z 1.0.0 constraint: B (>= 3.0.0)'."
        );
    }

    #[test]
    fn single_version_is_named() {
        let failure = ResolutionFailure {
            id: "B".into(),
            constraints: vec![source("A 1.0.0", "B", "2.0")],
            available: vec![Version::new(1, 0, 0)],
        };
        assert_eq!(
            failure.message(),
            "'B 1.0.0' is not compatible with 'A 1.0.0 constraint: B (>= 2.0.0)'."
        );
    }

    #[test]
    fn missing_package_has_short_message() {
        let failure = ResolutionFailure {
            id: "B".into(),
            constraints: vec![source("A 1.0.0", "B", "1.0")],
            available: vec![],
        };
        let err = failure.into_error();
        assert!(err.is_no_solution());
        assert_eq!(
            err.to_string(),
            "Dependency resolution failed for 'B': Unable to resolve dependency 'B'."
        );
    }
}
