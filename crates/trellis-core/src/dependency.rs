use std::fmt;
use std::str::FromStr;

use trellis_util::errors::TrellisError;

use crate::library::names_equal;
use crate::version::{Version, VersionRange};

/// A flat dependency of one package on another, as seen by the constraint solver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDependency {
    pub id: String,
    /// `None` means any version satisfies.
    pub version_range: Option<VersionRange>,
}

impl PackageDependency {
    pub fn new(id: impl Into<String>, version_range: Option<VersionRange>) -> Self {
        Self {
            id: id.into(),
            version_range,
        }
    }

    /// A dependency on any version of `id`.
    pub fn any(id: impl Into<String>) -> Self {
        Self::new(id, None)
    }

    pub fn targets(&self, id: &str) -> bool {
        names_equal(&self.id, id)
    }

    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        self.version_range
            .as_ref()
            .map_or(true, |range| range.satisfies(version))
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_range {
            Some(range) if range.has_bounds() => write!(f, "{} {range}", self.id),
            _ => f.write_str(&self.id),
        }
    }
}

/// An exact package id and version, e.g. a package already installed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = TrellisError;

    /// Parse `"id@version"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((id, version)) if !id.trim().is_empty() => {
                Ok(Self::new(id.trim(), Version::parse(version)?))
            }
            _ => Err(TrellisError::InvalidInput {
                message: format!("expected 'id@version', got '{s}'"),
            }),
        }
    }
}
