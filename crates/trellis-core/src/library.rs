//! Library ranges (what is wanted) and library identities (what was found).
//!
//! Library names compare case-insensitively everywhere in trellis.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionRange};

/// Kind of library, used both as the type constraint of a request and as the
/// type of a resolved identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    #[default]
    Package,
    Project,
    Reference,
    Unresolved,
}

impl LibraryType {
    /// Whether a request with this constraint may be handed to a provider.
    pub fn is_resolvable(self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Package => "package",
            Self::Project => "project",
            Self::Reference => "reference",
            Self::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}

/// Case-insensitive name comparison.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Normalized key for case-insensitive maps.
pub fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// A request for a library: a name, an acceptable version interval and the
/// kinds of library that may satisfy it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryRange {
    pub name: String,
    /// `None` means any version.
    pub version_range: Option<VersionRange>,
    pub type_constraint: LibraryType,
}

impl LibraryRange {
    pub fn new(name: impl Into<String>, version_range: Option<VersionRange>) -> Self {
        Self {
            name: name.into(),
            version_range,
            type_constraint: LibraryType::Package,
        }
    }

    /// Shorthand for a package request, parsing `range` with [`VersionRange::parse`].
    pub fn package(
        name: impl Into<String>,
        range: &str,
    ) -> trellis_util::errors::TrellisResult<Self> {
        Ok(Self::new(name, Some(VersionRange::parse(range)?)))
    }

    pub fn with_type(mut self, type_constraint: LibraryType) -> Self {
        self.type_constraint = type_constraint;
        self
    }

    pub fn is_named(&self, name: &str) -> bool {
        names_equal(&self.name, name)
    }

    /// A nearer request eclipses this one when it targets the same name and
    /// the same kind of library.
    pub fn is_eclipsed_by(&self, nearer: &LibraryRange) -> bool {
        self.is_named(&nearer.name) && self.type_constraint == nearer.type_constraint
    }

    /// The range, defaulting to every version.
    pub fn range_or_all(&self) -> VersionRange {
        self.version_range.clone().unwrap_or_default()
    }
}

impl fmt::Display for LibraryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_range {
            Some(range) if range.has_bounds() => write!(f, "{} {range}", self.name),
            _ => f.write_str(&self.name),
        }
    }
}

/// A concrete library that satisfied a request.
///
/// Equality and hashing ignore the case of the name.
#[derive(Debug, Clone)]
pub struct LibraryIdentity {
    pub name: String,
    pub version: Version,
    pub library_type: LibraryType,
}

impl LibraryIdentity {
    pub fn new(name: impl Into<String>, version: Version, library_type: LibraryType) -> Self {
        Self {
            name: name.into(),
            version,
            library_type,
        }
    }

    pub fn package(name: impl Into<String>, version: Version) -> Self {
        Self::new(name, version, LibraryType::Package)
    }
}

impl PartialEq for LibraryIdentity {
    fn eq(&self, other: &Self) -> bool {
        names_equal(&self.name, &other.name)
            && self.version == other.version
            && self.library_type == other.library_type
    }
}

impl Eq for LibraryIdentity {}

impl Hash for LibraryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        name_key(&self.name).hash(state);
        self.version.hash(state);
        self.library_type.hash(state);
    }
}

impl fmt::Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
