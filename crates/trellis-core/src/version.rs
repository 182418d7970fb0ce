//! Package versions and version ranges.
//!
//! Versions are semver-ordered but parsed leniently: `1`, `1.0` and `1.0.0`
//! all denote the same version. Ranges use interval notation:
//! - `[1.0,2.0)`, `(1.0,2.0]`, `[1.0,)`, `(,2.0)` for bounded intervals
//! - `[1.5]` for an exact version
//! - a bare version `1.0` for "1.0 or higher"
//! - `*` or an empty string for any version

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trellis_util::errors::{TrellisError, TrellisResult};

/// A parsed package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(semver::Version);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parse a version, padding missing minor/patch components with zeros.
    pub fn parse(input: &str) -> TrellisResult<Self> {
        let s = input.trim();
        let invalid = |reason: &str| TrellisError::InvalidVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("empty version"));
        }

        let split = s.find(['-', '+']).unwrap_or(s.len());
        let (release, suffix) = s.split_at(split);
        let mut parts: Vec<&str> = release.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid("at most three numeric components are supported"));
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid("numeric components expected"));
        }
        while parts.len() < 3 {
            parts.push("0");
        }

        let normalized = format!("{}{suffix}", parts.join("."));
        semver::Version::parse(&normalized)
            .map(Self)
            .map_err(|e| invalid(&e.to_string()))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Absolute per-component difference to `other`, most significant first.
    pub fn distance(&self, other: &Version) -> (u64, u64, u64) {
        (
            self.major().abs_diff(other.major()),
            self.minor().abs_diff(other.minor()),
            self.patch().abs_diff(other.patch()),
        )
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = TrellisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A version interval. A missing bound means unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionRange {
    /// The range containing every version.
    pub fn all() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// `version` or higher.
    pub fn at_least(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version)),
            upper: None,
        }
    }

    /// Exactly `version`.
    pub fn exact(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version)),
        }
    }

    /// Parse a range expression.
    pub fn parse(spec: &str) -> TrellisResult<Self> {
        let s = spec.trim();
        let invalid = |reason: &str| TrellisError::InvalidVersion {
            input: spec.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() || s == "*" {
            return Ok(Self::all());
        }

        if !s.starts_with('[') && !s.starts_with('(') {
            return Version::parse(s).map(Self::at_least);
        }

        if s.len() < 2 || !(s.ends_with(']') || s.ends_with(')')) {
            return Err(invalid("unterminated interval"));
        }

        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        let range = if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            VersionRange {
                lower: if lower.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::parse(lower)?,
                        inclusive: open_inclusive,
                    })
                },
                upper: if upper.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::parse(upper)?,
                        inclusive: close_inclusive,
                    })
                },
            }
        } else {
            if !open_inclusive || !close_inclusive {
                return Err(invalid("an exact version must use square brackets"));
            }
            Self::exact(Version::parse(inner)?)
        };

        if range.is_empty() {
            return Err(invalid("the range contains no versions"));
        }
        Ok(range)
    }

    /// Check if a version satisfies this range.
    pub fn satisfies(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// The intersection of two ranges, or `None` if they share no version.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let lower = tighter(&self.lower, &other.lower, Ordering::Greater);
        let upper = tighter(&self.upper, &other.upper, Ordering::Less);
        let range = VersionRange { lower, upper };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// True if no version can satisfy the range.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.version.cmp(&upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    pub fn min_version(&self) -> Option<&Version> {
        self.lower.as_ref().map(|b| &b.version)
    }

    pub fn has_bounds(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Whether the lower bound of `near` is at least the lower bound of `far`.
    ///
    /// An unbounded `near` always qualifies; an unbounded `far` only
    /// qualifies against an unbounded `near`. On the same version an
    /// inclusive `near` bound is lower than an exclusive `far` one, since it
    /// also admits the bound itself.
    pub fn is_greater_or_equal(near: &VersionRange, far: &VersionRange) -> bool {
        match (&near.lower, &far.lower) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(near), Some(far)) => match near.version.cmp(&far.version) {
                Ordering::Equal => far.inclusive || !near.inclusive,
                ord => ord == Ordering::Greater,
            },
        }
    }
}

/// Pick the more restrictive of two bounds. `keep` is the ordering of the
/// first bound's version relative to the second that makes it the tighter one.
fn tighter(a: &Option<Bound>, b: &Option<Bound>, keep: Ordering) -> Option<Bound> {
    match (a, b) {
        (None, other) | (other, None) => other.clone(),
        (Some(a), Some(b)) => {
            let ord = a.version.cmp(&b.version);
            if ord == Ordering::Equal {
                Some(Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                })
            } else if ord == keep {
                Some(a.clone())
            } else {
                Some(b.clone())
            }
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (None, None) => write!(f, "*"),
            (Some(l), Some(u)) if l.version == u.version && l.inclusive && u.inclusive => {
                write!(f, "(= {})", l.version)
            }
            (Some(l), None) => write!(f, "({} {})", lower_op(l), l.version),
            (None, Some(u)) => write!(f, "({} {})", upper_op(u), u.version),
            (Some(l), Some(u)) => write!(
                f,
                "({} {} && {} {})",
                lower_op(l),
                l.version,
                upper_op(u),
                u.version
            ),
        }
    }
}

fn lower_op(b: &Bound) -> &'static str {
    if b.inclusive {
        ">="
    } else {
        ">"
    }
}

fn upper_op(b: &Bound) -> &'static str {
    if b.inclusive {
        "<="
    } else {
        "<"
    }
}

impl FromStr for VersionRange {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = TrellisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn short_forms_are_padded() {
        assert_eq!(v("1"), v("1.0.0"));
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1.2").to_string(), "1.2.0");
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(v("1.0-beta") < v("1.0"));
        assert!(v("1.0-alpha") < v("1.0-beta"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1..2").is_err());
    }

    #[test]
    fn distance_is_per_component() {
        assert_eq!(v("2.5.1").distance(&v("1.0.3")), (1, 5, 2));
        assert_eq!(v("1.0").distance(&v("1.0")), (0, 0, 0));
    }

    #[test]
    fn tighter_lower_bound_wins() {
        let a = Some(Bound::inclusive(v("1.0")));
        let b = Some(Bound::exclusive(v("1.0")));
        let t = tighter(&a, &b, Ordering::Greater).unwrap();
        assert!(!t.inclusive);
    }

    #[test]
    fn display_pretty_prints() {
        assert_eq!(VersionRange::parse("1.0").unwrap().to_string(), "(>= 1.0.0)");
        assert_eq!(VersionRange::parse("[1.5]").unwrap().to_string(), "(= 1.5.0)");
        assert_eq!(
            VersionRange::parse("[1.0,2.0)").unwrap().to_string(),
            "(>= 1.0.0 && < 2.0.0)"
        );
        assert_eq!(VersionRange::parse("(,2.0]").unwrap().to_string(), "(<= 2.0.0)");
        assert_eq!(VersionRange::all().to_string(), "*");
    }
}
