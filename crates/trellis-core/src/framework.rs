use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use trellis_util::errors::TrellisError;

/// A target framework (platform) that a dependency graph is built for.
///
/// Frameworks are opaque identifiers such as `net8.0` or `netstandard2.0`
/// and compare case-insensitively.
#[derive(Debug, Clone, Eq)]
pub struct TargetFramework(String);

impl TargetFramework {
    /// The framework-agnostic target.
    pub const ANY: &'static str = "any";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn any() -> Self {
        Self::new(Self::ANY)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::ANY)
    }
}

impl Default for TargetFramework {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for TargetFramework {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for TargetFramework {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetFramework {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(TrellisError::InvalidInput {
                message: format!("invalid target framework '{s}'"),
            });
        }
        Ok(Self::new(s))
    }
}
