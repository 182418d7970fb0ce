use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all trellis operations.
///
/// Findings of graph analysis (cycles, downgrades, version conflicts,
/// unresolved dependencies) are never reported through this type; they are
/// data on the graph. Only outcomes that stop an operation end up here.
#[derive(Debug, Error, Diagnostic)]
pub enum TrellisError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration or universe file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the TOML file for syntax errors"))]
    Config { message: String },

    /// A version or version range string could not be parsed.
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    /// Malformed resolver input, rejected before any search starts.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// No assignment satisfies every dependency constraint.
    #[error("Dependency resolution failed for '{id}': {message}")]
    #[diagnostic(help("Relax the version constraints or make another version of the package available"))]
    NoSolution { id: String, message: String },

    /// The operation observed a cancellation request and stopped.
    #[error("Operation cancelled")]
    Cancelled,

    /// The graph walk could not complete (a lookup task failed).
    #[error("Graph walk failed: {message}")]
    Walk { message: String },

    /// Analysis findings were promoted to an error by policy.
    #[error("Policy violation: {message}")]
    #[diagnostic(help("Adjust [policy] in ~/.trellis/config.toml to downgrade this to a warning"))]
    Policy { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

impl TrellisError {
    /// True when the error is the ordinary "no satisfying assignment" outcome
    /// rather than a precondition violation.
    pub fn is_no_solution(&self) -> bool {
        matches!(self, Self::NoSolution { .. })
    }
}

/// Convenience alias for results carrying a [`TrellisError`].
pub type TrellisResult<T> = Result<T, TrellisError>;
