//! Error taxonomy for the FHIRPath engine
//!
//! Every fallible operation in this crate surfaces one of the variants
//! below. Empty-collection results are the normal "no result" channel and
//! are never represented as an error.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type FhirPathResult<T> = Result<T, FhirPathError>;

/// A single syntax diagnostic: one-based line/column plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    /// One-based line number.
    pub line: usize,
    /// One-based column number.
    pub column: usize,
    /// Human-readable message.
    pub message: String,
}

impl SyntaxDiagnostic {
    /// Create a new diagnostic.
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// The complete error taxonomy for parsing, compiling, and evaluating
/// FHIRPath expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FhirPathError {
    /// The parser could not accept the input. Carries every diagnostic
    /// accumulated during the parse, not just the first.
    #[error("syntax error: {}", format_diagnostics(.0))]
    SyntaxError(Vec<SyntaxDiagnostic>),

    /// A function was invoked with an argument count outside its declared
    /// arities. Detected at compile time.
    #[error(
        "{function}: expected {} argument(s), got {got}",
        expected.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" or ")
    )]
    ArityError {
        /// Function name.
        function: String,
        /// Declared acceptable argument counts.
        expected: Vec<usize>,
        /// Argument count actually supplied.
        got: usize,
    },

    /// A value had the wrong kind for the operation being performed.
    #[error("type error in {context}: expected {expected}, got {actual}")]
    TypeError {
        /// Where the mismatch was detected (operator or function name).
        context: String,
        /// Expected type/kind description.
        expected: String,
        /// Actual type/kind description.
        actual: String,
    },

    /// An operation expected 0-or-1 items but received two or more.
    #[error("{context}: expected a singleton, collection has {count} items")]
    SingletonError {
        /// Where the violation was detected.
        context: String,
        /// Actual item count.
        count: usize,
    },

    /// An operation's precondition was not met (unit domain crossing, odd
    /// hex string length, missing `%questionnaire`, etc).
    #[error("{0}")]
    DomainError(String),

    /// An async-only function (`weight`, `ordinal`) was reached while the
    /// evaluation was configured with `async=false`.
    #[error("async function '{0}' reached with async disabled")]
    AsyncDisallowedError(String),

    /// The cancellation signal fired while awaiting an external fetch.
    #[error("evaluation cancelled")]
    CancellationError,
}

fn format_diagnostics(diags: &[SyntaxDiagnostic]) -> String {
    diags
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FhirPathError {
    /// Build a `TypeError` with borrowed-string convenience.
    pub fn type_error(
        context: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeError {
            context: context.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Build a `SingletonError`.
    pub fn singleton_error(context: impl Into<String>, count: usize) -> Self {
        Self::SingletonError {
            context: context.into(),
            count,
        }
    }

    /// Build a `DomainError`.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::DomainError(message.into())
    }
}
