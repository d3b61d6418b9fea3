//! Parser error accumulation.

use crate::error::SyntaxDiagnostic;
use std::fmt;

/// Result alias for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// One or more syntax diagnostics accumulated while parsing. The parser
/// does not attempt recovery beyond reporting every diagnostic it can
/// collect before giving up on a production.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// All diagnostics collected during the parse attempt, in source order.
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

impl ParseError {
    /// Build an error from a single diagnostic.
    pub fn single(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![SyntaxDiagnostic::new(line, column, message)],
        }
    }

    /// Merge two parse errors, concatenating their diagnostics.
    pub fn merge(mut self, other: ParseError) -> Self {
        self.diagnostics.extend(other.diagnostics);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for crate::error::FhirPathError {
    fn from(err: ParseError) -> Self {
        crate::error::FhirPathError::SyntaxError(err.diagnostics)
    }
}
