// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source location tracking for the parser.

use nom_locate::LocatedSpan;
use std::fmt;

/// Located input slice used while lexing.
pub type LocatedInput<'a> = LocatedSpan<&'a str>;

/// A value with source location information.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The value.
    pub value: T,
    /// Start byte offset in the input.
    pub start: usize,
    /// End byte offset in the input.
    pub end: usize,
    /// One-based line of `start`.
    pub line: usize,
    /// One-based column of `start`.
    pub column: usize,
}

impl<T> Spanned<T> {
    /// Create a new spanned value.
    pub fn new(value: T, start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            value,
            start,
            end,
            line,
            column,
        }
    }

    /// Map the value while preserving the span.
    pub fn map<U, F>(self, f: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned {
            value: f(self.value),
            start: self.start,
            end: self.end,
            line: self.line,
            column: self.column,
        }
    }

    /// Convert to an [`crate::ast::Span`].
    pub fn to_ast_span(&self) -> crate::ast::Span {
        crate::ast::Span::new(self.start, self.end, self.line, self.column)
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
