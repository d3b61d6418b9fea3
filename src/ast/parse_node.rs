//! The generic tagged parse tree exchanged between the parser and the
//! compiler (see SPEC_FULL.md §6, "Parse-tree wire contract").

use serde::{Deserialize, Serialize};

/// A single node of the labeled parse tree the parser front-end produces.
///
/// `node_type` names the grammar rule alternative (without the `Context`
/// suffix an ANTLR-style recognizer would append, e.g. `AdditiveExpression`,
/// `FunctionInvocation`). `terminal_node_text` holds the verbatim text of
/// every terminal token attached directly to this node (not its
/// descendants) -- this is what lets the compiler tell `+` from `-`, or `=`
/// from `!=`, without re-lexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseNode {
    /// Grammar alternative name, e.g. `"AdditiveExpression"`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Verbatim source text spanned by this node.
    pub text: String,
    /// Verbatim text of terminal tokens attached to this node.
    #[serde(rename = "terminalNodeText")]
    pub terminal_node_text: Vec<String>,
    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParseNode>,
    /// Byte offset of `text` within the original source.
    #[serde(default)]
    pub start: usize,
    /// One-based line of `start`.
    #[serde(default)]
    pub line: usize,
    /// One-based column of `start`.
    #[serde(default)]
    pub column: usize,
}

impl ParseNode {
    /// Construct a leaf or interior node.
    pub fn new(node_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            text: text.into(),
            terminal_node_text: Vec::new(),
            children: Vec::new(),
            start: 0,
            line: 1,
            column: 1,
        }
    }

    /// Attach a terminal token's text (builder style).
    pub fn with_terminal(mut self, text: impl Into<String>) -> Self {
        self.terminal_node_text.push(text.into());
        self
    }

    /// Attach a child (builder style).
    pub fn with_child(mut self, child: ParseNode) -> Self {
        self.children.push(child);
        self
    }

    /// Attach the source location (builder style).
    pub fn at(mut self, start: usize, line: usize, column: usize) -> Self {
        self.start = start;
        self.line = line;
        self.column = column;
        self
    }
}
