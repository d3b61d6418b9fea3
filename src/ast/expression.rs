//! Typed AST for FHIRPath expressions, as produced directly by the parser.

use super::operator::{BinaryOperator, UnaryOperator};
use super::parse_node::ParseNode;
use rust_decimal::Decimal;

/// A byte-offset span into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
    /// One-based line of `start`.
    pub line: usize,
    /// One-based column of `start`.
    pub column: usize,
}

impl Span {
    /// Build a span.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// A literal term.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// `{}` the empty collection literal.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// An unsuffixed or `.`-bearing number without a fractional part is an
    /// `Integer`; see [`LiteralValue::Decimal`] for numbers with a fraction.
    Integer(i64),
    /// A `123L` suffixed integer literal -- FHIRPath's 64-bit `Long`.
    Long(i64),
    /// A number literal containing a decimal point.
    Decimal(Decimal),
    /// A single- or double-quoted string literal (already unescaped).
    String(String),
    /// `@2015-02-04`, possibly partial (`@2015`, `@2015-02`).
    Date(String),
    /// `@2015-02-04T14:34:28+09:00`, possibly partial.
    DateTime(String),
    /// `@T14:34:28`, possibly partial.
    Time(String),
    /// `4 'wk'` / `4 days` -- a number followed by an optional unit.
    Quantity(Decimal, Option<String>),
}

/// A (namespace, name) type reference used by `is`/`as`/`ofType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSpecifier {
    /// Optional namespace, e.g. `System` or `FHIR`.
    pub namespace: Option<String>,
    /// Type name, e.g. `Integer`, `Patient`.
    pub name: String,
}

impl TypeSpecifier {
    /// Build a type specifier with no namespace.
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Fully qualified name as it would appear in source (`FHIR.Patient`, or
    /// just `Patient` when unqualified).
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// One step of a `.`-chained navigation/invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// A bare identifier member access, e.g. `.name`.
    Identifier(String),
    /// `$this`
    This,
    /// `$index`
    Index,
    /// `$total`
    Total,
    /// A function or method call, e.g. `.where(...)`, or a root-level call
    /// like `today()` when it is the first segment of an expression.
    Function {
        /// Function name.
        name: String,
        /// Argument expressions (unevaluated).
        args: Vec<ExpressionNode>,
    },
}

/// One node of the typed FHIRPath AST.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    /// The node's syntactic shape.
    pub kind: ExprKind,
    /// Verbatim source span.
    pub span: Span,
}

/// The syntactic shape of an [`ExpressionNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A literal term.
    Literal(LiteralValue),
    /// An external constant reference, `%name` (including `%resource`,
    /// `%context`, `%ucum`, user-supplied variables, and environment
    /// variables requiring the `%\`quoted\`` form).
    ExternalConstant(String),
    /// `base.segment` navigation; `base` is `None` for a root-level bare
    /// identifier or function call (e.g. `Patient`, `today()`).
    Path {
        /// Navigation root, or `None` at the start of an expression.
        base: Option<Box<ExpressionNode>>,
        /// The segment being applied.
        segment: PathSegment,
    },
    /// `base[index]`.
    Index {
        /// Indexed collection.
        base: Box<ExpressionNode>,
        /// Index expression (must evaluate to a singleton integer).
        index: Box<ExpressionNode>,
    },
    /// Leading `+`/`-` applied to a term.
    Unary {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        operand: Box<ExpressionNode>,
    },
    /// A two-operand operator expression.
    Binary {
        /// The operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<ExpressionNode>,
        /// Right operand.
        right: Box<ExpressionNode>,
    },
    /// `expr is TypeSpecifier`.
    Is {
        /// Tested expression.
        expr: Box<ExpressionNode>,
        /// Candidate type.
        type_specifier: TypeSpecifier,
    },
    /// `expr as TypeSpecifier`.
    As {
        /// Source expression.
        expr: Box<ExpressionNode>,
        /// Target type.
        type_specifier: TypeSpecifier,
    },
    /// A bare type specifier used as a term (the right-hand operand of
    /// `is`/`as` is parsed through this variant before being unwrapped).
    TypeSpecifierTerm(TypeSpecifier),
    /// `(expr)` -- kept so span/precedence are traceable, unwrapped by the
    /// compiler with no semantic effect of its own.
    Parenthesized(Box<ExpressionNode>),
}

impl ExpressionNode {
    /// Construct a node.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The verbatim source text this node spans, given the original source.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source
            .get(self.span.start..self.span.end)
            .unwrap_or_default()
    }

    /// Render this node (and its descendants) as the generic tagged tree
    /// described by the parser/compiler wire contract -- `{ type, text,
    /// terminalNodeText, children }`. Used by callers that need the
    /// interoperable shape (e.g. cross-language tooling) rather than the
    /// typed variants above.
    pub fn to_parse_node(&self, source: &str) -> ParseNode {
        let text = self.text(source).to_string();
        let mut node = match &self.kind {
            ExprKind::Literal(_) => ParseNode::new("Literal", text),
            ExprKind::ExternalConstant(name) => {
                ParseNode::new("ExternalConstant", text).with_terminal(name.clone())
            }
            ExprKind::Path { base, segment } => {
                let mut node = ParseNode::new(path_segment_tag(segment), text);
                if let Some(base) = base {
                    node = node.with_child(base.to_parse_node(source));
                }
                match segment {
                    PathSegment::Identifier(name) => node = node.with_terminal(name.clone()),
                    PathSegment::Function { name, args } => {
                        node = node.with_terminal(name.clone());
                        for arg in args {
                            node = node.with_child(arg.to_parse_node(source));
                        }
                    }
                    PathSegment::This | PathSegment::Index | PathSegment::Total => {}
                }
                node
            }
            ExprKind::Index { base, index } => ParseNode::new("IndexerExpression", text)
                .with_child(base.to_parse_node(source))
                .with_child(index.to_parse_node(source)),
            ExprKind::Unary { op, operand } => ParseNode::new("PolarityExpression", text)
                .with_terminal(op.to_string())
                .with_child(operand.to_parse_node(source)),
            ExprKind::Binary { op, left, right } => ParseNode::new(binary_node_type(*op), text)
                .with_terminal(op.to_string())
                .with_child(left.to_parse_node(source))
                .with_child(right.to_parse_node(source)),
            ExprKind::Is {
                expr,
                type_specifier,
            } => ParseNode::new("TypeExpression", text)
                .with_terminal("is")
                .with_child(expr.to_parse_node(source))
                .with_child(type_specifier_parse_node(type_specifier)),
            ExprKind::As {
                expr,
                type_specifier,
            } => ParseNode::new("TypeExpression", text)
                .with_terminal("as")
                .with_child(expr.to_parse_node(source))
                .with_child(type_specifier_parse_node(type_specifier)),
            ExprKind::TypeSpecifierTerm(ts) => type_specifier_parse_node(ts),
            ExprKind::Parenthesized(inner) => {
                ParseNode::new("ParenthesizedTerm", text).with_child(inner.to_parse_node(source))
            }
        };
        node = node.at(self.span.start, self.span.line, self.span.column);
        node
    }
}

fn path_segment_tag(segment: &PathSegment) -> &'static str {
    match segment {
        PathSegment::Identifier(_) => "MemberInvocation",
        PathSegment::This => "ThisInvocation",
        PathSegment::Index => "IndexInvocation",
        PathSegment::Total => "TotalInvocation",
        PathSegment::Function { .. } => "FunctionInvocation",
    }
}

fn binary_node_type(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Div | BinaryOperator::Mod => {
            "MultiplicativeExpression"
        }
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Concat => "AdditiveExpression",
        BinaryOperator::Union => "UnionExpression",
        BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterOrEqual => "InequalityExpression",
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::Equivalent
        | BinaryOperator::NotEquivalent => "EqualityExpression",
        BinaryOperator::In | BinaryOperator::Contains => "MembershipExpression",
        BinaryOperator::And => "AndExpression",
        BinaryOperator::Or | BinaryOperator::Xor => "OrExpression",
        BinaryOperator::Implies => "ImpliesExpression",
    }
}

fn type_specifier_parse_node(ts: &TypeSpecifier) -> ParseNode {
    ParseNode::new("TypeSpecifier", ts.qualified_name()).with_terminal(ts.qualified_name())
}
