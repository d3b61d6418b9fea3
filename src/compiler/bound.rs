//! The bound tree: each [`crate::ast::ExpressionNode`] is resolved once
//! into a [`BoundNode`], with function calls already looked up in the
//! registry and arity/parameter-kind validated. Bound trees are immutable
//! and safe to cache/reuse across evaluations of the same source text.

use crate::ast::expression::{ExprKind, ExpressionNode, LiteralValue, PathSegment, TypeSpecifier};
use crate::ast::operator::{BinaryOperator, UnaryOperator};
use crate::error::{FhirPathError, FhirPathResult};
use crate::model::{FhirPathValue, Quantity};
use crate::registry::{FunctionEntry, FunctionRegistry, ParamKind};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// One bound argument, still carrying enough of the original AST to be
/// evaluated lazily (`Expr`) or coerced eagerly (`Value`) at call time.
#[derive(Debug, Clone)]
pub enum BoundArg {
    /// A value-kind argument, bound but not yet evaluated against the
    /// call-site context (value-kind args are evaluated once per call
    /// against the *outer* context, not per lambda iteration).
    Value(Box<BoundNode>, crate::registry::ValueKind),
    /// A deferred sub-expression for macro-style functions.
    Expr(Box<BoundNode>),
    /// A literal identifier captured without evaluation.
    Identifier(String),
    /// A literal type specifier captured without evaluation.
    TypeSpecifier(TypeSpecifier),
}

/// A resolved function call: the looked-up entry plus bound arguments.
#[derive(Clone)]
pub struct BoundCall {
    /// The resolved registry entry.
    pub entry: Arc<FunctionEntry>,
    /// Bound call arguments, in declaration order.
    pub args: Vec<BoundArg>,
}

impl std::fmt::Debug for BoundCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCall")
            .field("name", &self.entry.name)
            .field("args", &self.args)
            .finish()
    }
}

/// A single bound tree node.
#[derive(Debug, Clone)]
pub struct BoundNode {
    /// The node's bound shape.
    pub kind: BoundKind,
}

/// The shape of a [`BoundNode`].
#[derive(Debug, Clone)]
pub enum BoundKind {
    /// A constant value, already converted from its [`LiteralValue`] form.
    Literal(FhirPathValue),
    /// `%name` environment/user variable reference.
    ExternalConstant(String),
    /// `$this`.
    This,
    /// `$index`.
    Index,
    /// `$total`.
    Total,
    /// Plain member navigation, e.g. `.name`. `base` is `None` for the
    /// first segment of an expression (navigates from the current input).
    Identifier {
        /// Navigation root, or `None` to navigate from the current input.
        base: Option<Box<BoundNode>>,
        /// Member name.
        name: String,
    },
    /// A resolved function/method call.
    Call {
        /// Navigation root (receiver), or `None` for a root-level call.
        base: Option<Box<BoundNode>>,
        /// The resolved call.
        call: BoundCall,
    },
    /// `base[index]`.
    Index_ {
        /// Indexed collection.
        base: Box<BoundNode>,
        /// Index expression.
        index: Box<BoundNode>,
    },
    /// Leading `+`/`-`.
    Unary {
        /// The operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<BoundNode>,
    },
    /// A two-operand operator expression.
    Binary {
        /// The operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<BoundNode>,
        /// Right operand.
        right: Box<BoundNode>,
    },
    /// `expr is TypeSpecifier`.
    Is {
        /// Tested expression.
        expr: Box<BoundNode>,
        /// Candidate type.
        type_specifier: TypeSpecifier,
    },
    /// `expr as TypeSpecifier`.
    As {
        /// Source expression.
        expr: Box<BoundNode>,
        /// Target type.
        type_specifier: TypeSpecifier,
    },
    /// A bare type specifier term (right-hand side of `is`/`as` parsed
    /// through the expression grammar).
    TypeSpecifierTerm(TypeSpecifier),
}

/// Compile `ast` into a bound tree, resolving every function call against
/// `registry` and validating arity/parameter kinds.
pub fn compile(ast: &ExpressionNode, registry: &FunctionRegistry) -> FhirPathResult<BoundNode> {
    bind(ast, registry)
}

fn bind(node: &ExpressionNode, registry: &FunctionRegistry) -> FhirPathResult<BoundNode> {
    let kind = match &node.kind {
        ExprKind::Literal(lit) => BoundKind::Literal(bind_literal(lit)?),
        ExprKind::ExternalConstant(name) => BoundKind::ExternalConstant(name.clone()),
        ExprKind::Path { base, segment } => {
            return bind_path(base.as_deref(), segment, registry);
        }
        ExprKind::Index { base, index } => BoundKind::Index_ {
            base: Box::new(bind(base, registry)?),
            index: Box::new(bind(index, registry)?),
        },
        ExprKind::Unary { op, operand } => BoundKind::Unary {
            op: *op,
            operand: Box::new(bind(operand, registry)?),
        },
        ExprKind::Binary { op, left, right } => BoundKind::Binary {
            op: *op,
            left: Box::new(bind(left, registry)?),
            right: Box::new(bind(right, registry)?),
        },
        ExprKind::Is {
            expr,
            type_specifier,
        } => BoundKind::Is {
            expr: Box::new(bind(expr, registry)?),
            type_specifier: type_specifier.clone(),
        },
        ExprKind::As {
            expr,
            type_specifier,
        } => BoundKind::As {
            expr: Box::new(bind(expr, registry)?),
            type_specifier: type_specifier.clone(),
        },
        ExprKind::TypeSpecifierTerm(type_specifier) => {
            BoundKind::TypeSpecifierTerm(type_specifier.clone())
        }
        ExprKind::Parenthesized(inner) => return bind(inner, registry),
    };
    Ok(BoundNode { kind })
}

fn bind_path(
    base: Option<&ExpressionNode>,
    segment: &PathSegment,
    registry: &FunctionRegistry,
) -> FhirPathResult<BoundNode> {
    let bound_base = base.map(|b| bind(b, registry)).transpose()?.map(Box::new);
    let kind = match segment {
        PathSegment::This => BoundKind::This,
        PathSegment::Index => BoundKind::Index,
        PathSegment::Total => BoundKind::Total,
        PathSegment::Identifier(name) => BoundKind::Identifier {
            base: bound_base,
            name: name.clone(),
        },
        PathSegment::Function { name, args } => {
            let call = bind_call(name, args, registry)?;
            BoundKind::Call {
                base: bound_base,
                call,
            }
        }
    };
    Ok(BoundNode { kind })
}

fn bind_call(
    name: &str,
    args: &[ExpressionNode],
    registry: &FunctionRegistry,
) -> FhirPathResult<BoundCall> {
    let entry = registry
        .get(name)
        .ok_or_else(|| FhirPathError::domain(format!("unknown function '{name}'")))?;
    let kinds = entry.arities.get(&args.len()).ok_or_else(|| {
        FhirPathError::ArityError {
            function: name.to_string(),
            expected: entry.arities.keys().copied().collect(),
            got: args.len(),
        }
    })?;

    let mut bound_args = Vec::with_capacity(args.len());
    for (arg, kind) in args.iter().zip(kinds.iter()) {
        bound_args.push(bind_arg(arg, *kind, registry)?);
    }

    Ok(BoundCall {
        entry: Arc::new(entry.clone()),
        args: bound_args,
    })
}

fn bind_arg(
    arg: &ExpressionNode,
    kind: ParamKind,
    registry: &FunctionRegistry,
) -> FhirPathResult<BoundArg> {
    match kind {
        ParamKind::Expr => Ok(BoundArg::Expr(Box::new(bind(arg, registry)?))),
        ParamKind::Value(value_kind) => {
            Ok(BoundArg::Value(Box::new(bind(arg, registry)?), value_kind))
        }
        ParamKind::Identifier => match &arg.kind {
            ExprKind::Path {
                base: None,
                segment: PathSegment::Identifier(name),
            } => Ok(BoundArg::Identifier(name.clone())),
            ExprKind::Literal(LiteralValue::String(s)) => Ok(BoundArg::Identifier(s.clone())),
            _ => Err(FhirPathError::domain(
                "expected a bare identifier argument".to_string(),
            )),
        },
        ParamKind::TypeSpecifier => match &arg.kind {
            ExprKind::TypeSpecifierTerm(ts) => Ok(BoundArg::TypeSpecifier(ts.clone())),
            ExprKind::Path {
                base: None,
                segment: PathSegment::Identifier(name),
            } => Ok(BoundArg::TypeSpecifier(TypeSpecifier::simple(name.clone()))),
            _ => Err(FhirPathError::domain(
                "expected a type specifier argument".to_string(),
            )),
        },
    }
}

fn bind_literal(lit: &LiteralValue) -> FhirPathResult<FhirPathValue> {
    Ok(match lit {
        LiteralValue::Null => FhirPathValue::Empty,
        LiteralValue::Boolean(b) => FhirPathValue::Boolean(*b),
        LiteralValue::Integer(i) => FhirPathValue::Integer(*i),
        LiteralValue::Long(l) => FhirPathValue::Long(*l),
        LiteralValue::Decimal(d) => FhirPathValue::Decimal(*d),
        LiteralValue::String(s) => FhirPathValue::String(s.clone()),
        LiteralValue::Date(text) => FhirPathValue::Date(
            crate::model::PartialDate::parse(text)
                .map_err(FhirPathError::domain)?,
        ),
        LiteralValue::DateTime(text) => FhirPathValue::DateTime(
            crate::model::PartialDateTime::parse(text)
                .map_err(FhirPathError::domain)?,
        ),
        LiteralValue::Time(text) => FhirPathValue::Time(
            crate::model::PartialTime::parse(text)
                .map_err(FhirPathError::domain)?,
        ),
        LiteralValue::Quantity(value, unit) => {
            FhirPathValue::Quantity(Quantity::new(*value, unit.clone()))
        }
    })
}

/// Parse a decimal string to the crate's numeric type, used by a handful of
/// registry functions that accept string inputs (`toDecimal`, string→number
/// quantity parsing).
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text).ok()
}

/// Whether any call reachable from `node` resolves to an async (terminology)
/// function. Computed once at compile time so the engine can pick the sync
/// fast path or the async fallback walk without re-scanning per evaluation.
pub fn uses_async(node: &BoundNode) -> bool {
    match &node.kind {
        BoundKind::Call { base, call } => {
            call.entry.is_async
                || base.as_deref().is_some_and(uses_async)
                || call.args.iter().any(|arg| match arg {
                    BoundArg::Expr(expr) | BoundArg::Value(expr, _) => uses_async(expr),
                    BoundArg::Identifier(_) | BoundArg::TypeSpecifier(_) => false,
                })
        }
        BoundKind::Identifier { base, .. } => base.as_deref().is_some_and(uses_async),
        BoundKind::Index_ { base, index } => uses_async(base) || uses_async(index),
        BoundKind::Unary { operand, .. } => uses_async(operand),
        BoundKind::Binary { left, right, .. } => uses_async(left) || uses_async(right),
        BoundKind::Is { expr, .. } | BoundKind::As { expr, .. } => uses_async(expr),
        BoundKind::Literal(_)
        | BoundKind::ExternalConstant(_)
        | BoundKind::This
        | BoundKind::Index
        | BoundKind::Total
        | BoundKind::TypeSpecifierTerm(_) => false,
    }
}
