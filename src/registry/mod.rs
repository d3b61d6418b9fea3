//! The FHIRPath standard-library invocation table.
//!
//! Each function/operator is a data record (name, arity table, nullability,
//! implementation) rather than a class in a hierarchy; the compiler does a
//! single map lookup and validates arity/parameter kinds against the
//! record at bind time. This keeps user-defined functions (`userInvocationTable`,
//! §6) a simple additional set of records rather than a parallel code path.

mod aggregate;
mod combining;
mod conversion;
mod existence;
mod filtering;
pub(crate) mod logic;
pub(crate) mod math;
mod navigation;
pub(crate) mod string_fns;
mod temporal_fns;
mod terminology;
mod tree;
pub(crate) mod type_ops;

use crate::compiler::bound::BoundNode;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::FhirPathValue;
use std::collections::HashMap;
use std::sync::Arc;

/// The kind of a declared parameter, used both to validate call sites at
/// compile time and to decide how the compiler binds the corresponding
/// argument expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Pass an unevaluated bound sub-expression; the function body invokes
    /// it itself (once per item, for macros like `where`/`select`).
    Expr,
    /// A bare identifier captured without evaluation (e.g. `extension`'s
    /// positional name is always a literal in practice, but some
    /// functions accept either form).
    Identifier,
    /// A type specifier captured without evaluation (`is`, `as`, `ofType`).
    TypeSpecifier,
    /// Evaluate eagerly against the *outer* context and coerce to a
    /// singleton of the given kind (empty input collection yields empty
    /// unless the function declares itself non-nullable for that arg).
    Value(ValueKind),
}

/// Coercion target for a [`ParamKind::Value`] argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Boolean,
    Number,
    String,
    StringOrNumber,
    Any,
}

/// A resolved call argument, passed to a [`NativeFn`].
pub enum ArgValue<'a> {
    /// A value already coerced to the declared [`ValueKind`] (or `Empty`).
    Value(FhirPathValue),
    /// A deferred sub-expression; invoke via `evaluator.eval(node, item, ctx)`.
    Expr(&'a BoundNode),
    /// A literal identifier.
    Identifier(&'a str),
    /// A literal type specifier.
    TypeSpecifier(&'a crate::ast::expression::TypeSpecifier),
}

/// The signature every built-in and user-defined function implements.
///
/// `input` is the collection the function/operator is called on (the left
/// side of `.name(...)`, or the receiver for infix operators modeled as
/// two-argument functions). `engine` lets macro-style functions recurse
/// into `Expr` arguments.
pub type NativeFn = Arc<
    dyn Fn(
            &FhirPathValue,
            &[ArgValue<'_>],
            &EvaluationContext,
            &Evaluator,
        ) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync,
>;

/// A single entry in the invocation table.
#[derive(Clone)]
pub struct FunctionEntry {
    /// The function's bare name (no parentheses), e.g. `"where"`.
    pub name: String,
    /// Accepted argument counts and the parameter kinds for each.
    pub arities: HashMap<usize, Vec<ParamKind>>,
    /// If true, an empty `input` collection short-circuits to empty
    /// without invoking `implementation`.
    pub nullable: bool,
    /// If true, `input`/results are `ResourceNode`s rather than plain
    /// data (relevant to navigation-family functions).
    pub internal_structures: bool,
    /// Whether this function suspends (only `weight`/`ordinal`).
    pub is_async: bool,
    /// The implementation.
    pub implementation: NativeFn,
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("arities", &self.arities.keys().collect::<Vec<_>>())
            .field("nullable", &self.nullable)
            .field("is_async", &self.is_async)
            .finish()
    }
}

/// The full set of registered functions, built once at engine construction
/// and shared (via `Arc`) across every evaluation.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    /// An empty registry (no functions registered).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full standard-library registry.
    pub fn new() -> Self {
        let mut registry = Self::default();
        existence::register(&mut registry);
        filtering::register(&mut registry);
        combining::register(&mut registry);
        conversion::register(&mut registry);
        string_fns::register(&mut registry);
        math::register(&mut registry);
        aggregate::register(&mut registry);
        logic::register(&mut registry);
        navigation::register(&mut registry);
        tree::register(&mut registry);
        temporal_fns::register(&mut registry);
        type_ops::register(&mut registry);
        terminology::register(&mut registry);
        registry
    }

    /// Register (or overwrite) an entry. Used both by the built-in
    /// category modules and by callers supplying `userInvocationTable`.
    pub fn register(&mut self, entry: FunctionEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(name)
    }

    /// Merge a user-supplied table on top of the built-ins, overwriting by
    /// name on collision (per §6, `userInvocationTable` adds user-defined
    /// functions with the same arity metadata shape as built-ins).
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = FunctionEntry>) -> Self {
        for entry in overrides {
            self.register(entry);
        }
        self
    }
}

/// Coerce `value` to a singleton of `kind`, per the `Value(kind)` parameter
/// rule: empty collections pass through as `Empty`, 2+ items is an error.
pub fn coerce_value_kind(
    value: &FhirPathValue,
    kind: ValueKind,
    context_fn: &str,
) -> FhirPathResult<FhirPathValue> {
    if value.is_empty() {
        return Ok(FhirPathValue::Empty);
    }
    let single = value.as_singleton().ok_or_else(|| {
        FhirPathError::singleton_error(context_fn.to_string(), value.count())
    })?;
    match kind {
        ValueKind::Any => Ok(single.clone()),
        ValueKind::Integer => match single {
            FhirPathValue::Integer(_) | FhirPathValue::Long(_) => Ok(single.clone()),
            _ => Err(FhirPathError::type_error(
                context_fn.to_string(),
                "Integer".to_string(),
                single.type_name().to_string(),
            )),
        },
        ValueKind::Boolean => match single {
            FhirPathValue::Boolean(_) => Ok(single.clone()),
            _ => Err(FhirPathError::type_error(
                context_fn.to_string(),
                "Boolean".to_string(),
                single.type_name().to_string(),
            )),
        },
        ValueKind::Number => match single {
            FhirPathValue::Integer(_) | FhirPathValue::Long(_) | FhirPathValue::Decimal(_) => {
                Ok(single.clone())
            }
            _ => Err(FhirPathError::type_error(
                context_fn.to_string(),
                "Number".to_string(),
                single.type_name().to_string(),
            )),
        },
        ValueKind::String => match single {
            FhirPathValue::String(_) => Ok(single.clone()),
            _ => Err(FhirPathError::type_error(
                context_fn.to_string(),
                "String".to_string(),
                single.type_name().to_string(),
            )),
        },
        ValueKind::StringOrNumber => match single {
            FhirPathValue::String(_)
            | FhirPathValue::Integer(_)
            | FhirPathValue::Long(_)
            | FhirPathValue::Decimal(_) => Ok(single.clone()),
            _ => Err(FhirPathError::type_error(
                context_fn.to_string(),
                "String|Number".to_string(),
                single.type_name().to_string(),
            )),
        },
    }
}
