//! Three-valued boolean logic. `and`/`or`/`xor`/`implies` are bound
//! directly as [`crate::compiler::bound::BoundKind::Binary`] nodes (so the
//! evaluator can short-circuit without evaluating the other operand); this
//! module holds the pure truth-table functions the evaluator calls into,
//! plus the one genuine invocation-table entry, `not()`.

use super::{ArgValue, FunctionEntry, FunctionRegistry};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::FhirPathValue;
use std::sync::Arc;

/// `and`: false dominates (even if the other operand is empty); otherwise
/// empty propagates unless both sides are true.
pub(crate) fn and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// `or`: true dominates; otherwise empty propagates unless both sides are false.
pub(crate) fn or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// `xor`: defined only when both sides are known.
pub(crate) fn xor(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x != y),
        _ => None,
    }
}

/// `implies`: a false antecedent makes the whole expression true regardless
/// of the consequent (including an empty antecedent only once we also know
/// the consequent, per the antecedent-empty rule below).
pub(crate) fn implies(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match a {
        Some(false) => Some(true),
        Some(true) => b,
        None => match b {
            Some(true) => Some(true),
            _ => None,
        },
    }
}

/// `not`
pub(crate) fn not(a: Option<bool>) -> Option<bool> {
    a.map(|x| !x)
}

/// Coerce a FHIRPath value to the `Option<bool>` domain the truth tables
/// operate over: empty maps to `None`, a non-boolean singleton is a type
/// error, 2+ items is a singleton violation.
pub(crate) fn as_opt_bool(value: &FhirPathValue, context: &str) -> FhirPathResult<Option<bool>> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.as_singleton() {
        Some(FhirPathValue::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(FhirPathError::type_error(context, "Boolean", other.type_name())),
        None => Err(FhirPathError::singleton_error(context, value.count())),
    }
}

fn opt_bool_to_value(b: Option<bool>) -> FhirPathValue {
    match b {
        Some(v) => FhirPathValue::Boolean(v),
        None => FhirPathValue::Empty,
    }
}

fn entry(
    name: &str,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext, &Evaluator) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync
        + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: [(0, vec![])].into_iter().collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(f),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("not", |input, _, _, _| {
        let b = as_opt_bool(input, "not")?;
        Ok(opt_bool_to_value(not(b)))
    }));
}
