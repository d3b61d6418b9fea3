//! Shared type-matching logic behind `is`/`as`/`ofType`, plus the `type()`
//! reflection function. `is`/`as` themselves are bound directly as
//! [`crate::compiler::bound::BoundKind::Is`]/`As` nodes (not invocation-table
//! entries) since their right-hand side is a type specifier, not an
//! expression -- but they share the matching rules implemented here with
//! `ofType`, which *is* a registry entry.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind};
use crate::ast::expression::TypeSpecifier;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::model::FhirPathValue;
use std::sync::Arc;

fn resource_type_name(value: &FhirPathValue) -> Option<String> {
    match value {
        FhirPathValue::Resource(node) => node.fhir_node_data_type().map(str::to_string),
        _ => None,
    }
}

/// Walk `ctx.model`'s `type_to_parent` chain from `start`, looking for `target`.
fn type_derives_from(ctx: &EvaluationContext, start: &str, target: &str) -> bool {
    if start == target {
        return true;
    }
    let mut current = start.to_string();
    while let Some(parent) = ctx.model.type_to_parent(&current) {
        if parent == target {
            return true;
        }
        current = parent.to_string();
    }
    false
}

/// Whether `value` is a `ResourceNode` navigated to a FHIR `Quantity`-typed
/// element (`Observation.valueQuantity`, `Quantity.value`'s own parent,
/// etc). FHIR's `Quantity` complex type specializes `System.Quantity`, so
/// `is`/`as`/`ofType Quantity` must accept these the same way they accept a
/// literal [`FhirPathValue::Quantity`] -- navigation leaves compound
/// elements as schema-aware resource nodes rather than unboxing every
/// complex type, so the `System.Quantity` check has to look through that
/// wrapper for this one type specifically.
fn is_fhir_quantity_node(value: &FhirPathValue) -> bool {
    matches!(value, FhirPathValue::Resource(node) if node.fhir_node_data_type() == Some("Quantity"))
}

/// Whether a single item matches `ts`, considering both the `System.*`
/// primitive hierarchy and the model's FHIR type-parent chain.
pub(crate) fn matches_type(value: &FhirPathValue, ts: &TypeSpecifier, ctx: &EvaluationContext) -> bool {
    let target = ts.name.as_str();
    if target == "Quantity" && matches!(ts.namespace.as_deref(), None | Some("System")) && is_fhir_quantity_node(value)
    {
        return true;
    }
    match ts.namespace.as_deref() {
        Some("System") => crate::model::matches_system_type(value, target),
        Some(_) => resource_type_name(value)
            .map(|rt| type_derives_from(ctx, &rt, target))
            .unwrap_or(false),
        None => {
            if crate::model::is_system_primitive(target) {
                crate::model::matches_system_type(value, target)
            } else {
                resource_type_name(value)
                    .map(|rt| type_derives_from(ctx, &rt, target))
                    .unwrap_or(false)
            }
        }
    }
}

/// `expr is TypeSpecifier`.
pub(crate) fn eval_is(
    value: &FhirPathValue,
    ts: &TypeSpecifier,
    ctx: &EvaluationContext,
) -> FhirPathResult<FhirPathValue> {
    if value.is_empty() {
        return Ok(FhirPathValue::Empty);
    }
    let single = value
        .as_singleton()
        .ok_or_else(|| FhirPathError::singleton_error("is", value.count()))?;
    Ok(FhirPathValue::Boolean(matches_type(single, ts, ctx)))
}

/// `expr as TypeSpecifier`.
pub(crate) fn eval_as(
    value: &FhirPathValue,
    ts: &TypeSpecifier,
    ctx: &EvaluationContext,
) -> FhirPathResult<FhirPathValue> {
    if value.is_empty() {
        return Ok(FhirPathValue::Empty);
    }
    let single = value
        .as_singleton()
        .ok_or_else(|| FhirPathError::singleton_error("as", value.count()))?;
    Ok(if matches_type(single, ts, ctx) {
        single.clone()
    } else {
        FhirPathValue::Empty
    })
}

fn entry(
    name: &str,
    arities: impl IntoIterator<Item = (usize, Vec<ParamKind>)>,
    nullable: bool,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync
        + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: arities.into_iter().collect(),
        nullable,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(move |input, args, ctx, _evaluator| f(input, args, ctx)),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry(
        "ofType",
        [(1, vec![ParamKind::TypeSpecifier])],
        false,
        |input, args, ctx| {
            let ts = match &args[0] {
                ArgValue::TypeSpecifier(ts) => *ts,
                _ => return Err(FhirPathError::domain("ofType: expected a type specifier argument")),
            };
            let items = input
                .to_vec()
                .into_iter()
                .filter(|item| matches_type(item, ts, ctx))
                .collect();
            Ok(FhirPathValue::collection(items))
        },
    ));

    registry.register(entry("type", [(0, vec![])], false, |input, _, _| {
        let single = input
            .as_singleton()
            .ok_or_else(|| FhirPathError::singleton_error("type", input.count()))?;
        let (namespace, name) = match single {
            FhirPathValue::Resource(node) => (
                "FHIR".to_string(),
                node.fhir_node_data_type().unwrap_or("Element").to_string(),
            ),
            other => (
                "System".to_string(),
                crate::model::system_type_of(other).unwrap_or("Any").to_string(),
            ),
        };
        Ok(FhirPathValue::TypeInfoObject { namespace, name })
    }));
}
