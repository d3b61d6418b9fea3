//! Combining collections: `union` (the function form, distinct from the `|`
//! operator which also de-duplicates via the same rule), `combine`,
//! `intersect`, `exclude`.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ValueKind};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::{FhirPathValue, deep_equal, distinct};
use std::sync::Arc;

fn entry(
    name: &str,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext, &Evaluator) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync
        + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: [(1, vec![ValueKind::Any].into_iter().map(super::ParamKind::Value).collect())]
            .into_iter()
            .collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(f),
    }
}

fn other_collection(args: &[ArgValue<'_>], fn_name: &str) -> FhirPathResult<Vec<FhirPathValue>> {
    match args.first() {
        Some(ArgValue::Value(v)) => Ok(v.to_vec()),
        _ => Err(FhirPathError::domain(format!("{fn_name}: expected a collection argument"))),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("union", |input, args, _, _| {
        let other = other_collection(args, "union")?;
        let mut merged = input.to_vec();
        merged.extend(other);
        Ok(FhirPathValue::collection(distinct(&merged)))
    }));

    registry.register(entry("combine", |input, args, _, _| {
        let other = other_collection(args, "combine")?;
        let mut merged = input.to_vec();
        merged.extend(other);
        Ok(FhirPathValue::collection(merged))
    }));

    registry.register(entry("intersect", |input, args, _, _| {
        let other = other_collection(args, "intersect")?;
        let mine = input.to_vec();
        let kept: Vec<FhirPathValue> = mine
            .into_iter()
            .filter(|item| other.iter().any(|o| deep_equal(item, o) == Some(true)))
            .collect();
        Ok(FhirPathValue::collection(distinct(&kept)))
    }));

    registry.register(entry("exclude", |input, args, _, _| {
        let other = other_collection(args, "exclude")?;
        let mine = input.to_vec();
        let kept: Vec<FhirPathValue> = mine
            .into_iter()
            .filter(|item| !other.iter().any(|o| deep_equal(item, o) == Some(true)))
            .collect();
        Ok(FhirPathValue::collection(kept))
    }));
}
