//! Structural navigation: `children()`, `descendants()`.

use super::{ArgValue, FunctionEntry, FunctionRegistry};
use crate::error::FhirPathResult;
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::evaluator::navigate;
use crate::model::{FhirPathValue, deep_equal};
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
        arities: [(0, vec![])].into_iter().collect(),
        nullable: false,
        internal_structures: true,
        is_async: false,
        implementation: Arc::new(f),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("children", |input, _, ctx, _| {
        let mut out = Vec::new();
        for item in input.to_vec() {
            out.extend(navigate::children(ctx.model.as_ref(), &item));
        }
        Ok(FhirPathValue::collection(out))
    }));

    registry.register(entry("descendants", |input, _, ctx, _| {
        // `repeat(children())` unrolled: breadth-first closure over
        // `children()`, de-duplicating by structural equality so cycles in
        // self-referential resources terminate the walk.
        let mut seen: Vec<FhirPathValue> = Vec::new();
        let mut frontier = input.to_vec();
        loop {
            let mut next = Vec::new();
            for item in &frontier {
                next.extend(navigate::children(ctx.model.as_ref(), item));
            }
            let fresh: Vec<FhirPathValue> = next
                .into_iter()
                .filter(|item| !seen.iter().any(|s| deep_equal(s, item) == Some(true)))
                .collect();
            if fresh.is_empty() {
                break;
            }
            seen.extend(fresh.iter().cloned());
            frontier = fresh;
        }
        Ok(FhirPathValue::collection(seen))
    }));
}
