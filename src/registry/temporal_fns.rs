//! `now()`, `today()`, `timeOfDay()` -- all three read the single "now"
//! instant captured once per top-level evaluation
//! ([`EvaluationContext::now`]), so that repeated calls within one
//! evaluation are mutually consistent.

use super::{FunctionEntry, FunctionRegistry};
use crate::model::FhirPathValue;
use std::sync::Arc;

fn entry(
    name: &str,
    f: impl Fn(&crate::evaluator::context::EvaluationContext) -> FhirPathValue + Send + Sync + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: [(0, vec![])].into_iter().collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(move |_input, _args, ctx, _evaluator| Ok(f(ctx))),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("now", |ctx| FhirPathValue::DateTime(ctx.now.clone())));
    registry.register(entry("today", |ctx| FhirPathValue::Date(ctx.now.date)));
    registry.register(entry("timeOfDay", |ctx| match &ctx.now.time {
        Some(time) => FhirPathValue::Time(*time),
        None => FhirPathValue::Empty,
    }));
}
