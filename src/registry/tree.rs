//! Control-flow and diagnostic helpers: `iif`, `defineVariable`, `trace`.
//!
//! `defineVariable` is registered here purely so call sites type-check at
//! compile time (arity, argument kinds); the variable binding itself has
//! no way to escape a plain [`crate::registry::NativeFn`] return value, so
//! the evaluator's path-chain walk special-cases the name and threads the
//! augmented scope to the rest of the chain itself. Calling it outside a
//! chain (value discarded) is harmless: this implementation is the no-op
//! fallback for that case.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind, ValueKind};
use crate::compiler::bound::BoundNode;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::FhirPathValue;
use std::sync::Arc;

fn entry(
    name: &str,
    arities: impl IntoIterator<Item = (usize, Vec<ParamKind>)>,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext, &Evaluator) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync
        + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: arities.into_iter().collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(f),
    }
}

fn expr_arg<'a>(args: &'a [ArgValue<'_>], idx: usize, fn_name: &str) -> FhirPathResult<&'a BoundNode> {
    match args.get(idx) {
        Some(ArgValue::Expr(node)) => Ok(node),
        _ => Err(FhirPathError::domain(format!(
            "{fn_name}: expected an expression argument at position {idx}"
        ))),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry(
        "iif",
        [
            (2, vec![ParamKind::Expr, ParamKind::Expr]),
            (3, vec![ParamKind::Expr, ParamKind::Expr, ParamKind::Expr]),
        ],
        |input, args, ctx, evaluator| {
            let criterion = expr_arg(args, 0, "iif")?;
            let result = evaluator.eval(criterion, input, ctx)?;
            let taken = result.as_bool() == Some(true);
            if taken {
                evaluator.eval(expr_arg(args, 1, "iif")?, input, ctx)
            } else {
                match args.get(2) {
                    Some(ArgValue::Expr(otherwise)) => evaluator.eval(otherwise, input, ctx),
                    _ => Ok(FhirPathValue::Empty),
                }
            }
        },
    ));

    registry.register(entry(
        "defineVariable",
        [
            (1, vec![ParamKind::Value(ValueKind::String)]),
            (2, vec![ParamKind::Value(ValueKind::String), ParamKind::Expr]),
        ],
        |input, _args, _ctx, _evaluator| Ok(input.clone()),
    ));

    registry.register(entry(
        "trace",
        [
            (1, vec![ParamKind::Value(ValueKind::String)]),
            (2, vec![ParamKind::Value(ValueKind::String), ParamKind::Expr]),
        ],
        |input, args, ctx, evaluator| {
            let label = match args.first() {
                Some(ArgValue::Value(FhirPathValue::String(s))) => s.clone(),
                _ => return Err(FhirPathError::domain("trace: expected a string label")),
            };
            let traced = match args.get(1) {
                Some(ArgValue::Expr(expr)) => evaluator.eval(expr, input, ctx)?,
                _ => input.clone(),
            };
            ctx.trace_fn.trace(&label, &traced);
            Ok(input.clone())
        },
    ));
}
