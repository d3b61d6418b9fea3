//! Folding: `aggregate`, `sum`, `min`, `max`, `avg`. (`count` lives in
//! `existence.rs`, alongside the rest of the cardinality predicates.)

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind};
use crate::compiler::bound::BoundNode;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::compare::compare_singletons;
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::FhirPathValue;
use crate::registry::math;
use std::cmp::Ordering;
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
        "aggregate",
        [(1, vec![ParamKind::Expr]), (2, vec![ParamKind::Expr, ParamKind::Value(super::ValueKind::Any)])],
        |input, args, ctx, evaluator| {
            let expr = expr_arg(args, 0, "aggregate")?;
            let mut total = match args.get(1) {
                Some(ArgValue::Value(v)) => v.clone(),
                _ => FhirPathValue::Empty,
            };
            // `$total` must be visible to `expr` for the *current* iteration
            // before it is reassigned from that iteration's result -- a
            // naive fold that binds `$total` only after evaluating `expr`
            // would make the running accumulator invisible to the very
            // expression meant to update it.
            for (idx, item) in input.to_vec().into_iter().enumerate() {
                let lambda_ctx = ctx.with_lambda(item.clone(), idx, total.clone());
                total = evaluator.eval(expr, &item, &lambda_ctx)?;
            }
            Ok(total)
        },
    ));

    registry.register(entry("sum", [(0, vec![])], |input, _, _, _| {
        let items = input.to_vec();
        if items.is_empty() {
            return Ok(FhirPathValue::Empty);
        }
        let mut acc = FhirPathValue::Empty;
        for item in items {
            acc = if acc.is_empty() {
                item
            } else {
                math::add(&acc, &item)?
            };
        }
        Ok(acc)
    }));

    registry.register(entry("min", [(0, vec![])], |input, _, _, _| {
        fold_extremum(input, Ordering::Less)
    }));

    registry.register(entry("max", [(0, vec![])], |input, _, _, _| {
        fold_extremum(input, Ordering::Greater)
    }));

    registry.register(entry("avg", [(0, vec![])], |input, _, _, _| {
        let items = input.to_vec();
        if items.is_empty() {
            return Ok(FhirPathValue::Empty);
        }
        let count = items.len() as i64;
        let mut acc = FhirPathValue::Empty;
        for item in items {
            acc = if acc.is_empty() {
                item
            } else {
                math::add(&acc, &item)?
            };
        }
        math::divide(&acc, &FhirPathValue::Integer(count))
    }));
}

/// Shared fold for `min`/`max`: keep the running extremum by pairwise
/// `compare_singletons`, skipping items that are merely incomparable to it
/// (rather than failing the whole aggregate).
fn fold_extremum(input: &FhirPathValue, keep: Ordering) -> FhirPathResult<FhirPathValue> {
    let items = input.to_vec();
    let mut best: Option<FhirPathValue> = None;
    for item in items {
        best = match best {
            None => Some(item),
            Some(current) => match compare_singletons(&item, &current)? {
                Some(ordering) if ordering == keep => Some(item),
                _ => Some(current),
            },
        };
    }
    Ok(best.unwrap_or(FhirPathValue::Empty))
}
