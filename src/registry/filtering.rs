//! Filtering/projection: `where`, `select`, `repeat`, `first`, `last`,
//! `tail`, `skip`, `take`, `single`, `extension`.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind};
use crate::compiler::bound::BoundNode;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::{FhirPathValue, deep_equal};
use std::sync::Arc;

fn entry(
    name: &str,
    arities: impl IntoIterator<Item = (usize, Vec<ParamKind>)>,
    nullable: bool,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext, &Evaluator) -> FhirPathResult<FhirPathValue>
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

/// Evaluate `expr` against each item of `input`, threading `$this`/`$index`,
/// and flatten the per-item results into one output vector.
fn project(
    evaluator: &Evaluator,
    expr: &BoundNode,
    input: &FhirPathValue,
    ctx: &EvaluationContext,
) -> FhirPathResult<Vec<FhirPathValue>> {
    let mut out = Vec::new();
    for (idx, item) in input.to_vec().into_iter().enumerate() {
        let lambda_ctx = ctx.with_lambda(item.clone(), idx, FhirPathValue::Empty);
        out.extend(evaluator.eval(expr, &item, &lambda_ctx)?.to_vec());
    }
    Ok(out)
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry(
        "where",
        [(1, vec![ParamKind::Expr])],
        false,
        |input, args, ctx, evaluator| {
            let expr = expr_arg(args, 0, "where")?;
            let mut out = Vec::new();
            for (idx, item) in input.to_vec().into_iter().enumerate() {
                let lambda_ctx = ctx.with_lambda(item.clone(), idx, FhirPathValue::Empty);
                let keep = evaluator.eval(expr, &item, &lambda_ctx)?;
                if keep.as_bool() == Some(true) {
                    out.push(item);
                }
            }
            Ok(FhirPathValue::collection(out))
        },
    ));

    registry.register(entry(
        "select",
        [(1, vec![ParamKind::Expr])],
        false,
        |input, args, ctx, evaluator| {
            let expr = expr_arg(args, 0, "select")?;
            Ok(FhirPathValue::collection(project(evaluator, expr, input, ctx)?))
        },
    ));

    registry.register(entry(
        "repeat",
        [(1, vec![ParamKind::Expr])],
        false,
        |input, args, ctx, evaluator| {
            let expr = expr_arg(args, 0, "repeat")?;
            // Fixed-point iteration: project, add newly-seen items, repeat
            // until a round contributes nothing new. `seen` guards against
            // cycles in self-referential structures (e.g. `item.item`).
            let mut seen: Vec<FhirPathValue> = Vec::new();
            let mut frontier = input.clone();
            loop {
                let next = project(evaluator, expr, &frontier, ctx)?;
                let fresh: Vec<FhirPathValue> = next
                    .into_iter()
                    .filter(|item| !seen.iter().any(|s| deep_equal(s, item) == Some(true)))
                    .collect();
                if fresh.is_empty() {
                    break;
                }
                seen.extend(fresh.iter().cloned());
                frontier = FhirPathValue::collection(fresh);
            }
            Ok(FhirPathValue::collection(seen))
        },
    ));

    registry.register(entry("first", [(0, vec![])], false, |input, _, _, _| {
        Ok(input.to_vec().into_iter().next().unwrap_or(FhirPathValue::Empty))
    }));

    registry.register(entry("last", [(0, vec![])], false, |input, _, _, _| {
        Ok(input.to_vec().into_iter().next_back().unwrap_or(FhirPathValue::Empty))
    }));

    registry.register(entry("tail", [(0, vec![])], false, |input, _, _, _| {
        let items = input.to_vec();
        Ok(FhirPathValue::collection(items.into_iter().skip(1).collect()))
    }));

    registry.register(entry(
        "skip",
        [(1, vec![ParamKind::Value(super::ValueKind::Integer)])],
        false,
        |input, args, _, _| {
            let n = match args.first() {
                Some(ArgValue::Value(FhirPathValue::Integer(n))) => *n,
                Some(ArgValue::Value(FhirPathValue::Long(n))) => *n,
                _ => return Err(FhirPathError::domain("skip: expected an integer argument")),
            };
            let items = input.to_vec();
            let skip_n = n.max(0) as usize;
            Ok(FhirPathValue::collection(items.into_iter().skip(skip_n).collect()))
        },
    ));

    registry.register(entry(
        "take",
        [(1, vec![ParamKind::Value(super::ValueKind::Integer)])],
        false,
        |input, args, _, _| {
            let n = match args.first() {
                Some(ArgValue::Value(FhirPathValue::Integer(n))) => *n,
                Some(ArgValue::Value(FhirPathValue::Long(n))) => *n,
                _ => return Err(FhirPathError::domain("take: expected an integer argument")),
            };
            let items = input.to_vec();
            let take_n = n.max(0) as usize;
            Ok(FhirPathValue::collection(items.into_iter().take(take_n).collect()))
        },
    ));

    registry.register(entry("single", [(0, vec![])], false, |input, _, _, _| {
        if input.is_empty() {
            return Ok(FhirPathValue::Empty);
        }
        input
            .as_singleton()
            .cloned()
            .ok_or_else(|| FhirPathError::singleton_error("single", input.count()))
    }));

    registry.register(entry(
        "extension",
        [(1, vec![ParamKind::Value(super::ValueKind::String)])],
        true,
        |input, args, ctx, evaluator| {
            let url = match args.first() {
                Some(ArgValue::Value(FhirPathValue::String(s))) => s.clone(),
                _ => return Err(FhirPathError::domain("extension: expected a string argument")),
            };
            let mut out = Vec::new();
            for item in input.to_vec() {
                for ext in evaluator_navigate_children(evaluator, ctx, &item, "extension")? {
                    let matched = evaluator_navigate_children(evaluator, ctx, &ext, "url")?
                        .into_iter()
                        .any(|u| matches!(u, FhirPathValue::String(ref s) if *s == url));
                    if matched {
                        out.push(ext);
                    }
                }
            }
            Ok(FhirPathValue::collection(out))
        },
    ));
}

/// `item.<name>`, performed directly against the model rather than through a
/// bound expression, since `extension`'s steps are always literal.
fn evaluator_navigate_children(
    _evaluator: &Evaluator,
    ctx: &EvaluationContext,
    item: &FhirPathValue,
    name: &str,
) -> FhirPathResult<Vec<FhirPathValue>> {
    Ok(crate::evaluator::navigate::step(ctx.model.as_ref(), item, name))
}
