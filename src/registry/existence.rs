//! Existence predicates: `empty`, `exists`, `all`, `allTrue`/`anyTrue`/
//! `allFalse`/`anyFalse`, `subsetOf`/`supersetOf`, `isDistinct`, `distinct`,
//! `count`, `hasValue`.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind};
use crate::compiler::bound::BoundNode;
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::{FhirPathValue, deep_equal, distinct, is_distinct};
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

fn expr_arg(args: &[ArgValue<'_>], idx: usize, fn_name: &str) -> FhirPathResult<&BoundNode> {
    match args.get(idx) {
        Some(ArgValue::Expr(node)) => Ok(node),
        _ => Err(FhirPathError::domain(format!(
            "{fn_name}: expected an expression argument at position {idx}"
        ))),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("empty", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(input.is_empty()))
    }));

    registry.register(entry(
        "exists",
        [(0, vec![]), (1, vec![ParamKind::Expr])],
        false,
        |input, args, ctx, evaluator| {
            if args.is_empty() {
                return Ok(FhirPathValue::Boolean(!input.is_empty()));
            }
            let expr = expr_arg(args, 0, "exists")?;
            for (idx, item) in input.to_vec().into_iter().enumerate() {
                let lambda_ctx = ctx.with_lambda(item.clone(), idx, FhirPathValue::Empty);
                let result = evaluator.eval(expr, &item, &lambda_ctx)?;
                if result.as_bool() == Some(true) {
                    return Ok(FhirPathValue::Boolean(true));
                }
            }
            Ok(FhirPathValue::Boolean(false))
        },
    ));

    registry.register(entry(
        "all",
        [(1, vec![ParamKind::Expr])],
        false,
        |input, args, ctx, evaluator| {
            let expr = expr_arg(args, 0, "all")?;
            for (idx, item) in input.to_vec().into_iter().enumerate() {
                let lambda_ctx = ctx.with_lambda(item.clone(), idx, FhirPathValue::Empty);
                let result = evaluator.eval(expr, &item, &lambda_ctx)?;
                if result.as_bool() != Some(true) {
                    return Ok(FhirPathValue::Boolean(false));
                }
            }
            Ok(FhirPathValue::Boolean(true))
        },
    ));

    registry.register(entry("allTrue", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(
            input.to_vec().iter().all(|v| v.as_bool() == Some(true)),
        ))
    }));
    registry.register(entry("anyTrue", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(
            input.to_vec().iter().any(|v| v.as_bool() == Some(true)),
        ))
    }));
    registry.register(entry("allFalse", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(
            input.to_vec().iter().all(|v| v.as_bool() == Some(false)),
        ))
    }));
    registry.register(entry("anyFalse", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(
            input.to_vec().iter().any(|v| v.as_bool() == Some(false)),
        ))
    }));

    registry.register(entry(
        "subsetOf",
        [(1, vec![ParamKind::Value(super::ValueKind::Any)])],
        false,
        |input, args, _, _| {
            let other = match &args[0] {
                ArgValue::Value(v) => v.to_vec(),
                _ => return Err(FhirPathError::domain("subsetOf: expected a collection argument")),
            };
            let ok = input
                .to_vec()
                .iter()
                .all(|item| other.iter().any(|o| deep_equal(item, o) == Some(true)));
            Ok(FhirPathValue::Boolean(ok))
        },
    ));

    registry.register(entry(
        "supersetOf",
        [(1, vec![ParamKind::Value(super::ValueKind::Any)])],
        false,
        |input, args, _, _| {
            let other = match &args[0] {
                ArgValue::Value(v) => v.to_vec(),
                _ => return Err(FhirPathError::domain("supersetOf: expected a collection argument")),
            };
            let mine = input.to_vec();
            let ok = other
                .iter()
                .all(|item| mine.iter().any(|o| deep_equal(item, o) == Some(true)));
            Ok(FhirPathValue::Boolean(ok))
        },
    ));

    registry.register(entry("isDistinct", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Boolean(is_distinct(&input.to_vec())))
    }));

    registry.register(entry("distinct", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::collection(distinct(&input.to_vec())))
    }));

    registry.register(entry("count", [(0, vec![])], false, |input, _, _, _| {
        Ok(FhirPathValue::Integer(input.count() as i64))
    }));

    registry.register(entry("hasValue", [(0, vec![])], false, |input, _, _, _| {
        let has = match input.as_singleton() {
            Some(FhirPathValue::Resource(node)) => node.is_primitive() && node.data().is_some(),
            Some(_) => true,
            None => false,
        };
        Ok(FhirPathValue::Boolean(has))
    }));
}
