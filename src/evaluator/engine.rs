//! The recursive evaluator: walks a [`crate::compiler::bound::BoundNode`]
//! tree, dispatching navigation steps to [`super::navigate`], singleton
//! ordering to [`super::compare`], and function/operator calls into
//! [`crate::registry`].
//!
//! The evaluator stays a single synchronous recursion. `weight`/`ordinal`
//! are the only functions that actually suspend, and they do their own
//! blocking inside the registry entry (see `registry::terminology`) rather
//! than infecting this walk with `async`. [`Evaluator::evaluate_async`] is
//! the one place that crosses into `tokio`, via `spawn_blocking`, so a
//! caller embedding this engine in an async executor never has its thread
//! blocked by a call that happens not to touch the network.

use crate::ast::operator::{BinaryOperator, UnaryOperator};
use crate::compiler::bound::{BoundArg, BoundCall, BoundKind, BoundNode};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::{compare, navigate};
use crate::model::{FhirPathValue, deep_equal, deep_equivalent, distinct};
use crate::registry::{self, ArgValue};
use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

/// Default recursion-depth ceiling, mirroring the original engine's
/// `max_recursion_depth` default for the non-promise-chain fold path.
const DEFAULT_MAX_DEPTH: usize = 1000;

/// Drives a single bound-tree walk. Cheap to construct; holds only the
/// depth ceiling and a re-entrant depth counter, not per-evaluation state
/// (that lives in [`EvaluationContext`]).
pub struct Evaluator {
    max_depth: usize,
    depth: Cell<usize>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl Evaluator {
    /// A fresh evaluator with the default recursion-depth ceiling.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// A fresh evaluator with an explicit recursion-depth ceiling, as
    /// configured by [`crate::EvaluateOptions`].
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: Cell::new(0),
        }
    }

    fn enter(&self) -> FhirPathResult<DepthGuard<'_>> {
        let next = self.depth.get() + 1;
        if next > self.max_depth {
            return Err(FhirPathError::domain(format!(
                "recursion depth exceeded {} while evaluating expression",
                self.max_depth
            )));
        }
        self.depth.set(next);
        Ok(DepthGuard { depth: &self.depth })
    }

    /// Evaluate `node` against `this`/`ctx`, returning the resulting value.
    /// This is the entry point every registry function calls for `Expr`
    /// and `Value` arguments.
    pub fn eval(
        &self,
        node: &BoundNode,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<FhirPathValue> {
        self.eval_scoped(node, this, ctx).map(|(value, _)| value)
    }

    /// Evaluate `node` asynchronously: if the bound tree reaches a
    /// terminology function, the whole synchronous walk is moved onto a
    /// blocking thread pool so it can make its HTTP round trips without
    /// stalling the caller's async executor. Call sites that already know
    /// the tree is sync-only (`compiler::bound::uses_async` returned
    /// `false` at compile time) should prefer [`Evaluator::eval`].
    pub async fn evaluate_async(
        self: Arc<Self>,
        node: Arc<BoundNode>,
        this: FhirPathValue,
        ctx: EvaluationContext,
    ) -> FhirPathResult<FhirPathValue> {
        tokio::task::spawn_blocking(move || self.eval(&node, &this, &ctx))
            .await
            .map_err(|e| FhirPathError::domain(format!("evaluation task panicked: {e}")))?
    }

    /// The core recursive step. Returns the augmented context alongside the
    /// value so that a `defineVariable` reached partway down a dotted chain
    /// can make its binding visible to the remaining steps of that same
    /// chain (via the `base` threading in `Identifier`/`Call`/`Index_`).
    fn eval_scoped(
        &self,
        node: &BoundNode,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        let _guard = self.enter()?;
        match &node.kind {
            BoundKind::Literal(value) => Ok((value.clone(), ctx.clone())),

            BoundKind::ExternalConstant(name) => {
                let value = ctx.resolve_percent_variable(name).ok_or_else(|| {
                    FhirPathError::domain(format!("unresolved external constant '%{name}'"))
                })?;
                Ok((value, ctx.clone()))
            }

            BoundKind::This => Ok((
                ctx.resolve_dollar_variable("this").unwrap_or_else(|| this.clone()),
                ctx.clone(),
            )),

            BoundKind::Index => Ok((
                ctx.resolve_dollar_variable("index").unwrap_or(FhirPathValue::Empty),
                ctx.clone(),
            )),

            BoundKind::Total => Ok((
                ctx.resolve_dollar_variable("total").unwrap_or(FhirPathValue::Empty),
                ctx.clone(),
            )),

            BoundKind::Identifier { base, name } => {
                let (base_val, ctx) = self.eval_base(base.as_deref(), this, ctx)?;
                let mut out = Vec::new();
                for item in base_val.to_vec() {
                    out.extend(navigate::step(ctx.model.as_ref(), &item, name));
                }
                Ok((FhirPathValue::collection(out), ctx))
            }

            BoundKind::Call { base, call } => {
                let (base_val, ctx) = self.eval_base(base.as_deref(), this, ctx)?;
                self.eval_call(call, &base_val, this, &ctx)
            }

            BoundKind::Index_ { base, index } => {
                let (base_val, ctx) = self.eval_scoped(base, this, ctx)?;
                let (index_val, ctx) = self.eval_scoped(index, this, &ctx)?;
                let idx = match index_val.as_singleton() {
                    None => return Ok((FhirPathValue::Empty, ctx)),
                    Some(FhirPathValue::Integer(i)) => *i,
                    Some(FhirPathValue::Long(i)) => *i,
                    Some(other) => {
                        return Err(FhirPathError::type_error("[]", "Integer", other.type_name()));
                    }
                };
                if idx < 0 {
                    return Ok((FhirPathValue::Empty, ctx));
                }
                let item = base_val.to_vec().into_iter().nth(idx as usize).unwrap_or(FhirPathValue::Empty);
                Ok((item, ctx))
            }

            BoundKind::Unary { op, operand } => {
                let (value, ctx) = self.eval_scoped(operand, this, ctx)?;
                let result = match op {
                    UnaryOperator::Plus => value,
                    UnaryOperator::Minus => registry::math::negate(&value)?,
                };
                Ok((result, ctx))
            }

            BoundKind::Binary { op, left, right } => self.eval_binary(*op, left, right, this, ctx),

            BoundKind::Is { expr, type_specifier } => {
                let (value, ctx) = self.eval_scoped(expr, this, ctx)?;
                let result = registry::type_ops::eval_is(&value, type_specifier, &ctx)?;
                Ok((result, ctx))
            }

            BoundKind::As { expr, type_specifier } => {
                let (value, ctx) = self.eval_scoped(expr, this, ctx)?;
                let result = registry::type_ops::eval_as(&value, type_specifier, &ctx)?;
                Ok((result, ctx))
            }

            BoundKind::TypeSpecifierTerm(ts) => {
                let namespace = ts.namespace.clone().unwrap_or_else(|| {
                    if crate::model::is_system_primitive(&ts.name) {
                        "System".to_string()
                    } else {
                        "FHIR".to_string()
                    }
                });
                Ok((
                    FhirPathValue::TypeInfoObject {
                        namespace,
                        name: ts.name.clone(),
                    },
                    ctx.clone(),
                ))
            }
        }
    }

    /// Resolve the receiver of a path step: either the evaluated `base`, or
    /// the current input when this is the first segment of the chain.
    fn eval_base(
        &self,
        base: Option<&BoundNode>,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        match base {
            Some(node) => self.eval_scoped(node, this, ctx),
            None => Ok((this.clone(), ctx.clone())),
        }
    }

    fn eval_call(
        &self,
        call: &BoundCall,
        base_val: &FhirPathValue,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        // `defineVariable` cannot escape a plain registry return value, so
        // the scope mutation it produces is threaded here instead of inside
        // `registry::tree::defineVariable` (see that module's doc comment).
        if call.entry.name == "defineVariable" {
            return self.eval_define_variable(call, base_val, this, ctx);
        }

        // Async entries (`weight`/`ordinal`) check `async_mode` themselves
        // before even looking at `input`, so an empty receiver with async
        // disabled still reports `AsyncDisallowedError` rather than
        // silently short-circuiting to empty.
        if call.entry.nullable && !call.entry.is_async && base_val.is_empty() {
            return Ok((FhirPathValue::Empty, ctx.clone()));
        }

        let args = self.bind_args(&call.args, &call.entry.name, this, ctx)?;
        let result = (call.entry.implementation)(base_val, &args, ctx, self)?;
        Ok((result, ctx.clone()))
    }

    fn eval_define_variable(
        &self,
        call: &BoundCall,
        base_val: &FhirPathValue,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        let name = match call.args.first() {
            Some(BoundArg::Value(node, _)) => match self.eval(node, this, ctx)? {
                FhirPathValue::String(s) => s,
                other => {
                    return Err(FhirPathError::type_error(
                        "defineVariable",
                        "String",
                        other.type_name(),
                    ));
                }
            },
            _ => return Err(FhirPathError::domain("defineVariable: expected a name argument")),
        };
        let value = match call.args.get(1) {
            Some(BoundArg::Expr(expr)) => self.eval(expr, base_val, ctx)?,
            _ => base_val.clone(),
        };
        let mut scope = ctx.scope.child();
        scope.define(name, value).map_err(FhirPathError::domain)?;
        let child_ctx = EvaluationContext {
            scope: Arc::new(scope),
            ..ctx.clone()
        };
        Ok((base_val.clone(), child_ctx))
    }

    fn bind_args<'a>(
        &self,
        bound_args: &'a [BoundArg],
        fn_name: &str,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<Vec<ArgValue<'a>>> {
        let mut out = Vec::with_capacity(bound_args.len());
        for arg in bound_args {
            let bound = match arg {
                BoundArg::Value(node, kind) => {
                    let value = self.eval(node, this, ctx)?;
                    ArgValue::Value(registry::coerce_value_kind(&value, *kind, fn_name)?)
                }
                BoundArg::Expr(node) => ArgValue::Expr(node.as_ref()),
                BoundArg::Identifier(name) => ArgValue::Identifier(name.as_str()),
                BoundArg::TypeSpecifier(ts) => ArgValue::TypeSpecifier(ts),
            };
            out.push(bound);
        }
        Ok(out)
    }

    fn eval_binary(
        &self,
        op: BinaryOperator,
        left: &BoundNode,
        right: &BoundNode,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        use BinaryOperator::*;

        if matches!(op, And | Or | Xor | Implies) {
            return self.eval_logical(op, left, right, this, ctx);
        }

        let (lv, ctx) = self.eval_scoped(left, this, ctx)?;
        let (rv, ctx) = self.eval_scoped(right, this, &ctx)?;

        let result = match op {
            Concat => registry::string_fns::concat(&lv, &rv)?,

            Union => {
                let mut merged = lv.to_vec();
                merged.extend(rv.to_vec());
                FhirPathValue::collection(distinct(&merged))
            }

            // `deep_equal` returns `None` when either operand is empty; the
            // original engine's `!eq`-based `unequal` turned that `None`
            // into a spurious `true` by negating it. Both `=` and `!=` map
            // the empty case to the empty collection here, per spec.md §9.
            Equal => match deep_equal(&lv, &rv) {
                Some(b) => FhirPathValue::Boolean(b),
                None => FhirPathValue::Empty,
            },
            NotEqual => match deep_equal(&lv, &rv) {
                Some(b) => FhirPathValue::Boolean(!b),
                None => FhirPathValue::Empty,
            },
            Equivalent => FhirPathValue::Boolean(deep_equivalent(&lv, &rv)),
            NotEquivalent => FhirPathValue::Boolean(!deep_equivalent(&lv, &rv)),

            LessThan | LessOrEqual | GreaterThan | GreaterOrEqual => {
                if lv.is_empty() || rv.is_empty() {
                    FhirPathValue::Empty
                } else {
                    let l = lv
                        .as_singleton()
                        .ok_or_else(|| FhirPathError::singleton_error(op.to_string(), lv.count()))?;
                    let r = rv
                        .as_singleton()
                        .ok_or_else(|| FhirPathError::singleton_error(op.to_string(), rv.count()))?;
                    match compare::compare_singletons(l, r)? {
                        None => FhirPathValue::Empty,
                        Some(ord) => FhirPathValue::Boolean(match op {
                            LessThan => ord == Ordering::Less,
                            LessOrEqual => ord != Ordering::Greater,
                            GreaterThan => ord == Ordering::Greater,
                            GreaterOrEqual => ord != Ordering::Less,
                            _ => unreachable!(),
                        }),
                    }
                }
            }

            In | Contains => {
                let (needle, haystack) = match op {
                    In => (&lv, &rv),
                    Contains => (&rv, &lv),
                    _ => unreachable!(),
                };
                if needle.is_empty() {
                    FhirPathValue::Empty
                } else {
                    let needle = needle
                        .as_singleton()
                        .ok_or_else(|| FhirPathError::singleton_error(op.to_string(), needle.count()))?;
                    let found = haystack.to_vec().iter().any(|item| deep_equal(needle, item) == Some(true));
                    FhirPathValue::Boolean(found)
                }
            }

            Multiply | Divide | Div | Mod | Add | Subtract => {
                if lv.is_empty() || rv.is_empty() {
                    FhirPathValue::Empty
                } else {
                    match op {
                        Add => registry::math::add(&lv, &rv)?,
                        Subtract => registry::math::subtract(&lv, &rv)?,
                        Multiply => registry::math::multiply(&lv, &rv)?,
                        Divide => registry::math::divide(&lv, &rv)?,
                        Div => registry::math::int_div(&lv, &rv)?,
                        Mod => registry::math::modulo(&lv, &rv)?,
                        _ => unreachable!(),
                    }
                }
            }

            And | Or | Xor | Implies => unreachable!("handled by eval_logical"),
        };

        Ok((result, ctx))
    }

    fn eval_logical(
        &self,
        op: BinaryOperator,
        left: &BoundNode,
        right: &BoundNode,
        this: &FhirPathValue,
        ctx: &EvaluationContext,
    ) -> FhirPathResult<(FhirPathValue, EvaluationContext)> {
        use BinaryOperator::*;

        let (lv, ctx) = self.eval_scoped(left, this, ctx)?;
        let lb = registry::logic::as_opt_bool(&lv, &op.to_string())?;

        // Short-circuit: `and` is settled by a `false` left operand, `or`
        // by a `true` one, without evaluating `right` at all.
        match (op, lb) {
            (And, Some(false)) => return Ok((FhirPathValue::Boolean(false), ctx)),
            (Or, Some(true)) => return Ok((FhirPathValue::Boolean(true), ctx)),
            _ => {}
        }

        let (rv, ctx) = self.eval_scoped(right, this, &ctx)?;
        let rb = registry::logic::as_opt_bool(&rv, &op.to_string())?;

        let result = match op {
            And => registry::logic::and(lb, rb),
            Or => registry::logic::or(lb, rb),
            Xor => registry::logic::xor(lb, rb),
            Implies => registry::logic::implies(lb, rb),
            _ => unreachable!("eval_logical only called for boolean connectives"),
        };

        Ok((
            match result {
                Some(b) => FhirPathValue::Boolean(b),
                None => FhirPathValue::Empty,
            },
            ctx,
        ))
    }
}
