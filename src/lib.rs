// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A FHIRPath expression parser and evaluator for FHIR resources.
//!
//! ```text
//! source text -> parser -> AST -> compiler -> bound tree -> evaluator(bound tree, resource, context) -> collection
//! ```
//!
//! [`FhirPathEngine`] ties the four stages together: [`FhirPathEngine::parse`]
//! and [`FhirPathEngine::compile`] expose the front half individually (with
//! process-wide caching of the latter), and [`FhirPathEngine::evaluate`] /
//! [`FhirPathEngine::evaluate_async`] run a resource through the whole
//! pipeline.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod registry;

pub use ast::ExpressionNode;
pub use compiler::cache::CompiledExpression;
pub use error::{FhirPathError, FhirPathResult, SyntaxDiagnostic};
pub use evaluator::context::{AsyncMode, CancellationSignal, EvaluationContext, TraceSink};
pub use model::{FhirPathValue, InMemoryModelProvider, ModelProvider, NoopModelProvider};
pub use registry::{FunctionEntry, FunctionRegistry};

use compiler::cache::CompiledExpressionCache;
use evaluator::engine::Evaluator;
use model::{PartialDateTime, Quantity, ResourceNode};
use std::collections::HashMap;
use std::sync::Arc;

/// Options recognized by [`FhirPathEngine::evaluate`]/[`FhirPathEngine::evaluate_async`].
///
/// Mirrors the `evaluate(resource, expressionOrCompiled, envVars?, model?,
/// options?)` call shape described in SPEC_FULL.md §6.
#[derive(Clone)]
pub struct EvaluateOptions {
    /// Async execution mode. `Disabled` rejects `weight`/`ordinal`;
    /// `Allowed` lets them suspend without forcing the rest of the tree
    /// onto the async path; `Always` promotes every evaluation.
    pub async_mode: AsyncMode,
    /// Base URL for the terminology server, required by `weight`/`ordinal`.
    pub terminology_url: Option<String>,
    /// Whether to run [`FhirPathEngine::resolve_internal_types`] on the
    /// result before returning it. Defaults to `true`.
    pub resolve_internal_types: bool,
    /// Cancellation handle propagated to terminology fetches.
    pub signal: CancellationSignal,
    /// Sink for `trace()`. Defaults to discarding.
    pub trace_fn: Option<Arc<dyn TraceSink>>,
    /// Recursion-depth ceiling for the evaluator.
    pub max_depth: usize,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            async_mode: AsyncMode::Disabled,
            terminology_url: None,
            resolve_internal_types: true,
            signal: CancellationSignal::new(),
            trace_fn: None,
            max_depth: 1000,
        }
    }
}

/// The main entry point: owns the standard-library registry (plus any
/// `userInvocationTable` overrides), a model provider, and a process-wide
/// compiled-expression cache shared across every call.
///
/// Cheap to clone -- every field is an `Arc` or `Copy` handle onto shared
/// state, so embedding callers (a CLI, a server handler) can keep one
/// instance per process rather than reconstructing the registry per call.
#[derive(Clone)]
pub struct FhirPathEngine {
    registry: Arc<FunctionRegistry>,
    model: Arc<dyn ModelProvider>,
    cache: Arc<CompiledExpressionCache>,
}

impl FhirPathEngine {
    /// An engine over the built-in standard library and `model`.
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            registry: Arc::new(FunctionRegistry::new()),
            model,
            cache: Arc::new(CompiledExpressionCache::new()),
        }
    }

    /// An engine with `overrides` layered on top of the standard library,
    /// per `userInvocationTable` (SPEC_FULL.md §6) -- a user-defined
    /// function with the same name as a built-in replaces it.
    pub fn with_user_functions(
        model: Arc<dyn ModelProvider>,
        overrides: impl IntoIterator<Item = FunctionEntry>,
    ) -> Self {
        let registry = FunctionRegistry::new().with_overrides(overrides);
        Self {
            registry: Arc::new(registry),
            model,
            cache: Arc::new(CompiledExpressionCache::new()),
        }
    }

    /// Parse `source` into an AST, or every accumulated syntax diagnostic
    /// on failure.
    pub fn parse(&self, source: &str) -> FhirPathResult<ExpressionNode> {
        parser::parse(source).map_err(FhirPathError::from)
    }

    /// Parse and bind `source` against this engine's registry, reusing a
    /// cached bound tree when `source` has been compiled before.
    pub fn compile(&self, source: &str) -> FhirPathResult<Arc<CompiledExpression>> {
        let ast = self.parse(source)?;
        compiler::compile_cached(source, &ast, &self.registry, &self.cache)
    }

    /// Drop every cached compiled expression (e.g. after a
    /// `userInvocationTable` change invalidates previously bound calls).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn build_context(
        &self,
        resource: FhirPathValue,
        env_vars: HashMap<String, FhirPathValue>,
        options: &EvaluateOptions,
    ) -> FhirPathResult<EvaluationContext> {
        let mut ctx = EvaluationContext::new(resource, self.registry.clone(), self.model.clone(), PartialDateTime::now());
        ctx.async_mode = options.async_mode;
        ctx.terminology_url = options.terminology_url.clone();
        ctx.signal = options.signal.clone();
        if let Some(trace_fn) = &options.trace_fn {
            ctx.trace_fn = trace_fn.clone();
        }
        let mut scope = (*ctx.scope).clone();
        for (name, value) in env_vars {
            scope.define(name, value).map_err(FhirPathError::domain)?;
        }
        ctx.scope = Arc::new(scope);
        Ok(ctx)
    }

    /// Run `expression` against `resource`, returning the resulting
    /// collection. Rejects (with [`FhirPathError::AsyncDisallowedError`])
    /// if the expression reaches `weight`/`ordinal` while
    /// `options.async_mode` is [`AsyncMode::Disabled`] -- use
    /// [`FhirPathEngine::evaluate_async`] for expressions that need those.
    pub fn evaluate(
        &self,
        resource: FhirPathValue,
        expression: &str,
        env_vars: HashMap<String, FhirPathValue>,
        options: &EvaluateOptions,
    ) -> FhirPathResult<FhirPathValue> {
        let compiled = self.compile(expression)?;
        let ctx = self.build_context(resource.clone(), env_vars, options)?;
        let evaluator = Evaluator::with_max_depth(options.max_depth);
        let result = evaluator.eval(&compiled.root, &resource, &ctx)?;
        Ok(if options.resolve_internal_types {
            resolve_internal_types(result)
        } else {
            result
        })
    }

    /// `evaluate`, but moves the synchronous walk onto a blocking thread
    /// pool when `expression` reaches a terminology function, so it can
    /// make its HTTP round trips without stalling the caller's async
    /// executor (see [`Evaluator::evaluate_async`]).
    pub async fn evaluate_async(
        &self,
        resource: FhirPathValue,
        expression: &str,
        env_vars: HashMap<String, FhirPathValue>,
        options: &EvaluateOptions,
    ) -> FhirPathResult<FhirPathValue> {
        let compiled = self.compile(expression)?;
        let ctx = self.build_context(resource.clone(), env_vars, options)?;
        let evaluator = Arc::new(Evaluator::with_max_depth(options.max_depth));
        let result = if compiled.uses_async {
            evaluator.evaluate_async(compiled.root.clone(), resource, ctx).await?
        } else {
            evaluator.eval(&compiled.root, &resource, &ctx)?
        };
        Ok(if options.resolve_internal_types {
            resolve_internal_types(result)
        } else {
            result
        })
    }

    /// The FHIR type name(s) this engine's model would report for each
    /// position `compiled`'s root node can statically be known to produce.
    ///
    /// This is a best-effort approximation, not full static type
    /// inference: only literal terms carry a statically-known type in a
    /// tree-walking interpreter with no type-checking pass, so a call or
    /// navigation step reports `None` (its type is data-dependent and only
    /// resolvable by actually evaluating against a resource).
    pub fn types(&self, compiled: &CompiledExpression) -> Option<model::QualifiedType> {
        static_literal_type(&compiled.root)
    }

    /// Convert `collection`'s internal wrapper types (`Quantity`,
    /// `Date`/`DateTime`/`Time`) back to plain strings/dictionaries, per
    /// the `resolveInternalTypes` post-processor described in
    /// SPEC_FULL.md §6. Exposed directly so callers that disabled it via
    /// [`EvaluateOptions::resolve_internal_types`] can still invoke it
    /// after inspecting the raw result.
    pub fn resolve_internal_types(&self, collection: FhirPathValue) -> FhirPathValue {
        resolve_internal_types(collection)
    }
}

fn static_literal_type(node: &compiler::bound::BoundNode) -> Option<model::QualifiedType> {
    use compiler::bound::BoundKind;
    match &node.kind {
        BoundKind::Literal(value) => model::system_type_of(value).map(model::QualifiedType::system),
        _ => None,
    }
}

/// Recursively replace `Quantity`/`Date`/`DateTime`/`Time` values with
/// plain `String`/`Resource` (JSON-object) representations.
fn resolve_internal_types(value: FhirPathValue) -> FhirPathValue {
    match value {
        FhirPathValue::Quantity(q) => FhirPathValue::Resource(quantity_to_node(&q)),
        FhirPathValue::Date(d) => FhirPathValue::String(d.to_string()),
        FhirPathValue::DateTime(d) => FhirPathValue::String(d.to_string()),
        FhirPathValue::Time(t) => FhirPathValue::String(t.to_string()),
        FhirPathValue::Collection(c) => {
            FhirPathValue::collection(c.to_vec().into_iter().map(resolve_internal_types).collect())
        }
        other => other,
    }
}

fn quantity_to_node(q: &Quantity) -> ResourceNode {
    let json = serde_json::json!({
        "value": q.value.to_string(),
        "unit": q.unit,
    });
    ResourceNode::root(json, "Quantity")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_simple_path_over_a_json_resource() {
        let resource = serde_json::json!({
            "resourceType": "Patient",
            "name": [{"given": ["Alice", "A."]}, {"given": ["Bob"]}]
        });
        let root = FhirPathValue::Resource(ResourceNode::root(resource, "Patient"));
        let engine = FhirPathEngine::new(Arc::new(NoopModelProvider));
        let result = engine
            .evaluate(root, "Patient.name.given", HashMap::new(), &EvaluateOptions::default())
            .unwrap();
        assert_eq!(result.count(), 3);
    }

    #[test]
    fn evaluate_on_empty_collection_is_empty() {
        let engine = FhirPathEngine::new(Arc::new(NoopModelProvider));
        let result = engine
            .evaluate(FhirPathValue::Empty, "{}.foo", HashMap::new(), &EvaluateOptions::default())
            .unwrap();
        assert_eq!(result, FhirPathValue::Empty);
    }

    #[test]
    fn compile_is_cached_across_calls_on_the_same_engine() {
        let engine = FhirPathEngine::new(Arc::new(NoopModelProvider));
        let first = engine.compile("1 + 2").unwrap();
        let second = engine.compile("1 + 2").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolve_internal_types_turns_quantity_into_a_plain_node() {
        let engine = FhirPathEngine::new(Arc::new(NoopModelProvider));
        let q = FhirPathValue::Quantity(Quantity::new(rust_decimal::Decimal::from(5), Some("mg".to_string())));
        match engine.resolve_internal_types(q) {
            FhirPathValue::Resource(node) => {
                assert_eq!(node.data().unwrap()["unit"], "mg");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_surface_as_fhirpath_errors() {
        let engine = FhirPathEngine::new(Arc::new(NoopModelProvider));
        let err = engine.evaluate(
            FhirPathValue::Empty,
            "Patient..name",
            HashMap::new(),
            &EvaluateOptions::default(),
        );
        assert!(matches!(err, Err(FhirPathError::SyntaxError(_))));
    }
}
