//! Evaluation context: variable scoping, lambda metadata, and the shared
//! resources (registry, model provider, "now" snapshot) every evaluation
//! step needs.

use crate::model::{FhirPathValue, ModelProvider, PartialDateTime};
use crate::registry::FunctionRegistry;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The fixed set of environment constants the engine resolves without
/// consulting `vars`, mirroring the original engine's `%sct`/`%loinc`/etc.
fn fixed_environment_constant(name: &str) -> Option<FhirPathValue> {
    let value = match name {
        "sct" => "http://snomed.info/sct",
        "loinc" => "http://loinc.org",
        "ucum" => "http://unitsofmeasure.org",
        "vs-administrative-gender" => "http://hl7.org/fhir/ValueSet/administrative-gender",
        _ => return None,
    };
    Some(FhirPathValue::String(value.to_string()))
}

/// Implicit lambda variables available inside `where`/`select`/`all`/etc.
#[derive(Debug, Clone)]
pub struct LambdaMetadata {
    /// `$this` -- the current item.
    pub current_item: FhirPathValue,
    /// `$index` -- zero-based position of the current item.
    pub current_index: usize,
    /// `$index` pre-boxed as a value, so `VariableScope::get` can return a
    /// plain reference into this struct instead of a temporary.
    current_index_value: FhirPathValue,
    /// `$total` -- running accumulator (only meaningful inside `aggregate`;
    /// empty elsewhere).
    pub total_value: FhirPathValue,
}

/// A chain of variable bindings. Each scope inherits from an optional
/// parent via `Arc`, so creating a child scope that defines no new
/// variables costs only a pointer bump.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    parent: Option<Arc<VariableScope>>,
    locals: FxHashMap<String, FhirPathValue>,
    lambda: Option<LambdaMetadata>,
}

/// Names the FHIRPath runtime manages; user code cannot redefine these via
/// `defineVariable`.
fn is_protected_name(name: &str) -> bool {
    matches!(
        name,
        "context" | "resource" | "rootResource" | "this" | "index" | "total"
    ) || name.starts_with("vs-")
        || name.starts_with("ext-")
        || fixed_environment_constant(name).is_some()
}

impl VariableScope {
    /// An empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child scope inheriting `self`'s bindings.
    pub fn child(self: &Arc<Self>) -> Self {
        Self {
            parent: Some(self.clone()),
            locals: FxHashMap::default(),
            lambda: None,
        }
    }

    /// A child scope additionally carrying lambda metadata.
    pub fn child_with_lambda(
        self: &Arc<Self>,
        current_item: FhirPathValue,
        current_index: usize,
        total_value: FhirPathValue,
    ) -> Self {
        Self {
            parent: Some(self.clone()),
            locals: FxHashMap::default(),
            lambda: Some(LambdaMetadata {
                current_item,
                current_index,
                current_index_value: FhirPathValue::Integer(current_index as i64),
                total_value,
            }),
        }
    }

    /// Define a user variable. Returns an error message if `name` shadows
    /// a protected system variable or was already defined in this exact
    /// scope (`defineVariable` throws on redefinition, per spec.md §4.6).
    pub fn define(&mut self, name: String, value: FhirPathValue) -> Result<(), String> {
        if is_protected_name(&name) {
            return Err(format!("cannot redefine system variable '{name}'"));
        }
        if self.locals.contains_key(&name) {
            return Err(format!("variable '{name}' is already defined in this scope"));
        }
        self.locals.insert(name, value);
        Ok(())
    }

    /// Resolve a user or lambda variable (not a `%`-prefixed environment
    /// constant, which the context handles separately).
    pub fn get(&self, name: &str) -> Option<&FhirPathValue> {
        match name {
            "this" => {
                if let Some(lambda) = &self.lambda {
                    return Some(&lambda.current_item);
                }
            }
            "index" => {
                if let Some(lambda) = &self.lambda {
                    return Some(&lambda.current_index_value);
                }
            }
            "total" => {
                if let Some(lambda) = &self.lambda {
                    return Some(&lambda.total_value);
                }
            }
            _ => {}
        }
        if let Some(value) = self.locals.get(name) {
            return Some(value);
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// The nearest enclosing lambda metadata, if any.
    pub fn lambda(&self) -> Option<&LambdaMetadata> {
        if self.lambda.is_some() {
            self.lambda.as_ref()
        } else {
            self.parent.as_ref().and_then(|p| p.lambda())
        }
    }
}

/// Per-evaluation cancellation handle. A shared `AtomicBool` rather than a
/// channel: the engine is synchronous by default and only terminology
/// fetches actually await, so a flag is sufficient to interrupt them.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<std::sync::atomic::AtomicBool>);

impl CancellationSignal {
    /// A signal that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Sink for `trace(label[, expr])`. Default implementation discards.
pub trait TraceSink: Send + Sync {
    /// Called with the trace label and the (possibly projected) value.
    fn trace(&self, label: &str, value: &FhirPathValue);
}

struct NoopTraceSink;
impl TraceSink for NoopTraceSink {
    fn trace(&self, _label: &str, _value: &FhirPathValue) {}
}

/// Whether async evaluation is permitted/forced for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncMode {
    /// Terminology functions are disallowed; reaching one is an error.
    #[default]
    Disabled,
    /// Terminology functions may suspend; the rest of the tree stays sync.
    Allowed,
    /// Every evaluation is promoted to the async pipeline, even when no
    /// terminology function is reached.
    Always,
}

/// All state threaded through a single evaluation, and the resources
/// (registry, model, terminology base URL) shared across an engine's
/// lifetime.
#[derive(Clone)]
pub struct EvaluationContext {
    /// Variable scope chain (`%`-style user/lambda variables).
    pub scope: Arc<VariableScope>,
    /// The original top-level input (`%resource`/`%rootResource`/`%context`).
    pub root: Arc<FhirPathValue>,
    /// Shared function registry.
    pub registry: Arc<FunctionRegistry>,
    /// Shared FHIR model projection.
    pub model: Arc<dyn ModelProvider>,
    /// "Now" instant captured once per top-level evaluation.
    pub now: PartialDateTime,
    /// Async execution mode.
    pub async_mode: AsyncMode,
    /// Cancellation handle propagated to terminology fetches.
    pub signal: CancellationSignal,
    /// Base URL for terminology lookups (`weight`/`ordinal`), if configured.
    pub terminology_url: Option<String>,
    /// Sink for `trace()`.
    pub trace_fn: Arc<dyn TraceSink>,
}

impl EvaluationContext {
    /// A fresh root context over `root`, with no variables bound.
    pub fn new(
        root: FhirPathValue,
        registry: Arc<FunctionRegistry>,
        model: Arc<dyn ModelProvider>,
        now: PartialDateTime,
    ) -> Self {
        Self {
            scope: Arc::new(VariableScope::new()),
            root: Arc::new(root),
            registry,
            model,
            now,
            async_mode: AsyncMode::Disabled,
            signal: CancellationSignal::new(),
            terminology_url: None,
            trace_fn: Arc::new(NoopTraceSink),
        }
    }

    /// A child context with a fresh lambda scope (`$this`/`$index`/`$total`).
    pub fn with_lambda(&self, item: FhirPathValue, index: usize, total: FhirPathValue) -> Self {
        Self {
            scope: Arc::new(self.scope.child_with_lambda(item, index, total)),
            ..self.clone()
        }
    }

    /// A child context with an empty additional scope (for `defineVariable`
    /// isolation within a sub-expression).
    pub fn child_scope(&self) -> Self {
        Self {
            scope: Arc::new(self.scope.child()),
            ..self.clone()
        }
    }

    /// Resolve a `%name` environment/user variable.
    pub fn resolve_percent_variable(&self, name: &str) -> Option<FhirPathValue> {
        match name {
            "context" => Some((*self.root).clone()),
            "resource" => Some((*self.root).clone()),
            "rootResource" => Some((*self.root).clone()),
            _ => fixed_environment_constant(name).or_else(|| self.scope.get(name).cloned()),
        }
    }

    /// Resolve `$this`/`$index`/`$total`.
    pub fn resolve_dollar_variable(&self, name: &str) -> Option<FhirPathValue> {
        self.scope.get(name).cloned()
    }
}

impl std::fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("root", &self.root)
            .field("async_mode", &self.async_mode)
            .field("terminology_url", &self.terminology_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoopModelProvider;
    use crate::registry::FunctionRegistry;

    fn test_context() -> EvaluationContext {
        EvaluationContext::new(
            FhirPathValue::String("root".to_string()),
            Arc::new(FunctionRegistry::new()),
            Arc::new(NoopModelProvider),
            PartialDateTime::parse("2020-01-01T00:00:00").unwrap(),
        )
    }

    #[test]
    fn lambda_scope_exposes_implicit_variables() {
        let ctx = test_context();
        let lambda_ctx = ctx.with_lambda(FhirPathValue::Integer(5), 2, FhirPathValue::Integer(10));
        assert_eq!(
            lambda_ctx.resolve_dollar_variable("this"),
            Some(FhirPathValue::Integer(5))
        );
        assert_eq!(
            lambda_ctx.resolve_dollar_variable("index"),
            Some(FhirPathValue::Integer(2))
        );
    }

    #[test]
    fn define_variable_rejects_protected_names() {
        let mut scope = VariableScope::new();
        assert!(scope.define("resource".to_string(), FhirPathValue::Empty).is_err());
        assert!(scope.define("foo".to_string(), FhirPathValue::Empty).is_ok());
        assert!(scope.define("foo".to_string(), FhirPathValue::Empty).is_err());
    }

    #[test]
    fn fixed_environment_constants_resolve() {
        let ctx = test_context();
        assert_eq!(
            ctx.resolve_percent_variable("ucum"),
            Some(FhirPathValue::String(
                "http://unitsofmeasure.org".to_string()
            ))
        );
    }
}
