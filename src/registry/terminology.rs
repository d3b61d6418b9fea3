//! SDC scoring extensions: `weight()`/`ordinal()`. The only two functions
//! in the registry that suspend -- both resolve a `(terminologyUrl,
//! valueSet, system, code)` tuple against a configured terminology server
//! and cache the numeric result for an hour.
//!
//! `NativeFn` stays synchronous everywhere else in this registry; rather
//! than infect every other function with a `Future`-returning signature,
//! these two entries block on a dedicated single-threaded Tokio runtime
//! for the HTTP round trip. The engine's own async entry point
//! (`Evaluator::evaluate_async`) wraps a call that reaches one of these in
//! `tokio::task::spawn_blocking` so an embedding async caller's executor
//! thread is never blocked by it.

use super::{ArgValue, FunctionEntry, FunctionRegistry};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::FhirPathValue;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SCORE_CACHE_TTL: Duration = Duration::from_secs(3600);

static SCORE_CACHE: Lazy<Mutex<lru::LruCache<String, (Decimal, Instant)>>> =
    Lazy::new(|| Mutex::new(lru::LruCache::new(NonZeroUsize::new(512).unwrap())));

/// Dedicated single-threaded runtime for terminology fetches. The crate's
/// own `tokio` dependency carries only `rt`/`sync`/`time`/`macros` (no
/// `rt-multi-thread`), so a `current_thread` runtime is the only flavor
/// available outside an already-running multi-threaded host.
static BLOCKING_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start terminology runtime")
});

fn coding_system_code(value: &FhirPathValue, ctx: &EvaluationContext) -> FhirPathResult<(String, String)> {
    let system = crate::evaluator::navigate::step(ctx.model.as_ref(), value, "system")
        .into_iter()
        .next()
        .and_then(|v| match v {
            FhirPathValue::String(s) => Some(s),
            _ => None,
        })
        .ok_or_else(|| FhirPathError::domain("terminology lookup requires a Coding with a 'system'"))?;
    let code = crate::evaluator::navigate::step(ctx.model.as_ref(), value, "code")
        .into_iter()
        .next()
        .and_then(|v| match v {
            FhirPathValue::String(s) => Some(s),
            _ => None,
        })
        .ok_or_else(|| FhirPathError::domain("terminology lookup requires a Coding with a 'code'"))?;
    Ok((system, code))
}

fn cache_key(terminology_url: &str, value_set: Option<&str>, system: &str, code: &str, property: &str) -> String {
    format!("{terminology_url}|{}|{system}|{code}|{property}", value_set.unwrap_or(""))
}

/// Fetch a single numeric `property` (`"weight"` or `"ordinal"`) for
/// `(system, code)` from the configured terminology server, honoring the
/// one-hour score cache and the evaluation's cancellation signal.
fn fetch_score(
    ctx: &EvaluationContext,
    system: &str,
    code: &str,
    property: &str,
) -> FhirPathResult<Option<Decimal>> {
    let terminology_url = ctx
        .terminology_url
        .as_deref()
        .ok_or_else(|| FhirPathError::domain(format!("{property}(): no terminology server configured")))?;
    let value_set = match ctx.resolve_percent_variable("questionnaire") {
        Some(FhirPathValue::String(url)) => Some(url),
        _ => None,
    };
    let key = cache_key(terminology_url, value_set.as_deref(), system, code, property);

    if let Some((value, fetched_at)) = SCORE_CACHE.lock().get(&key).cloned() {
        if fetched_at.elapsed() < SCORE_CACHE_TTL {
            log::debug!("{property}(): score cache hit for {system}|{code}");
            return Ok(Some(value));
        }
    }

    if ctx.signal.is_cancelled() {
        return Err(FhirPathError::CancellationError);
    }

    let url = format!("{terminology_url}/CodeSystem/$lookup?system={system}&code={code}&property={property}");
    log::debug!("{property}(): fetching {url}");
    let signal = ctx.signal.clone();
    let property_owned = property.to_string();
    let fetched = BLOCKING_RUNTIME.block_on(async move {
        if signal.is_cancelled() {
            return Err(FhirPathError::CancellationError);
        }
        let response = reqwest::get(&url).await.map_err(|e| {
            log::warn!("{property_owned}(): terminology fetch failed: {e}");
            FhirPathError::domain(format!("terminology fetch failed: {e}"))
        })?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FhirPathError::domain(format!("terminology response was not JSON: {e}")))?;
        Ok(extract_property_value(&body, &property_owned))
    })?;

    if let Some(value) = fetched {
        SCORE_CACHE.lock().put(key, (value, Instant::now()));
    } else {
        log::debug!("{property}(): no '{property}' property found for {system}|{code}");
    }
    Ok(fetched)
}

/// Pull a numeric `valueDecimal`/`valueInteger`/`valueString` out of a
/// `Parameters` resource's `parameter[].part[]` shape, matching `$lookup`'s
/// response for the named `property`.
fn extract_property_value(body: &serde_json::Value, property: &str) -> Option<Decimal> {
    let parameters = body.get("parameter")?.as_array()?;
    for param in parameters {
        if param.get("name").and_then(|n| n.as_str()) != Some("property") {
            continue;
        }
        let parts = param.get("part")?.as_array()?;
        let is_match = parts.iter().any(|p| {
            p.get("name").and_then(|n| n.as_str()) == Some("code")
                && p.get("valueCode").and_then(|v| v.as_str()) == Some(property)
        });
        if !is_match {
            continue;
        }
        for part in parts {
            if part.get("name").and_then(|n| n.as_str()) != Some("value") {
                continue;
            }
            if let Some(d) = part.get("valueDecimal").and_then(|v| v.as_f64()) {
                return Decimal::from_str(&d.to_string()).ok();
            }
            if let Some(i) = part.get("valueInteger").and_then(|v| v.as_i64()) {
                return Some(Decimal::from(i));
            }
            if let Some(s) = part.get("valueString").and_then(|v| v.as_str()) {
                return Decimal::from_str(s).ok();
            }
        }
    }
    None
}

fn entry(
    name: &str,
    property: &'static str,
) -> FunctionEntry {
    let f = move |input: &FhirPathValue, _args: &[ArgValue<'_>], ctx: &EvaluationContext, _evaluator: &Evaluator| {
        if ctx.async_mode == crate::evaluator::context::AsyncMode::Disabled {
            return Err(FhirPathError::AsyncDisallowedError(property.to_string()));
        }
        let Some(single) = input.as_singleton() else {
            return Ok(FhirPathValue::Empty);
        };
        let (system, code) = coding_system_code(single, ctx)?;
        match fetch_score(ctx, &system, &code, property)? {
            Some(value) => Ok(FhirPathValue::Decimal(value)),
            None => Ok(FhirPathValue::Empty),
        }
    };
    FunctionEntry {
        name: name.to_string(),
        arities: [(0, vec![])].into_iter().collect(),
        nullable: true,
        internal_structures: false,
        is_async: true,
        implementation: Arc::new(f),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("weight", "weight"));
    registry.register(entry("ordinal", "ordinal"));
}
