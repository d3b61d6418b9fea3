//! String functions: `indexOf`, `substring`, `startsWith`, `endsWith`,
//! `contains`, `upper`, `lower`, `replace`, `matches`, `replaceMatches`,
//! `length`, `toChars`, `split`, `join`, `trim`, `encode`/`decode`.
//!
//! `matches`/`replaceMatches` cache compiled patterns in a process-wide
//! `DashMap`, keyed on the *rewritten* pattern text (FHIRPath regexes are
//! implicitly dot-all/Unicode, which `regex` needs inline flags for), since
//! the same literal pattern text is typically reused across many
//! evaluations of the same compiled expression.

use super::{ArgValue, FunctionEntry, FunctionRegistry, ValueKind, ParamKind};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::model::FhirPathValue;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static REGEX_CACHE: Lazy<DashMap<String, Arc<Regex>>> = Lazy::new(DashMap::new);

/// Compile (or fetch from cache) the FHIRPath regex `pattern`, rewritten so
/// `.` matches newlines too (FHIRPath regexes are dot-all by convention,
/// unlike Rust's `regex` crate default).
fn compiled_regex(pattern: &str) -> FhirPathResult<Arc<Regex>> {
    if let Some(hit) = REGEX_CACHE.get(pattern) {
        return Ok(hit.clone());
    }
    let rewritten = format!("(?s){pattern}");
    let compiled = Regex::new(&rewritten)
        .map_err(|e| FhirPathError::domain(format!("invalid regular expression '{pattern}': {e}")))?;
    let compiled = Arc::new(compiled);
    REGEX_CACHE.insert(pattern.to_string(), compiled.clone());
    Ok(compiled)
}

/// `&` string concatenation: empty operands behave as `''`, consistent with
/// spec.md's "empty is the additive identity for `&`" rule (unlike `+`,
/// which propagates empty).
pub(crate) fn concat(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    let a_str = as_concat_str(a)?;
    let b_str = as_concat_str(b)?;
    Ok(FhirPathValue::String(format!("{a_str}{b_str}")))
}

fn as_concat_str(v: &FhirPathValue) -> FhirPathResult<String> {
    match v.as_singleton() {
        None if v.is_empty() => Ok(String::new()),
        Some(FhirPathValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(FhirPathError::type_error("&", "String", other.type_name())),
        None => Err(FhirPathError::singleton_error("&", v.count())),
    }
}

fn as_string(value: &FhirPathValue, context: &str) -> FhirPathResult<Option<String>> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.as_singleton() {
        Some(FhirPathValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FhirPathError::type_error(context, "String", other.type_name())),
        None => Err(FhirPathError::singleton_error(context, value.count())),
    }
}

fn arg_string(args: &[ArgValue<'_>], idx: usize, context: &str) -> FhirPathResult<String> {
    match args.get(idx) {
        Some(ArgValue::Value(FhirPathValue::String(s))) => Ok(s.clone()),
        _ => Err(FhirPathError::domain(format!("{context}: expected a string argument at position {idx}"))),
    }
}

fn arg_int(args: &[ArgValue<'_>], idx: usize) -> Option<i64> {
    match args.get(idx) {
        Some(ArgValue::Value(FhirPathValue::Integer(i))) => Some(*i),
        Some(ArgValue::Value(FhirPathValue::Long(i))) => Some(*i),
        _ => None,
    }
}

fn entry(
    name: &str,
    arities: impl IntoIterator<Item = (usize, Vec<ParamKind>)>,
    nullable: bool,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext) -> FhirPathResult<FhirPathValue>
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
        implementation: Arc::new(move |input, args, ctx, _evaluator| f(input, args, ctx)),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry(
        "indexOf",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "indexOf")? else { return Ok(FhirPathValue::Empty) };
            let needle = arg_string(args, 0, "indexOf")?;
            match s.find(&needle) {
                Some(byte_idx) => Ok(FhirPathValue::Integer(s[..byte_idx].chars().count() as i64)),
                None => Ok(FhirPathValue::Integer(-1)),
            }
        },
    ));

    registry.register(entry(
        "substring",
        [
            (1, vec![ParamKind::Value(ValueKind::Integer)]),
            (2, vec![ParamKind::Value(ValueKind::Integer), ParamKind::Value(ValueKind::Integer)]),
        ],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "substring")? else { return Ok(FhirPathValue::Empty) };
            let chars: Vec<char> = s.chars().collect();
            let start = arg_int(args, 0).unwrap_or(0);
            if start < 0 || start as usize > chars.len() {
                return Ok(FhirPathValue::Empty);
            }
            let start = start as usize;
            let end = match arg_int(args, 1) {
                Some(len) if len >= 0 => (start + len as usize).min(chars.len()),
                _ => chars.len(),
            };
            Ok(FhirPathValue::String(chars[start..end].iter().collect()))
        },
    ));

    registry.register(entry(
        "startsWith",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "startsWith")? else { return Ok(FhirPathValue::Empty) };
            Ok(FhirPathValue::Boolean(s.starts_with(&arg_string(args, 0, "startsWith")?)))
        },
    ));

    registry.register(entry(
        "endsWith",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "endsWith")? else { return Ok(FhirPathValue::Empty) };
            Ok(FhirPathValue::Boolean(s.ends_with(&arg_string(args, 0, "endsWith")?)))
        },
    ));

    registry.register(entry(
        "contains",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "contains")? else { return Ok(FhirPathValue::Empty) };
            Ok(FhirPathValue::Boolean(s.contains(&arg_string(args, 0, "contains")?)))
        },
    ));

    registry.register(entry("upper", [(0, vec![])], true, |input, _, _| {
        let Some(s) = as_string(input, "upper")? else { return Ok(FhirPathValue::Empty) };
        Ok(FhirPathValue::String(s.to_uppercase()))
    }));

    registry.register(entry("lower", [(0, vec![])], true, |input, _, _| {
        let Some(s) = as_string(input, "lower")? else { return Ok(FhirPathValue::Empty) };
        Ok(FhirPathValue::String(s.to_lowercase()))
    }));

    registry.register(entry(
        "replace",
        [(2, vec![ParamKind::Value(ValueKind::String), ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "replace")? else { return Ok(FhirPathValue::Empty) };
            let pattern = arg_string(args, 0, "replace")?;
            let replacement = arg_string(args, 1, "replace")?;
            if pattern.is_empty() {
                // Inserting `replacement` between every character, matching
                // the conformance-suite convention for an empty pattern.
                let mut out = replacement.clone();
                for c in s.chars() {
                    out.push(c);
                    out.push_str(&replacement);
                }
                return Ok(FhirPathValue::String(out));
            }
            Ok(FhirPathValue::String(s.replace(&pattern, &replacement)))
        },
    ));

    registry.register(entry(
        "matches",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "matches")? else { return Ok(FhirPathValue::Empty) };
            let pattern = arg_string(args, 0, "matches")?;
            let re = compiled_regex(&pattern)?;
            Ok(FhirPathValue::Boolean(re.is_match(&s)))
        },
    ));

    registry.register(entry(
        "replaceMatches",
        [(2, vec![ParamKind::Value(ValueKind::String), ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "replaceMatches")? else { return Ok(FhirPathValue::Empty) };
            let pattern = arg_string(args, 0, "replaceMatches")?;
            let replacement = arg_string(args, 1, "replaceMatches")?;
            let re = compiled_regex(&pattern)?;
            // `$1`-style FHIRPath group references line up with `regex`'s own
            // replacement syntax, so no rewriting is needed here.
            Ok(FhirPathValue::String(re.replace_all(&s, replacement.as_str()).into_owned()))
        },
    ));

    registry.register(entry("length", [(0, vec![])], true, |input, _, _| {
        let Some(s) = as_string(input, "length")? else { return Ok(FhirPathValue::Empty) };
        Ok(FhirPathValue::Integer(s.chars().count() as i64))
    }));

    registry.register(entry("toChars", [(0, vec![])], true, |input, _, _| {
        let Some(s) = as_string(input, "toChars")? else { return Ok(FhirPathValue::Empty) };
        Ok(FhirPathValue::collection(
            s.chars().map(|c| FhirPathValue::String(c.to_string())).collect(),
        ))
    }));

    registry.register(entry(
        "split",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "split")? else { return Ok(FhirPathValue::Empty) };
            let sep = arg_string(args, 0, "split")?;
            let parts: Vec<FhirPathValue> = if sep.is_empty() {
                vec![FhirPathValue::String(s)]
            } else {
                s.split(sep.as_str()).map(|p| FhirPathValue::String(p.to_string())).collect()
            };
            Ok(FhirPathValue::collection(parts))
        },
    ));

    registry.register(entry(
        "join",
        [(0, vec![]), (1, vec![ParamKind::Value(ValueKind::String)])],
        false,
        |input, args, _| {
            let sep = match args.first() {
                Some(ArgValue::Value(FhirPathValue::String(s))) => s.clone(),
                _ => String::new(),
            };
            let parts: FhirPathResult<Vec<String>> = input
                .to_vec()
                .into_iter()
                .map(|item| match item {
                    FhirPathValue::String(s) => Ok(s),
                    other => Err(FhirPathError::type_error("join", "String", other.type_name())),
                })
                .collect();
            Ok(FhirPathValue::String(parts?.join(&sep)))
        },
    ));

    registry.register(entry("trim", [(0, vec![])], true, |input, _, _| {
        let Some(s) = as_string(input, "trim")? else { return Ok(FhirPathValue::Empty) };
        Ok(FhirPathValue::String(s.trim().to_string()))
    }));

    registry.register(entry(
        "encode",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "encode")? else { return Ok(FhirPathValue::Empty) };
            let format = arg_string(args, 0, "encode")?;
            let encoded = match format.as_str() {
                "base64" => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, s.as_bytes()),
                "urlbase64" | "base64url" => {
                    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE, s.as_bytes())
                }
                "hex" => hex::encode(s.as_bytes()),
                other => return Err(FhirPathError::domain(format!("encode: unsupported format '{other}'"))),
            };
            Ok(FhirPathValue::String(encoded))
        },
    ));

    registry.register(entry(
        "decode",
        [(1, vec![ParamKind::Value(ValueKind::String)])],
        true,
        |input, args, _| {
            let Some(s) = as_string(input, "decode")? else { return Ok(FhirPathValue::Empty) };
            let format = arg_string(args, 0, "decode")?;
            let bytes = match format.as_str() {
                "base64" => base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &s)
                    .map_err(|e| FhirPathError::domain(format!("decode: invalid base64: {e}")))?,
                "urlbase64" | "base64url" => {
                    base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE, &s)
                        .map_err(|e| FhirPathError::domain(format!("decode: invalid base64url: {e}")))?
                }
                "hex" => hex::decode(&s).map_err(|e| FhirPathError::domain(format!("decode: invalid hex: {e}")))?,
                other => return Err(FhirPathError::domain(format!("decode: unsupported format '{other}'"))),
            };
            let decoded = String::from_utf8(bytes)
                .map_err(|_| FhirPathError::domain("decode: decoded bytes are not valid UTF-8".to_string()))?;
            Ok(FhirPathValue::String(decoded))
        },
    ));
}
