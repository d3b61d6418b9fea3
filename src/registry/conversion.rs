//! Type conversion: the `to*`/`convertsTo*` family.

use super::{ArgValue, FunctionEntry, FunctionRegistry};
use crate::error::{FhirPathError, FhirPathResult};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::engine::Evaluator;
use crate::model::{FhirPathValue, PartialDate, PartialDateTime, PartialTime, Quantity};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn entry(
    name: &str,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>], &EvaluationContext, &Evaluator) -> FhirPathResult<FhirPathValue>
        + Send
        + Sync
        + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: [(0, vec![])].into_iter().collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(f),
    }
}

/// Attempt to coerce a singleton value to `Integer`, following FHIRPath's
/// implicit-conversion table (Boolean, String, numeric, but never
/// lossy-truncating a Decimal).
fn try_to_integer(value: &FhirPathValue) -> Option<i64> {
    match value {
        FhirPathValue::Integer(n) => Some(*n),
        FhirPathValue::Long(n) => Some(*n),
        FhirPathValue::Boolean(b) => Some(if *b { 1 } else { 0 }),
        FhirPathValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn try_to_long(value: &FhirPathValue) -> Option<i64> {
    try_to_integer(value)
}

fn try_to_decimal(value: &FhirPathValue) -> Option<Decimal> {
    match value {
        FhirPathValue::Decimal(d) => Some(*d),
        FhirPathValue::Integer(n) => Some(Decimal::from(*n)),
        FhirPathValue::Long(n) => Some(Decimal::from(*n)),
        FhirPathValue::Boolean(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        FhirPathValue::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn try_to_string(value: &FhirPathValue) -> Option<String> {
    match value {
        FhirPathValue::String(s) => Some(s.clone()),
        FhirPathValue::Integer(n) => Some(n.to_string()),
        FhirPathValue::Long(n) => Some(n.to_string()),
        FhirPathValue::Decimal(d) => Some(d.to_string()),
        FhirPathValue::Boolean(b) => Some(b.to_string()),
        FhirPathValue::Date(d) => Some(d.to_string()),
        FhirPathValue::DateTime(d) => Some(d.to_string()),
        FhirPathValue::Time(t) => Some(t.to_string()),
        FhirPathValue::Quantity(q) => Some(q.to_string()),
        _ => None,
    }
}

fn try_to_boolean(value: &FhirPathValue) -> Option<bool> {
    match value {
        FhirPathValue::Boolean(b) => Some(*b),
        FhirPathValue::Integer(1) | FhirPathValue::Long(1) => Some(true),
        FhirPathValue::Integer(0) | FhirPathValue::Long(0) => Some(false),
        FhirPathValue::Decimal(d) if *d == Decimal::ONE => Some(true),
        FhirPathValue::Decimal(d) if *d == Decimal::ZERO => Some(false),
        FhirPathValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
            "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn try_to_quantity(value: &FhirPathValue) -> Option<Quantity> {
    match value {
        FhirPathValue::Quantity(q) => Some(q.clone()),
        FhirPathValue::Integer(n) => Some(Quantity::dimensionless(Decimal::from(*n))),
        FhirPathValue::Long(n) => Some(Quantity::dimensionless(Decimal::from(*n))),
        FhirPathValue::Decimal(d) => Some(Quantity::dimensionless(*d)),
        FhirPathValue::Boolean(b) => Some(Quantity::dimensionless(if *b { Decimal::ONE } else { Decimal::ZERO })),
        FhirPathValue::String(s) => parse_quantity_literal(s),
        _ => None,
    }
}

/// Parse a `"<number> '<unit>'"` or bare-number quantity string literal.
fn parse_quantity_literal(s: &str) -> Option<Quantity> {
    let s = s.trim();
    if let Some(quote_start) = s.find('\'') {
        let (num_part, rest) = s.split_at(quote_start);
        let unit = rest.trim_start_matches('\'').trim_end_matches('\'');
        let value = Decimal::from_str(num_part.trim()).ok()?;
        Some(Quantity::new(value, Some(unit.to_string())))
    } else {
        let mut parts = s.splitn(2, char::is_whitespace);
        let num_part = parts.next()?;
        let value = Decimal::from_str(num_part).ok()?;
        let unit = parts.next().map(|u| u.trim().to_string());
        Some(Quantity::new(value, unit))
    }
}

fn try_to_date(value: &FhirPathValue) -> Option<PartialDate> {
    match value {
        FhirPathValue::Date(d) => Some(d.clone()),
        FhirPathValue::DateTime(dt) => Some(dt.date.clone()),
        FhirPathValue::String(s) => PartialDate::parse(s.trim()).ok(),
        _ => None,
    }
}

fn try_to_datetime(value: &FhirPathValue) -> Option<PartialDateTime> {
    match value {
        FhirPathValue::DateTime(dt) => Some(dt.clone()),
        FhirPathValue::Date(d) => Some(PartialDateTime {
            date: *d,
            time: None,
            tz_offset_minutes: None,
        }),
        FhirPathValue::String(s) => PartialDateTime::parse(s.trim()).ok(),
        _ => None,
    }
}

fn try_to_time(value: &FhirPathValue) -> Option<PartialTime> {
    match value {
        FhirPathValue::Time(t) => Some(t.clone()),
        FhirPathValue::String(s) => PartialTime::parse(s.trim()).ok(),
        _ => None,
    }
}

/// A collection with >1 item is a `SingletonError` for any `to*`/
/// `convertsTo*` function (spec.md §4.3); empty stays empty.
fn require_singleton<'a>(input: &'a FhirPathValue, context: &str) -> FhirPathResult<Option<&'a FhirPathValue>> {
    if input.is_empty() {
        return Ok(None);
    }
    input
        .as_singleton()
        .map(Some)
        .ok_or_else(|| FhirPathError::singleton_error(context, input.count()))
}

macro_rules! register_conversion_pair {
    ($registry:expr, $to_name:literal, $converts_name:literal, $try_fn:ident, $wrap:expr) => {
        $registry.register(entry($to_name, |input, _, _, _| {
            let Some(single) = require_singleton(input, $to_name)? else {
                return Ok(FhirPathValue::Empty);
            };
            Ok(match $try_fn(single) {
                Some(v) => $wrap(v),
                None => FhirPathValue::Empty,
            })
        }));
        $registry.register(entry($converts_name, |input, _, _, _| {
            let Some(single) = require_singleton(input, $converts_name)? else {
                return Ok(FhirPathValue::Empty);
            };
            Ok(FhirPathValue::Boolean($try_fn(single).is_some()))
        }));
    };
}

pub fn register(registry: &mut FunctionRegistry) {
    register_conversion_pair!(registry, "toInteger", "convertsToInteger", try_to_integer, FhirPathValue::Integer);
    register_conversion_pair!(registry, "toLong", "convertsToLong", try_to_long, FhirPathValue::Long);
    register_conversion_pair!(registry, "toDecimal", "convertsToDecimal", try_to_decimal, FhirPathValue::Decimal);
    register_conversion_pair!(registry, "toString", "convertsToString", try_to_string, FhirPathValue::String);
    register_conversion_pair!(registry, "toBoolean", "convertsToBoolean", try_to_boolean, FhirPathValue::Boolean);
    register_conversion_pair!(registry, "toQuantity", "convertsToQuantity", try_to_quantity, FhirPathValue::Quantity);
    register_conversion_pair!(registry, "toDate", "convertsToDate", try_to_date, FhirPathValue::Date);
    register_conversion_pair!(registry, "toDateTime", "convertsToDateTime", try_to_datetime, FhirPathValue::DateTime);
    register_conversion_pair!(registry, "toTime", "convertsToTime", try_to_time, FhirPathValue::Time);

    // `toQuantity(unit)`: converts the singleton input to the requested
    // unit. Returns empty for an input that doesn't convert to a quantity
    // at all, but a null-ish empty (still `FhirPathValue::Empty`, the only
    // "no value" channel this value algebra has) when the conversion itself
    // crosses the forbidden calendar/UCUM boundary -- `Quantity::convert_to`
    // already distinguishes "boundary crossed" (`Ok(None)`) from "dimensions
    // incompatible" (`Err`), so this wrapper just threads that through.
    registry.register(FunctionEntry {
        name: "toQuantity".to_string(),
        arities: [(
            0,
            vec![],
        ), (
            1,
            vec![super::ParamKind::Value(super::ValueKind::String)],
        )]
        .into_iter()
        .collect(),
        nullable: false,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(|input, args, _, _| {
            let Some(single) = require_singleton(input, "toQuantity")? else {
                return Ok(FhirPathValue::Empty);
            };
            let Some(quantity) = try_to_quantity(single) else {
                return Ok(FhirPathValue::Empty);
            };
            let target_unit = match args.first() {
                None => return Ok(FhirPathValue::Quantity(quantity)),
                Some(ArgValue::Value(FhirPathValue::String(s))) => s.clone(),
                Some(ArgValue::Value(FhirPathValue::Empty)) | None => {
                    return Ok(FhirPathValue::Quantity(quantity));
                }
                _ => return Ok(FhirPathValue::Empty),
            };
            match quantity.convert_to(&target_unit) {
                Ok(Some(converted)) => Ok(FhirPathValue::Quantity(converted)),
                Ok(None) => Ok(FhirPathValue::Empty),
                Err(_) => Ok(FhirPathValue::Empty),
            }
        }),
    });
}
