//! Polymorphic arithmetic (`+ - * / div mod`) and the `Math` function
//! family (`abs`, `ceiling`, `sqrt`, ...).

use super::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind, ValueKind};
use crate::error::{FhirPathError, FhirPathResult};
use crate::model::{FhirPathValue, Quantity};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::sync::Arc;

/// `+` -- numeric addition, quantity addition (unit-compatible), and string
/// concatenation is handled separately by `&` (see `string_fns::concat`).
pub fn add(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    numeric_or_quantity_op(a, b, "+", |x, y| x + y, |q1, q2| {
        let converted = q2.convert_to(q1.unit.as_deref().unwrap_or("1")).map_err(FhirPathError::domain)?;
        match converted {
            Some(q2c) => Ok(Quantity::new(q1.value + q2c.value, q1.unit.clone())),
            None => Err(FhirPathError::domain(
                "cannot add quantities across the calendar/UCUM boundary".to_string(),
            )),
        }
    })
    .or_else(|_| string_concat_strict(a, b))
    .or_else(|_| temporal_add(a, b, 1))
}

/// `-` -- numeric/quantity subtraction, or date/time minus a quantity.
pub fn subtract(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    numeric_or_quantity_op(a, b, "-", |x, y| x - y, |q1, q2| {
        let converted = q2.convert_to(q1.unit.as_deref().unwrap_or("1")).map_err(FhirPathError::domain)?;
        match converted {
            Some(q2c) => Ok(Quantity::new(q1.value - q2c.value, q1.unit.clone())),
            None => Err(FhirPathError::domain(
                "cannot subtract quantities across the calendar/UCUM boundary".to_string(),
            )),
        }
    })
    .or_else(|_| temporal_add(a, b, -1))
}

fn string_concat_strict(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    Err(FhirPathError::type_error("+", "Number|Quantity", format!("{}, {}", a.type_name(), b.type_name())))
}

/// Date/Time/DateTime +/- a calendar-duration `Quantity`, honoring partial
/// precision (adding at a precision finer than the value carries is a
/// no-op at that field, matching FHIRPath's partial-date arithmetic rule).
fn temporal_add(a: &FhirPathValue, b: &FhirPathValue, sign: i64) -> FhirPathResult<FhirPathValue> {
    let FhirPathValue::Quantity(q) = b else {
        return Err(FhirPathError::type_error("date arithmetic", "Quantity", b.type_name()));
    };
    let amount = (q.value * Decimal::from(sign)).to_i64().ok_or_else(|| {
        FhirPathError::domain("quantity magnitude out of range for date arithmetic".to_string())
    })?;
    match a {
        FhirPathValue::Date(d) => Ok(FhirPathValue::Date(shift_date(*d, q.unit.as_deref(), amount)?)),
        FhirPathValue::DateTime(dt) => Ok(FhirPathValue::DateTime(shift_datetime(dt.clone(), q.unit.as_deref(), amount)?)),
        FhirPathValue::Time(t) => Ok(FhirPathValue::Time(shift_time(*t, q.unit.as_deref(), amount)?)),
        _ => Err(FhirPathError::type_error("date arithmetic", "Date|DateTime|Time", a.type_name())),
    }
}

fn shift_date(mut d: crate::model::PartialDate, unit: Option<&str>, amount: i64) -> FhirPathResult<crate::model::PartialDate> {
    match unit.unwrap_or("") {
        "year" | "years" | "a" => d.year += amount as i32,
        "month" | "months" | "mo" => {
            let total = (d.year as i64) * 12 + (d.month.unwrap_or(1) as i64 - 1) + amount;
            d.year = (total.div_euclid(12)) as i32;
            d.month = Some((total.rem_euclid(12) + 1) as u32);
        }
        "day" | "days" | "d" | "week" | "weeks" | "wk" => {
            let days = if matches!(unit, Some("week") | Some("weeks") | Some("wk")) {
                amount * 7
            } else {
                amount
            };
            d = add_days_naive(d, days);
        }
        _ => return Err(FhirPathError::domain(format!("unsupported date arithmetic unit '{}'", unit.unwrap_or("")))),
    }
    Ok(d)
}

fn shift_datetime(mut dt: crate::model::PartialDateTime, unit: Option<&str>, amount: i64) -> FhirPathResult<crate::model::PartialDateTime> {
    match unit.unwrap_or("") {
        "year" | "years" | "a" | "month" | "months" | "mo" | "day" | "days" | "d" | "week" | "weeks" | "wk" => {
            dt.date = shift_date(dt.date, unit, amount)?;
            Ok(dt)
        }
        "hour" | "hours" | "h" | "minute" | "minutes" | "min" | "second" | "seconds" | "s" | "millisecond" | "milliseconds" | "ms" => {
            if let Some(t) = dt.time {
                dt.time = Some(shift_time(t, unit, amount)?);
            }
            Ok(dt)
        }
        _ => Err(FhirPathError::domain(format!("unsupported datetime arithmetic unit '{}'", unit.unwrap_or("")))),
    }
}

fn shift_time(mut t: crate::model::PartialTime, unit: Option<&str>, amount: i64) -> FhirPathResult<crate::model::PartialTime> {
    let total_ms = time_to_millis(&t)
        + match unit.unwrap_or("") {
            "hour" | "hours" | "h" => amount * 3_600_000,
            "minute" | "minutes" | "min" => amount * 60_000,
            "second" | "seconds" | "s" => amount * 1_000,
            "millisecond" | "milliseconds" | "ms" => amount,
            other => return Err(FhirPathError::domain(format!("unsupported time arithmetic unit '{other}'"))),
        };
    let total_ms = total_ms.rem_euclid(86_400_000);
    t.hour = (total_ms / 3_600_000) as u32;
    if t.minute.is_some() {
        t.minute = Some(((total_ms / 60_000) % 60) as u32);
    }
    if t.second.is_some() {
        t.second = Some(((total_ms / 1_000) % 60) as u32);
    }
    if t.millisecond.is_some() {
        t.millisecond = Some((total_ms % 1_000) as u32);
    }
    Ok(t)
}

fn time_to_millis(t: &crate::model::PartialTime) -> i64 {
    t.hour as i64 * 3_600_000
        + t.minute.unwrap_or(0) as i64 * 60_000
        + t.second.unwrap_or(0) as i64 * 1_000
        + t.millisecond.unwrap_or(0) as i64
}

/// Civil-calendar day shift using the standard days-from-civil algorithm
/// (Howard Hinnant's), avoiding a chrono dependency for this single use.
fn add_days_naive(d: crate::model::PartialDate, delta_days: i64) -> crate::model::PartialDate {
    let day = d.day.unwrap_or(1) as i64;
    let month = d.month.unwrap_or(1) as i64;
    let epoch = days_from_civil(d.year as i64, month, day) + delta_days;
    let (y, m, dd) = civil_from_days(epoch);
    crate::model::PartialDate {
        year: y as i32,
        month: d.month.map(|_| m as u32),
        day: d.day.map(|_| dd as u32),
    }
}

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn numeric_or_quantity_op(
    a: &FhirPathValue,
    b: &FhirPathValue,
    op: &str,
    numeric: impl Fn(Decimal, Decimal) -> Decimal,
    quantity: impl Fn(&Quantity, &Quantity) -> FhirPathResult<Quantity>,
) -> FhirPathResult<FhirPathValue> {
    use FhirPathValue::*;
    match (a, b) {
        (Integer(x), Integer(y)) => {
            let result = numeric(Decimal::from(*x), Decimal::from(*y));
            Ok(FhirPathValue::Integer(result.to_i64().unwrap_or_default()))
        }
        (Long(x), Long(y)) | (Long(x), Integer(_)) if matches!(b, Long(_) | Integer(_)) => {
            let yv = match b {
                Long(y) => *y,
                Integer(y) => *y,
                _ => unreachable!(),
            };
            let result = numeric(Decimal::from(*x), Decimal::from(yv));
            Ok(FhirPathValue::Long(result.to_i64().unwrap_or_default()))
        }
        (Decimal(_), _) | (_, Decimal(_)) | (Integer(_), Long(_)) => {
            let xd = to_decimal(a).ok_or_else(|| FhirPathError::type_error(op, "Number", a.type_name()))?;
            let yd = to_decimal(b).ok_or_else(|| FhirPathError::type_error(op, "Number", b.type_name()))?;
            Ok(FhirPathValue::Decimal(numeric(xd, yd)))
        }
        (Quantity(q1), Quantity(q2)) => Ok(FhirPathValue::Quantity(quantity(q1, q2)?)),
        (Quantity(q1), Integer(_)) | (Quantity(q1), Decimal(_)) => {
            let yd = to_decimal(b).unwrap();
            Ok(FhirPathValue::Quantity(Quantity::new(numeric(q1.value, yd), q1.unit.clone())))
        }
        _ => Err(FhirPathError::type_error(op, "Number|Quantity", format!("{}, {}", a.type_name(), b.type_name()))),
    }
}

fn to_decimal(v: &FhirPathValue) -> Option<Decimal> {
    match v {
        FhirPathValue::Integer(i) => Some(Decimal::from(*i)),
        FhirPathValue::Long(i) => Some(Decimal::from(*i)),
        FhirPathValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// `*`
pub fn multiply(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    use FhirPathValue::*;
    match (a, b) {
        (Quantity(q1), Quantity(q2)) => {
            let unit = match (&q1.unit, &q2.unit) {
                (None, u) => u.clone(),
                (u, None) => u.clone(),
                (Some(u1), Some(u2)) => Some(format!("{u1}.{u2}")),
            };
            Ok(FhirPathValue::Quantity(Quantity::new(q1.value * q2.value, unit)))
        }
        (Quantity(q), other) | (other, Quantity(q)) => {
            let scalar = to_decimal(other).ok_or_else(|| FhirPathError::type_error("*", "Number", other.type_name()))?;
            Ok(FhirPathValue::Quantity(Quantity::new(q.value * scalar, q.unit.clone())))
        }
        _ => numeric_or_quantity_op(a, b, "*", |x, y| x * y, |_, _| unreachable!()),
    }
}

/// `/` -- always produces a `Decimal` (or `Quantity`), even for two
/// integers, per the FHIRPath division rule. Division by zero yields empty.
pub fn divide(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    use FhirPathValue::*;
    if let (Quantity(q1), Quantity(q2)) = (a, b) {
        if q2.value.is_zero() {
            return Ok(FhirPathValue::Empty);
        }
        let unit = match (&q1.unit, &q2.unit) {
            (u, None) => u.clone(),
            (None, Some(u2)) => Some(format!("1/{u2}")),
            (Some(u1), Some(u2)) if u1 == u2 => None,
            (Some(u1), Some(u2)) => Some(format!("{u1}/{u2}")),
        };
        return Ok(FhirPathValue::Quantity(Quantity::new(q1.value / q2.value, unit)));
    }
    if let (Quantity(q), other) = (a, b) {
        let scalar = to_decimal(other).ok_or_else(|| FhirPathError::type_error("/", "Number", other.type_name()))?;
        if scalar.is_zero() {
            return Ok(FhirPathValue::Empty);
        }
        return Ok(FhirPathValue::Quantity(Quantity::new(q.value / scalar, q.unit.clone())));
    }
    let xd = to_decimal(a).ok_or_else(|| FhirPathError::type_error("/", "Number", a.type_name()))?;
    let yd = to_decimal(b).ok_or_else(|| FhirPathError::type_error("/", "Number", b.type_name()))?;
    if yd.is_zero() {
        return Ok(FhirPathValue::Empty);
    }
    Ok(FhirPathValue::Decimal(xd / yd))
}

/// `div` -- integer division, truncating toward zero.
pub fn int_div(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    let xd = to_decimal(a).ok_or_else(|| FhirPathError::type_error("div", "Number", a.type_name()))?;
    let yd = to_decimal(b).ok_or_else(|| FhirPathError::type_error("div", "Number", b.type_name()))?;
    if yd.is_zero() {
        return Ok(FhirPathValue::Empty);
    }
    Ok(FhirPathValue::Integer((xd / yd).trunc().to_i64().unwrap_or_default()))
}

/// `mod`
pub fn modulo(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    let xd = to_decimal(a).ok_or_else(|| FhirPathError::type_error("mod", "Number", a.type_name()))?;
    let yd = to_decimal(b).ok_or_else(|| FhirPathError::type_error("mod", "Number", b.type_name()))?;
    if yd.is_zero() {
        return Ok(FhirPathValue::Empty);
    }
    let result = xd % yd;
    if matches!(a, FhirPathValue::Decimal(_)) || matches!(b, FhirPathValue::Decimal(_)) {
        Ok(FhirPathValue::Decimal(result))
    } else {
        Ok(FhirPathValue::Integer(result.to_i64().unwrap_or_default()))
    }
}

/// `-x` / `+x`
pub fn negate(v: &FhirPathValue) -> FhirPathResult<FhirPathValue> {
    match v {
        FhirPathValue::Integer(i) => Ok(FhirPathValue::Integer(-i)),
        FhirPathValue::Long(i) => Ok(FhirPathValue::Long(-i)),
        FhirPathValue::Decimal(d) => Ok(FhirPathValue::Decimal(-d)),
        FhirPathValue::Quantity(q) => Ok(FhirPathValue::Quantity(Quantity::new(-q.value, q.unit.clone()))),
        other => Err(FhirPathError::type_error("-", "Number|Quantity", other.type_name())),
    }
}

fn unary_decimal_fn(
    input: &FhirPathValue,
    f: impl Fn(Decimal) -> Option<Decimal>,
    name: &str,
) -> FhirPathResult<FhirPathValue> {
    if input.is_empty() {
        return Ok(FhirPathValue::Empty);
    }
    let d = to_decimal(input.as_singleton().ok_or_else(|| FhirPathError::singleton_error(name, input.count()))?)
        .ok_or_else(|| FhirPathError::type_error(name, "Number", input.type_name()))?;
    match f(d) {
        Some(r) => Ok(FhirPathValue::Decimal(r)),
        None => Ok(FhirPathValue::Empty),
    }
}

fn entry(
    name: &str,
    arities: impl IntoIterator<Item = (usize, Vec<ParamKind>)>,
    nullable: bool,
    f: impl Fn(&FhirPathValue, &[ArgValue<'_>]) -> FhirPathResult<FhirPathValue> + Send + Sync + 'static,
) -> FunctionEntry {
    FunctionEntry {
        name: name.to_string(),
        arities: arities.into_iter().collect(),
        nullable,
        internal_structures: false,
        is_async: false,
        implementation: Arc::new(move |input, args, _ctx, _eval| f(input, args)),
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(entry("abs", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(input, |d| Some(d.abs()), "abs")
    }));
    registry.register(entry("ceiling", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(input, |d| Some(d.ceil()), "ceiling")
    }));
    registry.register(entry("floor", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(input, |d| Some(d.floor()), "floor")
    }));
    registry.register(entry("truncate", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(input, |d| Some(d.trunc()), "truncate")
    }));
    registry.register(entry("sqrt", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(
            input,
            |d| d.to_f64().and_then(f64::sqrt_checked).and_then(Decimal::from_f64),
            "sqrt",
        )
    }));
    registry.register(entry("ln", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(
            input,
            |d| d.to_f64().filter(|v| *v > 0.0).map(f64::ln).and_then(Decimal::from_f64),
            "ln",
        )
    }));
    registry.register(entry("exp", [(0, vec![])], true, |input, _| {
        unary_decimal_fn(input, |d| d.to_f64().map(f64::exp).and_then(Decimal::from_f64), "exp")
    }));
    registry.register(entry(
        "log",
        [(1, vec![ParamKind::Value(ValueKind::Number)])],
        true,
        |input, args| {
            let base = match &args[0] {
                ArgValue::Value(v) => to_decimal(v).and_then(|d| d.to_f64()),
                _ => None,
            };
            unary_decimal_fn(
                input,
                |d| {
                    let base = base?;
                    d.to_f64().filter(|v| *v > 0.0).map(|v| v.log(base)).and_then(Decimal::from_f64)
                },
                "log",
            )
        },
    ));
    registry.register(entry(
        "power",
        [(1, vec![ParamKind::Value(ValueKind::Number)])],
        true,
        |input, args| {
            let exp = match &args[0] {
                ArgValue::Value(v) => to_decimal(v),
                _ => None,
            };
            unary_decimal_fn(
                input,
                |d| {
                    let exp = exp?.to_f64()?;
                    d.to_f64().map(|v| v.powf(exp)).and_then(Decimal::from_f64)
                },
                "power",
            )
        },
    ));
    registry.register(entry(
        "round",
        [(0, vec![]), (1, vec![ParamKind::Value(ValueKind::Integer)])],
        true,
        |input, args| {
            let precision = match args.first() {
                Some(ArgValue::Value(FhirPathValue::Integer(p))) => *p as u32,
                _ => 0,
            };
            unary_decimal_fn(input, |d| Some(d.round_dp(precision)), "round")
        },
    ));
}

trait SqrtCheckedExt {
    fn sqrt_checked(self) -> Option<f64>;
}
impl SqrtCheckedExt for f64 {
    fn sqrt_checked(self) -> Option<f64> {
        if self < 0.0 { None } else { Some(self.sqrt()) }
    }
}
