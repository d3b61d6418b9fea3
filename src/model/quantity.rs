//! Quantity value with UCUM/calendar-duration unit algebra.
//!
//! Calendar-duration words (`year`, `month`, ...) and the handful of
//! definite-length time units get a fast, dependency-free path below,
//! since those are the units FHIRPath date arithmetic and the calendar/UCUM
//! boundary rule actually care about. Everything else (mass, length,
//! concentration, ...) falls through to `octofhir_ucum` for real UCUM
//! dimensional analysis, the same crate the model uses elsewhere for
//! `%ucum`-backed lookups.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;

/// A numeric value paired with a unit string.
///
/// `unit` is one of: a UCUM code (e.g. `"mg"`, `"s"`), a calendar-duration
/// word (`"year"`, `"month"`, `"week"`, `"day"`, `"hour"`, `"minute"`,
/// `"second"`, `"millisecond"`), or `None`/`"1"` for dimensionless.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    /// Numeric magnitude.
    pub value: Decimal,
    /// Unit string, normalized at construction time.
    pub unit: Option<String>,
}

/// Calendar-duration / UCUM time units with a fixed (non-calendar-variable)
/// length, meaning a definite number of seconds regardless of when they're
/// anchored. `year` and `month` are excluded: their length varies with
/// calendar position and they are comparable only to other calendar
/// duration quantities, never to UCUM time quantities, once the magnitude
/// would span more than a second.
const DEFINITE_DURATIONS: &[(&[&str], f64)] = &[
    (&["ms", "millisecond", "milliseconds"], 0.001),
    (&["s", "second", "seconds"], 1.0),
    (&["min", "minute", "minutes"], 60.0),
    (&["h", "hour", "hours"], 3600.0),
    (&["d", "day", "days"], 86400.0),
    (&["wk", "week", "weeks"], 604_800.0),
];

/// Calendar-only (variable length) duration units.
const CALENDAR_ONLY: &[(&[&str], &str)] = &[
    (&["a", "year", "years"], "year"),
    (&["mo", "month", "months"], "month"),
];

impl Quantity {
    /// Construct a quantity, normalizing calendar-word units to their short
    /// form is intentionally NOT performed here -- FHIRPath equality rules
    /// distinguish the literal unit the author wrote, and conversion is
    /// always explicit via [`Quantity::convert_to`] or comparison via
    /// [`Quantity::compatible_seconds`].
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        Self { value, unit }
    }

    /// A dimensionless quantity (`'1'`).
    pub fn dimensionless(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    fn unit_str(&self) -> &str {
        self.unit.as_deref().unwrap_or("1")
    }

    fn definite_seconds_factor(unit: &str) -> Option<f64> {
        DEFINITE_DURATIONS
            .iter()
            .find(|(names, _)| names.contains(&unit))
            .map(|(_, factor)| *factor)
    }

    fn calendar_only_name(unit: &str) -> Option<&'static str> {
        CALENDAR_ONLY
            .iter()
            .find(|(names, _)| names.contains(&unit))
            .map(|(_, canon)| *canon)
    }

    /// Whether `unit` is recognized as any kind of time duration (definite
    /// or calendar-only).
    pub fn is_time_unit(unit: &str) -> bool {
        Self::definite_seconds_factor(unit).is_some() || Self::calendar_only_name(unit).is_some()
    }

    /// If both quantities denote a definite-length duration, return each
    /// quantity's magnitude expressed in seconds. Returns `None` if either
    /// side is not a definite-duration unit (including: either side is a
    /// calendar-only `year`/`month` quantity).
    pub fn compatible_seconds(&self, other: &Quantity) -> Option<(Decimal, Decimal)> {
        let a = Self::definite_seconds_factor(self.unit_str())?;
        let b = Self::definite_seconds_factor(other.unit_str())?;
        let a_secs = self.value * Decimal::from_f64(a)?;
        let b_secs = other.value * Decimal::from_f64(b)?;
        Some((a_secs, b_secs))
    }

    /// Whether `self` and `other` are both calendar-only (`year`/`month`)
    /// quantities of the *same* calendar unit -- the only case in which
    /// calendar-only quantities compare without ambiguity.
    pub fn same_calendar_only_unit(&self, other: &Quantity) -> bool {
        match (
            Self::calendar_only_name(self.unit_str()),
            Self::calendar_only_name(other.unit_str()),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether mixing `self` and `other` in arithmetic/comparison crosses
    /// the forbidden calendar/UCUM boundary: one side is a calendar-only
    /// (`year`/`month`) quantity and the other is a definite-duration
    /// UCUM/calendar quantity.
    pub fn crosses_calendar_ucum_boundary(&self, other: &Quantity) -> bool {
        let self_calendar_only = Self::calendar_only_name(self.unit_str()).is_some();
        let other_calendar_only = Self::calendar_only_name(other.unit_str()).is_some();
        let self_definite = Self::definite_seconds_factor(self.unit_str()).is_some();
        let other_definite = Self::definite_seconds_factor(other.unit_str()).is_some();
        (self_calendar_only && other_definite) || (other_calendar_only && self_definite)
    }

    /// Convert this quantity to `target_unit` if the two units are
    /// commensurable. Returns `Ok(None)` (distinct from an error) if the
    /// conversion crosses the forbidden calendar/UCUM boundary; returns
    /// `Err` if the units are simply incompatible dimensions.
    pub fn convert_to(&self, target_unit: &str) -> Result<Option<Quantity>, String> {
        if self.unit_str() == target_unit {
            return Ok(Some(self.clone()));
        }
        if self.crosses_calendar_ucum_boundary(&Quantity::new(Decimal::ZERO, Some(target_unit.to_string()))) {
            return Ok(None);
        }
        if let (Some(a), Some(b)) = (
            Self::definite_seconds_factor(self.unit_str()),
            Self::definite_seconds_factor(target_unit),
        ) {
            let factor = Decimal::from_f64(a / b).ok_or("unrepresentable conversion factor")?;
            return Ok(Some(Quantity::new(self.value * factor, Some(target_unit.to_string()))));
        }
        if self.unit.is_none() && target_unit == "1" {
            return Ok(Some(Quantity::new(self.value, Some("1".to_string()))));
        }
        // Neither side is a calendar word or one of the fixed time units
        // above: defer to real UCUM dimensional analysis for everything
        // else (mass, length, concentration, ...).
        ucum_convert(self.value, self.unit_str(), target_unit)
            .map(|v| Some(Quantity::new(v, Some(target_unit.to_string()))))
    }

    /// Structural/canonical equality used by `deepEqual`: compares after
    /// converting to a common unit when possible; quantities that cross the
    /// calendar/UCUM boundary or use incompatible dimensions are unequal
    /// (never an error -- equality never throws).
    pub fn canonical_eq(&self, other: &Quantity) -> bool {
        if self.crosses_calendar_ucum_boundary(other) {
            return false;
        }
        if self.unit_str() == other.unit_str() {
            return super::equality::decimal_eq(&self.value, &other.value);
        }
        if let Some((a, b)) = self.compatible_seconds(other) {
            return super::equality::decimal_eq(&a, &b);
        }
        match ucum_canonical_values(self.value, self.unit_str(), other.value, other.unit_str()) {
            Some((a, b)) => super::equality::decimal_eq(&a, &b),
            None => false,
        }
    }

    /// Strict `=` comparison: `None` (empty, not `false`) when the two
    /// quantities are not well-defined as comparable at all -- crossing
    /// the calendar/UCUM boundary, or comparing two *different* indefinite
    /// calendar-duration units (`year` vs `month`), since neither has a
    /// fixed length to convert through. Same-unit and definite-duration
    /// comparisons fall through to [`Quantity::canonical_eq`] unchanged.
    pub fn strict_eq(&self, other: &Quantity) -> Option<bool> {
        if self.crosses_calendar_ucum_boundary(other) {
            return None;
        }
        let self_cal = Self::calendar_only_name(self.unit_str());
        let other_cal = Self::calendar_only_name(other.unit_str());
        if let (Some(a), Some(b)) = (self_cal, other_cal) {
            if a != b {
                return None;
            }
        }
        Some(self.canonical_eq(other))
    }

    /// UCUM symbol for a calendar-only duration word, used only to borrow
    /// UCUM's own exact `1 a == 12 mo` definition for equivalence -- the
    /// literal words `"year"`/`"month"` are not themselves valid UCUM
    /// syntax.
    fn calendar_ucum_symbol(name: &'static str) -> &'static str {
        match name {
            "year" => "a",
            "month" => "mo",
            other => other,
        }
    }

    /// Equivalence (`~`): same as canonical equality for same-unit or
    /// definite-duration quantities. Two *different* indefinite calendar
    /// units (`year` vs `month`) are not simply unequal here as they are
    /// under strict `=` -- equivalence is explicitly the looser comparison,
    /// so it borrows UCUM's own fixed `1 a == 12 mo` definition to compare
    /// them, rather than reporting empty or false.
    pub fn equivalent(&self, other: &Quantity) -> bool {
        if self.crosses_calendar_ucum_boundary(other) {
            return false;
        }
        let self_cal = Self::calendar_only_name(self.unit_str());
        let other_cal = Self::calendar_only_name(other.unit_str());
        if let (Some(a), Some(b)) = (self_cal, other_cal) {
            if a != b {
                let self_ucum = Self::calendar_ucum_symbol(a);
                let other_ucum = Self::calendar_ucum_symbol(b);
                return match ucum_canonical_values(self.value, self_ucum, other.value, other_ucum) {
                    Some((x, y)) => super::equality::decimal_eq(&x, &y),
                    None => false,
                };
            }
        }
        self.canonical_eq(other)
    }

    /// Three-valued ordering: `None` when the quantities are not
    /// commensurable (mismatched dimension, or calendar/UCUM boundary).
    pub fn partial_compare(&self, other: &Quantity) -> Option<std::cmp::Ordering> {
        if self.crosses_calendar_ucum_boundary(other) {
            return None;
        }
        if self.unit_str() == other.unit_str() {
            return self.value.partial_cmp(&other.value);
        }
        if let Some((a, b)) = self.compatible_seconds(other) {
            return a.partial_cmp(&b);
        }
        let (a, b) = ucum_canonical_values(self.value, self.unit_str(), other.value, other.unit_str())?;
        a.partial_cmp(&b)
    }
}

/// Reduce `value unit` to its UCUM canonical-unit magnitude, via
/// `octofhir_ucum`'s dimensional-analysis evaluator. `None` if the unit
/// text doesn't parse as UCUM (e.g. it's a bare calendar word already
/// handled above).
fn ucum_canonical_value(value: Decimal, unit: &str) -> Option<Decimal> {
    let expr = octofhir_ucum::parse_expression(unit).ok()?;
    let evaluated = octofhir_ucum::evaluate_owned(&expr).ok()?;
    let factor = Decimal::from_f64(octofhir_ucum::precision::to_f64(evaluated.factor))?;
    Some(value * factor)
}

/// Canonicalize both sides and return their magnitudes only if the two
/// units share the same UCUM dimension.
fn ucum_canonical_values(
    left_value: Decimal,
    left_unit: &str,
    right_value: Decimal,
    right_unit: &str,
) -> Option<(Decimal, Decimal)> {
    let left_expr = octofhir_ucum::parse_expression(left_unit).ok()?;
    let right_expr = octofhir_ucum::parse_expression(right_unit).ok()?;
    let left_eval = octofhir_ucum::evaluate_owned(&left_expr).ok()?;
    let right_eval = octofhir_ucum::evaluate_owned(&right_expr).ok()?;
    if left_eval.dim != right_eval.dim {
        return None;
    }
    let left_factor = Decimal::from_f64(octofhir_ucum::precision::to_f64(left_eval.factor))?;
    let right_factor = Decimal::from_f64(octofhir_ucum::precision::to_f64(right_eval.factor))?;
    Some((left_value * left_factor, right_value * right_factor))
}

/// Convert `value from_unit` into `to_unit` via UCUM dimensional analysis.
/// `Err` when either unit fails to parse or the dimensions don't match.
fn ucum_convert(value: Decimal, from_unit: &str, to_unit: &str) -> Result<Decimal, String> {
    let from_expr = octofhir_ucum::parse_expression(from_unit)
        .map_err(|e| format!("cannot parse UCUM unit '{from_unit}': {e}"))?;
    let to_expr = octofhir_ucum::parse_expression(to_unit)
        .map_err(|e| format!("cannot parse UCUM unit '{to_unit}': {e}"))?;
    let from_eval = octofhir_ucum::evaluate_owned(&from_expr)
        .map_err(|e| format!("cannot evaluate UCUM unit '{from_unit}': {e}"))?;
    let to_eval = octofhir_ucum::evaluate_owned(&to_expr)
        .map_err(|e| format!("cannot evaluate UCUM unit '{to_unit}': {e}"))?;
    if from_eval.dim != to_eval.dim {
        return Err(format!("cannot convert quantity with unit '{from_unit}' to '{to_unit}'"));
    }
    let from_factor = octofhir_ucum::precision::to_f64(from_eval.factor);
    let to_factor = octofhir_ucum::precision::to_f64(to_eval.factor);
    let ratio = Decimal::from_f64(from_factor / to_factor)
        .ok_or_else(|| "unrepresentable UCUM conversion factor".to_string())?;
    Ok(value * ratio)
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(u) => write!(f, "{} '{}'", self.value, u),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minutes_and_seconds_are_commensurable() {
        let a = Quantity::new(Decimal::from_str("3").unwrap(), Some("min".to_string()));
        let b = Quantity::new(Decimal::from_str("180").unwrap(), Some("s".to_string()));
        assert!(a.canonical_eq(&b));
    }

    #[test]
    fn year_and_month_cross_boundary_is_forbidden_against_ucum() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let seconds = Quantity::new(Decimal::from_str("31536000").unwrap(), Some("s".to_string()));
        assert!(!year.canonical_eq(&seconds));
        assert!(year.crosses_calendar_ucum_boundary(&seconds));
    }

    #[test]
    fn year_and_month_are_not_directly_comparable() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let months = Quantity::new(Decimal::from_str("12").unwrap(), Some("month".to_string()));
        // Different calendar units: not canonically equal by this
        // conservative comparator (equivalence layer applies the looser
        // 12-months-per-year rule explicitly; see registry::filtering).
        assert!(!year.canonical_eq(&months));
    }

    #[test]
    fn strict_eq_is_empty_for_year_vs_month() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let months = Quantity::new(Decimal::from_str("12").unwrap(), Some("month".to_string()));
        assert_eq!(year.strict_eq(&months), None);
    }

    #[test]
    fn strict_eq_is_empty_across_calendar_ucum_boundary() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let seconds = Quantity::new(Decimal::from_str("31536000").unwrap(), Some("s".to_string()));
        assert_eq!(year.strict_eq(&seconds), None);
    }

    #[test]
    fn strict_eq_falls_through_to_canonical_eq_for_same_calendar_unit() {
        let a = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let b = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        assert_eq!(a.strict_eq(&b), Some(true));
    }

    #[test]
    fn equivalent_applies_the_twelve_months_per_year_rule() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let months = Quantity::new(Decimal::from_str("12").unwrap(), Some("month".to_string()));
        assert!(year.equivalent(&months));
    }

    #[test]
    fn equivalent_rejects_a_non_matching_month_count() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let months = Quantity::new(Decimal::from_str("6").unwrap(), Some("month".to_string()));
        assert!(!year.equivalent(&months));
    }

    #[test]
    fn equivalent_is_false_across_calendar_ucum_boundary() {
        let year = Quantity::new(Decimal::from_str("1").unwrap(), Some("year".to_string()));
        let seconds = Quantity::new(Decimal::from_str("31536000").unwrap(), Some("s".to_string()));
        assert!(!year.equivalent(&seconds));
    }
}
