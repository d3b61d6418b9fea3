//! Three-valued ordering between singleton values, shared by the `<`/`<=`/
//! `>`/`>=` operators and by `min`/`max`/sort-dependent aggregate helpers.

use crate::error::{FhirPathError, FhirPathResult};
use crate::model::FhirPathValue;
use std::cmp::Ordering;

/// Compare two singletons. `Ok(None)` means "incomparable" (maps to the
/// empty collection at the call site, not an error) -- only reachable for
/// partial-precision temporal values and cross-domain quantities. `Err` is
/// reserved for genuinely incompatible classes (spec.md §7 `TypeError`).
pub fn compare_singletons(a: &FhirPathValue, b: &FhirPathValue) -> FhirPathResult<Option<Ordering>> {
    use FhirPathValue::*;
    match (a, b) {
        (Integer(x), Integer(y)) => Ok(Some(x.cmp(y))),
        (Long(x), Long(y)) => Ok(Some(x.cmp(y))),
        (Integer(x), Long(y)) => Ok(Some((*x).cmp(y))),
        (Long(x), Integer(y)) => Ok(Some(x.cmp(&(*y as i64)))),
        (Decimal(x), Decimal(y)) => Ok(x.partial_cmp(y)),
        (Integer(x), Decimal(y)) => Ok(rust_decimal::Decimal::from(*x).partial_cmp(y)),
        (Decimal(x), Integer(y)) => Ok(x.partial_cmp(&rust_decimal::Decimal::from(*y))),
        (Long(x), Decimal(y)) => Ok(rust_decimal::Decimal::from(*x).partial_cmp(y)),
        (Decimal(x), Long(y)) => Ok(x.partial_cmp(&rust_decimal::Decimal::from(*y))),
        (String(x), String(y)) => Ok(Some(x.cmp(y))),
        (Boolean(x), Boolean(y)) => Ok(Some(x.cmp(y))),
        (Date(x), Date(y)) => Ok(temporal_ordering(x.compare(y))),
        (Time(x), Time(y)) => Ok(temporal_ordering(x.compare(y))),
        (DateTime(x), DateTime(y)) => Ok(temporal_ordering(x.compare(y))),
        (Quantity(x), Quantity(y)) => Ok(x.partial_compare(y)),
        _ => Err(FhirPathError::type_error(
            "comparison",
            a.type_name(),
            b.type_name(),
        )),
    }
}

fn temporal_ordering(ord: crate::model::TemporalOrdering) -> Option<Ordering> {
    match ord {
        crate::model::TemporalOrdering::Definite(o) => Some(o),
        crate::model::TemporalOrdering::Incomparable => None,
    }
}
