//! Core value types for FHIRPath expressions.

use super::quantity::Quantity;
use super::resource_node::ResourceNode;
use super::temporal::{PartialDate, PartialDateTime, PartialTime};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Core value type for FHIRPath expressions.
///
/// All FHIRPath values are conceptually collections; a collection of one
/// item is represented directly (as the item itself) rather than as a
/// one-element [`FhirPathValue::Collection`], both for performance and
/// because FHIRPath's empty-propagation rules treat singletons and their
/// wrapping collection identically. [`FhirPathValue::Empty`] is the
/// distinguished empty collection.
#[derive(Debug, Clone, PartialEq)]
pub enum FhirPathValue {
    /// Boolean value.
    Boolean(bool),
    /// 32-bit-range signed integer, stored widened to `i64`.
    Integer(i64),
    /// 64-bit signed integer (`Long`).
    Long(i64),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// Partial-precision date.
    Date(PartialDate),
    /// Partial-precision date-time, optionally timezone-qualified.
    DateTime(PartialDateTime),
    /// Partial-precision time.
    Time(PartialTime),
    /// A numeric value with a unit.
    Quantity(Quantity),
    /// A collection of two-or-more items. Never nested: constructing
    /// functions must flatten via [`Collection::normalize`].
    Collection(Collection),
    /// A FHIR resource/element fragment, schema-aware.
    Resource(ResourceNode),
    /// A reflection object produced by `type()`, e.g. `System.Integer`.
    TypeInfoObject {
        /// Type namespace (`System` or a model namespace such as `FHIR`).
        namespace: String,
        /// Type name.
        name: String,
    },
    /// The empty collection.
    Empty,
}

/// An ordered, non-deduplicated sequence of [`FhirPathValue`]s, shared via
/// `Arc` so that slicing/cloning during navigation is cheap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection(Arc<[FhirPathValue]>);

impl Collection {
    /// An empty collection.
    pub fn new() -> Self {
        Self(Arc::from(Vec::new().into_boxed_slice()))
    }

    /// Build from an owned vector.
    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Self(values.into())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrowing iterator.
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// First item, if any.
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Last item, if any.
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.0.last()
    }

    /// Item at `index`, if in bounds.
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.0.get(index)
    }

    /// Copy out as an owned vector.
    pub fn to_vec(&self) -> Vec<FhirPathValue> {
        self.0.to_vec()
    }

    /// Flatten `items` (each already-flat per the collection invariant) and
    /// normalize: 0 items become [`FhirPathValue::Empty`], exactly 1 item is
    /// returned unwrapped, 2+ become a [`FhirPathValue::Collection`].
    pub fn normalize(items: Vec<FhirPathValue>) -> FhirPathValue {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            flatten_into(item, &mut flat);
        }
        match flat.len() {
            0 => FhirPathValue::Empty,
            1 => flat.into_iter().next().unwrap(),
            _ => FhirPathValue::Collection(Collection::from_vec(flat)),
        }
    }
}

/// Push `value` onto `out`, flattening one level if `value` is itself a
/// collection (collections never nest, per spec invariant).
fn flatten_into(value: FhirPathValue, out: &mut Vec<FhirPathValue>) {
    match value {
        FhirPathValue::Empty => {}
        FhirPathValue::Collection(c) => out.extend(c.to_vec()),
        other => out.push(other),
    }
}

impl FromIterator<FhirPathValue> for FhirPathValue {
    fn from_iter<T: IntoIterator<Item = FhirPathValue>>(iter: T) -> Self {
        Collection::normalize(iter.into_iter().collect())
    }
}

impl FhirPathValue {
    /// The empty collection.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Build a value from a vector, applying collection normalization.
    pub fn collection(items: Vec<FhirPathValue>) -> Self {
        Collection::normalize(items)
    }

    /// Flatten this value into an owned vector of items (0 for `Empty`, 1
    /// for a singleton, N for a collection).
    pub fn to_vec(&self) -> Vec<FhirPathValue> {
        match self {
            Self::Empty => Vec::new(),
            Self::Collection(c) => c.to_vec(),
            other => vec![other.clone()],
        }
    }

    /// Number of items this value represents as a collection.
    pub fn count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Collection(c) => c.len(),
            _ => 1,
        }
    }

    /// True if this value represents the empty collection.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Take the single item if this represents a singleton (empty is not a
    /// singleton; a genuine `Collection` with one element cannot occur by
    /// construction, but is treated as a singleton defensively).
    pub fn as_singleton(&self) -> Option<&FhirPathValue> {
        match self {
            Self::Empty => None,
            Self::Collection(c) if c.len() == 1 => c.first(),
            Self::Collection(_) => None,
            other => Some(other),
        }
    }

    /// A short, human type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Long(_) => "Long",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity(_) => "Quantity",
            Self::Collection(_) => "Collection",
            Self::Resource(_) => "Resource",
            Self::TypeInfoObject { .. } => "TypeInfo",
            Self::Empty => "Empty",
        }
    }

    /// FHIRPath truthiness per `convertsToBoolean`/boolean-context rules: a
    /// singleton `Boolean` passes through, any other singleton or empty
    /// collection is not a plain boolean (callers needing FHIRPath boolean
    /// evaluation should use `registry::logic` instead of this helper).
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_singleton() {
            Some(Self::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}
