//! Type names and the `System.*`/model type hierarchy used by `is`, `as`,
//! and `ofType`.

use super::value::FhirPathValue;

/// A fully-qualified type name, e.g. `System.Integer` or `FHIR.Patient`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    /// Namespace (`System` for FHIRPath primitives, otherwise the model's
    /// namespace, typically `FHIR`).
    pub namespace: String,
    /// Unqualified type name.
    pub name: String,
}

impl QualifiedType {
    /// Construct a qualified type.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A `System.*` type.
    pub fn system(name: impl Into<String>) -> Self {
        Self::new("System", name)
    }
}

impl std::fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// The `System.*` runtime type of a value -- the type reported by `type()`
/// for non-`Resource` values, and the type tested against by bare `is
/// Integer` (no namespace) per the FHIRPath spec's implicit-`System`
/// resolution rule.
pub fn system_type_of(value: &FhirPathValue) -> Option<&'static str> {
    use FhirPathValue::*;
    match value {
        Boolean(_) => Some("Boolean"),
        Integer(_) => Some("Integer"),
        Long(_) => Some("Long"),
        Decimal(_) => Some("Decimal"),
        String(_) => Some("String"),
        Date(_) => Some("Date"),
        DateTime(_) => Some("DateTime"),
        Time(_) => Some("Time"),
        Quantity(_) => Some("Quantity"),
        TypeInfoObject { .. } => Some("TypeInfo"),
        Resource(_) | Collection(_) | Empty => None,
    }
}

/// Whether `type_name` (unqualified, case-sensitive) names a `System.*`
/// primitive type recognized by the built-in type hierarchy.
pub fn is_system_primitive(type_name: &str) -> bool {
    matches!(
        type_name,
        "Boolean"
            | "Integer"
            | "Long"
            | "Decimal"
            | "String"
            | "Date"
            | "DateTime"
            | "Time"
            | "Quantity"
            | "Any"
    )
}

/// Whether `value`'s runtime `System.*` type equals or derives from
/// `target`, considering the small built-in numeric-widening hierarchy
/// (`Integer` is-a `Decimal`-compatible numeric, but not vice versa --
/// FHIRPath keeps these as distinct `is` targets; only exact matches count
/// for `is`/`ofType` among primitives, per the FHIRPath conformance
/// suite).
pub fn matches_system_type(value: &FhirPathValue, target: &str) -> bool {
    if target == "Any" {
        return !matches!(value, FhirPathValue::Empty);
    }
    system_type_of(value) == Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_any_non_empty_value() {
        assert!(matches_system_type(&FhirPathValue::Boolean(true), "Any"));
    }

    #[test]
    fn exact_primitive_match() {
        assert!(matches_system_type(&FhirPathValue::Integer(3), "Integer"));
        assert!(!matches_system_type(&FhirPathValue::Integer(3), "Decimal"));
    }
}
