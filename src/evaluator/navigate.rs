//! The `.` path-navigation algorithm (spec.md §4.5.2): enumerating named
//! properties of a `ResourceNode`, resolving choice types via the model, and
//! canonicalizing recursive paths.

use crate::model::{FhirPathValue, ModelProvider, ResourceNode};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::str::FromStr;
use std::sync::Arc;

/// Navigate one `.name` step from a single item, producing zero or more
/// child values (flattened by the caller).
pub fn step(model: &dyn ModelProvider, item: &FhirPathValue, name: &str) -> Vec<FhirPathValue> {
    let FhirPathValue::Resource(node) = item else {
        return Vec::new();
    };

    if is_resource_type_self_reference(node, name) {
        return vec![item.clone()];
    }

    let node = Arc::new(node.clone());
    let logical_path = format!("{}.{name}", node.path());
    let canonical_path = model
        .paths_defined_elsewhere(&logical_path)
        .unwrap_or(&logical_path)
        .to_string();

    if let Some(suffixes) = model.choice_type_paths(&canonical_path) {
        for suffix in suffixes {
            let field = format!("{name}{suffix}");
            if let Some((value, sibling)) = find_property(&node, &field) {
                let concrete_path = format!("{}.{field}", node.path());
                return materialize(&node, value, sibling, concrete_path, Some(suffix.clone()), None);
            }
        }
        return Vec::new();
    }

    match find_property_array_aware(&node, name) {
        Some(PropertyShape::Scalar(value, sibling)) => {
            let ty = model
                .path_to_type_without_elements(&canonical_path)
                .map(str::to_string);
            materialize(&node, value, sibling, logical_path, ty, None)
        }
        Some(PropertyShape::Array(items)) => {
            let ty = model
                .path_to_type_without_elements(&canonical_path)
                .map(str::to_string);
            items
                .into_iter()
                .enumerate()
                .flat_map(|(idx, (value, sibling))| {
                    materialize(&node, value, sibling, logical_path.clone(), ty.clone(), Some(idx))
                })
                .collect()
        }
        None => Vec::new(),
    }
}

/// Whether `name` names the resource type of the document root (a bare
/// `Patient` at the head of an expression evaluated against a `Patient`
/// resource is a no-op filter, not a navigation step).
fn is_resource_type_self_reference(node: &ResourceNode, name: &str) -> bool {
    node.parent().is_none() && node.fhir_node_data_type() == Some(name)
}

enum PropertyShape {
    Scalar(Option<Json>, Option<Json>),
    Array(Vec<(Option<Json>, Option<Json>)>),
}

fn find_property(node: &ResourceNode, field: &str) -> Option<(Option<Json>, Option<Json>)> {
    node.own_properties()
        .into_iter()
        .find(|(key, _, _)| key == field)
        .map(|(_, value, sibling)| (value, sibling))
}

fn find_property_array_aware(node: &ResourceNode, field: &str) -> Option<PropertyShape> {
    let (_, value, sibling) = node
        .own_properties()
        .into_iter()
        .find(|(key, _, _)| key == field)?;
    match value {
        Some(Json::Array(items)) => {
            let siblings: Vec<Option<Json>> = match &sibling {
                Some(Json::Array(s)) => s.iter().cloned().map(Some).collect(),
                _ => Vec::new(),
            };
            let shaped = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Some(v), siblings.get(i).cloned().flatten()))
                .collect();
            Some(PropertyShape::Array(shaped))
        }
        other => Some(PropertyShape::Scalar(other, sibling)),
    }
}

fn materialize(
    parent: &Arc<ResourceNode>,
    value: Option<Json>,
    sibling: Option<Json>,
    path: String,
    fhir_type: Option<String>,
    array_index: Option<usize>,
) -> Vec<FhirPathValue> {
    if value.is_none() && sibling.is_none() {
        return Vec::new();
    }
    if let Some(v) = &value {
        if !matches!(v, Json::Object(_) | Json::Array(_)) && sibling.is_none() {
            if let Some(primitive) = primitive_from_json(v, fhir_type.as_deref()) {
                return vec![primitive];
            }
        }
    }
    let child = ResourceNode::child(
        parent.clone(),
        value.map(Arc::new),
        sibling.map(Arc::new),
        path,
        fhir_type,
        array_index,
    );
    vec![FhirPathValue::Resource(child)]
}

/// Convert a scalar JSON leaf to a `FhirPathValue` primitive, using the
/// model-resolved FHIR type name as a hint for Date/DateTime/Time/Decimal
/// disambiguation (JSON itself cannot distinguish these from strings/numbers).
fn primitive_from_json(value: &Json, fhir_type: Option<&str>) -> Option<FhirPathValue> {
    match value {
        Json::Null => None,
        Json::Bool(b) => Some(FhirPathValue::Boolean(*b)),
        Json::Number(n) => match fhir_type {
            Some("integer") | Some("positiveInt") | Some("unsignedInt") => {
                Some(FhirPathValue::Integer(n.as_i64().unwrap_or_default()))
            }
            _ => {
                let decimal = Decimal::from_str(&n.to_string()).ok()?;
                if n.is_i64() && fhir_type.is_none() {
                    Some(FhirPathValue::Integer(n.as_i64().unwrap_or_default()))
                } else {
                    Some(FhirPathValue::Decimal(decimal))
                }
            }
        },
        Json::String(s) => match fhir_type {
            Some("date") => crate::model::PartialDate::parse(s).ok().map(FhirPathValue::Date),
            Some("dateTime") | Some("instant") => crate::model::PartialDateTime::parse(s)
                .ok()
                .map(FhirPathValue::DateTime),
            Some("time") => crate::model::PartialTime::parse(s).ok().map(FhirPathValue::Time),
            _ => Some(FhirPathValue::String(s.clone())),
        },
        Json::Array(_) | Json::Object(_) => None,
    }
}

/// `children()` -- one level of `.` enumeration over every own property.
pub fn children(model: &dyn ModelProvider, item: &FhirPathValue) -> Vec<FhirPathValue> {
    let FhirPathValue::Resource(node) = item else {
        return Vec::new();
    };
    node.own_properties()
        .into_iter()
        .flat_map(|(name, _, _)| step(model, item, &name))
        .collect()
}
