//! `ResourceNode` -- a typed wrapper over a fragment of a FHIR document.

use serde_json::Value as Json;
use std::sync::Arc;

/// A navigable fragment of a FHIR resource.
///
/// Built lazily during navigation: the root node wraps the whole document,
/// and each `.` or `[i]` step produces a child node borrowing from the same
/// underlying JSON via `Arc` rather than copying it.
///
/// The back-reference to `parent` is a plain `Arc` rather than `Weak`:
/// nodes only ever point upward (never down to their own children), so the
/// reference graph has no cycle and nothing here can leak.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// The primary JSON value at this path. `None` only when a node exists
    /// solely to carry `_data` sibling metadata (see the struct-level
    /// FHIR primitive-extension convention).
    data: Option<Arc<Json>>,
    /// Sibling metadata for a primitive field (e.g. `_status` alongside
    /// `status`), carrying extensions and `id`.
    sibling_data: Option<Arc<Json>>,
    /// FHIR path from the evaluation root, e.g. `Patient.name.given`.
    path: String,
    /// The model-resolved FHIR type name at this node, if known.
    fhir_node_data_type: Option<String>,
    /// Index into the parent array, if this node was produced by indexing
    /// into a repeating element.
    array_index: Option<usize>,
    /// The node this one was navigated from, if any.
    parent: Option<Arc<ResourceNode>>,
}

impl ResourceNode {
    /// Construct a root node wrapping an entire document.
    pub fn root(data: Json, fhir_type: impl Into<String>) -> Self {
        Self {
            data: Some(Arc::new(data)),
            sibling_data: None,
            path: fhir_type.into(),
            fhir_node_data_type: Some(fhir_type.into()),
            array_index: None,
            parent: None,
        }
    }

    /// Construct a child node.
    pub fn child(
        parent: Arc<ResourceNode>,
        data: Option<Arc<Json>>,
        sibling_data: Option<Arc<Json>>,
        path: impl Into<String>,
        fhir_node_data_type: Option<String>,
        array_index: Option<usize>,
    ) -> Self {
        Self {
            data,
            sibling_data,
            path: path.into(),
            fhir_node_data_type,
            array_index,
            parent: Some(parent),
        }
    }

    /// The primary JSON value, if present.
    pub fn data(&self) -> Option<&Json> {
        self.data.as_deref()
    }

    /// The sibling (`_`-prefixed) metadata value, if present.
    pub fn sibling_data(&self) -> Option<&Json> {
        self.sibling_data.as_deref()
    }

    /// The FHIR path of this node from the evaluation root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The model-resolved FHIR type at this node, if known.
    pub fn fhir_node_data_type(&self) -> Option<&str> {
        self.fhir_node_data_type.as_deref()
    }

    /// The repeating-element index this node was produced from, if any.
    pub fn array_index(&self) -> Option<usize> {
        self.array_index
    }

    /// The node this one was navigated from.
    pub fn parent(&self) -> Option<&ResourceNode> {
        self.parent.as_deref()
    }

    /// Whether the underlying JSON value is a primitive (string, number,
    /// boolean, or null) rather than an object/array.
    pub fn is_primitive(&self) -> bool {
        match self.data() {
            Some(Json::Object(_)) | Some(Json::Array(_)) => false,
            _ => true,
        }
    }

    /// Enumerate the named properties of `data` (object fields) merged
    /// with sibling `_data` metadata, skipping `resourceType` and
    /// underscore-prefixed keys whose stripped counterpart is already
    /// present. Each yielded tuple is `(field_name, value, sibling_value)`.
    pub fn own_properties(&self) -> Vec<(String, Option<Json>, Option<Json>)> {
        let mut out = Vec::new();
        let Some(Json::Object(map)) = self.data() else {
            return out;
        };
        for (key, value) in map {
            if key == "resourceType" || key.starts_with('_') {
                continue;
            }
            let sibling_key = format!("_{key}");
            let sibling = map.get(&sibling_key).cloned();
            out.push((key.clone(), Some(value.clone()), sibling));
        }
        // Underscore-only fields: the stripped counterpart is absent but
        // sibling metadata (e.g. an extension on a primitive with no
        // value) still exists.
        for (key, value) in map {
            if let Some(stripped) = key.strip_prefix('_') {
                if !map.contains_key(stripped) {
                    out.push((stripped.to_string(), None, Some(value.clone())));
                }
            }
        }
        out
    }
}

impl PartialEq for ResourceNode {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data() && self.path == other.path
    }
}
