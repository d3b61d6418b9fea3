//! Model projection: the schema-aware lookups navigation needs to
//! disambiguate choice types and canonicalize recursive paths.

use std::collections::HashMap;

/// Schema lookup surface navigation depends on. Implementations are keyed
/// per FHIR release (DSTU2/STU3/R4/R5); this crate does not ship release
/// data itself -- callers supply a [`ModelProvider`] built from their own
/// model JSON (see §6's model data layout).
pub trait ModelProvider: Send + Sync {
    /// Candidate concrete suffixes for a choice-type path, in probe order,
    /// e.g. `"Observation.value"` → `["Quantity", "CodeableConcept", ...]`.
    fn choice_type_paths(&self, path: &str) -> Option<&[String]>;

    /// Canonicalize a recursive path to where it was actually defined,
    /// e.g. `"Questionnaire.item.item"` → `"Questionnaire.item"`.
    fn paths_defined_elsewhere(&self, path: &str) -> Option<&str>;

    /// The parent type of `type_name` in the FHIR type hierarchy, e.g.
    /// `"Observation"` → `"DomainResource"`.
    fn type_to_parent(&self, type_name: &str) -> Option<&str>;

    /// The declared FHIR type at `path`, e.g. `"Patient.name"` →
    /// `"HumanName"`.
    fn path_to_type(&self, path: &str) -> Option<&str>;

    /// Compacted variant of [`ModelProvider::path_to_type`] used when
    /// element metadata is not needed, e.g. for bare type resolution
    /// during `is`/`as`.
    fn path_to_type_without_elements(&self, path: &str) -> Option<&str> {
        self.path_to_type(path)
    }
}

/// A [`ModelProvider`] with no schema data: choice types are never
/// disambiguated (navigation falls back to probing every field present on
/// the document) and the type hierarchy is empty. Useful for evaluating
/// expressions against arbitrary JSON with no FHIR model loaded.
#[derive(Debug, Default)]
pub struct NoopModelProvider;

impl ModelProvider for NoopModelProvider {
    fn choice_type_paths(&self, _path: &str) -> Option<&[String]> {
        None
    }

    fn paths_defined_elsewhere(&self, _path: &str) -> Option<&str> {
        None
    }

    fn type_to_parent(&self, _type_name: &str) -> Option<&str> {
        None
    }

    fn path_to_type(&self, _path: &str) -> Option<&str> {
        None
    }
}

/// A [`ModelProvider`] backed by plain in-memory maps, loaded from the
/// persisted per-release model JSON described in §6.
#[derive(Debug, Default, Clone)]
pub struct InMemoryModelProvider {
    choice_type_paths: HashMap<String, Vec<String>>,
    paths_defined_elsewhere: HashMap<String, String>,
    type2_parent: HashMap<String, String>,
    path2_type: HashMap<String, String>,
    path2_type_without_elements: HashMap<String, String>,
}

impl InMemoryModelProvider {
    /// An empty provider, populated via the `with_*` builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `choiceTypePaths` map.
    pub fn with_choice_type_paths(mut self, map: HashMap<String, Vec<String>>) -> Self {
        self.choice_type_paths = map;
        self
    }

    /// Register the `pathsDefinedElsewhere` map.
    pub fn with_paths_defined_elsewhere(mut self, map: HashMap<String, String>) -> Self {
        self.paths_defined_elsewhere = map;
        self
    }

    /// Register the `type2Parent` map.
    pub fn with_type_to_parent(mut self, map: HashMap<String, String>) -> Self {
        self.type2_parent = map;
        self
    }

    /// Register the `path2Type` map.
    pub fn with_path_to_type(mut self, map: HashMap<String, String>) -> Self {
        self.path2_type = map;
        self
    }

    /// Register the `path2TypeWithoutElements` map.
    pub fn with_path_to_type_without_elements(mut self, map: HashMap<String, String>) -> Self {
        self.path2_type_without_elements = map;
        self
    }
}

impl ModelProvider for InMemoryModelProvider {
    fn choice_type_paths(&self, path: &str) -> Option<&[String]> {
        self.choice_type_paths.get(path).map(|v| v.as_slice())
    }

    fn paths_defined_elsewhere(&self, path: &str) -> Option<&str> {
        self.paths_defined_elsewhere.get(path).map(|s| s.as_str())
    }

    fn type_to_parent(&self, type_name: &str) -> Option<&str> {
        self.type2_parent.get(type_name).map(|s| s.as_str())
    }

    fn path_to_type(&self, path: &str) -> Option<&str> {
        self.path2_type.get(path).map(|s| s.as_str())
    }

    fn path_to_type_without_elements(&self, path: &str) -> Option<&str> {
        self.path2_type_without_elements
            .get(path)
            .or_else(|| self.path2_type.get(path))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_provider_resolves_registered_paths() {
        let mut path2_type = HashMap::new();
        path2_type.insert("Patient.name".to_string(), "HumanName".to_string());
        let provider = InMemoryModelProvider::new().with_path_to_type(path2_type);
        assert_eq!(provider.path_to_type("Patient.name"), Some("HumanName"));
        assert_eq!(provider.path_to_type("Patient.unknown"), None);
    }

    #[test]
    fn noop_provider_never_resolves() {
        let provider = NoopModelProvider;
        assert_eq!(provider.choice_type_paths("Observation.value"), None);
        assert_eq!(provider.type_to_parent("Observation"), None);
    }
}
