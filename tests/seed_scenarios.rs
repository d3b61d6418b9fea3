// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end evaluation scenarios exercising the parser, compiler,
//! evaluator, and standard-library registry together. Mirrors the seed
//! scenarios and universal invariants this engine is meant to uphold.

use fhirpath_core_engine::model::ResourceNode;
use fhirpath_core_engine::{
    EvaluateOptions, FhirPathEngine, FhirPathValue, InMemoryModelProvider, NoopModelProvider,
};
use std::collections::HashMap;
use std::sync::Arc;

fn engine() -> FhirPathEngine {
    FhirPathEngine::new(Arc::new(NoopModelProvider))
}

fn patient_node(resource: serde_json::Value) -> FhirPathValue {
    let resource_type = resource["resourceType"].as_str().unwrap_or("Patient").to_string();
    FhirPathValue::Resource(ResourceNode::root(resource, resource_type))
}

fn eval(engine: &FhirPathEngine, resource: FhirPathValue, expr: &str) -> FhirPathValue {
    engine
        .evaluate(resource, expr, HashMap::new(), &EvaluateOptions::default())
        .unwrap_or_else(|e| panic!("evaluating `{expr}` failed: {e}"))
}

fn strings(value: &FhirPathValue) -> Vec<String> {
    value
        .to_vec()
        .into_iter()
        .map(|v| match v {
            FhirPathValue::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        })
        .collect()
}

#[test]
fn given_names_flatten_across_repeating_name_entries() {
    let e = engine();
    let resource = patient_node(serde_json::json!({
        "resourceType": "Patient",
        "name": [{"given": ["Alice", "A."]}, {"given": ["Bob"]}]
    }));
    let result = eval(&e, resource, "Patient.name.given");
    assert_eq!(strings(&result), vec!["Alice", "A.", "Bob"]);
}

#[test]
fn where_use_official_then_first_given() {
    let e = engine();
    let resource = patient_node(serde_json::json!({
        "resourceType": "Patient",
        "name": [
            {"use": "usual", "given": ["Bobby"]},
            {"use": "official", "given": ["Robert", "Bob"]}
        ]
    }));
    let result = eval(
        &e,
        resource,
        "Patient.name.where(use='official').given.first()",
    );
    assert_eq!(strings(&result), vec!["Robert"]);
}

#[test]
fn empty_navigation_over_any_path_is_empty() {
    let e = engine();
    for path in ["X", "Patient.name.given", "foo.bar.baz"] {
        let expr = format!("{{}}.{path}");
        let result = eval(&e, FhirPathValue::Empty, &expr);
        assert_eq!(result, FhirPathValue::Empty, "expr = {expr}");
    }
}

#[test]
fn distinct_count_over_a_union_literal() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "(1 | 2 | 2 | 3).distinct().count()");
    assert_eq!(result, FhirPathValue::Integer(3));
}

#[test]
fn distinct_is_idempotent() {
    let e = engine();
    let once = eval(&e, FhirPathValue::Empty, "(1 | 2 | 2 | 3 | 1).distinct()");
    let twice = eval(&e, once.clone(), "$this.distinct()");
    assert_eq!(once, twice);
}

#[test]
fn union_is_commutative_up_to_set_equality() {
    let e = engine();
    let ab = eval(&e, FhirPathValue::Empty, "(1 | 2 | 3).distinct()");
    let ba = eval(&e, FhirPathValue::Empty, "(3 | 2 | 1).distinct()");
    let mut ab_sorted = ab.to_vec();
    let mut ba_sorted = ba.to_vec();
    let key = |v: &FhirPathValue| match v {
        FhirPathValue::Integer(i) => *i,
        _ => panic!("expected integer"),
    };
    ab_sorted.sort_by_key(key);
    ba_sorted.sort_by_key(key);
    assert_eq!(ab_sorted, ba_sorted);
}

#[test]
fn iif_only_evaluates_the_chosen_branch() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "iif({}.exists(), 'a', 'b')");
    assert_eq!(strings(&result), vec!["b"]);
}

#[test]
fn iif_does_not_evaluate_the_untaken_else_branch() {
    let e = engine();
    // The `else` branch divides by zero; if `iif` eagerly evaluated both
    // branches this would raise a domain error instead of returning 'a'.
    let result = eval(&e, FhirPathValue::Empty, "iif(true, 'a', (1/0).toString())");
    assert_eq!(strings(&result), vec!["a"]);
}

#[test]
fn quantity_equality_across_ucum_units() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "3 'min' = 180 's'");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn quantity_calendar_ucum_boundary_empty_under_strict_equality() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "1 year = 12 month");
    assert_eq!(result, FhirPathValue::Empty);
}

#[test]
fn quantity_calendar_ucum_boundary_true_under_equivalence() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "1 year ~ 12 month");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn quantity_arithmetic_across_ucum_units_matches_calendar_minutes() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "3 'min' + 120 's' = 5 'min'");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn date_equality_with_mismatched_precision_is_empty() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "@2012 = @2012-01");
    assert_eq!(result, FhirPathValue::Empty);
}

#[test]
fn date_equivalence_reflexivity_on_non_empty_collections() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "@2012-01-01 ~ @2012-01-01");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn equivalence_of_two_empty_collections_is_true() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "{} ~ {}");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn equality_of_two_empty_collections_is_empty() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "{} = {}");
    assert_eq!(result, FhirPathValue::Empty);
}

#[test]
fn three_valued_logic_table() {
    let e = engine();
    assert_eq!(eval(&e, FhirPathValue::Empty, "{} or true"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, FhirPathValue::Empty, "{} or false"), FhirPathValue::Empty);
    assert_eq!(
        eval(&e, FhirPathValue::Empty, "{} and false"),
        FhirPathValue::Boolean(false)
    );
    assert_eq!(eval(&e, FhirPathValue::Empty, "{} and true"), FhirPathValue::Empty);
    assert_eq!(eval(&e, FhirPathValue::Empty, "{} xor true"), FhirPathValue::Empty);
    assert_eq!(eval(&e, FhirPathValue::Empty, "{} xor false"), FhirPathValue::Empty);
}

#[test]
fn implies_with_empty_antecedent_and_true_consequent_is_true() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "{} implies true");
    assert_eq!(result, FhirPathValue::Boolean(true));
}

#[test]
fn repeat_terminates_on_a_cyclic_parent_child_structure() {
    let e = engine();
    // Questionnaire.item.item recursion: repeat(item) must not loop forever
    // and must dedup on the fixed point.
    let resource = patient_node(serde_json::json!({
        "resourceType": "Questionnaire",
        "item": [
            {"linkId": "1", "item": [{"linkId": "1.1"}, {"linkId": "1.2"}]},
            {"linkId": "2"}
        ]
    }));
    let result = eval(&e, resource, "Questionnaire.repeat(item).linkId");
    let mut got = strings(&result);
    got.sort();
    assert_eq!(got, vec!["1", "1.1", "1.2", "2"]);
}

#[test]
fn base64_round_trips_through_encode_and_decode() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "'hello world'.encode('base64').decode('base64')");
    assert_eq!(strings(&result), vec!["hello world"]);
}

#[test]
fn aggregate_index_is_observed_strictly_increasing_from_zero() {
    let e = engine();
    let result = eval(
        &e,
        FhirPathValue::Empty,
        "(10 | 20 | 30).aggregate($total + iif($index = 0, 100, iif($index = 1, 10, 1)), 0)",
    );
    // index 0 contributes 100, index 1 contributes 10, index 2 contributes 1.
    assert_eq!(result, FhirPathValue::Integer(111));
}

#[test]
fn aggregate_sees_the_running_total_inside_the_lambda() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "(1 | 2 | 3 | 4).aggregate($total + $this, 0)");
    assert_eq!(result, FhirPathValue::Integer(10));
}

#[test]
fn single_singleton_error_on_multi_item_collection() {
    let e = engine();
    let err = e.evaluate(
        FhirPathValue::Empty,
        "(1 | 2).single()",
        HashMap::new(),
        &EvaluateOptions::default(),
    );
    assert!(matches!(err, Err(fhirpath_core_engine::FhirPathError::SingletonError { .. })));
}

#[test]
fn choice_type_probe_resolves_value_x_to_its_concrete_suffix() {
    let mut choice_type_paths = HashMap::new();
    choice_type_paths.insert(
        "Observation.value".to_string(),
        vec!["Quantity".to_string(), "CodeableConcept".to_string(), "string".to_string()],
    );
    let mut path_to_type = HashMap::new();
    path_to_type.insert("Observation.valueQuantity.value".to_string(), "decimal".to_string());
    let model = InMemoryModelProvider::new()
        .with_choice_type_paths(choice_type_paths)
        .with_path_to_type_without_elements(path_to_type);
    let e = FhirPathEngine::new(Arc::new(model));
    let resource = patient_node(serde_json::json!({
        "resourceType": "Observation",
        "valueQuantity": {"value": 5, "unit": "mg"}
    }));
    let result = eval(&e, resource, "(Observation.value as Quantity).value");
    assert_eq!(result, FhirPathValue::Decimal(rust_decimal::Decimal::from(5)));
}

#[test]
fn define_variable_propagates_without_mutating_the_input_collection() {
    let e = engine();
    let result = eval(
        &e,
        FhirPathValue::Empty,
        "(1 | 2 | 3).defineVariable('x', 10).select($this + %x)",
    );
    assert_eq!(result.to_vec(), vec![
        FhirPathValue::Integer(11),
        FhirPathValue::Integer(12),
        FhirPathValue::Integer(13),
    ]);
}

#[test]
fn trace_returns_its_input_unchanged() {
    let e = engine();
    let result = eval(&e, FhirPathValue::Empty, "(1 | 2 | 3).trace('debug')");
    assert_eq!(
        result.to_vec(),
        vec![FhirPathValue::Integer(1), FhirPathValue::Integer(2), FhirPathValue::Integer(3)]
    );
}

#[test]
fn syntax_errors_accumulate_every_diagnostic() {
    let e = engine();
    let err = e.parse("Patient..name(");
    match err {
        Err(fhirpath_core_engine::FhirPathError::SyntaxError(diags)) => {
            assert!(!diags.is_empty());
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}
