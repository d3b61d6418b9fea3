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

//! Coverage for the `to*`/`convertsTo*` conversion family (§4.3), the
//! temporal functions `now`/`today`/`timeOfDay` (§4.5 "Temporal"), and
//! `is`/`as`/`ofType`/`type` (§4.5 "Type").

use fhirpath_core_engine::{EvaluateOptions, FhirPathEngine, FhirPathValue, NoopModelProvider};
use rust_decimal::Decimal;
use rstest::rstest;
use std::collections::HashMap;
use std::sync::Arc;

fn engine() -> FhirPathEngine {
    FhirPathEngine::new(Arc::new(NoopModelProvider))
}

fn eval(engine: &FhirPathEngine, expr: &str) -> FhirPathValue {
    engine
        .evaluate(FhirPathValue::Empty, expr, HashMap::new(), &EvaluateOptions::default())
        .unwrap_or_else(|e| panic!("evaluating `{expr}` failed: {e}"))
}

#[test]
fn boolean_numeric_conversion_round_trip() {
    let e = engine();
    assert_eq!(eval(&e, "true.toInteger()"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "false.toInteger()"), FhirPathValue::Integer(0));
    assert_eq!(eval(&e, "1.toBoolean()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "0.toBoolean()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "2.toBoolean()"), FhirPathValue::Empty);
}

#[rstest]
#[case::true_literal("true", true)]
#[case::t_abbrev("T", true)]
#[case::yes("yes", true)]
#[case::y_abbrev("Y", true)]
#[case::one("1", true)]
#[case::one_point_zero("1.0", true)]
#[case::false_literal("false", false)]
#[case::f_abbrev("F", false)]
#[case::no("no", false)]
#[case::n_abbrev("N", false)]
#[case::zero("0", false)]
#[case::zero_point_zero("0.0", false)]
fn string_to_boolean_accepts_the_documented_tokens(#[case] token: &str, #[case] expected: bool) {
    let e = engine();
    let expr = format!("'{token}'.toBoolean()");
    assert_eq!(eval(&e, &expr), FhirPathValue::Boolean(expected), "expr = {expr}");
}

#[test]
fn string_to_boolean_rejects_unrecognized_tokens() {
    let e = engine();
    assert_eq!(eval(&e, "'maybe'.toBoolean()"), FhirPathValue::Empty);
}

#[test]
fn to_integer_to_decimal_to_string() {
    let e = engine();
    assert_eq!(eval(&e, "'42'.toInteger()"), FhirPathValue::Integer(42));
    assert_eq!(eval(&e, "'3.14'.toDecimal()"), FhirPathValue::Decimal(Decimal::new(314, 2)));
    assert_eq!(eval(&e, "42.toString()"), FhirPathValue::String("42".to_string()));
    assert_eq!(eval(&e, "'not a number'.toInteger()"), FhirPathValue::Empty);
}

#[test]
fn to_quantity_defaults_unit_to_dimensionless() {
    let e = engine();
    match eval(&e, "'5'.toQuantity()") {
        FhirPathValue::Quantity(q) => assert_eq!(q.value, Decimal::from(5)),
        other => panic!("expected quantity, got {other:?}"),
    }
    assert_eq!(eval(&e, "'5'.toQuantity() = 5 '1'"), FhirPathValue::Boolean(true));
}

#[test]
fn converts_to_predicates_never_error_on_bad_input() {
    let e = engine();
    assert_eq!(eval(&e, "'not a number'.convertsToInteger()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "'42'.convertsToInteger()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "true.convertsToBoolean()"), FhirPathValue::Boolean(true));
}

#[test]
fn conversion_on_a_multi_item_collection_errors() {
    let e = engine();
    let err = e.evaluate(
        FhirPathValue::Empty,
        "(1 | 2).toInteger()",
        HashMap::new(),
        &EvaluateOptions::default(),
    );
    assert!(err.is_err());
}

#[test]
fn conversion_on_empty_is_empty_not_an_error() {
    let e = engine();
    assert_eq!(eval(&e, "{}.toInteger()"), FhirPathValue::Empty);
    assert_eq!(eval(&e, "{}.toString()"), FhirPathValue::Empty);
}

#[test]
fn now_today_and_time_of_day_produce_singleton_temporal_values() {
    let e = engine();
    assert_eq!(eval(&e, "now().count()"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "today().count()"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "timeOfDay().count()"), FhirPathValue::Integer(1));
    assert!(matches!(eval(&e, "now()"), FhirPathValue::DateTime(_)));
    assert!(matches!(eval(&e, "today()"), FhirPathValue::Date(_)));
    assert!(matches!(eval(&e, "timeOfDay()"), FhirPathValue::Time(_)));
}

#[test]
fn now_is_stable_within_a_single_evaluation() {
    // A single top-level evaluation must observe one "now" snapshot, not a
    // fresh clock read per call.
    let e = engine();
    assert_eq!(eval(&e, "(now() = now())"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(today() = today())"), FhirPathValue::Boolean(true));
}

#[test]
fn is_and_as_over_system_primitive_types() {
    let e = engine();
    assert_eq!(eval(&e, "1 is Integer"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "1 is String"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "1 as Integer"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "'x' as Integer"), FhirPathValue::Empty);
}

#[test]
fn of_type_filters_a_collection_by_system_type() {
    let e = engine();
    let result = eval(&e, "(1 | 'a' | 2 | true).ofType(Integer)");
    assert_eq!(result.to_vec(), vec![FhirPathValue::Integer(1), FhirPathValue::Integer(2)]);
}

#[test]
fn type_reflection_reports_a_system_type_info_object() {
    let e = engine();
    match eval(&e, "1.type()") {
        FhirPathValue::TypeInfoObject { namespace, name } => {
            assert_eq!(namespace, "System");
            assert_eq!(name, "Integer");
        }
        other => panic!("expected TypeInfoObject, got {other:?}"),
    }
}
