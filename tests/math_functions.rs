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

//! Coverage for arithmetic operators and the `Math` function family
//! (§4.5 "Math").

use fhirpath_core_engine::{EvaluateOptions, FhirPathEngine, FhirPathError, FhirPathValue, NoopModelProvider};
use rust_decimal::Decimal;
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

fn eval_err(engine: &FhirPathEngine, expr: &str) -> FhirPathError {
    engine
        .evaluate(FhirPathValue::Empty, expr, HashMap::new(), &EvaluateOptions::default())
        .expect_err("expected an error")
}

#[test]
fn basic_arithmetic_operators() {
    let e = engine();
    assert_eq!(eval(&e, "2 + 3"), FhirPathValue::Integer(5));
    assert_eq!(eval(&e, "5 - 2"), FhirPathValue::Integer(3));
    assert_eq!(eval(&e, "4 * 3"), FhirPathValue::Integer(12));
    assert_eq!(eval(&e, "7 div 2"), FhirPathValue::Integer(3));
    assert_eq!(eval(&e, "7 mod 2"), FhirPathValue::Integer(1));
}

#[test]
fn division_promotes_integers_to_decimal() {
    let e = engine();
    assert_eq!(eval(&e, "5 / 2"), FhirPathValue::Decimal(Decimal::new(25, 1)));
}

#[test]
fn division_by_zero_is_empty_per_fhirpath_spec() {
    let e = engine();
    assert_eq!(eval(&e, "1 / 0"), FhirPathValue::Empty);
    assert_eq!(eval(&e, "1 div 0"), FhirPathValue::Empty);
    assert_eq!(eval(&e, "1 mod 0"), FhirPathValue::Empty);
}

#[test]
fn string_concatenation_with_ampersand_treats_empty_as_blank() {
    let e = engine();
    match eval(&e, "'a' & {} & 'b'") {
        FhirPathValue::String(s) => assert_eq!(s, "ab"),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn abs_ceiling_floor_truncate() {
    let e = engine();
    assert_eq!(eval(&e, "(-5).abs()"), FhirPathValue::Decimal(Decimal::new(5, 0)));
    assert_eq!(eval(&e, "1.1.ceiling()"), FhirPathValue::Decimal(Decimal::new(2, 0)));
    assert_eq!(eval(&e, "1.9.floor()"), FhirPathValue::Decimal(Decimal::new(1, 0)));
    assert_eq!(eval(&e, "1.9.truncate()"), FhirPathValue::Decimal(Decimal::new(1, 0)));
}

#[test]
fn sqrt_of_a_perfect_square() {
    let e = engine();
    assert_eq!(eval(&e, "9.sqrt()"), FhirPathValue::Decimal(Decimal::new(3, 0)));
}

#[test]
fn sqrt_of_a_negative_number_is_empty() {
    let e = engine();
    assert_eq!(eval(&e, "(-1).sqrt()"), FhirPathValue::Empty);
}

#[test]
fn power_and_log_and_ln() {
    let e = engine();
    match eval(&e, "2.power(3)") {
        FhirPathValue::Decimal(d) => assert!((d - Decimal::new(8, 0)).abs() < Decimal::new(1, 6)),
        other => panic!("expected decimal, got {other:?}"),
    }
    match eval(&e, "100.log(10)") {
        FhirPathValue::Decimal(d) => assert!((d - Decimal::new(2, 0)).abs() < Decimal::new(1, 6)),
        other => panic!("expected decimal, got {other:?}"),
    }
}

#[test]
fn round_with_and_without_precision() {
    let e = engine();
    assert_eq!(eval(&e, "1.5.round()"), FhirPathValue::Decimal(Decimal::new(2, 0)));
    assert_eq!(eval(&e, "1.005.round(2)"), FhirPathValue::Decimal(Decimal::new(101, 2)));
}

#[test]
fn mismatched_types_in_inequality_is_a_type_error() {
    let e = engine();
    let err = eval_err(&e, "1 < 'a'");
    assert!(matches!(err, FhirPathError::TypeError { .. }));
}

#[test]
fn quantity_cross_domain_arithmetic_above_seconds_is_disallowed() {
    // Calendar `year` cannot combine with a UCUM time unit larger than a
    // second under strict arithmetic.
    let e = engine();
    let err = e.evaluate(
        FhirPathValue::Empty,
        "1 year + 1 'd'",
        HashMap::new(),
        &EvaluateOptions::default(),
    );
    assert!(err.is_err());
}
