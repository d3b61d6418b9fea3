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

//! Coverage for the string-function family (§4.5 "String").

use fhirpath_core_engine::{EvaluateOptions, FhirPathEngine, FhirPathValue, NoopModelProvider};
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

fn one_string(engine: &FhirPathEngine, expr: &str) -> String {
    match eval(engine, expr) {
        FhirPathValue::String(s) => s,
        other => panic!("expected a single string from `{expr}`, got {other:?}"),
    }
}

#[test]
fn index_of_finds_a_substring() {
    let e = engine();
    assert_eq!(eval(&e, "'abcdefg'.indexOf('cd')"), FhirPathValue::Integer(2));
    assert_eq!(eval(&e, "'abcdefg'.indexOf('xyz')"), FhirPathValue::Integer(-1));
}

#[test]
fn substring_with_and_without_length() {
    let e = engine();
    assert_eq!(one_string(&e, "'abcdefg'.substring(3)"), "defg");
    assert_eq!(one_string(&e, "'abcdefg'.substring(1, 3)"), "bcd");
}

#[test]
fn starts_with_ends_with_contains() {
    let e = engine();
    assert_eq!(eval(&e, "'abcdefg'.startsWith('abc')"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "'abcdefg'.endsWith('efg')"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "'abcdefg'.contains('cde')"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "'abcdefg'.contains('xyz')"), FhirPathValue::Boolean(false));
}

#[test]
fn upper_and_lower() {
    let e = engine();
    assert_eq!(one_string(&e, "'AbCdEfG'.upper()"), "ABCDEFG");
    assert_eq!(one_string(&e, "'AbCdEfG'.lower()"), "abcdefg");
}

#[test]
fn replace_substitutes_every_occurrence() {
    let e = engine();
    assert_eq!(one_string(&e, "'abcabc'.replace('a', 'X')"), "XbcXbc");
}

#[test]
fn matches_and_replace_matches_use_regex() {
    let e = engine();
    assert_eq!(eval(&e, "'abc123'.matches('[a-z]+[0-9]+')"), FhirPathValue::Boolean(true));
    assert_eq!(one_string(&e, "'abc123'.replaceMatches('[0-9]+', 'N')"), "abcN");
}

#[test]
fn matches_dotall_behavior_across_newlines() {
    // FHIRPath `matches` uses single-line (dotAll) semantics: `.` matches `\n`.
    let e = engine();
    assert_eq!(eval(&e, "'a\nb'.matches('a.b')"), FhirPathValue::Boolean(true));
}

#[test]
fn length_counts_characters() {
    let e = engine();
    assert_eq!(eval(&e, "'abcdefg'.length()"), FhirPathValue::Integer(7));
}

#[test]
fn to_chars_splits_into_single_character_strings() {
    let e = engine();
    let result = eval(&e, "'abc'.toChars()");
    let chars: Vec<String> = result
        .to_vec()
        .into_iter()
        .map(|v| match v {
            FhirPathValue::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        })
        .collect();
    assert_eq!(chars, vec!["a", "b", "c"]);
}

#[test]
fn split_and_join_round_trip() {
    let e = engine();
    assert_eq!(one_string(&e, "('a,b,c'.split(',')).join(';')"), "a;b;c");
}

#[test]
fn join_with_no_separator_concatenates() {
    let e = engine();
    assert_eq!(one_string(&e, "('a' | 'b' | 'c').join()"), "abc");
}

#[test]
fn trim_strips_leading_and_trailing_whitespace() {
    let e = engine();
    assert_eq!(one_string(&e, "'  hi there  '.trim()"), "hi there");
}

#[test]
fn base64_and_hex_encode_decode() {
    let e = engine();
    assert_eq!(one_string(&e, "'abc'.encode('hex')"), "616263");
    assert_eq!(one_string(&e, "'616263'.decode('hex')"), "abc");
    assert_eq!(one_string(&e, "'hello'.encode('base64').decode('base64')"), "hello");
}

#[test]
fn decode_hex_with_odd_length_is_a_domain_error() {
    let e = engine();
    let err = e.evaluate(
        FhirPathValue::Empty,
        "'abc'.decode('hex')",
        HashMap::new(),
        &EvaluateOptions::default(),
    );
    assert!(err.is_err(), "odd-length hex should fail to decode");
}

#[test]
fn string_functions_on_empty_input_are_nullable() {
    let e = engine();
    assert_eq!(eval(&e, "{}.upper()"), FhirPathValue::Empty);
    assert_eq!(eval(&e, "{}.substring(1)"), FhirPathValue::Empty);
    assert_eq!(eval(&e, "{}.length()"), FhirPathValue::Empty);
}
