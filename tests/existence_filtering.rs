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

//! Coverage for existence/filtering/combining functions (§4.5 "Existence",
//! "Filtering/projection", "Combining").

use fhirpath_core_engine::{EvaluateOptions, FhirPathEngine, FhirPathValue, NoopModelProvider};
use pretty_assertions::assert_eq;
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

fn ints(value: &FhirPathValue) -> Vec<i64> {
    value
        .to_vec()
        .into_iter()
        .map(|v| match v {
            FhirPathValue::Integer(i) => i,
            other => panic!("expected integer, got {other:?}"),
        })
        .collect()
}

#[test]
fn empty_reports_true_only_for_the_empty_collection() {
    let e = engine();
    assert_eq!(eval(&e, "{}.empty()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(1).empty()"), FhirPathValue::Boolean(false));
}

#[test]
fn exists_with_and_without_a_criteria_expression() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2 | 3).exists()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "{}.exists()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "(1 | 2 | 3).exists($this > 2)"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(1 | 2 | 3).exists($this > 5)"), FhirPathValue::Boolean(false));
}

#[test]
fn all_requires_every_item_to_satisfy_the_criteria() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2 | 3).all($this > 0)"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(1 | 2 | 3).all($this > 1)"), FhirPathValue::Boolean(false));
    // vacuously true over the empty collection.
    assert_eq!(eval(&e, "{}.all($this > 1)"), FhirPathValue::Boolean(true));
}

#[test]
fn all_true_any_true_all_false_any_false() {
    let e = engine();
    assert_eq!(eval(&e, "(true | true).allTrue()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(true | false).allTrue()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "(false | true).anyTrue()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(false | false).anyTrue()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "(false | false).allFalse()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(true | false).anyFalse()"), FhirPathValue::Boolean(true));
}

#[test]
fn subset_of_and_superset_of() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2).subsetOf(1 | 2 | 3)"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(1 | 4).subsetOf(1 | 2 | 3)"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "(1 | 2 | 3).supersetOf(1 | 2)"), FhirPathValue::Boolean(true));
}

#[test]
fn is_distinct_and_distinct_over_duplicates() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2 | 3).isDistinct()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "(1 | 1 | 2).isDistinct()"), FhirPathValue::Boolean(false));
    assert_eq!(ints(&eval(&e, "(3 | 1 | 1 | 2).distinct()")), vec![3, 1, 2]);
}

#[test]
fn count_over_empty_and_populated_collections() {
    let e = engine();
    assert_eq!(eval(&e, "{}.count()"), FhirPathValue::Integer(0));
    assert_eq!(eval(&e, "(1 | 2 | 3).count()"), FhirPathValue::Integer(3));
}

#[test]
fn where_filters_by_criteria_preserving_order() {
    let e = engine();
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3 | 4).where($this > 2)")), vec![3, 4]);
}

#[test]
fn select_projects_and_flattens() {
    let e = engine();
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3).select($this * 2)")), vec![2, 4, 6]);
}

#[test]
fn first_last_tail_skip_take() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2 | 3).first()"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "(1 | 2 | 3).last()"), FhirPathValue::Integer(3));
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3).tail()")), vec![2, 3]);
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3 | 4).skip(2)")), vec![3, 4]);
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3 | 4).take(2)")), vec![1, 2]);
}

#[test]
fn single_returns_the_sole_item_or_empty() {
    let e = engine();
    assert_eq!(eval(&e, "(42).single()"), FhirPathValue::Integer(42));
    assert_eq!(eval(&e, "{}.single()"), FhirPathValue::Empty);
}

#[test]
fn union_deduplicates_combine_does_not() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2).union(2 | 3).count()"), FhirPathValue::Integer(3));
    assert_eq!(eval(&e, "(1 | 2).combine(2 | 3).count()"), FhirPathValue::Integer(4));
}

#[test]
fn intersect_and_exclude() {
    let e = engine();
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3).intersect(2 | 3 | 4)")), vec![2, 3]);
    assert_eq!(ints(&eval(&e, "(1 | 2 | 3).exclude(2)")), vec![1, 3]);
}

#[test]
fn sum_min_max_avg_aggregate_shorthands() {
    let e = engine();
    assert_eq!(eval(&e, "(1 | 2 | 3 | 4).sum()"), FhirPathValue::Integer(10));
    assert_eq!(eval(&e, "(3 | 1 | 4).min()"), FhirPathValue::Integer(1));
    assert_eq!(eval(&e, "(3 | 1 | 4).max()"), FhirPathValue::Integer(4));
}

#[test]
fn not_negates_a_singleton_boolean() {
    let e = engine();
    assert_eq!(eval(&e, "true.not()"), FhirPathValue::Boolean(false));
    assert_eq!(eval(&e, "false.not()"), FhirPathValue::Boolean(true));
    assert_eq!(eval(&e, "{}.not()"), FhirPathValue::Empty);
}
