// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Constructors for the built-in functions used by the translator.

use crate::{Condition, Expression};

pub fn collect(expr: Expression) -> Expression {
    Expression::function("collect", vec![expr])
}

pub fn collect_distinct(expr: Expression) -> Expression {
    Expression::Function {
        name: "collect".to_string(),
        args: vec![expr],
        distinct: true,
    }
}

pub fn head(expr: Expression) -> Expression {
    Expression::function("head", vec![expr])
}

pub fn size(expr: Expression) -> Expression {
    Expression::function("size", vec![expr])
}

pub fn count(expr: Expression) -> Expression {
    Expression::function("count", vec![expr])
}

pub fn count_star() -> Expression {
    count(Expression::Star)
}

pub fn min(expr: Expression) -> Expression {
    Expression::function("min", vec![expr])
}

pub fn max(expr: Expression) -> Expression {
    Expression::function("max", vec![expr])
}

pub fn avg(expr: Expression) -> Expression {
    Expression::function("avg", vec![expr])
}

pub fn sum(expr: Expression) -> Expression {
    Expression::function("sum", vec![expr])
}

/// `apoc.coll.<name>(list)`: the list counterparts of the aggregating functions (`min`, `max`,
/// `avg`, `sum`), usable where no aggregation is allowed.
pub fn list_aggregate(name: &str, list: Expression) -> Expression {
    Expression::function(format!("apoc.coll.{name}"), vec![list])
}

pub fn labels(expr: Expression) -> Expression {
    Expression::function("labels", vec![expr])
}

pub fn point(expr: Expression) -> Expression {
    Expression::function("point", vec![expr])
}

pub fn distance(lhs: Expression, rhs: Expression) -> Expression {
    Expression::function("point.distance", vec![lhs, rhs])
}

pub fn coalesce(expr: Expression, fallback: Expression) -> Expression {
    Expression::function("coalesce", vec![expr, fallback])
}

pub fn random_uuid() -> Expression {
    Expression::function("randomUUID", vec![])
}

pub fn to_string(expr: Expression) -> Expression {
    Expression::function("toString", vec![expr])
}

/// Temporal constructor for the current instant (`datetime()`, `date()`, `time()`, ...).
pub fn temporal_now(name: &str) -> Expression {
    Expression::function(name, vec![])
}

/// `apoc.util.validatePredicate(condition, message, [0])`: evaluates to `false` when `condition`
/// is false and aborts the statement with `message` otherwise.
pub fn validate_predicate(condition: Condition, message: &str) -> Expression {
    Expression::function(
        "apoc.util.validatePredicate",
        vec![
            Expression::condition(condition),
            Expression::string(message),
            Expression::List(vec![Expression::integer(0)]),
        ],
    )
}
