// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Filters on aggregated property values (`node: {age_AVERAGE_GT: 30}` inside an aggregate where).

use common::value::Val;
use exo_cypher::{ArithmeticOp, Condition, Expression, Pattern, functions};
use graph_model::{field::Field, types::ScalarKind};
use indexmap::IndexMap;

use super::{WhereScope, operator::Operator, value_expression};
use crate::{
    context::QueryContext,
    error::TranslationError,
    input::{expect_object, literal},
};

/// How the property values of the related elements are reduced before the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Average,
    Sum,
    Min,
    Max,
    Shortest,
    Longest,
}

/// `_SHORTEST` and `_SHORTEST_LENGTH` mean the same thing; the `_LENGTH` forms exist only for
/// strings.
const METHODS: [(&str, Method, bool); 9] = [
    ("_AVERAGE_LENGTH", Method::Average, true),
    ("_SHORTEST_LENGTH", Method::Shortest, true),
    ("_LONGEST_LENGTH", Method::Longest, true),
    ("_AVERAGE", Method::Average, false),
    ("_SHORTEST", Method::Shortest, false),
    ("_LONGEST", Method::Longest, false),
    ("_SUM", Method::Sum, false),
    ("_MIN", Method::Min, false),
    ("_MAX", Method::Max, false),
];

const OPERATORS: [(&str, Operator); 5] = [
    ("_EQUAL", Operator::Eq),
    ("_LTE", Operator::Lte),
    ("_GTE", Operator::Gte),
    ("_LT", Operator::Lt),
    ("_GT", Operator::Gt),
];

/// A parsed `<field>_<METHOD>_<OPERATOR>` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AggregateKey<'k> {
    pub field: &'k str,
    pub method: Method,
    pub length: bool,
    pub operator: Operator,
}

pub(crate) fn parse_aggregate_key(key: &str) -> Option<AggregateKey<'_>> {
    let (rest, operator) = OPERATORS.iter().find_map(|(suffix, operator)| {
        key.strip_suffix(suffix).map(|rest| (rest, *operator))
    })?;
    METHODS.iter().find_map(|(suffix, method, length)| {
        rest.strip_suffix(suffix)
            .filter(|field| !field.is_empty())
            .map(|field| AggregateKey {
                field,
                method: *method,
                length: *length,
                operator,
            })
    })
}

/// The aggregating function for `method` over a property of `kind`, and whether it aggregates the
/// string lengths rather than the values. `None` when the combination is not offered.
pub(crate) fn aggregation_for(
    kind: &ScalarKind,
    method: Method,
    length: bool,
) -> Option<(&'static str, bool)> {
    if *kind == ScalarKind::String {
        return match method {
            Method::Average => Some(("avg", true)),
            Method::Shortest => Some(("min", true)),
            Method::Longest => Some(("max", true)),
            Method::Sum | Method::Min | Method::Max => None,
        };
    }
    if length {
        return None;
    }

    let function = match method {
        Method::Average if kind.is_numeric() || *kind == ScalarKind::Duration => "avg",
        Method::Sum if kind.is_numeric() => "sum",
        Method::Min | Method::Max
            if kind.is_numeric() || (kind.is_temporal() && *kind != ScalarKind::Date) =>
        {
            if method == Method::Min { "min" } else { "max" }
        }
        _ => return None,
    };
    Some((function, false))
}

/// The related elements an aggregate where ranges over.
pub(super) struct AggregationSource<'p> {
    pub pattern: &'p Pattern,
    /// Bound to each related node in `pattern`
    pub node: &'p str,
    /// Bound to each relationship in `pattern`, when the filter reads edge properties
    pub edge: Option<&'p str>,
    pub nested: bool,
}

impl AggregationSource<'_> {
    pub fn count(&self) -> Expression {
        if self.nested {
            functions::size(self.collected(Expression::variable(self.node)))
        } else {
            functions::count(Expression::variable(self.node))
        }
    }

    /// `function(value)` over the matched rows, or `apoc.coll.function([pattern | value])`
    /// inside a comprehension.
    pub fn aggregate(&self, function: &str, value: Expression) -> Expression {
        if self.nested {
            functions::list_aggregate(function, self.collected(value))
        } else {
            Expression::function(function, vec![value])
        }
    }

    fn collected(&self, value: Expression) -> Expression {
        Expression::pattern_comprehension(self.pattern.clone(), None, value)
    }
}

/// Whether an aggregate where (or one of its `AND`/`OR` branches) filters on edge properties.
pub(super) fn mentions_edge(object: &IndexMap<String, Val>) -> bool {
    object.iter().any(|(key, value)| match key.as_str() {
        "edge" => true,
        "AND" | "OR" => value
            .as_one_or_many()
            .into_iter()
            .filter_map(|element| element.as_object())
            .any(mentions_edge),
        _ => false,
    })
}

/// The condition for the `node` or `edge` object of an aggregate where. `variable` is the
/// element the property keys are read from.
pub(super) fn property_aggregates(
    ctx: &mut QueryContext<'_>,
    source: &AggregationSource<'_>,
    fields: &[Field],
    variable: &str,
    object: &IndexMap<String, Val>,
    scope: WhereScope,
    depth: usize,
) -> Result<Condition, TranslationError> {
    ctx.check_depth(depth)?;

    let mut condition = Condition::True;
    for (key, value) in object {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut parts = vec![];
                for element in value.as_one_or_many() {
                    parts.push(property_aggregates(
                        ctx,
                        source,
                        fields,
                        variable,
                        expect_object(element, key)?,
                        scope,
                        depth + 1,
                    )?);
                }
                if key == "AND" || parts.is_empty() {
                    Condition::conjunction(parts)
                } else {
                    Condition::disjunction(parts)
                }
            }
            _ => property_aggregate(ctx, source, fields, variable, key, value, scope)?,
        };
        condition = Condition::and(condition, part);
    }
    Ok(condition)
}

fn property_aggregate(
    ctx: &mut QueryContext<'_>,
    source: &AggregationSource<'_>,
    fields: &[Field],
    variable: &str,
    key: &str,
    value: &Val,
    scope: WhereScope,
) -> Result<Condition, TranslationError> {
    let unsupported = || TranslationError::validation(key, "not a supported aggregation filter");

    let parsed = parse_aggregate_key(key).ok_or_else(unsupported)?;
    let field = fields
        .iter()
        .find(|field| field.name == parsed.field)
        .ok_or_else(unsupported)?;
    let scalar = field.as_scalar().filter(|_| !field.is_list()).ok_or_else(unsupported)?;
    let (function, of_length) =
        aggregation_for(&scalar.kind, parsed.method, parsed.length).ok_or_else(unsupported)?;

    if value.is_null() {
        return Err(TranslationError::validation(key, "cannot compare an aggregate to null"));
    }

    let mut property = Expression::variable(variable).property(field.db_name());
    if let Some(fallback) = &scalar.coalesce {
        property = functions::coalesce(property, literal(fallback, key)?);
    }
    if of_length {
        property = functions::size(property);
    }

    let mut lhs = source.aggregate(function, property);
    let mut rhs = value_expression(ctx, value, scope, key)?;
    if scalar.kind == ScalarKind::Duration {
        let now = || functions::temporal_now("datetime");
        lhs = Expression::arithmetic(ArithmeticOp::Add, now(), lhs);
        rhs = Expression::arithmetic(
            ArithmeticOp::Add,
            now(),
            Expression::function("duration", vec![rhs]),
        );
    }

    super::operator::compare(parsed.operator, lhs, rhs).ok_or_else(unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn key_parsing() {
        let parsed = |key: &'static str| {
            parse_aggregate_key(key).map(|key| (key.field, key.method, key.length, key.operator))
        };

        assert_eq!(
            parsed("age_AVERAGE_GT"),
            Some(("age", Method::Average, false, Operator::Gt))
        );
        assert_eq!(
            parsed("name_SHORTEST_LENGTH_LTE"),
            Some(("name", Method::Shortest, true, Operator::Lte))
        );
        assert_eq!(
            parsed("name_AVERAGE_LENGTH_EQUAL"),
            Some(("name", Method::Average, true, Operator::Eq))
        );
        assert_eq!(parsed("since_MIN_GTE"), Some(("since", Method::Min, false, Operator::Gte)));
        assert_eq!(parsed("age_SUM_LT"), Some(("age", Method::Sum, false, Operator::Lt)));
        assert_eq!(parsed("age_GT"), None);
        assert_eq!(parsed("age_MAX"), None);
        assert_eq!(parsed("_MAX_GT"), None);
    }

    #[multiplatform_test]
    fn aggregations_per_kind() {
        assert_eq!(
            aggregation_for(&ScalarKind::String, Method::Longest, true),
            Some(("max", true))
        );
        assert_eq!(
            aggregation_for(&ScalarKind::String, Method::Average, false),
            Some(("avg", true))
        );
        assert_eq!(aggregation_for(&ScalarKind::String, Method::Min, false), None);
        assert_eq!(aggregation_for(&ScalarKind::Int, Method::Sum, false), Some(("sum", false)));
        assert_eq!(aggregation_for(&ScalarKind::Int, Method::Average, true), None);
        assert_eq!(aggregation_for(&ScalarKind::Int, Method::Shortest, false), None);
        assert_eq!(
            aggregation_for(&ScalarKind::DateTime, Method::Max, false),
            Some(("max", false))
        );
        assert_eq!(aggregation_for(&ScalarKind::DateTime, Method::Average, false), None);
        assert_eq!(
            aggregation_for(&ScalarKind::Duration, Method::Average, false),
            Some(("avg", false))
        );
        assert_eq!(aggregation_for(&ScalarKind::Duration, Method::Sum, false), None);
        assert_eq!(aggregation_for(&ScalarKind::Id, Method::Min, false), None);
        assert_eq!(aggregation_for(&ScalarKind::Boolean, Method::Max, false), None);
    }
}
