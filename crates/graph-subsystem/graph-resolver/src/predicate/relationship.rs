// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{
    Clause, Condition, Expression, NodePattern, Projection, Quantifier, ReturnItem, Statement,
};
use graph_model::{
    entity::EntityId,
    field::{Field, RelationField},
};
use indexmap::IndexMap;

use super::{
    PredicateOutput, WhereScope,
    aggregate::{AggregationSource, mentions_edge, property_aggregates},
    compile_fields, compile_where,
    operator::Operator,
    value_expression,
};
use crate::{
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::{related, target_labels},
};

fn quantifier(
    field: &Field,
    key: &str,
    operator: Operator,
) -> Result<Quantifier, TranslationError> {
    let quantifier = match operator {
        Operator::Eq | Operator::Some => Quantifier::Any,
        Operator::Not | Operator::None => Quantifier::None,
        Operator::All => Quantifier::All,
        Operator::Single => Quantifier::Single,
        _ => {
            return Err(TranslationError::validation(
                key,
                "operator not supported on relationships",
            ));
        }
    };

    let explicit = matches!(
        operator,
        Operator::Some | Operator::All | Operator::None | Operator::Single
    );
    if explicit && !field.is_list() {
        return Err(TranslationError::validation(
            key,
            format!("{} is not a list relationship", field.name),
        ));
    }
    Ok(quantifier)
}

/// `friends_SOME: {...}` and friends.
#[allow(clippy::too_many_arguments)]
pub(super) fn relation_condition(
    ctx: &mut QueryContext<'_>,
    field: &Field,
    relation: &RelationField,
    variable: &str,
    key: &str,
    operator: Operator,
    value: &Val,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let quantifier = quantifier(field, key, operator)?;
    let labels = target_labels(ctx.system, relation.target);

    if value.is_null() {
        let exists = Condition::exists(
            related(variable, relation, None, NodePattern::anonymous(labels)),
            Condition::True,
        );
        return match operator {
            Operator::Eq => Ok(PredicateOutput::new(!exists)),
            Operator::Not => Ok(PredicateOutput::new(exists)),
            _ => Err(TranslationError::validation(
                key,
                "null may only be compared for equality",
            )),
        };
    }

    let inner = ctx.next_variable();
    let nested = compile_where(
        ctx,
        relation.target,
        &inner,
        value,
        scope.nested(),
        depth + 1,
    )?;

    let list = Expression::pattern_comprehension(
        related(
            variable,
            relation,
            None,
            NodePattern::new(&inner, labels.clone()),
        ),
        None,
        Expression::variable(&inner),
    );
    let quantified = Condition::quantified(quantifier, &inner, list, nested.condition);

    let condition = if quantifier == Quantifier::All {
        // `all` holds vacuously over an empty list
        Condition::and(
            Condition::exists(
                related(variable, relation, None, NodePattern::anonymous(labels)),
                Condition::True,
            ),
            quantified,
        )
    } else {
        quantified
    };

    Ok(PredicateOutput {
        condition,
        subqueries: nested.subqueries,
    })
}

/// `friendsConnection_SOME: {node: {...}, edge: {...}}` and friends.
#[allow(clippy::too_many_arguments)]
pub(super) fn connection_condition(
    ctx: &mut QueryContext<'_>,
    relation_field: &Field,
    variable: &str,
    key: &str,
    operator: Operator,
    value: &Val,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let relation = relation_field.as_relation().ok_or_else(|| {
        TranslationError::Generic(format!("{} is not a relation", relation_field.name))
    })?;
    let quantifier = quantifier(relation_field, key, operator)?;

    if value.is_null() {
        return relation_condition(
            ctx,
            relation_field,
            relation,
            variable,
            key,
            operator,
            value,
            scope,
            depth,
        );
    }

    let rel_variable = ctx.next_variable();
    let node_variable = ctx.next_variable();
    let inner = compile_connection_where(
        ctx,
        relation,
        relation.target,
        &rel_variable,
        &node_variable,
        expect_object(value, key)?,
        scope.nested(),
        depth + 1,
    )?;

    let pattern = related(
        variable,
        relation,
        Some(&rel_variable),
        NodePattern::new(&node_variable, target_labels(ctx.system, relation.target)),
    );

    let condition = match quantifier {
        Quantifier::Any => Condition::exists(pattern, inner.condition),
        Quantifier::None => !Condition::exists(pattern, inner.condition),
        Quantifier::All => Condition::and(
            Condition::exists(pattern.clone(), inner.condition.clone()),
            !Condition::exists(pattern, !inner.condition),
        ),
        Quantifier::Single => {
            let matches = Expression::pattern_comprehension(
                pattern,
                Some(inner.condition),
                Expression::integer(1),
            );
            Condition::quantified(Quantifier::Single, ctx.next_variable(), matches, Condition::True)
        }
    };

    Ok(PredicateOutput {
        condition,
        subqueries: inner.subqueries,
    })
}

/// A connection where (`node`, `node_NOT`, `edge`, `edge_NOT`, `AND`, `OR`, `_on`) over a bound
/// relationship and node.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compile_connection_where(
    ctx: &mut QueryContext<'_>,
    relation: &RelationField,
    target: EntityId,
    rel_variable: &str,
    node_variable: &str,
    object: &IndexMap<String, Val>,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;

    let mut output = PredicateOutput::default();
    for (key, value) in object {
        let part = match key.as_str() {
            "node" | "node_NOT" => {
                let node = compile_where(ctx, target, node_variable, value, scope, depth + 1)?;
                if key == "node_NOT" { node.negate() } else { node }
            }
            "_on" => {
                let on = Val::Object(IndexMap::from([("_on".to_string(), value.clone())]));
                compile_where(ctx, target, node_variable, &on, scope, depth + 1)?
            }
            "edge" | "edge_NOT" => {
                let properties = relation.properties.ok_or_else(|| {
                    TranslationError::validation(key, "relationship has no properties")
                })?;
                let edge = compile_fields(
                    ctx,
                    &system.relationship_properties(properties).fields,
                    rel_variable,
                    expect_object(value, key)?,
                    scope,
                    depth + 1,
                )?;
                if key == "edge_NOT" { edge.negate() } else { edge }
            }
            "AND" | "OR" => {
                let elements = value.as_one_or_many();
                let mut combined = PredicateOutput::new(Condition::from(key == "AND"));
                if elements.is_empty() {
                    combined = PredicateOutput::default();
                }
                for element in elements {
                    let element = compile_connection_where(
                        ctx,
                        relation,
                        target,
                        rel_variable,
                        node_variable,
                        expect_object(element, key)?,
                        scope,
                        depth + 1,
                    )?;
                    combined = if key == "AND" {
                        combined.and(element)
                    } else {
                        combined.or(element)
                    };
                }
                combined
            }
            _ => {
                return Err(TranslationError::validation(
                    key,
                    "expected node, edge, AND, OR or _on",
                ));
            }
        };
        output = output.and(part);
    }
    Ok(output)
}

/// `friendsAggregate: {count_GT: 2, node: {age_AVERAGE_GT: 30}, edge: {since_MIN_LT: 2000}}`.
///
/// At the top level the aggregation runs in a precomputed subquery returning a boolean column;
/// inside a comprehension or `EXISTS` it is inlined over a pattern comprehension
/// (`size([pattern | node])`, `apoc.coll.avg([pattern | node.age])`).
pub(super) fn aggregate_condition(
    ctx: &mut QueryContext<'_>,
    relation: &RelationField,
    variable: &str,
    key: &str,
    value: &Val,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    ctx.check_depth(depth)?;

    let object = expect_object(value, key)?;
    let node_variable = ctx.next_variable();
    let edge_variable = mentions_edge(object).then(|| ctx.next_variable());
    let pattern = related(
        variable,
        relation,
        edge_variable.as_deref(),
        NodePattern::new(&node_variable, target_labels(ctx.system, relation.target)),
    );
    let source = AggregationSource {
        pattern: &pattern,
        node: &node_variable,
        edge: edge_variable.as_deref(),
        nested: scope.nested,
    };

    let condition = aggregate_input_condition(ctx, relation, &source, object, scope, depth)?;

    if scope.nested {
        return Ok(PredicateOutput::new(condition));
    }

    let result = ctx.next_name("var");
    let subquery = Statement::new()
        .then(Clause::with_variables(&[variable]))
        .then(Clause::matching(pattern.clone(), Condition::True))
        .then(Clause::Return(Projection::new(vec![ReturnItem::aliased(
            Expression::condition(condition),
            &result,
        )])));

    Ok(PredicateOutput {
        condition: Condition::Eq(Expression::variable(result), Expression::boolean(true)),
        subqueries: vec![subquery],
    })
}

fn aggregate_input_condition(
    ctx: &mut QueryContext<'_>,
    relation: &RelationField,
    source: &AggregationSource<'_>,
    object: &IndexMap<String, Val>,
    scope: WhereScope,
    depth: usize,
) -> Result<Condition, TranslationError> {
    ctx.check_depth(depth)?;

    let system = ctx.system;
    let mut condition = Condition::True;
    for (key, value) in object {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut parts = vec![];
                for element in value.as_one_or_many() {
                    parts.push(aggregate_input_condition(
                        ctx,
                        relation,
                        source,
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
            "count" | "count_EQ" | "count_LT" | "count_LTE" | "count_GT" | "count_GTE" => {
                if value.as_i64().is_none() {
                    return Err(TranslationError::validation(key, "expected an integer"));
                }
                let rhs = value_expression(ctx, value, scope, key)?;
                let lhs = source.count();
                match key.as_str() {
                    "count_LT" => Condition::Lt(lhs, rhs),
                    "count_LTE" => Condition::Lte(lhs, rhs),
                    "count_GT" => Condition::Gt(lhs, rhs),
                    "count_GTE" => Condition::Gte(lhs, rhs),
                    _ => Condition::Eq(lhs, rhs),
                }
            }
            "node" => {
                if matches!(relation.target, EntityId::Union(_)) {
                    return Err(TranslationError::validation(
                        key,
                        "union members cannot be aggregated",
                    ));
                }
                property_aggregates(
                    ctx,
                    source,
                    system.entity(relation.target).fields(),
                    source.node,
                    expect_object(value, key)?,
                    scope,
                    depth + 1,
                )?
            }
            "edge" => {
                let (Some(properties), Some(edge)) = (relation.properties, source.edge) else {
                    return Err(TranslationError::validation(
                        key,
                        "the relationship has no properties",
                    ));
                };
                property_aggregates(
                    ctx,
                    source,
                    &system.relationship_properties(properties).fields,
                    edge,
                    expect_object(value, key)?,
                    scope,
                    depth + 1,
                )?
            }
            _ => {
                return Err(TranslationError::validation(
                    key,
                    "expected count, node, edge, AND or OR",
                ));
            }
        };
        condition = Condition::and(condition, part);
    }
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        predicate::match_and_filter,
        test_support::{entity_id, render, val, with_context},
    };
    use exo_cypher::Pattern;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn compile(where_: serde_json::Value, scope: WhereScope) -> (String, PredicateOutput) {
        with_context(&AuthContext::anonymous(), |ctx| {
            let person = entity_id(ctx.system, "Person");
            let output = compile_where(ctx, person, "this", &val(where_), scope, 0).unwrap();
            (render(&output.condition).0, output)
        })
    }

    #[multiplatform_test]
    fn quantifiers() {
        let (cypher, _) = compile(json!({"friends_ALL": {"age_GT": 1}}), WhereScope::default());
        assert_eq!(
            cypher,
            "(EXISTS { MATCH (this)-[:FRIEND_OF]->(:Person) } AND all(this0 IN [(this)-[:FRIEND_OF]->(this0:Person) | this0] WHERE this0.age > $param1))"
        );

        let (cypher, _) = compile(json!({"friends_NONE": {}}), WhereScope::default());
        assert_eq!(
            cypher,
            "none(this0 IN [(this)-[:FRIEND_OF]->(this0:Person) | this0] WHERE true)"
        );

        let (cypher, _) = compile(json!({"bestFriend": null}), WhereScope::default());
        assert_eq!(cypher, "NOT(EXISTS { MATCH (this)-[:BEST_FRIEND]->(:Person) })");

        let (cypher, _) = compile(json!({"bestFriend_NOT": {"name": "x"}}), WhereScope::default());
        assert_eq!(
            cypher,
            "none(this0 IN [(this)-[:BEST_FRIEND]->(this0:Person) | this0] WHERE this0.name = $param1)"
        );
    }

    #[multiplatform_test]
    fn connection_predicates() {
        let (cypher, _) = compile(
            json!({"actedInConnection_SOME": {"edge": {"role": "Hero"}, "node": {"title_STARTS_WITH": "The"}}}),
            WhereScope::default(),
        );
        assert_eq!(
            cypher,
            "EXISTS { MATCH (this)-[this0:ACTED_IN]->(this1) WHERE (this0.role = $param2 AND this1.title STARTS WITH $param3) }"
        );

        let (cypher, _) = compile(
            json!({"friendsConnection_ALL": {"node": {"age": 3}}}),
            WhereScope::default(),
        );
        assert_eq!(
            cypher,
            "(EXISTS { MATCH (this)-[this0:FRIEND_OF]->(this1:Person) WHERE this1.age = $param2 } AND NOT(EXISTS { MATCH (this)-[this0:FRIEND_OF]->(this1:Person) WHERE this1.age <> $param2 }))"
        );

        let (cypher, _) = compile(
            json!({"friendsConnection_SINGLE": {"node": {"age": 3}}}),
            WhereScope::default(),
        );
        assert_eq!(
            cypher,
            "single(this3 IN [(this)-[this0:FRIEND_OF]->(this1:Person) WHERE this1.age = $param2 | 1] WHERE true)"
        );
    }

    #[multiplatform_test]
    fn aggregates() {
        let (cypher, output) = compile(
            json!({"friendsAggregate": {"count_GT": 2}}),
            WhereScope::default(),
        );
        assert_eq!(cypher, "var2 = true");
        assert_eq!(output.subqueries.len(), 1);
        assert_eq!(
            render(&output.subqueries[0]).0,
            "WITH this\nMATCH (this)-[:FRIEND_OF]->(this0:Person)\nRETURN count(this0) > $param1 AS var2"
        );

        let (cypher, output) = compile(
            json!({"friendsAggregate": {"count": 0}}),
            WhereScope {
                nested: true,
                ..Default::default()
            },
        );
        assert_eq!(
            cypher,
            "size([(this)-[:FRIEND_OF]->(this0:Person) | this0]) = $param1"
        );
        assert!(output.subqueries.is_empty());

        let (cypher, _) = with_context(&AuthContext::anonymous(), |ctx| {
            let person = entity_id(ctx.system, "Person");
            let output = compile_where(
                ctx,
                person,
                "this",
                &val(json!({"name": "a", "friendsAggregate": {"count": 1}})),
                WhereScope::default(),
                0,
            )
            .unwrap();
            render(&Statement::from(match_and_filter(
                Pattern::node(NodePattern::new("this", vec!["Person".to_string()])),
                output,
            )))
        });
        assert_eq!(
            cypher,
            "MATCH (this:Person)\nCALL {\nWITH this\nMATCH (this)-[:FRIEND_OF]->(this1:Person)\nRETURN count(this1) = $param2 AS var3\n}\nWITH *\nWHERE (this.name = $param0 AND var3 = true)"
        );
    }

    #[multiplatform_test]
    fn property_aggregate_filters() {
        let (cypher, output) = compile(
            json!({"friendsAggregate": {"node": {"age_AVERAGE_GT": 30, "name_SHORTEST_LENGTH_LT": 3}}}),
            WhereScope::default(),
        );
        assert_eq!(cypher, "var3 = true");
        assert_eq!(
            render(&output.subqueries[0]).0,
            "WITH this\nMATCH (this)-[:FRIEND_OF]->(this0:Person)\nRETURN (avg(this0.age) > $param1 AND min(size(this0.name)) < $param2) AS var3"
        );

        let (cypher, _) = compile(
            json!({"friendsAggregate": {"node": {"score_SUM_EQUAL": 10}}}),
            WhereScope::default(),
        );
        assert_eq!(cypher, "var2 = true");

        let (cypher, output) = compile(
            json!({"actedInAggregate": {
                "edge": {"since_MIN_LT": 2000},
                "node": {"title_LONGEST_LENGTH_GTE": 5}
            }}),
            WhereScope {
                nested: true,
                ..Default::default()
            },
        );
        assert_eq!(
            cypher,
            "(apoc.coll.min([(this)-[this1:ACTED_IN]->(this0) | this1.since]) < $param2 AND apoc.coll.max([(this)-[this1:ACTED_IN]->(this0) | size(this0.title)]) >= $param3)"
        );
        assert!(output.subqueries.is_empty());
    }

    #[multiplatform_test]
    fn coalesced_properties_are_aggregated_with_their_fallback() {
        let (_, output) = compile(
            json!({"friendsAggregate": {"OR": [{"count": 0}, {"node": {"score_SUM_GTE": 10}}]}}),
            WhereScope::default(),
        );
        assert_eq!(
            render(&output.subqueries[0]).0,
            "WITH this\nMATCH (this)-[:FRIEND_OF]->(this0:Person)\nRETURN (count(this0) = $param1 OR sum(coalesce(this0.score, 0)) >= $param2) AS var3"
        );
    }

    #[multiplatform_test]
    fn unsupported_property_aggregates() {
        let error = |where_| {
            with_context(&AuthContext::anonymous(), |ctx| {
                let person = entity_id(ctx.system, "Person");
                match compile_where(ctx, person, "this", &val(where_), WhereScope::default(), 0) {
                    Err(TranslationError::Validation(field, _)) => field,
                    other => panic!("unexpected result {other:?}"),
                }
            })
        };

        assert_eq!(
            error(json!({"friendsAggregate": {"edge": {"since_MIN_GT": 1}}})),
            "edge"
        );
        assert_eq!(
            error(json!({"friendsAggregate": {"node": {"name_SUM_GT": 1}}})),
            "name_SUM_GT"
        );
        assert_eq!(
            error(json!({"friendsAggregate": {"node": {"tags_SHORTEST_LT": 1}}})),
            "tags_SHORTEST_LT"
        );
        assert_eq!(
            error(json!({"friendsAggregate": {"node": {"age_AVERAGE_LENGTH_GT": 1}}})),
            "age_AVERAGE_LENGTH_GT"
        );
        assert_eq!(
            error(json!({"actedInAggregate": {"edge": {"role_AVERAGE_GT": null}}})),
            "role_AVERAGE_GT"
        );
    }
}
