// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{Clause, Condition, Expression, Projection, functions};
use graph_model::{
    access::{AuthorizationAnnotation, AuthorizationOperation, ValidationStage},
    entity::{EntityId, NodeId},
    field::Field,
};

use crate::{
    context::QueryContext,
    error::TranslationError,
    input::{expect_object, to_json},
    predicate::{
        PredicateOutput, WhereScope, compile_where,
        operator::{self, Operator},
    },
};

pub const FORBIDDEN: &str = "@neo4j/graphql/FORBIDDEN";

/// Schema, node and field annotations, outermost first.
fn annotations<'a>(
    ctx: &QueryContext<'a>,
    node_id: NodeId,
    fields: &[&'a Field],
) -> Vec<&'a AuthorizationAnnotation> {
    let system = ctx.system;
    system
        .authorization
        .iter()
        .chain(system.nodes[node_id].authorization.iter())
        .chain(fields.iter().filter_map(|field| field.authorization.as_ref()))
        .collect()
}

/// Matching rules within an annotation are alternatives; annotations must all hold. An annotation
/// with no matching rule does not constrain.
fn combine<'r>(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    rule_sets: Vec<Vec<(bool, &'r Val)>>,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let mut output = PredicateOutput::default();
    for rules in rule_sets {
        if rules.is_empty() {
            continue;
        }
        let mut any = PredicateOutput::new(Condition::False);
        for (require_authentication, predicate) in rules {
            any = any.or(compile_rule(
                ctx,
                node_id,
                variable,
                require_authentication,
                predicate,
                depth,
            )?);
        }
        output = output.and(any);
    }
    Ok(output)
}

pub(crate) fn filter_condition<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    fields: &[&'a Field],
    operations: &[AuthorizationOperation],
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let rule_sets = annotations(ctx, node_id, fields)
        .into_iter()
        .map(|annotation| {
            annotation
                .filter
                .iter()
                .filter(|rule| rule.applies_to(operations))
                .map(|rule| (rule.require_authentication, &rule.predicate))
                .collect()
        })
        .collect();
    combine(ctx, node_id, variable, rule_sets, depth)
}

/// The condition every validate rule for `stage` demands. The statement must fail where it does
/// not hold.
pub(crate) fn validation_condition<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    fields: &[&'a Field],
    operations: &[AuthorizationOperation],
    stage: ValidationStage,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let rule_sets = annotations(ctx, node_id, fields)
        .into_iter()
        .map(|annotation| {
            annotation
                .validate
                .iter()
                .filter(|rule| rule.applies_to(operations, stage))
                .map(|rule| (rule.require_authentication, &rule.predicate))
                .collect()
        })
        .collect();
    combine(ctx, node_id, variable, rule_sets, depth)
}

/// Filter rules plus `BEFORE` validate rules, for use in a `WHERE`.
pub(crate) fn read_authorization<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    fields: &[&'a Field],
    operations: &[AuthorizationOperation],
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let filter = filter_condition(ctx, node_id, variable, fields, operations, depth)?;
    let validation = validation_condition(
        ctx,
        node_id,
        variable,
        fields,
        operations,
        ValidationStage::Before,
        depth,
    )?;

    if validation.condition.is_true() {
        return Ok(filter);
    }

    let assertion = Condition::expression(functions::validate_predicate(
        !validation.condition,
        FORBIDDEN,
    ));
    Ok(filter.and(PredicateOutput {
        condition: assertion,
        subqueries: validation.subqueries,
    }))
}

/// `WITH *` and `CALL apoc.util.validate(NOT (...))` for the validate rules of `stage`, or nothing
/// when no rule applies.
pub(crate) fn validation_clauses<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    fields: &[&'a Field],
    operations: &[AuthorizationOperation],
    stage: ValidationStage,
    depth: usize,
) -> Result<Vec<Clause>, TranslationError> {
    let validation =
        validation_condition(ctx, node_id, variable, fields, operations, stage, depth)?;
    if validation.condition.is_true() {
        return Ok(vec![]);
    }

    let mut clauses = vec![Clause::With(Projection::star())];
    clauses.extend(validation.subqueries.into_iter().map(Clause::call));
    clauses.push(Clause::validate(!validation.condition, FORBIDDEN));
    Ok(clauses)
}

fn compile_rule(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    require_authentication: bool,
    predicate: &Val,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    let authenticated = if require_authentication {
        PredicateOutput::new(Condition::Eq(
            ctx.is_authenticated_param(),
            Expression::boolean(true),
        ))
    } else {
        PredicateOutput::default()
    };

    Ok(authenticated.and(compile_rule_where(ctx, node_id, variable, predicate, depth)?))
}

fn compile_rule_where(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    predicate: &Val,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    ctx.check_depth(depth)?;

    let mut output = PredicateOutput::default();
    for (key, value) in expect_object(predicate, "where")? {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let elements = value.as_one_or_many();
                let mut combined = PredicateOutput::new(Condition::from(key == "AND"));
                if elements.is_empty() {
                    combined = PredicateOutput::default();
                }
                for element in elements {
                    let element = compile_rule_where(ctx, node_id, variable, element, depth + 1)?;
                    combined = if key == "AND" {
                        combined.and(element)
                    } else {
                        combined.or(element)
                    };
                }
                combined
            }
            "NOT" => compile_rule_where(ctx, node_id, variable, value, depth + 1)?.negate(),
            "node" => compile_where(
                ctx,
                EntityId::Node(node_id),
                variable,
                value,
                WhereScope {
                    nested: true,
                    jwt_references: true,
                },
                depth + 1,
            )?,
            "jwt" => PredicateOutput::new(jwt_condition(ctx, value, depth + 1)?),
            _ => {
                return Err(TranslationError::validation(
                    key,
                    "expected AND, OR, NOT, node or jwt",
                ));
            }
        };
        output = output.and(part);
    }
    Ok(output)
}

/// A where over the caller's claims, compiled against `$jwt`.
fn jwt_condition(
    ctx: &mut QueryContext<'_>,
    where_: &Val,
    depth: usize,
) -> Result<Condition, TranslationError> {
    ctx.check_depth(depth)?;

    let mut condition = Condition::True;
    for (key, value) in expect_object(where_, "jwt")? {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut parts = vec![];
                for element in value.as_one_or_many() {
                    parts.push(jwt_condition(ctx, element, depth + 1)?);
                }
                if key == "AND" || parts.is_empty() {
                    Condition::conjunction(parts)
                } else {
                    Condition::disjunction(parts)
                }
            }
            "NOT" => !jwt_condition(ctx, value, depth + 1)?,
            _ => {
                let (claim, operator) = operator::parse_free_key(key);
                let claim_value = ctx.jwt_param().property(claim);
                match (value.is_null(), operator) {
                    (true, Operator::Eq) => Condition::IsNull(claim_value),
                    (true, Operator::Not) => Condition::IsNotNull(claim_value),
                    _ => {
                        let rhs = ctx.next_param(to_json(value, key)?);
                        operator::compare(operator, claim_value, rhs).ok_or_else(|| {
                            TranslationError::validation(key, "operator not supported on claims")
                        })?
                    }
                }
            }
        };
        condition = Condition::and(condition, part);
    }
    Ok(condition)
}
