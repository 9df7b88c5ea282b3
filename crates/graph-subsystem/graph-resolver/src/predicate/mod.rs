// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compiles where-input trees into conditions.
//!
//! A where input is an ordered object. Each key is `AND`, `OR` or `NOT`, or names a field with an
//! optional operator suffix. Keys are conjoined in input order. Scalar keys compare a property,
//! relationship keys quantify over a pattern comprehension, connection keys test an `EXISTS`
//! subquery and aggregate keys count related nodes (or aggregate their properties) in a precomputed
//! subquery.

mod aggregate;
pub(crate) mod operator;
mod relationship;

use common::value::Val;
use exo_cypher::{
    Clause, Condition, Expression, Pattern, Projection, Statement, functions,
};
use graph_model::{
    entity::{EntityId, NodeId, UnionId},
    field::{Field, FieldKind, ScalarField},
    subsystem::GraphSubsystem,
};
use indexmap::IndexMap;

use crate::{
    context::QueryContext,
    error::TranslationError,
    input::{expect_object, literal, to_json},
};

use operator::Operator;

pub(crate) use relationship::compile_connection_where;

/// A compiled condition and the subqueries that must run (as `CALL`s) before it is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PredicateOutput {
    pub condition: Condition,
    pub subqueries: Vec<Statement>,
}

impl Default for PredicateOutput {
    fn default() -> Self {
        Self::new(Condition::True)
    }
}

impl PredicateOutput {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            subqueries: vec![],
        }
    }

    pub fn and(mut self, other: PredicateOutput) -> Self {
        self.condition = Condition::and(self.condition, other.condition);
        self.subqueries.extend(other.subqueries);
        self
    }

    pub fn or(mut self, other: PredicateOutput) -> Self {
        self.condition = Condition::or(self.condition, other.condition);
        self.subqueries.extend(other.subqueries);
        self
    }

    pub fn negate(mut self) -> Self {
        self.condition = !self.condition;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WhereScope {
    /// Compiling inside a comprehension or `EXISTS`, where precomputed subqueries cannot see the
    /// variable; aggregates are inlined instead
    pub nested: bool,
    /// String values of the form `$jwt.claim` refer to the caller's claims
    pub jwt_references: bool,
}

impl WhereScope {
    fn nested(self) -> Self {
        Self {
            nested: true,
            ..self
        }
    }
}

pub(crate) fn compile_where(
    ctx: &mut QueryContext<'_>,
    entity: EntityId,
    variable: &str,
    where_: &Val,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let object = expect_object(where_, "where")?;
    if object.is_empty() {
        return Ok(PredicateOutput::default());
    }

    match entity {
        EntityId::Node(id) => compile_fields(
            ctx,
            &system.nodes[id].fields,
            variable,
            object,
            scope,
            depth,
        ),
        EntityId::Interface(id) => {
            let interface = &system.interfaces[id];
            if !object.contains_key("_on") {
                return compile_fields(ctx, &interface.fields, variable, object, scope, depth);
            }

            let mut output = PredicateOutput::new(Condition::False);
            for node_id in &interface.implementations {
                let narrowed = where_for_node(system, entity, *node_id, where_)?;
                if let Some(narrowed) = narrowed {
                    let node = &system.nodes[*node_id];
                    let labels = PredicateOutput::new(Condition::HasLabels(
                        variable.to_string(),
                        node.labels.clone(),
                    ));
                    let branch = compile_fields(
                        ctx,
                        &node.fields,
                        variable,
                        expect_object(&narrowed, "where")?,
                        scope,
                        depth + 1,
                    )?;
                    output = output.or(labels.and(branch));
                }
            }
            Ok(output)
        }
        EntityId::Union(id) => {
            let union = &system.unions[id];
            check_union_members(system, id, object)?;

            let mut output = PredicateOutput::new(Condition::False);
            for member in &union.members {
                let node = &system.nodes[*member];
                if let Some(member_where) = object.get(&node.name) {
                    let labels = PredicateOutput::new(Condition::HasLabels(
                        variable.to_string(),
                        node.labels.clone(),
                    ));
                    let branch = compile_where(
                        ctx,
                        EntityId::Node(*member),
                        variable,
                        member_where,
                        scope,
                        depth + 1,
                    )?;
                    output = output.or(labels.and(branch));
                }
            }
            Ok(output)
        }
    }
}

/// The where input that applies to `node_id` when matching it as a branch of `entity`, or `None`
/// when the input excludes that node altogether.
///
/// Interface `_on` entries are merged over the root keys (the `_on` value wins). When `_on` is the
/// only key, implementations it does not name are excluded. Union inputs are keyed by member.
pub(crate) fn where_for_node(
    system: &GraphSubsystem,
    entity: EntityId,
    node_id: NodeId,
    where_: &Val,
) -> Result<Option<Val>, TranslationError> {
    let object = expect_object(where_, "where")?;
    let node = &system.nodes[node_id];

    match entity {
        EntityId::Node(_) => Ok(Some(where_.clone())),
        EntityId::Interface(id) => {
            let Some(on) = object.get("_on") else {
                return Ok(Some(where_.clone()));
            };
            let on = expect_object(on, "_on")?;
            let interface = &system.interfaces[id];
            for key in on.keys() {
                if !interface
                    .implementations
                    .iter()
                    .any(|implementation| system.nodes[*implementation].name == *key)
                {
                    return Err(TranslationError::validation(
                        "_on",
                        format!("{key} does not implement {}", interface.name),
                    ));
                }
            }

            let root: IndexMap<String, Val> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "_on")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            match on.get(&node.name) {
                Some(node_where) => {
                    let mut merged = root;
                    for (key, value) in expect_object(node_where, &node.name)? {
                        merged.insert(key.clone(), value.clone());
                    }
                    Ok(Some(Val::Object(merged)))
                }
                None if !root.is_empty() => Ok(Some(Val::Object(root))),
                None => Ok(None),
            }
        }
        EntityId::Union(id) => {
            check_union_members(system, id, object)?;
            if object.is_empty() {
                Ok(Some(Val::Null))
            } else {
                Ok(object.get(&node.name).cloned())
            }
        }
    }
}

/// Union filters are keyed by member name.
fn check_union_members(
    system: &GraphSubsystem,
    id: UnionId,
    object: &IndexMap<String, Val>,
) -> Result<(), TranslationError> {
    let union = &system.unions[id];
    match object.keys().find(|key| {
        !union
            .members
            .iter()
            .any(|member| system.nodes[*member].name == **key)
    }) {
        Some(key) => Err(TranslationError::validation(
            key,
            format!("{key} is not a member of union {}", union.name),
        )),
        None => Ok(()),
    }
}

/// Compile a where object against a field list (a node, an interface or relationship
/// properties).
pub(crate) fn compile_fields(
    ctx: &mut QueryContext<'_>,
    fields: &[Field],
    variable: &str,
    object: &IndexMap<String, Val>,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    ctx.check_depth(depth)?;

    let mut output = PredicateOutput::default();
    for (key, value) in object {
        let part = match key.as_str() {
            "AND" => {
                let mut conjunction = PredicateOutput::default();
                for element in value.as_one_or_many() {
                    let element = expect_object(element, key)?;
                    conjunction =
                        conjunction.and(compile_fields(ctx, fields, variable, element, scope, depth + 1)?);
                }
                conjunction
            }
            "OR" => {
                let elements = value.as_one_or_many();
                if elements.is_empty() {
                    PredicateOutput::default()
                } else {
                    let mut disjunction = PredicateOutput::new(Condition::False);
                    for element in elements {
                        let element = expect_object(element, key)?;
                        disjunction = disjunction
                            .or(compile_fields(ctx, fields, variable, element, scope, depth + 1)?);
                    }
                    disjunction
                }
            }
            "NOT" => {
                let inner = expect_object(value, key)?;
                compile_fields(ctx, fields, variable, inner, scope, depth + 1)?.negate()
            }
            _ => compile_field_predicate(ctx, fields, variable, key, value, scope, depth)?,
        };
        output = output.and(part);
    }
    Ok(output)
}

fn compile_field_predicate(
    ctx: &mut QueryContext<'_>,
    fields: &[Field],
    variable: &str,
    key: &str,
    value: &Val,
    scope: WhereScope,
    depth: usize,
) -> Result<PredicateOutput, TranslationError> {
    if let Some(relation_name) = key.strip_suffix("Aggregate") {
        let relation = fields
            .iter()
            .find(|field| field.name == relation_name)
            .and_then(|field| field.as_relation());
        if let Some(relation) = relation {
            return relationship::aggregate_condition(
                ctx, relation, variable, key, value, scope, depth,
            );
        }
    }

    let (field, operator) = operator::parse_key(fields, key)
        .ok_or_else(|| TranslationError::validation(key, "no such field"))?;

    match &field.kind {
        FieldKind::Scalar(scalar) => Ok(PredicateOutput::new(scalar_condition(
            ctx, field, scalar, variable, key, operator, value, scope,
        )?)),
        FieldKind::Relation(relation) => relationship::relation_condition(
            ctx, field, relation, variable, key, operator, value, scope, depth,
        ),
        FieldKind::Connection(connection) => {
            let relation_field = fields
                .iter()
                .find(|f| f.name == connection.relation_field)
                .ok_or_else(|| {
                    TranslationError::Generic(format!(
                        "connection {} has no relation field {}",
                        field.name, connection.relation_field
                    ))
                })?;
            relationship::connection_condition(
                ctx,
                relation_field,
                variable,
                key,
                operator,
                value,
                scope,
                depth,
            )
        }
        _ => Err(TranslationError::validation(
            key,
            "field cannot be used in a filter",
        )),
    }
}

/// The right-hand side for a comparison: a fresh parameter, or a claim when the scope allows
/// `$jwt.` references.
pub(crate) fn value_expression(
    ctx: &mut QueryContext<'_>,
    value: &Val,
    scope: WhereScope,
    key: &str,
) -> Result<Expression, TranslationError> {
    if scope.jwt_references {
        if let Some(claim) = value.as_str().and_then(|s| s.strip_prefix("$jwt.")) {
            return Ok(ctx.jwt_param().property(claim));
        }
    }
    Ok(ctx.next_param(to_json(value, key)?))
}

#[allow(clippy::too_many_arguments)]
fn scalar_condition(
    ctx: &mut QueryContext<'_>,
    field: &Field,
    scalar: &ScalarField,
    variable: &str,
    key: &str,
    operator: Operator,
    value: &Val,
    scope: WhereScope,
) -> Result<Condition, TranslationError> {
    if !operator::is_supported(field, &scalar.kind, operator) {
        return Err(TranslationError::validation(
            key,
            format!("operator not supported on field {}", field.name),
        ));
    }

    let mut property = Expression::variable(variable).property(field.db_name());
    if let Some(fallback) = &scalar.coalesce {
        property = functions::coalesce(property, literal(fallback, key)?);
    }

    if value.is_null() {
        return match operator {
            Operator::Eq => Ok(Condition::IsNull(property)),
            Operator::Not => Ok(Condition::IsNotNull(property)),
            _ => Err(TranslationError::validation(
                key,
                "null may only be compared for equality",
            )),
        };
    }

    let rhs = value_expression(ctx, value, scope, key)?;

    if scalar.kind.is_spatial() && !field.is_list() {
        return Ok(spatial_condition(operator, property, rhs));
    }

    operator::compare(operator, property, rhs).ok_or_else(|| {
        TranslationError::validation(key, format!("operator not supported on field {}", field.name))
    })
}

fn spatial_condition(operator: Operator, property: Expression, rhs: Expression) -> Condition {
    let distance = || {
        functions::distance(
            property.clone(),
            functions::point(rhs.property("point")),
        )
    };

    match operator {
        Operator::Eq => Condition::Eq(property.clone(), functions::point(rhs.clone())),
        Operator::Not => Condition::Neq(property.clone(), functions::point(rhs.clone())),
        Operator::In | Operator::NotIn => {
            let points = Expression::list_comprehension(
                "p",
                rhs.clone(),
                None,
                Some(functions::point(Expression::variable("p"))),
            );
            let membership = Condition::In(property.clone(), points);
            if operator == Operator::NotIn {
                !membership
            } else {
                membership
            }
        }
        Operator::Lt => Condition::Lt(distance(), rhs.property("distance")),
        Operator::Lte => Condition::Lte(distance(), rhs.property("distance")),
        Operator::Gt => Condition::Gt(distance(), rhs.property("distance")),
        Operator::Gte => Condition::Gte(distance(), rhs.property("distance")),
        _ => Condition::Eq(distance(), rhs.property("distance")),
    }
}

/// `MATCH pattern WHERE condition`. Subqueries of the condition run between the `MATCH` and a
/// `WITH * WHERE condition` instead.
pub(crate) fn match_and_filter(pattern: Pattern, output: PredicateOutput) -> Vec<Clause> {
    filtered_match(pattern, output, false)
}

/// [`match_and_filter`] with `OPTIONAL MATCH`.
pub(crate) fn optional_match_and_filter(pattern: Pattern, output: PredicateOutput) -> Vec<Clause> {
    filtered_match(pattern, output, true)
}

fn filtered_match(pattern: Pattern, output: PredicateOutput, optional: bool) -> Vec<Clause> {
    let matching = |filter| {
        if optional {
            Clause::optional_matching(pattern, filter)
        } else {
            Clause::matching(pattern, filter)
        }
    };

    if output.subqueries.is_empty() {
        vec![matching(output.condition)]
    } else {
        let mut clauses = vec![matching(Condition::True)];
        clauses.extend(output.subqueries.into_iter().map(Clause::call));
        clauses.push(Clause::With(Projection::star().filtered(output.condition)));
        clauses
    }
}
