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
    Clause, Expression, NodePattern, Pattern, Projection, ReturnItem, Statement, functions,
};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation, ValidationStage},
    entity::EntityId,
};

use super::{
    NestedOperation, Parent, RelationScope, carrying, keyed_relation_operations,
    set_properties::create_set_items,
};
use crate::{
    access::{check_authentication, filter_condition, validation_clauses},
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::related,
    predicate::{WhereScope, compile_where, optional_match_and_filter, where_for_node},
};

const CONNECT_OPERATIONS: &[AuthorizationOperation] = &[AuthorizationOperation::CreateRelationship];

/// `connect: [{where: {node: {...}}, edge: {...}, connect: [...]}]`: relate the parent to every
/// existing node matching the where.
pub(super) fn connect(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    element: &Val,
    index: usize,
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let target = scope.target;
    let parent = scope.parent;
    let item = expect_object(element, "connect")?;

    check_authentication(
        ctx,
        Some(&system.nodes[parent.node_id]),
        &[],
        AuthenticationOperation::CreateRelationship,
    )?;
    check_authentication(
        ctx,
        Some(target.node),
        &[],
        AuthenticationOperation::CreateRelationship,
    )?;

    let node_where = match item.get("where") {
        Some(where_) => match expect_object(where_, "where")?.get("node") {
            Some(node_where) => {
                match where_for_node(
                    system,
                    target.where_entity(scope.relation),
                    target.node_id,
                    node_where,
                )? {
                    Some(node_where) => node_where,
                    // An interface where naming other implementations only
                    None => return Ok(Statement::new()),
                }
            }
            None => Val::Null,
        },
        None => Val::Null,
    };

    let base = scope.item_chain().push("connect").index(index);
    let node_variable = base.push("node").resolve_name();
    let rel_variable = base.push("relationship").resolve_name();

    let filter = compile_where(
        ctx,
        EntityId::Node(target.node_id),
        &node_variable,
        &node_where,
        WhereScope::default(),
        depth + 1,
    )?
    .and(filter_condition(
        ctx,
        target.node_id,
        &node_variable,
        &[],
        CONNECT_OPERATIONS,
        depth + 1,
    )?);

    let mut inner = Statement::new().then(scope.carry());
    inner.append(Statement::from(optional_match_and_filter(
        Pattern::node(NodePattern::new(&node_variable, target.node.labels.clone())),
        filter,
    )));
    inner.append(validations(ctx, scope, &node_variable, ValidationStage::Before, depth)?);

    let (merge_variable, edge_items) = match scope.relation.properties {
        Some(properties) => {
            let properties = system.relationship_properties(properties);
            let edge = expect_object(item.get("edge").unwrap_or(&Val::Null), "edge")?;
            let items = create_set_items(&properties.fields, &rel_variable, edge, &properties.name)?;
            (Some(rel_variable.as_str()), items)
        }
        None => {
            if item.contains_key("edge") {
                return Err(TranslationError::validation(
                    &scope.field.name,
                    "relationship has no properties",
                ));
            }
            (None, vec![])
        }
    };

    // Relate every matched node to every parent row at once
    let mut merge = Statement::new()
        .then(Clause::with_variables(&["connectedNodes", "parentNodes"]))
        .then(Clause::Unwind {
            expression: Expression::variable("parentNodes"),
            alias: parent.variable.to_string(),
        })
        .then(Clause::Unwind {
            expression: Expression::variable("connectedNodes"),
            alias: node_variable.clone(),
        })
        .then(Clause::Merge {
            pattern: related(
                parent.variable,
                scope.relation,
                merge_variable,
                NodePattern::named(&node_variable),
            ),
            on_create: vec![],
        });
    if !edge_items.is_empty() {
        merge.push(Clause::Set(edge_items));
    }
    inner.push(Clause::call(
        Statement::new()
            .then(Clause::With(Projection::star()))
            .then(Clause::With(Projection::new(vec![
                ReturnItem::aliased(
                    functions::collect(Expression::variable(&node_variable)),
                    "connectedNodes",
                ),
                ReturnItem::aliased(
                    functions::collect(Expression::variable(parent.variable)),
                    "parentNodes",
                ),
            ])))
            .then(Clause::call(merge)),
    ));

    if let Some(nested) = item.get("connect") {
        let with_vars = carrying(parent.with_vars, &node_variable);
        let connected = Parent {
            node_id: target.node_id,
            variable: &node_variable,
            with_vars: &with_vars,
            created: false,
        };
        for nested in nested.as_one_or_many() {
            let part = keyed_relation_operations(
                ctx,
                connected,
                NestedOperation::Connect,
                nested,
                depth + 1,
            )?;
            inner.append(part);
        }
    }

    inner.append(validations(ctx, scope, &node_variable, ValidationStage::After, depth)?);
    inner.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        functions::count_star(),
        format!("connect_{}", base.resolve_name()),
    )])));

    Ok(Statement::new().then(scope.carry()).then(Clause::call(inner)))
}

/// Validate rules on the connected node, and on the parent unless this statement created it.
fn validations(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    node_variable: &str,
    stage: ValidationStage,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let mut statement = Statement::from(validation_clauses(
        ctx,
        scope.target.node_id,
        node_variable,
        &[],
        CONNECT_OPERATIONS,
        stage,
        depth + 1,
    )?);
    if !scope.parent.created {
        statement.append(Statement::from(validation_clauses(
            ctx,
            scope.parent.node_id,
            scope.parent.variable,
            &[],
            CONNECT_OPERATIONS,
            stage,
            depth + 1,
        )?));
    }
    Ok(statement)
}
