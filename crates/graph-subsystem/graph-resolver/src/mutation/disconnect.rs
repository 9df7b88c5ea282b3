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
    Clause, Condition, Expression, NodePattern, Projection, ReturnItem, Statement, functions,
};
use graph_model::access::{AuthenticationOperation, AuthorizationOperation, ValidationStage};

use super::{NestedOperation, Parent, RelationScope, carrying, keyed_relation_operations};
use crate::{
    access::{check_authentication, filter_condition, validation_clauses},
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::related,
    predicate::{WhereScope, compile_connection_where, optional_match_and_filter},
};

const DISCONNECT_OPERATIONS: &[AuthorizationOperation] =
    &[AuthorizationOperation::DeleteRelationship];

/// `disconnect: [{where: {node: {...}, edge: {...}}, disconnect: {...}}]`: delete the
/// relationships from the parent to the matching nodes. The nodes stay.
pub(super) fn disconnect(
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
    let item = expect_object(element, "disconnect")?;

    check_authentication(
        ctx,
        Some(&system.nodes[parent.node_id]),
        &[],
        AuthenticationOperation::DeleteRelationship,
    )?;
    check_authentication(
        ctx,
        Some(target.node),
        &[],
        AuthenticationOperation::DeleteRelationship,
    )?;

    let base = scope.item_chain().push("disconnect").index(index);
    let node_variable = base.resolve_name();
    let rel_variable = base.push("rel").resolve_name();

    let where_ = expect_object(item.get("where").unwrap_or(&Val::Null), "where")?;
    let filter = compile_connection_where(
        ctx,
        scope.relation,
        target.where_entity(scope.relation),
        &rel_variable,
        &node_variable,
        where_,
        WhereScope::default(),
        depth + 1,
    )?
    .and(filter_condition(
        ctx,
        target.node_id,
        &node_variable,
        &[],
        DISCONNECT_OPERATIONS,
        depth + 1,
    )?);

    let mut inner = Statement::new().then(scope.carry());
    inner.append(Statement::from(optional_match_and_filter(
        related(
            parent.variable,
            scope.relation,
            Some(&rel_variable),
            NodePattern::new(&node_variable, target.node.labels.clone()),
        ),
        filter,
    )));
    inner.append(validations(ctx, scope, &node_variable, ValidationStage::Before, depth)?);

    let matched = [node_variable.as_str(), rel_variable.as_str()];
    inner.push(Clause::call(
        Statement::new()
            .then(Clause::with_variables(&matched))
            .then(Clause::With(
                Projection::variables(&matched)
                    .filtered(Condition::IsNotNull(Expression::variable(&node_variable))),
            ))
            .then(Clause::Delete {
                detach: false,
                expressions: vec![Expression::variable(&rel_variable)],
            }),
    ));

    if let Some(nested) = item.get("disconnect") {
        let with_vars = carrying(parent.with_vars, &node_variable);
        let disconnected = Parent {
            node_id: target.node_id,
            variable: &node_variable,
            with_vars: &with_vars,
            created: false,
        };
        for nested in nested.as_one_or_many() {
            inner.append(keyed_relation_operations(
                ctx,
                disconnected,
                NestedOperation::Disconnect,
                nested,
                depth + 1,
            )?);
        }
    }

    inner.append(validations(ctx, scope, &node_variable, ValidationStage::After, depth)?);
    inner.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        functions::count_star(),
        format!("disconnect_{node_variable}"),
    )])));

    Ok(Statement::new().then(scope.carry()).then(Clause::call(inner)))
}

fn validations(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    node_variable: &str,
    stage: ValidationStage,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let mut clauses = validation_clauses(
        ctx,
        scope.target.node_id,
        node_variable,
        &[],
        DISCONNECT_OPERATIONS,
        stage,
        depth + 1,
    )?;
    clauses.extend(validation_clauses(
        ctx,
        scope.parent.node_id,
        scope.parent.variable,
        &[],
        DISCONNECT_OPERATIONS,
        stage,
        depth + 1,
    )?);
    Ok(Statement::from(clauses))
}
