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
use graph_model::access::{AuthenticationOperation, AuthorizationOperation, ValidationStage};

use super::{RelationScope, set_properties::create_set_items};
use crate::{
    access::{check_authentication, validation_clauses},
    context::QueryContext,
    error::TranslationError,
    input::{expect_object, to_json},
    naming::ChainString,
    pattern::related,
};

/// `connectOrCreate: [{where: {node: {<unique field>: ...}}, onCreate: {node: {...}, edge: {...}}}]`:
/// merge the node on its unique fields, creating it with the `onCreate` properties when missing,
/// then merge the relationship.
pub(super) fn connect_or_create(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    element: &Val,
    index: usize,
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let target = scope.target;
    let node = target.node;
    let item = expect_object(element, "connectOrCreate")?;

    check_authentication(ctx, Some(node), &[], AuthenticationOperation::Create)?;
    check_authentication(
        ctx,
        Some(node),
        &[],
        AuthenticationOperation::CreateRelationship,
    )?;
    check_authentication(
        ctx,
        Some(&system.nodes[scope.parent.node_id]),
        &[],
        AuthenticationOperation::CreateRelationship,
    )?;

    let base = scope.item_chain().push("connectOrCreate").index(index);
    let node_variable = base.push("node").resolve_name();
    let rel_variable = base.push("relationship").resolve_name();

    let unique_where = item
        .get("where")
        .map(|where_| expect_object(where_, "where"))
        .transpose()?
        .and_then(|where_| where_.get("node"))
        .map(|node_where| expect_object(node_where, "node"))
        .transpose()?
        .filter(|node_where| !node_where.is_empty())
        .ok_or_else(|| {
            TranslationError::validation(
                &scope.field.name,
                "connectOrCreate requires a where on unique fields",
            )
        })?;

    let where_chain = ChainString::new(&node_variable).push("where");
    let mut key_properties = vec![];
    for (key, value) in unique_where {
        let field = node.unique_fields().find(|field| field.name == *key).ok_or_else(|| {
            TranslationError::validation(key, format!("not a unique field of {}", node.name))
        })?;
        if value.is_null() {
            return Err(TranslationError::validation(key, "unique value cannot be null"));
        }
        let param = where_chain.push(key).resolve_parameter(to_json(value, key)?);
        key_properties.push((field.db_name().to_string(), param));
    }

    let on_create = expect_object(item.get("onCreate").unwrap_or(&Val::Null), "onCreate")?;
    let node_input = expect_object(on_create.get("node").unwrap_or(&Val::Null), "node")?;
    // Merge keys are already on the node
    let node_items = create_set_items(&node.fields, &node_variable, node_input, &node.name)?
        .into_iter()
        .filter(|set_item| {
            !key_properties.iter().any(|(db_name, _)| {
                set_item.target == Expression::variable(&node_variable).property(db_name.as_str())
            })
        })
        .collect();

    let (merge_variable, edge_items) = match scope.relation.properties {
        Some(properties) => {
            let properties = system.relationship_properties(properties);
            let edge = expect_object(on_create.get("edge").unwrap_or(&Val::Null), "edge")?;
            let items = create_set_items(&properties.fields, &rel_variable, edge, &properties.name)?;
            (Some(rel_variable.as_str()), items)
        }
        None => {
            if on_create.contains_key("edge") {
                return Err(TranslationError::validation(
                    &scope.field.name,
                    "relationship has no properties",
                ));
            }
            (None, vec![])
        }
    };

    let mut inner = Statement::new()
        .then(scope.carry())
        .then(Clause::Merge {
            pattern: Pattern::node(
                NodePattern::new(&node_variable, node.labels.clone()).with_properties(key_properties),
            ),
            on_create: node_items,
        })
        .then(Clause::Merge {
            pattern: related(
                scope.parent.variable,
                scope.relation,
                merge_variable,
                NodePattern::named(&node_variable),
            ),
            on_create: edge_items,
        });

    inner.append(Statement::from(validation_clauses(
        ctx,
        target.node_id,
        &node_variable,
        &[],
        &[
            AuthorizationOperation::Create,
            AuthorizationOperation::CreateRelationship,
        ],
        ValidationStage::After,
        depth + 1,
    )?));
    inner.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        functions::count_star(),
        format!("connectOrCreate_{}", base.resolve_name()),
    )])));

    Ok(Statement::new().then(scope.carry()).then(Clause::call(inner)))
}
