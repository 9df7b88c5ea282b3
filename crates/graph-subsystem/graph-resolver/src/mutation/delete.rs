// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{Clause, Expression, NodePattern, Projection, ReturnItem, Statement, functions};
use graph_model::access::{AuthenticationOperation, AuthorizationOperation};

use super::{NestedOperation, Parent, RelationScope, carrying, keyed_relation_operations};
use crate::{
    access::{check_authentication, read_authorization},
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::related,
    predicate::{WhereScope, compile_connection_where, optional_match_and_filter},
};

/// `delete: {friends: [{where: ..., delete: ...}]}` below the node bound to `parent`.
pub(crate) fn nested_deletes(
    ctx: &mut QueryContext<'_>,
    parent: Parent<'_>,
    input: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    keyed_relation_operations(ctx, parent, NestedOperation::Delete, input, depth)
}

/// `delete: [{where: {node: {...}, edge: {...}}, delete: {...}}]` below a relation: detach and
/// delete the related nodes matching the where, after their own nested deletes.
pub(super) fn nested_delete(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    element: &Val,
    index: usize,
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let target = scope.target;
    let parent = scope.parent;
    let item = expect_object(element, "delete")?;

    check_authentication(ctx, Some(target.node), &[], AuthenticationOperation::Delete)?;

    let base = scope.item_chain().push("delete").index(index);
    let node_variable = base.resolve_name();
    let rel_variable = base.push("relationship").resolve_name();
    let to_delete = base.push("to").push("delete").resolve_name();

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
    .and(read_authorization(
        ctx,
        target.node_id,
        &node_variable,
        &[],
        &[AuthorizationOperation::Delete],
        depth + 1,
    )?);

    let mut statement = Statement::new().then(scope.carry());
    statement.append(Statement::from(optional_match_and_filter(
        related(
            parent.variable,
            scope.relation,
            Some(&rel_variable),
            NodePattern::new(&node_variable, target.node.labels.clone()),
        ),
        filter,
    )));

    if let Some(nested) = item.get("delete") {
        let with_vars = carrying(parent.with_vars, &node_variable);
        let deleted = Parent {
            node_id: target.node_id,
            variable: &node_variable,
            with_vars: &with_vars,
            created: false,
        };
        for nested in nested.as_one_or_many() {
            statement.append(nested_deletes(ctx, deleted, nested, depth + 1)?);
        }
    }

    let mut collected: Vec<ReturnItem> = parent
        .with_vars
        .iter()
        .map(ReturnItem::variable)
        .collect();
    collected.push(ReturnItem::aliased(
        functions::collect_distinct(Expression::variable(&node_variable)),
        &to_delete,
    ));
    statement.push(Clause::With(Projection::new(collected)));
    statement.push(Clause::call(
        Statement::new()
            .then(Clause::with_variables(&[&to_delete]))
            .then(Clause::Unwind {
                expression: Expression::variable(&to_delete),
                alias: node_variable.clone(),
            })
            .then(Clause::Delete {
                detach: true,
                expressions: vec![Expression::variable(&node_variable)],
            })
            .then(Clause::Return(Projection::new(vec![ReturnItem::aliased(
                functions::count_star(),
                "_",
            )]))),
    ));

    Ok(statement)
}

#[cfg(test)]
mod tests {
    use crate::{
        context::AuthContext,
        error::TranslationError,
        mutation::update_node,
        test_support::{assert_in_order, node_id, render, user, val, with_context},
    };
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn update(
        auth: &AuthContext,
        input: serde_json::Value,
    ) -> Result<(String, exo_cypher::Params), TranslationError> {
        with_context(auth, |ctx| {
            let person = node_id(ctx.system, "Person");
            let statement =
                update_node(ctx, person, "this", &val(input), &["this".to_string()], 0)?;
            Ok(render(&statement))
        })
    }

    #[multiplatform_test]
    fn deletes_collected_nodes() {
        let (cypher, params) = update(
            &AuthContext::anonymous(),
            json!({"friends": {"delete": [{"where": {"node": {"name": "B"}}}]}}),
        )
        .unwrap();

        assert!(
            cypher.starts_with(
                "WITH this\n\
                 OPTIONAL MATCH (this)-[this_friends_delete0_relationship:FRIEND_OF]->(this_friends_delete0:Person)\n\
                 WHERE this_friends_delete0.name = $param0\n\
                 WITH this, collect(DISTINCT this_friends_delete0) AS this_friends_delete0_to_delete\n\
                 CALL {\n\
                 WITH this_friends_delete0_to_delete\n\
                 UNWIND this_friends_delete0_to_delete AS this_friends_delete0\n\
                 DETACH DELETE this_friends_delete0\n\
                 RETURN count(*) AS _\n\
                 }"
            ),
            "{cypher}"
        );
        assert_eq!(params.get("param0"), Some(&json!("B")));
    }

    #[multiplatform_test]
    fn nested_deletes_run_before_their_parent_is_deleted() {
        let (cypher, _) = update(
            &AuthContext::anonymous(),
            json!({"friends": {"delete": [{
                "where": {"node": {"name": "B"}},
                "delete": {"friends": [{"where": {"node": {"name": "C"}}}]}
            }]}}),
        )
        .unwrap();

        assert_in_order(
            &cypher,
            &[
                "OPTIONAL MATCH (this)-[this_friends_delete0_relationship:FRIEND_OF]->(this_friends_delete0:Person)",
                "WITH this, this_friends_delete0\n\
                 OPTIONAL MATCH (this_friends_delete0)-[this_friends_delete0_friends_delete0_relationship:FRIEND_OF]->(this_friends_delete0_friends_delete0:Person)",
                "WITH this, this_friends_delete0, collect(DISTINCT this_friends_delete0_friends_delete0) AS this_friends_delete0_friends_delete0_to_delete",
                "DETACH DELETE this_friends_delete0_friends_delete0",
                "WITH this, collect(DISTINCT this_friends_delete0) AS this_friends_delete0_to_delete",
                "DETACH DELETE this_friends_delete0\n",
            ],
        );
    }

    #[multiplatform_test]
    fn deleting_posts_requires_an_admin() {
        let input = json!({"posts": {"delete": [{}]}});
        assert!(matches!(
            update(&user("u1", &[]), input.clone()),
            Err(TranslationError::AuthenticationRequired)
        ));

        let (cypher, _) = update(&user("u1", &["admin"]), input).unwrap();
        assert!(cypher.contains("DETACH DELETE this_posts_delete0\n"));
    }
}
