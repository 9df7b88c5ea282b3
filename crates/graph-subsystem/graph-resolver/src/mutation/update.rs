// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{Clause, NodePattern, Pattern, Projection, ReturnItem, Statement, functions};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation, ValidationStage},
    entity::{EntityId, NodeId},
    field::Field,
};
use indexmap::IndexMap;

use super::{
    NestedOperation, Parent, RelationScope, UPDATE_OPERATIONS, cardinality_validations, carrying,
    input_for_node, keyed_relation_operations, relation_operations,
    set_properties::{relation_keys, update_set_items, updated_fields},
};
use crate::{
    access::{check_authentication, read_authorization, validation_clauses},
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::related,
    predicate::{
        PredicateOutput, WhereScope, compile_connection_where, compile_where, match_and_filter,
    },
};

/// Update the node bound to `variable`: `SET` its properties, run the nested relation operations,
/// then check `AFTER` validate rules and relationship cardinality.
pub(crate) fn update_node(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    input: &Val,
    with_vars: &[String],
    depth: usize,
) -> Result<Statement, TranslationError> {
    let (mut statement, touched) = write_updates(ctx, node_id, variable, input, with_vars, depth)?;
    statement.append(after_update(ctx, node_id, variable, &touched, with_vars, depth)?);
    Ok(statement)
}

/// A root update: match the nodes selected by `where` (and allowed by the `UPDATE` rules), apply
/// `update`, then the relation arguments (`connect`, `disconnect`, `create`, `delete`,
/// `connectOrCreate`) in argument order. Validation follows the last write.
pub(crate) fn update_root(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    arguments: &IndexMap<String, Val>,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let node = &system.nodes[node_id];
    let update = arguments.get("update").unwrap_or(&Val::Null);
    let touched = updated_fields(&node.fields, expect_object(update, "update")?);

    let filter = match arguments.get("where") {
        Some(where_) => compile_where(
            ctx,
            EntityId::Node(node_id),
            variable,
            where_,
            WhereScope::default(),
            depth,
        )?,
        None => PredicateOutput::default(),
    }
    .and(read_authorization(
        ctx,
        node_id,
        variable,
        &touched,
        &[AuthorizationOperation::Update],
        depth,
    )?);
    let mut statement = Statement::from(match_and_filter(
        Pattern::node(NodePattern::new(variable, node.labels.clone())),
        filter,
    ));

    let with_vars = [variable.to_string()];
    let (writes, touched) = write_updates(ctx, node_id, variable, update, &with_vars, depth)?;
    statement.append(writes);

    for (key, argument) in arguments {
        let operation = match key.as_str() {
            "where" | "update" => continue,
            other => NestedOperation::from_key(other)
                .filter(|operation| *operation != NestedOperation::Update)
                .ok_or_else(|| TranslationError::validation(key, "unknown update argument"))?,
        };
        statement.append(root_relation_argument(
            ctx, node_id, variable, operation, argument, depth,
        )?);
    }

    statement.append(after_update(ctx, node_id, variable, &touched, &with_vars, depth)?);
    Ok(statement)
}

fn write_updates<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    input: &Val,
    with_vars: &[String],
    depth: usize,
) -> Result<(Statement, Vec<&'a Field>), TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let node = &system.nodes[node_id];
    let object = expect_object(input, &node.name)?;

    let touched = updated_fields(&node.fields, object);
    check_authentication(ctx, Some(node), &touched, AuthenticationOperation::Update)?;

    let mut statement = Statement::new();
    let items = update_set_items(&node.fields, variable, object, &node.name)?;
    if !items.is_empty() {
        statement.push(Clause::Set(items));
    }

    let with_vars = carrying(with_vars, variable);
    let parent = Parent {
        node_id,
        variable,
        with_vars: &with_vars,
        created: false,
    };
    for (key, value) in relation_keys(&node.fields, object) {
        let Some(field) = node.field(key) else {
            continue;
        };
        statement.append(relation_operations(
            ctx,
            parent,
            field,
            value,
            UPDATE_OPERATIONS,
            depth + 1,
        )?);
    }
    Ok((statement, touched))
}

fn after_update<'a>(
    ctx: &mut QueryContext<'a>,
    node_id: NodeId,
    variable: &str,
    touched: &[&'a Field],
    with_vars: &[String],
    depth: usize,
) -> Result<Statement, TranslationError> {
    let mut statement = Statement::from(validation_clauses(
        ctx,
        node_id,
        variable,
        touched,
        &[AuthorizationOperation::Update],
        ValidationStage::After,
        depth,
    )?);

    let validations = cardinality_validations(ctx.system, node_id, variable);
    if !validations.is_empty() {
        statement.push(Clause::with_variables(&carrying(with_vars, variable)));
        statement.push_subqueries(validations);
    }
    Ok(statement)
}

/// `friends: [{where: {...}, update: {node: {...}, edge: {...}}}]`: update the related nodes (and
/// relationships) matching the where.
pub(super) fn nested_update(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    where_: Option<&Val>,
    element: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let target = scope.target;
    let parent = scope.parent;
    let item = expect_object(element, "update")?;

    let base = scope.chain.index(scope.item_index);
    let node_variable = base.resolve_name();
    let rel_variable = base.push("relationship").resolve_name();

    let node_input = match (scope.relation.target, item.get("node")) {
        (EntityId::Interface(_), Some(node_input)) => Val::Object(input_for_node(
            expect_object(node_input, "node")?,
            target.node,
        )?),
        (_, Some(node_input)) => node_input.clone(),
        (_, None) => Val::Null,
    };
    let touched = updated_fields(
        &system.nodes[target.node_id].fields,
        expect_object(&node_input, "node")?,
    );

    let matched = match where_ {
        Some(where_) => compile_connection_where(
            ctx,
            scope.relation,
            target.where_entity(scope.relation),
            &rel_variable,
            &node_variable,
            expect_object(where_, "where")?,
            WhereScope::default(),
            depth + 1,
        )?,
        None => PredicateOutput::default(),
    };
    let filter = matched.and(read_authorization(
        ctx,
        target.node_id,
        &node_variable,
        &touched,
        &[AuthorizationOperation::Update],
        depth + 1,
    )?);

    let mut inner = Statement::new().then(scope.carry());
    inner.append(Statement::from(match_and_filter(
        related(
            parent.variable,
            scope.relation,
            Some(&rel_variable),
            NodePattern::new(&node_variable, target.node.labels.clone()),
        ),
        filter,
    )));

    if let Some(edge) = item.get("edge") {
        let properties = scope.relation.properties.ok_or_else(|| {
            TranslationError::validation(&scope.field.name, "relationship has no properties")
        })?;
        let properties = system.relationship_properties(properties);
        let items = update_set_items(
            &properties.fields,
            &rel_variable,
            expect_object(edge, "edge")?,
            &properties.name,
        )?;
        if !items.is_empty() {
            inner.push(Clause::Set(items));
        }
    }

    inner.append(update_node(
        ctx,
        target.node_id,
        &node_variable,
        &node_input,
        parent.with_vars,
        depth + 1,
    )?);
    inner.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        functions::count_star(),
        format!("update_{node_variable}"),
    )])));

    Ok(Statement::new().then(scope.carry()).then(Clause::call(inner)))
}

/// A relation operation given as a top-level argument of an update (`connect: {friends: [...]}`),
/// applied to the node bound to `variable`.
fn root_relation_argument(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    operation: NestedOperation,
    input: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let with_vars = [variable.to_string()];
    let parent = Parent {
        node_id,
        variable,
        with_vars: &with_vars,
        created: false,
    };
    keyed_relation_operations(ctx, parent, operation, input, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        test_support::{assert_in_order, node_id, render, user, val, with_context},
    };
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn update(
        auth: &AuthContext,
        node: &str,
        input: serde_json::Value,
    ) -> Result<(String, exo_cypher::Params), TranslationError> {
        with_context(auth, |ctx| {
            let node_id = node_id(ctx.system, node);
            let statement =
                update_node(ctx, node_id, "this", &val(input), &["this".to_string()], 0)?;
            Ok(render(&statement))
        })
    }

    #[multiplatform_test]
    fn nested_update_matches_then_sets() {
        let (cypher, params) = update(
            &AuthContext::anonymous(),
            "Person",
            json!({
                "name": "A",
                "friends": [{"where": {"node": {"name": "B"}}, "update": {"node": {"age_INCREMENT": 1}}}]
            }),
        )
        .unwrap();

        assert!(
            cypher.starts_with(
                "SET this.name = $this_update_name\n\
                 WITH this\n\
                 CALL {\n\
                 WITH this\n\
                 MATCH (this)-[this_friends0_relationship:FRIEND_OF]->(this_friends0:Person)\n\
                 WHERE this_friends0.name = $param0\n\
                 SET this_friends0.age = (this_friends0.age + $this_friends0_update_age_INCREMENT)\n\
                 WITH this, this_friends0\n\
                 CALL {\n"
            ),
            "{cypher}"
        );
        assert_in_order(
            &cypher,
            &[
                "RETURN count(*) AS update_this_friends0\n}\nWITH this\nCALL {\n",
                "RETURN c AS this_bestFriend_Person_unique_ignored\n}",
            ],
        );
        assert_eq!(params.get("this_friends0_update_age_INCREMENT"), Some(&json!(1)));
    }

    #[multiplatform_test]
    fn listed_relation_items_get_their_own_names() {
        let (cypher, params) = update(
            &AuthContext::anonymous(),
            "Person",
            json!({"friends": [
                {"create": [{"node": {"name": "B"}}]},
                {"create": [{"node": {"name": "C"}}]},
                {"connectOrCreate": [{
                    "where": {"node": {"id": "d"}},
                    "onCreate": {"node": {"name": "D"}}
                }]},
                {"connectOrCreate": [{
                    "where": {"node": {"id": "e"}},
                    "onCreate": {"node": {"name": "E"}}
                }]}
            ]}),
        )
        .unwrap();

        assert_in_order(
            &cypher,
            &[
                "CREATE (this_friends0_create0_node:Person)",
                "CREATE (this_friends1_create0_node:Person)",
                "MERGE (this_friends2_connectOrCreate0_node:Person",
                "MERGE (this_friends3_connectOrCreate0_node:Person",
            ],
        );
        assert_eq!(params.get("this_friends0_create0_node_name"), Some(&json!("B")));
        assert_eq!(params.get("this_friends1_create0_node_name"), Some(&json!("C")));
        assert_eq!(
            params.get("this_friends2_connectOrCreate0_node_where_id"),
            Some(&json!("d"))
        );
        assert_eq!(
            params.get("this_friends3_connectOrCreate0_node_where_id"),
            Some(&json!("e"))
        );
    }

    #[multiplatform_test]
    fn interface_updates_with_edges() {
        let (cypher, _) = update(
            &AuthContext::anonymous(),
            "Person",
            json!({"actedIn": [{
                "where": {"edge": {"role": "extra"}},
                "update": {
                    "node": {"title": "T", "_on": {"Movie": {"runtime": 90}}},
                    "edge": {"since_INCREMENT": 1}
                }
            }]}),
        )
        .unwrap();

        assert_in_order(
            &cypher,
            &[
                "MATCH (this)-[this_actedIn_Movie0_relationship:ACTED_IN]->(this_actedIn_Movie0:Movie)\n\
                 WHERE this_actedIn_Movie0_relationship.role = $param0\n\
                 SET this_actedIn_Movie0_relationship.since = (this_actedIn_Movie0_relationship.since + \
                 $this_actedIn_Movie0_relationship_update_since_INCREMENT)\n\
                 SET this_actedIn_Movie0.title = $this_actedIn_Movie0_update_title, \
                 this_actedIn_Movie0.runtime = $this_actedIn_Movie0_update_runtime, \
                 this_actedIn_Movie0.updatedAt = datetime()",
                "MATCH (this)-[this_actedIn_Series0_relationship:ACTED_IN]->(this_actedIn_Series0:Series)\n\
                 WHERE this_actedIn_Series0_relationship.role = $param1\n",
                "SET this_actedIn_Series0.title = $this_actedIn_Series0_update_title\n",
            ],
        );
    }

    #[multiplatform_test]
    fn updated_posts_are_validated() {
        let (cypher, _) = update(&user("u1", &[]), "Post", json!({"content": "edited"})).unwrap();
        assert_in_order(
            &cypher,
            &[
                "SET this.content = $this_update_content\nWITH *\n",
                "'@neo4j/graphql/FORBIDDEN', [0])",
                "'@neo4j/graphql/RELATIONSHIP-REQUIREDPost.author required', [0])",
            ],
        );
    }

    #[multiplatform_test]
    fn root_arguments_apply_to_the_updated_node() {
        let cypher = with_context(&AuthContext::anonymous(), |ctx| {
            let person = node_id(ctx.system, "Person");
            let input = val(json!({"friends": [{"where": {"node": {"name": "B"}}}]}));
            root_relation_argument(ctx, person, "this", NestedOperation::Connect, &input, 0)
                .map(|statement| render(&statement).0)
        })
        .unwrap();
        assert!(cypher.starts_with(
            "WITH this\nCALL {\nWITH this\nOPTIONAL MATCH (this_friends_connect0_node:Person)"
        ));

        let invalid = with_context(&AuthContext::anonymous(), |ctx| {
            let person = node_id(ctx.system, "Person");
            let input = val(json!({"name": "x"}));
            root_relation_argument(ctx, person, "this", NestedOperation::Disconnect, &input, 0)
        });
        assert!(matches!(invalid, Err(TranslationError::Validation(..))));
    }
}
