// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{Clause, NodePattern, Pattern, Statement};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation, ValidationStage},
    entity::{EntityId, NodeId},
    field::{Field, FieldKind},
};

use super::{
    CREATE_OPERATIONS, Parent, RelationScope, cardinality_validations, carrying,
    relation_operations,
    set_properties::{create_set_items, relation_keys},
};
use crate::{
    access::{check_authentication, validation_clauses},
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    pattern::related,
};

/// `CREATE` of the node bound to `variable`, its properties and nested relation inputs, followed by
/// its `AFTER` validation and relationship cardinality checks.
pub(crate) fn create_node(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    input: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let (mut statement, touched) = write_node(ctx, node_id, variable, input, &[], depth)?;
    statement.append(after_create(ctx, node_id, variable, &touched, &[], depth)?);
    Ok(statement)
}

/// The node's scalar fields named by the input.
fn written_fields<'a>(fields: &'a [Field], input: &Val) -> Vec<&'a Field> {
    let Val::Object(input) = input else {
        return vec![];
    };
    fields
        .iter()
        .filter(|field| matches!(field.kind, FieldKind::Scalar(_)) && input.contains_key(&field.name))
        .collect()
}

fn write_node<'a>(
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

    let touched = written_fields(&node.fields, input);
    check_authentication(ctx, Some(node), &touched, AuthenticationOperation::Create)?;

    let mut statement = Statement::new().then(Clause::Create(vec![Pattern::node(
        NodePattern::new(variable, node.labels.clone()),
    )]));
    let items = create_set_items(&node.fields, variable, object, &node.name)?;
    if !items.is_empty() {
        statement.push(Clause::Set(items));
    }

    let with_vars = carrying(with_vars, variable);
    let parent = Parent {
        node_id,
        variable,
        with_vars: &with_vars,
        created: true,
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
            CREATE_OPERATIONS,
            depth + 1,
        )?);
    }

    Ok((statement, touched))
}

/// `AFTER` create validation, then cardinality checks, once every write touching the node is done.
fn after_create<'a>(
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
        &[AuthorizationOperation::Create],
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

/// `create: [{node: {...}, edge: {...}}]` below a relation: create the node, then merge the
/// relationship from the parent.
pub(super) fn nested_create(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    element: &Val,
    index: usize,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let target = scope.target;
    let item = expect_object(element, "create")?;

    // Interface creates name the implementation: `{node: {Movie: {...}}}`
    let node_input = match (scope.relation.target, item.get("node")) {
        (EntityId::Interface(_), Some(node_input)) => {
            let by_node = expect_object(node_input, "node")?;
            let implementations = system.concrete_nodes(scope.relation.target);
            if let Some(unknown) = by_node.keys().find(|name| {
                !implementations
                    .iter()
                    .any(|node_id| system.nodes[*node_id].name == **name)
            }) {
                return Err(TranslationError::validation(
                    &scope.field.name,
                    format!("{unknown} does not implement the interface"),
                ));
            }
            match by_node.get(&target.node.name) {
                Some(node_input) => node_input,
                None => return Ok(Statement::new()),
            }
        }
        (_, Some(node_input)) => node_input,
        (_, None) => &Val::Null,
    };

    let base = if scope.parent.created && !scope.listed {
        scope.chain.index(index)
    } else {
        scope.item_chain().push("create").index(index)
    };
    let node_variable = base.push("node").resolve_name();

    let mut statement = Statement::new().then(scope.carry());
    let (written, touched) = write_node(
        ctx,
        target.node_id,
        &node_variable,
        node_input,
        scope.parent.with_vars,
        depth + 1,
    )?;
    statement.append(written);

    let rel_variable = scope
        .relation
        .properties
        .map(|_| base.push("relationship").resolve_name());
    statement.push(Clause::Merge {
        pattern: related(
            scope.parent.variable,
            scope.relation,
            rel_variable.as_deref(),
            NodePattern::named(&node_variable),
        ),
        on_create: vec![],
    });

    match (scope.relation.properties, &rel_variable) {
        (Some(properties), Some(rel_variable)) => {
            let properties = system.relationship_properties(properties);
            let edge = expect_object(item.get("edge").unwrap_or(&Val::Null), "edge")?;
            let items = create_set_items(&properties.fields, rel_variable, edge, &properties.name)?;
            if !items.is_empty() {
                statement.push(Clause::Set(items));
            }
        }
        _ => {
            if item.contains_key("edge") {
                return Err(TranslationError::validation(
                    &scope.field.name,
                    "relationship has no properties",
                ));
            }
        }
    }

    statement.append(after_create(
        ctx,
        target.node_id,
        &node_variable,
        &touched,
        scope.parent.with_vars,
        depth,
    )?);
    Ok(statement)
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

    fn create(
        auth: &AuthContext,
        node: &str,
        input: serde_json::Value,
    ) -> Result<(String, exo_cypher::Params), TranslationError> {
        with_context(auth, |ctx| {
            let node_id = node_id(ctx.system, node);
            let statement = create_node(ctx, node_id, "this0", &val(input), 0)?;
            Ok(render(&statement))
        })
    }

    #[multiplatform_test]
    fn nested_create_in_dependency_order() {
        let (cypher, params) = create(
            &AuthContext::anonymous(),
            "Person",
            json!({"name": "A", "friends": {"create": [{"node": {"name": "B"}}]}}),
        )
        .unwrap();

        assert_eq!(
            cypher,
            "CREATE (this0:Person)\n\
             SET this0.id = randomUUID(), this0.name = $this0_name\n\
             WITH this0\n\
             CREATE (this0_friends0_node:Person)\n\
             SET this0_friends0_node.id = randomUUID(), this0_friends0_node.name = $this0_friends0_node_name\n\
             MERGE (this0)-[:FRIEND_OF]->(this0_friends0_node)\n\
             WITH this0, this0_friends0_node\n\
             CALL {\n\
             WITH this0_friends0_node\n\
             MATCH (this0_friends0_node)-[this0_friends0_node_bestFriend_Person_unique:BEST_FRIEND]->(:Person)\n\
             WITH count(this0_friends0_node_bestFriend_Person_unique) AS c\n\
             CALL apoc.util.validate(c > 1, '@neo4j/graphql/RELATIONSHIP-REQUIREDPerson.bestFriend required', [0])\n\
             RETURN c AS this0_friends0_node_bestFriend_Person_unique_ignored\n\
             }\n\
             WITH this0\n\
             CALL {\n\
             WITH this0\n\
             MATCH (this0)-[this0_bestFriend_Person_unique:BEST_FRIEND]->(:Person)\n\
             WITH count(this0_bestFriend_Person_unique) AS c\n\
             CALL apoc.util.validate(c > 1, '@neo4j/graphql/RELATIONSHIP-REQUIREDPerson.bestFriend required', [0])\n\
             RETURN c AS this0_bestFriend_Person_unique_ignored\n\
             }"
        );
        assert_eq!(params.get("this0_name"), Some(&json!("A")));
        assert_eq!(params.get("this0_friends0_node_name"), Some(&json!("B")));
    }

    #[multiplatform_test]
    fn interface_creates_with_edge_properties() {
        let (cypher, params) = create(
            &AuthContext::anonymous(),
            "Person",
            json!({
                "name": "A",
                "actedIn": {"create": [{
                    "node": {"Series": {"title": "S"}},
                    "edge": {"role": "lead"}
                }]}
            }),
        )
        .unwrap();

        assert_in_order(
            &cypher,
            &[
                "CREATE (this0_actedIn_Series0_node:Series)\n\
                 SET this0_actedIn_Series0_node.title = $this0_actedIn_Series0_node_title, \
                 this0_actedIn_Series0_node.episodes = $this0_actedIn_Series0_node_episodes\n",
                "MERGE (this0)-[this0_actedIn_Series0_relationship:ACTED_IN]->(this0_actedIn_Series0_node)\n\
                 SET this0_actedIn_Series0_relationship.role = $this0_actedIn_Series0_relationship_role",
            ],
        );
        // No Movie was asked for
        assert!(!cypher.contains(":Movie"));
        assert_eq!(params.get("this0_actedIn_Series0_node_episodes"), Some(&json!(1)));
    }

    #[multiplatform_test]
    fn created_nodes_are_validated_after_their_relationships() {
        let (cypher, _) = create(
            &user("u1", &[]),
            "Person",
            json!({"name": "A", "posts": {"create": [{"node": {"content": "hi"}}]}}),
        )
        .unwrap();

        assert_in_order(
            &cypher,
            &[
                "CREATE (this0_posts0_node:Post)",
                "MERGE (this0)-[:HAS_POST]->(this0_posts0_node)\nWITH *\nCALL apoc.util.validate(",
                "this0_posts0_node)<-[:HAS_POST]-(",
                "'@neo4j/graphql/FORBIDDEN', [0])",
                "'@neo4j/graphql/RELATIONSHIP-REQUIREDPost.author required', [0])",
            ],
        );
    }

    #[multiplatform_test]
    fn invalid_creates() {
        let anonymous = AuthContext::anonymous();
        for input in [
            json!({"name": "A", "friends": {"update": {}}}),
            json!({"name": "A", "friends": {"create": [{"node": {"name": "B"}, "edge": {}}]}}),
            json!({"name": "A", "likes": {"Post": {"create": []}}}),
            json!({"name": "A", "actedIn": {"create": [{"node": {"Post": {"content": "x"}}}]}}),
            json!({"name": "A", "nickname": "a"}),
        ] {
            assert!(
                matches!(
                    create(&anonymous, "Person", input.clone()),
                    Err(TranslationError::Validation(..))
                ),
                "{input} should be rejected"
            );
        }

        // Reading an email requires authentication; writing one does not
        assert!(create(&anonymous, "Person", json!({"name": "A", "email": "a@b"})).is_ok());
    }
}
