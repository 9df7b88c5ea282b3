// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{ExpressionBuilder, Params};
use graph_model::{
    access::{
        AuthenticationAnnotation, AuthenticationOperation, AuthorizationAnnotation,
        AuthorizationOperation, FilterRule, ValidateRule, ValidationStage,
    },
    builder::{
        FieldDefinition, InterfaceDefinition, NodeDefinition, RelationshipPropertiesDefinition,
        TypeDefinitions, UnionDefinition, build,
    },
    entity::{EntityId, NodeId},
    field::{RelationshipDirection, TimestampOperation},
    subsystem::GraphSubsystem,
    types::FieldType,
};
use indexmap::IndexMap;

use crate::{config::TranslatorConfig, context::AuthContext, context::QueryContext};

fn definitions() -> TypeDefinitions {
    let owner_only = || {
        Val::from(serde_json::json!({"node": {"author": {"id": "$jwt.sub"}}}))
    };

    TypeDefinitions {
        nodes: vec![
            NodeDefinition::new(
                "Person",
                vec![
                    FieldDefinition::scalar("id", FieldType::named("ID").required())
                        .autogenerate(),
                    FieldDefinition::scalar("name", FieldType::named("String").required()),
                    FieldDefinition::scalar("age", FieldType::named("Int")),
                    FieldDefinition::scalar("score", FieldType::named("Int"))
                        .coalesce(Val::from(0)),
                    FieldDefinition::scalar("tags", FieldType::list_of("String")),
                    FieldDefinition::scalar("location", FieldType::named("Point")),
                    FieldDefinition::scalar("email", FieldType::named("String"))
                        .db_name("emailAddress")
                        .authentication(AuthenticationAnnotation {
                            operations: vec![AuthenticationOperation::Read],
                            jwt: None,
                        }),
                    FieldDefinition::relationship(
                        "friends",
                        FieldType::list_of("Person"),
                        "FRIEND_OF",
                        RelationshipDirection::Out,
                    ),
                    FieldDefinition::relationship(
                        "bestFriend",
                        FieldType::named("Person"),
                        "BEST_FRIEND",
                        RelationshipDirection::Out,
                    ),
                    FieldDefinition::relationship(
                        "actedIn",
                        FieldType::list_of("Production"),
                        "ACTED_IN",
                        RelationshipDirection::Out,
                    )
                    .properties("ActedIn"),
                    FieldDefinition::relationship(
                        "likes",
                        FieldType::list_of("Search"),
                        "LIKES",
                        RelationshipDirection::Out,
                    ),
                    FieldDefinition::relationship(
                        "posts",
                        FieldType::list_of("Post"),
                        "HAS_POST",
                        RelationshipDirection::Out,
                    ),
                    FieldDefinition::computed(
                        "displayName",
                        FieldType::named("String"),
                        &["name", "age"],
                    ),
                    FieldDefinition::cypher(
                        "friendCount",
                        FieldType::named("Int"),
                        "MATCH (this)-[:FRIEND_OF]->(f:Person)\nRETURN count(f) AS result",
                        "result",
                    ),
                ],
            ),
            NodeDefinition::new(
                "Movie",
                vec![
                    FieldDefinition::scalar("id", FieldType::named("ID").required())
                        .autogenerate(),
                    FieldDefinition::scalar("title", FieldType::named("String")),
                    FieldDefinition::scalar("runtime", FieldType::named("Int")),
                    FieldDefinition::scalar("rating", FieldType::named("Float")),
                    FieldDefinition::scalar("createdAt", FieldType::named("DateTime"))
                        .timestamps(vec![TimestampOperation::Create]),
                    FieldDefinition::scalar("updatedAt", FieldType::named("DateTime"))
                        .timestamps(vec![TimestampOperation::Update]),
                ],
            )
            .implements("Production"),
            NodeDefinition::new(
                "Series",
                vec![
                    FieldDefinition::scalar("title", FieldType::named("String")),
                    FieldDefinition::scalar("episodes", FieldType::named("Int"))
                        .default_value(Val::from(1)),
                ],
            )
            .implements("Production"),
            NodeDefinition::new(
                "Post",
                vec![
                    FieldDefinition::scalar("id", FieldType::named("ID").required())
                        .autogenerate(),
                    FieldDefinition::scalar("content", FieldType::named("String")),
                    FieldDefinition::relationship(
                        "author",
                        FieldType::named("Person").required(),
                        "HAS_POST",
                        RelationshipDirection::In,
                    ),
                ],
            )
            .authorization(AuthorizationAnnotation {
                filter: vec![
                    FilterRule::new(owner_only())
                        .with_operations(vec![AuthorizationOperation::Read]),
                ],
                validate: vec![
                    ValidateRule::new(owner_only())
                        .with_operations(vec![
                            AuthorizationOperation::Create,
                            AuthorizationOperation::Update,
                        ])
                        .when(vec![ValidationStage::After]),
                ],
            })
            .authentication(AuthenticationAnnotation {
                operations: vec![AuthenticationOperation::Delete],
                jwt: Some(Val::from(serde_json::json!({"roles_INCLUDES": "admin"}))),
            }),
        ],
        interfaces: vec![InterfaceDefinition::new(
            "Production",
            vec![FieldDefinition::scalar("title", FieldType::named("String"))],
        )],
        unions: vec![UnionDefinition::new("Search", &["Movie", "Series"])],
        relationship_properties: vec![RelationshipPropertiesDefinition::new(
            "ActedIn",
            vec![
                FieldDefinition::scalar("role", FieldType::named("String")),
                FieldDefinition::scalar("since", FieldType::named("Int")),
            ],
        )],
        ..TypeDefinitions::default()
    }
}

pub(crate) fn test_system() -> GraphSubsystem {
    match build(&definitions()) {
        Ok(system) => system,
        Err(e) => panic!("test schema does not build: {e}"),
    }
}

pub(crate) fn node_id(system: &GraphSubsystem, name: &str) -> NodeId {
    match system.nodes.get_id(name) {
        Some(id) => id,
        None => panic!("no node {name}"),
    }
}

pub(crate) fn entity_id(system: &GraphSubsystem, name: &str) -> EntityId {
    match system.entity_id(name) {
        Some(id) => id,
        None => panic!("no entity {name}"),
    }
}

pub(crate) fn val(value: serde_json::Value) -> Val {
    Val::from(value)
}

pub(crate) fn user(sub: &str, roles: &[&str]) -> AuthContext {
    AuthContext::authenticated(
        IndexMap::from([("sub".to_string(), Val::from(sub))]),
        roles.iter().map(|role| role.to_string()).collect(),
    )
}

/// Run `f` with a fresh context over the test schema.
pub(crate) fn with_context<T>(
    auth: &AuthContext,
    f: impl FnOnce(&mut QueryContext<'_>) -> T,
) -> T {
    let system = test_system();
    let config = TranslatorConfig::default();
    let mut ctx = QueryContext::new(&system, auth, &config);
    f(&mut ctx)
}

pub(crate) fn render(fragment: &impl ExpressionBuilder) -> (String, Params) {
    let mut builder = exo_cypher::CypherBuilder::new();
    fragment.build(&mut builder);
    builder.into_cypher()
}

/// Assert that the fragments occur in `text` in the given order.
pub(crate) fn assert_in_order(text: &str, fragments: &[&str]) {
    let mut from = 0;
    for fragment in fragments {
        match text[from..].find(fragment) {
            Some(position) => from += position + fragment.len(),
            None => panic!("`{fragment}` not found (in order) in:\n{text}"),
        }
    }
}
