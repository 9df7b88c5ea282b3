// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Shaping of read results.
//!
//! A node is projected as a map projection over its variable (`this { .name, friends: this0 }`).
//! Anything that needs its own match (relations, connections, aggregates, cypher fields) is
//! computed by a `CALL` subquery that runs before the projection and returns a single column,
//! which the projection then refers to.

pub(crate) mod aggregate;
mod connection;
mod options;
mod relation;

use exo_cypher::{
    Clause, Condition, Expression, MapProjectionItem, Pattern, Projection, ReturnItem, Statement,
};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation},
    entity::{EntityId, Node, NodeId},
    field::{Field, FieldKind, ScalarField},
};

use crate::{
    access::{check_authentication, read_authorization},
    context::QueryContext,
    error::TranslationError,
    predicate::{PredicateOutput, match_and_filter},
    selection::SelectionField,
};

pub(crate) use connection::{connection_subquery, root_connection};
pub(crate) use options::{ReadOptions, SortField};

/// Key under which abstract branches report their concrete type.
pub(crate) const RESOLVE_TYPE: &str = "__resolveType";

#[derive(Debug, Clone)]
pub(crate) struct ProjectionOutput {
    pub projection: Expression,
    /// Must run (as `CALL`s) before the projection is evaluated
    pub subqueries: Vec<Statement>,
}

/// The model fields a selection touches, each once.
pub(crate) fn touched_fields<'a>(node: &'a Node, selection: &[&SelectionField]) -> Vec<&'a Field> {
    let mut fields: Vec<&Field> = vec![];
    for selected in selection {
        if let Some(field) = node.field(&selected.name) {
            if !fields.iter().any(|f| f.name == field.name) {
                fields.push(field);
            }
        }
    }
    fields
}

/// Project `variable`, bound to a `node_id` node, according to `selection`.
///
/// `extra_fields` are projected under their own name unless already selected (sort keys applied
/// after the projection). With `discriminator`, the projection reports the node's name as
/// `__resolveType`.
pub(crate) fn project_node(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    selection: &[&SelectionField],
    extra_fields: &[&str],
    discriminator: bool,
    depth: usize,
) -> Result<ProjectionOutput, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let node = &system.nodes[node_id];

    check_authentication(
        ctx,
        Some(node),
        &touched_fields(node, selection),
        AuthenticationOperation::Read,
    )?;

    let mut items = ProjectionItems::default();
    let mut subqueries = vec![];

    for selected in selection {
        let key = selected.output_name();

        if selected.name == "__typename" {
            items.push(key, Some(Expression::string(&node.name)));
            continue;
        }

        let Some(field) = node.field(&selected.name) else {
            let relation_field = selected
                .name
                .strip_suffix("Aggregate")
                .and_then(|name| node.field(name))
                .filter(|field| field.as_relation().is_some())
                .ok_or_else(|| {
                    TranslationError::validation(
                        &selected.name,
                        format!("no such field on {}", node.name),
                    )
                })?;
            let result = ctx.next_variable();
            subqueries.push(relation::aggregate_subquery(
                ctx,
                variable,
                &node.name,
                relation_field,
                selected,
                &result,
                depth + 1,
            )?);
            items.push(key, Some(Expression::variable(result)));
            continue;
        };

        match &field.kind {
            FieldKind::Scalar(scalar) => items.push_scalar(variable, key, field, scalar),
            FieldKind::Relation(relation) => {
                let result = ctx.next_variable();
                let value = relation::relation_subquery(
                    ctx,
                    variable,
                    field,
                    relation,
                    selected,
                    &result,
                    depth + 1,
                )?;
                match value {
                    Some(subquery) => {
                        subqueries.push(subquery);
                        items.push(key, Some(Expression::variable(result)));
                    }
                    // No branch can match
                    None if field.is_list() => items.push(key, Some(Expression::List(vec![]))),
                    None => items.push(key, Some(Expression::null())),
                }
            }
            FieldKind::Connection(connection) => {
                let relation_field = node.field(&connection.relation_field).ok_or_else(|| {
                    TranslationError::Generic(format!(
                        "connection {} has no relation field {}",
                        field.name, connection.relation_field
                    ))
                })?;
                let result = ctx.next_variable();
                subqueries.push(connection_subquery(
                    ctx,
                    variable,
                    relation_field,
                    selected,
                    &result,
                    depth + 1,
                )?);
                items.push(key, Some(Expression::variable(result)));
            }
            FieldKind::Computed(computed) => {
                for required in &computed.requires {
                    if let Some(required) = node.field(required) {
                        if let FieldKind::Scalar(scalar) = &required.kind {
                            items.push_scalar(variable, &required.name, required, scalar);
                        }
                    }
                }
            }
            FieldKind::Cypher(cypher) => {
                let result = ctx.next_variable();
                subqueries.push(relation::cypher_subquery(
                    ctx,
                    variable,
                    field,
                    cypher,
                    selected,
                    &result,
                    depth + 1,
                )?);
                items.push(key, Some(Expression::variable(result)));
            }
            FieldKind::Interface(_) | FieldKind::Union(_) | FieldKind::Object(_) => {
                items.push_property(variable, key, field.db_name());
            }
            FieldKind::Ignored => {}
        }
    }

    for extra in extra_fields {
        if let Some(field) = node.field(extra) {
            if let FieldKind::Scalar(scalar) = &field.kind {
                items.push_scalar(variable, extra, field, scalar);
            }
        }
    }

    if discriminator {
        items.push(RESOLVE_TYPE, Some(Expression::string(&node.name)));
    }

    Ok(ProjectionOutput {
        projection: Expression::project(variable, items.items),
        subqueries,
    })
}

#[derive(Default)]
struct ProjectionItems {
    keys: Vec<String>,
    items: Vec<MapProjectionItem>,
}

impl ProjectionItems {
    /// Add `key: value`, or `.key` when `value` is `None`. A key is projected once.
    fn push(&mut self, key: &str, value: Option<Expression>) {
        if self.keys.iter().any(|existing| existing == key) {
            return;
        }
        self.keys.push(key.to_string());
        self.items.push(match value {
            Some(value) => MapProjectionItem::Entry(key.to_string(), value),
            None => MapProjectionItem::Property(key.to_string()),
        });
    }

    fn push_property(&mut self, variable: &str, key: &str, db_name: &str) {
        if key == db_name {
            self.push(key, None);
        } else {
            self.push(key, Some(Expression::variable(variable).property(db_name)));
        }
    }

    fn push_scalar(&mut self, variable: &str, key: &str, field: &Field, scalar: &ScalarField) {
        if !scalar.kind.is_spatial() {
            return self.push_property(variable, key, field.db_name());
        }

        let property = Expression::variable(variable).property(field.db_name());
        let value = if field.is_list() {
            Expression::list_comprehension(
                "p",
                property,
                None,
                Some(point_map(Expression::variable("p"))),
            )
        } else {
            Expression::Case {
                alternatives: vec![(Condition::IsNotNull(property.clone()), point_map(property))],
                otherwise: Some(Box::new(Expression::null())),
            }
        };
        self.push(key, Some(value));
    }
}

/// `{point: p, crs: p.crs}`
fn point_map(point: Expression) -> Expression {
    Expression::map(vec![
        ("point".to_string(), point.clone()),
        ("crs".to_string(), point.property("crs")),
    ])
}

/// Clauses that match one concrete node of a read and prepare its projection: `MATCH` with the
/// where and read authorization, then the projection's subqueries. The projection itself is
/// returned for the caller to place.
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_node(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    pattern: Pattern,
    variable: &str,
    filter: PredicateOutput,
    selection: &[&SelectionField],
    extra_fields: &[&str],
    discriminator: bool,
    depth: usize,
) -> Result<(Vec<Clause>, Expression), TranslationError> {
    let system = ctx.system;
    let node = &system.nodes[node_id];
    let fields = touched_fields(node, selection);

    let authorization = read_authorization(
        ctx,
        node_id,
        variable,
        &fields,
        &[AuthorizationOperation::Read],
        depth,
    )?;

    let projection = project_node(
        ctx,
        node_id,
        variable,
        selection,
        extra_fields,
        discriminator,
        depth,
    )?;

    let mut clauses = match_and_filter(pattern, filter.and(authorization));
    clauses.extend(projection.subqueries.into_iter().map(Clause::call));
    Ok((clauses, projection.projection))
}

/// `WITH <projection> AS variable`
pub(crate) fn with_projection(projection: Expression, variable: &str) -> Clause {
    Clause::With(Projection::new(vec![ReturnItem::aliased(
        projection, variable,
    )]))
}

/// Whether `entity` resolves to several node types, in which case each result carries a
/// discriminator.
pub(crate) fn is_abstract(entity: EntityId) -> bool {
    !matches!(entity, EntityId::Node(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        selection::SelectionSet,
        test_support::{assert_in_order, node_id, render, user, with_context},
    };
    use multiplatform_test::multiplatform_test;

    fn project(
        auth: &AuthContext,
        selection: Vec<SelectionField>,
    ) -> Result<(String, String), TranslationError> {
        with_context(auth, |ctx| {
            let person = node_id(ctx.system, "Person");
            let selection: Vec<&SelectionField> = selection.iter().collect();
            let output = project_node(ctx, person, "this", &selection, &[], false, 0)?;
            let subqueries = output
                .subqueries
                .into_iter()
                .map(Clause::call)
                .collect::<Vec<_>>();
            Ok((
                render(&output.projection).0,
                render(&Statement::from(subqueries)).0,
            ))
        })
    }

    #[multiplatform_test]
    fn scalars() {
        let (projection, subqueries) = project(
            &AuthContext::anonymous(),
            vec![
                SelectionField::new("__typename"),
                SelectionField::new("name"),
                SelectionField::new("name").aliased("fullName"),
                SelectionField::new("location"),
                SelectionField::new("displayName"),
            ],
        )
        .unwrap();

        assert_eq!(
            projection,
            "this { __typename: 'Person', .name, fullName: this.name, location: CASE WHEN this.location IS NOT NULL THEN {point: this.location, crs: this.location.crs} ELSE NULL END, .age }"
        );
        assert!(subqueries.is_empty());
    }

    #[multiplatform_test]
    fn aliased_db_names_and_field_authentication() {
        let email = || vec![SelectionField::new("email")];

        assert!(matches!(
            project(&AuthContext::anonymous(), email()),
            Err(TranslationError::AuthenticationRequired)
        ));

        let (projection, _) = project(&user("u1", &[]), email()).unwrap();
        assert_eq!(projection, "this { email: this.emailAddress }");
    }

    #[multiplatform_test]
    fn relation_fields() {
        let (projection, subqueries) = project(
            &AuthContext::anonymous(),
            vec![
                SelectionField::new("friends")
                    .argument("where", crate::test_support::val(serde_json::json!({"age_GT": 30})))
                    .selecting(SelectionSet::new(vec![SelectionField::new("name")])),
                SelectionField::new("bestFriend")
                    .selecting(SelectionSet::new(vec![SelectionField::new("name")])),
                SelectionField::new("friendsAggregate")
                    .selecting(SelectionSet::new(vec![SelectionField::new("count")])),
            ],
        )
        .unwrap();

        assert_eq!(
            projection,
            "this { friends: this0, bestFriend: this2, friendsAggregate: this4 }"
        );
        assert_eq!(
            subqueries,
            "CALL {\n\
             WITH this\n\
             MATCH (this)-[:FRIEND_OF]->(this1:Person)\n\
             WHERE this1.age > $param2\n\
             WITH this1 { .name } AS this1\n\
             RETURN collect(this1) AS this0\n\
             }\n\
             CALL {\n\
             WITH this\n\
             MATCH (this)-[:BEST_FRIEND]->(this3:Person)\n\
             WITH this3 { .name } AS this3\n\
             RETURN head(collect(this3)) AS this2\n\
             }\n\
             CALL {\n\
             WITH this\n\
             MATCH (this)-[:FRIEND_OF]->(this5:Person)\n\
             RETURN {count: count(this5)} AS this4\n\
             }"
        );
    }

    #[multiplatform_test]
    fn relation_property_aggregates() {
        let names = |names: &[&str]| {
            SelectionSet::new(names.iter().map(|name| SelectionField::new(*name)).collect())
        };
        let (projection, subqueries) = project(
            &AuthContext::anonymous(),
            vec![SelectionField::new("actedInAggregate").selecting(SelectionSet::new(vec![
                SelectionField::new("count"),
                SelectionField::new("__typename"),
                SelectionField::new("node").selecting(SelectionSet::new(vec![
                    SelectionField::new("title").selecting(names(&["longest"])),
                ])),
                SelectionField::new("edge").selecting(SelectionSet::new(vec![
                    SelectionField::new("since").selecting(names(&["min", "max"])),
                    SelectionField::new("__typename"),
                ])),
            ]))],
        )
        .unwrap();

        assert_eq!(projection, "this { actedInAggregate: this0 }");
        assert_eq!(
            subqueries,
            "CALL {\n\
             WITH this\n\
             MATCH (this)-[this2:ACTED_IN]->(this1)\n\
             RETURN {count: count(this1), __typename: 'PersonProductionActedInAggregationSelection', \
             node: {title: {longest: reduce(current = head(collect(this1.title)), candidate IN collect(this1.title) | CASE WHEN size(candidate) > size(current) THEN candidate ELSE current END)}}, \
             edge: {since: {min: min(this2.since), max: max(this2.since)}, __typename: 'PersonProductionActedInEdgeAggregateSelection'}} AS this0\n\
             }"
        );

        let without_properties = project(
            &AuthContext::anonymous(),
            vec![SelectionField::new("friendsAggregate").selecting(SelectionSet::new(vec![
                SelectionField::new("edge").selecting(SelectionSet::new(vec![
                    SelectionField::new("since").selecting(names(&["min"])),
                ])),
            ]))],
        );
        assert!(matches!(
            without_properties,
            Err(TranslationError::Validation(field, _)) if field == "edge"
        ));
    }

    #[multiplatform_test]
    fn abstract_targets() {
        let (projection, subqueries) = project(
            &AuthContext::anonymous(),
            vec![
                SelectionField::new("actedIn").selecting(
                    SelectionSet::new(vec![SelectionField::new("title")])
                        .on_type("Movie", vec![SelectionField::new("runtime")]),
                ),
                SelectionField::new("likes").selecting(
                    SelectionSet::default()
                        .on_type("Series", vec![SelectionField::new("episodes")]),
                ),
            ],
        )
        .unwrap();

        assert_eq!(projection, "this { actedIn: this0, likes: this2 }");
        assert_in_order(
            &subqueries,
            &[
                "CALL {\nWITH this\nCALL {\nWITH this\nMATCH (this)-[:ACTED_IN]->(this1:Movie)",
                "WITH this1 { .title, .runtime, __resolveType: 'Movie' } AS this1\nRETURN this1\nUNION\n",
                "WITH this\nMATCH (this)-[:ACTED_IN]->(this1:Series)",
                "WITH this1 { .title, __resolveType: 'Series' } AS this1\nRETURN this1\n}",
                "RETURN collect(this1) AS this0",
                "MATCH (this)-[:LIKES]->(this3:Series)",
                "WITH this3 { .episodes, __resolveType: 'Series' } AS this3",
                "RETURN collect(this3) AS this2",
            ],
        );
        // Movie is not selected on the union
        assert!(!subqueries.contains("(this3:Movie)"));
    }

    #[multiplatform_test]
    fn unknown_fields() {
        assert!(matches!(
            project(&AuthContext::anonymous(), vec![SelectionField::new("nope")]),
            Err(TranslationError::Validation(field, _)) if field == "nope"
        ));
    }

    #[multiplatform_test]
    fn cypher_fields() {
        let (projection, subqueries) = project(
            &AuthContext::anonymous(),
            vec![SelectionField::new("friendCount")],
        )
        .unwrap();

        assert_eq!(projection, "this { friendCount: this0 }");
        assert_eq!(
            subqueries,
            "CALL {\n\
             WITH this\n\
             CALL {\n\
             WITH this\n\
             MATCH (this)-[:FRIEND_OF]->(f:Person)\n\
             RETURN count(f) AS result\n\
             }\n\
             WITH result AS this1\n\
             RETURN head(collect(this1)) AS this0\n\
             }"
        );
    }
}
