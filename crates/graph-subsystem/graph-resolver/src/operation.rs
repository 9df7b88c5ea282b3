// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Root operations.
//!
//! Each operation matches (or creates) the root nodes under the variable `this`, weaves in the
//! root where and access rules, delegates to the projection or mutation translators, and ends the
//! statement with a single `RETURN`.

use common::value::Val;
use exo_cypher::{
    Clause, Expression, ExpressionBuilder, NodePattern, Params, Pattern, Projection, ReturnItem,
    Statement, functions,
};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation},
    entity::{EntityId, NodeId},
    subsystem::GraphSubsystem,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    access::{check_authentication, read_authorization},
    config::TranslatorConfig,
    context::{AuthContext, QueryContext},
    error::{TranslationError, WithContext},
    mutation::{Parent, create_node, nested_deletes, update_root},
    predicate::{PredicateOutput, WhereScope, compile_where, match_and_filter, where_for_node},
    projection::{
        ReadOptions,
        aggregate::{aggregated_fields, property_aggregate},
        is_abstract, project_node, read_node, root_connection, touched_fields, with_projection,
    },
    selection::SelectionField,
};

/// Variable the root nodes are bound to.
const ROOT: &str = "this";
/// Column holding the nodes returned by a mutation.
const MUTATION_RESULT: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `people(where, options)`
    Read,
    /// `peopleConnection(where, sort, first, after)`
    Connection,
    /// `peopleAggregate(where) { count }`
    Aggregate,
    /// `createPeople(input: [...])`
    Create,
    /// `updatePeople(where, update, connect, disconnect, create, delete, connectOrCreate)`
    Update,
    /// `deletePeople(where, delete)`
    Delete,
}

/// An operation on the entity named `entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub entity: String,
}

impl Operation {
    pub fn new(kind: OperationKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
        }
    }
}

/// A statement ready for the driver, with the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedStatement {
    pub statement: Statement,
    pub params: Params,
}

impl TranslatedStatement {
    fn new(statement: Statement) -> Self {
        let (_, params) = statement.to_cypher();
        Self { statement, params }
    }

    pub fn to_cypher(&self) -> (String, Params) {
        self.statement.to_cypher()
    }
}

/// Translates root operations against one schema. The schema is shared by every request; each
/// call gets its own [`QueryContext`].
pub struct GraphTranslator {
    system: GraphSubsystem,
    config: TranslatorConfig,
}

impl GraphTranslator {
    pub fn new(system: GraphSubsystem, config: TranslatorConfig) -> Self {
        Self { system, config }
    }

    pub fn system(&self) -> &GraphSubsystem {
        &self.system
    }

    /// Translate `field`, the root field of a request, as `operation`.
    pub fn translate(
        &self,
        operation: &Operation,
        field: &SelectionField,
        auth: &AuthContext,
    ) -> Result<TranslatedStatement, TranslationError> {
        debug!("Translating {:?} of {}", operation.kind, operation.entity);

        let mut ctx = QueryContext::new(&self.system, auth, &self.config);
        let statement = translate_operation(&mut ctx, operation, field)
            .with_context(format!("while translating {}", field.name))?;
        let translated = TranslatedStatement::new(statement);

        if self.config.debug_statements {
            let (cypher, params) = translated.to_cypher();
            debug!("Statement for {}:\n{}\nwith params {:?}", field.name, cypher, params);
        }
        Ok(translated)
    }
}

fn translate_operation(
    ctx: &mut QueryContext<'_>,
    operation: &Operation,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let entity = system.entity_id(&operation.entity).ok_or_else(|| {
        TranslationError::validation(&operation.entity, "no such node, interface or union")
    })?;

    match operation.kind {
        OperationKind::Read => read(ctx, entity, field),
        OperationKind::Connection => root_connection(ctx, entity, field, 0),
        OperationKind::Aggregate => aggregate(ctx, concrete_node(operation, entity)?, field),
        OperationKind::Create => create(ctx, concrete_node(operation, entity)?, field),
        OperationKind::Update => update(ctx, concrete_node(operation, entity)?, field),
        OperationKind::Delete => delete(ctx, concrete_node(operation, entity)?, field),
    }
}

fn concrete_node(operation: &Operation, entity: EntityId) -> Result<NodeId, TranslationError> {
    match entity {
        EntityId::Node(node_id) => Ok(node_id),
        _ => Err(TranslationError::validation(
            &operation.entity,
            format!("{:?} is only supported on nodes", operation.kind),
        )),
    }
}

fn root_where(field: &SelectionField) -> &Val {
    field.get_argument("where").unwrap_or(&Val::Null)
}

fn root_pattern(system: &GraphSubsystem, node_id: NodeId) -> Pattern {
    Pattern::node(NodePattern::new(ROOT, system.nodes[node_id].labels.clone()))
}

fn read(
    ctx: &mut QueryContext<'_>,
    entity: EntityId,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let where_ = root_where(field);
    let discriminator = is_abstract(entity);

    // Node reads compile the where before the options, so parameters follow the argument order
    let mut filters = vec![];
    for node_id in system.concrete_nodes(entity) {
        let node = &system.nodes[node_id];
        if matches!(entity, EntityId::Union(_)) && field.selection.for_node(&node.name).is_empty() {
            continue;
        }
        let narrowed = match entity {
            EntityId::Node(_) => Some(where_.clone()),
            _ => where_for_node(system, entity, node_id, where_)?,
        };
        let Some(narrowed) = narrowed else {
            continue;
        };
        let filter = compile_where(
            ctx,
            EntityId::Node(node_id),
            ROOT,
            &narrowed,
            WhereScope::default(),
            0,
        )?;
        filters.push((node_id, filter));
    }

    let options = ReadOptions::parse(
        ctx,
        system.entity(entity).fields(),
        field.get_argument("options"),
    )?;
    let extra_fields = options.sort_field_names();

    let mut branches = vec![];
    for (node_id, filter) in filters {
        let node = &system.nodes[node_id];
        let (clauses, projection) = read_node(
            ctx,
            node_id,
            root_pattern(system, node_id),
            ROOT,
            filter,
            &field.selection.for_node(&node.name),
            &extra_fields,
            discriminator,
            0,
        )?;
        branches.push((Statement::from(clauses), projection));
    }

    let mut statement = Statement::new();
    if !discriminator {
        if let Some((clauses, projection)) = branches.pop() {
            statement.append(clauses);
            statement.push(Clause::Return(options.apply(
                Projection::new(vec![ReturnItem::aliased(projection, ROOT)]),
                ROOT,
                true,
            )));
        }
        return Ok(statement);
    }

    if branches.is_empty() {
        // The where names no implementation that can match
        statement.push(Clause::Unwind {
            expression: Expression::List(vec![]),
            alias: ROOT.to_string(),
        });
    } else {
        let branches = branches
            .into_iter()
            .map(|(branch, projection)| {
                branch
                    .then(with_projection(projection, ROOT))
                    .then(Clause::Return(Projection::variables(&[ROOT])))
            })
            .collect();
        statement.push(Clause::Call(branches));
    }
    statement.push(Clause::Return(options.apply(
        Projection::variables(&[ROOT]),
        ROOT,
        true,
    )));
    Ok(statement)
}

/// `peopleAggregate { count name { longest } age { min max } }`: one row of aggregates over every
/// matched node.
fn aggregate(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let node = &system.nodes[node_id];
    let properties = field.selection.fields.iter().filter(|part| part.name != "count");
    let aggregated: Vec<_> = aggregated_fields(&node.fields, properties)?
        .into_iter()
        .map(|(field, _)| field)
        .collect();
    check_authentication(
        ctx,
        Some(node),
        &aggregated,
        AuthenticationOperation::Aggregate,
    )?;

    let filter = compile_where(
        ctx,
        EntityId::Node(node_id),
        ROOT,
        root_where(field),
        WhereScope::default(),
        0,
    )?
    .and(read_authorization(
        ctx,
        node_id,
        ROOT,
        &aggregated,
        &[AuthorizationOperation::Aggregate],
        0,
    )?);

    let mut entries = vec![];
    for part in &field.selection.fields {
        let value = match part.name.as_str() {
            "count" => functions::count(Expression::variable(ROOT)),
            "__typename" => Expression::string(format!("{}AggregateSelection", node.name)),
            name => match node.field(name) {
                Some(property) => property_aggregate(
                    property,
                    Expression::variable(ROOT).property(property.db_name()),
                    part,
                )?,
                None => {
                    return Err(TranslationError::validation(
                        name,
                        format!("no such field on {}", node.name),
                    ));
                }
            },
        };
        entries.push((part.output_name().to_string(), value));
    }

    let mut statement = Statement::from(match_and_filter(root_pattern(system, node_id), filter));
    statement.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        Expression::map(entries),
        ROOT,
    )])));
    Ok(statement)
}

/// Fields selected on the nodes of a mutation response (`createPeople { people { name } }`).
fn response_selection<'f>(field: &'f SelectionField, node_name: &str) -> Vec<&'f SelectionField> {
    field
        .selection
        .fields
        .iter()
        .find(|part| part.name != "info" && part.name != "__typename")
        .map(|nodes| nodes.selection.for_node(node_name))
        .unwrap_or_default()
}

/// Project the written nodes bound to `variable` into the `data` column. Nodes the caller may not
/// read are left out.
fn return_written(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    variable: &str,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let node = &system.nodes[node_id];
    let selection = response_selection(field, &node.name);

    let authorization = read_authorization(
        ctx,
        node_id,
        variable,
        &touched_fields(node, &selection),
        &[AuthorizationOperation::Read],
        0,
    )?;
    let projection = project_node(ctx, node_id, variable, &selection, &[], false, 0)?;

    let mut statement = Statement::new();
    if !authorization.condition.is_true() {
        statement.push_subqueries(authorization.subqueries);
        statement.push(Clause::With(
            Projection::star().filtered(authorization.condition),
        ));
    }
    statement.push_subqueries(projection.subqueries);
    statement.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        functions::collect(projection.projection),
        MUTATION_RESULT,
    )])));
    Ok(statement)
}

/// Each input is created in its own `CALL`, bound to `this0`, `this1`, ... The created nodes are
/// then unwound into `this` for the projection.
fn create(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let inputs = field
        .get_argument("input")
        .map(Val::as_one_or_many)
        .unwrap_or_default();
    if inputs.is_empty() {
        return Err(TranslationError::validation("input", "nothing to create"));
    }

    let mut statement = Statement::new();
    let mut created = vec![];
    for input in inputs {
        // Reserve the name so generated names cannot collide with it
        let variable = ctx.next_variable();
        let mut inner = create_node(ctx, node_id, &variable, input, 0)?;
        inner.push(Clause::Return(Projection::variables(&[&variable])));
        statement.push(Clause::call(inner));
        created.push(variable);
    }

    let variable = match created.as_slice() {
        [single] => single.clone(),
        _ => {
            statement.push(Clause::Unwind {
                expression: Expression::List(
                    created.iter().map(Expression::variable).collect(),
                ),
                alias: ROOT.to_string(),
            });
            ROOT.to_string()
        }
    };

    statement.append(return_written(ctx, node_id, &variable, field)?);
    Ok(statement)
}

fn update(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let arguments: IndexMap<String, Val> = field
        .arguments
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut statement = update_root(ctx, node_id, ROOT, &arguments, 0)?;
    statement.append(return_written(ctx, node_id, ROOT, field)?);
    Ok(statement)
}

/// Match the nodes, run the nested deletes below them, then detach and delete them.
fn delete(
    ctx: &mut QueryContext<'_>,
    node_id: NodeId,
    field: &SelectionField,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    check_authentication(
        ctx,
        Some(&system.nodes[node_id]),
        &[],
        AuthenticationOperation::Delete,
    )?;

    let filter: PredicateOutput = compile_where(
        ctx,
        EntityId::Node(node_id),
        ROOT,
        root_where(field),
        WhereScope::default(),
        0,
    )?
    .and(read_authorization(
        ctx,
        node_id,
        ROOT,
        &[],
        &[AuthorizationOperation::Delete],
        0,
    )?);

    let mut statement = Statement::from(match_and_filter(root_pattern(system, node_id), filter));

    if let Some(nested) = field.get_argument("delete") {
        let with_vars = [ROOT.to_string()];
        let parent = Parent {
            node_id,
            variable: ROOT,
            with_vars: &with_vars,
            created: false,
        };
        statement.append(nested_deletes(ctx, parent, nested, 1)?);
    }

    statement.push(Clause::Delete {
        detach: true,
        expressions: vec![Expression::variable(ROOT)],
    });
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cursor::offset_to_cursor,
        selection::SelectionSet,
        test_support::{assert_in_order, test_system, user, val},
    };
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn translator() -> GraphTranslator {
        GraphTranslator::new(test_system(), TranslatorConfig::default())
    }

    fn translate(
        kind: OperationKind,
        entity: &str,
        field: SelectionField,
        auth: &AuthContext,
    ) -> Result<(String, Params), TranslationError> {
        translator()
            .translate(&Operation::new(kind, entity), &field, auth)
            .map(|translated| translated.to_cypher())
    }

    fn names(fields: &[&str]) -> SelectionSet {
        SelectionSet::new(fields.iter().map(|name| SelectionField::new(*name)).collect())
    }

    #[multiplatform_test]
    fn read_with_relationship_filter() {
        let field = SelectionField::new("people")
            .argument("where", val(json!({"age_GT": 30, "friends_SOME": {"name_EQ": "Ada"}})))
            .selecting(names(&["name"]));

        let (cypher, params) =
            translate(OperationKind::Read, "Person", field, &AuthContext::anonymous()).unwrap();
        assert_eq!(
            cypher,
            "MATCH (this:Person)\n\
             WHERE (this.age > $param0 AND any(this1 IN [(this)-[:FRIEND_OF]->(this1:Person) | this1] WHERE this1.name = $param2))\n\
             RETURN this { .name } AS this"
        );
        assert_eq!(params.get("param0"), Some(&json!(30)));
        assert_eq!(params.get("param2"), Some(&json!("Ada")));
    }

    #[multiplatform_test]
    fn read_with_options() {
        let field = SelectionField::new("people")
            .argument(
                "options",
                val(json!({"sort": [{"age": "DESC"}], "offset": 10, "limit": 5})),
            )
            .selecting(names(&["name"]));

        let (cypher, params) =
            translate(OperationKind::Read, "Person", field, &AuthContext::anonymous()).unwrap();
        assert_in_order(
            &cypher,
            &[
                "MATCH (this:Person)\n",
                "RETURN this { .name, .age } AS this\nORDER BY this.age DESC\nSKIP $",
                "\nLIMIT $",
            ],
        );
        let values: Vec<_> = params.values().cloned().collect();
        assert!(values.contains(&json!(10)));
        assert!(values.contains(&json!(5)));
    }

    #[multiplatform_test]
    fn read_interface_branches() {
        let field = SelectionField::new("productions")
            .argument("where", val(json!({"_on": {"Movie": {"runtime_GT": 90}}})))
            .selecting(names(&["title"]).on_type("Movie", vec![SelectionField::new("runtime")]));

        let (cypher, _) =
            translate(OperationKind::Read, "Production", field, &AuthContext::anonymous())
                .unwrap();
        assert_in_order(
            &cypher,
            &[
                "CALL {\nMATCH (this:Movie)\nWHERE this.runtime > $param0\n",
                "WITH this { .title, .runtime, __resolveType: 'Movie' } AS this\nRETURN this\n}",
                "RETURN this",
            ],
        );
        // Only Movie is named by the where
        assert!(!cypher.contains(":Series"));
    }

    #[multiplatform_test]
    fn read_applies_read_filters() {
        let field = SelectionField::new("posts").selecting(names(&["content"]));

        let (cypher, params) =
            translate(OperationKind::Read, "Post", field, &user("u1", &[])).unwrap();
        assert_in_order(&cypher, &["MATCH (this:Post)\nWHERE ", "HAS_POST", "RETURN this { .content } AS this"]);
        assert_eq!(params.get("jwt"), Some(&json!({"sub": "u1", "roles": []})));
    }

    #[multiplatform_test]
    fn root_connection_page() {
        let field = SelectionField::new("peopleConnection")
            .argument("first", 2)
            .argument("after", offset_to_cursor(3).as_str())
            .selecting(SelectionSet::new(vec![
                SelectionField::new("totalCount"),
                SelectionField::new("pageInfo").selecting(names(&["hasNextPage", "hasPreviousPage"])),
            ]));

        let (cypher, params) =
            translate(OperationKind::Connection, "Person", field, &AuthContext::anonymous())
                .unwrap();
        assert_in_order(
            &cypher,
            &[
                "MATCH (this:Person)\n",
                "WITH collect(edge) AS edges\n",
                "WITH edges, size(edges) AS totalCount\n",
                "hasPreviousPage: true",
                "} AS this",
            ],
        );
        let values: Vec<_> = params.values().cloned().collect();
        assert!(values.contains(&json!(4)));
        assert!(values.contains(&json!(2)));
    }

    #[multiplatform_test]
    fn aggregates() {
        let field = SelectionField::new("peopleAggregate")
            .argument("where", val(json!({"name_STARTS_WITH": "A"})))
            .selecting(names(&["count"]));

        let (cypher, params) =
            translate(OperationKind::Aggregate, "Person", field, &AuthContext::anonymous())
                .unwrap();
        assert_eq!(
            cypher,
            "MATCH (this:Person)\n\
             WHERE this.name STARTS WITH $param0\n\
             RETURN {count: count(this)} AS this"
        );
        assert_eq!(params.get("param0"), Some(&json!("A")));

        let field = SelectionField::new("peopleAggregate").selecting(SelectionSet::new(vec![
            SelectionField::new("count"),
            SelectionField::new("age").selecting(names(&["average", "max"])),
            SelectionField::new("name")
                .aliased("names")
                .selecting(names(&["shortest"])),
        ]));
        let (cypher, _) =
            translate(OperationKind::Aggregate, "Person", field, &AuthContext::anonymous())
                .unwrap();
        assert_eq!(
            cypher,
            "MATCH (this:Person)\n\
             RETURN {count: count(this), age: {average: avg(this.age), max: max(this.age)}, names: {shortest: reduce(current = head(collect(this.name)), candidate IN collect(this.name) | CASE WHEN size(candidate) < size(current) THEN candidate ELSE current END)}} AS this"
        );

        for unsupported in [
            SelectionField::new("name"),
            SelectionField::new("age").selecting(names(&["shortest"])),
            SelectionField::new("location").selecting(names(&["min"])),
            SelectionField::new("height").selecting(names(&["max"])),
        ] {
            let field = SelectionField::new("peopleAggregate")
                .selecting(SelectionSet::new(vec![unsupported]));
            assert!(matches!(
                translate(OperationKind::Aggregate, "Person", field, &AuthContext::anonymous()),
                Err(TranslationError::WithContext(..))
            ));
        }
    }

    #[multiplatform_test]
    fn create_batch() {
        let field = SelectionField::new("createPeople")
            .argument(
                "input",
                val(json!([
                    {"name": "A", "friends": {"create": [{"node": {"name": "B"}}]}},
                    {"name": "C"}
                ])),
            )
            .selecting(SelectionSet::new(vec![
                SelectionField::new("people").selecting(names(&["name"])),
                SelectionField::new("info"),
            ]));

        let (cypher, params) =
            translate(OperationKind::Create, "Person", field, &AuthContext::anonymous()).unwrap();
        assert_in_order(
            &cypher,
            &[
                "CALL {\nCREATE (this0:Person)\n",
                "CREATE (this0_friends0_node:Person)\n",
                "MERGE (this0)-[:FRIEND_OF]->(this0_friends0_node)\n",
                "RETURN this0\n}\n",
                "CALL {\nCREATE (this1:Person)\n",
                "RETURN this1\n}\n",
                "UNWIND [this0, this1] AS this\n",
                "RETURN collect(this { .name }) AS data",
            ],
        );
        assert_eq!(params.get("this0_name"), Some(&json!("A")));
        assert_eq!(params.get("this0_friends0_node_name"), Some(&json!("B")));
        assert_eq!(params.get("this1_name"), Some(&json!("C")));
    }

    #[multiplatform_test]
    fn create_single() {
        let field = SelectionField::new("createMovies")
            .argument("input", val(json!({"title": "Heat"})))
            .selecting(SelectionSet::new(vec![
                SelectionField::new("movies").selecting(names(&["title"])),
            ]));

        let (cypher, _) =
            translate(OperationKind::Create, "Movie", field, &AuthContext::anonymous()).unwrap();
        assert_eq!(
            cypher,
            "CALL {\n\
             CREATE (this0:Movie)\n\
             SET this0.id = randomUUID(), this0.createdAt = datetime(), this0.title = $this0_title\n\
             RETURN this0\n\
             }\n\
             RETURN collect(this0 { .title }) AS data"
        );
    }

    #[multiplatform_test]
    fn update_then_project() {
        let field = SelectionField::new("updatePeople")
            .argument("where", val(json!({"name": "A"})))
            .argument("update", val(json!({"age_INCREMENT": 1})))
            .argument("connect", Val::Null)
            .selecting(SelectionSet::new(vec![
                SelectionField::new("people").selecting(names(&["name", "age"])),
            ]));

        let (cypher, params) =
            translate(OperationKind::Update, "Person", field, &AuthContext::anonymous()).unwrap();
        assert_in_order(
            &cypher,
            &[
                "MATCH (this:Person)\nWHERE this.name = $param0\n",
                "SET this.age = (this.age + $this_update_age_INCREMENT)\n",
                "RETURN collect(this { .name, .age }) AS data",
            ],
        );
        assert_eq!(params.get("this_update_age_INCREMENT"), Some(&json!(1)));
    }

    #[multiplatform_test]
    fn repeated_translations_are_identical() {
        let translator = translator();
        let anonymous = AuthContext::anonymous();

        let read = SelectionField::new("people")
            .argument("where", val(json!({"age_GT": 30, "friends_SOME": {"name": "Ada"}})))
            .selecting(SelectionSet::new(vec![
                SelectionField::new("name"),
                SelectionField::new("friends").selecting(names(&["name"])),
            ]));
        let update = SelectionField::new("updatePeople")
            .argument("where", val(json!({"name": "A"})))
            .argument(
                "update",
                val(json!({"friends": [
                    {"create": [{"node": {"name": "B"}}]},
                    {"where": {"node": {"name": "C"}}, "update": {"node": {"age": 3}}}
                ]})),
            )
            .selecting(SelectionSet::new(vec![
                SelectionField::new("people").selecting(names(&["name"])),
            ]));

        for (kind, field) in [(OperationKind::Read, read), (OperationKind::Update, update)] {
            let operation = Operation::new(kind, "Person");
            let first = translator.translate(&operation, &field, &anonymous).unwrap();
            let second = translator.translate(&operation, &field, &anonymous).unwrap();
            assert_eq!(first.to_cypher(), second.to_cypher());
        }
    }

    #[multiplatform_test]
    fn delete_with_nested_delete() {
        let field = SelectionField::new("deletePeople")
            .argument("where", val(json!({"name": "A"})))
            .argument("delete", val(json!({"friends": [{"where": {"node": {"name": "B"}}}]})));

        let (cypher, _) =
            translate(OperationKind::Delete, "Person", field, &AuthContext::anonymous()).unwrap();
        assert_in_order(
            &cypher,
            &[
                "MATCH (this:Person)\nWHERE this.name = $param0\n",
                "OPTIONAL MATCH (this)-[this_friends_delete0_relationship:FRIEND_OF]->(this_friends_delete0:Person)\n\
                 WHERE this_friends_delete0.name = $param1\n",
                "DETACH DELETE this_friends_delete0\n",
                "}\nDETACH DELETE this",
            ],
        );
    }

    #[multiplatform_test]
    fn deleting_posts_requires_an_admin() {
        let field = || SelectionField::new("deletePosts");

        assert!(matches!(
            translate(OperationKind::Delete, "Post", field(), &user("u1", &[])),
            Err(TranslationError::WithContext(_, e)) if matches!(*e, TranslationError::AuthenticationRequired)
        ));
        assert!(translate(OperationKind::Delete, "Post", field(), &user("u1", &["admin"])).is_ok());
    }

    #[test_log::test]
    fn logged_statements_match_the_result() {
        let translator = GraphTranslator::new(
            test_system(),
            TranslatorConfig {
                debug_statements: true,
                ..Default::default()
            },
        );
        let field = SelectionField::new("people")
            .argument("where", val(json!({"name": "Ada"})))
            .selecting(names(&["name"]));

        let translated = translator
            .translate(
                &Operation::new(OperationKind::Read, "Person"),
                &field,
                &AuthContext::anonymous(),
            )
            .unwrap();
        let (_, params) = translated.to_cypher();
        assert_eq!(translated.params, params);
        assert_eq!(params.get("param0"), Some(&json!("Ada")));
    }

    #[multiplatform_test]
    fn invalid_operations() {
        let anonymous = AuthContext::anonymous();
        let field = || SelectionField::new("root");

        for (kind, entity) in [
            (OperationKind::Read, "Nobody"),
            (OperationKind::Create, "Production"),
            (OperationKind::Delete, "Search"),
            (OperationKind::Create, "Person"),
        ] {
            let result = translate(kind, entity, field(), &anonymous);
            assert!(
                matches!(&result, Err(e) if e.is_client_error()),
                "{kind:?} of {entity} should be rejected"
            );
        }
    }

    #[multiplatform_test]
    fn depth_is_bounded() {
        let mut where_ = json!({"name": "A"});
        for _ in 0..8 {
            where_ = json!({"friends_SOME": where_});
        }
        let field = SelectionField::new("people")
            .argument("where", val(where_))
            .selecting(names(&["name"]));

        let translator = GraphTranslator::new(
            test_system(),
            TranslatorConfig {
                max_depth: 4,
                ..Default::default()
            },
        );
        let result = translator.translate(
            &Operation::new(OperationKind::Read, "Person"),
            &field,
            &AuthContext::anonymous(),
        );
        assert!(matches!(
            result,
            Err(TranslationError::WithContext(_, e)) if matches!(*e, TranslationError::DepthLimitExceeded(4))
        ));
    }
}
