// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Relay connections.
//!
//! Every matching edge is shaped into an `edge` map (`{node: ..., <edge properties>}`); edges are
//! then sorted, collected and counted before the requested window is sliced out, so `totalCount`
//! and the page flags always refer to the full list.

use common::value::Val;
use exo_cypher::{
    ArithmeticOp, Clause, Condition, Expression, NodePattern, Pattern, Projection, ReturnItem,
    SortItem, Statement, functions,
};
use graph_model::{
    entity::EntityId,
    field::{Field, RelationField},
};

use super::{SortField, is_abstract, read_node};
use crate::{
    context::QueryContext,
    cursor::{CURSOR_PREFIX, ConnectionWindow},
    error::TranslationError,
    input::expect_object,
    pattern::related,
    predicate::{WhereScope, compile_connection_where, compile_where},
    selection::{SelectionField, SelectionSet},
};

const EDGE: &str = "edge";
const EDGES: &str = "edges";
const TOTAL_COUNT: &str = "totalCount";
const EDGE_INDEX: &str = "edgeIndex";

/// Where the edges of a connection come from.
#[derive(Clone, Copy)]
enum EdgeSource<'a> {
    /// Nodes related to `parent` through a relation field
    Relation {
        parent: &'a str,
        relation: &'a RelationField,
    },
    /// All nodes of the target (a root connection query)
    Root,
}

/// The requested parts of a connection.
struct ConnectionShape<'s> {
    node_selection: Option<&'s SelectionSet>,
    edge_properties: Vec<&'s str>,
}

impl<'s> ConnectionShape<'s> {
    fn parse(
        selected: &'s SelectionField,
        properties: &[Field],
    ) -> Result<Self, TranslationError> {
        let mut shape = ConnectionShape {
            node_selection: None,
            edge_properties: vec![],
        };

        for part in &selected.selection.fields {
            match part.name.as_str() {
                "edges" => {
                    for edge_field in &part.selection.fields {
                        match edge_field.name.as_str() {
                            "cursor" => {}
                            "node" => {
                                shape.node_selection.get_or_insert(&edge_field.selection);
                            }
                            name if properties.iter().any(|field| field.name == name) => {
                                if !shape.edge_properties.contains(&name) {
                                    shape.edge_properties.push(name);
                                }
                            }
                            name => {
                                return Err(TranslationError::validation(
                                    name,
                                    "no such field on connection edges",
                                ));
                            }
                        }
                    }
                }
                "totalCount" | "pageInfo" | "__typename" => {}
                name => {
                    return Err(TranslationError::validation(
                        name,
                        "no such field on connections",
                    ));
                }
            }
        }
        Ok(shape)
    }
}

/// Sort of a connection: entries sort on node fields or on edge properties.
struct ConnectionSort<'f> {
    node: Vec<SortField<'f>>,
    edge: Vec<SortField<'f>>,
    /// Sort keys in the order given
    order: Vec<(bool, SortField<'f>)>,
}

impl<'f> ConnectionSort<'f> {
    /// Relation connections take `[{node: {...}, edge: {...}}]`; root connections take
    /// `[{field: ASC|DESC}]`.
    fn parse(
        node_fields: &'f [Field],
        edge_fields: &'f [Field],
        sort: Option<&Val>,
        source: EdgeSource<'_>,
    ) -> Result<Self, TranslationError> {
        let mut parsed = ConnectionSort {
            node: vec![],
            edge: vec![],
            order: vec![],
        };
        let Some(sort) = sort else {
            return Ok(parsed);
        };

        for entry in sort.as_one_or_many() {
            if let EdgeSource::Root = source {
                for sort_field in SortField::parse(node_fields, entry)? {
                    parsed.node.push(sort_field);
                    parsed.order.push((false, sort_field));
                }
                continue;
            }

            for (key, value) in expect_object(entry, "sort")? {
                let (on_edge, fields) = match key.as_str() {
                    "node" => (false, node_fields),
                    "edge" => (true, edge_fields),
                    _ => {
                        return Err(TranslationError::validation(key, "expected node or edge"));
                    }
                };
                for sort_field in SortField::parse(fields, value)? {
                    if on_edge {
                        parsed.edge.push(sort_field);
                    } else {
                        parsed.node.push(sort_field);
                    }
                    parsed.order.push((on_edge, sort_field));
                }
            }
        }
        Ok(parsed)
    }

    fn sort_items(&self) -> Vec<SortItem> {
        self.order
            .iter()
            .map(|(on_edge, sort)| {
                let edge = Expression::variable(EDGE);
                let owner = if *on_edge { edge } else { edge.property("node") };
                SortItem {
                    expression: owner.property(&sort.field.name),
                    descending: sort.descending,
                }
            })
            .collect()
    }
}

/// `friendsConnection(first, after, where, sort) { edges { cursor node { ... } } ... }`
pub(crate) fn connection_subquery(
    ctx: &mut QueryContext<'_>,
    parent: &str,
    relation_field: &Field,
    selected: &SelectionField,
    result: &str,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let relation = relation_field.as_relation().ok_or_else(|| {
        TranslationError::Generic(format!("{} is not a relation", relation_field.name))
    })?;

    let mut statement = Statement::new().then(Clause::with_variables(&[parent]));
    statement.append(connection_clauses(
        ctx,
        relation.target,
        EdgeSource::Relation { parent, relation },
        selected,
        result,
        depth,
    )?);
    Ok(statement)
}

/// A root `<nodes>Connection` query, returned as `this`.
pub(crate) fn root_connection(
    ctx: &mut QueryContext<'_>,
    target: EntityId,
    selected: &SelectionField,
    depth: usize,
) -> Result<Statement, TranslationError> {
    connection_clauses(ctx, target, EdgeSource::Root, selected, "this", depth)
}

fn connection_clauses(
    ctx: &mut QueryContext<'_>,
    target: EntityId,
    source: EdgeSource<'_>,
    selected: &SelectionField,
    result: &str,
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;

    let properties: &[Field] = match source {
        EdgeSource::Relation { relation, .. } => relation
            .properties
            .map(|id| system.relationship_properties(id).fields.as_slice())
            .unwrap_or(&[]),
        EdgeSource::Root => &[],
    };

    let window = ConnectionWindow::from_arguments(
        selected.get_argument("after"),
        selected.get_argument("first"),
    )?;
    let shape = ConnectionShape::parse(selected, properties)?;
    let sort = ConnectionSort::parse(
        system.entity(target).fields(),
        properties,
        selected.get_argument("sort"),
        source,
    )?;
    let where_ = selected.get_argument("where").unwrap_or(&Val::Null);

    let (rel_variable, node_variable) = match source {
        EdgeSource::Relation { .. } => (Some(ctx.next_variable()), ctx.next_variable()),
        EdgeSource::Root => (None, "this".to_string()),
    };

    let node_sort_fields: Vec<&str> = sort
        .node
        .iter()
        .map(|sort| sort.field.name.as_str())
        .collect();
    let mut edge_properties = shape.edge_properties.clone();
    for sort in &sort.edge {
        if !edge_properties.contains(&sort.field.name.as_str()) {
            edge_properties.push(&sort.field.name);
        }
    }

    let empty_selection = SelectionSet::default();
    let node_selection = shape.node_selection.unwrap_or(&empty_selection);
    let discriminator = is_abstract(target);

    let mut branches = vec![];
    for node_id in system.concrete_nodes(target) {
        let node = &system.nodes[node_id];

        let (pattern, filter) = match source {
            EdgeSource::Relation { parent, relation } => {
                let filter = compile_connection_where(
                    ctx,
                    relation,
                    target,
                    rel_variable.as_deref().unwrap_or_default(),
                    &node_variable,
                    expect_object(where_, "where")?,
                    WhereScope::default(),
                    depth,
                )?;
                let pattern = related(
                    parent,
                    relation,
                    rel_variable.as_deref(),
                    NodePattern::new(&node_variable, node.labels.clone()),
                );
                (pattern, filter)
            }
            EdgeSource::Root => {
                let filter = compile_where(
                    ctx,
                    target,
                    &node_variable,
                    where_,
                    WhereScope::default(),
                    depth,
                )?;
                let pattern =
                    Pattern::node(NodePattern::new(&node_variable, node.labels.clone()));
                (pattern, filter)
            }
        };

        let (clauses, projection) = read_node(
            ctx,
            node_id,
            pattern,
            &node_variable,
            filter,
            &node_selection.for_node(&node.name),
            &node_sort_fields,
            discriminator,
            depth + 1,
        )?;

        let mut edge = vec![("node".to_string(), projection)];
        if let Some(rel_variable) = &rel_variable {
            for name in &edge_properties {
                if let Some(field) = properties.iter().find(|field| field.name == *name) {
                    edge.push((
                        name.to_string(),
                        Expression::variable(rel_variable).property(field.db_name()),
                    ));
                }
            }
        }

        let mut branch = Statement::from(clauses);
        branch.push(Clause::With(Projection::new(vec![ReturnItem::aliased(
            Expression::map(edge),
            EDGE,
        )])));
        branches.push(branch);
    }

    let mut statement = Statement::new();
    if discriminator {
        let branches = branches
            .into_iter()
            .map(|mut branch| {
                let mut call = match source {
                    EdgeSource::Relation { parent, .. } => {
                        Statement::new().then(Clause::with_variables(&[parent]))
                    }
                    EdgeSource::Root => Statement::new(),
                };
                branch.push(Clause::Return(Projection::variables(&[EDGE])));
                call.append(branch);
                call
            })
            .collect::<Vec<_>>();
        if !branches.is_empty() {
            statement.push(Clause::Call(branches));
        }
    } else {
        for branch in branches {
            statement.append(branch);
        }
    }

    statement.append(paginate(ctx, &window, &sort, selected, result)?);
    Ok(statement)
}

/// Sort, count and slice the `edge` rows, then shape the connection.
fn paginate(
    ctx: &mut QueryContext<'_>,
    window: &ConnectionWindow,
    sort: &ConnectionSort<'_>,
    selected: &SelectionField,
    result: &str,
) -> Result<Statement, TranslationError> {
    let edges = || Expression::variable(EDGES);
    let total_count = || Expression::variable(TOTAL_COUNT);

    let mut statement = Statement::new();
    let sort_items = sort.sort_items();
    if !sort_items.is_empty() {
        statement.push(Clause::With(
            Projection::variables(&[EDGE]).ordered(sort_items),
        ));
    }
    statement.push(Clause::With(Projection::new(vec![ReturnItem::aliased(
        functions::collect(Expression::variable(EDGE)),
        EDGES,
    )])));
    statement.push(Clause::With(Projection::new(vec![
        ReturnItem::variable(EDGES),
        ReturnItem::aliased(functions::size(edges()), TOTAL_COUNT),
    ])));

    let offset = ctx.next_param(serde_json::json!(window.offset));
    if !window.is_unbounded() {
        let to = window.first.map(|first| {
            Expression::arithmetic(
                ArithmeticOp::Add,
                offset.clone(),
                ctx.next_param(serde_json::json!(first)),
            )
        });
        statement.push(Clause::With(Projection::new(vec![
            ReturnItem::aliased(Expression::slice(edges(), Some(offset.clone()), to), EDGES),
            ReturnItem::variable(TOTAL_COUNT),
        ])));
    }

    let mut entries = vec![];
    for part in &selected.selection.fields {
        let value = match part.name.as_str() {
            "edges" => edges_expression(part, &offset),
            "totalCount" => total_count(),
            "pageInfo" => page_info_expression(part, window, &offset)?,
            "__typename" => Expression::string("Connection"),
            name => {
                return Err(TranslationError::validation(
                    name,
                    "no such field on connections",
                ));
            }
        };
        entries.push((part.output_name().to_string(), value));
    }

    statement.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        Expression::map(entries),
        result,
    )])));
    Ok(statement)
}

/// `apoc.text.base64Encode('arrayconnection:' + toString(offset))`
fn cursor_expression(offset: Expression) -> Expression {
    Expression::function(
        "apoc.text.base64Encode",
        vec![Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::string(CURSOR_PREFIX),
            functions::to_string(offset),
        )],
    )
}

/// `[edgeIndex IN range(0, size(edges) - 1) | {cursor: ..., node: edges[edgeIndex].node, ...}]`
fn edges_expression(edges_field: &SelectionField, offset: &Expression) -> Expression {
    let edge = || {
        Expression::index(
            Expression::variable(EDGES),
            Expression::variable(EDGE_INDEX),
        )
    };

    let entries = edges_field
        .selection
        .fields
        .iter()
        .map(|part| {
            let value = match part.name.as_str() {
                "cursor" => cursor_expression(Expression::arithmetic(
                    ArithmeticOp::Add,
                    offset.clone(),
                    Expression::variable(EDGE_INDEX),
                )),
                name => edge().property(name),
            };
            (part.output_name().to_string(), value)
        })
        .collect();

    Expression::list_comprehension(
        EDGE_INDEX,
        Expression::function(
            "range",
            vec![
                Expression::integer(0),
                Expression::arithmetic(
                    ArithmeticOp::Subtract,
                    functions::size(Expression::variable(EDGES)),
                    Expression::integer(1),
                ),
            ],
        ),
        None,
        Some(Expression::map(entries)),
    )
}

fn page_info_expression(
    page_info: &SelectionField,
    window: &ConnectionWindow,
    offset: &Expression,
) -> Result<Expression, TranslationError> {
    let size = || functions::size(Expression::variable(EDGES));
    let when_not_empty = |value: Expression| Expression::Case {
        alternatives: vec![(Condition::Gt(size(), Expression::integer(0)), value)],
        otherwise: Some(Box::new(Expression::null())),
    };

    let mut entries = vec![];
    for part in &page_info.selection.fields {
        let value = match part.name.as_str() {
            "hasNextPage" => Expression::condition(Condition::Lt(
                Expression::arithmetic(ArithmeticOp::Add, offset.clone(), size()),
                Expression::variable(TOTAL_COUNT),
            )),
            "hasPreviousPage" => Expression::boolean(window.offset > 0),
            "startCursor" => when_not_empty(cursor_expression(offset.clone())),
            "endCursor" => when_not_empty(cursor_expression(Expression::arithmetic(
                ArithmeticOp::Subtract,
                Expression::arithmetic(ArithmeticOp::Add, offset.clone(), size()),
                Expression::integer(1),
            ))),
            "__typename" => Expression::string("PageInfo"),
            name => {
                return Err(TranslationError::validation(name, "no such field on PageInfo"));
            }
        };
        entries.push((part.output_name().to_string(), value));
    }
    Ok(Expression::map(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        cursor::offset_to_cursor,
        projection::project_node,
        test_support::{assert_in_order, node_id, render, val, with_context},
    };
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn person_projection(selection: SelectionField) -> Result<(String, String), TranslationError> {
        with_context(&AuthContext::anonymous(), |ctx| {
            let person = node_id(ctx.system, "Person");
            let output = project_node(ctx, person, "this", &[&selection], &[], false, 0)?;
            let mut statement = Statement::new();
            statement.push_subqueries(output.subqueries);
            Ok((render(&output.projection).0, render(&statement).0))
        })
    }

    fn edges(node: Vec<SelectionField>, extra: Vec<SelectionField>) -> SelectionField {
        let mut fields = vec![
            SelectionField::new("cursor"),
            SelectionField::new("node").selecting(SelectionSet::new(node)),
        ];
        fields.extend(extra);
        SelectionField::new("edges").selecting(SelectionSet::new(fields))
    }

    #[multiplatform_test]
    fn paged_connection() {
        let selection = SelectionField::new("friendsConnection")
            .argument("first", 2)
            .argument("after", offset_to_cursor(3).as_str())
            .argument("where", val(json!({"node": {"age_GT": 20}})))
            .argument("sort", val(json!([{"node": {"age": "DESC"}}])))
            .selecting(SelectionSet::new(vec![
                edges(vec![SelectionField::new("name")], vec![]),
                SelectionField::new("totalCount"),
                SelectionField::new("pageInfo").selecting(SelectionSet::new(vec![
                    SelectionField::new("hasNextPage"),
                    SelectionField::new("hasPreviousPage"),
                    SelectionField::new("endCursor"),
                ])),
            ]));

        let (projection, subqueries) = person_projection(selection).unwrap();
        assert_eq!(projection, "this { friendsConnection: this0 }");
        assert_eq!(
            subqueries,
            "CALL {\n\
             WITH this\n\
             MATCH (this)-[this1:FRIEND_OF]->(this2:Person)\n\
             WHERE this2.age > $param3\n\
             WITH {node: this2 { .name, .age }} AS edge\n\
             WITH edge\n\
             ORDER BY edge.node.age DESC\n\
             WITH collect(edge) AS edges\n\
             WITH edges, size(edges) AS totalCount\n\
             WITH edges[$param4..($param4 + $param5)] AS edges, totalCount\n\
             RETURN {edges: [edgeIndex IN range(0, (size(edges) - 1)) | {cursor: apoc.text.base64Encode(('arrayconnection:' + toString(($param4 + edgeIndex)))), node: edges[edgeIndex].node}], \
             totalCount: totalCount, \
             pageInfo: {hasNextPage: ($param4 + size(edges)) < totalCount, hasPreviousPage: true, \
             endCursor: CASE WHEN size(edges) > 0 THEN apoc.text.base64Encode(('arrayconnection:' + toString((($param4 + size(edges)) - 1)))) ELSE NULL END}} AS this0\n\
             }"
        );
    }

    #[multiplatform_test]
    fn window_matches_generated_flags() {
        let window = ConnectionWindow::from_arguments(
            Some(&Val::from(offset_to_cursor(3).as_str())),
            Some(&Val::from(2)),
        )
        .unwrap();
        assert_eq!(window.slice(10), 4..6);
        let page_info = window.page_info(10);
        assert!(page_info.has_next_page);
        assert!(page_info.has_previous_page);
    }

    #[multiplatform_test]
    fn edge_properties_and_abstract_targets() {
        let selection = SelectionField::new("actedInConnection")
            .argument("where", val(json!({"edge": {"since_GT": 2000}})))
            .argument("sort", val(json!([{"edge": {"since": "ASC"}}])))
            .selecting(SelectionSet::new(vec![edges(
                vec![SelectionField::new("title")],
                vec![SelectionField::new("role")],
            )]));

        let (_, subqueries) = person_projection(selection).unwrap();
        assert_in_order(
            &subqueries,
            &[
                "CALL {\nWITH this\nCALL {\nWITH this\nMATCH (this)-[this1:ACTED_IN]->(this2:Movie)",
                "WHERE this1.since > $param3",
                "WITH {node: this2 { .title, __resolveType: 'Movie' }, role: this1.role, since: this1.since} AS edge\nRETURN edge\nUNION\n",
                "MATCH (this)-[this1:ACTED_IN]->(this2:Series)",
                "WITH {node: this2 { .title, __resolveType: 'Series' }, role: this1.role, since: this1.since} AS edge\nRETURN edge\n}",
                "WITH edge\nORDER BY edge.since ASC",
                "WITH collect(edge) AS edges",
                "RETURN {edges: [edgeIndex IN range(0, (size(edges) - 1)) | {cursor: ",
                "node: edges[edgeIndex].node, role: edges[edgeIndex].role}]} AS this0",
            ],
        );
        // The unbounded window is not sliced
        assert!(!subqueries.contains("AS edges, totalCount"));
    }

    #[multiplatform_test]
    fn invalid_connections() {
        let unknown_edge_field = SelectionField::new("friendsConnection").selecting(
            SelectionSet::new(vec![edges(vec![], vec![SelectionField::new("role")])]),
        );
        assert!(matches!(
            person_projection(unknown_edge_field),
            Err(TranslationError::Validation(field, _)) if field == "role"
        ));

        let bad_cursor = SelectionField::new("friendsConnection")
            .argument("after", "not a cursor")
            .selecting(SelectionSet::new(vec![SelectionField::new("totalCount")]));
        assert!(matches!(
            person_projection(bad_cursor),
            Err(TranslationError::InvalidCursor(..))
        ));
    }
}
