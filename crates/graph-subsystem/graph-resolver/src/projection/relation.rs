// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_cypher::{
    Clause, Expression, MapProjectionItem, NodePattern, Projection, ReturnItem, Statement,
    functions,
};
use graph_model::{
    access::{AuthenticationOperation, AuthorizationOperation},
    entity::EntityId,
    field::{CypherField, Field, RelationField},
};

use super::{
    RESOLVE_TYPE, ReadOptions,
    aggregate::{aggregated_fields, aggregated_properties},
    is_abstract, project_node, read_node, with_projection,
};
use crate::{
    access::{check_authentication, read_authorization},
    context::QueryContext,
    error::TranslationError,
    pattern::{related, target_labels},
    predicate::{PredicateOutput, WhereScope, compile_where, match_and_filter, where_for_node},
    selection::SelectionField,
};

/// `RETURN collect(variable) AS result`, or its head for a singular field.
fn collect_as(field: &Field, variable: &str, result: &str) -> Clause {
    let collected = functions::collect(Expression::variable(variable));
    let value = if field.is_list() {
        collected
    } else {
        functions::head(collected)
    };
    Clause::Return(Projection::new(vec![ReturnItem::aliased(value, result)]))
}

/// The subquery computing a relation field, or `None` when no target type can match (a union
/// with no selected member, or a where that excludes every implementation).
pub(super) fn relation_subquery(
    ctx: &mut QueryContext<'_>,
    parent: &str,
    field: &Field,
    relation: &RelationField,
    selected: &SelectionField,
    result: &str,
    depth: usize,
) -> Result<Option<Statement>, TranslationError> {
    let system = ctx.system;
    let target = relation.target;
    let node_variable = ctx.next_variable();
    let where_ = selected.get_argument("where");
    let options = ReadOptions::parse(
        ctx,
        system.entity(target).fields(),
        selected.get_argument("options"),
    )?;
    let extra_fields = options.sort_field_names();

    let mut statement = Statement::new().then(Clause::with_variables(&[parent]));

    match target {
        EntityId::Node(node_id) => {
            let filter = match where_ {
                Some(where_) => compile_where(
                    ctx,
                    target,
                    &node_variable,
                    where_,
                    WhereScope::default(),
                    depth,
                )?,
                None => PredicateOutput::default(),
            };
            let pattern = related(
                parent,
                relation,
                None,
                NodePattern::new(&node_variable, system.nodes[node_id].labels.clone()),
            );
            let (clauses, projection) = read_node(
                ctx,
                node_id,
                pattern,
                &node_variable,
                filter,
                &selected.selection.for_node(&system.nodes[node_id].name),
                &extra_fields,
                false,
                depth,
            )?;
            statement.append(clauses.into());
            statement.push(Clause::With(options.apply(
                Projection::new(vec![ReturnItem::aliased(projection, &node_variable)]),
                &node_variable,
                true,
            )));
        }
        EntityId::Interface(_) | EntityId::Union(_) => {
            let mut branches = vec![];
            for node_id in system.concrete_nodes(target) {
                let node = &system.nodes[node_id];
                let node_selection = selected.selection.for_node(&node.name);
                if matches!(target, EntityId::Union(_)) && node_selection.is_empty() {
                    continue;
                }

                let narrowed = match where_ {
                    Some(where_) => match where_for_node(system, target, node_id, where_)? {
                        Some(narrowed) => Some(narrowed),
                        None => continue,
                    },
                    None => None,
                };
                let filter = match narrowed {
                    Some(narrowed) => compile_where(
                        ctx,
                        EntityId::Node(node_id),
                        &node_variable,
                        &narrowed,
                        WhereScope::default(),
                        depth,
                    )?,
                    None => PredicateOutput::default(),
                };

                let pattern = related(
                    parent,
                    relation,
                    None,
                    NodePattern::new(&node_variable, node.labels.clone()),
                );
                let (clauses, projection) = read_node(
                    ctx,
                    node_id,
                    pattern,
                    &node_variable,
                    filter,
                    &node_selection,
                    &extra_fields,
                    true,
                    depth,
                )?;

                let mut branch = Statement::new().then(Clause::with_variables(&[parent]));
                branch.append(clauses.into());
                branch.push(with_projection(projection, &node_variable));
                branch.push(Clause::Return(Projection::variables(&[&node_variable])));
                branches.push(branch);
            }

            if branches.is_empty() {
                return Ok(None);
            }
            statement.push(Clause::Call(branches));
            if !options.is_empty() {
                statement.push(Clause::With(options.apply(
                    Projection::variables(&[&node_variable]),
                    &node_variable,
                    true,
                )));
            }
        }
    }

    statement.push(collect_as(field, &node_variable, result));
    Ok(Some(statement))
}

/// `friendsAggregate { count node { age { max } } edge { since { min } } }`
pub(super) fn aggregate_subquery(
    ctx: &mut QueryContext<'_>,
    parent: &str,
    parent_name: &str,
    relation_field: &Field,
    selected: &SelectionField,
    result: &str,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let relation = relation_field.as_relation().ok_or_else(|| {
        TranslationError::Generic(format!("{} is not a relation", relation_field.name))
    })?;
    let node_variable = ctx.next_variable();
    let edge_variable = selected
        .selection
        .field("edge")
        .map(|_| ctx.next_variable());

    let mut filter = match selected.get_argument("where") {
        Some(where_) => compile_where(
            ctx,
            relation.target,
            &node_variable,
            where_,
            WhereScope::default(),
            depth,
        )?,
        None => PredicateOutput::default(),
    };

    let target = system.entity(relation.target);
    let node_selection = selected.selection.field("node");
    let node_fields: Vec<&Field> = match node_selection {
        Some(node) => aggregated_fields(target.fields(), &node.selection.fields)?
            .into_iter()
            .map(|(field, _)| field)
            .collect(),
        None => vec![],
    };
    if let EntityId::Node(node_id) = relation.target {
        check_authentication(
            ctx,
            Some(&system.nodes[node_id]),
            &node_fields,
            AuthenticationOperation::Aggregate,
        )?;
        filter = filter.and(read_authorization(
            ctx,
            node_id,
            &node_variable,
            &node_fields,
            &[AuthorizationOperation::Aggregate],
            depth,
        )?);
    }

    let type_prefix = format!(
        "{parent_name}{}{}",
        target.name(),
        capitalized(&relation_field.name)
    );
    let mut entries = vec![];
    for aggregate in &selected.selection.fields {
        let value = match (aggregate.name.as_str(), edge_variable.as_deref()) {
            ("count", _) => functions::count(Expression::variable(&node_variable)),
            ("__typename", _) => Expression::string(format!("{type_prefix}AggregationSelection")),
            ("node", _) => aggregated_properties(
                &node_variable,
                &format!("{type_prefix}NodeAggregateSelection"),
                target.fields(),
                &aggregate.selection.fields,
            )?,
            ("edge", Some(edge_variable)) => {
                let properties = relation.properties.ok_or_else(|| {
                    TranslationError::validation(
                        &aggregate.name,
                        format!("{} has no relationship properties", relation_field.name),
                    )
                })?;
                aggregated_properties(
                    edge_variable,
                    &format!("{type_prefix}EdgeAggregateSelection"),
                    &system.relationship_properties(properties).fields,
                    &aggregate.selection.fields,
                )?
            }
            (name, _) => {
                return Err(TranslationError::validation(
                    name,
                    "expected count, node or edge",
                ));
            }
        };
        entries.push((aggregate.output_name().to_string(), value));
    }

    let pattern = related(
        parent,
        relation,
        edge_variable.as_deref(),
        NodePattern::new(&node_variable, target_labels(system, relation.target)),
    );

    let mut statement = Statement::new().then(Clause::with_variables(&[parent]));
    statement.append(match_and_filter(pattern, filter).into());
    statement.push(Clause::Return(Projection::new(vec![ReturnItem::aliased(
        Expression::map(entries),
        result,
    )])));
    Ok(statement)
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A field computed by a schema-supplied statement, which sees the parent as `this`.
pub(super) fn cypher_subquery(
    ctx: &mut QueryContext<'_>,
    parent: &str,
    field: &Field,
    cypher: &CypherField,
    selected: &SelectionField,
    result: &str,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let value_variable = ctx.next_variable();

    let mut inner = Statement::new().then(Clause::with_variables(&[parent]));
    if parent != "this" {
        inner.push(Clause::With(Projection::new(vec![ReturnItem::aliased(
            Expression::variable(parent),
            "this",
        )])));
    }
    inner.push(Clause::Raw(cypher.statement.clone()));

    let mut statement = Statement::new()
        .then(Clause::with_variables(&[parent]))
        .then(Clause::call(inner))
        .then(Clause::With(Projection::new(vec![ReturnItem::aliased(
            Expression::variable(&cypher.column_name),
            &value_variable,
        )])));

    match cypher.target {
        Some(EntityId::Node(node_id)) => {
            let node = &system.nodes[node_id];
            let projection = project_node(
                ctx,
                node_id,
                &value_variable,
                &selected.selection.for_node(&node.name),
                &[],
                false,
                depth,
            )?;
            statement.push_subqueries(projection.subqueries);
            statement.push(with_projection(projection.projection, &value_variable));
        }
        Some(target) if is_abstract(target) => {
            let projection = Expression::project(
                &value_variable,
                vec![
                    MapProjectionItem::AllProperties,
                    MapProjectionItem::Entry(
                        RESOLVE_TYPE.to_string(),
                        functions::head(functions::labels(Expression::variable(&value_variable))),
                    ),
                ],
            );
            statement.push(with_projection(projection, &value_variable));
        }
        _ => {}
    }

    statement.push(collect_as(field, &value_variable, result));
    Ok(statement)
}
