// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Nested mutations.
//!
//! A mutation input is keyed by field. Scalar keys become `SET` items; relation keys carry nested
//! operations (`create`, `connect`, `connectOrCreate`, `update`, `disconnect`, `delete`) that are
//! compiled by [`relation_operation`] against every concrete node the relation may target. Each
//! operation runs after the write of its parent, so the generated clauses follow the dependency
//! order of the input tree.

mod cardinality;
mod connect;
mod connect_or_create;
mod create;
mod delete;
mod disconnect;
mod set_properties;
mod update;

use common::value::Val;
use exo_cypher::{Clause, Statement};
use graph_model::{
    entity::{EntityId, Node, NodeId},
    field::{Field, NestedOperations, RelationField},
    subsystem::GraphSubsystem,
};
use indexmap::IndexMap;

use crate::{
    context::QueryContext, error::TranslationError, input::expect_object, naming::ChainString,
};

pub use cardinality::RELATIONSHIP_REQUIRED;
pub(crate) use cardinality::cardinality_validations;
pub(crate) use create::create_node;
pub(crate) use delete::nested_deletes;
pub(crate) use update::update_root;
#[cfg(test)]
pub(crate) use update::update_node;

/// An operation nested under a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NestedOperation {
    Create,
    Connect,
    ConnectOrCreate,
    Update,
    Disconnect,
    Delete,
}

impl NestedOperation {
    pub fn from_key(key: &str) -> Option<Self> {
        let operation = match key {
            "create" => NestedOperation::Create,
            "connect" => NestedOperation::Connect,
            "connectOrCreate" => NestedOperation::ConnectOrCreate,
            "update" => NestedOperation::Update,
            "disconnect" => NestedOperation::Disconnect,
            "delete" => NestedOperation::Delete,
            _ => return None,
        };
        Some(operation)
    }

    pub fn key(&self) -> &'static str {
        match self {
            NestedOperation::Create => "create",
            NestedOperation::Connect => "connect",
            NestedOperation::ConnectOrCreate => "connectOrCreate",
            NestedOperation::Update => "update",
            NestedOperation::Disconnect => "disconnect",
            NestedOperation::Delete => "delete",
        }
    }

    fn is_enabled(&self, operations: &NestedOperations) -> bool {
        match self {
            NestedOperation::Create => operations.create,
            NestedOperation::Connect => operations.connect,
            NestedOperation::ConnectOrCreate => operations.connect_or_create,
            NestedOperation::Update => operations.update,
            NestedOperation::Disconnect => operations.disconnect,
            NestedOperation::Delete => operations.delete,
        }
    }
}

/// Operations a relation input may carry below a created node.
pub(crate) const CREATE_OPERATIONS: &[NestedOperation] = &[
    NestedOperation::Create,
    NestedOperation::Connect,
    NestedOperation::ConnectOrCreate,
];

/// Operations a relation input may carry below an updated node.
pub(crate) const UPDATE_OPERATIONS: &[NestedOperation] = &[
    NestedOperation::Create,
    NestedOperation::Connect,
    NestedOperation::ConnectOrCreate,
    NestedOperation::Update,
    NestedOperation::Disconnect,
    NestedOperation::Delete,
];

/// The node a nested operation hangs off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Parent<'p> {
    pub node_id: NodeId,
    pub variable: &'p str,
    /// Variables in scope, carried through every `WITH`
    pub with_vars: &'p [String],
    /// The parent is being created by this statement
    pub created: bool,
}

/// Relation input aimed at one concrete target node. `qualifier` names the node when the
/// relation is abstract, and is part of every generated name.
pub(crate) struct TargetInput<'a, 'v> {
    pub node_id: NodeId,
    pub node: &'a Node,
    pub qualifier: Option<&'a str>,
    pub input: &'v Val,
}

impl TargetInput<'_, '_> {
    /// The entity a `where` under this input is written against. Union inputs are already split
    /// by member.
    pub fn where_entity(&self, relation: &RelationField) -> EntityId {
        match relation.target {
            EntityId::Union(_) => EntityId::Node(self.node_id),
            target => target,
        }
    }
}

/// Split a relation input by target node. Union inputs are keyed by member; node and interface
/// inputs apply to every concrete target.
pub(crate) fn target_inputs<'a, 'v>(
    system: &'a GraphSubsystem,
    relation: &RelationField,
    input: &'v Val,
    field_name: &str,
) -> Result<Vec<TargetInput<'a, 'v>>, TranslationError> {
    match relation.target {
        EntityId::Node(node_id) => Ok(vec![TargetInput {
            node_id,
            node: &system.nodes[node_id],
            qualifier: None,
            input,
        }]),
        EntityId::Interface(_) => Ok(system
            .concrete_nodes(relation.target)
            .into_iter()
            .map(|node_id| {
                let node = &system.nodes[node_id];
                TargetInput {
                    node_id,
                    node,
                    qualifier: Some(node.name.as_str()),
                    input,
                }
            })
            .collect()),
        EntityId::Union(_) => {
            let members = system.concrete_nodes(relation.target);
            let mut targets = vec![];
            for (member, member_input) in expect_object(input, field_name)? {
                let node_id = members
                    .iter()
                    .copied()
                    .find(|node_id| system.nodes[*node_id].name == *member)
                    .ok_or_else(|| {
                        TranslationError::validation(
                            field_name,
                            format!("{member} is not a member of the union"),
                        )
                    })?;
                let node = &system.nodes[node_id];
                targets.push(TargetInput {
                    node_id,
                    node,
                    qualifier: Some(node.name.as_str()),
                    input: member_input,
                });
            }
            Ok(targets)
        }
    }
}

/// Fields of an interface input for one implementation: the common fields, overridden by the
/// implementation's `_on` entry.
pub(crate) fn input_for_node(
    input: &IndexMap<String, Val>,
    node: &Node,
) -> Result<IndexMap<String, Val>, TranslationError> {
    let mut merged: IndexMap<String, Val> = input
        .iter()
        .filter(|(key, _)| key.as_str() != "_on")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(on) = input.get("_on") {
        if let Some(node_input) = expect_object(on, "_on")?.get(&node.name) {
            for (key, value) in expect_object(node_input, &node.name)? {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(merged)
}

/// Variables in scope plus `variable`.
pub(crate) fn carrying(with_vars: &[String], variable: &str) -> Vec<String> {
    let mut carried = with_vars.to_vec();
    if !carried.iter().any(|carried| carried == variable) {
        carried.push(variable.to_string());
    }
    carried
}

/// Compile one relation key of a mutation input. `input` is the value under the relation field;
/// each of its operations must be in `allowed` and enabled on the relation.
pub(crate) fn relation_operations(
    ctx: &mut QueryContext<'_>,
    parent: Parent<'_>,
    field: &Field,
    input: &Val,
    allowed: &[NestedOperation],
    depth: usize,
) -> Result<Statement, TranslationError> {
    ctx.check_depth(depth)?;
    let system = ctx.system;
    let relation = field.as_relation().ok_or_else(|| {
        TranslationError::validation(&field.name, "not a relationship field")
    })?;

    let mut statement = Statement::new();
    for target in target_inputs(system, relation, input, &field.name)? {
        let chain = ChainString::new(parent.variable)
            .push(&field.name)
            .push_opt(target.qualifier);

        let listed = matches!(target.input, Val::List(_));
        for (item_index, item) in target.input.as_one_or_many().iter().enumerate() {
            for (key, value) in expect_object(item, &field.name)? {
                // An update's `where` is read alongside its `update`
                if key == "where" && allowed.contains(&NestedOperation::Update) {
                    continue;
                }
                let operation = NestedOperation::from_key(key)
                    .filter(|operation| allowed.contains(operation))
                    .ok_or_else(|| {
                        TranslationError::validation(
                            key,
                            format!("not a valid operation on {}", field.name),
                        )
                    })?;
                if !operation.is_enabled(&relation.nested_operations) {
                    return Err(TranslationError::validation(
                        &field.name,
                        format!("{} is disabled for this relationship", operation.key()),
                    ));
                }

                let scope = RelationScope {
                    parent,
                    field,
                    relation,
                    target: &target,
                    chain: &chain,
                    item_index,
                    listed,
                };
                statement.append(relation_operation(ctx, &scope, operation, item, value, depth)?);
            }
        }
    }
    Ok(statement)
}

/// Everything an operation under one relation and target needs.
pub(crate) struct RelationScope<'s, 'a, 'v> {
    pub parent: Parent<'s>,
    pub field: &'s Field,
    pub relation: &'s RelationField,
    pub target: &'s TargetInput<'a, 'v>,
    /// `<parent>_<field>[_<node>]`
    pub chain: &'s ChainString,
    /// Position of the relation input item this operation came from
    pub item_index: usize,
    /// The relation input is a list of items rather than a single item
    pub listed: bool,
}

impl RelationScope<'_, '_, '_> {
    /// `WITH` of the variables in scope, before the clauses of an operation.
    pub fn carry(&self) -> Clause {
        Clause::with_variables(self.parent.with_vars)
    }

    /// Chain of the relation input item: `<parent>_<field>[_<node>]`, with the item position
    /// appended when the input lists several items (`this_friends1`).
    pub fn item_chain(&self) -> ChainString {
        if self.listed {
            self.chain.index(self.item_index)
        } else {
            self.chain.clone()
        }
    }
}

fn relation_operation(
    ctx: &mut QueryContext<'_>,
    scope: &RelationScope<'_, '_, '_>,
    operation: NestedOperation,
    item: &Val,
    value: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let mut statement = Statement::new();
    for (index, element) in value.as_one_or_many().iter().enumerate() {
        let part = match operation {
            NestedOperation::Create => create::nested_create(ctx, scope, element, index, depth)?,
            NestedOperation::Connect => connect::connect(ctx, scope, element, index, depth)?,
            NestedOperation::ConnectOrCreate => {
                connect_or_create::connect_or_create(ctx, scope, element, index, depth)?
            }
            NestedOperation::Update => {
                let where_ = expect_object(item, &scope.field.name)?.get("where");
                update::nested_update(ctx, scope, where_, element, depth)?
            }
            NestedOperation::Disconnect => {
                disconnect::disconnect(ctx, scope, element, index, depth)?
            }
            NestedOperation::Delete => delete::nested_delete(ctx, scope, element, index, depth)?,
        };
        statement.append(part);
    }
    Ok(statement)
}

/// Apply every relation key of `input` (an object keyed by the node's relation fields) with
/// `operation`. Used for `connect: {friends: [...]}` style inputs.
pub(crate) fn keyed_relation_operations(
    ctx: &mut QueryContext<'_>,
    parent: Parent<'_>,
    operation: NestedOperation,
    input: &Val,
    depth: usize,
) -> Result<Statement, TranslationError> {
    let system = ctx.system;
    let node = &system.nodes[parent.node_id];

    let mut statement = Statement::new();
    for (key, value) in expect_object(input, operation.key())? {
        let field = node
            .field(key)
            .filter(|field| field.as_relation().is_some())
            .ok_or_else(|| {
                TranslationError::validation(key, format!("no such relationship on {}", node.name))
            })?;

        // Re-key as `{<operation>: value}` so every entry point shares one compiler
        let wrapped = match field.as_relation().map(|relation| relation.target) {
            Some(EntityId::Union(_)) => rekey_union(value, operation)?,
            _ => Val::Object(IndexMap::from([(
                operation.key().to_string(),
                value.clone(),
            )])),
        };
        statement.append(relation_operations(
            ctx,
            parent,
            field,
            &wrapped,
            &[operation],
            depth + 1,
        )?);
    }
    Ok(statement)
}

/// `{Movie: [...]}` becomes `{Movie: {<operation>: [...]}}`.
fn rekey_union(value: &Val, operation: NestedOperation) -> Result<Val, TranslationError> {
    let members = expect_object(value, operation.key())?
        .iter()
        .map(|(member, member_value)| {
            (
                member.clone(),
                Val::Object(IndexMap::from([(
                    operation.key().to_string(),
                    member_value.clone(),
                )])),
            )
        })
        .collect();
    Ok(Val::Object(members))
}
