// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_cypher::{Direction, NodePattern, Pattern, RelationshipPattern};
use graph_model::{
    entity::EntityId,
    field::{RelationField, RelationshipDirection},
    subsystem::GraphSubsystem,
};

pub(crate) fn relationship(
    relation: &RelationField,
    variable: Option<&str>,
) -> RelationshipPattern {
    let direction = match relation.direction {
        RelationshipDirection::Out => Direction::Outgoing,
        RelationshipDirection::In => Direction::Incoming,
    };
    let pattern = RelationshipPattern::new(&relation.rel_type, direction);
    match variable {
        Some(variable) => pattern.named(variable),
        None => pattern,
    }
}

/// Labels that identify the target in a pattern. Only concrete nodes have labels of their own.
pub(crate) fn target_labels(system: &GraphSubsystem, target: EntityId) -> Vec<String> {
    match target {
        EntityId::Node(id) => system.nodes[id].labels.clone(),
        EntityId::Interface(_) | EntityId::Union(_) => vec![],
    }
}

/// `(parent)-[rel:TYPE]->(end)`
pub(crate) fn related(
    parent: &str,
    relation: &RelationField,
    rel_variable: Option<&str>,
    end: NodePattern,
) -> Pattern {
    Pattern::node(NodePattern::named(parent)).relate(relationship(relation, rel_variable), end)
}
