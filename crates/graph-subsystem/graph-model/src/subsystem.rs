// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::{
    access::{AuthenticationAnnotation, AuthorizationAnnotation},
    entity::{
        EntityId, EntityRef, Interface, Node, NodeId, RelationshipProperties,
        RelationshipPropertiesId, Union,
    },
    mapped_arena::MappedArena,
};

/// A fully linked graph schema. Built once by [`crate::builder::build`] and read-only afterwards.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GraphSubsystem {
    pub nodes: MappedArena<Node>,
    pub interfaces: MappedArena<Interface>,
    pub unions: MappedArena<Union>,
    pub relationship_properties: MappedArena<RelationshipProperties>,

    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
}

impl GraphSubsystem {
    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        if let Some(id) = self.nodes.get_id(name) {
            Some(EntityId::Node(id))
        } else if let Some(id) = self.interfaces.get_id(name) {
            Some(EntityId::Interface(id))
        } else {
            self.unions.get_id(name).map(EntityId::Union)
        }
    }

    pub fn entity(&self, id: EntityId) -> EntityRef<'_> {
        match id {
            EntityId::Node(id) => EntityRef::Node(&self.nodes[id]),
            EntityId::Interface(id) => EntityRef::Interface(&self.interfaces[id]),
            EntityId::Union(id) => EntityRef::Union(&self.unions[id]),
        }
    }

    /// The concrete nodes an entity may resolve to.
    pub fn concrete_nodes(&self, id: EntityId) -> Vec<NodeId> {
        match id {
            EntityId::Node(id) => vec![id],
            EntityId::Interface(id) => self.interfaces[id].implementations.clone(),
            EntityId::Union(id) => self.unions[id].members.clone(),
        }
    }

    pub fn relationship_properties(&self, id: RelationshipPropertiesId) -> &RelationshipProperties {
        &self.relationship_properties[id]
    }
}
