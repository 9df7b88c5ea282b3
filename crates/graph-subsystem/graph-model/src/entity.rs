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
    field::{Field, FieldKind},
    mapped_arena::SerializableSlabIndex,
};

pub type NodeId = SerializableSlabIndex<Node>;
pub type InterfaceId = SerializableSlabIndex<Interface>;
pub type UnionId = SerializableSlabIndex<Union>;
pub type RelationshipPropertiesId = SerializableSlabIndex<RelationshipProperties>;

/// The target of a relationship field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Node(NodeId),
    Interface(InterfaceId),
    Union(UnionId),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub labels: Vec<String>,
    pub fields: Vec<Field>,
    pub interfaces: Vec<InterfaceId>,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
    pub fulltext_indexes: Vec<FulltextIndex>,
}

impl Node {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields that identify a node: unique scalars and autogenerated IDs.
    pub fn unique_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| match &field.kind {
            FieldKind::Scalar(scalar) => scalar.unique || scalar.autogenerate,
            _ => false,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub fields: Vec<Field>,
    /// Every node declaring this interface, in declaration order
    pub implementations: Vec<NodeId>,
    pub extends: Vec<InterfaceId>,
}

impl Interface {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Union {
    pub name: String,
    pub members: Vec<NodeId>,
}

/// Properties stored on the relationship of a relation field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelationshipProperties {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RelationshipProperties {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FulltextIndex {
    pub name: String,
    pub fields: Vec<String>,
}

/// A borrowed, resolved [`EntityId`].
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Node(&'a Node),
    Interface(&'a Interface),
    Union(&'a Union),
}

impl<'a> EntityRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Node(node) => &node.name,
            EntityRef::Interface(interface) => &interface.name,
            EntityRef::Union(union) => &union.name,
        }
    }

    /// Fields shared by every concrete node. Unions have none.
    pub fn fields(&self) -> &'a [Field] {
        match self {
            EntityRef::Node(node) => &node.fields,
            EntityRef::Interface(interface) => &interface.fields,
            EntityRef::Union(_) => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&'a Field> {
        self.fields().iter().find(|field| field.name == name)
    }
}
