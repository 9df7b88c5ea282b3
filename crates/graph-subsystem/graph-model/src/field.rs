// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use serde::{Deserialize, Serialize};

use crate::{
    access::{AuthenticationAnnotation, AuthorizationAnnotation},
    entity::{EntityId, InterfaceId, NodeId, RelationshipPropertiesId, UnionId},
    types::{FieldType, ScalarKind},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub typ: FieldType,
    pub kind: FieldKind,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarField),
    Relation(RelationField),
    /// The paginated view of the relation field named in [`ConnectionField::relation_field`]
    Connection(ConnectionField),
    /// Resolved outside the statement; selecting it projects the fields it requires
    Computed(ComputedField),
    Cypher(CypherField),
    /// Interface-typed property without a relationship
    Interface(InterfaceId),
    /// Union-typed property without a relationship
    Union(UnionId),
    /// Node-typed property without a relationship
    Object(NodeId),
    /// Excluded from translation
    Ignored,
}

impl Field {
    /// The property name in the database.
    pub fn db_name(&self) -> &str {
        match &self.kind {
            FieldKind::Scalar(ScalarField {
                db_property_name: Some(db_name),
                ..
            }) => db_name,
            _ => &self.name,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarField> {
        match &self.kind {
            FieldKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&RelationField> {
        match &self.kind {
            FieldKind::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.typ.is_list
    }

    pub fn is_required(&self) -> bool {
        self.typ.required
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub kind: ScalarKind,
    pub db_property_name: Option<String>,
    /// `randomUUID()` on create (ID fields)
    pub autogenerate: bool,
    /// Applied on create when the input omits the field
    pub default: Option<Val>,
    /// Substituted for a missing property inside filters
    pub coalesce: Option<Val>,
    pub timestamps: Vec<TimestampOperation>,
    pub unique: bool,
}

impl ScalarField {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            db_property_name: None,
            autogenerate: false,
            default: None,
            coalesce: None,
            timestamps: vec![],
            unique: false,
        }
    }

    pub fn sets_timestamp_on(&self, operation: TimestampOperation) -> bool {
        self.timestamps.contains(&operation)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOperation {
    Create,
    Update,
}

/// Direction of the relationship, from the node declaring the field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipDirection {
    Out,
    In,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelationField {
    pub rel_type: String,
    pub direction: RelationshipDirection,
    pub target: EntityId,
    pub properties: Option<RelationshipPropertiesId>,
    pub nested_operations: NestedOperations,
}

/// Which nested mutation inputs a relation field accepts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedOperations {
    pub create: bool,
    pub connect: bool,
    pub disconnect: bool,
    pub update: bool,
    pub delete: bool,
    pub connect_or_create: bool,
}

impl Default for NestedOperations {
    fn default() -> Self {
        Self {
            create: true,
            connect: true,
            disconnect: true,
            update: true,
            delete: true,
            connect_or_create: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionField {
    pub relation_field: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ComputedField {
    pub requires: Vec<String>,
}

/// A field resolved by a statement fragment. The fragment sees the current node as `this` and
/// must return `column_name`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CypherField {
    pub statement: String,
    pub column_name: String,
    /// Set when the fragment returns nodes of a declared type
    pub target: Option<EntityId>,
}
