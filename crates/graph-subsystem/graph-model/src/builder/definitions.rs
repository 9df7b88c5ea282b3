// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Unlinked type definitions, as produced by schema augmentation. Relationship targets,
//! interfaces and union members are referred to by name; [`super::build`] resolves them.

use common::value::Val;

use crate::{
    access::{AuthenticationAnnotation, AuthorizationAnnotation},
    entity::FulltextIndex,
    field::{NestedOperations, RelationshipDirection, TimestampOperation},
    types::FieldType,
};

#[derive(Debug, Clone, Default)]
pub struct TypeDefinitions {
    pub nodes: Vec<NodeDefinition>,
    pub interfaces: Vec<InterfaceDefinition>,
    pub unions: Vec<UnionDefinition>,
    pub relationship_properties: Vec<RelationshipPropertiesDefinition>,
    pub enums: Vec<String>,
    pub scalars: Vec<String>,

    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
}

#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub name: String,
    /// Defaults to the node name when empty
    pub labels: Vec<String>,
    pub fields: Vec<FieldDefinition>,
    pub interfaces: Vec<String>,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
    pub fulltext_indexes: Vec<FulltextIndex>,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            labels: vec![],
            fields,
            interfaces: vec![],
            authorization: None,
            authentication: None,
            fulltext_indexes: vec![],
        }
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn authorization(mut self, annotation: AuthorizationAnnotation) -> Self {
        self.authorization = Some(annotation);
        self
    }

    pub fn authentication(mut self, annotation: AuthenticationAnnotation) -> Self {
        self.authentication = Some(annotation);
        self
    }

    pub fn fulltext(mut self, index: FulltextIndex) -> Self {
        self.fulltext_indexes.push(index);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub extends: Vec<String>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields,
            extends: vec![],
        }
    }

    pub fn extends(mut self, interface: impl Into<String>) -> Self {
        self.extends.push(interface.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct UnionDefinition {
    pub name: String,
    pub members: Vec<String>,
}

impl UnionDefinition {
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members.iter().map(|member| member.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipPropertiesDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl RelationshipPropertiesDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub typ: FieldType,
    pub kind: FieldDefinitionKind,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
}

#[derive(Debug, Clone)]
pub enum FieldDefinitionKind {
    /// A scalar, enum or custom scalar, or a node/interface/union-typed property without a
    /// relationship, depending on what the type name resolves to
    Plain(ScalarAttributes),
    Relationship {
        rel_type: String,
        direction: RelationshipDirection,
        properties: Option<String>,
        nested_operations: NestedOperations,
    },
    Computed {
        requires: Vec<String>,
    },
    Cypher {
        statement: String,
        column_name: String,
    },
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct ScalarAttributes {
    pub db_property_name: Option<String>,
    pub autogenerate: bool,
    pub default: Option<Val>,
    pub coalesce: Option<Val>,
    pub timestamps: Vec<TimestampOperation>,
    pub unique: bool,
}

impl FieldDefinition {
    fn new(name: impl Into<String>, typ: FieldType, kind: FieldDefinitionKind) -> Self {
        Self {
            name: name.into(),
            typ,
            kind,
            authorization: None,
            authentication: None,
        }
    }

    pub fn scalar(name: impl Into<String>, typ: FieldType) -> Self {
        Self::new(name, typ, FieldDefinitionKind::Plain(ScalarAttributes::default()))
    }

    pub fn relationship(
        name: impl Into<String>,
        typ: FieldType,
        rel_type: impl Into<String>,
        direction: RelationshipDirection,
    ) -> Self {
        Self::new(
            name,
            typ,
            FieldDefinitionKind::Relationship {
                rel_type: rel_type.into(),
                direction,
                properties: None,
                nested_operations: NestedOperations::default(),
            },
        )
    }

    pub fn computed(name: impl Into<String>, typ: FieldType, requires: &[&str]) -> Self {
        Self::new(
            name,
            typ,
            FieldDefinitionKind::Computed {
                requires: requires.iter().map(|r| r.to_string()).collect(),
            },
        )
    }

    pub fn cypher(
        name: impl Into<String>,
        typ: FieldType,
        statement: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            typ,
            FieldDefinitionKind::Cypher {
                statement: statement.into(),
                column_name: column_name.into(),
            },
        )
    }

    pub fn ignored(name: impl Into<String>, typ: FieldType) -> Self {
        Self::new(name, typ, FieldDefinitionKind::Ignored)
    }

    pub fn authorization(mut self, annotation: AuthorizationAnnotation) -> Self {
        self.authorization = Some(annotation);
        self
    }

    pub fn authentication(mut self, annotation: AuthenticationAnnotation) -> Self {
        self.authentication = Some(annotation);
        self
    }

    /// Relationship properties type; only meaningful for relationship fields.
    pub fn properties(mut self, name: impl Into<String>) -> Self {
        if let FieldDefinitionKind::Relationship { properties, .. } = &mut self.kind {
            *properties = Some(name.into());
        }
        self
    }

    pub fn nested_operations(mut self, operations: NestedOperations) -> Self {
        if let FieldDefinitionKind::Relationship {
            nested_operations, ..
        } = &mut self.kind
        {
            *nested_operations = operations;
        }
        self
    }

    fn with_attributes(mut self, update: impl FnOnce(&mut ScalarAttributes)) -> Self {
        if let FieldDefinitionKind::Plain(attributes) = &mut self.kind {
            update(attributes);
        }
        self
    }

    pub fn db_name(self, db_name: impl Into<String>) -> Self {
        let db_name = db_name.into();
        self.with_attributes(|a| a.db_property_name = Some(db_name))
    }

    pub fn unique(self) -> Self {
        self.with_attributes(|a| a.unique = true)
    }

    pub fn autogenerate(self) -> Self {
        self.with_attributes(|a| a.autogenerate = true)
    }

    pub fn default_value(self, value: Val) -> Self {
        self.with_attributes(|a| a.default = Some(value))
    }

    pub fn coalesce(self, value: Val) -> Self {
        self.with_attributes(|a| a.coalesce = Some(value))
    }

    pub fn timestamps(self, operations: Vec<TimestampOperation>) -> Self {
        self.with_attributes(|a| a.timestamps = operations)
    }
}
