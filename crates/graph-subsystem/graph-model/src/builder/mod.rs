// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Links [`TypeDefinitions`] into a [`GraphSubsystem`].
//!
//! Building happens in two passes. The shallow pass registers every node, interface, union and
//! relationship-properties type under its name with no fields. The expanded pass then builds the
//! fields, resolving each referenced name to the index registered by the shallow pass, and fills
//! in interface implementations. No partially linked model escapes `build`.

mod definitions;

use std::collections::HashSet;

pub use definitions::*;

use crate::{
    access::{AuthorizationAnnotation, AuthorizationOperation},
    entity::{EntityId, Interface, Node, RelationshipProperties, Union},
    error::ModelBuildingError,
    field::{
        ComputedField, ConnectionField, CypherField, Field, FieldKind, RelationField, ScalarField,
    },
    subsystem::GraphSubsystem,
    types::{FieldType, ScalarKind},
};

pub fn build(definitions: &TypeDefinitions) -> Result<GraphSubsystem, ModelBuildingError> {
    check_authorization("schema", definitions.authorization.as_ref())?;

    let mut building = GraphSubsystem {
        authorization: definitions.authorization.clone(),
        authentication: definitions.authentication.clone(),
        ..GraphSubsystem::default()
    };

    build_shallow(definitions, &mut building)?;
    build_expanded(definitions, &mut building)?;

    Ok(building)
}

/// Register every type by name, without fields.
fn build_shallow(
    definitions: &TypeDefinitions,
    building: &mut GraphSubsystem,
) -> Result<(), ModelBuildingError> {
    let mut seen = HashSet::new();
    let all_names = definitions
        .nodes
        .iter()
        .map(|d| &d.name)
        .chain(definitions.interfaces.iter().map(|d| &d.name))
        .chain(definitions.unions.iter().map(|d| &d.name))
        .chain(definitions.relationship_properties.iter().map(|d| &d.name))
        .chain(definitions.enums.iter())
        .chain(definitions.scalars.iter());

    for name in all_names {
        if !seen.insert(name.as_str()) || ScalarKind::builtin(name).is_some() {
            return Err(ModelBuildingError::DuplicateType(name.clone()));
        }
    }

    for node in &definitions.nodes {
        let labels = if node.labels.is_empty() {
            vec![node.name.clone()]
        } else {
            node.labels.clone()
        };
        building.nodes.add(
            &node.name,
            Node {
                name: node.name.clone(),
                labels,
                fields: vec![],
                interfaces: vec![],
                authorization: node.authorization.clone(),
                authentication: node.authentication.clone(),
                fulltext_indexes: node.fulltext_indexes.clone(),
            },
        );
    }

    for interface in &definitions.interfaces {
        building.interfaces.add(
            &interface.name,
            Interface {
                name: interface.name.clone(),
                fields: vec![],
                implementations: vec![],
                extends: vec![],
            },
        );
    }

    for union in &definitions.unions {
        building.unions.add(
            &union.name,
            Union {
                name: union.name.clone(),
                members: vec![],
            },
        );
    }

    for properties in &definitions.relationship_properties {
        building.relationship_properties.add(
            &properties.name,
            RelationshipProperties {
                name: properties.name.clone(),
                fields: vec![],
            },
        );
    }

    Ok(())
}

/// Build fields and resolve every reference by name.
fn build_expanded(
    definitions: &TypeDefinitions,
    building: &mut GraphSubsystem,
) -> Result<(), ModelBuildingError> {
    for definition in &definitions.relationship_properties {
        let fields = build_fields(&definition.name, &definition.fields, definitions, building)?;
        if let Some(field) = fields
            .iter()
            .find(|field| !matches!(field.kind, FieldKind::Scalar(_)))
        {
            return Err(ModelBuildingError::InvalidField {
                type_name: definition.name.clone(),
                field: field.name.clone(),
                message: "relationship properties may only hold scalar fields".to_string(),
            });
        }
        if let Some(id) = building.relationship_properties.get_id(&definition.name) {
            building.relationship_properties[id].fields = fields;
        }
    }

    for definition in &definitions.interfaces {
        let fields = build_fields(&definition.name, &definition.fields, definitions, building)?;
        let extends = definition
            .extends
            .iter()
            .map(|name| {
                building
                    .interfaces
                    .get_id(name)
                    .ok_or_else(|| ModelBuildingError::UnknownInterface {
                        type_name: definition.name.clone(),
                        interface: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(id) = building.interfaces.get_id(&definition.name) {
            building.interfaces[id].fields = fields;
            building.interfaces[id].extends = extends;
        }
    }

    for definition in &definitions.nodes {
        check_authorization(&definition.name, definition.authorization.as_ref())?;

        let fields = build_fields(&definition.name, &definition.fields, definitions, building)?;
        let node_id = match building.nodes.get_id(&definition.name) {
            Some(id) => id,
            None => continue,
        };

        let mut interfaces = vec![];
        for name in &definition.interfaces {
            let interface_id = building.interfaces.get_id(name).ok_or_else(|| {
                ModelBuildingError::UnknownInterface {
                    type_name: definition.name.clone(),
                    interface: name.clone(),
                }
            })?;
            building.interfaces[interface_id]
                .implementations
                .push(node_id);
            interfaces.push(interface_id);
        }

        let node = &mut building.nodes[node_id];
        node.fields = fields;
        node.interfaces = interfaces;
    }

    for definition in &definitions.unions {
        let members = definition
            .members
            .iter()
            .map(|member| {
                building
                    .nodes
                    .get_id(member)
                    .ok_or_else(|| ModelBuildingError::UnionMemberNotNode {
                        union: definition.name.clone(),
                        member: member.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(id) = building.unions.get_id(&definition.name) {
            building.unions[id].members = members;
        }
    }

    Ok(())
}

fn build_fields(
    type_name: &str,
    field_definitions: &[FieldDefinition],
    definitions: &TypeDefinitions,
    building: &GraphSubsystem,
) -> Result<Vec<Field>, ModelBuildingError> {
    let mut seen = HashSet::new();
    let mut fields = vec![];

    let mut check_unique = |name: &str| {
        if seen.insert(name.to_string()) {
            Ok(())
        } else {
            Err(ModelBuildingError::DuplicateField {
                type_name: type_name.to_string(),
                field: name.to_string(),
            })
        }
    };

    for definition in field_definitions {
        check_unique(&definition.name)?;
        check_authorization(
            &format!("{type_name}.{}", definition.name),
            definition.authorization.as_ref(),
        )?;

        let unknown_target = || ModelBuildingError::UnknownTarget {
            type_name: type_name.to_string(),
            field: definition.name.clone(),
            target: definition.typ.name.clone(),
        };

        let kind = match &definition.kind {
            FieldDefinitionKind::Plain(attributes) => {
                match scalar_kind(&definition.typ, definitions) {
                    Some(kind) => FieldKind::Scalar(ScalarField {
                        kind,
                        db_property_name: attributes.db_property_name.clone(),
                        autogenerate: attributes.autogenerate,
                        default: attributes.default.clone(),
                        coalesce: attributes.coalesce.clone(),
                        timestamps: attributes.timestamps.clone(),
                        unique: attributes.unique,
                    }),
                    None => match building.entity_id(&definition.typ.name) {
                        Some(EntityId::Node(id)) => FieldKind::Object(id),
                        Some(EntityId::Interface(id)) => FieldKind::Interface(id),
                        Some(EntityId::Union(id)) => FieldKind::Union(id),
                        None => return Err(unknown_target()),
                    },
                }
            }
            FieldDefinitionKind::Relationship {
                rel_type,
                direction,
                properties,
                nested_operations,
            } => {
                let target = building
                    .entity_id(&definition.typ.name)
                    .ok_or_else(unknown_target)?;
                let properties = properties
                    .as_ref()
                    .map(|properties| {
                        building
                            .relationship_properties
                            .get_id(properties)
                            .ok_or_else(|| ModelBuildingError::UnknownRelationshipProperties {
                                type_name: type_name.to_string(),
                                field: definition.name.clone(),
                                properties: properties.clone(),
                            })
                    })
                    .transpose()?;

                FieldKind::Relation(RelationField {
                    rel_type: rel_type.clone(),
                    direction: *direction,
                    target,
                    properties,
                    nested_operations: *nested_operations,
                })
            }
            FieldDefinitionKind::Computed { requires } => {
                if let Some(required) = requires
                    .iter()
                    .find(|required| !field_definitions.iter().any(|f| &f.name == *required))
                {
                    return Err(ModelBuildingError::UnknownRequiredField {
                        type_name: type_name.to_string(),
                        field: definition.name.clone(),
                        required: required.clone(),
                    });
                }
                FieldKind::Computed(ComputedField {
                    requires: requires.clone(),
                })
            }
            FieldDefinitionKind::Cypher {
                statement,
                column_name,
            } => FieldKind::Cypher(CypherField {
                statement: statement.clone(),
                column_name: column_name.clone(),
                target: match scalar_kind(&definition.typ, definitions) {
                    Some(_) => None,
                    None => Some(
                        building
                            .entity_id(&definition.typ.name)
                            .ok_or_else(unknown_target)?,
                    ),
                },
            }),
            FieldDefinitionKind::Ignored => FieldKind::Ignored,
        };

        let is_relation = matches!(kind, FieldKind::Relation(_));

        fields.push(Field {
            name: definition.name.clone(),
            typ: definition.typ.clone(),
            kind,
            authorization: definition.authorization.clone(),
            authentication: definition.authentication.clone(),
        });

        if is_relation {
            let connection_name = format!("{}Connection", definition.name);
            check_unique(&connection_name)?;
            fields.push(Field {
                name: connection_name,
                typ: FieldType::named(format!("{type_name}{}Connection", definition.name))
                    .required(),
                kind: FieldKind::Connection(ConnectionField {
                    relation_field: definition.name.clone(),
                }),
                authorization: definition.authorization.clone(),
                authentication: definition.authentication.clone(),
            });
        }
    }

    Ok(fields)
}

fn scalar_kind(typ: &FieldType, definitions: &TypeDefinitions) -> Option<ScalarKind> {
    ScalarKind::builtin(&typ.name).or_else(|| {
        if definitions.enums.contains(&typ.name) {
            Some(ScalarKind::Enum(typ.name.clone()))
        } else if definitions.scalars.contains(&typ.name) {
            Some(ScalarKind::CustomScalar(typ.name.clone()))
        } else {
            None
        }
    })
}

fn check_authorization(
    owner: &str,
    annotation: Option<&AuthorizationAnnotation>,
) -> Result<(), ModelBuildingError> {
    let creates_filter = annotation
        .map(|annotation| {
            annotation
                .filter
                .iter()
                .any(|rule| rule.operations.contains(&AuthorizationOperation::Create))
        })
        .unwrap_or(false);

    if creates_filter {
        Err(ModelBuildingError::InvalidAuthorizationRule(
            owner.to_string(),
            "filter rules cannot apply to CREATE".to_string(),
        ))
    } else {
        Ok(())
    }
}
