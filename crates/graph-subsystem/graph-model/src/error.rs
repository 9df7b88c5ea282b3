// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelBuildingError {
    #[error("Type '{0}' is defined more than once")]
    DuplicateType(String),

    #[error("Field '{field}' is defined more than once in '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("Field '{type_name}.{field}' refers to unknown type '{target}'")]
    UnknownTarget {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("Field '{type_name}.{field}' refers to unknown relationship properties '{properties}'")]
    UnknownRelationshipProperties {
        type_name: String,
        field: String,
        properties: String,
    },

    #[error("'{type_name}' implements unknown interface '{interface}'")]
    UnknownInterface { type_name: String, interface: String },

    #[error("Member '{member}' of union '{union}' is not a node type")]
    UnionMemberNotNode { union: String, member: String },

    #[error("Computed field '{type_name}.{field}' requires unknown field '{required}'")]
    UnknownRequiredField {
        type_name: String,
        field: String,
        required: String,
    },

    #[error("Invalid field '{type_name}.{field}': {message}")]
    InvalidField {
        type_name: String,
        field: String,
        message: String,
    },

    #[error("Invalid authorization rule on '{0}': {1}")]
    InvalidAuthorizationRule(String, String),
}
