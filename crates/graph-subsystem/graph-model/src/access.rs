// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Authorization and authentication annotations.
//!
//! Annotations may be attached to the whole schema, to a node, and to individual fields. A rule's
//! `predicate` is kept as the raw input tree (`AND`/`OR`/`NOT`/`node`/`jwt` keys) and compiled per
//! request, since it may refer to the request's claims.

use common::value::Val;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationOperation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
}

impl AuthorizationOperation {
    pub const ALL: [AuthorizationOperation; 7] = [
        AuthorizationOperation::Read,
        AuthorizationOperation::Aggregate,
        AuthorizationOperation::Create,
        AuthorizationOperation::Update,
        AuthorizationOperation::Delete,
        AuthorizationOperation::CreateRelationship,
        AuthorizationOperation::DeleteRelationship,
    ];
}

/// When a validation rule is evaluated relative to the writes of a statement.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Before,
    After,
}

/// Narrows the set of visible nodes. Never applies to `Create`, since there is nothing to filter
/// before a node exists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub operations: Vec<AuthorizationOperation>,
    pub require_authentication: bool,
    pub predicate: Val,
}

impl FilterRule {
    pub fn new(predicate: Val) -> Self {
        Self {
            operations: AuthorizationOperation::ALL
                .into_iter()
                .filter(|op| *op != AuthorizationOperation::Create)
                .collect(),
            require_authentication: true,
            predicate,
        }
    }

    pub fn with_operations(mut self, operations: Vec<AuthorizationOperation>) -> Self {
        self.operations = operations;
        self
    }

    pub fn allow_unauthenticated(mut self) -> Self {
        self.require_authentication = false;
        self
    }

    pub fn applies_to(&self, operations: &[AuthorizationOperation]) -> bool {
        operations.iter().any(|op| self.operations.contains(op))
    }
}

/// Fails the whole statement when the predicate does not hold.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValidateRule {
    pub operations: Vec<AuthorizationOperation>,
    pub when: Vec<ValidationStage>,
    pub require_authentication: bool,
    pub predicate: Val,
}

impl ValidateRule {
    pub fn new(predicate: Val) -> Self {
        Self {
            operations: AuthorizationOperation::ALL.to_vec(),
            when: vec![ValidationStage::Before, ValidationStage::After],
            require_authentication: true,
            predicate,
        }
    }

    pub fn with_operations(mut self, operations: Vec<AuthorizationOperation>) -> Self {
        self.operations = operations;
        self
    }

    pub fn when(mut self, when: Vec<ValidationStage>) -> Self {
        self.when = when;
        self
    }

    pub fn allow_unauthenticated(mut self) -> Self {
        self.require_authentication = false;
        self
    }

    pub fn applies_to(&self, operations: &[AuthorizationOperation], stage: ValidationStage) -> bool {
        self.when.contains(&stage) && operations.iter().any(|op| self.operations.contains(op))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AuthorizationAnnotation {
    pub filter: Vec<FilterRule>,
    pub validate: Vec<ValidateRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationOperation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
    Subscribe,
}

impl AuthenticationOperation {
    pub const ALL: [AuthenticationOperation; 8] = [
        AuthenticationOperation::Read,
        AuthenticationOperation::Aggregate,
        AuthenticationOperation::Create,
        AuthenticationOperation::Update,
        AuthenticationOperation::Delete,
        AuthenticationOperation::CreateRelationship,
        AuthenticationOperation::DeleteRelationship,
        AuthenticationOperation::Subscribe,
    ];
}

/// Requires an authenticated caller for the listed operations, optionally with claims matching
/// `jwt`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthenticationAnnotation {
    pub operations: Vec<AuthenticationOperation>,
    pub jwt: Option<Val>,
}

impl Default for AuthenticationAnnotation {
    fn default() -> Self {
        Self {
            operations: AuthenticationOperation::ALL.to_vec(),
            jwt: None,
        }
    }
}

impl AuthenticationAnnotation {
    pub fn applies_to(&self, operation: AuthenticationOperation) -> bool {
        self.operations.contains(&operation)
    }
}
