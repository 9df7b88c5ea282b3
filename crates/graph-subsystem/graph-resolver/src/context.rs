// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::Expression;
use graph_model::subsystem::GraphSubsystem;
use indexmap::IndexMap;

use crate::{config::TranslatorConfig, error::TranslationError};

/// The caller's identity, as established by the authentication layer in front of the translator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    pub is_authenticated: bool,
    pub claims: IndexMap<String, Val>,
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: IndexMap<String, Val>, roles: Vec<String>) -> Self {
        Self {
            is_authenticated: true,
            claims,
            roles,
        }
    }

    /// Claims plus `roles`, as seen by rules through `$jwt`.
    pub fn jwt(&self) -> Val {
        let mut claims = self.claims.clone();
        claims.insert(
            "roles".to_string(),
            Val::List(self.roles.iter().map(|role| Val::String(role.clone())).collect()),
        );
        Val::Object(claims)
    }
}

/// Request-scoped translation state. Never shared between requests.
pub struct QueryContext<'a> {
    pub system: &'a GraphSubsystem,
    pub auth: &'a AuthContext,
    pub config: &'a TranslatorConfig,
    counter: usize,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        system: &'a GraphSubsystem,
        auth: &'a AuthContext,
        config: &'a TranslatorConfig,
    ) -> Self {
        Self {
            system,
            auth,
            config,
            counter: 0,
        }
    }

    fn next_index(&mut self) -> usize {
        let index = self.counter;
        self.counter += 1;
        index
    }

    /// A fresh pattern variable (`this0`, `this1`, ...).
    pub fn next_variable(&mut self) -> String {
        format!("this{}", self.next_index())
    }

    /// A fresh name with the given prefix (`var2`), for subquery result columns.
    pub fn next_name(&mut self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_index())
    }

    /// A fresh parameter (`$param3`) bound to `value`.
    pub fn next_param(&mut self, value: serde_json::Value) -> Expression {
        let name = format!("param{}", self.next_index());
        Expression::param(name, value)
    }

    pub fn is_authenticated_param(&self) -> Expression {
        Expression::param(
            "isAuthenticated",
            serde_json::Value::Bool(self.auth.is_authenticated),
        )
    }

    pub fn jwt_param(&self) -> Expression {
        let jwt = serde_json::Value::try_from(self.auth.jwt()).unwrap_or(serde_json::Value::Null);
        Expression::param("jwt", jwt)
    }

    pub fn check_depth(&self, depth: usize) -> Result<(), TranslationError> {
        if depth > self.config.max_depth {
            Err(TranslationError::DepthLimitExceeded(self.config.max_depth))
        } else {
            Ok(())
        }
    }
}
