// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Helpers for reading request input trees.

use std::sync::OnceLock;

use common::value::Val;
use exo_cypher::{Expression, Literal};
use indexmap::IndexMap;

use crate::error::TranslationError;

pub(crate) fn to_json(value: &Val, field: &str) -> Result<serde_json::Value, TranslationError> {
    serde_json::Value::try_from(value.clone())
        .map_err(|e| TranslationError::validation(field, e.to_string()))
}

pub(crate) fn empty_object() -> &'static IndexMap<String, Val> {
    static EMPTY: OnceLock<IndexMap<String, Val>> = OnceLock::new();
    EMPTY.get_or_init(IndexMap::new)
}

/// The object at `value`. `null` reads as an empty object.
pub(crate) fn expect_object<'v>(
    value: &'v Val,
    field: &str,
) -> Result<&'v IndexMap<String, Val>, TranslationError> {
    match value {
        Val::Object(object) => Ok(object),
        Val::Null => Ok(empty_object()),
        other => Err(TranslationError::validation(
            field,
            format!("expected an object, found {}", other.kind_name()),
        )),
    }
}

/// A value embedded in the statement text (coalesce fallbacks).
pub(crate) fn literal(value: &Val, field: &str) -> Result<Expression, TranslationError> {
    let literal = match value {
        Val::Null => Literal::Null,
        Val::Bool(b) => Literal::Boolean(*b),
        Val::String(s) | Val::Enum(s) => Literal::String(s.clone()),
        Val::Number(n) => match n.as_i64() {
            Some(i) => Literal::Integer(i),
            None => match n.as_f64() {
                Some(f) => Literal::Float(f),
                None => {
                    return Err(TranslationError::validation(field, "invalid number"));
                }
            },
        },
        other => {
            return Err(TranslationError::validation(
                field,
                format!("a {} cannot be used as a literal", other.kind_name()),
            ));
        }
    };
    Ok(Expression::Literal(literal))
}
