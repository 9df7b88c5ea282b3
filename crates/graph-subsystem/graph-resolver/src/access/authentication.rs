// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;

use common::value::Val;
use graph_model::{
    access::{AuthenticationAnnotation, AuthenticationOperation},
    entity::Node,
    field::Field,
};
use regex::Regex;

use crate::{
    context::QueryContext,
    error::TranslationError,
    input::expect_object,
    predicate::operator::{self, Operator},
};

/// Fail with [`TranslationError::AuthenticationRequired`] unless the caller satisfies every
/// authentication annotation (schema, node, fields) that covers `operation`.
pub(crate) fn check_authentication(
    ctx: &QueryContext<'_>,
    node: Option<&Node>,
    fields: &[&Field],
    operation: AuthenticationOperation,
) -> Result<(), TranslationError> {
    let annotations = ctx
        .system
        .authentication
        .iter()
        .chain(node.and_then(|node| node.authentication.as_ref()))
        .chain(fields.iter().filter_map(|field| field.authentication.as_ref()))
        .filter(|annotation| annotation.applies_to(operation));

    let mut claims = None;
    for annotation in annotations {
        if !ctx.auth.is_authenticated {
            return Err(TranslationError::AuthenticationRequired);
        }
        if let Some(jwt) = &annotation.jwt {
            let claims = claims.get_or_insert_with(|| ctx.auth.jwt());
            if !claims_satisfy(jwt, claims)? {
                tracing::debug!("Claims do not satisfy {:?}", annotation_summary(annotation));
                return Err(TranslationError::AuthenticationRequired);
            }
        }
    }
    Ok(())
}

fn annotation_summary(annotation: &AuthenticationAnnotation) -> String {
    annotation
        .jwt
        .as_ref()
        .map(|jwt| jwt.to_string())
        .unwrap_or_default()
}

/// Evaluate a `jwt` where against the caller's claims.
fn claims_satisfy(where_: &Val, claims: &Val) -> Result<bool, TranslationError> {
    for (key, expected) in expect_object(where_, "jwt")? {
        let satisfied = match key.as_str() {
            "AND" => {
                let mut all = true;
                for element in expected.as_one_or_many() {
                    all &= claims_satisfy(element, claims)?;
                }
                all
            }
            "OR" => {
                let elements = expected.as_one_or_many();
                let mut any = elements.is_empty();
                for element in elements {
                    any |= claims_satisfy(element, claims)?;
                }
                any
            }
            "NOT" => !claims_satisfy(expected, claims)?,
            _ => {
                let (claim, operator) = operator::parse_free_key(key);
                let actual = claims.get(claim).unwrap_or(&Val::Null);
                compare(operator, actual, expected, key)?
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare(
    operator: Operator,
    actual: &Val,
    expected: &Val,
    key: &str,
) -> Result<bool, TranslationError> {
    let strings = || actual.as_str().zip(expected.as_str());

    let result = match operator {
        Operator::Eq => equal(actual, expected),
        Operator::Not => !equal(actual, expected),
        Operator::In | Operator::NotIn => {
            let candidates = expected
                .as_list()
                .ok_or_else(|| TranslationError::validation(key, "expected a list"))?;
            let found = candidates.iter().any(|candidate| equal(actual, candidate));
            found == (operator == Operator::In)
        }
        Operator::Includes | Operator::NotIncludes => {
            let found = actual
                .as_list()
                .is_some_and(|elements| elements.iter().any(|element| equal(element, expected)));
            found == (operator == Operator::Includes)
        }
        Operator::Lt => ordering(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => ordering(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Contains => strings().is_some_and(|(a, e)| a.contains(e)),
        Operator::NotContains => !strings().is_some_and(|(a, e)| a.contains(e)),
        Operator::StartsWith => strings().is_some_and(|(a, e)| a.starts_with(e)),
        Operator::NotStartsWith => !strings().is_some_and(|(a, e)| a.starts_with(e)),
        Operator::EndsWith => strings().is_some_and(|(a, e)| a.ends_with(e)),
        Operator::NotEndsWith => !strings().is_some_and(|(a, e)| a.ends_with(e)),
        Operator::Matches => {
            let pattern = expected
                .as_str()
                .ok_or_else(|| TranslationError::validation(key, "expected a string"))?;
            let regex = Regex::new(pattern)
                .map_err(|e| TranslationError::validation(key, e.to_string()))?;
            actual.as_str().is_some_and(|actual| regex.is_match(actual))
        }
        Operator::Distance
        | Operator::Some
        | Operator::All
        | Operator::None
        | Operator::Single => {
            return Err(TranslationError::validation(
                key,
                "operator not supported on claims",
            ));
        }
    };
    Ok(result)
}

/// Numbers compare by value regardless of representation; strings and enums by text.
fn equal(lhs: &Val, rhs: &Val) -> bool {
    match (lhs, rhs) {
        (Val::Number(l), Val::Number(r)) => l.partial_cmp(r) == Some(Ordering::Equal),
        _ => match (lhs.as_str(), rhs.as_str()) {
            (Some(l), Some(r)) => l == r,
            _ => lhs == rhs,
        },
    }
}

fn ordering(lhs: &Val, rhs: &Val) -> Option<Ordering> {
    match (lhs, rhs) {
        (Val::Number(l), Val::Number(r)) => l.partial_cmp(r),
        _ => lhs.as_str().zip(rhs.as_str()).map(|(l, r)| l.cmp(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        test_support::{node_id, user, val, with_context},
    };
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn satisfied(where_: serde_json::Value, claims: serde_json::Value) -> bool {
        claims_satisfy(&val(where_), &val(claims)).unwrap()
    }

    #[multiplatform_test]
    fn node_annotations() {
        with_context(&AuthContext::anonymous(), |ctx| {
            let post = &ctx.system.nodes[node_id(ctx.system, "Post")];
            assert!(
                check_authentication(ctx, Some(post), &[], AuthenticationOperation::Read).is_ok()
            );
            assert!(matches!(
                check_authentication(ctx, Some(post), &[], AuthenticationOperation::Delete),
                Err(TranslationError::AuthenticationRequired)
            ));
        });

        with_context(&user("u1", &["reader"]), |ctx| {
            let post = &ctx.system.nodes[node_id(ctx.system, "Post")];
            assert!(matches!(
                check_authentication(ctx, Some(post), &[], AuthenticationOperation::Delete),
                Err(TranslationError::AuthenticationRequired)
            ));
        });

        with_context(&user("u1", &["admin"]), |ctx| {
            let post = &ctx.system.nodes[node_id(ctx.system, "Post")];
            assert!(
                check_authentication(ctx, Some(post), &[], AuthenticationOperation::Delete)
                    .is_ok()
            );
        });
    }

    #[multiplatform_test]
    fn field_annotations() {
        with_context(&AuthContext::anonymous(), |ctx| {
            let person = &ctx.system.nodes[node_id(ctx.system, "Person")];
            let name = person.field("name").unwrap();
            let email = person.field("email").unwrap();

            assert!(
                check_authentication(ctx, Some(person), &[name], AuthenticationOperation::Read)
                    .is_ok()
            );
            assert!(
                check_authentication(
                    ctx,
                    Some(person),
                    &[name, email],
                    AuthenticationOperation::Read
                )
                .is_err()
            );
        });
    }

    #[multiplatform_test]
    fn claim_operators() {
        let claims = json!({
            "sub": "u1",
            "level": 3,
            "roles": ["admin", "editor"],
            "email": "someone@example.com"
        });

        assert!(satisfied(json!({"sub": "u1"}), claims.clone()));
        assert!(satisfied(json!({"level": 3.0}), claims.clone()));
        assert!(satisfied(json!({"level_GTE": 3, "level_LT": 4}), claims.clone()));
        assert!(!satisfied(json!({"level_GT": 3}), claims.clone()));
        assert!(satisfied(json!({"roles_INCLUDES": "editor"}), claims.clone()));
        assert!(satisfied(json!({"roles_NOT_INCLUDES": "owner"}), claims.clone()));
        assert!(satisfied(json!({"sub_IN": ["u0", "u1"]}), claims.clone()));
        assert!(satisfied(json!({"email_ENDS_WITH": "@example.com"}), claims.clone()));
        assert!(satisfied(json!({"email_MATCHES": "^[a-z]+@"}), claims.clone()));
        assert!(satisfied(
            json!({"OR": [{"sub": "u2"}, {"NOT": {"level_LT": 2}}]}),
            claims.clone()
        ));
        assert!(!satisfied(json!({"missing": "x"}), claims.clone()));
        assert!(satisfied(json!({"missing": null}), claims.clone()));

        assert!(claims_satisfy(&val(json!({"sub_IN": "u1"})), &val(claims.clone())).is_err());
        assert!(claims_satisfy(&val(json!({"email_MATCHES": "("})), &val(claims)).is_err());
    }
}
