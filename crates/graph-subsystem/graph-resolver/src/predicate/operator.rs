// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_cypher::{Condition, Expression};
use graph_model::{field::Field, types::ScalarKind};

/// The operator named by a where-key suffix (`age_GT`, `name_NOT_IN`, `friends_SOME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Eq,
    Not,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Includes,
    NotIncludes,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    Distance,
    Some,
    All,
    None,
    Single,
}

/// Longest suffixes first, so `_NOT_IN` is tried before `_IN` and `_NOT`.
const SUFFIXES: [(&str, Operator); 22] = [
    ("_NOT_STARTS_WITH", Operator::NotStartsWith),
    ("_NOT_ENDS_WITH", Operator::NotEndsWith),
    ("_NOT_CONTAINS", Operator::NotContains),
    ("_NOT_INCLUDES", Operator::NotIncludes),
    ("_STARTS_WITH", Operator::StartsWith),
    ("_ENDS_WITH", Operator::EndsWith),
    ("_CONTAINS", Operator::Contains),
    ("_INCLUDES", Operator::Includes),
    ("_DISTANCE", Operator::Distance),
    ("_MATCHES", Operator::Matches),
    ("_NOT_IN", Operator::NotIn),
    ("_SINGLE", Operator::Single),
    ("_SOME", Operator::Some),
    ("_NONE", Operator::None),
    ("_ALL", Operator::All),
    ("_NOT", Operator::Not),
    ("_LTE", Operator::Lte),
    ("_GTE", Operator::Gte),
    ("_LT", Operator::Lt),
    ("_GT", Operator::Gt),
    ("_IN", Operator::In),
    ("_EQ", Operator::Eq),
];

/// Split a where key into a field and an operator.
///
/// An exact field name wins over a suffix reading, so a field called `title_NOT` can still be
/// filtered on.
pub(crate) fn parse_key<'f>(fields: &'f [Field], key: &str) -> Option<(&'f Field, Operator)> {
    if let Some(field) = fields.iter().find(|field| field.name == key) {
        return Some((field, Operator::Eq));
    }

    SUFFIXES.iter().find_map(|(suffix, operator)| {
        key.strip_suffix(suffix)
            .and_then(|name| fields.iter().find(|field| field.name == name))
            .map(|field| (field, *operator))
    })
}

/// Split a key that is not bound to a declared field (JWT claims).
pub(crate) fn parse_free_key(key: &str) -> (&str, Operator) {
    SUFFIXES
        .iter()
        .find_map(|(suffix, operator)| {
            key.strip_suffix(suffix)
                .filter(|name| !name.is_empty())
                .map(|name| (name, *operator))
        })
        .unwrap_or((key, Operator::Eq))
}

/// Whether `operator` may be applied to a scalar field of `kind`.
pub(crate) fn is_supported(field: &Field, kind: &ScalarKind, operator: Operator) -> bool {
    use Operator::*;

    if field.is_list() {
        matches!(operator, Eq | Not | Includes | NotIncludes)
    } else if kind.is_spatial() {
        matches!(operator, Eq | Not | In | NotIn | Lt | Lte | Gt | Gte | Distance)
    } else {
        match operator {
            Eq | Not | In | NotIn => true,
            Lt | Lte | Gt | Gte => kind.is_ordered(),
            Contains | NotContains | StartsWith | NotStartsWith | EndsWith | NotEndsWith
            | Matches => kind.is_string_like(),
            _ => false,
        }
    }
}

/// `lhs <op> rhs` for the non-spatial scalar operators. `None` for the relationship quantifiers
/// and `_DISTANCE`.
pub(crate) fn compare(operator: Operator, lhs: Expression, rhs: Expression) -> Option<Condition> {
    let condition = match operator {
        Operator::Eq => Condition::Eq(lhs, rhs),
        Operator::Not => Condition::Neq(lhs, rhs),
        Operator::Lt => Condition::Lt(lhs, rhs),
        Operator::Lte => Condition::Lte(lhs, rhs),
        Operator::Gt => Condition::Gt(lhs, rhs),
        Operator::Gte => Condition::Gte(lhs, rhs),
        Operator::In => Condition::In(lhs, rhs),
        Operator::NotIn => !Condition::In(lhs, rhs),
        Operator::Includes => Condition::In(rhs, lhs),
        Operator::NotIncludes => !Condition::In(rhs, lhs),
        Operator::Contains => Condition::Contains(lhs, rhs),
        Operator::NotContains => !Condition::Contains(lhs, rhs),
        Operator::StartsWith => Condition::StartsWith(lhs, rhs),
        Operator::NotStartsWith => !Condition::StartsWith(lhs, rhs),
        Operator::EndsWith => Condition::EndsWith(lhs, rhs),
        Operator::NotEndsWith => !Condition::EndsWith(lhs, rhs),
        Operator::Matches => Condition::Matches(lhs, rhs),
        Operator::Distance
        | Operator::Some
        | Operator::All
        | Operator::None
        | Operator::Single => return None,
    };
    Some(condition)
}
