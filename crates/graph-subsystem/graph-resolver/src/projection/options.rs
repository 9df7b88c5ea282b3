// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{Expression, Projection, SortItem};
use graph_model::field::{Field, FieldKind};

use crate::{context::QueryContext, error::TranslationError, input::expect_object};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SortField<'a> {
    pub field: &'a Field,
    pub descending: bool,
}

impl SortField<'_> {
    /// Parse one `{field: ASC|DESC}` entry against `fields`.
    pub fn parse<'f>(
        fields: &'f [Field],
        entry: &Val,
    ) -> Result<Vec<SortField<'f>>, TranslationError> {
        let mut sort = vec![];
        for (name, direction) in expect_object(entry, "sort")? {
            let field = fields
                .iter()
                .find(|field| field.name == *name)
                .ok_or_else(|| TranslationError::validation(name, "no such field to sort on"))?;

            let sortable = match &field.kind {
                FieldKind::Scalar(scalar) => !field.is_list() && !scalar.kind.is_spatial(),
                _ => false,
            };
            if !sortable {
                return Err(TranslationError::validation(name, "field cannot be sorted on"));
            }

            let descending = match direction.as_str() {
                Some("ASC") => false,
                Some("DESC") => true,
                _ => {
                    return Err(TranslationError::validation(
                        name,
                        "sort direction must be ASC or DESC",
                    ));
                }
            };
            sort.push(SortField { field, descending });
        }
        Ok(sort)
    }
}

/// `options: {sort, limit, offset}` of a list read.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadOptions<'a> {
    pub sort: Vec<SortField<'a>>,
    pub offset: Option<Expression>,
    pub limit: Option<Expression>,
}

impl<'a> ReadOptions<'a> {
    pub fn parse(
        ctx: &mut QueryContext<'_>,
        fields: &'a [Field],
        options: Option<&Val>,
    ) -> Result<Self, TranslationError> {
        let Some(options) = options else {
            return Ok(Self::default());
        };

        let mut parsed = Self::default();
        for (key, value) in expect_object(options, "options")? {
            match key.as_str() {
                "sort" => {
                    for entry in value.as_one_or_many() {
                        parsed.sort.extend(SortField::parse(fields, entry)?);
                    }
                }
                "limit" => parsed.limit = count_parameter(ctx, key, value)?,
                "offset" => parsed.offset = count_parameter(ctx, key, value)?,
                _ => {
                    return Err(TranslationError::validation(
                        key,
                        "expected sort, limit or offset",
                    ));
                }
            }
        }
        Ok(parsed)
    }

    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.offset.is_none() && self.limit.is_none()
    }

    /// Names of the sort fields, which must be present in a projection sorted after the fact.
    pub fn sort_field_names(&self) -> Vec<&'a str> {
        self.sort.iter().map(|sort| sort.field.name.as_str()).collect()
    }

    /// Apply to a `WITH` or `RETURN` over `variable`. Before projection the variable is a node and
    /// sort keys are database properties; after it, a map keyed by field name.
    pub fn apply(&self, projection: Projection, variable: &str, projected: bool) -> Projection {
        let order_by = self
            .sort
            .iter()
            .map(|sort| {
                let key = if projected {
                    sort.field.name.as_str()
                } else {
                    sort.field.db_name()
                };
                SortItem {
                    expression: Expression::variable(variable).property(key),
                    descending: sort.descending,
                }
            })
            .collect();

        projection
            .ordered(order_by)
            .paginated(self.offset.clone(), self.limit.clone())
    }
}

fn count_parameter(
    ctx: &mut QueryContext<'_>,
    key: &str,
    value: &Val,
) -> Result<Option<Expression>, TranslationError> {
    if value.is_null() {
        return Ok(None);
    }
    match value.as_i64() {
        Some(count) if count >= 0 => Ok(Some(ctx.next_param(serde_json::json!(count)))),
        _ => Err(TranslationError::validation(
            key,
            "expected a non-negative integer",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AuthContext,
        test_support::{node_id, render, val, with_context},
    };
    use exo_cypher::Clause;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn apply(options: serde_json::Value, projected: bool) -> Result<String, TranslationError> {
        with_context(&AuthContext::anonymous(), |ctx| {
            let system = ctx.system;
            let person = &system.nodes[node_id(system, "Person")];
            let options = ReadOptions::parse(ctx, &person.fields, Some(&val(options)))?;
            let clause = Clause::With(options.apply(Projection::star(), "this", projected));
            Ok(render(&clause).0)
        })
    }

    #[multiplatform_test]
    fn sort_and_page() {
        assert_eq!(
            apply(
                json!({"sort": [{"name": "ASC"}, {"age": "DESC"}], "limit": 10, "offset": 5}),
                false
            )
            .unwrap(),
            "WITH *\nORDER BY this.name ASC, this.age DESC\nSKIP $param1\nLIMIT $param0"
        );
        assert_eq!(
            apply(json!({"sort": {"email": "DESC"}}), false).unwrap(),
            "WITH *\nORDER BY this.emailAddress DESC"
        );
        assert_eq!(
            apply(json!({"sort": {"email": "DESC"}}), true).unwrap(),
            "WITH *\nORDER BY this.email DESC"
        );
    }

    #[multiplatform_test]
    fn invalid_options() {
        for options in [
            json!({"sort": [{"friends": "ASC"}]}),
            json!({"sort": [{"location": "ASC"}]}),
            json!({"sort": [{"name": "UP"}]}),
            json!({"sort": [{"missing": "ASC"}]}),
            json!({"limit": -1}),
            json!({"offset": "3"}),
            json!({"page": 2}),
        ] {
            assert!(
                matches!(apply(options.clone(), false), Err(TranslationError::Validation(..))),
                "{options} should be rejected"
            );
        }
    }
}
