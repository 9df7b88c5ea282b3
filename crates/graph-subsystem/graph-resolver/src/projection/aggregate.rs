// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-property aggregates in aggregate selections (`peopleAggregate { age { min max } }`).
//!
//! Every value is an aggregating expression over the rows bound to the element variable, so a
//! whole aggregate selection renders as one map in a single `RETURN`.

use exo_cypher::{Condition, Expression, functions};
use graph_model::{field::Field, types::ScalarKind};

use crate::{error::TranslationError, selection::SelectionField};

/// The selected properties of `fields` and their selections, in selection order. `__typename`
/// is skipped.
pub(crate) fn aggregated_fields<'f, 's>(
    fields: &'f [Field],
    selected: impl IntoIterator<Item = &'s SelectionField>,
) -> Result<Vec<(&'f Field, &'s SelectionField)>, TranslationError> {
    selected
        .into_iter()
        .filter(|part| part.name != "__typename")
        .map(|part| {
            fields
                .iter()
                .find(|field| field.name == part.name)
                .map(|field| (field, part))
                .ok_or_else(|| TranslationError::validation(&part.name, "no such field"))
        })
        .collect()
}

/// `{name: {shortest: ..., longest: ...}, age: {min: ..., max: ...}}` for the properties of the
/// element bound to `variable`.
pub(crate) fn aggregated_properties(
    variable: &str,
    type_name: &str,
    fields: &[Field],
    selected: &[SelectionField],
) -> Result<Expression, TranslationError> {
    let mut entries = vec![];
    for (field, part) in aggregated_fields(fields, selected)? {
        let value = Expression::variable(variable).property(field.db_name());
        entries.push((part.output_name().to_string(), property_aggregate(field, value, part)?));
    }
    if let Some(part) = selected.iter().find(|part| part.name == "__typename") {
        entries.push((part.output_name().to_string(), Expression::string(type_name)));
    }
    Ok(Expression::map(entries))
}

/// `{min: min(value), max: max(value)}` and friends for one property.
pub(crate) fn property_aggregate(
    field: &Field,
    value: Expression,
    selected: &SelectionField,
) -> Result<Expression, TranslationError> {
    let kind = match field.as_scalar() {
        Some(scalar) if !field.is_list() && is_aggregatable(&scalar.kind) => &scalar.kind,
        _ => {
            return Err(TranslationError::validation(
                &field.name,
                "field cannot be aggregated",
            ));
        }
    };
    if selected.selection.is_empty() {
        return Err(TranslationError::validation(
            &field.name,
            "select at least one aggregate",
        ));
    }

    let mut entries = vec![];
    for part in &selected.selection.fields {
        let aggregate = match (part.name.as_str(), kind) {
            ("__typename", _) => Expression::string(selection_type_name(field)),
            ("shortest", ScalarKind::String) => string_extreme(value.clone(), false),
            ("longest", ScalarKind::String) => string_extreme(value.clone(), true),
            ("shortest", ScalarKind::Id) => functions::min(value.clone()),
            ("longest", ScalarKind::Id) => functions::max(value.clone()),
            ("min", kind) if !kind.is_string_like() => functions::min(value.clone()),
            ("max", kind) if !kind.is_string_like() => functions::max(value.clone()),
            ("average", kind) if kind.is_numeric() => functions::avg(value.clone()),
            ("sum", kind) if kind.is_numeric() => functions::sum(value.clone()),
            (name, _) => {
                return Err(TranslationError::validation(
                    name,
                    format!("not an aggregate of {}", field.name),
                ));
            }
        };
        entries.push((part.output_name().to_string(), aggregate));
    }
    Ok(Expression::map(entries))
}

fn is_aggregatable(kind: &ScalarKind) -> bool {
    kind.is_string_like()
        || kind.is_numeric()
        || (kind.is_temporal() && *kind != ScalarKind::Date)
}

/// `StringAggregateSelectionNonNullable`, `IntAggregateSelectionNullable`, ...
fn selection_type_name(field: &Field) -> String {
    let nullability = if field.typ.required {
        "NonNullable"
    } else {
        "Nullable"
    };
    format!("{}AggregateSelection{nullability}", field.typ.name)
}

/// The longest (or shortest) of the collected strings, the first one on ties.
fn string_extreme(value: Expression, longest: bool) -> Expression {
    let values = functions::collect(value);
    let current = Expression::variable("current");
    let candidate = Expression::variable("candidate");
    let (lhs, rhs) = (functions::size(candidate.clone()), functions::size(current.clone()));
    let better = if longest {
        Condition::Gt(lhs, rhs)
    } else {
        Condition::Lt(lhs, rhs)
    };

    Expression::reduce(
        "current",
        functions::head(values.clone()),
        "candidate",
        values,
        Expression::Case {
            alternatives: vec![(better, candidate)],
            otherwise: Some(Box::new(current)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        selection::SelectionSet,
        test_support::{render, test_system},
    };
    use multiplatform_test::multiplatform_test;

    fn selecting(name: &str, parts: &[&str]) -> SelectionField {
        SelectionField::new(name).selecting(SelectionSet::new(
            parts.iter().map(|part| SelectionField::new(*part)).collect(),
        ))
    }

    #[multiplatform_test]
    fn aggregates_per_kind() {
        let system = test_system();
        let person = system.nodes.get_by_key("Person").unwrap();
        let movie = system.nodes.get_by_key("Movie").unwrap();

        let aggregate = |field: &Field, parts: &[&str]| {
            let value = Expression::variable("this").property(field.db_name());
            property_aggregate(field, value, &selecting(&field.name, parts))
                .map(|expression| render(&expression).0)
        };

        assert_eq!(
            aggregate(person.field("age").unwrap(), &["min", "max", "average", "sum"]).unwrap(),
            "{min: min(this.age), max: max(this.age), average: avg(this.age), sum: sum(this.age)}"
        );
        assert_eq!(
            aggregate(person.field("id").unwrap(), &["shortest", "longest"]).unwrap(),
            "{shortest: min(this.id), longest: max(this.id)}"
        );
        assert_eq!(
            aggregate(person.field("name").unwrap(), &["longest", "__typename"]).unwrap(),
            "{longest: reduce(current = head(collect(this.name)), candidate IN collect(this.name) | CASE WHEN size(candidate) > size(current) THEN candidate ELSE current END), __typename: 'StringAggregateSelectionNonNullable'}"
        );
        assert_eq!(
            aggregate(movie.field("createdAt").unwrap(), &["max"]).unwrap(),
            "{max: max(this.createdAt)}"
        );

        assert!(matches!(
            aggregate(person.field("name").unwrap(), &["sum"]),
            Err(TranslationError::Validation(..))
        ));
        assert!(matches!(
            aggregate(movie.field("createdAt").unwrap(), &["average"]),
            Err(TranslationError::Validation(..))
        ));
        assert!(matches!(
            aggregate(person.field("tags").unwrap(), &["shortest"]),
            Err(TranslationError::Validation(..))
        ));
        assert!(matches!(
            aggregate(person.field("location").unwrap(), &["min"]),
            Err(TranslationError::Validation(..))
        ));
    }

    #[multiplatform_test]
    fn unknown_properties_are_rejected() {
        let system = test_system();
        let person = system.nodes.get_by_key("Person").unwrap();

        let selected = vec![SelectionField::new("__typename"), selecting("height", &["max"])];
        assert!(matches!(
            aggregated_fields(&person.fields, &selected),
            Err(TranslationError::Validation(field, _)) if field == "height"
        ));
    }
}
