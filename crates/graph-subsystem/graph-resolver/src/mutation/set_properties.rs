// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use exo_cypher::{ArithmeticOp, Expression, SetItem, functions};
use graph_model::{
    field::{Field, FieldKind, ScalarField, TimestampOperation},
    types::ScalarKind,
};
use indexmap::IndexMap;

use crate::{error::TranslationError, input::to_json, naming::ChainString};

/// The scalar field named `key`, or `None` when `key` names a non-scalar field (handled by the
/// caller). Unknown keys are an error.
fn scalar_field<'f>(
    fields: &'f [Field],
    key: &str,
    owner: &str,
) -> Result<Option<(&'f Field, &'f ScalarField)>, TranslationError> {
    let field = fields
        .iter()
        .find(|field| field.name == key)
        .ok_or_else(|| TranslationError::validation(key, format!("no such field on {owner}")))?;

    match &field.kind {
        FieldKind::Scalar(scalar) => Ok(Some((field, scalar))),
        FieldKind::Relation(_) => Ok(None),
        _ => Err(TranslationError::validation(key, "field cannot be written")),
    }
}

/// `$param`, or `point($param)` (and its list form) for spatial fields.
fn stored_value(field: &Field, scalar: &ScalarField, param: Expression) -> Expression {
    if !scalar.kind.is_spatial() {
        return param;
    }
    if field.is_list() {
        Expression::list_comprehension(
            "p",
            param,
            None,
            Some(functions::point(Expression::variable("p"))),
        )
    } else {
        functions::point(param)
    }
}

fn timestamp(kind: &ScalarKind) -> Option<Expression> {
    kind.now_function().map(functions::temporal_now)
}

/// Properties written when creating a node or relationship: generated IDs, `CREATE` timestamps,
/// the input values in input order, then defaults for omitted fields. Parameters are named
/// `<variable>_<field>`.
pub(super) fn create_set_items(
    fields: &[Field],
    variable: &str,
    input: &IndexMap<String, Val>,
    owner: &str,
) -> Result<Vec<SetItem>, TranslationError> {
    let target = |field: &Field| Expression::variable(variable).property(field.db_name());
    let chain = ChainString::new(variable);
    let mut items = vec![];

    for field in fields {
        let FieldKind::Scalar(scalar) = &field.kind else {
            continue;
        };
        if scalar.autogenerate {
            items.push(SetItem::new(target(field), functions::random_uuid()));
        } else if scalar.sets_timestamp_on(TimestampOperation::Create) {
            if let Some(now) = timestamp(&scalar.kind) {
                items.push(SetItem::new(target(field), now));
            }
        }
    }

    for (key, value) in input {
        let Some((field, scalar)) = scalar_field(fields, key, owner)? else {
            continue;
        };
        if scalar.autogenerate || !scalar.timestamps.is_empty() {
            return Err(TranslationError::validation(key, "field is generated"));
        }
        let param = chain.push(key).resolve_parameter(to_json(value, key)?);
        items.push(SetItem::new(target(field), stored_value(field, scalar, param)));
    }

    for field in fields {
        let FieldKind::Scalar(scalar) = &field.kind else {
            continue;
        };
        let Some(default) = &scalar.default else {
            continue;
        };
        if !input.contains_key(&field.name) {
            let param = chain.push(&field.name).resolve_parameter(to_json(default, &field.name)?);
            items.push(SetItem::new(target(field), stored_value(field, scalar, param)));
        }
    }

    Ok(items)
}

/// Assignment operators of an update input (`age_INCREMENT: 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOperator {
    Set,
    Increment,
    Decrement,
    Add,
    Subtract,
    Multiply,
    Divide,
    Push,
    Pop,
}

const UPDATE_SUFFIXES: [(&str, UpdateOperator); 8] = [
    ("_INCREMENT", UpdateOperator::Increment),
    ("_DECREMENT", UpdateOperator::Decrement),
    ("_ADD", UpdateOperator::Add),
    ("_SUBTRACT", UpdateOperator::Subtract),
    ("_MULTIPLY", UpdateOperator::Multiply),
    ("_DIVIDE", UpdateOperator::Divide),
    ("_PUSH", UpdateOperator::Push),
    ("_POP", UpdateOperator::Pop),
];

fn parse_update_key<'f>(fields: &'f [Field], key: &str) -> Option<(&'f Field, UpdateOperator)> {
    if let Some(field) = fields.iter().find(|field| field.name == key) {
        return Some((field, UpdateOperator::Set));
    }
    UPDATE_SUFFIXES.iter().find_map(|(suffix, operator)| {
        let name = key.strip_suffix(suffix)?;
        let field = fields.iter().find(|field| field.name == name)?;
        Some((field, *operator))
    })
}

fn operator_applies(field: &Field, kind: &ScalarKind, operator: UpdateOperator) -> bool {
    let single = !field.is_list();
    match operator {
        UpdateOperator::Set => true,
        UpdateOperator::Increment | UpdateOperator::Decrement => {
            single && matches!(kind, ScalarKind::Int | ScalarKind::BigInt)
        }
        UpdateOperator::Add
        | UpdateOperator::Subtract
        | UpdateOperator::Multiply
        | UpdateOperator::Divide => single && *kind == ScalarKind::Float,
        UpdateOperator::Push | UpdateOperator::Pop => !single,
    }
}

/// Scalar fields an update input writes, operators included.
pub(super) fn updated_fields<'f>(
    fields: &'f [Field],
    input: &IndexMap<String, Val>,
) -> Vec<&'f Field> {
    input
        .keys()
        .filter_map(|key| parse_update_key(fields, key))
        .map(|(field, _)| field)
        .filter(|field| matches!(field.kind, FieldKind::Scalar(_)))
        .collect()
}

/// Keys of an update input that name relation fields, in input order.
pub(super) fn relation_keys<'i>(
    fields: &[Field],
    input: &'i IndexMap<String, Val>,
) -> Vec<(&'i String, &'i Val)> {
    input
        .iter()
        .filter(|(key, _)| {
            fields
                .iter()
                .any(|field| field.name == **key && field.as_relation().is_some())
        })
        .collect()
}

/// Properties written by an update: the input assignments in input order, then `UPDATE`
/// timestamps. Parameters are named `<variable>_update_<key>`.
pub(super) fn update_set_items(
    fields: &[Field],
    variable: &str,
    input: &IndexMap<String, Val>,
    owner: &str,
) -> Result<Vec<SetItem>, TranslationError> {
    let property = |field: &Field| Expression::variable(variable).property(field.db_name());
    let chain = ChainString::new(variable).push("update");
    let mut items = vec![];
    let mut written: Vec<&str> = vec![];

    for (key, value) in input {
        let (field, operator) = parse_update_key(fields, key)
            .ok_or_else(|| TranslationError::validation(key, format!("no such field on {owner}")))?;
        let scalar = match &field.kind {
            FieldKind::Scalar(scalar) => scalar,
            FieldKind::Relation(_) => continue,
            _ => return Err(TranslationError::validation(key, "field cannot be written")),
        };

        if written.contains(&field.name.as_str()) {
            return Err(TranslationError::validation(
                key,
                "cannot mutate the same field multiple times in one mutation",
            ));
        }
        written.push(&field.name);

        if scalar.autogenerate || !scalar.timestamps.is_empty() {
            return Err(TranslationError::validation(key, "field is generated"));
        }
        if !operator_applies(field, &scalar.kind, operator) {
            return Err(TranslationError::validation(
                key,
                format!("operator not supported on field {}", field.name),
            ));
        }
        if operator != UpdateOperator::Set && value.is_null() {
            return Err(TranslationError::validation(key, "expected a value"));
        }

        let param = chain.push(key).resolve_parameter(to_json(value, key)?);
        let arithmetic = |op| Expression::arithmetic(op, property(field), param.clone());
        let value = match operator {
            UpdateOperator::Set => stored_value(field, scalar, param.clone()),
            UpdateOperator::Increment | UpdateOperator::Add => arithmetic(ArithmeticOp::Add),
            UpdateOperator::Decrement | UpdateOperator::Subtract => {
                arithmetic(ArithmeticOp::Subtract)
            }
            UpdateOperator::Multiply => arithmetic(ArithmeticOp::Multiply),
            UpdateOperator::Divide => arithmetic(ArithmeticOp::Divide),
            UpdateOperator::Push => Expression::arithmetic(
                ArithmeticOp::Add,
                property(field),
                stored_value(field, scalar, param.clone()),
            ),
            UpdateOperator::Pop => Expression::slice(
                property(field),
                Some(Expression::integer(0)),
                Some(Expression::arithmetic(
                    ArithmeticOp::Subtract,
                    functions::size(property(field)),
                    param.clone(),
                )),
            ),
        };
        items.push(SetItem::new(property(field), value));
    }

    for field in fields {
        let FieldKind::Scalar(scalar) = &field.kind else {
            continue;
        };
        if scalar.sets_timestamp_on(TimestampOperation::Update) {
            if let Some(now) = timestamp(&scalar.kind) {
                items.push(SetItem::new(property(field), now));
            }
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node_id, render, test_system, val};
    use exo_cypher::Clause;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn object(value: serde_json::Value) -> IndexMap<String, Val> {
        match val(value) {
            Val::Object(object) => object,
            _ => unreachable!(),
        }
    }

    fn rendered(items: Vec<SetItem>) -> (String, serde_json::Value) {
        let (text, params) = render(&Clause::Set(items));
        (text, serde_json::Value::Object(params.into_iter().collect()))
    }

    #[multiplatform_test]
    fn create_writes_generated_input_then_defaults() {
        let system = test_system();
        let movie = &system.nodes[node_id(&system, "Movie")];
        let items = create_set_items(
            &movie.fields,
            "this0",
            &object(json!({"runtime": 90, "title": "Heat"})),
            "Movie",
        )
        .unwrap();
        assert_eq!(
            rendered(items).0,
            "SET this0.id = randomUUID(), this0.createdAt = datetime(), \
             this0.runtime = $this0_runtime, this0.title = $this0_title"
        );

        let series = &system.nodes[node_id(&system, "Series")];
        let (text, params) =
            rendered(create_set_items(&series.fields, "n", &IndexMap::new(), "Series").unwrap());
        assert_eq!(text, "SET n.episodes = $n_episodes");
        assert_eq!(params, json!({"n_episodes": 1}));
    }

    #[multiplatform_test]
    fn create_wraps_points_and_rejects_generated_fields() {
        let system = test_system();
        let person = &system.nodes[node_id(&system, "Person")];
        let items = create_set_items(
            &person.fields,
            "this0",
            &object(json!({"location": {"longitude": 1.0, "latitude": 2.0}, "friends": {}})),
            "Person",
        )
        .unwrap();
        assert_eq!(
            rendered(items).0,
            "SET this0.id = randomUUID(), this0.location = point($this0_location)"
        );

        for input in [json!({"id": "x"}), json!({"friendCount": 1}), json!({"missing": 1})] {
            assert!(matches!(
                create_set_items(&person.fields, "this0", &object(input), "Person"),
                Err(TranslationError::Validation(..))
            ));
        }
    }

    #[multiplatform_test]
    fn update_operators() {
        let system = test_system();
        let person = &system.nodes[node_id(&system, "Person")];
        let items = update_set_items(
            &person.fields,
            "this",
            &object(json!({"name": "Ada", "age_INCREMENT": 1, "tags_PUSH": ["a"], "score_DECREMENT": 2})),
            "Person",
        )
        .unwrap();
        let (text, params) = rendered(items);
        assert_eq!(
            text,
            "SET this.name = $this_update_name, this.age = (this.age + $this_update_age_INCREMENT), \
             this.tags = (this.tags + $this_update_tags_PUSH), \
             this.score = (this.score - $this_update_score_DECREMENT)"
        );
        assert_eq!(
            params,
            json!({
                "this_update_name": "Ada",
                "this_update_age_INCREMENT": 1,
                "this_update_tags_PUSH": ["a"],
                "this_update_score_DECREMENT": 2
            })
        );

        let pop = update_set_items(&person.fields, "this", &object(json!({"tags_POP": 1})), "Person")
            .unwrap();
        assert_eq!(
            rendered(pop).0,
            "SET this.tags = this.tags[0..(size(this.tags) - $this_update_tags_POP)]"
        );

        let movie = &system.nodes[node_id(&system, "Movie")];
        let items = update_set_items(
            &movie.fields,
            "this",
            &object(json!({"rating_MULTIPLY": 1.5})),
            "Movie",
        )
        .unwrap();
        assert_eq!(
            rendered(items).0,
            "SET this.rating = (this.rating * $this_update_rating_MULTIPLY), this.updatedAt = datetime()"
        );
    }

    #[multiplatform_test]
    fn invalid_updates() {
        let system = test_system();
        let person = &system.nodes[node_id(&system, "Person")];
        for input in [
            json!({"age": 3, "age_INCREMENT": 1}),
            json!({"age_ADD": 1}),
            json!({"name_INCREMENT": 1}),
            json!({"tags_INCREMENT": 1}),
            json!({"age_POP": 1}),
            json!({"age_INCREMENT": null}),
            json!({"id": "x"}),
        ] {
            assert!(
                matches!(
                    update_set_items(&person.fields, "this", &object(input.clone()), "Person"),
                    Err(TranslationError::Validation(..))
                ),
                "{input} should be rejected"
            );
        }
    }
}
