// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The resolved selection tree handed to the translator by the request layer.

use common::value::Val;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionField {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: IndexMap<String, Val>,
    pub selection: SelectionSet,
}

impl SelectionField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Val>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn selecting(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    /// Name of the key in the result.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The argument value, treating an explicit `null` as absent.
    pub fn get_argument(&self, name: &str) -> Option<&Val> {
        self.arguments.get(name).filter(|value| !value.is_null())
    }
}

/// Selected fields of an entity. Interface and union selections may add fields per concrete
/// type (`... on Movie { runtime }`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    pub fields: Vec<SelectionField>,
    pub by_type: IndexMap<String, Vec<SelectionField>>,
}

impl SelectionSet {
    pub fn new(fields: Vec<SelectionField>) -> Self {
        Self {
            fields,
            by_type: IndexMap::new(),
        }
    }

    pub fn on_type(mut self, type_name: impl Into<String>, fields: Vec<SelectionField>) -> Self {
        self.by_type.insert(type_name.into(), fields);
        self
    }

    /// Fields to project for the given concrete node: the common fields, then its own.
    pub fn for_node(&self, node_name: &str) -> Vec<&SelectionField> {
        self.fields
            .iter()
            .chain(self.by_type.get(node_name).into_iter().flatten())
            .collect()
    }

    pub fn selects_type(&self, node_name: &str) -> bool {
        self.by_type.contains_key(node_name)
    }

    pub fn field(&self, name: &str) -> Option<&SelectionField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.by_type.is_empty()
    }
}

impl From<Vec<SelectionField>> for SelectionSet {
    fn from(fields: Vec<SelectionField>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn per_type_fields() {
        let selection = SelectionSet::new(vec![SelectionField::new("title").aliased("name")])
            .on_type("Movie", vec![SelectionField::new("runtime")]);

        let movie: Vec<_> = selection
            .for_node("Movie")
            .iter()
            .map(|field| field.output_name())
            .collect();
        assert_eq!(movie, vec!["name", "runtime"]);
        assert_eq!(selection.for_node("Series").len(), 1);
        assert!(selection.selects_type("Movie"));
        assert!(!selection.selects_type("Series"));

        let field = SelectionField::new("friends").argument("where", Val::Null);
        assert!(field.get_argument("where").is_none());
    }
}
