// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_cypher::Expression;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Name(String),
    Index(usize),
}

/// Name of a mutation variable or parameter, derived from where it sits in the input tree.
///
/// Segments are joined with `_`, except that a list index is glued to the segment before it:
/// `this0`, `friends`, index 0, `node` resolves to `this0_friends0_node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainString {
    segments: Vec<Segment>,
}

impl ChainString {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Name(root.into())],
        }
    }

    pub fn push(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Name(name.into()));
        Self { segments }
    }

    /// Like [`ChainString::push`], but a `None` segment leaves the chain unchanged.
    pub fn push_opt(&self, name: Option<&str>) -> Self {
        match name {
            Some(name) => self.push(name),
            None => self.clone(),
        }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn resolve_name(&self) -> String {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Name(segment) => {
                    if !name.is_empty() {
                        name.push('_');
                    }
                    name.push_str(segment);
                }
                Segment::Index(index) => name.push_str(&index.to_string()),
            }
        }
        name
    }

    pub fn resolve_parameter(&self, value: serde_json::Value) -> Expression {
        Expression::param(self.resolve_name(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn resolution() {
        let base = ChainString::new("this0").push("friends");
        assert_eq!(base.index(0).push("node").resolve_name(), "this0_friends0_node");
        assert_eq!(
            base.push_opt(Some("Movie"))
                .index(2)
                .push("relationship")
                .resolve_name(),
            "this0_friends_Movie2_relationship"
        );
        assert_eq!(base.push_opt(None).index(1).resolve_name(), "this0_friends1");
        assert_eq!(
            ChainString::new("this")
                .push("update")
                .push("age_INCREMENT")
                .resolve_parameter(serde_json::json!(1)),
            Expression::param("this_update_age_INCREMENT", serde_json::json!(1))
        );
    }
}
