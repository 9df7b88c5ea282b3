// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::{CypherBuilder, Expression, ExpressionBuilder};

/// Direction of a relationship, seen from the left node of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Undirected,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Undirected => Direction::Undirected,
        }
    }
}

/// `(variable:Label1:Label2 {key: value})`
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expression)>,
}

impl NodePattern {
    pub fn new(variable: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            variable: Some(variable.into()),
            labels,
            properties: vec![],
        }
    }

    /// A node that is already bound to `variable` (rendered without labels).
    pub fn named(variable: impl Into<String>) -> Self {
        Self::new(variable, vec![])
    }

    pub fn anonymous(labels: Vec<String>) -> Self {
        Self {
            variable: None,
            labels,
            properties: vec![],
        }
    }

    pub fn with_properties(mut self, properties: Vec<(String, Expression)>) -> Self {
        self.properties = properties;
        self
    }

    /// The node as an expression; anonymous nodes have no expression form.
    pub fn as_expression(&self) -> Option<Expression> {
        self.variable.as_ref().map(Expression::variable)
    }
}

/// `-[variable:TYPE {key: value}]->`
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    pub rel_type: String,
    pub direction: Direction,
    pub properties: Vec<(String, Expression)>,
}

impl RelationshipPattern {
    pub fn new(rel_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            variable: None,
            rel_type: rel_type.into(),
            direction,
            properties: vec![],
        }
    }

    pub fn outgoing(rel_type: impl Into<String>) -> Self {
        Self::new(rel_type, Direction::Outgoing)
    }

    pub fn named(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }
}

/// A path made of a start node and a chain of relationship/node hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub chain: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Self {
            start,
            chain: vec![],
        }
    }

    pub fn relate(mut self, relationship: RelationshipPattern, end: NodePattern) -> Self {
        self.chain.push((relationship, end));
        self
    }
}

fn push_properties(properties: &[(String, Expression)], builder: &mut CypherBuilder) {
    if properties.is_empty() {
        return;
    }
    builder.push_str(" {");
    builder.push_iter(properties.iter(), ", ", |builder, (key, value)| {
        builder.push_identifier(key);
        builder.push_str(": ");
        value.build(builder);
    });
    builder.push('}');
}

impl ExpressionBuilder for NodePattern {
    fn build(&self, builder: &mut CypherBuilder) {
        builder.push('(');
        if let Some(variable) = &self.variable {
            builder.push_identifier(variable);
        }
        for label in &self.labels {
            builder.push(':');
            builder.push_identifier(label);
        }
        push_properties(&self.properties, builder);
        builder.push(')');
    }
}

impl ExpressionBuilder for RelationshipPattern {
    fn build(&self, builder: &mut CypherBuilder) {
        builder.push_str(match self.direction {
            Direction::Incoming => "<-[",
            _ => "-[",
        });
        if let Some(variable) = &self.variable {
            builder.push_identifier(variable);
        }
        builder.push(':');
        builder.push_identifier(&self.rel_type);
        push_properties(&self.properties, builder);
        builder.push_str(match self.direction {
            Direction::Outgoing => "]->",
            _ => "]-",
        });
    }
}

impl ExpressionBuilder for Pattern {
    fn build(&self, builder: &mut CypherBuilder) {
        self.start.build(builder);
        for (relationship, node) in &self.chain {
            relationship.build(builder);
            node.build(builder);
        }
    }
}
