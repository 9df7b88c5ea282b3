// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{CypherBuilder, Expression, ExpressionBuilder, Pattern};

/// List predicate functions (`all(x IN list WHERE ...)` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Single,
}

impl Quantifier {
    fn function_name(&self) -> &'static str {
        match self {
            Quantifier::All => "all",
            Quantifier::Any => "any",
            Quantifier::None => "none",
            Quantifier::Single => "single",
        }
    }
}

/// A condition is a boolean expression that can be used in a WHERE clause.
#[derive(Debug, PartialEq, Clone)]
pub enum Condition {
    True,
    False,
    Eq(Expression, Expression),
    Neq(Expression, Expression),
    Lt(Expression, Expression),
    Lte(Expression, Expression),
    Gt(Expression, Expression),
    Gte(Expression, Expression),
    In(Expression, Expression),
    IsNull(Expression),
    IsNotNull(Expression),

    // string conditions
    StartsWith(Expression, Expression),
    EndsWith(Expression, Expression),
    Contains(Expression, Expression),
    Matches(Expression, Expression),

    /// `variable:Label1:Label2`
    HasLabels(String, Vec<String>),

    /// `EXISTS { MATCH pattern WHERE filter }`
    Exists {
        pattern: Box<Pattern>,
        filter: Box<Condition>,
    },
    /// `any(variable IN list WHERE filter)` and friends
    Quantified {
        quantifier: Quantifier,
        variable: String,
        list: Box<Expression>,
        filter: Box<Condition>,
    },

    /// A boolean-valued expression (for example, a function call)
    Expression(Box<Expression>),

    // Prefer Condition::and(), which simplifies the clause
    And(Box<Condition>, Box<Condition>),
    // Prefer Condition::or(), which simplifies the clause
    Or(Box<Condition>, Box<Condition>),
    // Prefer Condition::not() (the `!` operator), which simplifies the clause
    Not(Box<Condition>),
}

impl Condition {
    /// Compare two expressions and reduce to a simpler condition if possible.
    pub fn eq(lhs: Expression, rhs: Expression) -> Condition {
        match lhs.literal_eq(&rhs) {
            Some(true) => Condition::True,
            Some(false) => Condition::False,
            None => Condition::Eq(lhs, rhs),
        }
    }

    /// Compare two expressions and reduce to a simpler condition if possible.
    pub fn neq(lhs: Expression, rhs: Expression) -> Condition {
        !Self::eq(lhs, rhs)
    }

    /// Logical and of two conditions, reducing to a simpler condition if possible.
    pub fn and(lhs: Condition, rhs: Condition) -> Condition {
        match (lhs, rhs) {
            (Condition::False, _) | (_, Condition::False) => Condition::False,
            (Condition::True, rhs) => rhs,
            (lhs, Condition::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Condition::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two conditions, reducing to a simpler condition if possible.
    pub fn or(lhs: Condition, rhs: Condition) -> Condition {
        match (lhs, rhs) {
            (Condition::True, _) | (_, Condition::True) => Condition::True,
            (Condition::False, rhs) => rhs,
            (lhs, Condition::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Condition::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Conjunction of all conditions. An empty iterator yields [`Condition::True`].
    pub fn conjunction(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        conditions.into_iter().fold(Condition::True, Condition::and)
    }

    /// Disjunction of all conditions. An empty iterator yields [`Condition::False`].
    pub fn disjunction(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        conditions.into_iter().fold(Condition::False, Condition::or)
    }

    pub fn exists(pattern: Pattern, filter: Condition) -> Condition {
        Condition::Exists {
            pattern: Box::new(pattern),
            filter: Box::new(filter),
        }
    }

    pub fn quantified(
        quantifier: Quantifier,
        variable: impl Into<String>,
        list: Expression,
        filter: Condition,
    ) -> Condition {
        Condition::Quantified {
            quantifier,
            variable: variable.into(),
            list: Box::new(list),
            filter: Box::new(filter),
        }
    }

    pub fn expression(expr: Expression) -> Condition {
        Condition::Expression(Box::new(expr))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Condition::True)
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Condition {
        if b { Condition::True } else { Condition::False }
    }
}

impl std::ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Self::Output {
        match self {
            // Reduced to a simpler form when possible, else fall back to Condition::Not
            Condition::True => Condition::False,
            Condition::False => Condition::True,
            Condition::Eq(lhs, rhs) => Condition::Neq(lhs, rhs),
            Condition::Neq(lhs, rhs) => Condition::Eq(lhs, rhs),
            Condition::Lt(lhs, rhs) => Condition::Gte(lhs, rhs),
            Condition::Lte(lhs, rhs) => Condition::Gt(lhs, rhs),
            Condition::Gt(lhs, rhs) => Condition::Lte(lhs, rhs),
            Condition::Gte(lhs, rhs) => Condition::Lt(lhs, rhs),
            Condition::IsNull(expr) => Condition::IsNotNull(expr),
            Condition::IsNotNull(expr) => Condition::IsNull(expr),
            Condition::Not(inner) => *inner,
            condition => Condition::Not(Box::new(condition)),
        }
    }
}

impl ExpressionBuilder for Condition {
    /// Build a condition into a Cypher string.
    fn build(&self, builder: &mut CypherBuilder) {
        match self {
            Condition::True => builder.push_str("true"),
            Condition::False => builder.push_str("false"),
            Condition::Eq(lhs, rhs) => relational_combine(lhs, rhs, "=", builder),
            Condition::Neq(lhs, rhs) => relational_combine(lhs, rhs, "<>", builder),
            Condition::Lt(lhs, rhs) => relational_combine(lhs, rhs, "<", builder),
            Condition::Lte(lhs, rhs) => relational_combine(lhs, rhs, "<=", builder),
            Condition::Gt(lhs, rhs) => relational_combine(lhs, rhs, ">", builder),
            Condition::Gte(lhs, rhs) => relational_combine(lhs, rhs, ">=", builder),
            Condition::In(lhs, rhs) => relational_combine(lhs, rhs, "IN", builder),
            Condition::IsNull(expr) => {
                expr.build(builder);
                builder.push_str(" IS NULL");
            }
            Condition::IsNotNull(expr) => {
                expr.build(builder);
                builder.push_str(" IS NOT NULL");
            }
            Condition::StartsWith(lhs, rhs) => relational_combine(lhs, rhs, "STARTS WITH", builder),
            Condition::EndsWith(lhs, rhs) => relational_combine(lhs, rhs, "ENDS WITH", builder),
            Condition::Contains(lhs, rhs) => relational_combine(lhs, rhs, "CONTAINS", builder),
            Condition::Matches(lhs, rhs) => relational_combine(lhs, rhs, "=~", builder),
            Condition::HasLabels(variable, labels) => {
                builder.push_identifier(variable);
                for label in labels {
                    builder.push(':');
                    builder.push_identifier(label);
                }
            }
            Condition::Exists { pattern, filter } => {
                builder.push_str("EXISTS { MATCH ");
                pattern.build(builder);
                if !filter.is_true() {
                    builder.push_str(" WHERE ");
                    filter.build(builder);
                }
                builder.push_str(" }");
            }
            Condition::Quantified {
                quantifier,
                variable,
                list,
                filter,
            } => {
                builder.push_str(quantifier.function_name());
                builder.push('(');
                builder.push_identifier(variable);
                builder.push_str(" IN ");
                list.build(builder);
                builder.push_str(" WHERE ");
                filter.build(builder);
                builder.push(')');
            }
            Condition::Expression(expr) => expr.build(builder),
            Condition::And(lhs, rhs) => logical_combine(lhs, rhs, "AND", builder),
            Condition::Or(lhs, rhs) => logical_combine(lhs, rhs, "OR", builder),
            Condition::Not(condition) => {
                builder.push_str("NOT(");
                condition.build(builder);
                builder.push(')');
            }
        }
    }
}

/// Combine two expressions with a relational operator.
fn relational_combine(
    left: &Expression,
    right: &Expression,
    op: &'static str,
    builder: &mut CypherBuilder,
) {
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
}

/// Combine two conditions with a logical binary operator.
fn logical_combine(
    left: &Condition,
    right: &Condition,
    op: &'static str,
    builder: &mut CypherBuilder,
) {
    builder.push('(');
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
    builder.push(')');
}
