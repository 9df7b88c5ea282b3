// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{Condition, CypherBuilder, ExpressionBuilder, Parameter, Pattern};

/// A literal value written directly into the statement text.
///
/// Values supplied by clients never become literals; they are always passed as [`Parameter`]s.
/// Literals are reserved for values chosen by the translator itself (type discriminators,
/// error messages, sentinel numbers).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// An entry of a map projection (`this { .name, friends: this0 }`).
#[derive(Debug, Clone, PartialEq)]
pub enum MapProjectionItem {
    /// `.name`
    Property(String),
    /// `key: expression`
    Entry(String, Expression),
    /// `.*`
    AllProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(String),
    Property(Box<Expression>, String),
    Parameter(Parameter),
    Literal(Literal),
    List(Vec<Expression>),
    Map(Vec<(String, Expression)>),
    MapProjection {
        variable: String,
        items: Vec<MapProjectionItem>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// `*`, as in `count(*)`
    Star,
    ListComprehension {
        variable: String,
        list: Box<Expression>,
        filter: Option<Box<Condition>>,
        map: Option<Box<Expression>>,
    },
    PatternComprehension {
        pattern: Box<Pattern>,
        filter: Option<Box<Condition>>,
        map: Box<Expression>,
    },
    Case {
        alternatives: Vec<(Condition, Expression)>,
        otherwise: Option<Box<Expression>>,
    },
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Slice {
        list: Box<Expression>,
        from: Option<Box<Expression>>,
        to: Option<Box<Expression>>,
    },
    Index {
        list: Box<Expression>,
        index: Box<Expression>,
    },
    /// `reduce(accumulator = initial, variable IN list | step)`
    Reduce {
        accumulator: String,
        initial: Box<Expression>,
        variable: String,
        list: Box<Expression>,
        step: Box<Expression>,
    },
    Condition(Box<Condition>),
}

impl Expression {
    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn param(name: impl Into<String>, value: serde_json::Value) -> Self {
        Expression::Parameter(Parameter::new(name, value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expression::Literal(Literal::Integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    /// Property access on this expression (`this.name`).
    pub fn property(&self, name: impl Into<String>) -> Self {
        Expression::Property(Box::new(self.clone()), name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            args,
            distinct: false,
        }
    }

    pub fn map(entries: Vec<(String, Expression)>) -> Self {
        Expression::Map(entries)
    }

    pub fn project(variable: impl Into<String>, items: Vec<MapProjectionItem>) -> Self {
        Expression::MapProjection {
            variable: variable.into(),
            items,
        }
    }

    pub fn arithmetic(op: ArithmeticOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn slice(list: Expression, from: Option<Expression>, to: Option<Expression>) -> Self {
        Expression::Slice {
            list: Box::new(list),
            from: from.map(Box::new),
            to: to.map(Box::new),
        }
    }

    pub fn index(list: Expression, index: Expression) -> Self {
        Expression::Index {
            list: Box::new(list),
            index: Box::new(index),
        }
    }

    /// `[variable IN list WHERE filter | map]`
    pub fn list_comprehension(
        variable: impl Into<String>,
        list: Expression,
        filter: Option<Condition>,
        map: Option<Expression>,
    ) -> Self {
        Expression::ListComprehension {
            variable: variable.into(),
            list: Box::new(list),
            filter: filter.map(Box::new),
            map: map.map(Box::new),
        }
    }

    /// `[pattern WHERE filter | map]`
    pub fn pattern_comprehension(
        pattern: Pattern,
        filter: Option<Condition>,
        map: Expression,
    ) -> Self {
        Expression::PatternComprehension {
            pattern: Box::new(pattern),
            filter: filter.map(Box::new),
            map: Box::new(map),
        }
    }

    pub fn reduce(
        accumulator: impl Into<String>,
        initial: Expression,
        variable: impl Into<String>,
        list: Expression,
        step: Expression,
    ) -> Self {
        Expression::Reduce {
            accumulator: accumulator.into(),
            initial: Box::new(initial),
            variable: variable.into(),
            list: Box::new(list),
            step: Box::new(step),
        }
    }

    pub fn condition(condition: Condition) -> Self {
        Expression::Condition(Box::new(condition))
    }

    /// The name of the variable, if this expression is a plain variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Compare two literal expressions. Returns `None` if either side is not a literal.
    pub fn literal_eq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Expression::Literal(Literal::Null), _) | (_, Expression::Literal(Literal::Null)) => {
                None
            }
            (Expression::Literal(l1), Expression::Literal(l2)) => Some(l1 == l2),
            _ => None,
        }
    }
}

impl From<Parameter> for Expression {
    fn from(param: Parameter) -> Self {
        Expression::Parameter(param)
    }
}

impl From<Condition> for Expression {
    fn from(condition: Condition) -> Self {
        Expression::condition(condition)
    }
}

impl ExpressionBuilder for Literal {
    fn build(&self, builder: &mut CypherBuilder) {
        match self {
            Literal::Null => builder.push_str("NULL"),
            Literal::Boolean(b) => builder.push_str(if *b { "true" } else { "false" }),
            Literal::Integer(i) => builder.push_str(i.to_string()),
            Literal::Float(f) => {
                let repr = f.to_string();
                builder.push_str(&repr);
                if f.is_finite() && !repr.contains(['.', 'e', 'E']) {
                    builder.push_str(".0");
                }
            }
            Literal::String(s) => {
                builder.push('\'');
                builder.push_str(s.replace('\\', "\\\\").replace('\'', "\\'"));
                builder.push('\'');
            }
        }
    }
}

impl ExpressionBuilder for MapProjectionItem {
    fn build(&self, builder: &mut CypherBuilder) {
        match self {
            MapProjectionItem::Property(name) => {
                builder.push('.');
                builder.push_identifier(name);
            }
            MapProjectionItem::Entry(key, expr) => {
                builder.push_identifier(key);
                builder.push_str(": ");
                expr.build(builder);
            }
            MapProjectionItem::AllProperties => builder.push_str(".*"),
        }
    }
}

impl ExpressionBuilder for Expression {
    fn build(&self, builder: &mut CypherBuilder) {
        match self {
            Expression::Variable(name) => builder.push_identifier(name),
            Expression::Property(owner, name) => {
                owner.build(builder);
                builder.push('.');
                builder.push_identifier(name);
            }
            Expression::Parameter(param) => builder.push_param(param),
            Expression::Literal(literal) => literal.build(builder),
            Expression::List(elems) => {
                builder.push('[');
                builder.push_elems(elems, ", ");
                builder.push(']');
            }
            Expression::Map(entries) => {
                builder.push('{');
                builder.push_iter(entries.iter(), ", ", |builder, (key, value)| {
                    builder.push_identifier(key);
                    builder.push_str(": ");
                    value.build(builder);
                });
                builder.push('}');
            }
            Expression::MapProjection { variable, items } => {
                builder.push_identifier(variable);
                if items.is_empty() {
                    builder.push_str(" { }");
                } else {
                    builder.push_str(" { ");
                    builder.push_elems(items, ", ");
                    builder.push_str(" }");
                }
            }
            Expression::Function {
                name,
                args,
                distinct,
            } => {
                builder.push_str(name);
                builder.push('(');
                if *distinct {
                    builder.push_str("DISTINCT ");
                }
                builder.push_elems(args, ", ");
                builder.push(')');
            }
            Expression::Star => builder.push('*'),
            Expression::ListComprehension {
                variable,
                list,
                filter,
                map,
            } => {
                builder.push('[');
                builder.push_identifier(variable);
                builder.push_str(" IN ");
                list.build(builder);
                if let Some(filter) = filter {
                    builder.push_str(" WHERE ");
                    filter.build(builder);
                }
                if let Some(map) = map {
                    builder.push_str(" | ");
                    map.build(builder);
                }
                builder.push(']');
            }
            Expression::PatternComprehension {
                pattern,
                filter,
                map,
            } => {
                builder.push('[');
                pattern.build(builder);
                if let Some(filter) = filter {
                    builder.push_str(" WHERE ");
                    filter.build(builder);
                }
                builder.push_str(" | ");
                map.build(builder);
                builder.push(']');
            }
            Expression::Case {
                alternatives,
                otherwise,
            } => {
                builder.push_str("CASE");
                for (when, then) in alternatives {
                    builder.push_str(" WHEN ");
                    when.build(builder);
                    builder.push_str(" THEN ");
                    then.build(builder);
                }
                if let Some(otherwise) = otherwise {
                    builder.push_str(" ELSE ");
                    otherwise.build(builder);
                }
                builder.push_str(" END");
            }
            Expression::Arithmetic { op, lhs, rhs } => {
                builder.push('(');
                lhs.build(builder);
                builder.push_space();
                builder.push_str(op.symbol());
                builder.push_space();
                rhs.build(builder);
                builder.push(')');
            }
            Expression::Slice { list, from, to } => {
                list.build(builder);
                builder.push('[');
                if let Some(from) = from {
                    from.build(builder);
                }
                builder.push_str("..");
                if let Some(to) = to {
                    to.build(builder);
                }
                builder.push(']');
            }
            Expression::Index { list, index } => {
                list.build(builder);
                builder.push('[');
                index.build(builder);
                builder.push(']');
            }
            Expression::Reduce {
                accumulator,
                initial,
                variable,
                list,
                step,
            } => {
                builder.push_str("reduce(");
                builder.push_identifier(accumulator);
                builder.push_str(" = ");
                initial.build(builder);
                builder.push_str(", ");
                builder.push_identifier(variable);
                builder.push_str(" IN ");
                list.build(builder);
                builder.push_str(" | ");
                step.build(builder);
                builder.push(')');
            }
            Expression::Condition(condition) => condition.build(builder),
        }
    }
}
