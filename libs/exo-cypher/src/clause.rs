// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{Condition, CypherBuilder, Expression, ExpressionBuilder, Pattern, Statement};

/// An item of a `WITH` or `RETURN` clause (`expression AS alias`).
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl ReturnItem {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            alias: None,
        }
    }

    pub fn aliased(expression: Expression, alias: impl Into<String>) -> Self {
        Self {
            expression,
            alias: Some(alias.into()),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(Expression::variable(name))
    }

    pub fn star() -> Self {
        Self::new(Expression::Star)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expression: Expression,
    pub descending: bool,
}

/// `target = value`
#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub target: Expression,
    pub value: Expression,
}

impl SetItem {
    pub fn new(target: Expression, value: Expression) -> Self {
        Self { target, value }
    }
}

/// The body shared by `WITH` and `RETURN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<Expression>,
    pub limit: Option<Expression>,
    /// Only rendered for `WITH`
    pub filter: Condition,
}

impl Projection {
    pub fn new(items: Vec<ReturnItem>) -> Self {
        Self {
            distinct: false,
            items,
            order_by: vec![],
            skip: None,
            limit: None,
            filter: Condition::True,
        }
    }

    /// `*`
    pub fn star() -> Self {
        Self::new(vec![ReturnItem::star()])
    }

    /// Plain variables, each passed through under its own name.
    pub fn variables<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| ReturnItem::variable(name.as_ref()))
                .collect(),
        )
    }

    pub fn filtered(mut self, filter: Condition) -> Self {
        self.filter = Condition::and(self.filter, filter);
        self
    }

    pub fn ordered(mut self, order_by: Vec<SortItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn paginated(mut self, skip: Option<Expression>, limit: Option<Expression>) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        patterns: Vec<Pattern>,
        filter: Condition,
    },
    Create(Vec<Pattern>),
    Merge {
        pattern: Pattern,
        on_create: Vec<SetItem>,
    },
    Set(Vec<SetItem>),
    Delete {
        detach: bool,
        expressions: Vec<Expression>,
    },
    With(Projection),
    Unwind {
        expression: Expression,
        alias: String,
    },
    /// `CALL { ... }`, with more than one branch joined by `UNION`
    Call(Vec<Statement>),
    /// `CALL procedure(args)`
    CallProcedure {
        name: String,
        args: Vec<Expression>,
    },
    Return(Projection),
    /// A statement fragment supplied by the schema author, rendered verbatim
    Raw(String),
}

impl Clause {
    pub fn matching(pattern: Pattern, filter: Condition) -> Self {
        Clause::Match {
            optional: false,
            patterns: vec![pattern],
            filter,
        }
    }

    pub fn optional_matching(pattern: Pattern, filter: Condition) -> Self {
        Clause::Match {
            optional: true,
            patterns: vec![pattern],
            filter,
        }
    }

    /// `WITH a, b, c`
    pub fn with_variables<S: AsRef<str>>(names: &[S]) -> Self {
        if names.is_empty() {
            Clause::With(Projection::star())
        } else {
            Clause::With(Projection::variables(names))
        }
    }

    /// `CALL { statement }`
    pub fn call(statement: Statement) -> Self {
        Clause::Call(vec![statement])
    }

    /// `CALL apoc.util.validate(condition, message, [0])`, which aborts the statement with
    /// `message` when `condition` holds.
    pub fn validate(condition: Condition, message: &str) -> Self {
        Clause::CallProcedure {
            name: "apoc.util.validate".to_string(),
            args: vec![
                Expression::condition(condition),
                Expression::string(message),
                Expression::List(vec![Expression::integer(0)]),
            ],
        }
    }
}

impl ExpressionBuilder for ReturnItem {
    fn build(&self, builder: &mut CypherBuilder) {
        self.expression.build(builder);
        if let Some(alias) = &self.alias {
            if self.expression.as_variable() != Some(alias.as_str()) {
                builder.push_str(" AS ");
                builder.push_identifier(alias);
            }
        }
    }
}

impl ExpressionBuilder for SortItem {
    fn build(&self, builder: &mut CypherBuilder) {
        self.expression.build(builder);
        builder.push_str(if self.descending { " DESC" } else { " ASC" });
    }
}

impl ExpressionBuilder for SetItem {
    fn build(&self, builder: &mut CypherBuilder) {
        self.target.build(builder);
        builder.push_str(" = ");
        self.value.build(builder);
    }
}

impl Projection {
    fn build_with_filter(&self, builder: &mut CypherBuilder, render_filter: bool) {
        if self.distinct {
            builder.push_str("DISTINCT ");
        }
        builder.push_elems(&self.items, ", ");
        if !self.order_by.is_empty() {
            builder.push_newline();
            builder.push_str("ORDER BY ");
            builder.push_elems(&self.order_by, ", ");
        }
        if let Some(skip) = &self.skip {
            builder.push_newline();
            builder.push_str("SKIP ");
            skip.build(builder);
        }
        if let Some(limit) = &self.limit {
            builder.push_newline();
            builder.push_str("LIMIT ");
            limit.build(builder);
        }
        if render_filter && !self.filter.is_true() {
            builder.push_newline();
            builder.push_str("WHERE ");
            self.filter.build(builder);
        }
    }
}

impl ExpressionBuilder for Clause {
    fn build(&self, builder: &mut CypherBuilder) {
        match self {
            Clause::Match {
                optional,
                patterns,
                filter,
            } => {
                if *optional {
                    builder.push_str("OPTIONAL ");
                }
                builder.push_str("MATCH ");
                builder.push_elems(patterns, ", ");
                if !filter.is_true() {
                    builder.push_newline();
                    builder.push_str("WHERE ");
                    filter.build(builder);
                }
            }
            Clause::Create(patterns) => {
                builder.push_str("CREATE ");
                builder.push_elems(patterns, ", ");
            }
            Clause::Merge { pattern, on_create } => {
                builder.push_str("MERGE ");
                pattern.build(builder);
                if !on_create.is_empty() {
                    builder.push_newline();
                    builder.push_str("ON CREATE SET ");
                    builder.push_elems(on_create, ", ");
                }
            }
            Clause::Set(items) => {
                builder.push_str("SET ");
                builder.push_elems(items, ", ");
            }
            Clause::Delete {
                detach,
                expressions,
            } => {
                if *detach {
                    builder.push_str("DETACH ");
                }
                builder.push_str("DELETE ");
                builder.push_elems(expressions, ", ");
            }
            Clause::With(projection) => {
                builder.push_str("WITH ");
                projection.build_with_filter(builder, true);
            }
            Clause::Unwind { expression, alias } => {
                builder.push_str("UNWIND ");
                expression.build(builder);
                builder.push_str(" AS ");
                builder.push_identifier(alias);
            }
            Clause::Call(branches) => {
                builder.push_str("CALL {");
                builder.push_newline();
                builder.push_iter(branches.iter(), "\nUNION\n", |builder, branch| {
                    branch.build(builder)
                });
                builder.push_newline();
                builder.push('}');
            }
            Clause::CallProcedure { name, args } => {
                builder.push_str("CALL ");
                builder.push_str(name);
                builder.push('(');
                builder.push_elems(args, ", ");
                builder.push(')');
            }
            Clause::Return(projection) => {
                builder.push_str("RETURN ");
                projection.build_with_filter(builder, false);
            }
            Clause::Raw(text) => builder.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    use super::*;
    use crate::{NodePattern, functions};

    #[multiplatform_test]
    fn with_clause() {
        let clause = Clause::With(
            Projection::new(vec![
                ReturnItem::variable("this"),
                ReturnItem::aliased(functions::count_star(), "c"),
                ReturnItem::aliased(Expression::variable("x"), "x"),
            ])
            .ordered(vec![SortItem {
                expression: Expression::variable("this").property("name"),
                descending: true,
            }])
            .paginated(None, Some(Expression::param("param0", json!(10))))
            .filtered(Condition::IsNotNull(Expression::variable("this"))),
        );

        assert_binding!(
            clause.to_cypher(),
            "WITH this, count(*) AS c, x\nORDER BY this.name DESC\nLIMIT $param0\nWHERE this IS NOT NULL",
            "param0" => json!(10)
        );
    }

    #[multiplatform_test]
    fn union_call() {
        let branch = |label: &str| {
            Statement::new()
                .then(Clause::with_variables(&["this"]))
                .then(Clause::matching(
                    Pattern::node(NodePattern::new("this0", vec![label.to_string()])),
                    Condition::True,
                ))
                .then(Clause::Return(Projection::variables(&["this0"])))
        };

        let clause = Clause::Call(vec![branch("Movie"), branch("Series")]);

        assert_binding!(
            clause.to_cypher(),
            "CALL {\nWITH this\nMATCH (this0:Movie)\nRETURN this0\nUNION\nWITH this\nMATCH (this0:Series)\nRETURN this0\n}"
        );
    }

    #[multiplatform_test]
    fn validate_procedure() {
        let clause = Clause::validate(
            !Condition::Eq(Expression::param("isAuthenticated", json!(true)), Expression::boolean(true)),
            "@neo4j/graphql/FORBIDDEN",
        );

        assert_binding!(
            clause.to_cypher(),
            "CALL apoc.util.validate($isAuthenticated <> true, '@neo4j/graphql/FORBIDDEN', [0])",
            "isAuthenticated" => json!(true)
        );
    }
}
