// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{Clause, CypherBuilder, ExpressionBuilder};

/// An ordered list of clauses. Statements nest through [`Clause::Call`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    clauses: Vec<Clause>,
}

impl Statement {
    pub fn new() -> Self {
        Self { clauses: vec![] }
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Append a clause, builder style.
    pub fn then(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Append all clauses of `other`.
    pub fn append(&mut self, other: Statement) {
        self.clauses.extend(other.clauses);
    }

    /// Append a `CALL { ... }` for each sub-statement.
    pub fn push_subqueries(&mut self, subqueries: impl IntoIterator<Item = Statement>) {
        for subquery in subqueries {
            self.clauses.push(Clause::call(subquery));
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl From<Vec<Clause>> for Statement {
    fn from(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
}

impl ExpressionBuilder for Statement {
    fn build(&self, builder: &mut CypherBuilder) {
        builder.push_iter(self.clauses.iter(), "\n", |builder, clause| {
            clause.build(builder)
        });
    }
}
