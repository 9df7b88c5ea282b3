// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A small AST for Cypher statements along with its renderer.
//!
//! Translators build a [`Statement`] out of [`Clause`]s, which in turn hold [`Pattern`]s,
//! [`Expression`]s and [`Condition`]s. Rendering goes through [`ExpressionBuilder`], which writes
//! the text into a [`CypherBuilder`] and collects the [`Parameter`]s referenced along the way, so
//! the parameter map always matches the statement exactly.
//!
//! Like the SQL predicates in `exo-sql`, [`Condition::and`], [`Condition::or`] and `!` simplify
//! as they combine, so callers can fold conditions starting from [`Condition::True`] (or
//! [`Condition::False`]) without producing `true AND ...` noise.

#[macro_use]
mod test_util;

mod clause;
mod condition;
mod cypher_builder;
mod expression;
mod expression_builder;
pub mod functions;
mod params;
mod pattern;
mod statement;

pub use clause::{Clause, Projection, ReturnItem, SetItem, SortItem};
pub use condition::{Condition, Quantifier};
pub use cypher_builder::CypherBuilder;
pub use expression::{ArithmeticOp, Expression, Literal, MapProjectionItem};
pub use expression_builder::ExpressionBuilder;
pub use params::{Parameter, Params};
pub use pattern::{Direction, NodePattern, Pattern, RelationshipPattern};
pub use statement::Statement;
