// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_cypher::{
    Clause, Condition, Expression, NodePattern, Projection, ReturnItem, Statement, functions,
};
use graph_model::{entity::NodeId, subsystem::GraphSubsystem};

use crate::{
    naming::ChainString,
    pattern::{related, target_labels},
};

pub const RELATIONSHIP_REQUIRED: &str = "@neo4j/graphql/RELATIONSHIP-REQUIRED";

/// How many relationships a singular relation field admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationshipCardinality {
    /// Exactly one
    Required,
    /// At most one
    Optional,
}

impl RelationshipCardinality {
    /// The condition on the relationship count `c` the statement asserts.
    fn condition(&self, count: Expression) -> Condition {
        match self {
            RelationshipCardinality::Required => Condition::Eq(count, Expression::integer(1)),
            RelationshipCardinality::Optional => Condition::Lte(count, Expression::integer(1)),
        }
    }
}

/// One subquery per singular relation of the node bound to `variable`, each failing the statement
/// when the written graph leaves the relation with the wrong number of relationships.
pub(crate) fn cardinality_validations(
    system: &GraphSubsystem,
    node_id: NodeId,
    variable: &str,
) -> Vec<Statement> {
    let node = &system.nodes[node_id];

    node.fields
        .iter()
        .filter(|field| !field.is_list())
        .filter_map(|field| field.as_relation().map(|relation| (field, relation)))
        .map(|(field, relation)| {
            let cardinality = if field.is_required() {
                RelationshipCardinality::Required
            } else {
                RelationshipCardinality::Optional
            };

            let rel_variable = ChainString::new(variable)
                .push(&field.name)
                .push(system.entity(relation.target).name())
                .push("unique");
            let rel_name = rel_variable.resolve_name();
            let count = Expression::variable("c");

            Statement::new()
                .then(Clause::with_variables(&[variable]))
                .then(Clause::matching(
                    related(
                        variable,
                        relation,
                        Some(&rel_name),
                        NodePattern::anonymous(target_labels(system, relation.target)),
                    ),
                    Condition::True,
                ))
                .then(Clause::With(Projection::new(vec![ReturnItem::aliased(
                    functions::count(Expression::variable(&rel_name)),
                    "c",
                )])))
                .then(Clause::validate(
                    !cardinality.condition(count.clone()),
                    &format!("{RELATIONSHIP_REQUIRED}{}.{} required", node.name, field.name),
                ))
                .then(Clause::Return(Projection::new(vec![ReturnItem::aliased(
                    count,
                    rel_variable.push("ignored").resolve_name(),
                )])))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node_id, render, test_system};
    use exo_cypher::Literal;
    use multiplatform_test::multiplatform_test;

    /// Whether the validation in `check` fails the statement when the relation has `count`
    /// relationships.
    fn fails_with(check: &Statement, count: i64) -> bool {
        let failure = check
            .clauses()
            .iter()
            .find_map(|clause| match clause {
                Clause::CallProcedure { name, args } if name == "apoc.util.validate" => {
                    match args.first() {
                        Some(Expression::Condition(condition)) => Some(condition.as_ref()),
                        _ => None,
                    }
                }
                _ => None,
            })
            .expect("a validation clause");

        let operand = |expression: &Expression| match expression {
            Expression::Variable(name) if name == "c" => count,
            Expression::Literal(Literal::Integer(value)) => *value,
            other => panic!("unexpected operand {other:?}"),
        };
        match failure {
            Condition::Eq(left, right) => operand(left) == operand(right),
            Condition::Neq(left, right) => operand(left) != operand(right),
            Condition::Lt(left, right) => operand(left) < operand(right),
            Condition::Lte(left, right) => operand(left) <= operand(right),
            Condition::Gt(left, right) => operand(left) > operand(right),
            Condition::Gte(left, right) => operand(left) >= operand(right),
            other => panic!("unexpected validation {other:?}"),
        }
    }

    #[multiplatform_test]
    fn required_relations_need_exactly_one_relationship() {
        let system = test_system();
        let post = cardinality_validations(&system, node_id(&system, "Post"), "this0");

        assert!(fails_with(&post[0], 0));
        assert!(!fails_with(&post[0], 1));
        assert!(fails_with(&post[0], 2));
    }

    #[multiplatform_test]
    fn optional_relations_allow_at_most_one_relationship() {
        let system = test_system();
        let person = cardinality_validations(&system, node_id(&system, "Person"), "this");

        assert!(!fails_with(&person[0], 0));
        assert!(!fails_with(&person[0], 1));
        assert!(fails_with(&person[0], 2));
    }

    #[multiplatform_test]
    fn singular_relations_are_checked() {
        let system = test_system();

        let post = cardinality_validations(&system, node_id(&system, "Post"), "this0");
        assert_eq!(post.len(), 1);
        assert_eq!(
            render(&post[0]).0,
            "WITH this0\n\
             MATCH (this0)<-[this0_author_Person_unique:HAS_POST]-(:Person)\n\
             WITH count(this0_author_Person_unique) AS c\n\
             CALL apoc.util.validate(c <> 1, '@neo4j/graphql/RELATIONSHIP-REQUIREDPost.author required', [0])\n\
             RETURN c AS this0_author_Person_unique_ignored"
        );

        // Only bestFriend is singular
        let person = cardinality_validations(&system, node_id(&system, "Person"), "this");
        assert_eq!(person.len(), 1);
        assert!(render(&person[0]).0.contains("CALL apoc.util.validate(c > 1, "));

        assert!(cardinality_validations(&system, node_id(&system, "Movie"), "this").is_empty());
    }
}
