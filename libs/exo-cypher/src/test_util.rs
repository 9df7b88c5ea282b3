// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

//! Test assertion to check rendered statements and their parameters.

/// Assert that a `(statement, params)` pair matches the expected text and parameters.
///
/// # Usage:
/// ```no_run
/// assert_binding!(condition.to_cypher(), "this.age > $param0", "param0" => json!(30));
/// assert_binding!(expression.to_cypher(), "count(*)"); // asserts that there are no parameters
/// ```
macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr) => {{
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert!(
            actual_params.is_empty(),
            "Extra actual parameters: {:?}",
            actual_params
        );
    }};
    ($actual:expr, $expected_stmt:expr, $($name:expr => $value:expr),+ $(,)?) => {{
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        let expected_params: $crate::Params = [$(($name.to_string(), $value)),+]
            .into_iter()
            .collect();
        assert_eq!(actual_params, expected_params, "Parameter mismatch");
    }};
}
