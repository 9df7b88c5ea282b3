// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Access control woven into the generated statement.
//!
//! Authentication is checked during translation: a request that fails it never produces a
//! statement. Authorization depends on data, so it is compiled into the statement instead, either
//! as a filter (rows the caller may not see are not matched) or as a validation that aborts the
//! statement with [`FORBIDDEN`].

mod authentication;
mod authorization;

pub(crate) use authentication::check_authentication;
pub use authorization::FORBIDDEN;
pub(crate) use authorization::{filter_condition, read_authorization, validation_clauses};
