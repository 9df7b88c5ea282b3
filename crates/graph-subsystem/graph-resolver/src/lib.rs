// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translation of graph API operations into Cypher statements.
//!
//! [`GraphTranslator`] takes a built [`graph_model::subsystem::GraphSubsystem`], a root
//! [`Operation`] and the resolved [`SelectionField`] of a request, and produces a
//! [`TranslatedStatement`] for the driver. Authentication failures and malformed input are
//! reported as a [`TranslationError`]; authorization is compiled into the statement, which fails
//! at execution with [`FORBIDDEN`] (or [`RELATIONSHIP_REQUIRED`] for broken relationship
//! cardinality).

mod access;
mod config;
mod context;
mod cursor;
mod error;
mod input;
mod mutation;
mod naming;
mod operation;
mod pattern;
mod predicate;
mod projection;
mod selection;

#[cfg(test)]
mod test_support;

pub use access::FORBIDDEN;
pub use config::{ConfigError, TranslatorConfig};
pub use context::AuthContext;
pub use cursor::{ConnectionWindow, PageInfo, cursor_to_offset, offset_to_cursor};
pub use error::TranslationError;
pub use mutation::RELATIONSHIP_REQUIRED;
pub use operation::{GraphTranslator, Operation, OperationKind, TranslatedStatement};
pub use selection::{SelectionField, SelectionSet};
