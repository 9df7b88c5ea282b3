// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Opaque connection cursors. A cursor encodes the zero-based offset of an edge in the full
//! (sorted, unsliced) edge list.

use std::ops::Range;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::value::Val;

use crate::error::TranslationError;

pub const CURSOR_PREFIX: &str = "arrayconnection:";

pub fn offset_to_cursor(offset: usize) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

pub fn cursor_to_offset(cursor: &str) -> Result<usize, TranslationError> {
    let invalid = |reason| TranslationError::InvalidCursor(cursor.to_string(), reason);

    let decoded = STANDARD.decode(cursor).map_err(|_| invalid("not base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid("not base64"))?;
    let offset = decoded
        .strip_prefix(CURSOR_PREFIX)
        .ok_or_else(|| invalid("prefix missing"))?;

    offset.parse().map_err(|_| invalid("not an integer"))
}

/// The slice of edges a connection request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionWindow {
    /// Offset of the first returned edge
    pub offset: usize,
    pub first: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl ConnectionWindow {
    pub fn from_arguments(
        after: Option<&Val>,
        first: Option<&Val>,
    ) -> Result<Self, TranslationError> {
        let offset = match after {
            None | Some(Val::Null) => 0,
            Some(Val::String(cursor)) => cursor_to_offset(cursor)?
                .checked_add(1)
                .ok_or_else(|| TranslationError::InvalidCursor(cursor.clone(), "out of range"))?,
            Some(other) => {
                return Err(TranslationError::validation(
                    "after",
                    format!("expected a cursor, found {}", other.kind_name()),
                ));
            }
        };

        let first = match first {
            None | Some(Val::Null) => None,
            Some(value) => match value.as_i64() {
                Some(first) if first >= 0 => Some(first as usize),
                Some(_) => {
                    return Err(TranslationError::validation(
                        "first",
                        "must not be negative",
                    ));
                }
                None => {
                    return Err(TranslationError::validation(
                        "first",
                        format!("expected an integer, found {}", value.kind_name()),
                    ));
                }
            },
        };

        Ok(Self { offset, first })
    }

    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.first.is_none()
    }

    /// Indexes of the returned edges out of `total`.
    pub fn slice(&self, total: usize) -> Range<usize> {
        let start = self.offset.min(total);
        let end = match self.first {
            Some(first) => start.saturating_add(first).min(total),
            None => total,
        };
        start..end
    }

    /// The page info the generated statement computes for `total` edges.
    pub fn page_info(&self, total: usize) -> PageInfo {
        let slice = self.slice(total);
        let (start_cursor, end_cursor) = if slice.is_empty() {
            (None, None)
        } else {
            (
                Some(offset_to_cursor(slice.start)),
                Some(offset_to_cursor(slice.end - 1)),
            )
        };

        PageInfo {
            has_next_page: slice.end < total,
            has_previous_page: self.offset > 0,
            start_cursor,
            end_cursor,
        }
    }
}
