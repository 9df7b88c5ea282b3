// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Parameter values keyed by name, in the order the statement first references them.
pub type Params = IndexMap<String, serde_json::Value>;

/// A named parameter together with the value it is bound to.
///
/// Carrying the value alongside the name lets the renderer collect exactly the parameters that
/// the final statement references; fragments that get discarded during translation never leak
/// values into the parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: serde_json::Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
