// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The graph schema: nodes, interfaces, unions, relationship properties and their fields, along
//! with the authorization and authentication annotations attached to them.

pub mod access;
pub mod builder;
pub mod entity;
pub mod error;
pub mod field;
pub mod mapped_arena;
pub mod subsystem;
pub mod types;
