// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Source of configuration values.
//!
//! Translator settings are read through [`Environment`] rather than `std::env` directly, so tests
//! (and embedders) can supply a [`MapEnvironment`] instead of mutating the process environment.

mod map;

use std::str::FromStr;

pub use map::MapEnvironment;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }
}

/// Parse the value of `key`, falling back to `default_value` when it is not set.
pub fn get_parsed<T: FromStr>(
    env: &dyn Environment,
    key: &str,
    default_value: T,
) -> Result<T, EnvError> {
    match env.get(key) {
        Some(value) => value.trim().parse().map_err(|_| EnvError::InvalidValue {
            key: key.to_string(),
            value,
            expected: std::any::type_name::<T>(),
        }),
        None => Ok(default_value),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid value for {key}: {value}. Expected a value of type {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
