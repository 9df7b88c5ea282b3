// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! The translator is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the values of
//! the `EXO_LOG` environment variable which follows the same conventions as `RUST_LOG`. This will
//! provide console logging.

use thiserror::Error;

use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*, util::TryInitError};

const EXO_LOG: &str = "EXO_LOG";

/// Initialize the tracing subscriber.
///
/// Creates a compact `tracing_subscriber::fmt` layer filtered by `EXO_LOG` (`WARN` when unset).
pub fn init() -> Result<(), LoggingError> {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(EXO_LOG)
        .from_env_lossy()
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install the tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}
