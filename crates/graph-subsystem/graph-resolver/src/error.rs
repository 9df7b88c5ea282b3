// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("{0}")]
    Generic(String),

    #[error("Invalid field '{0}': {1}")]
    Validation(String, String),

    #[error("Invalid cursor '{0}': {1}")]
    InvalidCursor(String, &'static str),

    #[error("Not authenticated")]
    AuthenticationRequired,

    #[error("Input is nested deeper than the allowed {0} levels")]
    DepthLimitExceeded(usize),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<TranslationError>),
}

impl TranslationError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TranslationError::Validation(field.into(), message.into())
    }

    pub fn with_context(self, context: String) -> TranslationError {
        TranslationError::WithContext(context, Box::new(self))
    }

    /// Whether the error is caused by the request (as opposed to the schema or the translator).
    pub fn is_client_error(&self) -> bool {
        match self {
            TranslationError::Generic(_) => false,
            TranslationError::WithContext(_, e) => e.is_client_error(),
            _ => true,
        }
    }

    pub fn user_error_message(&self) -> String {
        match self {
            TranslationError::Validation(_, _)
            | TranslationError::InvalidCursor(_, _)
            | TranslationError::DepthLimitExceeded(_) => self.to_string(),
            TranslationError::AuthenticationRequired => "Not authenticated".to_string(),
            TranslationError::WithContext(context, e) => {
                format!("{}: {}", e.user_error_message(), context)
            }
            // Internal errors may mention schema details the caller should not see
            TranslationError::Generic(_) => {
                error!("Translation failed: {:?}", self);
                "Operation failed".to_string()
            }
        }
    }
}

pub(crate) trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, TranslationError> {
    fn with_context(self, context: String) -> Result<T, TranslationError> {
        self.map_err(|e| e.with_context(context))
    }
}
