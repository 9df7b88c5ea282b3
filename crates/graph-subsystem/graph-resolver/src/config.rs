// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use exo_env::{EnvError, Environment};
use thiserror::Error;

const EXO_MAX_TRANSLATION_DEPTH: &str = "EXO_MAX_TRANSLATION_DEPTH";
const EXO_CYPHER_DEBUG_STATEMENTS: &str = "EXO_CYPHER_DEBUG_STATEMENTS";

const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Deepest nesting of selections, filters and mutation inputs the translator will follow
    pub max_depth: usize,
    /// Log each rendered statement and its parameters at debug level
    pub debug_statements: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            debug_statements: false,
        }
    }
}

impl TranslatorConfig {
    pub fn from_env(env: &dyn Environment) -> Result<Self, ConfigError> {
        let max_depth = match env.get(EXO_MAX_TRANSLATION_DEPTH) {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => depth,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{EXO_MAX_TRANSLATION_DEPTH} env var must be set to a positive integer"
                    )));
                }
            },
            None => DEFAULT_MAX_DEPTH,
        };

        Ok(Self {
            max_depth,
            debug_statements: env.enabled(EXO_CYPHER_DEBUG_STATEMENTS, false)?,
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_env::MapEnvironment;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn defaults() {
        let config = TranslatorConfig::from_env(&MapEnvironment::default()).unwrap();
        assert_eq!(config, TranslatorConfig::default());
    }

    #[multiplatform_test]
    fn overrides() {
        let env = MapEnvironment::from([
            (EXO_MAX_TRANSLATION_DEPTH, "4"),
            (EXO_CYPHER_DEBUG_STATEMENTS, "true"),
        ]);
        let config = TranslatorConfig::from_env(&env).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.debug_statements);
    }

    #[multiplatform_test]
    fn invalid_values() {
        for depth in ["0", "-3", "deep"] {
            let env = MapEnvironment::from([(EXO_MAX_TRANSLATION_DEPTH, depth)]);
            assert!(matches!(
                TranslatorConfig::from_env(&env),
                Err(ConfigError::Invalid(_))
            ));
        }

        let env = MapEnvironment::from([(EXO_CYPHER_DEBUG_STATEMENTS, "sometimes")]);
        assert!(matches!(
            TranslatorConfig::from_env(&env),
            Err(ConfigError::Env(EnvError::InvalidBoolean { .. }))
        ));
    }
}
