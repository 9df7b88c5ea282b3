// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

/// The declared type of a field: the named type plus list/required modifiers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub name: String,
    pub is_list: bool,
    pub required: bool,
}

impl FieldType {
    /// `Name` (nullable, singular)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_list: false,
            required: false,
        }
    }

    /// `[Name!]!`
    pub fn list_of(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_list: true,
            required: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    Date,
    Time,
    LocalTime,
    DateTime,
    LocalDateTime,
    Duration,
    Point,
    CartesianPoint,
    CustomScalar(String),
    Enum(String),
}

impl ScalarKind {
    /// The built-in scalar with this name, if any.
    pub fn builtin(name: &str) -> Option<ScalarKind> {
        let kind = match name {
            "ID" => ScalarKind::Id,
            "String" => ScalarKind::String,
            "Int" => ScalarKind::Int,
            "BigInt" => ScalarKind::BigInt,
            "Float" => ScalarKind::Float,
            "Boolean" => ScalarKind::Boolean,
            "Date" => ScalarKind::Date,
            "Time" => ScalarKind::Time,
            "LocalTime" => ScalarKind::LocalTime,
            "DateTime" => ScalarKind::DateTime,
            "LocalDateTime" => ScalarKind::LocalDateTime,
            "Duration" => ScalarKind::Duration,
            "Point" => ScalarKind::Point,
            "CartesianPoint" => ScalarKind::CartesianPoint,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::BigInt | ScalarKind::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarKind::Date
                | ScalarKind::Time
                | ScalarKind::LocalTime
                | ScalarKind::DateTime
                | ScalarKind::LocalDateTime
                | ScalarKind::Duration
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, ScalarKind::Point | ScalarKind::CartesianPoint)
    }

    /// Whether `<`, `<=`, `>` and `>=` are meaningful (and whether the field may be sorted on).
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || self.is_string_like()
            || (self.is_temporal() && *self != ScalarKind::Duration)
    }

    /// The function producing the current instant for a temporal kind (`datetime()` and so on).
    pub fn now_function(&self) -> Option<&'static str> {
        match self {
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::LocalTime => Some("localtime"),
            ScalarKind::DateTime => Some("datetime"),
            ScalarKind::LocalDateTime => Some("localdatetime"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn kind_classification() {
        assert_eq!(ScalarKind::builtin("DateTime"), Some(ScalarKind::DateTime));
        assert_eq!(ScalarKind::builtin("Genre"), None);

        assert!(ScalarKind::Id.is_string_like());
        assert!(ScalarKind::BigInt.is_ordered());
        assert!(ScalarKind::Date.is_ordered());
        assert!(!ScalarKind::Duration.is_ordered());
        assert!(!ScalarKind::Point.is_ordered());
        assert!(!ScalarKind::Enum("Genre".into()).is_ordered());
        assert_eq!(ScalarKind::DateTime.now_function(), Some("datetime"));
        assert_eq!(ScalarKind::Duration.now_function(), None);
    }
}
