// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use indexmap::IndexMap;
use serde::de::Error;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ValNumber {
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ValNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValNumber::F32(n) => Some(*n as f64),
            ValNumber::F64(n) => Some(*n),
            ValNumber::I32(n) => Some(*n as f64),
            ValNumber::I64(n) => Some(*n as f64),
            ValNumber::U64(n) => Some(*n as f64),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ValNumber::I32(n) => Some(*n as i64),
            ValNumber::I64(n) => Some(*n),
            ValNumber::U64(_) => None,
            ValNumber::F32(_) => None,
            ValNumber::F64(_) => None,
        }
    }
}

impl Display for ValNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValNumber::I32(n) => write!(f, "{n}"),
            ValNumber::I64(n) => write!(f, "{n}"),
            ValNumber::U64(n) => write!(f, "{n}"),
            ValNumber::F32(n) => write!(f, "{n}"),
            ValNumber::F64(n) => write!(f, "{n}"),
        }
    }
}

impl TryFrom<ValNumber> for serde_json::Number {
    type Error = ();

    fn try_from(value: ValNumber) -> Result<Self, Self::Error> {
        match value {
            ValNumber::I32(n) => Ok(serde_json::Number::from(n)),
            ValNumber::I64(n) => Ok(serde_json::Number::from(n)),
            ValNumber::U64(n) => Ok(serde_json::Number::from(n)),
            ValNumber::F32(n) => serde_json::Number::from_f64(n as f64).ok_or(()),
            ValNumber::F64(n) => serde_json::Number::from_f64(n).ok_or(()),
        }
    }
}

impl TryFrom<serde_json::Number> for ValNumber {
    type Error = ();

    fn try_from(value: serde_json::Number) -> Result<Self, Self::Error> {
        if let Some(n) = value.as_i64() {
            Ok(ValNumber::I64(n))
        } else if let Some(n) = value.as_u64() {
            Ok(ValNumber::U64(n))
        } else if let Some(n) = value.as_f64() {
            Ok(ValNumber::F64(n))
        } else {
            Err(())
        }
    }
}

impl From<i32> for ValNumber {
    fn from(value: i32) -> Self {
        ValNumber::I32(value)
    }
}

impl From<i64> for ValNumber {
    fn from(value: i64) -> Self {
        ValNumber::I64(value)
    }
}

impl From<u64> for ValNumber {
    fn from(value: u64) -> Self {
        ValNumber::U64(value)
    }
}

impl From<f32> for ValNumber {
    fn from(value: f32) -> Self {
        ValNumber::F32(value)
    }
}

impl From<f64> for ValNumber {
    fn from(value: f64) -> Self {
        ValNumber::F64(value)
    }
}

/// Partial ordering for `serde_json::Number` to allow us to compare numbers of different types.
impl PartialOrd for ValNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (ValNumber::I32(left), ValNumber::I32(right)) => left.partial_cmp(right),
            (ValNumber::I32(left), ValNumber::I64(right)) => left.partial_cmp(&(*right as i32)),
            (ValNumber::I32(left), ValNumber::U64(right)) => left.partial_cmp(&(*right as i32)),
            (ValNumber::I32(left), ValNumber::F32(right)) => (*left as f32).partial_cmp(right),
            (ValNumber::I32(left), ValNumber::F64(right)) => (*left as f64).partial_cmp(right),

            (ValNumber::I64(left), ValNumber::I32(right)) => left.partial_cmp(&(*right as i64)),
            (ValNumber::I64(left), ValNumber::I64(right)) => left.partial_cmp(right),
            (ValNumber::I64(left), ValNumber::U64(right)) => left.partial_cmp(&(*right as i64)),
            (ValNumber::I64(left), ValNumber::F32(right)) => (*left as f32).partial_cmp(right),
            (ValNumber::I64(left), ValNumber::F64(right)) => (*left as f64).partial_cmp(right),

            (ValNumber::U64(left), ValNumber::I32(right)) => left.partial_cmp(&(*right as u64)),
            (ValNumber::U64(left), ValNumber::I64(right)) => left.partial_cmp(&(*right as u64)),
            (ValNumber::U64(left), ValNumber::U64(right)) => left.partial_cmp(right),
            (ValNumber::U64(left), ValNumber::F32(right)) => (*left as f32).partial_cmp(right),
            (ValNumber::U64(left), ValNumber::F64(right)) => (*left as f64).partial_cmp(right),

            (ValNumber::F32(left), ValNumber::I32(right)) => left.partial_cmp(&(*right as f32)),
            (ValNumber::F32(left), ValNumber::I64(right)) => left.partial_cmp(&(*right as f32)),
            (ValNumber::F32(left), ValNumber::U64(right)) => left.partial_cmp(&(*right as f32)),
            (ValNumber::F32(left), ValNumber::F32(right)) => left.partial_cmp(right),
            (ValNumber::F32(left), ValNumber::F64(right)) => (*left as f64).partial_cmp(right),

            (ValNumber::F64(left), ValNumber::I32(right)) => left.partial_cmp(&(*right as f64)),
            (ValNumber::F64(left), ValNumber::I64(right)) => left.partial_cmp(&(*right as f64)),
            (ValNumber::F64(left), ValNumber::U64(right)) => left.partial_cmp(&(*right as f64)),
            (ValNumber::F64(left), ValNumber::F32(right)) => left.partial_cmp(&(*right as f64)),
            (ValNumber::F64(left), ValNumber::F64(right)) => left.partial_cmp(right),
        }
    }
}

/// An input value supplied with a request: filter trees, mutation payloads, pagination arguments
/// and authentication claims.
///
/// Objects keep their insertion order, since the order of keys in a filter or mutation input
/// determines the order of the generated conditions and clauses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Val {
    Bool(bool),
    Number(ValNumber),
    String(String),
    List(Vec<Val>),
    Object(IndexMap<String, Val>),
    Enum(String),
    Null,
}

pub const TRUE: Val = Val::Bool(true);
pub const FALSE: Val = Val::Bool(false);

impl Val {
    pub fn get(&self, key: &str) -> Option<&Val> {
        match self {
            Val::Object(o) => o.get(key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string content of a `String` or `Enum` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) | Val::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Val::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Val>> {
        match self {
            Val::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Val]> {
        match self {
            Val::List(l) => Some(l),
            _ => None,
        }
    }

    /// A single value or a list of values as a slice, for inputs that accept either.
    pub fn as_one_or_many(&self) -> &[Val] {
        match self {
            Val::List(l) => l,
            other => std::slice::from_ref(other),
        }
    }

    /// Name of the kind of value, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Val::Bool(_) => "boolean",
            Val::Number(_) => "number",
            Val::String(_) => "string",
            Val::List(_) => "list",
            Val::Object(_) => "object",
            Val::Enum(_) => "enum",
            Val::Null => "null",
        }
    }
}

impl Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Bool(b) => write!(f, "{b}"),
            Val::Number(n) => write!(f, "{n}"),
            Val::String(s) => write!(f, "\"{s}\""),
            Val::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Val::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Val::Enum(e) => write!(f, "{e}"),
            Val::Null => write!(f, "null"),
        }
    }
}

impl TryFrom<Val> for serde_json::Value {
    type Error = serde_json::Error;

    fn try_from(value: Val) -> Result<serde_json::Value, Self::Error> {
        match value {
            Val::Null => Ok(serde_json::Value::Null),
            Val::Bool(b) => Ok(serde_json::Value::Bool(b)),
            Val::Number(n) => {
                Ok(serde_json::Value::Number(n.try_into().map_err(|_| {
                    serde_json::Error::custom("Invalid number")
                })?))
            }
            Val::String(s) | Val::Enum(s) => Ok(serde_json::Value::String(s)),
            Val::List(l) => Ok(serde_json::Value::Array(
                l.into_iter()
                    .map(|v| v.try_into())
                    .collect::<Result<_, _>>()?,
            )),
            Val::Object(o) => Ok(serde_json::Value::Object(
                o.into_iter()
                    .map(|(k, v)| Ok((k, v.try_into()?)))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }
}

impl From<serde_json::Value> for Val {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Val::Null,
            serde_json::Value::Bool(b) => Val::Bool(b),
            serde_json::Value::Number(n) => match ValNumber::try_from(n) {
                Ok(n) => Val::Number(n),
                Err(()) => Val::Null,
            },
            serde_json::Value::String(s) => Val::String(s),
            serde_json::Value::Array(l) => Val::List(l.into_iter().map(|v| v.into()).collect()),
            serde_json::Value::Object(o) => Val::Object(
                o.into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect::<IndexMap<_, _>>(),
            ),
        }
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::String(value.to_string())
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<i32> for Val {
    fn from(value: i32) -> Self {
        Val::Number(ValNumber::I32(value))
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Number(ValNumber::I64(value))
    }
}
