// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Positional query parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{QueryError, QueryResult};

/// Bindable parameter value
///
/// Only text, 64-bit integers and doubles can be bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Double(f64),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Text(_) => "text",
            ParamValue::Integer(_) => "integer",
            ParamValue::Double(_) => "double",
        }
    }

    /// Best-effort typing of a command-line literal
    pub fn infer(literal: &str) -> Self {
        if let Ok(i) = literal.parse::<i64>() {
            ParamValue::Integer(i)
        } else if let Ok(f) = literal.parse::<f64>() {
            ParamValue::Double(f)
        } else {
            ParamValue::Text(literal.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "'{}'", s),
            ParamValue::Integer(i) => write!(f, "{}", i),
            ParamValue::Double(d) => write!(f, "{}", d),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Integer(i64::from(i))
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        ParamValue::Integer(i64::from(i))
    }
}

impl From<f64> for ParamValue {
    fn from(d: f64) -> Self {
        ParamValue::Double(d)
    }
}

/// Ordered mapping of 1-based position to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: BTreeMap<usize, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `insert`
    pub fn with(mut self, position: usize, value: impl Into<ParamValue>) -> Self {
        self.insert(position, value);
        self
    }

    /// Set the value at `position`, replacing any previous one
    pub fn insert(&mut self, position: usize, value: impl Into<ParamValue>) {
        self.values.insert(position, value.into());
    }

    /// Append at the position after the current highest one
    pub fn push(&mut self, value: impl Into<ParamValue>) {
        let next = self.values.keys().next_back().map_or(1, |last| last + 1);
        self.values.insert(next, value.into());
    }

    pub fn get(&self, position: usize) -> Option<&ParamValue> {
        self.values.get(&position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ParamValue)> {
        self.values.iter().map(|(position, value)| (*position, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Highest bound position, 0 when empty
    pub fn max_position(&self) -> usize {
        self.values.keys().next_back().copied().unwrap_or(0)
    }

    /// Positions start at 1; position 0 cannot be bound
    pub fn validate(&self) -> QueryResult<()> {
        if self.values.contains_key(&0) {
            return Err(QueryError::InvalidParameter(
                "parameter positions are 1-based, got 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl<V: Into<ParamValue>> FromIterator<V> for Params {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut params = Params::new();
        for value in iter {
            params.push(value);
        }
        params
    }
}

impl From<Vec<ParamValue>> for Params {
    fn from(values: Vec<ParamValue>) -> Self {
        values.into_iter().collect()
    }
}

/// Build [`Params`] from values bound to positions 1, 2, ...
///
/// ```ignore
/// let params = params!["alice", 42, 0.5];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $( params.push($value); )+
        params
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_push_order() {
        let params = crate::params!["alice", 42, 1.5];
        assert_eq!(params.len(), 3);
        assert_eq!(params.get(1), Some(&ParamValue::Text("alice".into())));
        assert_eq!(params.get(2), Some(&ParamValue::Integer(42)));
        assert_eq!(params.get(3), Some(&ParamValue::Double(1.5)));
        assert_eq!(params.max_position(), 3);
    }

    #[test]
    fn test_explicit_positions_are_ordered() {
        let params = Params::new().with(3, "c").with(1, "a");
        let positions: Vec<usize> = params.iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![1, 3]);
    }

    #[test]
    fn test_position_zero_is_invalid() {
        let params = Params::new().with(0, 1);
        assert!(matches!(params.validate(), Err(QueryError::InvalidParameter(_))));
        assert!(Params::new().with(1, 1).validate().is_ok());
    }

    #[test]
    fn test_infer_literal() {
        assert_eq!(ParamValue::infer("12"), ParamValue::Integer(12));
        assert_eq!(ParamValue::infer("1.25"), ParamValue::Double(1.25));
        assert_eq!(ParamValue::infer("bob"), ParamValue::Text("bob".into()));
    }
}
