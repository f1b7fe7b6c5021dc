//! Tool call arguments.
//!
//! Tools take flat string keyword arguments. Model-issued calls arrive as a
//! JSON object; `.cmd` statements use the literal form `name(k1=v1,k2=v2)`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Result, StepError};

/// String keyword arguments for one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArguments(BTreeMap<String, String>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a required argument, failing as a `tool_name` execution error.
    pub fn require(&self, tool_name: &str, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| StepError::tool(tool_name, format!("missing argument: {key}")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert a model-issued argument object.
    ///
    /// String values are taken as-is, other values as their JSON text. A
    /// JSON-encoded string is decoded first; an empty one means no arguments.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::String(raw) if raw.trim().is_empty() => return Ok(Self::new()),
            Value::String(raw) => {
                let parsed: Value = serde_json::from_str(raw).map_err(|e| {
                    StepError::Protocol(format!("tool arguments are not JSON: {e}"))
                })?;
                return Self::from_json(&parsed);
            }
            Value::Object(map) => map,
            other => {
                return Err(StepError::Protocol(format!(
                    "tool arguments must be an object, got {other}"
                )))
            }
        };

        Ok(Self(
            object
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect(),
        ))
    }

    /// Parse `name(k1=v1,k2=v2)`.
    ///
    /// Arguments split on `,` then on the first `=`; there is no quoting, so
    /// values cannot contain commas. Returns the tool name and its arguments,
    /// or a description of what is malformed.
    pub fn parse_call_literal(literal: &str) -> std::result::Result<(String, Self), String> {
        let literal = literal.trim();
        let (name, rest) = literal
            .split_once('(')
            .ok_or_else(|| format!("expected name(arg=value,...), got {literal:?}"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing tool name in {literal:?}"));
        }
        let body = rest
            .strip_suffix(')')
            .ok_or_else(|| format!("missing closing parenthesis in {literal:?}"))?;

        let mut args = Self::new();
        if body.trim().is_empty() {
            return Ok((name.to_string(), args));
        }
        for pair in body.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("argument {pair:?} is not key=value"))?;
            args.insert(key.trim(), value);
        }
        Ok((name.to_string(), args))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl std::fmt::Display for ToolArguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}", pairs.join(","))
    }
}
