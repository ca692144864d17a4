use std::borrow::Borrow;

use parse_display::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
mod tests;

/// A dotted path into a state tree, such as `"counter.value"`.
///
/// Built from a dotted string or from a list of segments, which are joined with `.`.
/// The empty path refers to the whole tree.
#[derive(Clone, Debug, Display, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[display("{0}")]
pub struct StatePath(String);

impl StatePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
    pub fn from_segments<S: AsRef<str>>(segments: impl IntoIterator<Item = S>) -> Self {
        let mut s = String::new();
        for (i, segment) in segments.into_iter().enumerate() {
            if i != 0 {
                s.push('.');
            }
            s.push_str(segment.as_ref());
        }
        Self(s)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        segments(&self.0)
    }

    /// Appends a segment.
    pub fn join(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{segment}", self.0))
        }
    }

    /// Reads the value at this path, see [`get`].
    pub fn get<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        get(state, &self.0)
    }
}

impl Borrow<str> for StatePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for StatePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl From<&str> for StatePath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl From<String> for StatePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&String> for StatePath {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}
impl<S: AsRef<str>> From<Vec<S>> for StatePath {
    fn from(value: Vec<S>) -> Self {
        Self::from_segments(value)
    }
}
impl<S: AsRef<str>, const N: usize> From<[S; N]> for StatePath {
    fn from(value: [S; N]) -> Self {
        Self::from_segments(value)
    }
}
impl<S: AsRef<str>> From<&[S]> for StatePath {
    fn from(value: &[S]) -> Self {
        Self::from_segments(value)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Resolves a dotted path against a state tree.
///
/// Objects are walked by key and arrays by numeric index.
/// Returns `None` as soon as a segment cannot be followed.
pub fn get<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut value = state;
    for segment in segments(path) {
        value = child(value, segment)?;
    }
    Some(value)
}

/// Resolves a dotted path, yielding `Value::Null` for missing locations.
pub fn get_or_null(state: &Value, path: &str) -> Value {
    get(state, path).cloned().unwrap_or(Value::Null)
}

pub(crate) fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

/// Returns `path` followed by all of its ancestors, innermost first.
///
/// `"a.b.c"` yields `"a.b.c"`, `"a.b"`, `"a"`.
pub fn with_ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut next = if path.is_empty() { None } else { Some(path) };
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rfind('.').map(|i| &current[..i]);
        Some(current)
    })
}
