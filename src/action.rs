use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use parse_display::Display;
use serde_json::{Map, Number, Value};

use crate::{Error, Result};


/// A unique action type identity.
///
/// Two symbols are equal only if one is a clone of the other, even if their descriptions match.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(description: &str) -> Self {
        Self(Rc::from(description))
    }
    pub fn description(&self) -> &str {
        &self.0
    }
}
impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Symbol {}
impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).cast::<u8>().hash(state)
    }
}
impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}
impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The `type` of an action.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum ActionType {
    #[display("{0}")]
    Str(String),
    #[display("{0}")]
    Num(Number),
    #[display("{0}")]
    Symbol(Symbol),
}

impl ActionType {
    /// Accepts non-empty strings and numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(ActionType::Str(s.clone())),
            Value::Number(n) => Some(ActionType::Num(n.clone())),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActionType::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn to_value(&self) -> Value {
        match self {
            ActionType::Str(s) => Value::String(s.clone()),
            ActionType::Num(n) => Value::Number(n.clone()),
            ActionType::Symbol(s) => Value::String(s.to_string()),
        }
    }
}
impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        ActionType::Str(value.to_string())
    }
}
impl From<String> for ActionType {
    fn from(value: String) -> Self {
        ActionType::Str(value)
    }
}
impl From<i64> for ActionType {
    fn from(value: i64) -> Self {
        ActionType::Num(value.into())
    }
}
impl From<u64> for ActionType {
    fn from(value: u64) -> Self {
        ActionType::Num(value.into())
    }
}
impl From<Symbol> for ActionType {
    fn from(value: Symbol) -> Self {
        ActionType::Symbol(value)
    }
}
impl PartialEq<str> for ActionType {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}
impl PartialEq<&str> for ActionType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// A dispatched action: a required type plus arbitrary fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    ty: ActionType,
    fields: Map<String, Value>,
}

impl Action {
    pub fn new(ty: impl Into<ActionType>) -> Self {
        Self {
            ty: ty.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field, builder style.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }
    pub fn ty(&self) -> &ActionType {
        &self.ty
    }
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Reads an integer field, falling back to `default` when it is absent or not an integer.
    pub fn i64_or(&self, name: &str, default: i64) -> i64 {
        self.field(name).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Renders the action as a JSON object with a `type` field.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("type".to_string(), self.ty.to_value());
        Value::Object(map)
    }

    pub(crate) fn from_value(value: Value, mid: &str) -> Result<Self> {
        let mut map = match value {
            Value::Null => {
                return Err(Error::EmptyAction {
                    mid: mid.to_string(),
                })
            }
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidActionType {
                    mid: mid.to_string(),
                    found: other.to_string(),
                })
            }
        };
        let found = map.remove("type").unwrap_or(Value::Null);
        let Some(ty) = ActionType::from_value(&found) else {
            return Err(Error::InvalidActionType {
                mid: mid.to_string(),
                found: found.to_string(),
            });
        };
        Ok(Self { ty, fields: map })
    }

    /// Merges fields returned by a before hook into this action.
    ///
    /// A `type` entry replaces the action type; one that is not a valid type removes it.
    pub(crate) fn merge(&mut self, patch: Map<String, Value>, mid: &str) -> Result<()> {
        for (key, value) in patch {
            if key == "type" {
                match ActionType::from_value(&value) {
                    Some(ty) => self.ty = ty,
                    None => {
                        return Err(Error::HookRemovedType {
                            mid: mid.to_string(),
                        })
                    }
                }
            } else {
                self.fields.insert(key, value);
            }
        }
        Ok(())
    }
}
