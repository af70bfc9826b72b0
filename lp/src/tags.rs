//! Tags - ordered key/value records that make up a log entry
//!
//! A record is a [`Tags`] sequence whose first three entries are always
//! `time`, `level` and `message`, followed by whatever the logger and the
//! call site attached.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::level::Level;

/// Key of the record timestamp
pub const KEY_TIME: &str = "time";
/// Key of the record level
pub const KEY_LEVEL: &str = "level";
/// Key of the formatted message
pub const KEY_MESSAGE: &str = "message";
/// Key of the error type added by `Logger::extend_error`
pub const KEY_ERROR_TYPE: &str = "error_type";
/// Key of the error message added by `Logger::extend_error`
pub const KEY_ERROR_MESSAGE: &str = "error_message";

/// Number of guaranteed leading tags (time, level, message)
pub const GUARANTEED_TAGS: usize = 3;

/// Value of a single tag
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Level(Level),
    Time(DateTime<Utc>),
}

impl Value {
    /// Name of the variant, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Level(_) => "level",
            Value::Time(_) => "time",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => f.write_str(v),
            Value::Level(v) => write!(f, "{}", v),
            Value::Time(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Char(v) => serializer.serialize_char(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Level(v) => serializer.serialize_str(v.as_str()),
            Value::Time(_) => serializer.collect_str(self),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

value_from!(Bool: bool);
value_from!(Char: char);
value_from!(Int: i8, i16, i32, i64);
value_from!(UInt: u8, u16, u32, u64);
value_from!(Float: f32, f64);
value_from!(Str: String, &str);
value_from!(Level: Level);
value_from!(Time: DateTime<Utc>);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::Int(v as i64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One key/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: Value,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TagError {
    #[error("Record has {len} tags, expected '{key}' at position {index}")]
    Missing { key: &'static str, index: usize, len: usize },

    #[error("Tag '{key}' holds a {found} value, expected {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Ordered sequence of tags; keys may repeat and lookup returns the first match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags {
    inner: VecDeque<Tag>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.push_back(Tag::new(key, value));
    }

    /// Put `front` ahead of the existing tags, keeping its own order
    pub fn extend_front(&mut self, front: Tags) {
        for tag in front.inner.into_iter().rev() {
            self.inner.push_front(tag);
        }
    }

    /// Append `back` after the existing tags
    pub fn extend_back(&mut self, back: Tags) {
        self.inner.extend(back.inner);
    }

    /// Value of the first tag named `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.iter().find(|t| t.key == key).map(|t| &t.value)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.inner.iter()
    }

    /// The time, level and message tags (possibly fewer on a malformed record)
    pub fn guaranteed(&self) -> impl Iterator<Item = &Tag> {
        self.inner.iter().take(GUARANTEED_TAGS)
    }

    /// Every tag after the guaranteed ones
    pub fn extra(&self) -> impl Iterator<Item = &Tag> {
        self.inner.iter().skip(GUARANTEED_TAGS)
    }

    pub fn time(&self) -> Result<DateTime<Utc>, TagError> {
        match self.at(0, KEY_TIME)? {
            Value::Time(t) => Ok(*t),
            other => Err(wrong_type(KEY_TIME, "time", other)),
        }
    }

    pub fn level(&self) -> Result<Level, TagError> {
        match self.at(1, KEY_LEVEL)? {
            Value::Level(l) => Ok(*l),
            other => Err(wrong_type(KEY_LEVEL, "level", other)),
        }
    }

    pub fn message(&self) -> Result<&str, TagError> {
        match self.at(2, KEY_MESSAGE)? {
            Value::Str(s) => Ok(s),
            other => Err(wrong_type(KEY_MESSAGE, "string", other)),
        }
    }

    fn at(&self, index: usize, key: &'static str) -> Result<&Value, TagError> {
        self.inner.get(index).map(|t| &t.value).ok_or(TagError::Missing {
            key,
            index,
            len: self.inner.len(),
        })
    }
}

fn wrong_type(key: &'static str, expected: &'static str, found: &Value) -> TagError {
    TagError::WrongType {
        key,
        expected,
        found: found.kind(),
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::collections::vec_deque::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| Tag::new(k, v)).collect()
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for tag in &self.inner {
            map.serialize_entry(&tag.key, &tag.value)?;
        }
        map.end()
    }
}
