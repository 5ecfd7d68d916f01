//! Purpose: Loosely-typed property tree produced by the parsing program, plus typed field access.
//! Exports: `PropValue`, `Record`, `Indexable`, `Binary`, `FieldType`, binary-string helpers.
//! Role: The only way the builder reads the tree; every field access is one `required` call.
//! Invariants: Absence, `null` where not allowed, and type mismatch all fail as `ErrorKind::Shape`.
//! Invariants: Errors carry the dotted field path so callers can locate the offending value.
//! Invariants: A binary string is a string whose code points are all <= U+00FF, one per byte.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug)]
pub enum PropValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Bytes(Bytes),
    Arr(Vec<PropValue>),
    Obj(BTreeMap<String, PropValue>),
}

impl PropValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Num(_) => "number",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Arr(_) => "array",
            Self::Obj(_) => "object",
        }
    }

    pub(crate) fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Num(_) => 2,
            Self::Str(_) => 3,
            Self::Bytes(_) => 4,
            Self::Arr(_) => 5,
            Self::Obj(_) => 6,
        }
    }

    pub(crate) fn as_f64_opt(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn as_str_opt(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Num(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(a) => Self::Arr(a.iter().map(Self::from_json).collect()),
            Value::Object(o) => Self::Obj(
                o.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Vec<u8>> for PropValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Arr(a), Self::Arr(b)) => a == b,
            (Self::Obj(a), Self::Obj(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropValue {}

impl PartialOrd for PropValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let ka = self.kind_rank();
        let kb = other.kind_rank();
        if ka != kb {
            return ka.cmp(&kb);
        }
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Num(a), Self::Num(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Arr(a), Self::Arr(b)) => a.cmp(b),
            (Self::Obj(a), Self::Obj(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Maps every byte to the code point of the same value.
pub fn bytes_to_binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`bytes_to_binary_string`]; `None` if any code point exceeds U+00FF.
pub fn binary_string_to_bytes(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}

/// A binary payload: either a real byte buffer or a binary string.
#[derive(Clone, Copy, Debug)]
pub enum Binary<'a> {
    Bytes(&'a Bytes),
    Latin1(&'a str),
}

impl Binary<'_> {
    /// Copies the payload into a freshly owned buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.to_vec(),
            Self::Latin1(text) => text.chars().map(|c| c as u8).collect(),
        }
    }
}

/// An indexable collection: a real array, or an array-like object with `length` and index keys.
#[derive(Clone, Copy, Debug)]
pub enum Items<'a> {
    Array(&'a [PropValue]),
    ArrayLike(&'a BTreeMap<String, PropValue>),
}

/// Conversion from a tree value to a typed view. `None` means the value has the wrong type.
pub trait FieldType<'a>: Sized {
    const EXPECTED: &'static str;

    fn from_prop(value: &'a PropValue) -> Option<Self>;
}

impl<'a> FieldType<'a> for &'a str {
    const EXPECTED: &'static str = "string";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        value.as_str_opt()
    }
}

impl<'a> FieldType<'a> for Option<&'a str> {
    const EXPECTED: &'static str = "string or null";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        match value {
            PropValue::Null => Some(None),
            PropValue::Str(s) => Some(Some(s.as_str())),
            _ => None,
        }
    }
}

impl<'a> FieldType<'a> for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        match value {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl<'a> FieldType<'a> for u32 {
    const EXPECTED: &'static str = "unsigned 32-bit integer";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        let n = value.as_f64_opt()?;
        if !n.is_finite() || n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
            return None;
        }
        Some(n as u32)
    }
}

impl<'a> FieldType<'a> for Binary<'a> {
    const EXPECTED: &'static str = "bytes or binary string";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        match value {
            PropValue::Bytes(bytes) => Some(Binary::Bytes(bytes)),
            PropValue::Str(text) if text.chars().all(|c| u32::from(c) <= 0xff) => {
                Some(Binary::Latin1(text))
            }
            _ => None,
        }
    }
}

impl<'a> FieldType<'a> for &'a BTreeMap<String, PropValue> {
    const EXPECTED: &'static str = "object";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        match value {
            PropValue::Obj(fields) => Some(fields),
            _ => None,
        }
    }
}

impl<'a> FieldType<'a> for Items<'a> {
    const EXPECTED: &'static str = "array";

    fn from_prop(value: &'a PropValue) -> Option<Self> {
        match value {
            PropValue::Arr(items) => Some(Items::Array(items)),
            PropValue::Obj(fields) => Some(Items::ArrayLike(fields)),
            _ => None,
        }
    }
}

/// A mapping in the tree together with its location, for error reporting.
#[derive(Clone, Debug)]
pub struct Record<'a> {
    fields: &'a BTreeMap<String, PropValue>,
    path: String,
}

impl<'a> Record<'a> {
    /// Views the top-level result. A `null` result counts as "no result" from the program.
    pub fn root(value: &'a PropValue) -> Result<Self, Error> {
        match value {
            PropValue::Null => Err(Error::new(ErrorKind::Collaborator)
                .with_message("parsing program returned no result")),
            PropValue::Obj(fields) => Ok(Self {
                fields,
                path: String::new(),
            }),
            other => Err(Error::new(ErrorKind::Shape)
                .with_message(format!("expected object, found {}", other.kind_name()))
                .with_field("<root>")),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads `key` as `T`; missing keys and type mismatches fail uniformly.
    pub fn required<T: FieldType<'a>>(&self, key: &str) -> Result<T, Error> {
        let field = self.field_path(key);
        let Some(value) = self.fields.get(key) else {
            return Err(Error::new(ErrorKind::Shape)
                .with_message("missing required field")
                .with_field(field));
        };
        T::from_prop(value).ok_or_else(|| {
            Error::new(ErrorKind::Shape)
                .with_message(format!(
                    "expected {}, found {}",
                    T::EXPECTED,
                    value.kind_name()
                ))
                .with_field(field)
        })
    }

    /// Reads `key` as a nested, non-null mapping.
    pub fn record(&self, key: &str) -> Result<Record<'a>, Error> {
        let fields = self.required::<&'a BTreeMap<String, PropValue>>(key)?;
        Ok(Record {
            fields,
            path: self.field_path(key),
        })
    }

    /// Reads `key` as a non-null indexable collection.
    pub fn indexable(&self, key: &str) -> Result<Indexable<'a>, Error> {
        let items = self.required::<Items<'a>>(key)?;
        Ok(Indexable {
            items,
            path: self.field_path(key),
        })
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Indexable<'a> {
    items: Items<'a>,
    path: String,
}

impl<'a> Indexable<'a> {
    /// Number of elements. For array-like objects this is the `length` field, which must not
    /// exceed the number of keys actually present.
    pub fn len(&self) -> Result<u32, Error> {
        match self.items {
            Items::Array(items) => u32::try_from(items.len()).map_err(|_| {
                Error::new(ErrorKind::Shape)
                    .with_message("collection too large")
                    .with_field(self.path.clone())
            }),
            Items::ArrayLike(fields) => {
                let record = Record {
                    fields,
                    path: self.path.clone(),
                };
                let len = record.required::<u32>("length")?;
                let entries = fields.len().saturating_sub(1);
                if len as usize > entries {
                    return Err(Error::new(ErrorKind::Shape)
                        .with_message(format!("length {len} disagrees with {entries} entries"))
                        .with_field(self.path.clone()));
                }
                Ok(len)
            }
        }
    }

    /// Element `index` as a mapping; absent or `null` elements fail.
    pub fn record_at(&self, index: u32) -> Result<Record<'a>, Error> {
        let path = format!("{}[{index}]", self.path);
        let value = match self.items {
            Items::Array(items) => items.get(index as usize),
            Items::ArrayLike(fields) => fields.get(&index.to_string()),
        };
        let Some(value) = value else {
            return Err(Error::new(ErrorKind::Shape)
                .with_message("missing collection element")
                .with_field(path)
                .with_index(index));
        };
        match value {
            PropValue::Obj(fields) => Ok(Record { fields, path }),
            other => Err(Error::new(ErrorKind::Shape)
                .with_message(format!("expected object, found {}", other.kind_name()))
                .with_field(path)
                .with_index(index)),
        }
    }
}
