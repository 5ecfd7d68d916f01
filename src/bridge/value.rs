//! Purpose: Let `PropValue` flow through the jaq interpreter as its native value type.
//! Exports: trait impls only (`jaq_core::ValT`, `jaq_std::ValT`, operators, `Display`).
//! Role: Adapter so the parsing program's output is already a property tree, no conversion pass.
//! Invariants: Operators follow jq: `string / string` splits, `string * n` repeats,
//! `object * object` merges recursively, `+ null` is the identity.
//! Invariants: Slices count characters for strings and elements for arrays; `.[s:e] |= f`
//! splices the updated elements back in place.
//! Invariants: `bytes` values support concatenation and equality but are not indexable.
//! Invariants: `Display` renders JSON-like text; bytes render as a quoted binary string.

use std::collections::BTreeMap;
use std::fmt;

use jaq_core::ops::Math;
use jaq_core::path::Opt;
use jaq_core::val::Range;
use jaq_core::{Error as JaqError, ValX};

use crate::core::tree::{PropValue, bytes_to_binary_string};

type ValR = Result<PropValue, JaqError<PropValue>>;

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write_quoted(f, s),
            Self::Bytes(b) => write_quoted(f, &bytes_to_binary_string(b)),
            Self::Arr(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Obj(fields) => {
                f.write_str("{")?;
                for (idx, (key, item)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ":{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    match serde_json::to_string(s) {
        Ok(encoded) => f.write_str(&encoded),
        Err(_) => f.write_str("\"<invalid string>\""),
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<isize> for PropValue {
    fn from(value: isize) -> Self {
        Self::Num(value as f64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl FromIterator<Self> for PropValue {
    fn from_iter<T: IntoIterator<Item = Self>>(iter: T) -> Self {
        Self::Arr(iter.into_iter().collect())
    }
}

impl std::ops::Add for PropValue {
    type Output = ValR;

    fn add(self, rhs: Self) -> ValR {
        match (self, rhs) {
            (Self::Null, other) | (other, Self::Null) => Ok(other),
            (Self::Num(a), Self::Num(b)) => Ok(Self::Num(a + b)),
            (Self::Str(mut a), Self::Str(b)) => {
                a.push_str(&b);
                Ok(Self::Str(a))
            }
            (Self::Bytes(a), Self::Bytes(b)) => Ok(Self::from([&a[..], &b[..]].concat())),
            (Self::Arr(mut a), Self::Arr(b)) => {
                a.extend(b);
                Ok(Self::Arr(a))
            }
            (Self::Obj(mut a), Self::Obj(b)) => {
                a.extend(b);
                Ok(Self::Obj(a))
            }
            (l, r) => Err(JaqError::math(l, Math::Add, r)),
        }
    }
}

impl std::ops::Sub for PropValue {
    type Output = ValR;

    fn sub(self, rhs: Self) -> ValR {
        match (self, rhs) {
            (Self::Num(a), Self::Num(b)) => Ok(Self::Num(a - b)),
            (Self::Arr(mut a), Self::Arr(b)) => {
                a.retain(|item| !b.contains(item));
                Ok(Self::Arr(a))
            }
            (l, r) => Err(JaqError::math(l, Math::Sub, r)),
        }
    }
}

impl std::ops::Mul for PropValue {
    type Output = ValR;

    fn mul(self, rhs: Self) -> ValR {
        match (self, rhs) {
            (Self::Num(a), Self::Num(b)) => Ok(Self::Num(a * b)),
            (Self::Str(s), Self::Num(n)) | (Self::Num(n), Self::Str(s)) => Ok(repeat(&s, n)),
            (Self::Obj(a), Self::Obj(b)) => Ok(Self::Obj(deep_merge(a, b))),
            (l, r) => Err(JaqError::math(l, Math::Mul, r)),
        }
    }
}

impl std::ops::Div for PropValue {
    type Output = ValR;

    fn div(self, rhs: Self) -> ValR {
        match (self, rhs) {
            (Self::Num(a), Self::Num(b)) => Ok(Self::Num(a / b)),
            (Self::Str(s), Self::Str(sep)) => Ok(split(&s, &sep)),
            (l, r) => Err(JaqError::math(l, Math::Div, r)),
        }
    }
}

impl std::ops::Rem for PropValue {
    type Output = ValR;

    fn rem(self, rhs: Self) -> ValR {
        match (self, rhs) {
            (Self::Num(a), Self::Num(b)) => {
                let divisor = b.trunc();
                if divisor == 0.0 {
                    return Err(JaqError::math(Self::Num(a), Math::Rem, Self::Num(b)));
                }
                Ok(Self::Num(a.trunc() % divisor))
            }
            (l, r) => Err(JaqError::math(l, Math::Rem, r)),
        }
    }
}

impl std::ops::Neg for PropValue {
    type Output = ValR;

    fn neg(self) -> ValR {
        match self {
            Self::Num(a) => Ok(Self::Num(-a)),
            other => Err(JaqError::typ(other, "number")),
        }
    }
}

/// `"" / sep` is empty; an empty separator yields one string per character.
fn split(s: &str, sep: &str) -> PropValue {
    let piece = |p: &str| PropValue::Str(p.to_string());
    if s.is_empty() {
        PropValue::Arr(Vec::new())
    } else if sep.is_empty() {
        PropValue::Arr(s.chars().map(|c| PropValue::Str(c.to_string())).collect())
    } else {
        PropValue::Arr(s.split(sep).map(piece).collect())
    }
}

/// Non-positive counts give `null`.
fn repeat(s: &str, n: f64) -> PropValue {
    if n > 0.0 {
        PropValue::Str(s.repeat(n.ceil() as usize))
    } else {
        PropValue::Null
    }
}

fn deep_merge(
    mut into: BTreeMap<String, PropValue>,
    from: BTreeMap<String, PropValue>,
) -> BTreeMap<String, PropValue> {
    for (key, value) in from {
        let merged = match (into.remove(&key), value) {
            (Some(PropValue::Obj(a)), PropValue::Obj(b)) => PropValue::Obj(deep_merge(a, b)),
            (_, value) => value,
        };
        into.insert(key, merged);
    }
    into
}

fn as_index(value: &PropValue) -> Result<isize, JaqError<PropValue>> {
    match value {
        PropValue::Num(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as isize),
        other => Err(JaqError::typ(other.clone(), "integer")),
    }
}

/// Resolves `start` and `end` (negative counts from the back) to `start <= end <= len`.
fn slice_bounds(len: usize, range: &Range<&PropValue>) -> Result<(usize, usize), JaqError<PropValue>> {
    let len = len as isize;
    let resolve = |bound: Option<&&PropValue>, default: isize| -> Result<usize, JaqError<PropValue>> {
        let idx = bound.map(|v| as_index(v)).transpose()?.unwrap_or(default);
        let idx = if idx < 0 { len + idx } else { idx };
        Ok(idx.clamp(0, len) as usize)
    };
    let start = resolve(range.start.as_ref(), 0)?;
    let end = resolve(range.end.as_ref(), len)?;
    Ok((start, end.max(start)))
}

fn not_iterable<'a>(value: PropValue, opt: Opt, expected: &'static str) -> ValX<'a, PropValue> {
    match opt {
        Opt::Optional => Ok(value),
        Opt::Essential => Err(JaqError::typ(value, expected).into()),
    }
}

impl jaq_core::ValT for PropValue {
    fn from_num(n: &str) -> ValR {
        n.parse::<f64>().map(Self::Num).map_err(JaqError::str)
    }

    fn from_map<I: IntoIterator<Item = (Self, Self)>>(iter: I) -> ValR {
        let mut fields = BTreeMap::new();
        for (key, value) in iter {
            match key {
                Self::Str(key) => {
                    fields.insert(key, value);
                }
                other => return Err(JaqError::typ(other, "string")),
            }
        }
        Ok(Self::Obj(fields))
    }

    fn values(self) -> Box<dyn Iterator<Item = ValR>> {
        match self {
            Self::Arr(items) => Box::new(items.into_iter().map(Ok)),
            Self::Obj(fields) => Box::new(fields.into_values().map(Ok)),
            other => Box::new(std::iter::once(Err(JaqError::typ(other, "iterable")))),
        }
    }

    fn index(self, index: &Self) -> ValR {
        match (self, index) {
            (Self::Null, _) => Ok(Self::Null),
            (Self::Obj(mut fields), Self::Str(key)) => Ok(fields.remove(key).unwrap_or(Self::Null)),
            (Self::Arr(mut items), Self::Num(_)) => {
                let idx = as_index(index)?;
                let idx = if idx < 0 { items.len() as isize + idx } else { idx };
                match usize::try_from(idx) {
                    Ok(idx) if idx < items.len() => Ok(items.swap_remove(idx)),
                    _ => Ok(Self::Null),
                }
            }
            (l, r) => Err(JaqError::index(l, r.clone())),
        }
    }

    fn range(self, range: Range<&Self>) -> ValR {
        match self {
            Self::Null => Ok(Self::Null),
            Self::Arr(mut items) => {
                let (start, end) = slice_bounds(items.len(), &range)?;
                items.truncate(end);
                Ok(Self::Arr(items.split_off(start)))
            }
            Self::Str(s) => {
                let (start, end) = slice_bounds(s.chars().count(), &range)?;
                Ok(Self::Str(s.chars().skip(start).take(end - start).collect()))
            }
            other => Err(JaqError::typ(other, "array or string")),
        }
    }

    fn map_values<'a, I: Iterator<Item = ValX<'a, Self>>>(
        self,
        opt: Opt,
        f: impl Fn(Self) -> I,
    ) -> ValX<'a, Self> {
        // An empty update result drops the element.
        match self {
            Self::Arr(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(updated) = f(item).next() {
                        out.push(updated?);
                    }
                }
                Ok(Self::Arr(out))
            }
            Self::Obj(fields) => {
                let mut out = BTreeMap::new();
                for (key, item) in fields {
                    if let Some(updated) = f(item).next() {
                        out.insert(key, updated?);
                    }
                }
                Ok(Self::Obj(out))
            }
            other => not_iterable(other, opt, "iterable"),
        }
    }

    fn map_index<'a, I: Iterator<Item = ValX<'a, Self>>>(
        self,
        index: &Self,
        opt: Opt,
        f: impl Fn(Self) -> I,
    ) -> ValX<'a, Self> {
        let mut fields = match self {
            Self::Obj(fields) => fields,
            Self::Null => BTreeMap::new(),
            other => return not_iterable(other, opt, "object"),
        };
        let Self::Str(key) = index else {
            return Err(JaqError::index(Self::Obj(fields), index.clone()).into());
        };
        let current = fields.remove(key).unwrap_or(Self::Null);
        if let Some(updated) = f(current).next() {
            fields.insert(key.clone(), updated?);
        }
        Ok(Self::Obj(fields))
    }

    fn map_range<'a, I: Iterator<Item = ValX<'a, Self>>>(
        self,
        range: Range<&Self>,
        opt: Opt,
        f: impl Fn(Self) -> I,
    ) -> ValX<'a, Self> {
        let mut items = match self {
            Self::Arr(items) => items,
            other => return not_iterable(other, opt, "array"),
        };
        let (start, end) = slice_bounds(items.len(), &range)?;
        let slice = Self::Arr(items[start..end].to_vec());
        let replacement = match f(slice).next() {
            Some(Ok(Self::Arr(replacement))) => replacement,
            Some(Ok(other)) => return Err(JaqError::typ(other, "array").into()),
            Some(Err(err)) => return Err(err),
            None => Vec::new(),
        };
        items.splice(start..end, replacement);
        Ok(Self::Arr(items))
    }

    fn as_bool(&self) -> bool {
        !matches!(self, Self::Null | Self::Bool(false))
    }

    fn as_str(&self) -> Option<&str> {
        self.as_str_opt()
    }
}

impl jaq_std::ValT for PropValue {
    fn into_seq<S: FromIterator<Self>>(self) -> Result<S, Self> {
        match self {
            Self::Arr(items) => Ok(items.into_iter().collect()),
            other => Err(other),
        }
    }

    fn as_isize(&self) -> Option<isize> {
        match self {
            Self::Num(n) if n.is_finite() && n.fract() == 0.0 => {
                let cast = *n as isize;
                ((cast as f64) == *n).then_some(cast)
            }
            _ => None,
        }
    }

    fn as_f64(&self) -> Result<f64, JaqError<Self>> {
        self.as_f64_opt()
            .ok_or_else(|| JaqError::typ(self.clone(), "number"))
    }
}

#[cfg(test)]
mod tests {
    use crate::bridge::{ScriptContext, ScriptInputs};
    use crate::core::tree::PropValue;
    use jaq_core::ValT;

    fn eval(program: &str) -> PropValue {
        let mut ctx = ScriptContext::load(program).expect("load");
        let out = ctx.evaluate(ScriptInputs {
            text: b"",
            cid_mode: false,
        });
        ctx.close();
        out.expect("evaluate")
    }

    fn json(value: serde_json::Value) -> PropValue {
        PropValue::from_json(&value)
    }

    #[test]
    fn display_renders_bytes_as_binary_string() {
        let value = PropValue::Arr(vec![
            PropValue::Str("a b".to_string()),
            PropValue::from(vec![0x68, 0xe9]),
            PropValue::Null,
        ]);
        assert_eq!(value.to_string(), "[\"a b\",\"h\u{e9}\",null]");
    }

    #[test]
    fn bytes_concatenate() {
        let joined = (PropValue::from(b"ab".to_vec()) + PropValue::from(b"c".to_vec())).unwrap();
        assert_eq!(joined, PropValue::from(b"abc".to_vec()));
        assert!((PropValue::from(b"ab".to_vec()) + PropValue::Num(1.0)).is_err());
    }

    #[test]
    fn missing_object_key_indexes_to_null() {
        let obj = json(serde_json::json!({"a": 1}));
        let key = PropValue::Str("b".to_string());
        assert_eq!(obj.index(&key).unwrap(), PropValue::Null);
    }

    #[test]
    fn split_divides_strings() {
        assert_eq!(eval(r#""a;b;;c" | split(";")"#), json(serde_json::json!(["a", "b", "", "c"])));
        assert_eq!(eval(r#""x\n\ny" / "\n\n""#), json(serde_json::json!(["x", "y"])));
        assert_eq!(eval(r#""" | split(";")"#), json(serde_json::json!([])));
        assert_eq!(eval(r#""abc" / """#), json(serde_json::json!(["a", "b", "c"])));
    }

    #[test]
    fn join_keeps_single_elements() {
        assert_eq!(eval(r#"["only"] | join("\n\n")"#), PropValue::Str("only".to_string()));
        assert_eq!(eval(r#"["a", 1, true] | join("-")"#), PropValue::Str("a-1-true".to_string()));
        assert_eq!(eval(r#"[] | join(",")"#), PropValue::Str(String::new()));
    }

    #[test]
    fn length_counts_by_kind() {
        assert_eq!(
            eval(r#"[null, -3, "hé", [1, 2], {a: 1}] | map(length)"#),
            json(serde_json::json!([0, 3, 2, 2, 1]))
        );
        assert_eq!(eval(r#""YWJj" | atob | length"#), PropValue::Num(3.0));
    }

    #[test]
    fn trimming_strips_only_matching_affixes() {
        assert_eq!(
            eval(r#""<root>" | ltrimstr("<") | rtrimstr(">")"#),
            PropValue::Str("root".to_string())
        );
        assert_eq!(eval(r#""root" | ltrimstr("x")"#), PropValue::Str("root".to_string()));
    }

    #[test]
    fn slices_count_characters_and_elements() {
        assert_eq!(eval(r#""héllo" | .[1:3]"#), PropValue::Str("\u{e9}l".to_string()));
        assert_eq!(eval(r#""subject: x" | .[8:]"#), PropValue::Str(" x".to_string()));
        assert_eq!(eval("[1, 2, 3, 4] | .[-2:]"), json(serde_json::json!([3, 4])));
        assert_eq!(eval("[1, 2, 3] | .[2:1]"), json(serde_json::json!([])));
    }

    #[test]
    fn slice_update_splices_in_place() {
        assert_eq!(eval("[1, 2, 3] | .[:-1][] += 10"), json(serde_json::json!([11, 12, 3])));
        assert_eq!(eval(r#"[1, 2, 3, 4] | .[1:3] |= ["x"]"#), json(serde_json::json!([1, "x", 4])));
        assert_eq!(eval("[1] | .[:-1][] += 10"), json(serde_json::json!([1])));
    }

    #[test]
    fn multiplication_repeats_strings_and_merges_objects() {
        assert_eq!(eval(r#""ab" * 2"#), PropValue::Str("abab".to_string()));
        assert_eq!(eval(r#""ab" * 0"#), PropValue::Null);
        assert_eq!(
            eval("{a: {b: 1}} * {a: {c: 2}}"),
            json(serde_json::json!({"a": {"b": 1, "c": 2}}))
        );
    }

    #[test]
    fn remainder_by_zero_fails() {
        assert_eq!((PropValue::Num(7.0) % PropValue::Num(3.0)).unwrap(), PropValue::Num(1.0));
        assert!((PropValue::Num(7.0) % PropValue::Num(0.0)).is_err());
    }
}
