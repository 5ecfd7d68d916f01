//! Purpose: Native filters exposed to the parsing program.
//! Exports: `PRELUDE`, `with_natives`, and the plain-Rust bodies of each native.
//! Role: Diagnostic output, Base64 decode, charset conversion, and `length` callable from jq.
//! Invariants: Natives are stateless function pointers; nothing is shared across extractions.
//! Invariants: Codec failures raise jq errors with fixed messages, never an empty result.

use std::io::Write;

use jaq_core::{Error as JaqError, Native, ValX};
use tracing::trace;

use crate::core::tree::{PropValue, binary_string_to_bytes};
use crate::core::{base64, charset};

pub(crate) const ATOB_FAILED: &str = "Failed to decode base64 string!";
pub(crate) const TO_UNICODE_FAILED: &str = "Failed to convert to unicode!";
pub(crate) const FROM_UNICODE_FAILED: &str = "Failed to convert from unicode!";

/// jq-level wrappers giving the conversion natives their `(charset)` argument form.
pub(crate) const PRELUDE: &str = "\
def ConvertToUnicode($charset): [., $charset] | unmht_to_unicode;
def ConvertFromUnicode($charset): [., $charset] | unmht_from_unicode;
";

type NativeResult = Result<PropValue, JaqError<PropValue>>;

/// Appends the natives to a set of standard filter definitions.
pub(crate) fn with_natives<B: Default>(
    base: impl Iterator<Item = (&'static str, B, Native<PropValue>)>,
) -> impl Iterator<Item = (&'static str, B, Native<PropValue>)> {
    base.chain([
        (
            "print",
            B::default(),
            Native::new(|_, cv| once(print_value(cv.1))),
        ),
        ("length", B::default(), Native::new(|_, cv| once(length(cv.1)))),
        ("atob", B::default(), Native::new(|_, cv| once(atob(cv.1)))),
        (
            "unmht_to_unicode",
            B::default(),
            Native::new(|_, cv| once(to_unicode(cv.1))),
        ),
        (
            "unmht_from_unicode",
            B::default(),
            Native::new(|_, cv| once(from_unicode(cv.1))),
        ),
    ])
}

fn once<'a>(result: NativeResult) -> Box<dyn Iterator<Item = ValX<'a, PropValue>> + 'a> {
    let item: ValX<'a, PropValue> = result.map_err(Into::into);
    Box::new(std::iter::once(item))
}

/// Space-joined string forms of the input (or of its elements, for an array).
pub(crate) fn diagnostic_line(value: &PropValue) -> String {
    fn string_form(value: &PropValue) -> String {
        match value {
            PropValue::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
    match value {
        PropValue::Arr(items) => items
            .iter()
            .map(string_form)
            .collect::<Vec<_>>()
            .join(" "),
        other => string_form(other),
    }
}

fn print_value(value: PropValue) -> NativeResult {
    let line = diagnostic_line(&value);
    trace!(target: "unmht::print", "{line}");
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
    let _ = stderr.flush();
    Ok(value)
}

/// Characters for strings, bytes for `bytes`, entries for containers, magnitude for numbers.
pub(crate) fn length(value: PropValue) -> NativeResult {
    let len = match &value {
        PropValue::Null => 0,
        PropValue::Num(n) => return Ok(PropValue::Num(n.abs())),
        PropValue::Str(s) => s.chars().count(),
        PropValue::Bytes(b) => b.len(),
        PropValue::Arr(items) => items.len(),
        PropValue::Obj(fields) => fields.len(),
        PropValue::Bool(b) => return Err(JaqError::typ(PropValue::Bool(*b), "value with a length")),
    };
    Ok(PropValue::Num(len as f64))
}

pub(crate) fn atob(value: PropValue) -> NativeResult {
    let decoded = match &value {
        PropValue::Str(text) => base64::decode_str(text),
        PropValue::Bytes(bytes) => base64::decode(bytes),
        _ => return Err(JaqError::typ(value, "string")),
    };
    decoded.map(PropValue::from).map_err(|err| {
        trace!(error = %err, hint = err.hint().unwrap_or(""), "atob failed");
        JaqError::str(ATOB_FAILED)
    })
}

pub(crate) fn to_unicode(value: PropValue) -> NativeResult {
    let (data, label) = split_args(value)?;
    let bytes = match data {
        PropValue::Bytes(bytes) => bytes.to_vec(),
        PropValue::Str(text) => {
            binary_string_to_bytes(&text).ok_or_else(|| JaqError::str(TO_UNICODE_FAILED))?
        }
        other => return Err(JaqError::typ(other, "bytes or binary string")),
    };
    let units = charset::decode(&bytes, &label).map_err(|err| {
        trace!(error = %err, hint = err.hint().unwrap_or(""), "ConvertToUnicode failed");
        JaqError::str(TO_UNICODE_FAILED)
    })?;
    String::from_utf16(&units)
        .map(PropValue::Str)
        .map_err(|_| JaqError::str(TO_UNICODE_FAILED))
}

pub(crate) fn from_unicode(value: PropValue) -> NativeResult {
    let (data, label) = split_args(value)?;
    let PropValue::Str(text) = data else {
        return Err(JaqError::typ(data, "string"));
    };
    let units: Vec<u16> = text.encode_utf16().collect();
    charset::encode(&units, &label)
        .map(PropValue::from)
        .map_err(|err| {
            trace!(error = %err, hint = err.hint().unwrap_or(""), "ConvertFromUnicode failed");
            JaqError::str(FROM_UNICODE_FAILED)
        })
}

/// Unpacks the `[data, charset]` pair built by the prelude wrappers.
fn split_args(value: PropValue) -> Result<(PropValue, String), JaqError<PropValue>> {
    match value {
        PropValue::Arr(mut args) if args.len() == 2 => {
            let label = args.pop();
            let data = args.pop();
            match (data, label) {
                (Some(data), Some(PropValue::Str(label))) => Ok((data, label)),
                (_, Some(other)) => Err(JaqError::typ(other, "string")),
                _ => Err(JaqError::str("conversion expects [data, charset]")),
            }
        }
        other => Err(JaqError::typ(other, "[data, charset] pair")),
    }
}
