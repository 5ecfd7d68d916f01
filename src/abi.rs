//! Purpose: C ABI for host plugin shells (preview/indexing plugins written in C).
//! Exports: `unmht_extract`, `unmht_document_free`, `unmht_error_free` and their `repr(C)` types.
//! Role: Stable ABI surface; one extract call yields one owned document handle.
//! Invariants: Every handle returned by `unmht_extract` is freed by exactly one `unmht_document_free`.
//! Invariants: Strings are NUL-terminated UTF-8; absent optional strings are null pointers.
//! Invariants: `content` is never null, even for zero-length parts.
//! Invariants: `entry_part` points into `parts`; it is not separately owned.
#![allow(non_camel_case_types)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::core::document::{Document, Part, release_document};
use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::extract::{ReferenceMode, extract};

#[repr(C)]
pub struct unmht_part {
    charset: *mut c_char,
    media_type: *mut c_char,
    content_id: *mut c_char,
    content: *mut u8,
    content_len: usize,
}

#[repr(C)]
pub struct unmht_document {
    base_reference: *mut c_char,
    title: *mut c_char,
    parts: *mut unmht_part,
    parts_len: usize,
    entry_part: *const unmht_part,
    entry_index: usize,
}

#[repr(C)]
pub struct unmht_error {
    kind: i32,
    message: *mut c_char,
    field: *mut c_char,
    hint: *mut c_char,
}

#[unsafe(no_mangle)]
pub extern "C" fn unmht_extract(
    text: *const u8,
    text_len: usize,
    program: *const c_char,
    cid_mode: i32,
    out_document: *mut *mut unmht_document,
    out_err: *mut *mut unmht_error,
) -> i32 {
    if out_document.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_document is null"),
        );
    }
    if text.is_null() && text_len != 0 {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("text is null"),
        );
    }
    let program = match parse_program(program) {
        Ok(program) => program,
        Err(err) => return fail(out_err, err),
    };
    let text = if text_len == 0 {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(text, text_len) }
    };

    let document = match extract(text, program, ReferenceMode::from(cid_mode != 0)) {
        Ok(document) => document,
        Err(err) => return fail(out_err, err),
    };
    let handle = match export_document(document) {
        Ok(handle) => handle,
        Err(err) => return fail(out_err, err),
    };
    unsafe {
        *out_document = Box::into_raw(handle);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn unmht_document_free(document: *mut unmht_document) {
    if document.is_null() {
        return;
    }
    unsafe {
        let document = Box::from_raw(document);
        free_c_string(document.base_reference);
        free_c_string(document.title);
        if !document.parts.is_null() {
            let parts = Box::from_raw(ptr::slice_from_raw_parts_mut(
                document.parts,
                document.parts_len,
            ));
            for part in parts.iter() {
                free_c_string(part.charset);
                free_c_string(part.media_type);
                free_c_string(part.content_id);
                drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                    part.content,
                    part.content_len,
                )));
            }
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn unmht_error_free(err: *mut unmht_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        free_c_string(err.message);
        free_c_string(err.field);
        free_c_string(err.hint);
    }
}

fn parse_program<'a>(program: *const c_char) -> Result<&'a str, Error> {
    if program.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("program is null"));
    }
    unsafe { CStr::from_ptr(program) }
        .to_str()
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("program is not valid UTF-8")
                .with_source(err)
        })
}

/// Owned C-compatible copy of a part, built fully before any pointer is handed out.
struct ExportedPart {
    charset: Option<CString>,
    media_type: Option<CString>,
    content_id: Option<CString>,
    content: Box<[u8]>,
}

fn export_document(document: Document) -> Result<Box<unmht_document>, Error> {
    let base_reference = c_string(document.base_reference(), "baseReference")?;
    let title = c_string(document.title(), "title")?;
    let entry_index = document.entry_index();
    let exported = document
        .parts()
        .iter()
        .enumerate()
        .map(|(index, part)| export_part(index, part))
        .collect::<Result<Vec<_>, _>>()?;
    release_document(document);

    let parts: Box<[unmht_part]> = exported
        .into_iter()
        .map(|part| {
            let content_len = part.content.len();
            unmht_part {
                charset: into_raw_opt(part.charset),
                media_type: into_raw_opt(part.media_type),
                content_id: into_raw_opt(part.content_id),
                content: Box::into_raw(part.content).cast::<u8>(),
                content_len,
            }
        })
        .collect();
    let parts_len = parts.len();
    let parts = Box::into_raw(parts).cast::<unmht_part>();

    Ok(Box::new(unmht_document {
        base_reference: base_reference.into_raw(),
        title: title.into_raw(),
        parts,
        parts_len,
        entry_part: unsafe { parts.add(entry_index) },
        entry_index,
    }))
}

fn export_part(index: usize, part: &Part) -> Result<ExportedPart, Error> {
    let optional = |value: Option<&str>, field: &str| {
        value
            .map(|value| c_string(value, &format!("parts[{index}].{field}")))
            .transpose()
    };
    Ok(ExportedPart {
        charset: optional(part.charset(), "charset")?,
        media_type: optional(part.media_type(), "mediaType")?,
        content_id: optional(part.content_id(), "refParams.contentId")?,
        content: part.content().to_vec().into_boxed_slice(),
    })
}

fn c_string(value: &str, field: &str) -> Result<CString, Error> {
    CString::new(value).map_err(|err| {
        Error::new(ErrorKind::Shape)
            .with_message("string contains an interior NUL byte")
            .with_field(field)
            .with_source(err)
    })
}

fn into_raw_opt(value: Option<CString>) -> *mut c_char {
    value.map(CString::into_raw).unwrap_or(ptr::null_mut())
}

unsafe fn free_c_string(value: *mut c_char) {
    if !value.is_null() {
        drop(unsafe { CString::from_raw(value) });
    }
}

fn fail(out_err: *mut *mut unmht_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(unmht_error {
        kind: to_exit_code(err.kind()),
        message: to_c_string(err.message().unwrap_or("")),
        field: err.field().map(to_c_string).unwrap_or(ptr::null_mut()),
        hint: err.hint().map(to_c_string).unwrap_or(ptr::null_mut()),
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}
