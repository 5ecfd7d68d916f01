//! Purpose: Convert between named legacy charsets and UTF-16 code units.
//! Exports: `decode`, `encode`, `lookup`.
//! Role: Codec boundary backing the collaborator's `ConvertToUnicode`/`ConvertFromUnicode`.
//! Invariants: Fail fast; malformed input or unmappable characters never get replacement output.
//! Invariants: Encoding names are data, resolved through WHATWG labels at call time.
//! Invariants: Each call owns its own decoder/encoder state; nothing is shared across calls.

use encoding_rs::{DecoderResult, EncoderResult, Encoding, UTF_16BE, UTF_16LE};

use crate::core::error::{Error, ErrorKind};

/// Resolves a charset label such as `Shift_JIS`, `iso-8859-1` or `utf-8`.
pub fn lookup(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        Error::new(ErrorKind::Codec)
            .with_message("conversion failed")
            .with_hint(format!("unknown encoding `{label}`"))
    })
}

/// Interprets `bytes` under `label` and returns the equivalent UTF-16 code units.
pub fn decode(bytes: &[u8], label: &str) -> Result<Vec<u16>, Error> {
    let encoding = lookup(label)?;
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf16_buffer_length(bytes.len())
        .ok_or_else(|| {
            Error::new(ErrorKind::Codec)
                .with_message("conversion failed")
                .with_hint("input too large to decode")
        })?;

    let mut out = vec![0u16; capacity];
    let (result, _read, written) =
        decoder.decode_to_utf16_without_replacement(bytes, &mut out, true);
    match result {
        DecoderResult::InputEmpty => {
            out.truncate(written);
            Ok(out)
        }
        DecoderResult::Malformed(_, _) => Err(Error::new(ErrorKind::Codec)
            .with_message("conversion failed")
            .with_hint(format!(
                "malformed {} sequence after {written} code units",
                encoding.name()
            ))),
        DecoderResult::OutputFull => Err(Error::new(ErrorKind::Internal)
            .with_message("conversion failed")
            .with_hint("decoder output buffer undersized")),
    }
}

/// Converts UTF-16 code units into bytes of the charset named by `label`.
pub fn encode(units: &[u16], label: &str) -> Result<Vec<u8>, Error> {
    let encoding = lookup(label)?;
    ensure_paired_surrogates(units)?;

    // encoding_rs only encodes to UTF-8-compatible outputs; UTF-16 is laid out by hand.
    if encoding == UTF_16LE {
        return Ok(units.iter().flat_map(|unit| unit.to_le_bytes()).collect());
    }
    if encoding == UTF_16BE {
        return Ok(units.iter().flat_map(|unit| unit.to_be_bytes()).collect());
    }
    if encoding.output_encoding() != encoding {
        return Err(Error::new(ErrorKind::Codec)
            .with_message("conversion failed")
            .with_hint(format!("{} is decode-only", encoding.name())));
    }

    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf16_without_replacement(units.len())
        .ok_or_else(|| {
            Error::new(ErrorKind::Codec)
                .with_message("conversion failed")
                .with_hint("input too large to encode")
        })?;

    let mut out = vec![0u8; capacity];
    let (result, _read, written) =
        encoder.encode_from_utf16_without_replacement(units, &mut out, true);
    match result {
        EncoderResult::InputEmpty => {
            out.truncate(written);
            Ok(out)
        }
        EncoderResult::Unmappable(ch) => Err(Error::new(ErrorKind::Codec)
            .with_message("conversion failed")
            .with_hint(format!(
                "U+{:04X} is not representable in {}",
                ch as u32,
                encoding.name()
            ))),
        EncoderResult::OutputFull => Err(Error::new(ErrorKind::Internal)
            .with_message("conversion failed")
            .with_hint("encoder output buffer undersized")),
    }
}

fn ensure_paired_surrogates(units: &[u16]) -> Result<(), Error> {
    match char::decode_utf16(units.iter().copied()).find_map(Result::err) {
        Some(err) => Err(Error::new(ErrorKind::Codec)
            .with_message("conversion failed")
            .with_hint(format!(
                "unpaired surrogate 0x{:04X}",
                err.unpaired_surrogate()
            ))),
        None => Ok(()),
    }
}
