// Strict Base64 decoding for transfer-encoded part bodies.
// Alphabet is the standard one (`+` and `/`); `=` is only valid as padding in the
// third and/or fourth slot of the final group. Any other symbol fails the whole decode.
use crate::core::error::{Error, ErrorKind};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';
const INVALID: u8 = 0xff;

const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Decodes `input` into raw bytes.
///
/// The input must consist of whole 4-symbol groups. A padded third slot yields one byte
/// for the final group, a padded fourth slot yields two.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Error> {
    if input.len() % 4 != 0 {
        return Err(Error::new(ErrorKind::Codec)
            .with_message("base64 input is not a whole number of groups")
            .with_hint(format!("input length {} is not a multiple of 4", input.len())));
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let groups = input.len() / 4;
    for (group_idx, group) in input.chunks_exact(4).enumerate() {
        let offset = group_idx * 4;
        let is_last = group_idx + 1 == groups;

        let s0 = sextet(group[0], offset)?;
        let s1 = sextet(group[1], offset + 1)?;
        out.push((s0 << 2) | (s1 >> 4));

        match (group[2], group[3]) {
            (PAD, PAD) if is_last => {}
            (third, PAD) if is_last => {
                let s2 = sextet(third, offset + 2)?;
                out.push(((s1 & 0x0f) << 4) | (s2 >> 2));
            }
            (third, fourth) => {
                let s2 = sextet(third, offset + 2)?;
                let s3 = sextet(fourth, offset + 3)?;
                out.push(((s1 & 0x0f) << 4) | (s2 >> 2));
                out.push(((s2 & 0x03) << 6) | s3);
            }
        }
    }

    Ok(out)
}

/// Decodes a string whose characters are all Base64 symbols.
pub fn decode_str(input: &str) -> Result<Vec<u8>, Error> {
    decode(input.as_bytes())
}

fn sextet(symbol: u8, offset: usize) -> Result<u8, Error> {
    match DECODE_TABLE[symbol as usize] {
        INVALID => Err(Error::new(ErrorKind::Codec)
            .with_message("invalid base64 symbol")
            .with_hint(format!("symbol {:?} at offset {offset}", symbol as char))),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::core::error::ErrorKind;

    #[test]
    fn decodes_full_group() {
        assert_eq!(decode(b"YWJj").unwrap(), vec![0x61, 0x62, 0x63]);
    }

    #[test]
    fn single_padding_yields_two_bytes() {
        assert_eq!(decode(b"YWI=").unwrap(), b"ab".to_vec());
    }

    #[test]
    fn double_padding_yields_one_byte() {
        assert_eq!(decode(b"YQ==").unwrap(), b"a".to_vec());
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn symbol_outside_alphabet_fails() {
        let err = decode(b"YW@j").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert!(err.hint().unwrap().contains("offset 2"));
    }

    #[test]
    fn padding_before_final_group_fails() {
        assert!(decode(b"YQ==YWJj").is_err());
    }

    #[test]
    fn padding_in_leading_slots_fails() {
        assert!(decode(b"=WJj").is_err());
        assert!(decode(b"Y===").is_err());
    }

    #[test]
    fn padded_third_slot_requires_padded_fourth() {
        assert!(decode(b"YW=j").is_err());
    }

    #[test]
    fn partial_group_fails() {
        assert!(decode(b"YWJjZA").is_err());
    }

    #[test]
    fn multi_group_input() {
        assert_eq!(decode(b"aGVsbG8gd29ybGQ=").unwrap(), b"hello world".to_vec());
    }
}
