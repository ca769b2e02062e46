//! Self-describing canonical binary codec for attribute values.
//!
//! ## Wire Layout
//!
//! Every value starts with a two-byte header: one reserved null byte and a
//! one-byte type tag. Scalar payloads are length-prefixed (4-byte
//! big-endian); composites carry a member count followed by recursively
//! encoded members.
//!
//! ```text
//! ┌──────────┬───────┬──────────────────────────────┐
//! │ Reserved │  Tag  │   Payload (tag-dependent)    │
//! │  1 byte  │ 1 byte│                              │
//! └──────────┴───────┴──────────────────────────────┘
//! ```
//!
//! Encoding is canonical: map entries are emitted in ascending byte order
//! of their keys, set members in ascending byte order of their encoded
//! form, and number text is canonicalized before emission. Two values that
//! are equal after set/map normalization encode to identical bytes.

use crate::error::{Error, Result};
use crate::value::{canonical_number, AttrValue};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved first byte of every encoded value.
const RESERVED: u8 = 0x00;

/// Type tags (ASCII where a mnemonic exists).
const TAG_BINARY: u8 = b'b';
const TAG_NUMBER: u8 = b'n';
const TAG_STRING: u8 = b's';
const TAG_BOOLEAN: u8 = b'?';
const TAG_NULL: u8 = 0x00;
const TAG_LIST: u8 = b'L';
const TAG_MAP: u8 = b'M';
const TAG_BINARY_SET: u8 = b'B';
const TAG_NUMBER_SET: u8 = b'N';
const TAG_STRING_SET: u8 = b'S';

// ============================================================================
// Encoding
// ============================================================================

/// Encode an attribute value into its canonical binary form.
///
/// Total over all well-typed values; the only failure is number text that
/// does not parse as a decimal.
pub fn encode(value: &AttrValue) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    encode_into(value, &mut buf)?;
    Ok(buf)
}

fn encode_into(value: &AttrValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        AttrValue::B(bytes) => {
            put_header(buf, TAG_BINARY);
            put_value(buf, bytes);
        }
        AttrValue::N(text) => {
            put_header(buf, TAG_NUMBER);
            put_value(buf, canonical_number(text)?.as_bytes());
        }
        AttrValue::S(text) => {
            put_header(buf, TAG_STRING);
            put_value(buf, text.as_bytes());
        }
        AttrValue::Bool(flag) => {
            put_header(buf, TAG_BOOLEAN);
            buf.push(u8::from(*flag));
        }
        AttrValue::Null => put_header(buf, TAG_NULL),
        AttrValue::L(members) => {
            put_header(buf, TAG_LIST);
            put_count(buf, members.len())?;
            for member in members {
                encode_into(member, buf)?;
            }
        }
        AttrValue::M(entries) => {
            put_header(buf, TAG_MAP);
            put_count(buf, entries.len())?;
            // BTreeMap iteration is ascending byte order of the UTF-8 keys.
            for (key, member) in entries {
                put_header(buf, TAG_STRING);
                put_value(buf, key.as_bytes());
                encode_into(member, buf)?;
            }
        }
        AttrValue::Bs(members) => {
            put_header(buf, TAG_BINARY_SET);
            put_count(buf, members.len())?;
            for member in members {
                put_value(buf, member);
            }
        }
        AttrValue::Ns(members) => {
            put_header(buf, TAG_NUMBER_SET);
            put_count(buf, members.len())?;
            // Canonicalization can reorder, so sort the transformed members.
            let mut canonical: Vec<String> = Vec::with_capacity(members.len());
            for member in members {
                canonical.push(canonical_number(member)?);
            }
            canonical.sort();
            for member in canonical {
                put_value(buf, member.as_bytes());
            }
        }
        AttrValue::Ss(members) => {
            put_header(buf, TAG_STRING_SET);
            put_count(buf, members.len())?;
            for member in members {
                put_value(buf, member.as_bytes());
            }
        }
    }
    Ok(())
}

fn put_header(buf: &mut Vec<u8>, tag: u8) {
    buf.push(RESERVED);
    buf.push(tag);
}

fn put_count(buf: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count)
        .map_err(|_| Error::invalid_value("composite value has more than u32::MAX members"))?;
    buf.extend_from_slice(&count.to_be_bytes());
    Ok(())
}

fn put_value(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a canonically encoded attribute value.
///
/// # Errors
///
/// Returns `Error::CorruptValue` on empty input, a non-null reserved
/// byte, an unknown tag, or a short read.
pub fn decode(data: &[u8]) -> Result<AttrValue> {
    if data.is_empty() {
        return Err(Error::corrupt_value("empty encoded value"));
    }
    let mut cursor = Cursor { buf: data, pos: 0 };
    cursor.read_value()
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::corrupt_value("unexpected end of encoded value"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::corrupt_value("unexpected end of encoded value"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_count(&mut self) -> Result<usize> {
        let bytes: [u8; 4] = self.read_exact(4)?.try_into().expect("length checked");
        Ok(u32::from_be_bytes(bytes) as usize)
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_count()?;
        self.read_exact(len)
    }

    fn read_tag(&mut self) -> Result<u8> {
        let reserved = self.read_byte()?;
        if reserved != RESERVED {
            return Err(Error::corrupt_value("reserved byte is not null"));
        }
        self.read_byte()
    }

    fn read_value(&mut self) -> Result<AttrValue> {
        match self.read_tag()? {
            TAG_BINARY => Ok(AttrValue::B(self.read_len_prefixed()?.to_vec())),
            TAG_NUMBER => Ok(AttrValue::N(self.read_utf8()?)),
            TAG_STRING => Ok(AttrValue::S(self.read_utf8()?)),
            TAG_BOOLEAN => Ok(AttrValue::Bool(self.read_byte()? != 0)),
            TAG_NULL => Ok(AttrValue::Null),
            TAG_LIST => {
                let count = self.read_count()?;
                let mut members = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    members.push(self.read_value()?);
                }
                Ok(AttrValue::L(members))
            }
            TAG_MAP => {
                let count = self.read_count()?;
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = match self.read_value()? {
                        AttrValue::S(key) => key,
                        other => {
                            return Err(Error::corrupt_value(format!(
                                "map key has type {}, expected string",
                                other.type_name()
                            )))
                        }
                    };
                    let member = self.read_value()?;
                    entries.insert(key, member);
                }
                Ok(AttrValue::M(entries))
            }
            TAG_BINARY_SET => {
                let count = self.read_count()?;
                let mut members = BTreeSet::new();
                for _ in 0..count {
                    members.insert(self.read_len_prefixed()?.to_vec());
                }
                Ok(AttrValue::Bs(members))
            }
            TAG_NUMBER_SET => {
                let count = self.read_count()?;
                let mut members = BTreeSet::new();
                for _ in 0..count {
                    members.insert(self.read_utf8()?);
                }
                Ok(AttrValue::Ns(members))
            }
            TAG_STRING_SET => {
                let count = self.read_count()?;
                let mut members = BTreeSet::new();
                for _ in 0..count {
                    members.insert(self.read_utf8()?);
                }
                Ok(AttrValue::Ss(members))
            }
            tag => Err(Error::corrupt_value(format!("unknown type tag 0x{tag:02x}"))),
        }
    }

    fn read_utf8(&mut self) -> Result<String> {
        let bytes = self.read_len_prefixed()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::corrupt_value("payload is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: AttrValue) {
        let encoded = encode(&value).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(AttrValue::string("hello"));
        roundtrip(AttrValue::string(""));
        roundtrip(AttrValue::binary(vec![0u8, 1, 2, 255]));
        roundtrip(AttrValue::number("-12.75").unwrap());
        roundtrip(AttrValue::Bool(true));
        roundtrip(AttrValue::Bool(false));
        roundtrip(AttrValue::Null);
    }

    #[test]
    fn test_composite_roundtrips() {
        roundtrip(AttrValue::L(vec![
            AttrValue::string("a"),
            AttrValue::Null,
            AttrValue::L(vec![AttrValue::Bool(true)]),
        ]));

        let mut map = BTreeMap::new();
        map.insert("name".to_string(), AttrValue::string("Alice"));
        map.insert("tags".to_string(), AttrValue::Ss(["x".to_string()].into()));
        roundtrip(AttrValue::M(map));

        roundtrip(AttrValue::Bs([vec![3u8], vec![1u8, 2]].into()));
        roundtrip(AttrValue::Ns(["1".to_string(), "2.5".to_string()].into()));
        roundtrip(AttrValue::Ss(["b".to_string(), "a".to_string()].into()));
    }

    #[test]
    fn test_wire_layout_of_string() {
        let encoded = encode(&AttrValue::string("hi")).unwrap();
        assert_eq!(encoded, vec![0x00, b's', 0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_wire_layout_of_null_and_bool() {
        assert_eq!(encode(&AttrValue::Null).unwrap(), vec![0x00, 0x00]);
        assert_eq!(encode(&AttrValue::Bool(true)).unwrap(), vec![0x00, b'?', 1]);
    }

    #[test]
    fn test_number_canonicalized_on_encode() {
        let encoded = encode(&AttrValue::N("1.50".to_string())).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, AttrValue::N("1.5".to_string()));
    }

    #[test]
    fn test_map_keys_emitted_in_byte_order() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), AttrValue::Null);
        map.insert("a".to_string(), AttrValue::Null);
        let encoded = encode(&AttrValue::M(map)).unwrap();

        // First key after the map header and count must be "a".
        // header(2) + count(4) + key header(2) + key len(4) = offset 12
        assert_eq!(&encoded[12..13], b"a");
    }

    #[test]
    fn test_encoding_is_byte_deterministic() {
        let a = AttrValue::Ss(["x".to_string(), "y".to_string(), "z".to_string()].into());
        let b = AttrValue::Ss(["z".to_string(), "x".to_string(), "y".to_string()].into());
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn test_number_set_sorted_by_canonical_bytes() {
        // "10.0" canonicalizes to "10" which sorts before "9" bytewise.
        let set = AttrValue::Ns(["9".to_string(), "10.0".to_string()].into());
        let decoded = decode(&encode(&set).unwrap()).unwrap();
        assert_eq!(
            decoded,
            AttrValue::Ns(["10".to_string(), "9".to_string()].into())
        );
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(matches!(decode(&[]), Err(Error::CorruptValue(_))));
    }

    #[test]
    fn test_decode_nonnull_reserved_byte() {
        let err = decode(&[0x01, b's', 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = decode(&[0x00, b'x']).unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
    }

    #[test]
    fn test_decode_short_read() {
        // Declares 4 payload bytes but provides 1.
        let err = decode(&[0x00, b's', 0, 0, 0, 4, b'a']).unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
    }

    #[test]
    fn test_decode_map_with_non_string_key() {
        let mut buf = vec![0x00, b'M', 0, 0, 0, 1];
        buf.extend_from_slice(&[0x00, 0x00]); // null where a key belongs
        buf.extend_from_slice(&[0x00, 0x00]);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
    }
}
