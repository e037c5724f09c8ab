//! Wire codec for [`Value`](super::Value): the 32-byte `FilamentValue`
//! envelope, with pointer relocation into a destination arena on encode
//! and bounds-checked pointer resolution against a source buffer on
//! decode (spec.md §4.1, §6).
//!
//! Envelope layout (little-endian, 8-byte aligned, 32 bytes total):
//!
//! ```text
//! offset  size  field
//! 0       4     tag
//! 4       4     flags (reserved, zero on emission)
//! 8       16    payload (variant-specific, see below)
//! 24      8     reserved padding (zero on emission)
//! ```
//!
//! `Map` entries use `FilamentPair` (48 bytes): an 8-byte key offset,
//! 4-byte key length, 4 bytes of padding, then a nested 32-byte
//! `FilamentValue` for the entry's value. Map keys are therefore always
//! UTF-8 strings on the wire, even though the in-memory [`Value::Map`]
//! accepts arbitrary key values for callers that never serialize them.

use super::Value;
use crate::error::{Error, Result};
use crate::types::BlobHandle;
use crate::util::Arena;

/// Size in bytes of one `FilamentValue` envelope.
pub const VALUE_SIZE: usize = 32;
/// Size in bytes of one `FilamentPair` (map entry).
pub const PAIR_SIZE: usize = 48;
/// Maximum nesting depth permitted for any value (spec.md constant).
pub const MAX_RECURSION: usize = 64;

fn tag_of(bytes: &[u8; VALUE_SIZE]) -> u32 {
    u32::from_le_bytes(bytes[0..4].try_into().unwrap())
}

fn payload(bytes: &[u8; VALUE_SIZE]) -> &[u8] {
    &bytes[8..24]
}

fn build_envelope(tag: u32, payload: [u8; 16]) -> [u8; VALUE_SIZE] {
    let mut out = [0u8; VALUE_SIZE];
    out[0..4].copy_from_slice(&tag.to_le_bytes());
    // flags (4..8) and reserved padding (24..32) stay zero.
    out[8..24].copy_from_slice(&payload);
    out
}

fn payload_u64_pair(a: u64, b: u64) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0..8].copy_from_slice(&a.to_le_bytes());
    buf[8..16].copy_from_slice(&b.to_le_bytes());
    buf
}

/// Encodes `value` into a fresh 32-byte envelope, appending any nested
/// string/bytes/list/map data into `dest`. Inner pointers are relocated
/// to offsets within `dest` ("Pointer Relocation" in spec.md §4.1) — the
/// recipient can dereference them once it owns `dest`.
pub fn encode(value: &Value, dest: &mut Arena) -> Result<[u8; VALUE_SIZE]> {
    encode_inner(value, dest, 0)
}

fn encode_inner(value: &Value, dest: &mut Arena, depth: usize) -> Result<[u8; VALUE_SIZE]> {
    if depth >= MAX_RECURSION {
        return Err(Error::invalid("value exceeds maximum recursion depth"));
    }
    let envelope = match value {
        Value::Unit => build_envelope(0, [0u8; 16]),
        Value::Bool(b) => build_envelope(1, payload_u64_pair(u64::from(*b), 0)),
        Value::I64(n) => {
            let mut buf = [0u8; 16];
            buf[0..8].copy_from_slice(&n.to_le_bytes());
            build_envelope(2, buf)
        }
        Value::U64(n) => build_envelope(3, payload_u64_pair(*n, 0)),
        Value::F64(f) => {
            let mut buf = [0u8; 16];
            buf[0..8].copy_from_slice(&f.to_le_bytes());
            build_envelope(4, buf)
        }
        Value::StringView(s) => {
            let offset = dest.append(s.as_bytes());
            build_envelope(5, payload_u64_pair(offset as u64, s.len() as u64))
        }
        Value::BlobRef(handle) => build_envelope(6, payload_u64_pair(handle.as_u64(), 0)),
        Value::Map(pairs) => {
            let mut pair_bytes = Vec::with_capacity(pairs.len() * PAIR_SIZE);
            for (key, val) in pairs {
                let Value::StringView(key_str) = key else {
                    return Err(Error::type_mismatch("map keys must encode as strings"));
                };
                // Reserve the pair's slot before appending the key so the
                // key offset is stable even though we still need to
                // back-patch nothing: keys are appended directly to dest.
                let key_offset = dest.append(key_str.as_bytes());
                let value_envelope = encode_inner(val, dest, depth + 1)?;
                let mut pair = [0u8; PAIR_SIZE];
                pair[0..8].copy_from_slice(&(key_offset as u64).to_le_bytes());
                pair[8..12].copy_from_slice(&(key_str.len() as u32).to_le_bytes());
                pair[16..48].copy_from_slice(&value_envelope);
                pair_bytes.extend_from_slice(&pair);
            }
            let offset = dest.append(&pair_bytes);
            build_envelope(7, payload_u64_pair(offset as u64, pairs.len() as u64))
        }
        Value::List(items) => {
            let mut item_bytes = Vec::with_capacity(items.len() * VALUE_SIZE);
            for item in items {
                let child = encode_inner(item, dest, depth + 1)?;
                item_bytes.extend_from_slice(&child);
            }
            let offset = dest.append(&item_bytes);
            build_envelope(8, payload_u64_pair(offset as u64, items.len() as u64))
        }
        Value::Bytes(bytes) => {
            let offset = dest.append(bytes);
            build_envelope(9, payload_u64_pair(offset as u64, bytes.len() as u64))
        }
    };
    Ok(envelope)
}

/// Decodes an envelope previously read out of `source`, resolving inner
/// pointers against `source`'s own bounds (the buffer the guest module
/// provided them in, per spec.md §4.1).
pub fn decode(envelope: &[u8; VALUE_SIZE], source: &[u8]) -> Result<Value> {
    decode_inner(envelope, source, 0)
}

fn decode_inner(envelope: &[u8; VALUE_SIZE], source: &[u8], depth: usize) -> Result<Value> {
    if depth >= MAX_RECURSION {
        return Err(Error::invalid("value exceeds maximum recursion depth"));
    }
    let body = payload(envelope);
    let lo = || u64::from_le_bytes(body[0..8].try_into().unwrap());
    let hi = || u64::from_le_bytes(body[8..16].try_into().unwrap());
    match tag_of(envelope) {
        0 => Ok(Value::Unit),
        1 => Ok(Value::Bool(lo() != 0)),
        2 => Ok(Value::I64(i64::from_le_bytes(body[0..8].try_into().unwrap()))),
        3 => Ok(Value::U64(lo())),
        4 => Ok(Value::F64(f64::from_le_bytes(body[0..8].try_into().unwrap()))),
        5 => {
            let bytes = slice_checked(source, lo(), hi())?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| Error::invalid("string value is not valid UTF-8"))?;
            Ok(Value::StringView(s.to_owned()))
        }
        6 => Ok(Value::BlobRef(BlobHandle::from_raw(lo()))),
        7 => {
            let count = hi() as usize;
            let pair_bytes = slice_checked(source, lo(), (count * PAIR_SIZE) as u64)?;
            let mut pairs = Vec::with_capacity(count);
            for chunk in pair_bytes.chunks_exact(PAIR_SIZE) {
                let key_off = u64::from_le_bytes(chunk[0..8].try_into().unwrap());
                let key_len = u32::from_le_bytes(chunk[8..12].try_into().unwrap());
                let key_bytes = slice_checked(source, key_off, u64::from(key_len))?;
                let key = std::str::from_utf8(key_bytes)
                    .map_err(|_| Error::invalid("map key is not valid UTF-8"))?
                    .to_owned();
                let mut value_envelope = [0u8; VALUE_SIZE];
                value_envelope.copy_from_slice(&chunk[16..48]);
                let value = decode_inner(&value_envelope, source, depth + 1)?;
                pairs.push((Value::StringView(key), value));
            }
            Ok(Value::Map(pairs))
        }
        8 => {
            let count = hi() as usize;
            let item_bytes = slice_checked(source, lo(), (count * VALUE_SIZE) as u64)?;
            let mut items = Vec::with_capacity(count);
            for chunk in item_bytes.chunks_exact(VALUE_SIZE) {
                let mut child = [0u8; VALUE_SIZE];
                child.copy_from_slice(chunk);
                items.push(decode_inner(&child, source, depth + 1)?);
            }
            Ok(Value::List(items))
        }
        9 => {
            let bytes = slice_checked(source, lo(), hi())?;
            Ok(Value::Bytes(bytes.to_vec()))
        }
        other => Err(Error::invalid(format!("unknown value tag {other}"))),
    }
}

fn slice_checked(source: &[u8], offset: u64, len: u64) -> Result<&[u8]> {
    let offset = usize::try_from(offset).map_err(|_| Error::invalid("offset overflow"))?;
    let len = usize::try_from(len).map_err(|_| Error::invalid("length overflow"))?;
    let end = offset
        .checked_add(len)
        .ok_or_else(|| Error::invalid("pointer range overflow"))?;
    source
        .get(offset..end)
        .ok_or_else(|| Error::invalid("pointer target outside source buffer"))
}

/// Validates a URI per spec.md §6: no embedded nulls or ASCII control
/// bytes, byte-exact (no normalization), bounded length.
pub fn validate_uri(uri: &str) -> Result<()> {
    const MAX_URI_LEN: usize = 2048;
    if uri.len() > MAX_URI_LEN {
        return Err(Error::invalid("uri exceeds MAX_URI_LEN"));
    }
    if uri.bytes().any(|b| b == 0 || b.is_ascii_control()) {
        return Err(Error::invalid("uri contains a null or control byte"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) -> Value {
        let mut arena = Arena::with_capacity(0);
        let envelope = encode(&value, &mut arena).unwrap();
        decode(&envelope, arena.as_slice()).unwrap()
    }

    #[test]
    fn scalars_roundtrip() {
        assert_eq!(roundtrip(Value::Unit), Value::Unit);
        assert_eq!(roundtrip(Value::Bool(true)), Value::Bool(true));
        assert_eq!(roundtrip(Value::I64(-42)), Value::I64(-42));
        assert_eq!(roundtrip(Value::U64(42)), Value::U64(42));
        assert_eq!(roundtrip(Value::F64(3.5)), Value::F64(3.5));
    }

    #[test]
    fn string_roundtrips_through_relocation() {
        let v = Value::StringView("hello filament".to_owned());
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn bytes_roundtrip() {
        let v = Value::Bytes(vec![1, 2, 3, 4, 5]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn nested_list_roundtrips() {
        let v = Value::List(vec![Value::I64(1), Value::Bool(false), Value::Unit]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn map_with_string_keys_roundtrips() {
        let v = Value::Map(vec![(
            Value::StringView("k".to_owned()),
            Value::I64(7),
        )]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn map_with_non_string_key_is_type_error() {
        let v = Value::Map(vec![(Value::I64(1), Value::I64(7))]);
        let mut arena = Arena::with_capacity(0);
        let err = encode(&v, &mut arena).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }

    #[test]
    fn decode_rejects_out_of_bounds_pointer() {
        let envelope = build_envelope(5, payload_u64_pair(1000, 4));
        let err = decode(&envelope, b"short").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let mut arena = Arena::with_capacity(0);
        let offset = arena.append(&[0xFF, 0xFE]);
        let envelope = build_envelope(5, payload_u64_pair(offset as u64, 2));
        let err = decode(&envelope, arena.as_slice()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn depth_limit_is_enforced_on_encode() {
        let mut v = Value::Unit;
        for _ in 0..MAX_RECURSION + 1 {
            v = Value::List(vec![v]);
        }
        let mut arena = Arena::with_capacity(0);
        assert!(encode(&v, &mut arena).is_err());
    }

    #[test]
    fn uri_rejects_control_bytes() {
        assert!(validate_uri("filament/ok/topic").is_ok());
        assert!(validate_uri("filament/bad\0topic").is_err());
        assert!(validate_uri("filament/bad\ntopic").is_err());
    }
}
