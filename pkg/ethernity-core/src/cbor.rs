/*
 * ethernity: durable paper backups of arbitrary files
 * Copyright (C) 2026 Ethernity contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! A small, self-contained canonical CBOR encoder/decoder (spec §4.1).
//!
//! Only the subset of CBOR the manifest and shard-payload wire formats
//! need: unsigned integers, byte strings, text strings, booleans, null,
//! arrays, and maps keyed by text strings. Map keys are sorted by
//! `(length, lexicographic)` order on encode; decode rejects tags,
//! indefinite-length items, and duplicate map keys, since those are the two
//! integrity-critical surfaces named in spec §9.

use std::collections::BTreeMap;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
    Null,
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the map as a lookup table, erroring on duplicate keys.
    pub fn as_map(&self) -> Result<BTreeMap<&str, &Value>, Error> {
        match self {
            Value::Map(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    if map.insert(k.as_str(), v).is_some() {
                        return Err(Error::Codec(format!("duplicate CBOR map key: {}", k)));
                    }
                }
                Ok(map)
            }
            _ => Err(Error::Codec("expected a CBOR map".into())),
        }
    }

    pub fn require_field<'a>(
        map: &BTreeMap<&'a str, &'a Value>,
        key: &str,
    ) -> Result<&'a Value, Error> {
        map.get(key)
            .copied()
            .ok_or_else(|| Error::Codec(format!("missing required CBOR map key: {}", key)))
    }
}

fn encode_head(out: &mut Vec<u8>, major: u8, value: u64) {
    let major = major << 5;
    if value < 24 {
        out.push(major | value as u8);
    } else if value <= 0xff {
        out.push(major | 24);
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(major | 25);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= 0xffff_ffff {
        out.push(major | 26);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Uint(v) => encode_head(out, 0, *v),
        Value::Bytes(b) => {
            encode_head(out, 2, b.len() as u64);
            out.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_head(out, 3, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            encode_head(out, 4, items.len() as u64);
            for item in items {
                encode_value(out, item);
            }
        }
        Value::Map(entries) => {
            let mut sorted: Vec<&(String, Value)> = entries.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| (a.len(), a.as_str()).cmp(&(b.len(), b.as_str())));
            encode_head(out, 5, sorted.len() as u64);
            for (key, val) in sorted {
                encode_value(out, &Value::Text(key.clone()));
                encode_value(out, val);
            }
        }
        Value::Bool(false) => out.push(0xf4),
        Value::Bool(true) => out.push(0xf5),
        Value::Null => out.push(0xf6),
    }
}

/// Encodes `value` in canonical form.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value(&mut out, value);
    out
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Decoder { input, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, Error> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or_else(|| Error::Codec("truncated CBOR item".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| Error::Codec("CBOR length overflow".into()))?;
        if end > self.input.len() {
            return Err(Error::Codec("truncated CBOR item".into()));
        }
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a (major type, argument) header, rejecting indefinite lengths.
    fn head(&mut self) -> Result<(u8, u64), Error> {
        let first = self.byte()?;
        let major = first >> 5;
        let info = first & 0x1f;
        let value = match info {
            0..=23 => info as u64,
            24 => self.byte()? as u64,
            25 => {
                let bytes = self.take(2)?;
                u16::from_be_bytes(bytes.try_into().unwrap()) as u64
            }
            26 => {
                let bytes = self.take(4)?;
                u32::from_be_bytes(bytes.try_into().unwrap()) as u64
            }
            27 => {
                let bytes = self.take(8)?;
                u64::from_be_bytes(bytes.try_into().unwrap())
            }
            28..=30 => return Err(Error::Codec("reserved CBOR additional info".into())),
            31 => return Err(Error::Codec("indefinite-length CBOR item rejected".into())),
            _ => unreachable!(),
        };
        // Canonical form requires the shortest encoding of the argument.
        let minimal = {
            let mut probe = Vec::new();
            encode_head(&mut probe, 0, value);
            probe.len()
        };
        let actual_len = match info {
            0..=23 => 1,
            24 => 2,
            25 => 3,
            26 => 5,
            27 => 9,
            _ => unreachable!(),
        };
        if actual_len != minimal {
            return Err(Error::Codec("non-canonical CBOR length encoding".into()));
        }
        Ok((major, value))
    }

    fn value(&mut self) -> Result<Value, Error> {
        let (major, arg) = self.head()?;
        match major {
            0 => Ok(Value::Uint(arg)),
            1 => Err(Error::Codec("negative integers are not supported".into())),
            2 => {
                let len = usize::try_from(arg)
                    .map_err(|_| Error::Codec("CBOR byte string too long".into()))?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            3 => {
                let len = usize::try_from(arg)
                    .map_err(|_| Error::Codec("CBOR text string too long".into()))?;
                let bytes = self.take(len)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| Error::Codec("CBOR text string is not valid UTF-8".into()))?;
                Ok(Value::Text(text.to_string()))
            }
            4 => {
                let len = usize::try_from(arg)
                    .map_err(|_| Error::Codec("CBOR array too long".into()))?;
                let mut items = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    items.push(self.value()?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let len = usize::try_from(arg)
                    .map_err(|_| Error::Codec("CBOR map too long".into()))?;
                let mut entries = Vec::with_capacity(len.min(4096));
                let mut seen = std::collections::HashSet::new();
                for _ in 0..len {
                    let key = match self.value()? {
                        Value::Text(s) => s,
                        _ => return Err(Error::Codec("CBOR map keys must be text strings".into())),
                    };
                    if !seen.insert(key.clone()) {
                        return Err(Error::Codec(format!("duplicate CBOR map key: {}", key)));
                    }
                    let val = self.value()?;
                    entries.push((key, val));
                }
                Ok(Value::Map(entries))
            }
            6 => Err(Error::Codec("CBOR tags are rejected".into())),
            7 => match arg {
                20 => Ok(Value::Bool(false)),
                21 => Ok(Value::Bool(true)),
                22 => Ok(Value::Null),
                _ => Err(Error::Codec("unsupported CBOR simple value".into())),
            },
            _ => unreachable!(),
        }
    }
}

/// Decodes exactly one canonical CBOR item, requiring the entire input to
/// be consumed.
pub fn decode(input: &[u8]) -> Result<Value, Error> {
    let mut decoder = Decoder::new(input);
    let value = decoder.value()?;
    if decoder.pos != input.len() {
        return Err(Error::Codec("trailing bytes after CBOR item".into()));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn map_keys_are_sorted_canonically() {
        let value = Value::Map(vec![
            ("zz".into(), Value::Uint(1)),
            ("a".into(), Value::Uint(2)),
            ("bb".into(), Value::Uint(3)),
        ]);
        let encoded = encode(&value);
        // "a" (len 1) sorts first, then "bb"/"zz" (len 2, lexicographic).
        let decoded = decode(&encoded).unwrap();
        match decoded {
            Value::Map(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["a", "bb", "zz"]);
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        // Hand-crafted map with two identical one-byte keys "a".
        let mut bytes = vec![0xa2]; // map(2)
        bytes.push(0x61);
        bytes.push(b'a'); // text(1) "a"
        bytes.push(0x01); // 1
        bytes.push(0x61);
        bytes.push(b'a'); // text(1) "a"
        bytes.push(0x02); // 2
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_indefinite_length() {
        assert!(decode(&[0x5f]).is_err()); // indefinite byte string
    }

    #[test]
    fn rejects_non_canonical_length() {
        // byte string of length 1 encoded with a 2-byte head instead of 1.
        let bytes = vec![0x58, 0x01, 0xff];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_tags() {
        assert!(decode(&[0xc0, 0x00]).is_err());
    }

    #[quickcheck_macros::quickcheck]
    fn roundtrip_bytes(data: Vec<u8>) -> bool {
        let value = Value::Bytes(data.clone());
        decode(&encode(&value)).unwrap() == Value::Bytes(data)
    }
}
