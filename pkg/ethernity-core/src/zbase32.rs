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

//! z-base-32 codec (spec §4.1): human-tolerant, case-insensitive, ignores
//! whitespace and hyphens. MSB-first bit packing, no padding character.

use crate::error::Error;

pub const ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

fn lookup(ch: u8) -> Option<u8> {
    ALPHABET.iter().position(|&c| c == ch).map(|i| i as u8)
}

/// Encodes `data` as z-base-32, MSB-first, with the final partial group
/// left-shifted and zero-padded (no explicit padding character emitted).
pub fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }

    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);

    for &byte in data {
        bits = (bits << 8) | byte as u32;
        bit_count += 8;
        while bit_count >= 5 {
            let shift = bit_count - 5;
            let index = (bits >> shift) & 0x1f;
            out.push(ALPHABET[index as usize] as char);
            bit_count -= 5;
            bits &= (1 << bit_count) - 1;
        }
    }

    if bit_count > 0 {
        let index = (bits << (5 - bit_count)) & 0x1f;
        out.push(ALPHABET[index as usize] as char);
    }

    out
}

/// Decodes z-base-32 text, lower-casing input and skipping ASCII whitespace
/// and hyphens. Any other non-alphabet character is rejected.
pub fn decode(text: &str) -> Result<Vec<u8>, Error> {
    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut out = Vec::with_capacity(text.len() * 5 / 8 + 1);

    for ch in text.chars() {
        if ch.is_whitespace() || ch == '-' {
            continue;
        }
        let lowered = ch.to_ascii_lowercase();
        if !lowered.is_ascii() {
            return Err(Error::Codec(format!("invalid z-base-32 character: {:?}", ch)));
        }
        let value = lookup(lowered as u8)
            .ok_or_else(|| Error::Codec(format!("invalid z-base-32 character: {:?}", ch)))?;

        bits = (bits << 5) | value as u32;
        bit_count += 5;
        if bit_count >= 8 {
            let shift = bit_count - 8;
            out.push(((bits >> shift) & 0xff) as u8);
            bit_count -= 8;
            bits &= (1 << bit_count) - 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[quickcheck_macros::quickcheck]
    fn roundtrip(data: Vec<u8>) -> bool {
        decode(&encode(&data)).unwrap() == data
    }

    #[test]
    fn decode_ignores_whitespace_hyphens_and_case() {
        let data = b"hello world".to_vec();
        let encoded = encode(&data);
        let mut noisy = String::new();
        for (i, ch) in encoded.chars().enumerate() {
            if i % 3 == 0 {
                noisy.push('-');
            }
            if i % 2 == 0 {
                noisy.push(ch.to_ascii_uppercase());
            } else {
                noisy.push(ch);
            }
            noisy.push(' ');
        }
        assert_eq!(decode(&noisy).unwrap(), data);
    }

    #[test]
    fn rejects_non_alphabet_character() {
        assert!(decode("!!!!").is_err());
    }

    #[test]
    fn empty_roundtrips() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }
}
