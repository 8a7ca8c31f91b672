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

//! Document identifier derivation (spec §4.9): both values depend solely on
//! the ciphertext, so they identify a backup independent of which paper
//! artifact (MAIN, AUTH, or KEY) is in hand.

use blake2::{digest::consts::U32, Blake2b, Digest};

pub const DOC_HASH_LEN: usize = 32;
pub const DOC_ID_LEN: usize = 8;

type Blake2b256 = Blake2b<U32>;

/// `BLAKE2b-256(ciphertext)`.
pub fn doc_hash(ciphertext: &[u8]) -> [u8; DOC_HASH_LEN] {
    let mut hasher = Blake2b256::new();
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// The first 8 bytes of `doc_hash`.
pub fn doc_id(doc_hash: &[u8; DOC_HASH_LEN]) -> [u8; DOC_ID_LEN] {
    let mut id = [0u8; DOC_ID_LEN];
    id.copy_from_slice(&doc_hash[..DOC_ID_LEN]);
    id
}

/// Convenience: derives both values from ciphertext in one call.
pub fn derive(ciphertext: &[u8]) -> ([u8; DOC_HASH_LEN], [u8; DOC_ID_LEN]) {
    let hash = doc_hash(ciphertext);
    let id = doc_id(&hash);
    (hash, id)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn doc_id_is_prefix_of_doc_hash() {
        let hash = doc_hash(b"some ciphertext bytes");
        let id = doc_id(&hash);
        assert_eq!(&hash[..DOC_ID_LEN], &id[..]);
    }

    #[test]
    fn depends_only_on_ciphertext() {
        let (h1, id1) = derive(b"abc");
        let (h2, id2) = derive(b"abc");
        assert_eq!(h1, h2);
        assert_eq!(id1, id2);

        let (h3, _) = derive(b"abd");
        assert_ne!(h1, h3);
    }
}
