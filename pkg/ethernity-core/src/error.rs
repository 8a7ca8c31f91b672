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

//! Error taxonomy shared across every core module (spec §7). Every variant
//! carries enough context (field, limit, index) to diagnose a failure
//! without needing to re-derive it from the byte offset.

/// The sum type every core operation returns on failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller arguments: empty payload, too many files, an illegal
    /// path, a `DocumentPlan` invariant violation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A size cap from spec §3/§4 was exceeded.
    #[error("{what} exceeds the {limit}-byte cap ({actual} bytes)")]
    Bounds {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    /// Bad magic, unsupported version, bad varint, CRC mismatch, length
    /// mismatch, invalid z-base-32/base64 character, invalid CBOR, missing
    /// map key.
    #[error("codec error: {0}")]
    Codec(String),

    /// Signature verification failed, authenticated decryption failed,
    /// malformed key material.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Insufficient shares, mismatched threshold/share_count, duplicate
    /// share index with conflicting data, bad share length, pub/hash
    /// mismatch across shares.
    #[error("secret sharing error: {0}")]
    Sharing(String),

    /// Reassembled frames conflict, manifest sha256 mismatch, payload
    /// length mismatch, duplicate frames with differing data, AUTH doc_hash
    /// mismatch.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A downgradable verification (missing/invalid AUTH under
    /// `allow_unsigned`) was skipped. Carried as a warning, not surfaced as
    /// a hard failure by `recover`, but constructible for callers that want
    /// to inspect or log the downgrade.
    #[error("policy warning: {0}")]
    Policy(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ethernity_shamir::Error> for Error {
    fn from(err: ethernity_shamir::Error) -> Self {
        Error::Sharing(err.to_string())
    }
}

impl Error {
    pub(crate) fn bounds(what: &'static str, limit: usize, actual: usize) -> Self {
        Error::Bounds { what, limit, actual }
    }
}
