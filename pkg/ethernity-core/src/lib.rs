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

//! Cryptographic and encoding pipeline for durable paper backups of
//! arbitrary files: envelope packing, passphrase encryption, Ed25519
//! signing, Shamir secret sharing, QR/fallback framing, and the top-level
//! backup/recover pipelines that compose them.

#![forbid(unsafe_code)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

pub mod error;

pub mod varint;
pub mod zbase32;
pub mod base64url;
pub mod cbor;
pub mod crc32;

pub mod frame;
pub mod chunk;
pub mod qr;
pub mod fallback;

pub mod hashid;
pub mod signing;
pub mod sharding;
pub mod crypto;
pub mod envelope;
pub mod plan;

pub mod backup;
pub mod recover;

pub use error::{Error, Result};
