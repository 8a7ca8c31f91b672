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

//! Shamir secret sharing over `GF(2^8)`, applied independently to every byte
//! of a (zero-padded, 16-byte-block-aligned) secret.
//!
//! This mirrors `paperback-shamir`'s role as a standalone crate split out
//! from the rest of the pipeline, but the field and share shape differ:
//! `paperback` shares a single `GF(2^32)` stream, while this crate shares
//! each byte of the secret independently over `GF(2^8)`, padded up to a
//! multiple of 16 bytes so that share lengths are always block-aligned.

#![forbid(unsafe_code)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

pub mod gf;

use std::collections::BTreeMap;

use gf::GfElem;
use rand::{CryptoRng, RngCore};

pub const BLOCK_SIZE: usize = 16;
pub const MAX_SHARES: u8 = 255;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("threshold must be between 1 and share_count ({share_count}), got {threshold}")]
    InvalidThreshold { threshold: u8, share_count: u8 },

    #[error("share_count must be between 1 and {max}, got {share_count}", max = MAX_SHARES)]
    InvalidShareCount { share_count: u8 },

    #[error("need at least {threshold} shares to recover the secret, got {got}")]
    InsufficientShares { threshold: u8, got: usize },

    #[error("shares have inconsistent lengths")]
    MismatchedShareLengths,

    #[error("share length {len} is not a positive multiple of {block}", block = BLOCK_SIZE)]
    BadShareLength { len: usize },

    #[error("duplicate share index {index}")]
    DuplicateShareIndex { index: u8 },

    #[error("share index must be in 1..=255, got 0")]
    ZeroShareIndex,
}

fn padded_len(secret_len: usize) -> usize {
    ((secret_len + BLOCK_SIZE - 1) / BLOCK_SIZE) * BLOCK_SIZE
}

/// Splits `secret` into `share_count` shares, any `threshold` of which
/// recover the original bytes. Shares are indexed `1..=share_count` and are
/// all `padded_len(secret.len())` bytes long.
pub fn split<R: CryptoRng + RngCore + ?Sized>(
    secret: &[u8],
    threshold: u8,
    share_count: u8,
    rng: &mut R,
) -> Result<BTreeMap<u8, Vec<u8>>, Error> {
    if share_count == 0 || share_count > MAX_SHARES {
        return Err(Error::InvalidShareCount { share_count });
    }
    if threshold == 0 || threshold > share_count {
        return Err(Error::InvalidThreshold {
            threshold,
            share_count,
        });
    }

    let len = padded_len(secret.len());
    let mut padded = vec![0u8; len];
    padded[..secret.len()].copy_from_slice(secret);

    let mut shares: BTreeMap<u8, Vec<u8>> = (1..=share_count)
        .map(|x| (x, vec![0u8; len]))
        .collect();

    for (byte_idx, &secret_byte) in padded.iter().enumerate() {
        let mut coeffs = Vec::with_capacity(threshold as usize);
        coeffs.push(GfElem::from_u8(secret_byte));
        for _ in 1..threshold {
            coeffs.push(GfElem::new_rand(rng));
        }
        for x in 1..=share_count {
            let y = gf::eval_poly(&coeffs, GfElem::from_u8(x));
            shares.get_mut(&x).expect("share map is pre-populated")[byte_idx] = y.to_u8();
        }
    }

    use zeroize::Zeroize;
    padded.zeroize();

    Ok(shares)
}

/// Recovers a secret of exactly `secret_len` bytes from `shares` (a map of
/// share index to share bytes). At least `threshold` distinct shares with
/// matching lengths are required; the caller is responsible for having
/// already verified the authenticity of each share.
pub fn combine(shares: &BTreeMap<u8, Vec<u8>>, threshold: u8, secret_len: usize) -> Result<Vec<u8>, Error> {
    if shares.len() < threshold as usize {
        return Err(Error::InsufficientShares {
            threshold,
            got: shares.len(),
        });
    }
    for &index in shares.keys() {
        if index == 0 {
            return Err(Error::ZeroShareIndex);
        }
    }

    let mut lens = shares.values().map(|v| v.len());
    let len = lens.next().unwrap_or(0);
    if len == 0 || len % BLOCK_SIZE != 0 {
        return Err(Error::BadShareLength { len });
    }
    if lens.any(|l| l != len) {
        return Err(Error::MismatchedShareLengths);
    }

    // Only the first `threshold` distinct shares (by index order) are used;
    // this matches the spec's "combine any t of the n" contract while
    // staying deterministic for a given share set.
    let points: Vec<(u8, &Vec<u8>)> = shares
        .iter()
        .take(threshold as usize)
        .map(|(&x, ys)| (x, ys))
        .collect();

    let mut secret = vec![0u8; len];
    for byte_idx in 0..len {
        let samples: Vec<(GfElem, GfElem)> = points
            .iter()
            .map(|&(x, ys)| (GfElem::from_u8(x), GfElem::from_u8(ys[byte_idx])))
            .collect();
        secret[byte_idx] = gf::interpolate_zero(&samples).to_u8();
    }

    secret.truncate(secret_len);
    Ok(secret)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn split_combine_roundtrip() {
        let secret = b"correct horse battery staple!!";
        let shares = split(secret, 2, 3, &mut OsRng).unwrap();

        let mut subset = BTreeMap::new();
        subset.insert(1, shares[&1].clone());
        subset.insert(3, shares[&3].clone());

        let recovered = combine(&subset, 2, secret.len()).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn insufficient_shares_rejected() {
        let secret = b"hello";
        let shares = split(secret, 3, 5, &mut OsRng).unwrap();

        let mut subset = BTreeMap::new();
        subset.insert(1, shares[&1].clone());
        subset.insert(2, shares[&2].clone());

        assert!(matches!(
            combine(&subset, 3, secret.len()),
            Err(Error::InsufficientShares { .. })
        ));
    }

    #[test]
    fn every_share_is_block_aligned() {
        let shares = split(b"x", 1, 2, &mut OsRng).unwrap();
        for share in shares.values() {
            assert_eq!(share.len() % BLOCK_SIZE, 0);
            assert_eq!(share.len(), BLOCK_SIZE);
        }
    }

    #[quickcheck]
    fn any_threshold_subset_recovers(secret: Vec<u8>, seed: u8) -> bool {
        if secret.is_empty() || secret.len() > 256 {
            return true;
        }
        let threshold = 2 + (seed % 4); // 2..=5
        let share_count = threshold + 1 + (seed % 3); // > threshold
        let shares = split(&secret, threshold, share_count, &mut OsRng).unwrap();

        let subset: BTreeMap<u8, Vec<u8>> = shares
            .into_iter()
            .take(threshold as usize)
            .collect();
        combine(&subset, threshold, secret.len()).unwrap() == secret
    }
}
