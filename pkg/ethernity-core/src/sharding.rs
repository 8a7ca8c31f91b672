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

//! ShardPayload (spec §3/§4.7): one Shamir share of a passphrase or signing
//! seed, wrapped in canonical CBOR and bound to the document by a shard
//! signature so a tampered or mismatched share is rejected before
//! combination.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};

use crate::{
    cbor::Value,
    error::Error,
    hashid::DOC_HASH_LEN,
    signing::{self, SIGNATURE_LEN, SIGN_PUB_LEN, SIGN_SEED_LEN},
};

pub const SHARD_VERSION: u64 = 1;
pub const BLOCK_SIZE: usize = ethernity_shamir::BLOCK_SIZE;
pub const MAX_SHARES: u8 = ethernity_shamir::MAX_SHARES;
pub const MAX_SHARD_CBOR_BYTES: usize = 2_048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    Passphrase,
    SigningSeed,
}

impl KeyType {
    fn as_str(self) -> &'static str {
        match self {
            KeyType::Passphrase => "passphrase",
            KeyType::SigningSeed => "signing-seed",
        }
    }

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "passphrase" => Ok(KeyType::Passphrase),
            "signing-seed" => Ok(KeyType::SigningSeed),
            other => Err(Error::Codec(format!("unsupported shard key type: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardPayload {
    pub key_type: KeyType,
    pub threshold: u8,
    pub share_count: u8,
    pub share_index: u8,
    pub secret_len: u64,
    pub share: Vec<u8>,
    pub doc_hash: [u8; DOC_HASH_LEN],
    pub sign_pub: [u8; SIGN_PUB_LEN],
    pub signature: [u8; SIGNATURE_LEN],
}

impl ShardPayload {
    pub fn verify(&self) -> bool {
        signing::verify_shard(&self.doc_hash, self.share_index, &self.share, &self.sign_pub, &self.signature)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let value = Value::Map(vec![
            ("version".into(), Value::Uint(SHARD_VERSION)),
            ("type".into(), Value::Text(self.key_type.as_str().into())),
            ("threshold".into(), Value::Uint(self.threshold as u64)),
            ("share_count".into(), Value::Uint(self.share_count as u64)),
            ("share_index".into(), Value::Uint(self.share_index as u64)),
            ("length".into(), Value::Uint(self.secret_len)),
            ("share".into(), Value::Bytes(self.share.clone())),
            ("hash".into(), Value::Bytes(self.doc_hash.to_vec())),
            ("pub".into(), Value::Bytes(self.sign_pub.to_vec())),
            ("sig".into(), Value::Bytes(self.signature.to_vec())),
        ]);
        let encoded = crate::cbor::encode(&value);
        if encoded.len() > MAX_SHARD_CBOR_BYTES {
            return Err(Error::bounds("shard CBOR payload", MAX_SHARD_CBOR_BYTES, encoded.len()));
        }
        Ok(encoded)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > MAX_SHARD_CBOR_BYTES {
            return Err(Error::bounds("shard CBOR payload", MAX_SHARD_CBOR_BYTES, bytes.len()));
        }
        let value = crate::cbor::decode(bytes)?;
        let map = value.as_map()?;

        let version = Value::require_field(&map, "version")?
            .as_uint()
            .ok_or_else(|| Error::Codec("shard version must be a uint".into()))?;
        if version != SHARD_VERSION {
            return Err(Error::Codec(format!("unsupported shard payload version: {version}")));
        }

        let key_type = KeyType::from_str(
            Value::require_field(&map, "type")?
                .as_text()
                .ok_or_else(|| Error::Codec("shard type must be text".into()))?,
        )?;

        let threshold = require_u8(&map, "threshold")?;
        let share_count = require_u8(&map, "share_count")?;
        let share_index = require_u8(&map, "share_index")?;
        let secret_len = Value::require_field(&map, "length")?
            .as_uint()
            .ok_or_else(|| Error::Codec("shard length must be a uint".into()))?;
        let share = Value::require_field(&map, "share")?
            .as_bytes()
            .ok_or_else(|| Error::Codec("shard share must be bytes".into()))?
            .to_vec();
        let doc_hash = fixed_bytes::<DOC_HASH_LEN>(Value::require_field(&map, "hash")?, "hash")?;
        let sign_pub = fixed_bytes::<SIGN_PUB_LEN>(Value::require_field(&map, "pub")?, "pub")?;
        let signature = fixed_bytes::<SIGNATURE_LEN>(Value::require_field(&map, "sig")?, "sig")?;

        if threshold == 0 {
            return Err(Error::Sharing("shard threshold must be positive".into()));
        }
        if share_count == 0 || share_count > MAX_SHARES {
            return Err(Error::Sharing(format!("shard share_count {share_count} out of range")));
        }
        if threshold > share_count {
            return Err(Error::Sharing("shard threshold cannot exceed share_count".into()));
        }
        if share_index == 0 || share_index > share_count {
            return Err(Error::Sharing(format!("shard share_index {share_index} out of range")));
        }
        if secret_len == 0 {
            return Err(Error::Sharing("shard length must be positive".into()));
        }
        if share.is_empty() || share.len() % BLOCK_SIZE != 0 {
            return Err(Error::Sharing(format!(
                "shard share length {} is not a positive multiple of {BLOCK_SIZE}",
                share.len()
            )));
        }
        let expected_len = (((secret_len as usize) + BLOCK_SIZE - 1) / BLOCK_SIZE) * BLOCK_SIZE;
        if share.len() != expected_len {
            return Err(Error::Sharing("shard share length does not match secret length".into()));
        }

        let payload = ShardPayload {
            key_type,
            threshold,
            share_count,
            share_index,
            secret_len,
            share,
            doc_hash,
            sign_pub,
            signature,
        };
        if !payload.verify() {
            return Err(Error::Crypto("shard signature verification failed".into()));
        }
        Ok(payload)
    }
}

fn require_u8(map: &std::collections::BTreeMap<&str, &Value>, key: &str) -> Result<u8, Error> {
    let v = Value::require_field(map, key)?
        .as_uint()
        .ok_or_else(|| Error::Codec(format!("{key} must be a uint")))?;
    u8::try_from(v).map_err(|_| Error::Codec(format!("{key} must fit in a u8")))
}

fn fixed_bytes<const N: usize>(value: &Value, label: &str) -> Result<[u8; N], Error> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| Error::Codec(format!("shard {label} must be a CBOR byte string")))?;
    <[u8; N]>::try_from(bytes).map_err(|_| Error::Codec(format!("shard {label} must be {N} bytes")))
}

/// Splits `secret` into `share_count` signed shard payloads, any `threshold`
/// of which recover it.
pub fn split<R: CryptoRng + RngCore + ?Sized>(
    key_type: KeyType,
    secret: &[u8],
    threshold: u8,
    share_count: u8,
    doc_hash: [u8; DOC_HASH_LEN],
    sign_seed: &[u8; SIGN_SEED_LEN],
    sign_pub: [u8; SIGN_PUB_LEN],
    rng: &mut R,
) -> Result<Vec<ShardPayload>, Error> {
    if secret.is_empty() {
        return Err(Error::InvalidInput("secret cannot be empty".into()));
    }
    let shares = ethernity_shamir::split(secret, threshold, share_count, rng)?;

    let mut payloads = Vec::with_capacity(shares.len());
    for (index, share) in shares {
        let signature = signing::sign_shard(&doc_hash, index, &share, sign_seed);
        payloads.push(ShardPayload {
            key_type,
            threshold,
            share_count,
            share_index: index,
            secret_len: secret.len() as u64,
            share,
            doc_hash,
            sign_pub,
            signature,
        });
    }
    Ok(payloads)
}

/// Recovers a secret from a set of already-verified shard payloads.
/// `shares` must all share the same `key_type`, `threshold`, `share_count`,
/// and `secret_len`, and contain at least `threshold` distinct indices.
pub fn combine(shares: &[ShardPayload], key_type: KeyType) -> Result<Vec<u8>, Error> {
    let first = shares
        .first()
        .ok_or_else(|| Error::Sharing("no shards provided".into()))?;
    let threshold = first.threshold;
    let share_count = first.share_count;
    let secret_len = first.secret_len;

    let mut map = BTreeMap::new();
    for shard in shares {
        if shard.key_type != key_type {
            return Err(Error::Sharing("shard key types do not match".into()));
        }
        if shard.threshold != threshold || shard.share_count != share_count {
            return Err(Error::Sharing("shard threshold/share_count mismatch".into()));
        }
        if shard.secret_len != secret_len {
            return Err(Error::Sharing("shard secret lengths do not match".into()));
        }
        if map.insert(shard.share_index, shard.share.clone()).is_some() {
            return Err(Error::Sharing(format!("duplicate shard index {}", shard.share_index)));
        }
    }

    Ok(ethernity_shamir::combine(&map, threshold, secret_len as usize)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::OsRng;

    fn keypair() -> ([u8; SIGN_PUB_LEN], [u8; SIGN_SEED_LEN]) {
        let kp = signing::generate(&mut OsRng);
        (kp.public, kp.seed)
    }

    #[test]
    fn split_combine_roundtrip() {
        let (sign_pub, sign_seed) = keypair();
        let doc_hash = [9u8; DOC_HASH_LEN];
        let secret = b"correct horse battery staple";
        let shares = split(
            KeyType::Passphrase,
            secret,
            2,
            3,
            doc_hash,
            &sign_seed,
            sign_pub,
            &mut OsRng,
        )
        .unwrap();

        for shard in &shares {
            assert!(shard.verify());
            let encoded = shard.encode().unwrap();
            let decoded = ShardPayload::decode(&encoded).unwrap();
            assert_eq!(&decoded, shard);
        }

        let subset = vec![shares[0].clone(), shares[2].clone()];
        let recovered = combine(&subset, KeyType::Passphrase).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn insufficient_shares_rejected() {
        let (sign_pub, sign_seed) = keypair();
        let shares = split(
            KeyType::SigningSeed,
            &[1u8; 32],
            3,
            5,
            [1u8; DOC_HASH_LEN],
            &sign_seed,
            sign_pub,
            &mut OsRng,
        )
        .unwrap();

        let subset = vec![shares[0].clone(), shares[1].clone()];
        assert!(combine(&subset, KeyType::SigningSeed).is_err());
    }

    #[test]
    fn tampered_shard_bytes_fail_signature_check() {
        let (sign_pub, sign_seed) = keypair();
        let shares = split(
            KeyType::Passphrase,
            b"hello world",
            2,
            3,
            [2u8; DOC_HASH_LEN],
            &sign_seed,
            sign_pub,
            &mut OsRng,
        )
        .unwrap();
        let mut encoded = shares[0].encode().unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(ShardPayload::decode(&encoded).is_err());
    }
}
