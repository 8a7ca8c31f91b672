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

//! Ed25519 signing authority (spec §4.6): domain-separated signatures over
//! the document hash (AUTH payloads) and over document hash ‖ shard index
//! ‖ share bytes (ShardPayloads).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};

use crate::{cbor::Value, error::Error, hashid::DOC_HASH_LEN, varint};

pub const AUTH_VERSION: u64 = 1;
pub const SIGN_PUB_LEN: usize = 32;
pub const SIGN_SEED_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

const AUTH_DOMAIN: &[u8] = b"ETHERNITY-AUTH-V1";
const SHARD_DOMAIN: &[u8] = b"ETHERNITY-SHARD-V1";

pub const MAX_AUTH_CBOR_BYTES: usize = 512;

/// A generated or recovered Ed25519 keypair, expressed as its raw 32-byte
/// seed and 32-byte public key. The seed is zeroized on drop (spec §5);
/// the public key is not secret.
#[derive(zeroize::ZeroizeOnDrop)]
pub struct Keypair {
    pub seed: [u8; SIGN_SEED_LEN],
    #[zeroize(skip)]
    pub public: [u8; SIGN_PUB_LEN],
}

/// Generates a fresh signing keypair from `rng`.
pub fn generate<R: CryptoRng + RngCore + ?Sized>(rng: &mut R) -> Keypair {
    let signing_key = SigningKey::generate(rng);
    Keypair {
        seed: signing_key.to_bytes(),
        public: signing_key.verifying_key().to_bytes(),
    }
}

fn signing_key_from_seed(seed: &[u8; SIGN_SEED_LEN]) -> SigningKey {
    SigningKey::from_bytes(seed)
}

fn verifying_key_from_public(public: &[u8; SIGN_PUB_LEN]) -> Result<VerifyingKey, Error> {
    VerifyingKey::from_bytes(public).map_err(|e| Error::Crypto(format!("invalid sign_pub: {e}")))
}

/// Signs `"ETHERNITY-AUTH-V1" ‖ doc_hash`.
pub fn sign_auth(doc_hash: &[u8; DOC_HASH_LEN], seed: &[u8; SIGN_SEED_LEN]) -> [u8; SIGNATURE_LEN] {
    let key = signing_key_from_seed(seed);
    let mut message = Vec::with_capacity(AUTH_DOMAIN.len() + DOC_HASH_LEN);
    message.extend_from_slice(AUTH_DOMAIN);
    message.extend_from_slice(doc_hash);
    key.sign(&message).to_bytes()
}

/// Verifies an AUTH signature. Never panics; any malformed input or
/// mismatched signature simply returns `false`.
pub fn verify_auth(
    doc_hash: &[u8; DOC_HASH_LEN],
    public: &[u8; SIGN_PUB_LEN],
    signature: &[u8; SIGNATURE_LEN],
) -> bool {
    let Ok(key) = verifying_key_from_public(public) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    let mut message = Vec::with_capacity(AUTH_DOMAIN.len() + DOC_HASH_LEN);
    message.extend_from_slice(AUTH_DOMAIN);
    message.extend_from_slice(doc_hash);
    key.verify(&message, &sig).is_ok()
}

fn shard_message(doc_hash: &[u8; DOC_HASH_LEN], shard_index: u8, share: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(SHARD_DOMAIN.len() + DOC_HASH_LEN + 5 + share.len());
    message.extend_from_slice(SHARD_DOMAIN);
    message.extend_from_slice(doc_hash);
    message.extend_from_slice(&varint::encode(shard_index as u64));
    message.extend_from_slice(share);
    message
}

/// Signs `"ETHERNITY-SHARD-V1" ‖ doc_hash ‖ uvarint(shard_index) ‖ share`.
pub fn sign_shard(
    doc_hash: &[u8; DOC_HASH_LEN],
    shard_index: u8,
    share: &[u8],
    seed: &[u8; SIGN_SEED_LEN],
) -> [u8; SIGNATURE_LEN] {
    let key = signing_key_from_seed(seed);
    key.sign(&shard_message(doc_hash, shard_index, share)).to_bytes()
}

/// Verifies a shard signature. Never panics.
pub fn verify_shard(
    doc_hash: &[u8; DOC_HASH_LEN],
    shard_index: u8,
    share: &[u8],
    public: &[u8; SIGN_PUB_LEN],
    signature: &[u8; SIGNATURE_LEN],
) -> bool {
    let Ok(key) = verifying_key_from_public(public) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    key.verify(&shard_message(doc_hash, shard_index, share), &sig).is_ok()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthPayload {
    pub doc_hash: [u8; DOC_HASH_LEN],
    pub sign_pub: [u8; SIGN_PUB_LEN],
    pub signature: [u8; SIGNATURE_LEN],
}

impl AuthPayload {
    pub fn sign(doc_hash: [u8; DOC_HASH_LEN], seed: &[u8; SIGN_SEED_LEN], public: [u8; SIGN_PUB_LEN]) -> Self {
        let signature = sign_auth(&doc_hash, seed);
        AuthPayload {
            doc_hash,
            sign_pub: public,
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        verify_auth(&self.doc_hash, &self.sign_pub, &self.signature)
    }

    /// Encodes as a plain CBOR array `[version, doc_hash, sign_pub, signature]`.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let value = Value::Array(vec![
            Value::Uint(AUTH_VERSION),
            Value::Bytes(self.doc_hash.to_vec()),
            Value::Bytes(self.sign_pub.to_vec()),
            Value::Bytes(self.signature.to_vec()),
        ]);
        let encoded = crate::cbor::encode(&value);
        if encoded.len() > MAX_AUTH_CBOR_BYTES {
            return Err(Error::bounds("AUTH CBOR payload", MAX_AUTH_CBOR_BYTES, encoded.len()));
        }
        Ok(encoded)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > MAX_AUTH_CBOR_BYTES {
            return Err(Error::bounds("AUTH CBOR payload", MAX_AUTH_CBOR_BYTES, bytes.len()));
        }
        let value = crate::cbor::decode(bytes)?;
        let items = value
            .as_array()
            .ok_or_else(|| Error::Codec("AUTH payload must be a CBOR array".into()))?;
        if items.len() != 4 {
            return Err(Error::Codec(format!(
                "AUTH payload must have 4 elements, got {}",
                items.len()
            )));
        }
        let version = items[0]
            .as_uint()
            .ok_or_else(|| Error::Codec("AUTH version must be a uint".into()))?;
        if version != AUTH_VERSION {
            return Err(Error::Codec(format!("unsupported AUTH version: {}", version)));
        }
        let doc_hash = fixed_bytes::<DOC_HASH_LEN>(&items[1], "doc_hash")?;
        let sign_pub = fixed_bytes::<SIGN_PUB_LEN>(&items[2], "sign_pub")?;
        let signature = fixed_bytes::<SIGNATURE_LEN>(&items[3], "signature")?;
        Ok(AuthPayload {
            doc_hash,
            sign_pub,
            signature,
        })
    }
}

fn fixed_bytes<const N: usize>(value: &Value, label: &str) -> Result<[u8; N], Error> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| Error::Codec(format!("{label} must be a CBOR byte string")))?;
    <[u8; N]>::try_from(bytes).map_err(|_| Error::Codec(format!("{label} must be {N} bytes")))
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn auth_roundtrip_and_tamper_detection() {
        let keypair = generate(&mut OsRng);
        let doc_hash = [7u8; DOC_HASH_LEN];
        let sig = sign_auth(&doc_hash, &keypair.seed);
        assert!(verify_auth(&doc_hash, &keypair.public, &sig));

        let mut bad_hash = doc_hash;
        bad_hash[0] ^= 0xff;
        assert!(!verify_auth(&bad_hash, &keypair.public, &sig));

        let mut bad_pub = keypair.public;
        bad_pub[0] ^= 0xff;
        assert!(!verify_auth(&doc_hash, &bad_pub, &sig));

        let mut bad_sig = sig;
        bad_sig[0] ^= 0xff;
        assert!(!verify_auth(&doc_hash, &keypair.public, &bad_sig));
    }

    #[test]
    fn shard_signature_binds_index_and_share() {
        let keypair = generate(&mut OsRng);
        let doc_hash = [1u8; DOC_HASH_LEN];
        let share = b"0123456789abcdef";
        let sig = sign_shard(&doc_hash, 1, share, &keypair.seed);
        assert!(verify_shard(&doc_hash, 1, share, &keypair.public, &sig));
        assert!(!verify_shard(&doc_hash, 2, share, &keypair.public, &sig));
    }

    #[test]
    fn auth_payload_roundtrip() {
        let keypair = generate(&mut OsRng);
        let payload = AuthPayload::sign([3u8; DOC_HASH_LEN], &keypair.seed, keypair.public);
        assert!(payload.verify());
        let encoded = payload.encode().unwrap();
        let decoded = AuthPayload::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn auth_payload_rejects_truncated_array() {
        let value = Value::Array(vec![Value::Uint(1), Value::Bytes(vec![0u8; 32])]);
        let encoded = crate::cbor::encode(&value);
        assert!(AuthPayload::decode(&encoded).is_err());
    }
}
