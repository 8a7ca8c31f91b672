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

//! Backup pipeline (spec §4.11): composes the envelope packer, encryption
//! binding, signing authority, secret sharing, chunker, and QR capacity
//! probe into the single operation that turns input files into the
//! artifacts a renderer needs.

use age::secrecy::ExposeSecret;
use rand::{CryptoRng, RngCore};

use crate::{
    chunk,
    crypto::{self, Passphrase},
    envelope::{self, PayloadPart},
    error::Error,
    frame::{Frame, FrameType},
    hashid,
    plan::DocumentPlan,
    qr::{self, QrConfig, QrFit},
    sharding::{self, KeyType, ShardPayload},
    signing::{self, AuthPayload},
};

/// Everything a backup invocation produces, ready to be handed to a
/// renderer. `passphrase` is returned so the caller can display it when it
/// was auto-generated; it is never logged by this crate.
pub struct BackupOutput {
    pub doc_hash: [u8; hashid::DOC_HASH_LEN],
    pub doc_id: [u8; hashid::DOC_ID_LEN],
    pub passphrase: Passphrase,
    pub sign_pub: [u8; signing::SIGN_PUB_LEN],
    pub main_frames: Vec<Frame>,
    pub main_fallback_frame: Frame,
    pub auth_frame: Frame,
    pub auth_payload: AuthPayload,
    pub key_frames: Vec<Frame>,
    pub passphrase_shards: Vec<ShardPayload>,
    pub signing_seed_shards: Vec<ShardPayload>,
}

/// Runs the full backup pipeline described in spec §4.11, steps 1-8 (step 9,
/// rendering, is the caller's responsibility).
#[allow(clippy::too_many_arguments)]
pub fn build_backup<R: CryptoRng + RngCore + ?Sized>(
    parts: &[PayloadPart],
    plan: &DocumentPlan,
    passphrase: Option<Passphrase>,
    passphrase_words: u32,
    created: u64,
    preferred_chunk_size: usize,
    fit: &dyn QrFit,
    qr_config: &QrConfig,
    rng: &mut R,
) -> Result<BackupOutput, Error> {
    plan.validate()?;

    let keypair = signing::generate(rng);

    let signing_seed = if plan.sealed { None } else { Some(keypair.seed) };
    let (manifest, payload) = envelope::build_manifest_and_payload(parts, plan.sealed, created, signing_seed)?;
    let envelope_bytes = envelope::encode_envelope(&manifest, &payload)?;

    let passphrase = match passphrase {
        Some(p) => p,
        None => crypto::generate_passphrase(passphrase_words)?,
    };

    let ciphertext = crypto::encrypt(&envelope_bytes, &passphrase)?;
    let (doc_hash, doc_id) = hashid::derive(&ciphertext);

    let chunk_size = qr::choose_frame_chunk_size(
        fit,
        ciphertext.len(),
        preferred_chunk_size,
        doc_id,
        FrameType::MainDocument,
        qr_config,
    )?;
    let main_frames = chunk::chunk(&ciphertext, doc_id, FrameType::MainDocument, chunk_size)?;
    let main_fallback_frame = Frame::new(FrameType::MainDocument, doc_id, 0, 1, ciphertext.clone())?;

    let auth_payload = AuthPayload::sign(doc_hash, &keypair.seed, keypair.public);
    let auth_frame = Frame::new(FrameType::Auth, doc_id, 0, 1, auth_payload.encode()?)?;

    let mut key_frames = Vec::new();
    let mut passphrase_shards = Vec::new();
    let mut signing_seed_shards = Vec::new();

    if let Some(passphrase_sharding) = plan.sharding {
        passphrase_shards = sharding::split(
            KeyType::Passphrase,
            passphrase.expose_secret().as_bytes(),
            passphrase_sharding.threshold,
            passphrase_sharding.shares,
            doc_hash,
            &keypair.seed,
            keypair.public,
            rng,
        )?;
        for shard in &passphrase_shards {
            key_frames.push(Frame::new(FrameType::KeyDocument, doc_id, 0, 1, shard.encode()?)?);
        }

        if let Some(seed_sharding) = plan.signing_seed_sharding {
            signing_seed_shards = sharding::split(
                KeyType::SigningSeed,
                &keypair.seed,
                seed_sharding.threshold,
                seed_sharding.shares,
                doc_hash,
                &keypair.seed,
                keypair.public,
                rng,
            )?;
            for shard in &signing_seed_shards {
                key_frames.push(Frame::new(FrameType::KeyDocument, doc_id, 0, 1, shard.encode()?)?);
            }
        }
    }

    Ok(BackupOutput {
        doc_hash,
        doc_id,
        passphrase,
        sign_pub: keypair.public,
        main_frames,
        main_fallback_frame,
        auth_frame,
        auth_payload,
        key_frames,
        passphrase_shards,
        signing_seed_shards,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::qr::CharCountFit;
    use rand::rngs::OsRng;

    fn sample_plan() -> DocumentPlan {
        DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: crate::plan::SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        }
    }

    #[test]
    fn unsharded_backup_produces_main_and_auth() {
        let parts = vec![PayloadPart {
            path: "note.txt".into(),
            data: b"hello\n".to_vec(),
            mtime: Some(1_700_000_000),
        }];
        let output = build_backup(
            &parts,
            &sample_plan(),
            Some(age::secrecy::Secret::new("correct horse battery staple".to_string())),
            24,
            1_700_000_000,
            4096,
            &CharCountFit,
            &QrConfig::default(),
            &mut OsRng,
        )
        .unwrap();

        assert!(!output.main_frames.is_empty());
        assert!(output.key_frames.is_empty());
        assert!(output.auth_payload.verify());
        assert_eq!(output.main_fallback_frame.total, 1);
    }

    #[test]
    fn sharded_backup_produces_key_frames() {
        let parts = vec![PayloadPart {
            path: "note.txt".into(),
            data: b"hello\n".to_vec(),
            mtime: None,
        }];
        let plan = DocumentPlan {
            sealed: false,
            sharding: Some(crate::plan::Sharding::new(2, 3).unwrap()),
            signing_seed_mode: crate::plan::SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let output = build_backup(
            &parts,
            &plan,
            None,
            12,
            0,
            4096,
            &CharCountFit,
            &QrConfig::default(),
            &mut OsRng,
        )
        .unwrap();

        assert_eq!(output.key_frames.len(), 3);
        assert_eq!(output.passphrase_shards.len(), 3);
        assert!(output.signing_seed_shards.is_empty());
    }
}
