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

//! Recovery pipeline (spec §4.11): the inverse of [`crate::backup`]. Takes
//! whatever frames the caller collected (QR scan, explicit payload list, or
//! fallback text) plus either a passphrase or a quorum of shard frames, and
//! reconstructs the original files.

use std::collections::BTreeMap;

use age::secrecy::Secret;

use crate::{
    chunk,
    crypto::{self, Passphrase},
    envelope,
    error::Error,
    frame::{Frame, FrameType, DOC_ID_LEN},
    hashid::{self, DOC_HASH_LEN},
    sharding::{self, KeyType, ShardPayload},
    signing::{AuthPayload, SIGN_PUB_LEN},
};

/// One file recovered from the envelope, in manifest order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredFile {
    pub path: String,
    pub data: Vec<u8>,
}

/// Whether the AUTH payload was checked, and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// An AUTH frame was present, its `doc_hash` matched, and its signature verified.
    Verified,
    /// No AUTH frame was present but `allow_unsigned` permitted skipping it.
    Skipped,
}

pub struct RecoverOutput {
    pub doc_hash: [u8; DOC_HASH_LEN],
    pub doc_id: [u8; DOC_ID_LEN],
    pub auth_status: AuthStatus,
    pub sign_pub: Option<[u8; SIGN_PUB_LEN]>,
    pub files: Vec<RecoveredFile>,
}

fn dedupe_frames(frames: &[Frame]) -> Result<Vec<Frame>, Error> {
    let mut by_key: BTreeMap<(u8, [u8; DOC_ID_LEN], u64), Frame> = BTreeMap::new();
    for frame in frames {
        let key = (frame.frame_type.tag(), frame.doc_id, frame.index);
        match by_key.get(&key) {
            None => {
                by_key.insert(key, frame.clone());
            }
            Some(existing) => {
                if existing.data != frame.data || existing.total != frame.total {
                    return Err(Error::Integrity(
                        "duplicate frame with mismatched data".into(),
                    ));
                }
            }
        }
    }
    Ok(by_key.into_values().collect())
}

fn partition_by_type(frames: &[Frame]) -> (Vec<Frame>, Vec<Frame>, Vec<Frame>) {
    let mut main = Vec::new();
    let mut auth = Vec::new();
    let mut key = Vec::new();
    for frame in frames {
        match frame.frame_type {
            FrameType::MainDocument => main.push(frame.clone()),
            FrameType::Auth => auth.push(frame.clone()),
            FrameType::KeyDocument => key.push(frame.clone()),
        }
    }
    (main, auth, key)
}

fn resolve_auth(
    auth_frames: &[Frame],
    doc_id: [u8; DOC_ID_LEN],
    doc_hash: [u8; DOC_HASH_LEN],
    allow_unsigned: bool,
    have_key_frames: bool,
) -> Result<(Option<AuthPayload>, AuthStatus), Error> {
    if auth_frames.is_empty() {
        if !allow_unsigned && !have_key_frames {
            return Err(Error::Integrity(
                "missing AUTH frame; pass allow_unsigned to skip verification".into(),
            ));
        }
        return Ok((None, AuthStatus::Skipped));
    }
    if auth_frames.len() > 1 {
        return Err(Error::Integrity("multiple AUTH frames provided".into()));
    }
    let frame = &auth_frames[0];
    if frame.doc_id != doc_id {
        return Err(Error::Integrity("AUTH frame doc_id does not match ciphertext".into()));
    }
    let payload = AuthPayload::decode(&frame.data)?;
    if payload.doc_hash != doc_hash {
        return Err(Error::Integrity("AUTH doc_hash does not match ciphertext".into()));
    }
    if !payload.verify() {
        return Err(Error::Crypto("invalid AUTH signature".into()));
    }
    Ok((Some(payload), AuthStatus::Verified))
}

fn passphrase_from_shard_frames(
    key_frames: &[Frame],
    doc_id: [u8; DOC_ID_LEN],
    expected_doc_hash: [u8; DOC_HASH_LEN],
    expected_sign_pub: Option<[u8; SIGN_PUB_LEN]>,
) -> Result<Passphrase, Error> {
    let mut shares: BTreeMap<u8, ShardPayload> = BTreeMap::new();
    let mut sign_pub = expected_sign_pub;

    for frame in key_frames {
        if frame.doc_id != doc_id {
            return Err(Error::Integrity("shard frame doc_id does not match ciphertext".into()));
        }
        let payload = ShardPayload::decode(&frame.data)?;
        if payload.key_type != KeyType::Passphrase {
            continue;
        }
        if payload.doc_hash != expected_doc_hash {
            return Err(Error::Integrity("shard doc_hash does not match ciphertext".into()));
        }
        match sign_pub {
            None => sign_pub = Some(payload.sign_pub),
            Some(expected) => {
                if payload.sign_pub != expected {
                    return Err(Error::Integrity("shard signing key does not match".into()));
                }
            }
        }
        if let Some(existing) = shares.get(&payload.share_index) {
            if existing.share != payload.share {
                return Err(Error::Sharing("duplicate shard index with mismatched data".into()));
            }
            continue;
        }
        shares.insert(payload.share_index, payload);
    }

    let share_list: Vec<ShardPayload> = shares.into_values().collect();
    if share_list.is_empty() {
        return Err(Error::Sharing("no passphrase shard payloads provided".into()));
    }
    let threshold = share_list[0].threshold;
    if share_list.len() < threshold as usize {
        return Err(Error::Sharing(format!(
            "need at least {threshold} shard(s) to recover the passphrase, have {}",
            share_list.len()
        )));
    }

    let secret = sharding::combine(&share_list, KeyType::Passphrase)?;
    let phrase = String::from_utf8(secret)
        .map_err(|_| Error::Sharing("recovered passphrase is not valid UTF-8".into()))?;
    Ok(Secret::new(phrase))
}

/// Runs the recovery pipeline described in spec §4.11. `key_frames` supplies
/// shard payloads (KEY frames); when non-empty it takes precedence over
/// `passphrase`, mirroring the caller's choice of key material.
pub fn recover(
    frames: &[Frame],
    passphrase: Option<&Passphrase>,
    allow_unsigned: bool,
) -> Result<RecoverOutput, Error> {
    if frames.is_empty() {
        return Err(Error::InvalidInput("no frames provided".into()));
    }

    let deduped = dedupe_frames(frames)?;
    let (main_frames, auth_frames, key_frames) = partition_by_type(&deduped);

    if main_frames.is_empty() {
        return Err(Error::Integrity("no MAIN frames provided".into()));
    }
    let doc_id = main_frames[0].doc_id;
    let ciphertext = chunk::reassemble(&main_frames, doc_id, FrameType::MainDocument)?;
    let (doc_hash, derived_id) = hashid::derive(&ciphertext);
    if derived_id != doc_id {
        return Err(Error::Integrity("doc_id does not match reassembled ciphertext".into()));
    }

    let (auth_payload, auth_status) =
        resolve_auth(&auth_frames, doc_id, doc_hash, allow_unsigned, !key_frames.is_empty())?;
    let sign_pub = auth_payload.as_ref().map(|p| p.sign_pub);

    let passphrase = if !key_frames.is_empty() {
        passphrase_from_shard_frames(&key_frames, doc_id, doc_hash, sign_pub)?
    } else {
        passphrase
            .cloned()
            .ok_or_else(|| Error::InvalidInput("passphrase is required for recovery".into()))?
    };

    let envelope_bytes = crypto::decrypt(&ciphertext, &passphrase)?;
    let (manifest, payload) = envelope::decode_envelope(&envelope_bytes)?;
    let parts = envelope::extract_parts(&manifest, &payload)?;

    let files = parts
        .into_iter()
        .map(|(file, data)| RecoveredFile { path: file.path, data })
        .collect();

    Ok(RecoverOutput {
        doc_hash,
        doc_id,
        auth_status,
        sign_pub,
        files,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backup::build_backup,
        envelope::PayloadPart,
        plan::{DocumentPlan, Sharding, SigningSeedMode},
        qr::{CharCountFit, QrConfig},
    };
    use rand::rngs::OsRng;

    fn parts() -> Vec<PayloadPart> {
        vec![PayloadPart {
            path: "note.txt".into(),
            data: b"hello\n".to_vec(),
            mtime: Some(1_700_000_000),
        }]
    }

    #[test]
    fn passphrase_roundtrip() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let backup = build_backup(
            &parts(),
            &plan,
            Some(Secret::new("correct horse battery staple".to_string())),
            24,
            1_700_000_000,
            4096,
            &CharCountFit,
            &QrConfig::default(),
            &mut OsRng,
        )
        .unwrap();

        let mut frames = backup.main_frames.clone();
        frames.push(backup.auth_frame.clone());
        let output = recover(&frames, Some(&backup.passphrase), false).unwrap();

        assert_eq!(output.doc_id, backup.doc_id);
        assert_eq!(output.auth_status, AuthStatus::Verified);
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].path, "note.txt");
        assert_eq!(output.files[0].data, b"hello\n");
    }

    #[test]
    fn fallback_only_recovery_matches_qr_recovery() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let backup = build_backup(
            &parts(),
            &plan,
            Some(Secret::new("correct horse battery staple".to_string())),
            24,
            1_700_000_000,
            4096,
            &CharCountFit,
            &QrConfig::default(),
            &mut OsRng,
        )
        .unwrap();

        let frames = vec![backup.main_fallback_frame.clone(), backup.auth_frame.clone()];
        let output = recover(&frames, Some(&backup.passphrase), false).unwrap();
        assert_eq!(output.files[0].data, b"hello\n");
    }

    #[test]
    fn shard_quorum_recovers_passphrase() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: Some(Sharding::new(2, 3).unwrap()),
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let backup = build_backup(
            &parts(),
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

        let mut frames = backup.main_frames.clone();
        frames.push(backup.auth_frame.clone());
        frames.push(backup.key_frames[0].clone());
        frames.push(backup.key_frames[2].clone());
        let output = recover(&frames, None, false).unwrap();
        assert_eq!(output.files[0].data, b"hello\n");
    }

    #[test]
    fn insufficient_shards_rejected() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: Some(Sharding::new(3, 5).unwrap()),
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let backup = build_backup(
            &parts(),
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

        let mut frames = backup.main_frames.clone();
        frames.push(backup.auth_frame.clone());
        frames.push(backup.key_frames[0].clone());
        frames.push(backup.key_frames[1].clone());
        assert!(recover(&frames, None, false).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_without_writing_files() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        let backup = build_backup(
            &parts(),
            &plan,
            Some(Secret::new("correct horse battery staple".to_string())),
            24,
            1_700_000_000,
            4096,
            &CharCountFit,
            &QrConfig::default(),
            &mut OsRng,
        )
        .unwrap();

        let mut tampered = backup.main_fallback_frame.clone();
        let last = tampered.data.len() - 1;
        tampered.data[last] ^= 0xff;

        let frames = vec![tampered, backup.auth_frame.clone()];
        assert!(recover(&frames, Some(&backup.passphrase), false).is_err());
    }
}
