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

//! Envelope packer (spec §3/§4.5): the manifest + concatenated-payload
//! container that gets encrypted as a whole. The manifest is canonical CBOR
//! so tampering with either the manifest bytes or the payload bytes is
//! detectable on decode.

use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::{cbor::Value, error::Error, varint};

pub const MAGIC: &[u8; 2] = b"AY";
pub const VERSION: u8 = 1;
pub const MANIFEST_VERSION: u64 = 1;
pub const SIGNING_SEED_LEN: usize = 32;

pub const MAX_MANIFEST_CBOR_BYTES: usize = 1_048_576;
pub const MAX_MANIFEST_FILES: usize = 2_048;
pub const MAX_PATH_BYTES: usize = 512;

/// One file tracked in the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: String,
    pub size: u64,
    pub hash: [u8; 32],
    pub mtime: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub version: u64,
    pub created: u64,
    pub sealed: bool,
    pub seed: Option<[u8; SIGNING_SEED_LEN]>,
    pub files: Vec<ManifestFile>,
}

impl Manifest {
    fn validate(&self) -> Result<(), Error> {
        if self.version != MANIFEST_VERSION {
            return Err(Error::Codec(format!("unsupported manifest version: {}", self.version)));
        }
        if self.sealed != self.seed.is_none() {
            return Err(Error::InvalidInput(
                "sealed manifests must omit the seed, unsealed manifests must include it".into(),
            ));
        }
        if self.files.is_empty() {
            return Err(Error::InvalidInput("manifest must list at least one file".into()));
        }
        if self.files.len() > MAX_MANIFEST_FILES {
            return Err(Error::bounds("manifest files", MAX_MANIFEST_FILES, self.files.len()));
        }
        for w in self.files.windows(2) {
            if w[0].path >= w[1].path {
                return Err(Error::InvalidInput("manifest files must be sorted by unique path".into()));
            }
        }
        Ok(())
    }

    fn to_cbor(&self) -> Value {
        let files = self
            .files
            .iter()
            .map(|f| {
                Value::Map(vec![
                    ("path".into(), Value::Text(f.path.clone())),
                    ("size".into(), Value::Uint(f.size)),
                    ("hash".into(), Value::Bytes(f.hash.to_vec())),
                    (
                        "mtime".into(),
                        f.mtime.map(Value::Uint).unwrap_or(Value::Null),
                    ),
                ])
            })
            .collect();
        Value::Map(vec![
            ("version".into(), Value::Uint(self.version)),
            ("created".into(), Value::Uint(self.created)),
            ("sealed".into(), Value::Bool(self.sealed)),
            (
                "seed".into(),
                self.seed.map(|s| Value::Bytes(s.to_vec())).unwrap_or(Value::Null),
            ),
            ("files".into(), Value::Array(files)),
        ])
    }

    fn from_cbor(value: &Value) -> Result<Self, Error> {
        let map = value.as_map()?;
        let version = Value::require_field(&map, "version")?
            .as_uint()
            .ok_or_else(|| Error::Codec("manifest version must be a uint".into()))?;
        let created = Value::require_field(&map, "created")?
            .as_uint()
            .ok_or_else(|| Error::Codec("manifest created must be a uint".into()))?;
        let sealed = Value::require_field(&map, "sealed")?
            .as_bool()
            .ok_or_else(|| Error::Codec("manifest sealed must be a bool".into()))?;
        let seed_value = Value::require_field(&map, "seed")?;
        let seed = match seed_value {
            Value::Null => None,
            Value::Bytes(b) => Some(
                <[u8; SIGNING_SEED_LEN]>::try_from(b.as_slice())
                    .map_err(|_| Error::Codec("manifest seed must be 32 bytes".into()))?,
            ),
            _ => return Err(Error::Codec("manifest seed must be bytes or null".into())),
        };
        let files_value = Value::require_field(&map, "files")?
            .as_array()
            .ok_or_else(|| Error::Codec("manifest files must be an array".into()))?;

        let mut files = Vec::with_capacity(files_value.len());
        for entry in files_value {
            let entry_map = entry.as_map()?;
            let path = Value::require_field(&entry_map, "path")?
                .as_text()
                .ok_or_else(|| Error::Codec("manifest file path must be text".into()))?
                .to_string();
            let size = Value::require_field(&entry_map, "size")?
                .as_uint()
                .ok_or_else(|| Error::Codec("manifest file size must be a uint".into()))?;
            let hash_bytes = Value::require_field(&entry_map, "hash")?
                .as_bytes()
                .ok_or_else(|| Error::Codec("manifest file hash must be bytes".into()))?;
            let hash = <[u8; 32]>::try_from(hash_bytes)
                .map_err(|_| Error::Codec("manifest file hash must be 32 bytes".into()))?;
            let mtime = match Value::require_field(&entry_map, "mtime")? {
                Value::Null => None,
                Value::Uint(v) => Some(*v),
                _ => return Err(Error::Codec("manifest file mtime must be a uint or null".into())),
            };
            files.push(ManifestFile { path, size, hash, mtime });
        }

        let manifest = Manifest {
            version,
            created,
            sealed,
            seed,
            files,
        };
        manifest.validate()?;
        Ok(manifest)
    }
}

/// One normalized input (path, bytes, optional mtime) handed to the packer.
#[derive(Clone, Debug)]
pub struct PayloadPart {
    pub path: String,
    pub data: Vec<u8>,
    pub mtime: Option<u64>,
}

/// Validates a manifest path per spec §4.5: relative POSIX path, forward
/// slashes, no `.`/`..` components, no leading slash, ≤ 512 UTF-8 bytes.
pub fn normalize_path(path: &str) -> Result<String, Error> {
    if path.is_empty() {
        return Err(Error::InvalidInput("path cannot be empty".into()));
    }
    if path.len() > MAX_PATH_BYTES {
        return Err(Error::bounds("manifest path", MAX_PATH_BYTES, path.len()));
    }
    if path.starts_with('/') {
        return Err(Error::InvalidInput(format!("path must not be absolute: {path}")));
    }
    if path.contains('\\') {
        return Err(Error::InvalidInput(format!("path must use forward slashes: {path}")));
    }
    for component in path.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(Error::InvalidInput(format!(
                "path must not contain empty, '.', or '..' components: {path}"
            )));
        }
    }
    Ok(path.to_string())
}

/// Builds a manifest and concatenated payload from `parts` (spec §4.5).
/// Sorts by path, rejects duplicates, hashes each part with SHA-256.
pub fn build_manifest_and_payload(
    parts: &[PayloadPart],
    sealed: bool,
    created: u64,
    signing_seed: Option<[u8; SIGNING_SEED_LEN]>,
) -> Result<(Manifest, Vec<u8>), Error> {
    if parts.is_empty() {
        return Err(Error::InvalidInput("at least one payload part is required".into()));
    }
    if sealed && signing_seed.is_some() {
        return Err(Error::InvalidInput("sealed manifests must not include a signing seed".into()));
    }
    if !sealed && signing_seed.is_none() {
        return Err(Error::InvalidInput("unsealed manifests must include a signing seed".into()));
    }

    let mut normalized: Vec<(String, &PayloadPart)> = Vec::with_capacity(parts.len());
    for part in parts {
        normalized.push((normalize_path(&part.path)?, part));
    }
    normalized.sort_by(|a, b| a.0.cmp(&b.0));

    for w in normalized.windows(2) {
        if w[0].0 == w[1].0 {
            return Err(Error::InvalidInput(format!("duplicate payload path: {}", w[1].0)));
        }
    }

    // Per-file SHA-256 has no cross-file dependency, so it can run across
    // threads (spec §5); the manifest is assembled from the results in the
    // same sorted order regardless of which thread finished first.
    let hashes: Vec<[u8; 32]> = normalized
        .par_iter()
        .map(|(_, part)| Sha256::digest(&part.data).into())
        .collect();

    let mut files = Vec::with_capacity(normalized.len());
    let mut payload = Vec::new();
    for ((path, part), hash) in normalized.iter().zip(hashes) {
        files.push(ManifestFile {
            path: path.clone(),
            size: part.data.len() as u64,
            hash,
            mtime: part.mtime,
        });
        payload.extend_from_slice(&part.data);
    }

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        created,
        sealed,
        seed: signing_seed,
        files,
    };
    manifest.validate()?;
    Ok((manifest, payload))
}

/// Encodes `"AY" ‖ uvarint(version) ‖ uvarint(len(manifest)) ‖ manifest ‖
/// uvarint(len(payload)) ‖ payload`.
pub fn encode_envelope(manifest: &Manifest, payload: &[u8]) -> Result<Vec<u8>, Error> {
    manifest.validate()?;
    let manifest_bytes = crate::cbor::encode(&manifest.to_cbor());
    if manifest_bytes.len() > MAX_MANIFEST_CBOR_BYTES {
        return Err(Error::bounds("manifest CBOR", MAX_MANIFEST_CBOR_BYTES, manifest_bytes.len()));
    }

    let mut out = Vec::with_capacity(MAGIC.len() + 10 + manifest_bytes.len() + 10 + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&varint::encode(VERSION as u64));
    out.extend_from_slice(&varint::encode(manifest_bytes.len() as u64));
    out.extend_from_slice(&manifest_bytes);
    out.extend_from_slice(&varint::encode(payload.len() as u64));
    out.extend_from_slice(payload);
    Ok(out)
}

/// Decodes an envelope, validating magic/version and both length prefixes.
pub fn decode_envelope(bytes: &[u8]) -> Result<(Manifest, Vec<u8>), Error> {
    if bytes.len() < MAGIC.len() {
        return Err(Error::Codec("envelope too short".into()));
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::Codec("bad envelope magic".into()));
    }
    let mut offset = MAGIC.len();

    let (version, n) = varint::decode(&bytes[offset..])?;
    offset += n;
    if version != VERSION as u64 {
        return Err(Error::Codec(format!("unsupported envelope version: {version}")));
    }

    let (manifest_len, n) = varint::decode(&bytes[offset..])?;
    offset += n;
    let manifest_len = usize::try_from(manifest_len)
        .map_err(|_| Error::Codec("manifest length overflow".into()))?;
    if manifest_len > MAX_MANIFEST_CBOR_BYTES {
        return Err(Error::bounds("manifest CBOR", MAX_MANIFEST_CBOR_BYTES, manifest_len));
    }
    let manifest_end = offset
        .checked_add(manifest_len)
        .ok_or_else(|| Error::Codec("manifest length overflow".into()))?;
    if manifest_end > bytes.len() {
        return Err(Error::Codec("truncated manifest".into()));
    }
    let manifest = decode_manifest(&bytes[offset..manifest_end])?;
    offset = manifest_end;

    let (payload_len, n) = varint::decode(&bytes[offset..])?;
    offset += n;
    let payload_len = usize::try_from(payload_len)
        .map_err(|_| Error::Codec("payload length overflow".into()))?;
    let payload_end = offset
        .checked_add(payload_len)
        .ok_or_else(|| Error::Codec("payload length overflow".into()))?;
    if payload_end != bytes.len() {
        return Err(Error::Codec("envelope payload length mismatch".into()));
    }

    Ok((manifest, bytes[offset..payload_end].to_vec()))
}

fn decode_manifest(bytes: &[u8]) -> Result<Manifest, Error> {
    if bytes.len() > MAX_MANIFEST_CBOR_BYTES {
        return Err(Error::bounds("manifest CBOR", MAX_MANIFEST_CBOR_BYTES, bytes.len()));
    }
    let value = crate::cbor::decode(bytes)?;
    Manifest::from_cbor(&value)
}

/// Slices `payload` by manifest order, re-verifying each file's SHA-256.
pub fn extract_parts(manifest: &Manifest, payload: &[u8]) -> Result<Vec<(ManifestFile, Vec<u8>)>, Error> {
    let mut out = Vec::with_capacity(manifest.files.len());
    let mut offset = 0usize;
    for entry in &manifest.files {
        let size = usize::try_from(entry.size).map_err(|_| Error::Codec("file size overflow".into()))?;
        let end = offset
            .checked_add(size)
            .ok_or_else(|| Error::Integrity("manifest file size overflow".into()))?;
        if end > payload.len() {
            return Err(Error::Integrity(format!(
                "manifest file {} exceeds payload size",
                entry.path
            )));
        }
        let data = &payload[offset..end];
        let hash: [u8; 32] = Sha256::digest(data).into();
        if hash != entry.hash {
            return Err(Error::Integrity(format!("sha256 mismatch for {}", entry.path)));
        }
        out.push((entry.clone(), data.to_vec()));
        offset = end;
    }
    if offset != payload.len() {
        return Err(Error::Integrity("payload length does not match manifest sizes".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn part(path: &str, data: &[u8]) -> PayloadPart {
        PayloadPart {
            path: path.to_string(),
            data: data.to_vec(),
            mtime: Some(1_700_000_000),
        }
    }

    #[test]
    fn roundtrip_sorted_and_deterministic() {
        let parts = vec![part("b.bin", b"\x00\x01"), part("a.bin", b"\xff")];
        let (manifest, payload) =
            build_manifest_and_payload(&parts, false, 1_700_000_000, Some([1u8; 32])).unwrap();
        assert_eq!(manifest.files[0].path, "a.bin");
        assert_eq!(manifest.files[1].path, "b.bin");
        assert_eq!(payload, b"\xff\x00\x01");

        let encoded = encode_envelope(&manifest, &payload).unwrap();
        let (decoded_manifest, decoded_payload) = decode_envelope(&encoded).unwrap();
        let extracted = extract_parts(&decoded_manifest, &decoded_payload).unwrap();
        assert_eq!(extracted[0].0.path, "a.bin");
        assert_eq!(extracted[0].1, b"\xff");
        assert_eq!(extracted[1].1, b"\x00\x01");
    }

    #[test]
    fn duplicate_paths_rejected() {
        let parts = vec![part("a.bin", b"1"), part("a.bin", b"2")];
        assert!(build_manifest_and_payload(&parts, false, 0, Some([0u8; 32])).is_err());
    }

    #[test]
    fn sealed_manifest_has_no_seed() {
        let parts = vec![part("a.bin", b"hello")];
        let (manifest, _) = build_manifest_and_payload(&parts, true, 0, None).unwrap();
        assert!(manifest.seed.is_none());
        assert!(manifest.sealed);
    }

    #[test]
    fn tampered_payload_fails_sha256_check() {
        let parts = vec![part("note.txt", b"hello\n")];
        let (manifest, mut payload) =
            build_manifest_and_payload(&parts, false, 0, Some([2u8; 32])).unwrap();
        payload[0] ^= 0xff;
        assert!(extract_parts(&manifest, &payload).is_err());
    }

    #[test]
    fn path_traversal_rejected() {
        assert!(normalize_path("../etc/passwd").is_err());
        assert!(normalize_path("/etc/passwd").is_err());
        assert!(normalize_path("a/./b").is_err());
        assert!(normalize_path("a//b").is_err());
        assert!(normalize_path("relative/path.txt").is_ok());
    }
}
