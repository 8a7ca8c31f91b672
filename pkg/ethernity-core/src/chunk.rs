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

//! Chunker (spec §4.3): splits a payload into N frames of near-equal size
//! and reassembles them in any order, tolerating byte-identical duplicates.

use std::collections::HashMap;

use crate::{
    error::Error,
    frame::{Frame, FrameType, DOC_ID_LEN},
};

/// Splits `payload` into `ceil(len / chunk_size)` frames. The first
/// `len % total` frames carry one extra byte (stable, left-weighted).
pub fn chunk(
    payload: &[u8],
    doc_id: [u8; DOC_ID_LEN],
    frame_type: FrameType,
    chunk_size: usize,
) -> Result<Vec<Frame>, Error> {
    if payload.is_empty() {
        return Err(Error::InvalidInput("payload cannot be empty".into()));
    }
    if chunk_size == 0 {
        return Err(Error::InvalidInput("chunk_size must be positive".into()));
    }

    let total = (payload.len() + chunk_size - 1) / chunk_size;
    let base_size = payload.len() / total;
    let remainder = payload.len() % total;

    let mut frames = Vec::with_capacity(total);
    let mut offset = 0;
    for idx in 0..total {
        let size = base_size + usize::from(idx < remainder);
        let data = payload[offset..offset + size].to_vec();
        frames.push(Frame::new(frame_type, doc_id, idx as u64, total as u64, data)?);
        offset += size;
    }
    Ok(frames)
}

/// Reassembles frames in any order. Duplicate `(type, index, doc_id)`
/// triples are allowed only if byte-identical; missing indices or
/// conflicting duplicates fail, as do version/total/doc_id/type mismatches
/// across the frame set.
pub fn reassemble(
    frames: &[Frame],
    expected_doc_id: [u8; DOC_ID_LEN],
    expected_type: FrameType,
) -> Result<Vec<u8>, Error> {
    if frames.is_empty() {
        return Err(Error::InvalidInput("no frames provided".into()));
    }

    let total = frames[0].total;
    let version = frames[0].version;

    let mut by_index: HashMap<u64, &Frame> = HashMap::new();
    for frame in frames {
        if frame.doc_id != expected_doc_id {
            return Err(Error::Integrity("mismatched doc_id across frames".into()));
        }
        if frame.frame_type != expected_type {
            return Err(Error::Integrity("mismatched frame_type across frames".into()));
        }
        if frame.total != total {
            return Err(Error::Integrity("mismatched total across frames".into()));
        }
        if frame.version != version {
            return Err(Error::Integrity("mismatched version across frames".into()));
        }
        match by_index.get(&frame.index) {
            None => {
                by_index.insert(frame.index, frame);
            }
            Some(existing) => {
                if existing.data != frame.data {
                    return Err(Error::Integrity(format!(
                        "duplicate frame index {} with differing data",
                        frame.index
                    )));
                }
            }
        }
    }

    if by_index.len() as u64 != total {
        return Err(Error::Integrity(format!(
            "missing frames: have {} of {}",
            by_index.len(),
            total
        )));
    }

    let mut payload = Vec::new();
    for idx in 0..total {
        let frame = by_index
            .get(&idx)
            .expect("index count already checked against total");
        payload.extend_from_slice(&frame.data);
    }
    Ok(payload)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn roundtrip() {
        let payload = b"the quick brown fox jumps over the lazy dog".to_vec();
        let doc_id = [1u8; DOC_ID_LEN];
        let frames = chunk(&payload, doc_id, FrameType::MainDocument, 7).unwrap();
        let reassembled = reassemble(&frames, doc_id, FrameType::MainDocument).unwrap();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn order_independent() {
        let payload: Vec<u8> = (0..255u16).map(|i| (i % 256) as u8).collect();
        let doc_id = [2u8; DOC_ID_LEN];
        let mut frames = chunk(&payload, doc_id, FrameType::MainDocument, 11).unwrap();
        frames.shuffle(&mut rand::thread_rng());
        let reassembled = reassemble(&frames, doc_id, FrameType::MainDocument).unwrap();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn identical_duplicates_tolerated() {
        let payload = b"hello world".to_vec();
        let doc_id = [3u8; DOC_ID_LEN];
        let mut frames = chunk(&payload, doc_id, FrameType::MainDocument, 4).unwrap();
        let dup = frames[0].clone();
        frames.push(dup);
        let reassembled = reassemble(&frames, doc_id, FrameType::MainDocument).unwrap();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn conflicting_duplicates_rejected() {
        let doc_id = [4u8; DOC_ID_LEN];
        let mut frames = chunk(b"hello world", doc_id, FrameType::MainDocument, 4).unwrap();
        let mut conflicting = frames[0].clone();
        conflicting.data = b"XXXX".to_vec();
        frames.push(conflicting);
        assert!(reassemble(&frames, doc_id, FrameType::MainDocument).is_err());
    }

    #[test]
    fn missing_index_rejected() {
        let doc_id = [5u8; DOC_ID_LEN];
        let mut frames = chunk(b"hello world!", doc_id, FrameType::MainDocument, 3).unwrap();
        frames.remove(1);
        assert!(reassemble(&frames, doc_id, FrameType::MainDocument).is_err());
    }

    #[quickcheck_macros::quickcheck]
    fn quickcheck_roundtrip(payload: Vec<u8>, chunk_size: u8) -> bool {
        if payload.is_empty() || payload.len() > 4096 {
            return true;
        }
        let chunk_size = (chunk_size as usize).max(1);
        let doc_id = [9u8; DOC_ID_LEN];
        let frames = chunk(&payload, doc_id, FrameType::MainDocument, chunk_size).unwrap();
        reassemble(&frames, doc_id, FrameType::MainDocument).unwrap() == payload
    }
}
