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

//! Binary frame codec (spec §3/§4.2): the on-QR/on-paper atomic unit.

use crate::{crc32, error::Error, varint};

pub const MAGIC: &[u8; 2] = b"AP";
pub const VERSION: u8 = 1;
pub const DOC_ID_LEN: usize = 8;
const CRC_LEN: usize = 4;

pub const MAX_MAIN_FRAME_DATA_BYTES: usize = 1_048_576;
pub const MAX_AUTH_FRAME_DATA_BYTES: usize = 512;
pub const MAX_KEY_FRAME_DATA_BYTES: usize = 2_048;
/// Soft cap on MAIN frame count for chunked QR transport (not in spec.md's
/// core invariants, but enforced by the original implementation's framing
/// module to bound pathological chunk counts).
pub const MAX_MAIN_FRAME_TOTAL: u64 = 4_096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    MainDocument,
    KeyDocument,
    Auth,
}

impl FrameType {
    pub fn tag(self) -> u8 {
        match self {
            FrameType::MainDocument => 0x44,
            FrameType::KeyDocument => 0x4b,
            FrameType::Auth => 0x41,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0x44 => Ok(FrameType::MainDocument),
            0x4b => Ok(FrameType::KeyDocument),
            0x41 => Ok(FrameType::Auth),
            other => Err(Error::Codec(format!("unsupported frame type: 0x{:02x}", other))),
        }
    }

    fn max_data_len(self) -> usize {
        match self {
            FrameType::MainDocument => MAX_MAIN_FRAME_DATA_BYTES,
            FrameType::Auth => MAX_AUTH_FRAME_DATA_BYTES,
            FrameType::KeyDocument => MAX_KEY_FRAME_DATA_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub frame_type: FrameType,
    pub doc_id: [u8; DOC_ID_LEN],
    pub index: u64,
    pub total: u64,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(
        frame_type: FrameType,
        doc_id: [u8; DOC_ID_LEN],
        index: u64,
        total: u64,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        let frame = Frame {
            version: VERSION,
            frame_type,
            doc_id,
            index,
            total,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.version != VERSION {
            return Err(Error::Codec(format!(
                "unsupported frame version: {}",
                self.version
            )));
        }
        if self.total == 0 {
            return Err(Error::InvalidInput("frame total must be >= 1".into()));
        }
        if self.index >= self.total {
            return Err(Error::InvalidInput(format!(
                "frame index {} must be < total {}",
                self.index, self.total
            )));
        }
        match self.frame_type {
            FrameType::Auth | FrameType::KeyDocument => {
                if self.total != 1 || self.index != 0 {
                    return Err(Error::InvalidInput(
                        "AUTH/KEY frames must be single-frame payloads (index=0,total=1)".into(),
                    ));
                }
            }
            FrameType::MainDocument => {
                if self.total > MAX_MAIN_FRAME_TOTAL {
                    return Err(Error::bounds(
                        "MAIN frame total",
                        MAX_MAIN_FRAME_TOTAL as usize,
                        self.total as usize,
                    ));
                }
            }
        }
        let cap = self.frame_type.max_data_len();
        if self.data.len() > cap {
            return Err(Error::bounds("frame data", cap, self.data.len()));
        }
        Ok(())
    }

    /// Encodes the frame per spec §3:
    /// `"AP" ‖ uvarint(version) ‖ byte(frame_type) ‖ doc_id ‖ uvarint(index)
    /// ‖ uvarint(total) ‖ uvarint(len(data)) ‖ data ‖ CRC32-BE(body)`.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;

        let mut body = Vec::with_capacity(MAGIC.len() + 16 + DOC_ID_LEN + self.data.len());
        body.extend_from_slice(MAGIC);
        body.extend_from_slice(&varint::encode(self.version as u64));
        body.push(self.frame_type.tag());
        body.extend_from_slice(&self.doc_id);
        body.extend_from_slice(&varint::encode(self.index));
        body.extend_from_slice(&varint::encode(self.total));
        body.extend_from_slice(&varint::encode(self.data.len() as u64));
        body.extend_from_slice(&self.data);

        let crc = crc32::checksum(&body);
        body.extend_from_slice(&crc.to_be_bytes());
        Ok(body)
    }

    /// Decodes a frame, verifying magic, version, type, doc_id length,
    /// varints, exact length match, and CRC before returning.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < MAGIC.len() + CRC_LEN {
            return Err(Error::Codec("frame too short".into()));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::Codec("bad frame magic".into()));
        }
        let mut offset = MAGIC.len();

        let (version, n) = varint::decode(&bytes[offset..])?;
        offset += n;
        if version != VERSION as u64 {
            return Err(Error::Codec(format!("unsupported frame version: {}", version)));
        }

        let tag = *bytes
            .get(offset)
            .ok_or_else(|| Error::Codec("missing frame type".into()))?;
        offset += 1;
        let frame_type = FrameType::from_tag(tag)?;

        if offset + DOC_ID_LEN > bytes.len() {
            return Err(Error::Codec("missing doc_id".into()));
        }
        let mut doc_id = [0u8; DOC_ID_LEN];
        doc_id.copy_from_slice(&bytes[offset..offset + DOC_ID_LEN]);
        offset += DOC_ID_LEN;

        let (index, n) = varint::decode(&bytes[offset..])?;
        offset += n;
        let (total, n) = varint::decode(&bytes[offset..])?;
        offset += n;
        let (data_len, n) = varint::decode(&bytes[offset..])?;
        offset += n;
        let data_len = usize::try_from(data_len)
            .map_err(|_| Error::Codec("frame data length overflow".into()))?;

        if offset
            .checked_add(data_len)
            .and_then(|end| end.checked_add(CRC_LEN))
            != Some(bytes.len())
        {
            return Err(Error::Codec("frame length mismatch".into()));
        }

        let data = bytes[offset..offset + data_len].to_vec();
        offset += data_len;

        let crc_expected = u32::from_be_bytes(bytes[offset..offset + CRC_LEN].try_into().unwrap());
        let crc_actual = crc32::checksum(&bytes[..offset]);
        if crc_expected != crc_actual {
            return Err(Error::Codec("frame CRC mismatch".into()));
        }

        let frame = Frame {
            version: version as u8,
            frame_type,
            doc_id,
            index,
            total,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(FrameType::MainDocument, [7u8; DOC_ID_LEN], 0, 1, b"hello".to_vec()).unwrap()
    }

    #[test]
    fn roundtrip() {
        let frame = sample_frame();
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn single_byte_mutation_is_rejected() {
        let frame = sample_frame();
        let encoded = frame.encode().unwrap();
        for i in 0..encoded.len() {
            let mut mutated = encoded.clone();
            mutated[i] ^= 0xff;
            // CRC-32 catches every single-byte error in a body this short,
            // so every one-byte mutation must fail decode outright.
            assert!(
                Frame::decode(&mutated).is_err(),
                "mutation at byte {} decoded without error",
                i
            );
        }
    }

    #[test]
    fn auth_frame_rejects_multi_frame() {
        assert!(Frame::new(FrameType::Auth, [0u8; DOC_ID_LEN], 0, 2, vec![]).is_err());
    }

    #[test]
    fn main_frame_data_cap_enforced() {
        let data = vec![0u8; MAX_MAIN_FRAME_DATA_BYTES + 1];
        assert!(Frame::new(FrameType::MainDocument, [0u8; DOC_ID_LEN], 0, 1, data).is_err());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut encoded = sample_frame().encode().unwrap();
        encoded[0] = b'X';
        assert!(Frame::decode(&encoded).is_err());
    }
}
