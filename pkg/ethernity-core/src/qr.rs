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

//! QR capacity probe (spec §4.4): finds the largest chunk size that still
//! produces a frame whose base64 QR payload fits one QR symbol. QR image
//! rasterization itself is an external collaborator (spec §1/§6); this
//! module only needs to know whether a candidate payload *would* fit, via
//! the [`QrFit`] trait.

use crate::{
    error::Error,
    frame::{Frame, FrameType, DOC_ID_LEN},
};

pub const MAX_QR_PAYLOAD_CHARS: usize = 3_072;

/// QR generator configuration, opaque to this crate beyond what a fit
/// check needs; `error_level`/`version`/`micro`/`mask`/`boost_error` mirror
/// the fields a real QR encoder (e.g. a `qrcode`-style crate) takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QrConfig {
    pub error_level: ErrorLevel,
    pub version: Option<u8>,
    pub micro: bool,
    pub mask: Option<u8>,
    pub boost_error: bool,
}

impl Default for QrConfig {
    fn default() -> Self {
        QrConfig {
            error_level: ErrorLevel::Medium,
            version: None,
            micro: false,
            mask: None,
            boost_error: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorLevel {
    Low,
    Medium,
    Quartile,
    High,
}

/// The capability a real QR encoder provides to the probe: "would this
/// base64 payload, under this config, fit in one QR symbol?" A conservative
/// stand-in (`CharCountFit`) is provided for callers without a QR encoder
/// wired up yet; production callers pass an adapter over their encoder.
pub trait QrFit {
    fn fits(&self, payload: &str, config: &QrConfig) -> bool;
}

/// Fits purely by normalized character count against [`MAX_QR_PAYLOAD_CHARS`],
/// ignoring error-correction overhead. Conservative relative to a real QR
/// encoder (which may fit less for a given version/error level), so it never
/// reports a chunk size that the spec's hard cap would reject, but a real
/// encoder adapter should be substituted whenever rasterization is wired up.
pub struct CharCountFit;

impl QrFit for CharCountFit {
    fn fits(&self, payload: &str, _config: &QrConfig) -> bool {
        payload.len() <= MAX_QR_PAYLOAD_CHARS
    }
}

/// Base64-encodes `data` for QR transport (spec §6: standard alphabet,
/// padding stripped).
pub fn encode_qr_payload(data: &[u8]) -> String {
    crate::base64url::encode(data)
}

fn max_frame_data_len(payload_len: usize, total: usize) -> usize {
    let base = payload_len / total;
    base + usize::from(payload_len % total != 0)
}

fn fits_qr_frame(
    fit: &dyn QrFit,
    data_len: usize,
    total: u64,
    doc_id: [u8; DOC_ID_LEN],
    frame_type: FrameType,
    config: &QrConfig,
) -> bool {
    if data_len == 0 || total == 0 {
        return false;
    }
    let worst_case_data = vec![0xffu8; data_len];
    let frame = match Frame::new(frame_type, doc_id, total - 1, total, worst_case_data) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let Ok(encoded) = frame.encode() else {
        return false;
    };
    let payload = encode_qr_payload(&encoded);
    fit.fits(&payload, config)
}

/// Binary search for the largest `data_len <= upper` that still fits a QR
/// symbol, given `fits_qr_frame(1, ...)` already succeeds.
fn max_fitting_frame_data_len(
    fit: &dyn QrFit,
    upper: usize,
    total: u64,
    doc_id: [u8; DOC_ID_LEN],
    frame_type: FrameType,
    config: &QrConfig,
) -> usize {
    let mut lower = 1usize;
    let mut upper_bound = upper;
    while lower < upper_bound {
        let mid = (lower + upper_bound + 1) / 2;
        if fits_qr_frame(fit, mid, total, doc_id, frame_type, config) {
            lower = mid;
        } else {
            upper_bound = mid - 1;
        }
    }
    lower
}

/// Finds the largest `chunk_size <= preferred_chunk_size` such that every
/// resulting frame (including the index/total combination that produces the
/// largest wire overhead) still fits one QR symbol under `fit`/`config`.
/// Fails if even a single-byte payload does not fit.
pub fn choose_frame_chunk_size(
    fit: &dyn QrFit,
    payload_len: usize,
    preferred_chunk_size: usize,
    doc_id: [u8; DOC_ID_LEN],
    frame_type: FrameType,
    config: &QrConfig,
) -> Result<usize, Error> {
    if payload_len == 0 {
        return Err(Error::InvalidInput("payload_len must be positive".into()));
    }
    if preferred_chunk_size == 0 {
        return Err(Error::InvalidInput("preferred_chunk_size must be positive".into()));
    }

    let mut chunk_size = preferred_chunk_size.min(payload_len);
    loop {
        let total = ((payload_len + chunk_size - 1) / chunk_size) as u64;
        let max_data_len = max_frame_data_len(payload_len, total as usize);
        if fits_qr_frame(fit, max_data_len, total, doc_id, frame_type, config) {
            return Ok(chunk_size);
        }

        if !fits_qr_frame(fit, 1, total, doc_id, frame_type, config) {
            return Err(Error::InvalidInput(
                "QR settings cannot encode even the smallest frame payload".into(),
            ));
        }
        chunk_size = max_fitting_frame_data_len(fit, max_data_len, total, doc_id, frame_type, config);
        if chunk_size == 0 {
            return Err(Error::InvalidInput(
                "unable to select a valid chunk size for current QR settings".into(),
            ));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FixedCap(usize);

    impl QrFit for FixedCap {
        fn fits(&self, payload: &str, _config: &QrConfig) -> bool {
            payload.len() <= self.0
        }
    }

    #[test]
    fn probe_shrinks_to_fit_small_symbol() {
        let config = QrConfig::default();
        let fit = FixedCap(64);
        let chunk_size =
            choose_frame_chunk_size(&fit, 10_000, 10_000, [1u8; DOC_ID_LEN], FrameType::MainDocument, &config)
                .unwrap();
        assert!(chunk_size < 10_000);
        assert!(chunk_size > 0);
    }

    #[test]
    fn probe_returns_preferred_size_when_it_fits() {
        let config = QrConfig::default();
        let fit = CharCountFit;
        let chunk_size =
            choose_frame_chunk_size(&fit, 100, 1024, [2u8; DOC_ID_LEN], FrameType::MainDocument, &config).unwrap();
        assert_eq!(chunk_size, 100);
    }

    #[test]
    fn probe_fails_when_nothing_fits() {
        let config = QrConfig::default();
        let fit = FixedCap(0);
        assert!(
            choose_frame_chunk_size(&fit, 100, 1024, [3u8; DOC_ID_LEN], FrameType::MainDocument, &config).is_err()
        );
    }
}
