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

//! Fallback text formatter and parser (spec §4.10): z-base-32 line-wrapped
//! text, OCR-font-free, for recovery when QR scanning is unavailable.

use crate::{error::Error, frame::Frame, zbase32};

pub const DEFAULT_GROUP_SIZE: usize = 4;
pub const DEFAULT_LINE_LENGTH: usize = 80;

pub const MAX_RECOVERY_TEXT_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FALLBACK_NORMALIZED_CHARS: usize = 2_000_000;
pub const MAX_FALLBACK_LINES: usize = 50_000;

const AUTH_HEADER: &str = "=== AUTH ===";
const MAIN_HEADER: &str = "=== MAIN ===";

/// Encodes `data` as z-base-32, grouped into `group_size`-character groups
/// separated by single spaces, greedily packed into lines no longer than
/// `line_length` characters. No trailing space on any line, no empty lines.
pub fn encode_lines(data: &[u8], group_size: usize, line_length: usize) -> Vec<String> {
    let encoded = zbase32::encode(data);
    let groups: Vec<&str> = encoded
        .as_bytes()
        .chunks(group_size)
        .map(|c| std::str::from_utf8(c).expect("zbase32 output is ASCII"))
        .collect();

    let mut lines = Vec::new();
    let mut current = String::new();
    for group in groups {
        let candidate_len = if current.is_empty() {
            group.len()
        } else {
            current.len() + 1 + group.len()
        };
        if candidate_len > line_length && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(group);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encodes a frame's wire bytes as fallback lines.
pub fn frame_to_fallback_lines(
    frame: &Frame,
    group_size: usize,
    line_length: usize,
) -> Result<Vec<String>, Error> {
    Ok(encode_lines(&frame.encode()?, group_size, line_length))
}

/// Builds a two-section recovery document: `=== AUTH ===` then
/// `=== MAIN ===`, separated by a blank line. `main` is a single frame
/// (`total=1`) carrying the *entire* ciphertext — independent of however
/// many QR-sized MAIN frames the backup also produced, since fallback text
/// has no per-symbol capacity limit (spec §4.10/§9).
pub fn recovery_document_lines(auth: &Frame, main: &Frame) -> Result<Vec<String>, Error> {
    let mut lines = vec![AUTH_HEADER.to_string()];
    lines.extend(frame_to_fallback_lines(auth, DEFAULT_GROUP_SIZE, DEFAULT_LINE_LENGTH)?);
    lines.push(String::new());
    lines.push(MAIN_HEADER.to_string());
    lines.extend(frame_to_fallback_lines(main, DEFAULT_GROUP_SIZE, DEFAULT_LINE_LENGTH)?);
    Ok(lines)
}

fn is_section_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() < 7 || !trimmed.starts_with("===") || !trimmed.ends_with("===") {
        return None;
    }
    let inner = trimmed[3..trimmed.len() - 3].trim();
    if inner.is_empty() {
        return None;
    }
    Some(inner)
}

#[derive(Debug, Default)]
pub struct Sections {
    pub auth: Vec<String>,
    pub main: Vec<String>,
}

/// Splits raw input lines into AUTH/MAIN sections. Input without any
/// recognized header is treated as a single MAIN section.
pub fn split_sections(lines: &[String]) -> Sections {
    let mut sections = Sections::default();
    let mut current: Option<String> = None;
    let mut saw_header = false;

    for line in lines {
        if let Some(label) = is_section_header(line) {
            saw_header = true;
            current = Some(label.to_ascii_uppercase());
            continue;
        }
        match current.as_deref() {
            Some("AUTH") => sections.auth.push(line.clone()),
            Some("MAIN") => sections.main.push(line.clone()),
            _ => {
                if !saw_header {
                    sections.main.push(line.clone());
                }
            }
        }
    }
    sections
}

fn is_valid_fallback_char(ch: char) -> bool {
    if ch.is_whitespace() || ch == '-' {
        return true;
    }
    zbase32::ALPHABET.contains(&(ch.to_ascii_lowercase() as u8)) && ch.is_ascii()
}

/// Filters out any line that is not valid fallback text, decodes the
/// concatenated characters back to bytes, and parses the result as a frame.
/// Enforces the caps from spec §4.10.
pub fn parse_frame_lines(lines: &[String]) -> Result<Frame, Error> {
    if lines.len() > MAX_FALLBACK_LINES {
        return Err(Error::bounds("fallback lines", MAX_FALLBACK_LINES, lines.len()));
    }

    let mut text = String::new();
    for line in lines {
        if line.chars().all(is_valid_fallback_char) && line.chars().any(|c| !c.is_whitespace()) {
            text.push_str(line);
        }
    }

    let normalized_chars = text.chars().filter(|c| !c.is_whitespace() && *c != '-').count();
    if normalized_chars > MAX_FALLBACK_NORMALIZED_CHARS {
        return Err(Error::bounds(
            "fallback normalized characters",
            MAX_FALLBACK_NORMALIZED_CHARS,
            normalized_chars,
        ));
    }

    let bytes = zbase32::decode(&text)?;
    Frame::decode(&bytes)
}

/// Parses a full recovery text blob (UTF-8), recognizing `=== AUTH ===` /
/// `=== MAIN ===` headers, returning the decoded AUTH frame (if present)
/// and all decoded MAIN frames.
pub fn parse_recovery_text(text: &str) -> Result<(Option<Frame>, Vec<Frame>), Error> {
    if text.len() > MAX_RECOVERY_TEXT_BYTES {
        return Err(Error::bounds("recovery text", MAX_RECOVERY_TEXT_BYTES, text.len()));
    }

    let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    let sections = split_sections(&lines);

    let auth = if sections.auth.iter().any(|l| !l.trim().is_empty()) {
        Some(parse_frame_lines(&sections.auth)?)
    } else {
        None
    };

    let main = if sections.main.iter().any(|l| !l.trim().is_empty()) {
        vec![parse_frame_lines(&sections.main)?]
    } else {
        Vec::new()
    };

    Ok((auth, main))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::{FrameType, DOC_ID_LEN};

    #[test]
    fn lines_have_no_trailing_space_or_empties() {
        let data = b"hello world, this is a longer payload to wrap across lines".to_vec();
        let lines = encode_lines(&data, 4, 16);
        for line in &lines {
            assert!(!line.is_empty());
            assert!(!line.ends_with(' '));
            assert!(line.len() <= 16);
        }
    }

    #[test]
    fn frame_fallback_roundtrip() {
        let frame = Frame::new(FrameType::MainDocument, [1u8; DOC_ID_LEN], 0, 1, b"payload".to_vec())
            .unwrap();
        let lines = frame_to_fallback_lines(&frame, DEFAULT_GROUP_SIZE, DEFAULT_LINE_LENGTH).unwrap();
        let decoded = parse_frame_lines(&lines).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn recovery_document_sections_parse_back() {
        let auth = Frame::new(FrameType::Auth, [2u8; DOC_ID_LEN], 0, 1, b"auth-data".to_vec()).unwrap();
        let main =
            Frame::new(FrameType::MainDocument, [2u8; DOC_ID_LEN], 0, 1, b"full ciphertext".to_vec())
                .unwrap();
        let lines = recovery_document_lines(&auth, &main).unwrap();
        let text = lines.join("\n");
        let sections = split_sections(&lines);
        assert_eq!(parse_frame_lines(&sections.auth).unwrap(), auth);
        assert_eq!(parse_frame_lines(&sections.main).unwrap(), main);

        let (parsed_auth, parsed_main) = parse_recovery_text(&text).unwrap();
        assert_eq!(parsed_auth.unwrap(), auth);
        assert_eq!(parsed_main, vec![main]);
    }

    #[test]
    fn unlabeled_input_is_single_main_section() {
        let frame = Frame::new(FrameType::MainDocument, [3u8; DOC_ID_LEN], 0, 1, b"x".to_vec()).unwrap();
        let lines = frame_to_fallback_lines(&frame, 4, 80).unwrap();
        let text = lines.join("\n");
        let (auth, main) = parse_recovery_text(&text).unwrap();
        assert!(auth.is_none());
        assert_eq!(main, vec![frame]);
    }

    #[test]
    fn header_detection_matches_spec() {
        assert_eq!(is_section_header("=== AUTH ==="), Some("AUTH"));
        assert_eq!(is_section_header("===MAIN==="), Some("MAIN"));
        assert_eq!(is_section_header("======"), None);
        assert_eq!(is_section_header("not a header"), None);
    }
}
