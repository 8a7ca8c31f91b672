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

//! Passphrase-based authenticated encryption (spec §4.8): wraps the `age`
//! passphrase recipient rather than rolling a bespoke AEAD, and generates a
//! BIP-39 mnemonic passphrase when the caller doesn't supply one.

use std::io::{Read, Write};

use age::secrecy::{ExposeSecret, Secret, SecretString};
use bip39::{Language, Mnemonic, MnemonicType};

use crate::error::Error;

pub const MAX_CIPHERTEXT_BYTES: usize = 1_048_576;
pub const DEFAULT_PASSPHRASE_WORDS: u32 = 24;

/// A generated or caller-supplied passphrase, held so it is zeroized when
/// dropped (spec §5: secrets must not outlive the pipeline that produced
/// them).
pub type Passphrase = Secret<String>;

fn mnemonic_type(words: u32) -> Result<MnemonicType, Error> {
    match words {
        12 => Ok(MnemonicType::Words12),
        15 => Ok(MnemonicType::Words15),
        18 => Ok(MnemonicType::Words18),
        21 => Ok(MnemonicType::Words21),
        24 => Ok(MnemonicType::Words24),
        other => Err(Error::InvalidInput(format!(
            "passphrase words must be one of 12, 15, 18, 21, 24, got {other}"
        ))),
    }
}

/// Generates a fresh BIP-39 English mnemonic at the requested strength.
pub fn generate_passphrase(words: u32) -> Result<Passphrase, Error> {
    let mnemonic = Mnemonic::new(mnemonic_type(words)?, Language::English);
    Ok(Secret::new(mnemonic.phrase().to_string()))
}

/// Encrypts `envelope_bytes` under `passphrase`, producing the ciphertext
/// whose BLAKE2b-256 digest is the document hash. Rejects ciphertext over
/// the 1 MiB cap.
pub fn encrypt(envelope_bytes: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, Error> {
    let recipient_passphrase = SecretString::new(passphrase.expose_secret().clone());
    let encryptor = age::Encryptor::with_user_passphrase(recipient_passphrase);

    let mut ciphertext = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut ciphertext)
        .map_err(|e| Error::Crypto(format!("age encryption setup failed: {e}")))?;
    writer
        .write_all(envelope_bytes)
        .map_err(|e| Error::Crypto(format!("age encryption write failed: {e}")))?;
    writer
        .finish()
        .map_err(|e| Error::Crypto(format!("age encryption finalize failed: {e}")))?;

    if ciphertext.len() > MAX_CIPHERTEXT_BYTES {
        return Err(Error::bounds("ciphertext", MAX_CIPHERTEXT_BYTES, ciphertext.len()));
    }
    Ok(ciphertext)
}

/// Decrypts `ciphertext` under `passphrase`. Any authentication failure
/// (wrong passphrase or corrupted ciphertext) returns `Error::Crypto`.
pub fn decrypt(ciphertext: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, Error> {
    if ciphertext.len() > MAX_CIPHERTEXT_BYTES {
        return Err(Error::bounds("ciphertext", MAX_CIPHERTEXT_BYTES, ciphertext.len()));
    }

    let decryptor = match age::Decryptor::new(ciphertext)
        .map_err(|e| Error::Crypto(format!("age decryption setup failed: {e}")))?
    {
        age::Decryptor::Passphrase(d) => d,
        _ => return Err(Error::Crypto("ciphertext is not passphrase-encrypted".into())),
    };

    let recipient_passphrase = SecretString::new(passphrase.expose_secret().clone());
    let mut reader = decryptor
        .decrypt(&recipient_passphrase, None)
        .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))?;

    let mut envelope_bytes = Vec::new();
    reader
        .read_to_end(&mut envelope_bytes)
        .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))?;
    Ok(envelope_bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_with_supplied_passphrase() {
        let passphrase = Secret::new("correct horse battery staple".to_string());
        let ciphertext = encrypt(b"hello ethernity", &passphrase).unwrap();
        let plaintext = decrypt(&ciphertext, &passphrase).unwrap();
        assert_eq!(plaintext, b"hello ethernity");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let passphrase = Secret::new("right passphrase".to_string());
        let ciphertext = encrypt(b"secret data", &passphrase).unwrap();
        let wrong = Secret::new("wrong passphrase".to_string());
        assert!(decrypt(&ciphertext, &wrong).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let passphrase = Secret::new("another passphrase".to_string());
        let mut ciphertext = encrypt(b"payload", &passphrase).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;
        assert!(decrypt(&ciphertext, &passphrase).is_err());
    }

    #[test]
    fn generated_mnemonic_has_requested_word_count() {
        for (words, expected_count) in [(12, 12), (15, 15), (18, 18), (21, 21), (24, 24)] {
            let passphrase = generate_passphrase(words).unwrap();
            let count = passphrase.expose_secret().split_whitespace().count();
            assert_eq!(count, expected_count);
        }
    }

    #[test]
    fn unsupported_word_count_rejected() {
        assert!(generate_passphrase(13).is_err());
    }
}
