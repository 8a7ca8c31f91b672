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

//! Caller-supplied backup policy (spec §3/§9). Replaces the source's
//! untyped configuration dict with a sum-typed struct validated once at the
//! API boundary, before any cryptography happens.

use crate::error::Error;

/// A Shamir `(threshold, shares)` pair, `1 ≤ threshold ≤ shares ≤ 255`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sharding {
    pub threshold: u8,
    pub shares: u8,
}

impl Sharding {
    pub fn new(threshold: u8, shares: u8) -> Result<Self, Error> {
        if threshold == 0 || shares == 0 || threshold > shares {
            return Err(Error::InvalidInput(format!(
                "sharding requires 1 <= threshold <= shares, got threshold={threshold} shares={shares}"
            )));
        }
        Ok(Sharding { threshold, shares })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningSeedMode {
    /// The signing seed is stored directly in the manifest.
    Embedded,
    /// The signing seed is itself split into shard payloads.
    Sharded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentPlan {
    pub sealed: bool,
    pub sharding: Option<Sharding>,
    pub signing_seed_mode: SigningSeedMode,
    pub signing_seed_sharding: Option<Sharding>,
}

impl DocumentPlan {
    /// Validates the invariants from spec §3:
    /// - `sealed` implies `signing_seed_mode == Embedded` and no signing-seed shard.
    /// - `signing_seed_mode == Sharded` implies passphrase sharding is enabled.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sealed {
            if self.signing_seed_mode != SigningSeedMode::Embedded {
                return Err(Error::InvalidInput(
                    "a sealed plan must use Embedded signing_seed_mode".into(),
                ));
            }
            if self.signing_seed_sharding.is_some() {
                return Err(Error::InvalidInput(
                    "a sealed plan must not shard a signing seed".into(),
                ));
            }
        }
        if self.signing_seed_mode == SigningSeedMode::Sharded {
            if self.sharding.is_none() {
                return Err(Error::InvalidInput(
                    "Sharded signing_seed_mode requires passphrase sharding to be enabled".into(),
                ));
            }
            if self.signing_seed_sharding.is_none() {
                return Err(Error::InvalidInput(
                    "Sharded signing_seed_mode requires signing_seed_sharding to be set".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sealed_with_sharded_seed_rejected() {
        let plan = DocumentPlan {
            sealed: true,
            sharding: Some(Sharding::new(2, 3).unwrap()),
            signing_seed_mode: SigningSeedMode::Sharded,
            signing_seed_sharding: Some(Sharding::new(2, 3).unwrap()),
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn sharded_seed_without_passphrase_sharding_rejected() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: SigningSeedMode::Sharded,
            signing_seed_sharding: Some(Sharding::new(2, 3).unwrap()),
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn unsealed_embedded_no_sharding_is_valid() {
        let plan = DocumentPlan {
            sealed: false,
            sharding: None,
            signing_seed_mode: SigningSeedMode::Embedded,
            signing_seed_sharding: None,
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn invalid_threshold_rejected() {
        assert!(Sharding::new(0, 3).is_err());
        assert!(Sharding::new(4, 3).is_err());
        assert!(Sharding::new(1, 1).is_ok());
    }
}
