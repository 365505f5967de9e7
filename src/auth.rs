// Copyright 2026 XLAN relay developers.
// This file is part of xlan-relay.

// xlan-relay is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// xlan-relay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with xlan-relay.  If not, see <http://www.gnu.org/licenses/>.

//! Password verification for `ConnectionInformation`.
//!
//! Derives a key with `parity_crypto::scrypt::derive_key` and compares it
//! with `parity_crypto::is_equal` rather than a plain `==`.

use parity_crypto::scrypt;

/// Wire size of `ConnectionInformation.password_verifier`.
const VERIFIER_LEN: usize = 62;
const SALT_LEN: usize = 16;

/// The salt used when a deployment does not configure its own.
///
/// The wire protocol has no channel to transmit a salt from host to
/// client before `ConnectionInformation` is sent, so a per-server random
/// salt can't be negotiated without a new handshake round trip. Using a
/// fixed salt here trades per-deployment salt uniqueness (which scrypt
/// would otherwise give each server against rainbow-table attacks) for
/// working out of the box; an embedder that wants a private salt can
/// still supply one explicitly to `PasswordVerifier::new`.
pub const DEFAULT_SALT: [u8; SALT_LEN] = *b"xlan-relay-salt!";

/// Interactive-login scrypt cost parameters (`N = 2^14, r = 8, p = 1`),
/// the same shape `ethstore`'s `Kdf::Scrypt` stores per-account.
const LOG2_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;

/// Derives and checks the 62-byte `password_verifier` slot.
///
/// An empty configured password is a wildcard: [`PasswordVerifier::verify`]
/// accepts any candidate, matching the original relay's default-open
/// behavior when no password is configured.
pub struct PasswordVerifier {
    salt: [u8; SALT_LEN],
    expected: Option<[u8; VERIFIER_LEN]>,
}

impl PasswordVerifier {
    /// Builds a verifier for `password` using a fresh random salt, or an
    /// open (always-accept) verifier when `password` is `None`/empty.
    pub fn new(password: Option<&str>, salt: [u8; SALT_LEN]) -> Self {
        let expected = match password {
            Some(p) if !p.is_empty() => Some(derive(p.as_bytes(), &salt)),
            _ => None,
        };
        PasswordVerifier { salt, expected }
    }

    pub fn salt(&self) -> [u8; SALT_LEN] {
        self.salt
    }

    /// Derives the verifier slot a client should send for `password`.
    pub fn derive_for(&self, password: &str) -> [u8; VERIFIER_LEN] {
        derive(password.as_bytes(), &self.salt)
    }

    /// Checks a received `ConnectionInformation.password_verifier` against
    /// the configured password, in constant time.
    pub fn verify(&self, candidate: &[u8; VERIFIER_LEN]) -> bool {
        match &self.expected {
            None => true,
            Some(expected) => parity_crypto::is_equal(expected, candidate),
        }
    }
}

fn derive(password: &[u8], salt: &[u8; SALT_LEN]) -> [u8; VERIFIER_LEN] {
    let (left, right) = scrypt::derive_key(password, salt, LOG2_N, R, P)
        .expect("fixed, in-range scrypt cost parameters never fail to derive");
    let mut out = [0u8; VERIFIER_LEN];
    out[..16].copy_from_slice(&left);
    out[16..32].copy_from_slice(&right);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_verifier_accepts_any_candidate() {
        let verifier = PasswordVerifier::new(None, [0u8; SALT_LEN]);
        assert!(verifier.verify(&[0xFF; VERIFIER_LEN]));
        assert!(verifier.verify(&[0u8; VERIFIER_LEN]));
    }

    #[test]
    fn matching_password_is_accepted() {
        let verifier = PasswordVerifier::new(Some("hunter2"), [7u8; SALT_LEN]);
        let candidate = verifier.derive_for("hunter2");
        assert!(verifier.verify(&candidate));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let verifier = PasswordVerifier::new(Some("hunter2"), [7u8; SALT_LEN]);
        let candidate = verifier.derive_for("wrong");
        assert!(!verifier.verify(&candidate));
    }

    #[test]
    fn empty_configured_password_is_treated_as_open() {
        let verifier = PasswordVerifier::new(Some(""), [3u8; SALT_LEN]);
        assert!(verifier.verify(&[0u8; VERIFIER_LEN]));
    }
}
