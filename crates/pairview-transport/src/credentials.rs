//! Session credentials and derived key material.
//!
//! A hosting session generates a password + nonce pair once, lazily, the
//! first time credentials are requested; the client learns both through
//! the authentication handshake.  Either way the pair resolves into one
//! [`SessionCrypto`] used uniformly by every channel regardless of role.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use pairview_core::ProtocolError;

use crate::crypto::{self, KEY_LEN, NONCE_LEN};

pub const PASSWORD_LEN: usize = 12;

// MARK: - SessionCredentials

/// The shared secret a hosting session displays to its user, plus the
/// nonce handed out on successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub password: String,
    /// Exactly [`NONCE_LEN`] alphanumeric ASCII bytes — rides behind the
    /// acceptance token on the wire, so it must never contain a space.
    pub nonce: String,
}

impl SessionCredentials {
    pub fn generate() -> Self {
        Self::with_password(random_ascii(PASSWORD_LEN))
    }

    /// Fixed password, fresh nonce.  Used by tests and by UIs that let the
    /// user pick the password.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            nonce: random_ascii(NONCE_LEN),
        }
    }

    pub fn crypto(&self) -> Result<SessionCrypto, ProtocolError> {
        SessionCrypto::derive(&self.password, &self.nonce)
    }
}

fn random_ascii(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// MARK: - SessionCrypto

/// Resolved key material, immutable for the lifetime of one session.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionCrypto {
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
}

impl SessionCrypto {
    /// key = SHA-256(password); nonce = the handshake nonce's raw bytes.
    pub fn derive(password: &str, nonce: &str) -> Result<Self, ProtocolError> {
        let nonce_bytes = nonce.as_bytes();
        if nonce_bytes.len() != NONCE_LEN {
            return Err(ProtocolError::BadNonceLength { len: nonce_bytes.len() });
        }

        let key: [u8; KEY_LEN] = Sha256::digest(password.as_bytes()).into();
        let mut fixed = [0u8; NONCE_LEN];
        fixed.copy_from_slice(nonce_bytes);
        Ok(Self { key, nonce: fixed })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        crypto::encrypt(&self.key, &self.nonce, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        crypto::decrypt(&self.key, &self.nonce, ciphertext)
    }
}

impl std::fmt::Debug for SessionCrypto {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCrypto{..}")
    }
}
