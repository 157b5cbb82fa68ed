//! Session stream cipher.
//!
//! Raw ChaCha20 (256-bit key, 96-bit nonce), confidentiality only — no
//! authentication tag, and the nonce is fixed for the whole session to
//! stay wire-compatible with the legacy scheme.  Key/nonce length
//! mismatches fail before any socket I/O.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;

use pairview_core::ProtocolError;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under the session key material.
pub fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    apply_keystream(key, nonce, plaintext)
}

/// Decrypt `ciphertext` under the session key material.
pub fn decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    apply_keystream(key, nonce, ciphertext)
}

// ChaCha20 is its own inverse: one keystream application for both ways.
fn apply_keystream(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if key.len() != KEY_LEN {
        return Err(ProtocolError::BadKeyLength { len: key.len() });
    }
    if nonce.len() != NONCE_LEN {
        return Err(ProtocolError::BadNonceLength { len: nonce.len() });
    }

    let mut cipher = ChaCha20::new(key.into(), nonce.into());
    let mut out = data.to_vec();
    cipher.apply_keystream(&mut out);
    Ok(out)
}
