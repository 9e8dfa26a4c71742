//! Authenticated encryption of opaque byte strings.
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes. Nonce: 24 bytes (random). Tag: 16 bytes.
//!
//! Token format (URL-safe base64, printable and JSON-safe):
//!   base64url( nonce (24 bytes) | ciphertext + tag )

use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::error::{Result, StoreError};
use crate::kdf::DerivedKey;

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// The only capability the store needs from a cipher.
pub trait SealingKey {
    fn seal(&self, plaintext: &[u8]) -> Result<String>;
    fn open(&self, token: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<String> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| StoreError::AuthenticationFailure)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| StoreError::AuthenticationFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(general_purpose::URL_SAFE.encode(out))
}

/// Decrypt a token produced by [`encrypt`].
///
/// Every failure (bad encoding, truncation, tampering, wrong key) maps to the
/// same [`StoreError::AuthenticationFailure`].
pub fn decrypt(key: &DerivedKey, token: &str) -> Result<Zeroizing<Vec<u8>>> {
    let data = general_purpose::URL_SAFE
        .decode(token.trim())
        .map_err(|_| StoreError::AuthenticationFailure)?;
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(StoreError::AuthenticationFailure);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| StoreError::AuthenticationFailure)?;
    let plaintext = cipher
        .decrypt(nonce, ct)
        .map_err(|_| StoreError::AuthenticationFailure)?;
    Ok(Zeroizing::new(plaintext))
}

/// A derived key bound to [`encrypt`] / [`decrypt`]. Lives as long as an
/// open store handle; the key is zeroized when this is dropped.
#[derive(Debug)]
pub struct CipherContext {
    key: DerivedKey,
}

impl CipherContext {
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }
}

impl SealingKey for CipherContext {
    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        encrypt(&self.key, plaintext)
    }

    fn open(&self, token: &str) -> Result<Zeroizing<Vec<u8>>> {
        decrypt(&self.key, token)
    }
}
