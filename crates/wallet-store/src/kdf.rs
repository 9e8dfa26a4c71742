//! Password to key derivation.
//!
//! PBKDF2-HMAC-SHA256 with a fixed iteration count and a fixed empty salt.
//! The key is never stored, so the derivation has to be deterministic: the
//! same password must yield the same key on every open.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::eraser::{Password, Retention};

pub const KDF_ITERATIONS: u32 = 100_000;
pub const DERIVED_KEY_LEN: usize = 32;
/// Existing wallet files were written with an empty salt; changing it would
/// make them unreadable.
pub const KDF_SALT: &[u8] = b"";

/// 32-byte symmetric key. Zeroized on drop, never serialised.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
    pub(crate) fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive the store key from `password`.
///
/// Unless `retention` is [`Retention::Preserve`], the password buffer is
/// erased before this returns.
pub fn derive(password: &mut Password, retention: Retention) -> DerivedKey {
    let mut out = [0u8; DERIVED_KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut out);
    retention.apply(password);
    let key = DerivedKey(out);
    out.zeroize();
    key
}

/// Hex SHA-256 of the password, as stored in `PASSWORD_HASH`.
pub fn password_hash(password: &Password) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(Sha256::digest(password.as_bytes())))
}
