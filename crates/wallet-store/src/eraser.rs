//! Scrubbing of secret buffers.
//!
//! Passwords travel through the crate as [`Password`], a mutable byte buffer
//! that is zeroed on drop and can be zeroed early with [`Password::erase`].
//! Because the buffer is owned and mutable, erasure works on every exit path,
//! including early returns and errors.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

/// Overwrite `buf` with zeros. The write is not elided by the optimizer.
pub fn erase(buf: &mut [u8]) {
    buf.zeroize();
}

/// What to do with a password once it has been consumed by key derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Retention {
    /// Zero the buffer as soon as the key has been derived.
    #[default]
    Erase,
    /// Keep the buffer intact, e.g. to open a second store with it.
    Preserve,
}

impl Retention {
    pub(crate) fn apply(self, password: &mut Password) {
        if self == Retention::Erase {
            password.erase();
        }
    }
}

/// Password bytes supplied by the caller. Never persisted.
#[derive(Clone)]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero the buffer in place and truncate it.
    pub fn erase(&mut self) {
        self.0.zeroize();
    }

    pub fn is_erased(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// Takes over the string's allocation, so erasing the password erases the
/// caller's original bytes rather than a copy.
impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Password {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}
