//! wallet-store: password-encrypted secret store for wallet files
//!
//! # Module layout
//! - `eraser`   : zeroizing password buffers and the `erase` helper
//! - `kdf`      : PBKDF2-HMAC-SHA256 password to key derivation
//! - `cipher`   : XChaCha20-Poly1305 tokens and the `SealingKey` capability
//! - `schema`   : the closed set of record keys, defaults and types
//! - `atomic`   : temp-file + fsync + rename file replacement
//! - `store`    : the wallet file itself (`SecretStore`)
//! - `password` : random password generation
//! - `paths`    : data directory and wallet file locations
//! - `error`    : unified error type

pub mod atomic;
pub mod cipher;
pub mod eraser;
pub mod error;
pub mod kdf;
pub mod password;
pub mod paths;
pub mod schema;
pub mod store;

pub use eraser::{Password, Retention};
pub use error::{Result, StoreError};
pub use store::{SecretStore, Updates};
