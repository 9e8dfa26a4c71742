//! The encrypted wallet file.
//!
//! The whole file is one cipher token wrapping a JSON object whose keys come
//! from [`crate::schema`]. Values of sensitive keys are sealed a second time on
//! their own, so they stay encrypted even while the outer record is decrypted
//! in memory.
//!
//! Every mutation is a single transaction: validate all pairs, read the
//! current record, apply the updates, and replace the file atomically.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::atomic;
use crate::cipher::{CipherContext, SealingKey};
use crate::eraser::{Password, Retention};
use crate::error::{Result, StoreError};
use crate::kdf::{self, password_hash};
use crate::schema::{self, PASSWORD_HASH};

type Record = Map<String, Value>;

/// A batch of key/value pairs written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct Updates(Map<String, Value>);

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, converting the value to JSON right away so conversion
    /// errors surface before any file is touched.
    pub fn insert<V>(&mut self, key: impl Into<String>, value: &V) -> Result<&mut Self>
    where
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.0.insert(key.into(), value);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Updates {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Updates {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Handle on an open wallet file.
///
/// A handle is meant for one owner at a time. There is no file locking:
/// two handles writing to the same path (from any threads or processes) race,
/// and the last writer wins. Callers that share a wallet file must serialise
/// access themselves.
///
/// The derived key lives inside the handle and is zeroized on
/// [`SecretStore::close`] or drop.
#[derive(Debug)]
pub struct SecretStore {
    path: PathBuf,
    cipher: Option<CipherContext>,
}

impl SecretStore {
    /// Open (or initialise, if empty) the store at `path`. The password is
    /// erased before this returns.
    pub fn open(path: impl AsRef<Path>, password: &mut Password) -> Result<Self> {
        Self::open_with(path, password, Retention::Erase)
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        password: &mut Password,
        retention: Retention,
    ) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read(path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) => {
                retention.apply(password);
                if e.kind() == io::ErrorKind::NotFound {
                    return Err(StoreError::NotFound(path.to_path_buf()));
                }
                return Err(e.into());
            }
        };

        let hash = password_hash(password);
        let cipher = CipherContext::new(kdf::derive(password, retention));
        atomic::cleanup_orphans(path);

        if contents.is_empty() {
            let mut record = schema::default_record();
            record.insert(PASSWORD_HASH.to_string(), Value::String(hash.to_string()));
            for key in schema::SENSITIVE_KEYS {
                if let Some(value) = record.get_mut(key) {
                    *value = seal_value(&cipher, value)?;
                }
            }
            persist(path, &cipher, &record)?;
            info!(path = %path.display(), "initialised new store file");
            return Ok(Self {
                path: path.to_path_buf(),
                cipher: Some(cipher),
            });
        }

        let mut record = match decode_record(&cipher, &contents) {
            Ok(record) => record,
            Err(StoreError::AuthenticationFailure) => {
                warn!(path = %path.display(), "store rejected password");
                return Err(StoreError::IncorrectPassword);
            }
            Err(e) => return Err(e),
        };

        if record.get(PASSWORD_HASH).and_then(Value::as_str) != Some(hash.as_str()) {
            record.insert(PASSWORD_HASH.to_string(), Value::String(hash.to_string()));
            persist(path, &cipher, &record)?;
            debug!(path = %path.display(), "refreshed password hash");
        }

        Ok(Self {
            path: path.to_path_buf(),
            cipher: Some(cipher),
        })
    }

    /// Create an empty store file at `path` and initialise it.
    pub fn create(
        path: impl AsRef<Path>,
        password: &mut Password,
        retention: Retention,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Err(e) = create_empty(path) {
            retention.apply(password);
            if e.kind() == io::ErrorKind::AlreadyExists {
                return Err(StoreError::AlreadyExists(path.to_path_buf()));
            }
            return Err(e.into());
        }
        let opened = Self::open_with(path, password, retention);
        discard_on_error(path, opened)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.cipher.is_some()
    }

    /// Write every pair in `updates` as one transaction.
    ///
    /// All pairs are validated first; if any fails nothing is written.
    pub fn write_values(&mut self, updates: Updates, allow_new_key: bool) -> Result<()> {
        let cipher = self.cipher()?;
        for (key, value) in updates.iter() {
            schema::validate(key, value, allow_new_key)?;
        }

        let mut record = self.load(cipher)?;
        for (key, value) in updates.0 {
            let value = if schema::is_sensitive(&key) {
                seal_value(cipher, &value)?
            } else {
                value
            };
            record.insert(key, value);
        }
        persist(&self.path, cipher, &record)?;
        debug!(path = %self.path.display(), "store record written");
        Ok(())
    }

    pub fn write_value<V>(&mut self, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let mut updates = Updates::new();
        updates.insert(key, value)?;
        self.write_values(updates, false)
    }

    /// Read one value. Sensitive values are unsealed before they are returned.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        let cipher = self.cipher()?;
        let mut record = self.load(cipher)?;
        let value = record
            .remove(key)
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))?;
        if !schema::is_sensitive(key) {
            return Ok(value);
        }
        let token = value.as_str().ok_or(StoreError::AuthenticationFailure)?;
        let plaintext = cipher.open(token)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get_value(key)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the file still decrypts under this handle's key. Never errors.
    pub fn check_password(&self) -> bool {
        match self.cipher() {
            Ok(cipher) => self.load(cipher).is_ok(),
            Err(_) => false,
        }
    }

    /// Compare `candidate` against the stored password hash without deriving
    /// a key. The candidate is erased afterwards.
    pub fn validate_password(&self, candidate: &mut Password) -> Result<bool> {
        let hash = password_hash(candidate);
        candidate.erase();
        let stored = self.get_value(PASSWORD_HASH)?;
        Ok(stored.as_str() == Some(hash.as_str()))
    }

    /// Drop the key material. Further operations fail with `StoreClosed`.
    pub fn close(&mut self) {
        if self.cipher.take().is_some() {
            debug!(path = %self.path.display(), "store closed");
        }
    }

    fn cipher(&self) -> Result<&CipherContext> {
        self.cipher.as_ref().ok_or(StoreError::StoreClosed)
    }

    fn load(&self, cipher: &impl SealingKey) -> Result<Record> {
        let contents = Zeroizing::new(fs::read(&self.path)?);
        decode_record(cipher, &contents)
    }
}

fn decode_record(cipher: &impl SealingKey, contents: &[u8]) -> Result<Record> {
    let token = std::str::from_utf8(contents).map_err(|_| StoreError::AuthenticationFailure)?;
    let plaintext = cipher.open(token)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

fn seal_value(cipher: &impl SealingKey, value: &Value) -> Result<Value> {
    let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
    Ok(Value::String(cipher.seal(&plaintext)?))
}

fn persist(path: &Path, cipher: &impl SealingKey, record: &Record) -> Result<()> {
    let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
    let token = cipher.seal(&plaintext)?;
    atomic::write_atomic(path, token.as_bytes())?;
    Ok(())
}

/// Remove a file `create` made if initialising it failed, so a retry does not
/// trip over an empty file that any password would later initialise.
fn discard_on_error<T>(path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove half-created store file");
        }
    }
    result
}

fn create_empty(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?;
    Ok(())
}
