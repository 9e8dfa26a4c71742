use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "darklock";
pub const APP_NAME: &str = "wallet";
pub const DATA_DIR_ENV: &str = "WALLET_DATA_DIR";
pub const WALLET_EXTENSION: &str = "wallet";

pub fn data_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(DATA_DIR_ENV) {
        if !override_path.is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "cannot determine data directory")
    })?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn wallets_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("wallets")
}

pub fn wallet_file(data_dir: &Path, name: &str) -> PathBuf {
    wallets_dir(data_dir).join(format!("{name}.{WALLET_EXTENSION}"))
}

/// Create the data and wallet directories, owner-only on unix.
pub fn ensure_dirs(data_dir: &Path) -> Result<()> {
    let wallets = wallets_dir(data_dir);
    fs::create_dir_all(&wallets)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for dir in [data_dir, wallets.as_path()] {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// Names of the wallet files under `data_dir`, sorted.
pub fn list_wallets(data_dir: &Path) -> Result<Vec<String>> {
    let dir = wallets_dir(data_dir);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == WALLET_EXTENSION))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    Ok(names)
}
