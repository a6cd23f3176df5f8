// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `StateStore` for Trolley (uses platform config dir).

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use trolley_core::{StateError, StateStore};

/// Store state blobs as JSON files under the platform config directory.
pub struct FsStateStore {
    base: PathBuf,
}

impl FsStateStore {
    /// Create a store rooted at the user config directory (e.g.,
    /// `~/.config/Trolley`).
    pub fn new() -> Result<Self, StateError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Trolley")
            .ok_or_else(|| StateError::Other("could not resolve config dir".into()))?;
        Self::with_base(proj.config_dir().to_path_buf())
    }

    /// Create a store rooted at an explicit directory.
    pub fn with_base(base: PathBuf) -> Result<Self, StateError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let filename = format!("{key}.json");
        self.base.join(filename)
    }
}

impl StateStore for FsStateStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StateError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StateError::NotFound),
            Err(err) => Err(StateError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StateError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}
