//! Per-user answers cached as plain files under `<cli home>/.git/`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Directory under the CLI home holding the cache files
pub const CACHE_DIR: &str = ".git";

/// One cached answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry {
    /// Chosen hosting platform
    Server,
    Token,
    /// `user` or `org`
    Owner,
    /// Account or organisation the repository lives under
    Login,
}

impl CacheEntry {
    pub fn file_name(&self) -> &'static str {
        match self {
            CacheEntry::Server => ".git_server",
            CacheEntry::Token => ".git_token",
            CacheEntry::Owner => ".git_own",
            CacheEntry::Login => ".git_login",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCache {
    root: PathBuf,
}

impl UserCache {
    /// Open the cache under `cli_home`, creating its directory
    pub fn open(cli_home: &Path) -> Result<Self> {
        let root = cli_home.join(CACHE_DIR);
        fs::create_dir_all(&root)?;
        Ok(UserCache { root })
    }

    pub fn path(&self, entry: CacheEntry) -> PathBuf {
        self.root.join(entry.file_name())
    }

    /// Cached value; missing and blank files read as `None`
    pub fn read(&self, entry: CacheEntry) -> Result<Option<String>> {
        let path = self.path(entry);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(path)?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    pub fn write(&self, entry: CacheEntry, value: &str) -> Result<()> {
        fs::write(self.path(entry), value)?;
        Ok(())
    }
}
