/*!
 * Pager Configuration
 *
 * Defaults come from `core::limits`; a JSON file or environment variables
 * override them.
 *
 * Environment variables:
 * - PAGER_TID: task id of the pager
 * - PAGER_VFS_TID: task id of the VFS server
 * - PAGER_PHYS_PAGES: size of the physical pool in pages
 * - PAGER_TRACE_JSON: JSON log output (1/true)
 */

use super::limits::{DEFAULT_PAGER_TID, DEFAULT_PHYSICAL_PAGES, DEFAULT_VFS_TID};
use super::types::TaskId;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Runtime configuration of the pager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerConfig {
    pub pager_tid: TaskId,
    pub vfs_tid: TaskId,
    pub physical_pages: usize,
    pub trace_json: bool,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            pager_tid: DEFAULT_PAGER_TID,
            vfs_tid: DEFAULT_VFS_TID,
            physical_pages: DEFAULT_PHYSICAL_PAGES,
            trace_json: false,
        }
    }
}

impl PagerConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Load a JSON config file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env(mut self) -> Self {
        if let Some(tid) = env_value("PAGER_TID") {
            self.pager_tid = tid;
        }
        if let Some(tid) = env_value("PAGER_VFS_TID") {
            self.vfs_tid = tid;
        }
        if let Some(pages) = env_value::<usize>("PAGER_PHYS_PAGES") {
            if pages == 0 {
                warn!("Ignoring PAGER_PHYS_PAGES=0");
            } else {
                self.physical_pages = pages;
            }
        }
        if let Ok(v) = std::env::var("PAGER_TRACE_JSON") {
            self.trace_json = v == "1" || v == "true";
        }
        self
    }

    pub fn with_physical_pages(mut self, pages: usize) -> Self {
        self.physical_pages = pages;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physical_pages == 0 {
            return Err(ConfigError::Invalid("physical_pages must be non-zero".into()));
        }
        if self.pager_tid == self.vfs_tid {
            return Err(ConfigError::Invalid(format!(
                "pager and VFS share task id {}",
                self.pager_tid
            )));
        }
        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={}", key, raw);
            None
        }
    }
}
