//! Project manifest (`package.json`) and component descriptor (`.componentrc`).
//!
//! The manifest is kept as a raw JSON object so that writing the version back
//! leaves every other field, and the field order, untouched.

use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";
pub const COMPONENT_FILE: &str = ".componentrc";

/// The project's `package.json`
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    raw: Map<String, Value>,
}

impl Manifest {
    /// Load `package.json` from a source directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(PublishError::manifest(format!(
                "{} not found in {}",
                MANIFEST_FILE,
                dir.display()
            )));
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content)? {
            Value::Object(raw) => Ok(Manifest { path, raw }),
            _ => Err(PublishError::manifest(format!(
                "{} must contain a JSON object",
                path.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn str_field(&self, key: &str) -> Result<&str> {
        self.raw
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::manifest(format!("missing '{}' field", key)))
    }

    pub fn name(&self) -> Result<&str> {
        self.str_field("name")
    }

    pub fn version(&self) -> Result<&str> {
        self.str_field("version")
    }

    /// Whether `scripts` declares the given script name
    pub fn has_script(&self, script: &str) -> bool {
        self.raw
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(script))
    }

    /// Whether the `files` inclusion list contains the given entry
    pub fn includes_file(&self, entry: &str) -> bool {
        self.raw
            .get("files")
            .and_then(Value::as_array)
            .is_some_and(|files| files.iter().any(|f| f.as_str() == Some(entry)))
    }

    /// Write `version` to disk if it differs from the declared one.
    ///
    /// Returns whether the file was rewritten.
    pub fn sync_version(&mut self, version: &str) -> Result<bool> {
        if self.version().ok() == Some(version) {
            return Ok(false);
        }
        self.raw
            .insert("version".to_string(), Value::String(version.to_string()));
        self.save()?;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&self.raw)?;
        content.push('\n');
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Component descriptor read from `.componentrc`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFile {
    pub build_path: String,

    #[serde(default)]
    pub example_path: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentFile {
    /// Load `.componentrc`; `None` means the project is not a component
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(COMPONENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let component = serde_json::from_str(&content).map_err(|e| {
            PublishError::manifest(format!("invalid {}: {}", COMPONENT_FILE, e))
        })?;
        Ok(Some(component))
    }
}
