//! Project layout and default options, read from `<root>/blearn.yaml`

use crate::core::PrepareOptions;
use crate::error::{BlearnError, BlearnResult};
use crate::excel::DEFAULT_AUTO_DROP;
use crate::types::Keep;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "blearn.yaml";

/// Settings of a marking project. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Folder (under the root) holding the LMS downloads
    pub input_dir: String,
    /// Folder (under the root) receiving the marking project
    pub output_dir: String,
    /// Grading sheet file name inside `input_dir`
    pub sheet: String,
    /// Submission bundle (zip or folder) inside `input_dir`
    pub bundle: String,
    pub log_file: String,
    pub keep: Keep,
    pub drop_usernames: Vec<String>,
    /// Empty string disables the automatic drop
    pub auto_drop: String,
    pub drop_empty: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            input_dir: "blearn-1_ini".to_string(),
            output_dir: "blearn-2_out".to_string(),
            sheet: "a.xls".to_string(),
            bundle: "a.zip".to_string(),
            log_file: "blearn.log".to_string(),
            keep: Keep::Last,
            drop_usernames: Vec::new(),
            auto_drop: DEFAULT_AUTO_DROP.to_string(),
            drop_empty: true,
        }
    }
}

impl ProjectConfig {
    /// Read `<root>/blearn.yaml`, falling back to defaults when it is absent
    pub fn load(root: &Path) -> BlearnResult<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content).map_err(|e| {
            BlearnError::Validation(format!("Invalid config '{}': {}", path.display(), e))
        })
    }

    pub fn from_yaml(content: &str) -> BlearnResult<Self> {
        // an empty file deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn sheet_path(&self, root: &Path) -> PathBuf {
        root.join(&self.input_dir).join(&self.sheet)
    }

    pub fn bundle_path(&self, root: &Path) -> PathBuf {
        root.join(&self.input_dir).join(&self.bundle)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        root.join(&self.log_file)
    }

    /// Pipeline options carried by the file; `safe` and `verbose` come from the CLI
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            keep: self.keep,
            drop_usernames: self.drop_usernames.clone(),
            auto_drop: Some(self.auto_drop.clone()).filter(|m| !m.is_empty()),
            drop_empty: self.drop_empty,
            ..PrepareOptions::default()
        }
    }
}
