use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::catalog::Category;

pub const DEFAULT_EXTENSION: &str = "md";

/// Which clock decides what "today" is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateConvention {
    #[default]
    Utc,
    Local,
}

impl DateConvention {
    pub fn today(self) -> NaiveDate {
        match self {
            DateConvention::Utc => Utc::now().date_naive(),
            DateConvention::Local => Local::now().date_naive(),
        }
    }
}

/// Everything the pipeline needs to know, threaded in explicitly per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub storage_root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub date_convention: DateConvention,
    #[serde(default = "all_categories")]
    pub categories: Vec<Category>,
    /// Stage an artifact that already existed instead of stopping at `NoOpAlreadyExists`.
    #[serde(default)]
    pub republish_existing: bool,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn all_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

impl PipelineConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            extension: default_extension(),
            date_convention: DateConvention::default(),
            categories: all_categories(),
            republish_existing: false,
        }
    }

    /// Checks the invariants a loaded config must satisfy before a run.
    pub fn validate(&self) -> Result<(), String> {
        if self.categories.is_empty() {
            return Err("categories must not be empty".to_string());
        }
        if self.extension.is_empty() || !self.extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!(
                "extension must be non-empty and alphanumeric, got '{}'",
                self.extension
            ));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            storage_root = %self.storage_root.display(),
            extension = %self.extension,
            date_convention = ?self.date_convention,
            categories_count = self.categories.len(),
            republish_existing = self.republish_existing,
            "Loaded PipelineConfig"
        );
        debug!(config = ?self, "PipelineConfig loaded (full debug)");
    }
}
