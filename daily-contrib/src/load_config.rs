/// `load_config` module: Loads the YAML config file, applies environment overrides, and maps it into the core's typed config.
///
/// This is the only place where user-supplied YAML is parsed.
///
/// # Responsibilities
/// - Parse the config file into section structs
/// - Apply `DAILY_CONTRIB_STORAGE_ROOT` and `DAILY_CONTRIB_REMOTE` overrides
/// - Validate the result so a bad config fails before the run starts
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
///
/// # Schema
/// ```yaml
/// storage:
///   root: contributions
///   extension: md          # optional
/// date:
///   convention: utc        # or local; optional
/// categories: [til, note]  # optional, defaults to all
/// repository:              # optional
///   path: .
///   remote: origin
///   branch: main
/// publish:                 # optional
///   republish_existing: false
/// ```
use anyhow::{Context, Result};
use daily_contrib_core::catalog::Category;
use daily_contrib_core::config::{DateConvention, PipelineConfig, DEFAULT_EXTENSION};
use daily_contrib_core::git::RepositoryConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const STORAGE_ROOT_ENV: &str = "DAILY_CONTRIB_STORAGE_ROOT";
pub const REMOTE_ENV: &str = "DAILY_CONTRIB_REMOTE";

/// Fully loaded configuration for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    pub repository: RepositoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    storage: StorageSection,
    #[serde(default)]
    date: DateSection,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    repository: RepositorySection,
    #[serde(default)]
    publish: PublishSection,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    root: PathBuf,
    #[serde(default)]
    extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DateSection {
    #[serde(default)]
    convention: DateConvention,
}

#[derive(Debug, Default, Deserialize)]
struct RepositorySection {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublishSection {
    #[serde(default)]
    republish_existing: bool,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let categories = match raw.categories {
        Some(names) => names
            .iter()
            .map(|n| n.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid entry in `categories`")?,
        None => Category::ALL.to_vec(),
    };

    let mut pipeline = PipelineConfig {
        storage_root: raw.storage.root,
        extension: raw
            .storage
            .extension
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        date_convention: raw.date.convention,
        categories,
        republish_existing: raw.publish.republish_existing,
    };

    let mut repository = RepositoryConfig {
        work_tree: raw.repository.path.unwrap_or_else(|| PathBuf::from(".")),
        remote: raw.repository.remote,
        branch: raw.repository.branch,
    };

    if let Some(root) = env_override(STORAGE_ROOT_ENV) {
        info!(storage_root = %root, "Storage root overridden from env");
        pipeline.storage_root = PathBuf::from(root);
    }
    if let Some(remote) = env_override(REMOTE_ENV) {
        info!(remote = %remote, "Remote overridden from env");
        repository.remote = Some(remote);
    }

    if let Err(msg) = pipeline.validate() {
        error!(error = %msg, "Config failed validation");
        anyhow::bail!("Invalid config: {msg}");
    }

    pipeline.trace_loaded();
    info!(
        work_tree = %repository.work_tree.display(),
        remote = repository.remote.as_deref().unwrap_or("<upstream>"),
        "Config loaded and merged successfully"
    );

    Ok(CliConfig {
        pipeline,
        repository,
    })
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
