//! Idempotency gate: the file on disk is the only record of a contribution.
//!
//! [`ensure_artifact`] looks at exactly one path. If something is there it
//! returns without calling the catalog or writing a byte. Otherwise it writes
//! the whole document into a temp file beside the target and links it into
//! place without clobbering, so a reader never sees a half-written artifact
//! and an existing file is never replaced.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::catalog::Category;
use crate::contract::{
    CatalogError, ContentCatalog, ContributeError, ContributionKey, Decision, StorageError,
};

/// Where the artifact lives and whether this run created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub decision: Decision,
}

impl Artifact {
    pub fn existed(&self) -> bool {
        self.decision == Decision::Existed
    }
}

/// Creates the storage root if needed. Idempotent.
pub fn ensure_storage_root(root: &Path) -> Result<(), StorageError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {
            debug!(path = %root.display(), "Storage root already present");
            Ok(())
        }
        Ok(_) => {
            error!(path = %root.display(), "Storage root exists but is not a directory");
            Err(StorageError::NotADirectory(root.to_path_buf()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(root).map_err(|e| {
                error!(error = ?e, path = %root.display(), "Failed to create storage root");
                StorageError::io(root, e)
            })?;
            info!(path = %root.display(), "Created storage root");
            Ok(())
        }
        Err(e) => Err(StorageError::io(root, e)),
    }
}

/// Deterministic artifact path for `key`, refusing names that leave `root`.
pub fn artifact_path(
    root: &Path,
    key: &ContributionKey,
    extension: &str,
) -> Result<PathBuf, StorageError> {
    let name = key.file_name(extension);
    let mut components = Path::new(&name).components();
    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_component || name.contains(['/', '\\']) {
        return Err(StorageError::OutsideRoot {
            root: root.to_path_buf(),
            name,
        });
    }
    Ok(root.join(name))
}

/// Returns the artifact for `key`, producing and writing it only when absent.
pub fn ensure_artifact<C>(
    root: &Path,
    key: &ContributionKey,
    extension: &str,
    catalog: &C,
) -> Result<Artifact, ContributeError>
where
    C: ContentCatalog + ?Sized,
{
    let path = artifact_path(root, key, extension)?;

    if path_exists(&path)? {
        info!(path = %path.display(), "[GATE] Contribution already exists for this key");
        return Ok(Artifact {
            path,
            decision: Decision::Existed,
        });
    }

    let body = produce_document(catalog, key.category)?;

    match write_new(root, &path, body.as_bytes())? {
        true => {
            info!(path = %path.display(), bytes = body.len(), "[GATE] Created contribution");
            Ok(Artifact {
                path,
                decision: Decision::Created,
            })
        }
        false => {
            // Lost a race with an outside writer; their file stands.
            warn!(path = %path.display(), "[GATE] Artifact appeared while writing; keeping existing file");
            Ok(Artifact {
                path,
                decision: Decision::Existed,
            })
        }
    }
}

/// Looks for an artifact of `date` in any category, in [`Category::ALL`] order.
pub fn existing_for_date(
    root: &Path,
    date: NaiveDate,
    extension: &str,
) -> Result<Option<(Category, PathBuf)>, StorageError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(root, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(root, e))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    for category in Category::ALL {
        let wanted = ContributionKey::new(date, category).file_name(extension);
        if names.iter().any(|n| *n == wanted) {
            return Ok(Some((category, root.join(wanted))));
        }
    }
    Ok(None)
}

/// Every entry under `root` whose name starts with `<date>-`, sorted.
pub fn artifacts_for_date(root: &Path, date: NaiveDate) -> Result<Vec<PathBuf>, StorageError> {
    let prefix = ContributionKey::date_prefix(date);
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(root, e)),
    };
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(root, e))?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if matches {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Renders the document for `category`, refusing a blank body.
pub fn produce_document<C>(catalog: &C, category: Category) -> Result<String, CatalogError>
where
    C: ContentCatalog + ?Sized,
{
    let body = catalog.produce(category)?;
    if body.trim().is_empty() {
        return Err(CatalogError::EmptyDocument(category));
    }
    Ok(body)
}

/// Whether anything occupies `path`. A dangling symlink counts.
pub fn path_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Writes `bytes` to `path` only if nothing is there. `Ok(false)` means
/// something already occupied the path when the write was committed.
fn write_new(root: &Path, path: &Path, bytes: &[u8]) -> Result<bool, StorageError> {
    let mut tmp = NamedTempFile::new_in(root).map_err(|e| StorageError::io(root, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StorageError::io(tmp.path(), e))?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => {
            error!(error = ?e.error, path = %path.display(), "Failed to persist artifact");
            Err(StorageError::io(path, e.error))
        }
    }
}
