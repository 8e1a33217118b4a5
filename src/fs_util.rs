use std::fs;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::error::ImportError;

/// Unpack `zip_path` into `target_dir`.
///
/// Every entry name is checked before anything is written, so an archive
/// with one entry pointing outside the target leaves no partial output.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), ImportError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        ImportError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| ImportError::InvalidArchive(err.to_string()))?;

    let unsafe_entry =
        (0..archive.len()).find_map(|position| match archive.by_index_raw(position) {
            Ok(entry) if entry.enclosed_name().is_some() => None,
            Ok(entry) => Some(Ok(entry.name().to_string())),
            Err(err) => Some(Err(err)),
        });
    match unsafe_entry {
        Some(Ok(name)) => {
            return Err(ImportError::InvalidArchive(format!(
                "zip entry {name} escapes the extraction directory"
            )));
        }
        Some(Err(err)) => return Err(ImportError::InvalidArchive(err.to_string())),
        None => {}
    }

    archive
        .extract(target_dir)
        .map_err(|err| ImportError::Filesystem(format!("extract {}: {err}", zip_path.display())))
}

/// Locate the directory holding `metadata_name`: `dir` itself, or its only
/// subdirectory when an archive was zipped together with its parent folder.
pub fn find_crate_root(dir: &Path, metadata_name: &str) -> Result<PathBuf, ImportError> {
    if dir.join(metadata_name).is_file() {
        return Ok(dir.to_path_buf());
    }

    let entries = fs::read_dir(dir)
        .map_err(|err| ImportError::Filesystem(format!("read {}: {err}", dir.display())))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ImportError::Filesystem(err.to_string()))?;
    let dirs: Vec<PathBuf> = entries
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    match dirs.as_slice() {
        [only] if only.join(metadata_name).is_file() => Ok(only.clone()),
        _ => Err(ImportError::MissingMetadata(dir.to_path_buf())),
    }
}

/// Map a data entity id onto a path below `root`.
///
/// Returns `Ok(None)` for absolute URIs, which name web resources rather
/// than files in the crate.
pub fn crate_file_path(root: &Path, id: &str) -> Result<Option<PathBuf>, ImportError> {
    if id.contains("://") {
        return Ok(None);
    }
    let relative = id.strip_prefix("./").unwrap_or(id);
    if relative.is_empty() {
        return Err(ImportError::InvalidFilePath(id.to_string()));
    }

    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ImportError::InvalidFilePath(id.to_string()));
    }
    Ok(Some(root.join(relative)))
}
