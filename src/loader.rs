use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::TempDir;
use tracing::info;

use crate::error::ImportError;
use crate::fs_util::{extract_zip, find_crate_root};
use crate::graph::EntityGraph;

pub const METADATA_FILE: &str = "ro-crate-metadata.json";

/// An opened crate: its entity graph and the directory its files live in.
#[derive(Debug)]
pub struct LoadedCrate {
    source: Utf8PathBuf,
    root_dir: PathBuf,
    graph: EntityGraph,
    // keeps an extracted zip alive for the duration of the import
    _extracted: Option<TempDir>,
}

impl LoadedCrate {
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }
}

pub struct CrateLoader;

impl CrateLoader {
    /// Open a crate directory, or a `.zip` holding one.
    pub fn open(path: &Utf8Path) -> Result<LoadedCrate, ImportError> {
        let std_path = path.as_std_path();
        if std_path.is_dir() {
            let root_dir = find_crate_root(std_path, METADATA_FILE)?;
            let graph = Self::read_graph(&root_dir)?;
            info!(crate_path = %path, entities = graph.len(), "opened RO-Crate directory");
            return Ok(LoadedCrate {
                source: path.to_path_buf(),
                root_dir,
                graph,
                _extracted: None,
            });
        }

        if !std_path.is_file() {
            return Err(ImportError::Filesystem(format!("no such crate: {path}")));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("ro-import")
            .tempdir()
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        extract_zip(std_path, temp_dir.path())?;
        let root_dir = find_crate_root(temp_dir.path(), METADATA_FILE)
            .map_err(|_| ImportError::MissingMetadata(std_path.to_path_buf()))?;
        let graph = Self::read_graph(&root_dir)?;
        info!(crate_path = %path, entities = graph.len(), "opened zipped RO-Crate");

        Ok(LoadedCrate {
            source: path.to_path_buf(),
            root_dir,
            graph,
            _extracted: Some(temp_dir),
        })
    }

    fn read_graph(root_dir: &Path) -> Result<EntityGraph, ImportError> {
        let metadata_path = root_dir.join(METADATA_FILE);
        let content = fs::read_to_string(&metadata_path).map_err(|err| {
            ImportError::Filesystem(format!("read {}: {err}", metadata_path.display()))
        })?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|err| ImportError::InvalidArchive(format!("{METADATA_FILE}: {err}")))?;
        EntityGraph::from_json_ld(&document)
    }
}
