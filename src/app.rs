use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::datalab::{NewItem, RemoteItem, RemoteRepositoryClient};
use crate::entity::{ROOT_ID, Relation};
use crate::error::ImportError;
use crate::fs_util::crate_file_path;
use crate::graph::EntityGraph;
use crate::loader::LoadedCrate;
use crate::preview::{CratePreview, CratePreviewer};
use crate::profile::ProfileValidator;
use crate::resolver::RepositoryObjectResolver;

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub preview: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            preview: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub crate_path: String,
    pub base: String,
    pub child: Option<String>,
    pub target_refcode: Option<String>,
    pub target_item_id: Option<String>,
    pub created: bool,
    pub files: Vec<FileResult>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub entity_id: String,
    pub path: String,
    pub uploaded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub entity_id: String,
    pub path: PathBuf,
}

/// Files of the root dataset that will be sent, and part ids that cannot be.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPlan {
    pub files: Vec<PlannedFile>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum Phase {
    Validate,
    Preview,
    Resolve,
    Plan,
    Link,
    Upload,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Validate => "Validate",
            Phase::Preview => "Preview",
            Phase::Resolve => "Resolve",
            Phase::Plan => "Plan",
            Phase::Link => "Link",
            Phase::Upload => "Upload",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    fn phase(phase: Phase, message: impl AsRef<str>) -> Self {
        Self {
            message: format!("phase={}; {}", phase.label(), message.as_ref()),
            elapsed: None,
        }
    }

    fn timed(message: impl Into<String>, started: Instant) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(started.elapsed()),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    /// Receives the crate preview. Implementations decide where it goes and
    /// must not fail the import if it cannot be shown.
    fn preview(&self, _preview: &CratePreview) {}
}

pub struct Importer<C: RemoteRepositoryClient> {
    client: C,
    validator: ProfileValidator,
    resolver: RepositoryObjectResolver,
    previewer: CratePreviewer,
}

impl<C: RemoteRepositoryClient> Importer<C> {
    pub fn new(
        client: C,
        validator: ProfileValidator,
        resolver: RepositoryObjectResolver,
    ) -> Self {
        Self {
            client,
            validator,
            resolver,
            previewer: CratePreviewer,
        }
    }

    pub fn from_config(client: C, config: &ResolvedConfig) -> Self {
        Self::new(
            client,
            ProfileValidator::new(config.profile.clone()),
            RepositoryObjectResolver::new(config.ambiguity),
        )
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn import(
        &self,
        archive: &LoadedCrate,
        options: ImportOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ImportResult, ImportError> {
        let graph = archive.graph();

        sink.event(ProgressEvent::phase(
            Phase::Validate,
            format!("checking profile of {}", archive.source()),
        ));
        self.validator.check(graph)?;

        if options.preview {
            sink.event(ProgressEvent::phase(Phase::Preview, "rendering crate"));
            sink.preview(&self.previewer.render(graph));
        }

        sink.event(ProgressEvent::phase(
            Phase::Resolve,
            "locating RepositoryObject hierarchy",
        ));
        let pair = self.resolver.resolve(graph)?;
        let parent_refcode = pair.base.id();
        if parent_refcode.trim().is_empty() || parent_refcode == ROOT_ID {
            return Err(ImportError::MissingParentLink(parent_refcode.to_string()));
        }

        sink.event(ProgressEvent::phase(Phase::Plan, "collecting data files"));
        let plan = plan_uploads(graph, archive.root_dir())?;

        let mut result = ImportResult {
            crate_path: archive.source().to_string(),
            base: parent_refcode.to_string(),
            child: pair.child.map(|child| child.id().to_string()),
            target_refcode: None,
            target_item_id: None,
            created: false,
            files: plan
                .files
                .iter()
                .map(|file| FileResult {
                    entity_id: file.entity_id.clone(),
                    path: file.path.display().to_string(),
                    uploaded: false,
                })
                .collect(),
            skipped: plan.skipped.clone(),
            dry_run: options.dry_run,
            completed_at: String::new(),
        };

        if options.dry_run {
            info!(
                base = parent_refcode,
                files = plan.files.len(),
                "dry run; no changes sent to datalab"
            );
            result.completed_at = iso_timestamp();
            return Ok(result);
        }

        sink.event(ProgressEvent::phase(
            Phase::Link,
            format!("looking up {parent_refcode}"),
        ));
        let started = Instant::now();
        let parent = self
            .client
            .get_item(parent_refcode)?
            .ok_or_else(|| ImportError::RemoteItemNotFound(parent_refcode.to_string()))?;
        sink.event(ProgressEvent::timed("datalab.response get_item", started));

        let target = match pair.child {
            Some(child) => {
                sink.event(ProgressEvent::phase(
                    Phase::Link,
                    format!("creating constituent item for {}", child.id()),
                ));
                let started = Instant::now();
                let created = self.client.create_item(&NewItem::constituent_of(&parent))?;
                sink.event(ProgressEvent::timed("datalab.response create_item", started));
                info!(parent = %parent.refcode, created = %created.refcode, "created linked item");
                result.created = true;
                created
            }
            None => parent,
        };

        self.upload_all(&target, &plan, &mut result, sink)?;

        info!(refcode = %target.refcode, "updated entry");
        result.target_refcode = Some(target.refcode);
        result.target_item_id = Some(target.item_id);
        result.completed_at = iso_timestamp();
        Ok(result)
    }

    fn upload_all(
        &self,
        target: &RemoteItem,
        plan: &UploadPlan,
        result: &mut ImportResult,
        sink: &dyn ProgressSink,
    ) -> Result<(), ImportError> {
        for (file, reported) in plan.files.iter().zip(result.files.iter_mut()) {
            sink.event(ProgressEvent::phase(
                Phase::Upload,
                format!("{} -> {}", file.entity_id, target.refcode),
            ));
            let started = Instant::now();
            self.client.upload_file(&target.item_id, &file.path)?;
            sink.event(ProgressEvent::timed("datalab.response upload_file", started));
            info!(
                file = %file.path.display(),
                refcode = %target.refcode,
                "added file to item"
            );
            reported.uploaded = true;
        }
        Ok(())
    }
}

/// Build the list of files to upload from the root dataset's `hasPart`.
///
/// Only parts typed exactly `File` are considered. References that do not
/// resolve to an entity and web-based files are recorded as skipped.
pub fn plan_uploads(graph: &EntityGraph, root_dir: &Path) -> Result<UploadPlan, ImportError> {
    let mut plan = UploadPlan::default();
    for part in graph.resolve_relationship(graph.root(), "hasPart") {
        let entity = match part {
            Relation::Resolved(entity) => entity,
            Relation::Unresolved(id) => {
                plan.skipped.push(id.to_string());
                continue;
            }
        };
        if !entity.is_exactly("File") {
            continue;
        }
        match crate_file_path(root_dir, entity.id())? {
            Some(path) if path.is_file() => plan.files.push(PlannedFile {
                entity_id: entity.id().to_string(),
                path,
            }),
            Some(path) => return Err(ImportError::MissingFile(path)),
            None => {
                warn!(id = entity.id(), "skipping web-based file entity");
                plan.skipped.push(entity.id().to_string());
            }
        }
    }
    Ok(plan)
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
