use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::album::AlbumStore;
use crate::batch::{Advance, BatchImport, BatchProgress, BatchState, BatchSummary};
use crate::domain::{ConflictResolution, Project};
use crate::error::VpicError;
use crate::fs_util::list_files;
use crate::image::{AlbumEntry, ImageDetails, ImageMetadata, ImageStore, MetadataSource, SyncReport};
use crate::store::{ImportConflict, ImportOutcome, ProjectStore};

#[derive(Debug, Clone, Serialize)]
pub struct ProjectListResult {
    pub projects_root: String,
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub path: String,
    pub image_count: usize,
    pub albums: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub imported: bool,
    pub project: Option<String>,
    pub path: Option<String>,
    pub resolution: Option<ConflictResolution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub project: String,
    pub removed_files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub project: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumSummary {
    pub name: String,
    pub description: String,
    pub created_date: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumListResult {
    pub project: String,
    pub albums: Vec<AlbumSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumView {
    pub name: String,
    pub description: String,
    pub created_date: String,
    pub images: Vec<AlbumEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub filename: String,
    pub path: String,
    pub display_name: String,
    pub original_filename: String,
    pub upload_date: String,
    pub description: String,
    pub tags: String,
    pub album: String,
    pub metadata_source: MetadataSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub folder: String,
    pub found: usize,
    pub state: BatchState,
    pub summary: BatchSummary,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// What the caller wants done with the image currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchDecision {
    Commit(ImageDetails),
    Skip,
    Cancel,
}

/// Supplies the per-image input a batch import needs.
pub trait BatchDriver {
    /// Whether to go ahead with the files a scan found.
    fn confirm_queue(
        &mut self,
        folder: &Utf8Path,
        files: &[Utf8PathBuf],
    ) -> Result<bool, VpicError>;

    /// Called for the active image; called again for the same image with the error when
    /// its commit failed.
    fn describe(
        &mut self,
        source: &Utf8Path,
        progress: BatchProgress,
        last_error: Option<&VpicError>,
    ) -> Result<BatchDecision, VpicError>;
}

pub struct App {
    store: ProjectStore,
    image_extensions: Vec<String>,
    active: Option<Project>,
}

impl App {
    pub fn new(store: ProjectStore, image_extensions: Vec<String>) -> Self {
        Self {
            store,
            image_extensions,
            active: None,
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// The project the album and image operations act on.
    pub fn active_project(&self) -> Result<&Project, VpicError> {
        self.active.as_ref().ok_or(VpicError::NoProjectSelected)
    }

    pub fn list_projects(&self, sink: &dyn ProgressSink) -> Result<ProjectListResult, VpicError> {
        sink.event(ProgressEvent {
            message: format!("scanning {}", self.store.projects_root()),
            elapsed: None,
        });
        Ok(ProjectListResult {
            projects_root: self.store.projects_root().to_string(),
            projects: self.store.list_projects()?,
        })
    }

    pub fn create_project(
        &mut self,
        name: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ProjectSummary, VpicError> {
        let project = self.store.create_project(name)?;
        sink.event(ProgressEvent {
            message: format!("created project {}", project.name()),
            elapsed: None,
        });
        let summary = ProjectSummary {
            name: project.name().to_string(),
            path: project.root().to_string(),
            image_count: 0,
            albums: Vec::new(),
        };
        self.active = Some(project);
        Ok(summary)
    }

    /// Selects `name` and completes its layout, so later operations can rely on it.
    pub fn open_project(
        &mut self,
        name: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ProjectSummary, VpicError> {
        let project = self.store.select_project(name)?;
        if !project.has_layout() {
            warn!(project = project.name(), "project layout incomplete; creating missing directories");
        }
        project.ensure_layout()?;
        sink.event(ProgressEvent {
            message: format!("opened project {}", project.name()),
            elapsed: None,
        });
        self.active = Some(project);
        self.project_summary()
    }

    pub fn project_summary(&self) -> Result<ProjectSummary, VpicError> {
        let project = self.active_project()?;
        let albums = AlbumStore::list_albums(project)?
            .into_iter()
            .map(|album| album.as_str().to_string())
            .collect();
        let image_count = list_files(&project.images_dir())?.len();
        Ok(ProjectSummary {
            name: project.name().to_string(),
            path: project.root().to_string(),
            image_count,
            albums,
        })
    }

    pub fn import_project<F>(
        &mut self,
        source: &Utf8Path,
        resolve: F,
        sink: &dyn ProgressSink,
    ) -> Result<ImportResult, VpicError>
    where
        F: FnOnce(&ImportConflict) -> Result<ConflictResolution, VpicError>,
    {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("importing {source}"),
            elapsed: None,
        });
        match self.store.import_project(source, resolve)? {
            ImportOutcome::Imported {
                project,
                resolution,
            } => {
                sink.event(ProgressEvent {
                    message: format!("imported as {}", project.name()),
                    elapsed: Some(started.elapsed()),
                });
                let result = ImportResult {
                    imported: true,
                    project: Some(project.name().to_string()),
                    path: Some(project.root().to_string()),
                    resolution,
                };
                self.active = Some(project);
                Ok(result)
            }
            ImportOutcome::Cancelled => {
                sink.event(ProgressEvent {
                    message: "import cancelled".to_string(),
                    elapsed: Some(started.elapsed()),
                });
                Ok(ImportResult {
                    imported: false,
                    project: None,
                    path: None,
                    resolution: Some(ConflictResolution::Cancel),
                })
            }
        }
    }

    /// Callers must have confirmed before calling.
    pub fn clear_project(&self, sink: &dyn ProgressSink) -> Result<ClearResult, VpicError> {
        let project = self.active_project()?;
        sink.event(ProgressEvent {
            message: format!("clearing project {}", project.name()),
            elapsed: None,
        });
        let report = self.store.clear_project(project)?;
        Ok(ClearResult {
            project: project.name().to_string(),
            removed_files: report.removed_files,
        })
    }

    /// Callers must have confirmed before calling. Leaves no project selected.
    pub fn delete_project(&mut self, sink: &dyn ProgressSink) -> Result<DeleteResult, VpicError> {
        let project = self.active_project()?;
        sink.event(ProgressEvent {
            message: format!("deleting project {}", project.name()),
            elapsed: None,
        });
        self.store.delete_project(project)?;
        let result = DeleteResult {
            project: project.name().to_string(),
            deleted: true,
        };
        self.active = None;
        Ok(result)
    }

    pub fn list_albums(&self) -> Result<AlbumListResult, VpicError> {
        let project = self.active_project()?;
        let mut albums = Vec::new();
        for name in AlbumStore::list_albums(project)? {
            match AlbumStore::load_album(project, &name) {
                Ok(album) => albums.push(AlbumSummary {
                    name: name.as_str().to_string(),
                    description: album.description,
                    created_date: album.created_date,
                    image_count: album.images.len(),
                }),
                Err(err) => warn!(album = %name, %err, "skipping unreadable album"),
            }
        }
        Ok(AlbumListResult {
            project: project.name().to_string(),
            albums,
        })
    }

    pub fn create_album(&self, name: &str, description: &str) -> Result<AlbumSummary, VpicError> {
        let project = self.active_project()?;
        project.ensure_layout()?;
        AlbumStore::ensure_default_album(project)?;
        let album = AlbumStore::create_album(project, name, description)?;
        Ok(AlbumSummary {
            name: album.name,
            description: album.description,
            created_date: album.created_date,
            image_count: album.images.len(),
        })
    }

    pub fn show_album(&self, name: &str) -> Result<AlbumView, VpicError> {
        let project = self.active_project()?;
        let name = AlbumStore::resolve_album(project, name)?;
        let album = AlbumStore::load_album(project, &name)?;
        let images = ImageStore::album_entries(project, &name)?;
        Ok(AlbumView {
            name: album.name,
            description: album.description,
            created_date: album.created_date,
            images,
        })
    }

    pub fn add_image(
        &self,
        source: &Utf8Path,
        details: &ImageDetails,
        sink: &dyn ProgressSink,
    ) -> Result<ImageMetadata, VpicError> {
        let project = self.active_project()?;
        let started = Instant::now();
        let metadata = ImageStore::ingest(project, source, details)?;
        sink.event(ProgressEvent {
            message: format!("uploaded {}", metadata.filename),
            elapsed: Some(started.elapsed()),
        });
        Ok(metadata)
    }

    pub fn show_image(&self, filename: &str) -> Result<ImageView, VpicError> {
        let project = self.active_project()?;
        let record = ImageStore::load(project, filename)?;
        let tags = record.metadata.tags_display();
        let metadata = record.metadata;
        Ok(ImageView {
            filename: metadata.filename,
            path: record.binary_path.to_string(),
            display_name: metadata.display_name,
            original_filename: metadata.original_filename,
            upload_date: metadata.upload_date,
            description: metadata.description,
            tags,
            album: metadata.album,
            metadata_source: record.metadata_source,
        })
    }

    /// Scans `folder`, asks `driver` to confirm, then walks the queue one image at a time.
    /// A failed commit is handed back to the driver for the same image; a cancel stops
    /// the walk and keeps whatever was already ingested.
    pub fn batch_import(
        &self,
        folder: &Utf8Path,
        driver: &mut dyn BatchDriver,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, VpicError> {
        let project = self.active_project()?;
        let started = Instant::now();
        let mut batch = BatchImport::new();

        let found = batch.stage(folder, &self.image_extensions)?.to_vec();
        if found.is_empty() {
            sink.event(ProgressEvent {
                message: format!("no images found in {folder}"),
                elapsed: Some(started.elapsed()),
            });
            return Ok(BatchResult {
                folder: folder.to_string(),
                found: 0,
                state: batch.state(),
                summary: BatchSummary::default(),
                message: "No images found in the selected folder.".to_string(),
            });
        }
        sink.event(ProgressEvent {
            message: format!("found {} images in {folder}", found.len()),
            elapsed: None,
        });

        if !driver.confirm_queue(folder, &found)? {
            let summary = batch.cancel();
            return Ok(BatchResult {
                folder: folder.to_string(),
                found: found.len(),
                state: batch.state(),
                summary,
                message: "Batch upload cancelled.".to_string(),
            });
        }

        let mut active = batch.confirm()?.to_path_buf();
        let mut last_error: Option<VpicError> = None;
        loop {
            let progress = batch.progress();
            let decision = driver.describe(&active, progress, last_error.as_ref())?;
            let step = match decision {
                BatchDecision::Commit(details) => match batch.commit(project, &details) {
                    Ok(metadata) => {
                        last_error = None;
                        sink.event(ProgressEvent {
                            message: format!(
                                "[{}/{}] uploaded {}",
                                progress.current, progress.total, metadata.filename
                            ),
                            elapsed: Some(started.elapsed()),
                        });
                        batch.advance()
                    }
                    Err(err) => {
                        warn!(image = %active, %err, "batch commit failed");
                        last_error = Some(err);
                        continue;
                    }
                },
                BatchDecision::Skip => {
                    last_error = None;
                    sink.event(ProgressEvent {
                        message: format!(
                            "[{}/{}] skipped {active}",
                            progress.current, progress.total
                        ),
                        elapsed: None,
                    });
                    batch.skip_current()
                }
                BatchDecision::Cancel => {
                    let summary = batch.cancel();
                    info!(ingested = summary.ingested.len(), "batch upload cancelled");
                    return Ok(BatchResult {
                        folder: folder.to_string(),
                        found: found.len(),
                        state: batch.state(),
                        message: format!(
                            "Batch upload cancelled. {} images were uploaded.",
                            summary.ingested.len()
                        ),
                        summary,
                    });
                }
            };
            match step {
                Advance::Next(next) => active = next,
                Advance::Done => break,
            }
        }

        let summary = batch.summary();
        let message = summary.message();
        sink.event(ProgressEvent {
            message: message.clone(),
            elapsed: Some(started.elapsed()),
        });
        Ok(BatchResult {
            folder: folder.to_string(),
            found: found.len(),
            state: batch.state(),
            summary,
            message,
        })
    }

    pub fn sync(&self, sink: &dyn ProgressSink) -> Result<SyncReport, VpicError> {
        let project = self.active_project()?;
        let report = ImageStore::sync_album_references(project)?;
        sink.event(ProgressEvent {
            message: format!(
                "synced {} images, {} unfiled",
                report.updated.len(),
                report.unfiled.len()
            ),
            elapsed: None,
        });
        Ok(report)
    }
}
