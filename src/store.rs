use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::album::AlbumStore;
use crate::config::ResolvedConfig;
use crate::domain::{
    ALBUMS_METADATA_DIR, ConflictResolution, IMAGES_DIR, IMAGES_METADATA_DIR, Project,
    ProjectName, has_project_layout, validate_file_name,
};
use crate::error::VpicError;
use crate::fs_util::{copy_dir_recursive, list_dirs, list_files};

/// Catalog of projects: one directory per project under `projects_root`.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    projects_root: Utf8PathBuf,
}

/// Handed to the caller when an imported folder's name is already taken.
#[derive(Debug, Clone, Serialize)]
pub struct ImportConflict {
    pub name: String,
    pub existing_path: String,
    /// Name a `Rename` choice would import under.
    pub rename_to: String,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Imported {
        project: Project,
        resolution: Option<ConflictResolution>,
    },
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    pub removed_files: usize,
}

impl ProjectStore {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            projects_root: config.projects_root.clone(),
        }
    }

    pub fn new_with_root(projects_root: Utf8PathBuf) -> Self {
        Self { projects_root }
    }

    pub fn projects_root(&self) -> &Utf8Path {
        &self.projects_root
    }

    pub fn project_path(&self, name: &str) -> Utf8PathBuf {
        self.projects_root.join(name)
    }

    pub fn ensure_projects_root(&self) -> Result<(), VpicError> {
        fs::create_dir_all(self.projects_root.as_std_path())
            .map_err(|err| VpicError::Filesystem(err.to_string()))
    }

    /// Subdirectory names of the projects root. Hidden entries (import staging) are skipped.
    pub fn list_projects(&self) -> Result<Vec<String>, VpicError> {
        self.ensure_projects_root()?;
        let projects = list_dirs(&self.projects_root)?
            .into_iter()
            .filter_map(|path| path.file_name().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        Ok(projects)
    }

    /// Only the project directory is created here; the layout appears on first use.
    pub fn create_project(&self, name: &str) -> Result<Project, VpicError> {
        let name: ProjectName = name.parse()?;
        self.ensure_projects_root()?;
        let path = self.project_path(name.as_str());
        if path.as_std_path().exists() {
            return Err(VpicError::AlreadyExists(format!("project '{name}'")));
        }
        fs::create_dir(path.as_std_path())
            .map_err(|err| VpicError::Filesystem(format!("create {path}: {err}")))?;
        info!(project = %name, "created project");
        Ok(Project::new(name.as_str(), path))
    }

    pub fn select_project(&self, name: &str) -> Result<Project, VpicError> {
        validate_file_name(name)?;
        let path = self.project_path(name);
        if !path.as_std_path().is_dir() {
            return Err(VpicError::NotFound(format!("project '{name}'")));
        }
        debug!(project = name, path = %path, "selected project");
        Ok(Project::new(name, path))
    }

    pub fn is_valid_project_folder(path: &Utf8Path) -> bool {
        has_project_layout(path)
    }

    /// Copies `source` into the projects root under its base name.
    ///
    /// A name collision is never resolved silently: `resolve` is asked to rename,
    /// overwrite or cancel. The copy is staged next to the destination and moved into
    /// place once complete; an overwrite removes the old project only after that. The
    /// imported tree gets any missing layout directories and the default album;
    /// `source` itself is left untouched.
    pub fn import_project<F>(&self, source: &Utf8Path, resolve: F) -> Result<ImportOutcome, VpicError>
    where
        F: FnOnce(&ImportConflict) -> Result<ConflictResolution, VpicError>,
    {
        let source = canonical_dir(source)?;
        let name = source
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty() && !name.starts_with('.'))
            .ok_or_else(|| VpicError::InvalidFolder(format!("{source} has no usable folder name")))?;

        self.ensure_projects_root()?;
        let root = canonical_dir(&self.projects_root)?;
        if root.starts_with(&source) {
            return Err(VpicError::InvalidFolder(format!(
                "{source} contains the projects root"
            )));
        }

        let mut dest_name = name.clone();
        let mut resolution = None;
        let existing = self.project_path(&name);
        if existing.as_std_path().exists() {
            let conflict = ImportConflict {
                name: name.clone(),
                existing_path: existing.to_string(),
                rename_to: self.next_free_name(&format!("{name}_copy")),
            };
            let choice = resolve(&conflict)?;
            info!(project = %name, choice = %choice, "import name conflict");
            match choice {
                ConflictResolution::Cancel => return Ok(ImportOutcome::Cancelled),
                ConflictResolution::Rename => dest_name = conflict.rename_to,
                ConflictResolution::Overwrite => {}
            }
            resolution = Some(choice);
        }

        if !has_project_layout(&source) {
            warn!(source = %source, "import source lacks project layout; it will be completed");
        }

        let staging = Builder::new()
            .prefix(".vpic-import")
            .tempdir_in(self.projects_root.as_std_path())
            .map_err(|err| VpicError::Filesystem(err.to_string()))?;
        let staged = Utf8PathBuf::from_path_buf(staging.path().join(&dest_name))
            .map_err(|_| VpicError::Filesystem("invalid staging path".to_string()))?;
        copy_dir_recursive(&source, &staged)?;
        let staged_project = Project::new(dest_name.clone(), staged.clone());
        staged_project.ensure_layout()?;
        AlbumStore::ensure_default_album(&staged_project)?;

        let dest = self.project_path(&dest_name);
        if resolution == Some(ConflictResolution::Overwrite) && dest.as_std_path().exists() {
            fs::remove_dir_all(dest.as_std_path())
                .map_err(|err| VpicError::Filesystem(format!("remove {dest}: {err}")))?;
            info!(project = %dest_name, "removed existing project for overwrite");
        }
        fs::rename(staged.as_std_path(), dest.as_std_path())
            .map_err(|err| VpicError::Filesystem(format!("move {staged} -> {dest}: {err}")))?;

        info!(source = %source, project = %dest_name, "imported project");
        Ok(ImportOutcome::Imported {
            project: Project::new(dest_name, dest),
            resolution,
        })
    }

    /// Removes the files directly inside the three layout directories, then writes a
    /// fresh default album.
    pub fn clear_project(&self, project: &Project) -> Result<ClearReport, VpicError> {
        let mut report = ClearReport::default();
        for dir in [IMAGES_DIR, IMAGES_METADATA_DIR, ALBUMS_METADATA_DIR] {
            for file in list_files(&project.root().join(dir))? {
                fs::remove_file(file.as_std_path())
                    .map_err(|err| VpicError::Filesystem(format!("remove {file}: {err}")))?;
                debug!(file = %file, "removed");
                report.removed_files += 1;
            }
        }
        fs::create_dir_all(project.albums_metadata_dir().as_std_path())
            .map_err(|err| VpicError::Filesystem(err.to_string()))?;
        AlbumStore::ensure_default_album(project)?;
        info!(project = project.name(), removed = report.removed_files, "cleared project");
        Ok(report)
    }

    pub fn delete_project(&self, project: &Project) -> Result<(), VpicError> {
        if !project.root().as_std_path().exists() {
            return Err(VpicError::NotFound(format!("project '{}'", project.name())));
        }
        fs::remove_dir_all(project.root().as_std_path())
            .map_err(|err| VpicError::Filesystem(format!("remove {}: {err}", project.root())))?;
        info!(project = project.name(), "deleted project");
        Ok(())
    }

    /// `base`, or `base_1`, `base_2`, ... whichever is free first.
    fn next_free_name(&self, base: &str) -> String {
        if !self.project_path(base).as_std_path().exists() {
            return base.to_string();
        }
        (1..)
            .map(|counter| format!("{base}_{counter}"))
            .find(|candidate| !self.project_path(candidate).as_std_path().exists())
            .unwrap_or_else(|| base.to_string())
    }
}

fn canonical_dir(path: &Utf8Path) -> Result<Utf8PathBuf, VpicError> {
    if !path.as_std_path().is_dir() {
        return Err(VpicError::InvalidFolder(format!("{path} is not a directory")));
    }
    let canonical = fs::canonicalize(path.as_std_path())
        .map_err(|err| VpicError::Filesystem(format!("resolve {path}: {err}")))?;
    Utf8PathBuf::from_path_buf(canonical)
        .map_err(|_| VpicError::InvalidFolder(format!("{path} is not valid UTF-8")))
}
