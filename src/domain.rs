use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::VpicError;

pub const IMAGES_DIR: &str = "images";
pub const IMAGES_METADATA_DIR: &str = "images_metadata";
pub const ALBUMS_METADATA_DIR: &str = "albums_metadata";

pub const DEFAULT_ALBUM_NAME: &str = "Unsigned Images";
pub const DEFAULT_ALBUM_DESCRIPTION: &str = "Default album for newly uploaded images";

static PROJECT_NAME_REJECTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));

/// Directory name of a project, restricted to `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectName {
    type Err = VpicError;

    /// Drops every character outside `[A-Za-z0-9_-]`; spaces are removed, not replaced.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let sanitized = PROJECT_NAME_REJECTS.replace_all(value, "").into_owned();
        if sanitized.is_empty() {
            return Err(VpicError::InvalidInput(format!(
                "project name '{value}' has no usable characters"
            )));
        }
        Ok(Self(sanitized))
    }
}

/// Display name of an album. On disk the name is stored with spaces turned into underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumName(String);

impl AlbumName {
    pub fn default_album() -> Self {
        Self(DEFAULT_ALBUM_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_stem(&self) -> String {
        self.0.replace(' ', "_")
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.file_stem())
    }

    pub fn from_file_stem(stem: &str) -> Self {
        Self(stem.replace('_', " "))
    }

    pub fn is_default(&self) -> bool {
        self.file_stem() == AlbumName::default_album().file_stem()
    }
}

impl fmt::Display for AlbumName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlbumName {
    type Err = VpicError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VpicError::InvalidName("album name is required".to_string()));
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(VpicError::InvalidName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Import under `<name>_copy`, `<name>_copy_1`, ...
    Rename,
    /// Delete the existing project first.
    Overwrite,
    Cancel,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictResolution::Rename => write!(f, "rename"),
            ConflictResolution::Overwrite => write!(f, "overwrite"),
            ConflictResolution::Cancel => write!(f, "cancel"),
        }
    }
}

/// Handle to a project directory. Every album and image operation takes one explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    name: String,
    root: Utf8PathBuf,
}

impl Project {
    pub fn new(name: impl Into<String>, root: Utf8PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn images_dir(&self) -> Utf8PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn images_metadata_dir(&self) -> Utf8PathBuf {
        self.root.join(IMAGES_METADATA_DIR)
    }

    pub fn albums_metadata_dir(&self) -> Utf8PathBuf {
        self.root.join(ALBUMS_METADATA_DIR)
    }

    pub fn image_path(&self, filename: &str) -> Utf8PathBuf {
        self.images_dir().join(filename)
    }

    pub fn image_metadata_path(&self, filename: &str) -> Utf8PathBuf {
        let stem = Utf8Path::new(filename).file_stem().unwrap_or(filename);
        self.images_metadata_dir().join(format!("{stem}.json"))
    }

    pub fn album_path(&self, album: &AlbumName) -> Utf8PathBuf {
        self.albums_metadata_dir().join(album.file_name())
    }

    pub fn has_layout(&self) -> bool {
        has_project_layout(&self.root)
    }

    pub fn ensure_layout(&self) -> Result<(), VpicError> {
        for dir in [
            self.images_dir(),
            self.images_metadata_dir(),
            self.albums_metadata_dir(),
        ] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| VpicError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }
}

pub fn has_project_layout(root: &Utf8Path) -> bool {
    [IMAGES_DIR, IMAGES_METADATA_DIR, ALBUMS_METADATA_DIR]
        .iter()
        .all(|dir| root.join(dir).as_std_path().is_dir())
}

/// Splits a comma separated tag string. Entries are kept verbatim: no trimming, no dedup,
/// empty segments survive.
pub fn split_tags(tags_csv: &str) -> Vec<String> {
    tags_csv.split(',').map(str::to_string).collect()
}

/// Rejects names that would escape the directory they are joined onto.
pub fn validate_file_name(name: &str) -> Result<(), VpicError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(VpicError::InvalidInput(format!("invalid file name: '{name}'")));
    }
    Ok(())
}

pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
