use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::album::AlbumStore;
use crate::domain::{
    AlbumName, DEFAULT_ALBUM_NAME, Project, local_timestamp, split_tags, validate_file_name,
};
use crate::error::VpicError;
use crate::fs_util::{copy_file_preserving_times, list_files, read_json, write_json};

pub const NO_DESCRIPTION: &str = "No description available";
pub const UNKNOWN_ALBUM: &str = "Unknown album";
pub const UNKNOWN: &str = "Unknown";

/// Per-image document under `images_metadata/<stem>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub display_name: String,
    pub original_filename: String,
    pub upload_date: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Album the image was filed under at ingestion. Only `sync_album_references` updates it.
    pub album: String,
}

/// On-disk shape with every field optional, so partial documents still load.
#[derive(Debug, Default, Deserialize)]
struct StoredImageMetadata {
    filename: Option<String>,
    display_name: Option<String>,
    original_filename: Option<String>,
    upload_date: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    album: Option<String>,
}

impl ImageMetadata {
    fn from_stored(filename: &str, stored: StoredImageMetadata) -> Self {
        Self {
            filename: stored.filename.unwrap_or_else(|| filename.to_string()),
            display_name: stored.display_name.unwrap_or_else(|| file_stem(filename)),
            original_filename: stored
                .original_filename
                .unwrap_or_else(|| UNKNOWN.to_string()),
            upload_date: stored.upload_date.unwrap_or_else(|| UNKNOWN.to_string()),
            description: stored
                .description
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            tags: stored.tags.unwrap_or_default(),
            album: stored.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        }
    }

    fn synthesized(filename: &str) -> Self {
        Self::from_stored(filename, StoredImageMetadata::default())
    }

    pub fn tags_display(&self) -> String {
        if self.tags.is_empty() {
            "No tags".to_string()
        } else {
            self.tags.join(", ")
        }
    }
}

/// What the caller supplies for one image during the describe/tag steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub display_name: String,
    pub description: String,
    /// Raw comma separated input.
    pub tags: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Stored,
    Synthesized,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub binary_path: Utf8PathBuf,
    pub metadata: ImageMetadata,
    pub metadata_source: MetadataSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumEntry {
    pub filename: String,
    pub display_name: String,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Image files whose `album` field was rewritten.
    pub updated: Vec<String>,
    /// Image files no album lists.
    pub unfiled: Vec<String>,
}

pub struct ImageStore;

impl ImageStore {
    /// Copies `source` into the project, writes its metadata and files it under the
    /// default album, in that order. A failing step leaves earlier steps in place.
    pub fn ingest(
        project: &Project,
        source: &Utf8Path,
        details: &ImageDetails,
    ) -> Result<ImageMetadata, VpicError> {
        let display_name = details.display_name.as_str();
        if display_name.trim().is_empty() {
            return Err(VpicError::MissingName);
        }
        validate_file_name(display_name)?;
        let original_filename = source
            .file_name()
            .ok_or_else(|| VpicError::InvalidInput(format!("{source} is not a file")))?;
        if !source.as_std_path().is_file() {
            return Err(VpicError::NotFound(source.to_string()));
        }

        project.ensure_layout()?;
        AlbumStore::ensure_default_album(project)?;

        let extension = source
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let filename = unique_filename(project, display_name, &extension);
        let binary_path = project.image_path(&filename);
        copy_file_preserving_times(source, &binary_path).inspect_err(|err| {
            error!(image = %filename, %err, "ingestion failed while copying");
        })?;

        let metadata = ImageMetadata {
            filename: filename.clone(),
            display_name: display_name.to_string(),
            original_filename: original_filename.to_string(),
            upload_date: local_timestamp(),
            description: details.description.clone(),
            tags: split_tags(&details.tags),
            album: DEFAULT_ALBUM_NAME.to_string(),
        };
        write_json(&project.image_metadata_path(&filename), &metadata).inspect_err(|err| {
            error!(image = %filename, %err, "ingestion failed while writing metadata");
        })?;

        AlbumStore::add_image_to_album(project, &AlbumName::default_album(), &filename)
            .inspect_err(|err| {
                error!(image = %filename, %err, "ingestion failed while updating album");
            })?;

        info!(project = project.name(), image = %filename, source = %source, "ingested image");
        Ok(metadata)
    }

    /// Missing metadata is synthesized; only a missing binary is an error.
    pub fn load(project: &Project, filename: &str) -> Result<ImageRecord, VpicError> {
        validate_file_name(filename)?;
        let binary_path = project.image_path(filename);
        if !binary_path.as_std_path().is_file() {
            return Err(VpicError::NotFound(format!("image '{filename}'")));
        }

        let metadata_path = project.image_metadata_path(filename);
        if !metadata_path.as_std_path().exists() {
            warn!(image = filename, "image metadata not found; using defaults");
            return Ok(ImageRecord {
                binary_path,
                metadata: ImageMetadata::synthesized(filename),
                metadata_source: MetadataSource::Synthesized,
            });
        }

        let stored: StoredImageMetadata = read_json(&metadata_path)?;
        Ok(ImageRecord {
            binary_path,
            metadata: ImageMetadata::from_stored(filename, stored),
            metadata_source: MetadataSource::Stored,
        })
    }

    /// Album membership resolved against `images/`, in album order. Entries without a
    /// binary are skipped. The display name falls back to the filename when metadata is
    /// absent, unreadable or has no `display_name`.
    pub fn album_entries(
        project: &Project,
        album_name: &AlbumName,
    ) -> Result<Vec<AlbumEntry>, VpicError> {
        let album = AlbumStore::load_album(project, album_name)?;
        let mut entries = Vec::with_capacity(album.images.len());
        for filename in album.images {
            if validate_file_name(&filename).is_err() {
                warn!(album = %album_name, image = %filename, "skipping invalid album entry");
                continue;
            }
            let path = project.image_path(&filename);
            if !path.as_std_path().is_file() {
                warn!(album = %album_name, image = %filename, "image file not found");
                continue;
            }
            let display_name = stored_display_name(project, &filename)
                .unwrap_or_else(|| filename.clone());
            entries.push(AlbumEntry {
                filename,
                display_name,
                path,
            });
        }
        Ok(entries)
    }

    /// Rewrites each metadata `album` field from the album documents. An image listed in
    /// several albums takes the first non-default one. Other fields are left as stored.
    pub fn sync_album_references(project: &Project) -> Result<SyncReport, VpicError> {
        let mut filed_under = HashMap::<String, AlbumName>::new();
        for album_name in AlbumStore::list_albums(project)? {
            let album = match AlbumStore::load_album(project, &album_name) {
                Ok(album) => album,
                Err(err) => {
                    warn!(album = %album_name, %err, "skipping unreadable album");
                    continue;
                }
            };
            for filename in album.images {
                let keep_current = filed_under
                    .get(&filename)
                    .is_some_and(|current| !current.is_default() || album_name.is_default());
                if !keep_current {
                    filed_under.insert(filename, album_name.clone());
                }
            }
        }

        let mut report = SyncReport::default();
        for path in list_files(&project.images_metadata_dir())? {
            if path.extension() != Some("json") {
                continue;
            }
            let mut document: serde_json::Value = match read_json(&path) {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path, %err, "skipping unreadable image metadata");
                    continue;
                }
            };
            let Some(object) = document.as_object_mut() else {
                warn!(path = %path, "image metadata is not a JSON object");
                continue;
            };
            let filename = match object.get("filename").and_then(|value| value.as_str()) {
                Some(filename) => filename.to_string(),
                None => {
                    warn!(path = %path, "image metadata has no filename");
                    continue;
                }
            };
            let Some(album_name) = filed_under.get(&filename) else {
                report.unfiled.push(filename);
                continue;
            };
            if object.get("album").and_then(|value| value.as_str()) == Some(album_name.as_str()) {
                continue;
            }
            object.insert(
                "album".to_string(),
                serde_json::Value::String(album_name.as_str().to_string()),
            );
            write_json(&path, &document)?;
            info!(image = %filename, album = %album_name, "synced album reference");
            report.updated.push(filename);
        }
        Ok(report)
    }
}

/// `{display_name}_{unix_ts}{ext}`; a counter goes before the extension when that name
/// (or its metadata stem) is already taken.
fn unique_filename(project: &Project, display_name: &str, extension: &str) -> String {
    let base = format!("{display_name}_{}", chrono::Utc::now().timestamp());
    let taken = |candidate: &str| {
        project.image_path(candidate).as_std_path().exists()
            || project.image_metadata_path(candidate).as_std_path().exists()
    };
    let first = format!("{base}{extension}");
    if !taken(&first) {
        return first;
    }
    (1..)
        .map(|counter| format!("{base}_{counter}{extension}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(first)
}

fn stored_display_name(project: &Project, filename: &str) -> Option<String> {
    let metadata_path = project.image_metadata_path(filename);
    if !metadata_path.as_std_path().exists() {
        return None;
    }
    match read_json::<StoredImageMetadata>(&metadata_path) {
        Ok(stored) => stored.display_name,
        Err(err) => {
            warn!(image = filename, %err, "error loading image metadata");
            None
        }
    }
}

fn file_stem(filename: &str) -> String {
    Utf8Path::new(filename)
        .file_stem()
        .unwrap_or(filename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_metadata_gets_field_defaults() {
        let stored: StoredImageMetadata =
            serde_json::from_str(r#"{ "display_name": "Dunes", "tags": ["sand"] }"#).unwrap();
        let metadata = ImageMetadata::from_stored("Dunes_1700000000.png", stored);

        assert_eq!(metadata.filename, "Dunes_1700000000.png");
        assert_eq!(metadata.display_name, "Dunes");
        assert_eq!(metadata.description, NO_DESCRIPTION);
        assert_eq!(metadata.album, UNKNOWN_ALBUM);
        assert_eq!(metadata.upload_date, UNKNOWN);
        assert_eq!(metadata.tags_display(), "sand");
    }

    #[test]
    fn synthesized_metadata_uses_stem() {
        let metadata = ImageMetadata::synthesized("harbour_1700000000.jpg");
        assert_eq!(metadata.display_name, "harbour_1700000000");
        assert!(metadata.tags.is_empty());
        assert_eq!(metadata.tags_display(), "No tags");
    }
}
