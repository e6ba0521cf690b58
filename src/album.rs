use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{AlbumName, DEFAULT_ALBUM_DESCRIPTION, Project, local_timestamp};
use crate::error::VpicError;
use crate::fs_util::{list_files, read_json, write_json};

/// One album document under `albums_metadata/`. Absent fields default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_date: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Album {
    pub fn new(name: &AlbumName, description: impl Into<String>) -> Self {
        Self {
            name: name.as_str().to_string(),
            description: description.into(),
            created_date: local_timestamp(),
            images: Vec::new(),
        }
    }
}

pub struct AlbumStore;

impl AlbumStore {
    /// Writes `Unsigned_Images.json` unless it already exists. Never touches an existing one.
    pub fn ensure_default_album(project: &Project) -> Result<(), VpicError> {
        let album_name = AlbumName::default_album();
        let path = project.album_path(&album_name);
        if path.as_std_path().exists() {
            return Ok(());
        }
        fs::create_dir_all(project.albums_metadata_dir().as_std_path())
            .map_err(|err| VpicError::Filesystem(err.to_string()))?;
        let album = Album::new(&album_name, DEFAULT_ALBUM_DESCRIPTION);
        write_json(&path, &album)?;
        info!(project = project.name(), "created default album");
        Ok(())
    }

    pub fn list_albums(project: &Project) -> Result<Vec<AlbumName>, VpicError> {
        Self::ensure_default_album(project)?;
        let albums = list_files(&project.albums_metadata_dir())?
            .into_iter()
            .filter(|path| is_json(path))
            .filter_map(|path| path.file_stem().map(AlbumName::from_file_stem))
            .collect::<Vec<_>>();
        debug!(project = project.name(), count = albums.len(), "listed albums");
        Ok(albums)
    }

    pub fn create_album(
        project: &Project,
        name: &str,
        description: &str,
    ) -> Result<Album, VpicError> {
        let album_name: AlbumName = name.parse()?;
        let path = project.album_path(&album_name);
        if path.as_std_path().exists() {
            return Err(VpicError::AlreadyExists(format!("album '{album_name}'")));
        }
        let album = Album::new(&album_name, description.trim());
        write_json(&path, &album)?;
        info!(project = project.name(), album = %album_name, "created album");
        Ok(album)
    }

    /// Parses a typed album name. When no file matches it directly, a listed album
    /// whose name differs only by surrounding spaces (`Foo_.json`) is used instead.
    pub fn resolve_album(project: &Project, name: &str) -> Result<AlbumName, VpicError> {
        let parsed: AlbumName = name.parse()?;
        if project.album_path(&parsed).as_std_path().exists() {
            return Ok(parsed);
        }
        let listed = Self::list_albums(project)?
            .into_iter()
            .find(|album| album.as_str().trim() == parsed.as_str());
        Ok(listed.unwrap_or(parsed))
    }

    pub fn load_album(project: &Project, name: &AlbumName) -> Result<Album, VpicError> {
        let path = project.album_path(name);
        let mut album: Album = read_json(&path).map_err(|err| match err {
            VpicError::NotFound(_) => VpicError::NotFound(format!("album '{name}'")),
            other => other,
        })?;
        if album.name.is_empty() {
            album.name = name.as_str().to_string();
        }
        Ok(album)
    }

    /// Rewrites the document stored under `name`, whatever `album.name` says.
    pub fn save_album(project: &Project, name: &AlbumName, album: &Album) -> Result<(), VpicError> {
        write_json(&project.album_path(name), album)
    }

    /// Appends without a duplicate check; the same file may be listed more than once.
    pub fn add_image_to_album(
        project: &Project,
        album_name: &AlbumName,
        image_filename: &str,
    ) -> Result<(), VpicError> {
        if album_name.is_default() {
            Self::ensure_default_album(project)?;
        }
        let mut album = Self::load_album(project, album_name)?;
        album.images.push(image_filename.to_string());
        Self::save_album(project, album_name, &album)?;
        debug!(album = %album_name, image = image_filename, "appended image to album");
        Ok(())
    }
}

fn is_json(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn project() -> (tempfile::TempDir, Project) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("demo")).unwrap();
        fs::create_dir_all(root.as_std_path()).unwrap();
        (temp, Project::new("demo", root))
    }

    #[test]
    fn default_album_is_listed_first_time() {
        let (_temp, project) = project();
        let albums = AlbumStore::list_albums(&project).unwrap();
        assert_eq!(albums, vec![AlbumName::default_album()]);
        assert!(project.albums_metadata_dir().join("Unsigned_Images.json").as_std_path().exists());
    }

    #[test]
    fn saved_album_keeps_its_file_name() {
        let (_temp, project) = project();
        let mut album = AlbumStore::create_album(&project, "Road Trip", "vans").unwrap();
        album.images.push("van_1.jpg".to_string());
        let name: AlbumName = "Road Trip".parse().unwrap();
        AlbumStore::save_album(&project, &name, &album).unwrap();

        let loaded = AlbumStore::load_album(&project, &name).unwrap();
        assert_eq!(loaded.images, vec!["van_1.jpg"]);
    }
}
