use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::VpicError;

pub const CONFIG_FILE_NAME: &str = "vpic.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub projects_root: Option<String>,
    #[serde(default)]
    pub image_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub projects_root: Utf8PathBuf,
    /// Lower-case, without the leading dot.
    pub image_extensions: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit `path` must exist; otherwise the per-user config file is used when present.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, VpicError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_config_path().filter(|candidate| candidate.exists()),
        };

        let config = match config_path {
            Some(config_path) => {
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| VpicError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| VpicError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, VpicError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let projects_root = match config.projects_root {
            Some(root) => Utf8PathBuf::from(root),
            None => default_projects_root()?,
        };

        let image_extensions = config
            .image_extensions
            .map(|extensions| {
                extensions
                    .into_iter()
                    .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|extensions| !extensions.is_empty())
            .unwrap_or_else(default_image_extensions);

        Ok(ResolvedConfig {
            schema_version,
            projects_root,
            image_extensions,
        })
    }
}

pub fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
    ]
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "vpic")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn default_projects_root() -> Result<Utf8PathBuf, VpicError> {
    project_dirs()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().join("projects")).ok())
        .ok_or_else(|| VpicError::Filesystem("unable to resolve data directory".to_string()))
}
