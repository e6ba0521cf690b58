use std::fs::{self, FileTimes};
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::PrettyFormatter;

use crate::error::VpicError;

/// Serializes with 4-space indentation and replaces `path` atomically.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), VpicError> {
    let mut content = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut content, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|err| VpicError::Filesystem(format!("serialize {path}: {err}")))?;
    content.push(b'\n');
    write_bytes_atomic(path, &content)
}

/// Reads and parses a JSON document. A missing file is `NotFound`, bad JSON is `Corrupt`.
pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, VpicError> {
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(VpicError::NotFound(path.to_string()));
        }
        Err(err) => return Err(VpicError::Filesystem(format!("read {path}: {err}"))),
    };
    serde_json::from_str(&content).map_err(|err| VpicError::Corrupt {
        path: path.to_string(),
        message: err.to_string(),
    })
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), VpicError> {
    let parent = path
        .parent()
        .ok_or_else(|| VpicError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path()).map_err(VpicError::fs)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".vpic-write")
        .tempfile_in(parent.as_std_path())
        .map_err(VpicError::fs)?;
    temp.write_all(content).map_err(VpicError::fs)?;
    temp.persist(path.as_std_path())
        .map_err(|err| VpicError::Filesystem(format!("write {path}: {}", err.error)))?;
    Ok(())
}

/// Byte-for-byte copy that carries the source's modification and access times over.
pub fn copy_file_preserving_times(source: &Utf8Path, dest: &Utf8Path) -> Result<(), VpicError> {
    fs::copy(source.as_std_path(), dest.as_std_path())
        .map_err(|err| VpicError::Filesystem(format!("copy {source} -> {dest}: {err}")))?;
    let metadata = fs::metadata(source.as_std_path()).map_err(VpicError::fs)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    let file = fs::OpenOptions::new()
        .write(true)
        .open(dest.as_std_path())
        .map_err(VpicError::fs)?;
    file.set_times(times).map_err(VpicError::fs)?;
    Ok(())
}

/// Copies a whole tree. `dest` must not exist yet.
pub fn copy_dir_recursive(source: &Utf8Path, dest: &Utf8Path) -> Result<(), VpicError> {
    if dest.as_std_path().exists() {
        return Err(VpicError::AlreadyExists(dest.to_string()));
    }
    fs::create_dir_all(dest.as_std_path()).map_err(VpicError::fs)?;
    for entry in walk_dir(source.as_std_path())? {
        let relative = entry
            .strip_prefix(source.as_std_path())
            .map_err(|err| VpicError::Filesystem(err.to_string()))?;
        let target = dest.as_std_path().join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(VpicError::fs)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(VpicError::fs)?;
            }
            fs::copy(&entry, &target).map_err(|err| {
                VpicError::Filesystem(format!(
                    "copy {} -> {}: {err}",
                    entry.display(),
                    target.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Regular files directly inside `dir`, sorted by name. Missing `dir` yields nothing.
pub fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, VpicError> {
    list_entries(dir, |path| path.is_file())
}

/// Subdirectories directly inside `dir`, sorted by name. Missing `dir` yields nothing.
pub fn list_dirs(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, VpicError> {
    list_entries(dir, |path| path.is_dir())
}

fn list_entries(
    dir: &Utf8Path,
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<Utf8PathBuf>, VpicError> {
    if !dir.as_std_path().exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| VpicError::Filesystem(format!("list {dir}: {err}")))?;
    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(VpicError::fs)?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => items.push(path),
            Err(path) => tracing::warn!(path = %path.display(), "skipping non UTF-8 path"),
        }
    }
    items.sort();
    Ok(items)
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, VpicError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(VpicError::fs)?;
        for entry in entries {
            let entry = entry.map_err(VpicError::fs)?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}
