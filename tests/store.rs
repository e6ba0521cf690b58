use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use vpic_manager::album::AlbumStore;
use vpic_manager::domain::{AlbumName, ConflictResolution};
use vpic_manager::error::VpicError;
use vpic_manager::store::{ImportOutcome, ProjectStore};

fn store() -> (TempDir, ProjectStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("projects")).unwrap();
    (temp, ProjectStore::new_with_root(root))
}

/// A project folder outside the projects root, holding one image and one album.
fn source_project(temp: &TempDir, name: &str) -> Utf8PathBuf {
    let source = Utf8PathBuf::from_path_buf(temp.path().join("incoming").join(name)).unwrap();
    fs::create_dir_all(source.join("images")).unwrap();
    fs::create_dir_all(source.join("images_metadata")).unwrap();
    fs::create_dir_all(source.join("albums_metadata")).unwrap();
    fs::write(source.join("images/pier_1700000000.jpg"), b"jpeg").unwrap();
    fs::write(
        source.join("albums_metadata/Unsigned_Images.json"),
        r#"{"name": "Unsigned Images", "description": "", "created_date": "", "images": ["pier_1700000000.jpg"]}"#,
    )
    .unwrap();
    source
}

fn never_asked(
    _: &vpic_manager::store::ImportConflict,
) -> Result<ConflictResolution, VpicError> {
    panic!("no conflict expected")
}

fn imported_name(outcome: ImportOutcome) -> String {
    match outcome {
        ImportOutcome::Imported { project, .. } => project.name().to_string(),
        ImportOutcome::Cancelled => panic!("import was cancelled"),
    }
}

#[test]
fn list_projects_creates_root() {
    let (_temp, store) = store();
    assert!(store.list_projects().unwrap().is_empty());
    assert!(store.projects_root().as_std_path().is_dir());
}

#[test]
fn create_project_sanitizes_and_rejects_duplicates() {
    let (_temp, store) = store();
    let project = store.create_project("My Trip!").unwrap();
    assert_eq!(project.name(), "MyTrip");
    assert!(project.root().as_std_path().is_dir());
    assert!(!project.has_layout());

    let err = store.create_project("MyTrip").unwrap_err();
    assert_matches!(err, VpicError::AlreadyExists(_));
    let err = store.create_project("My/Trip").unwrap_err();
    assert_matches!(err, VpicError::AlreadyExists(_));

    store.create_project("alpha").unwrap();
    assert_eq!(store.list_projects().unwrap(), vec!["MyTrip", "alpha"]);
}

#[test]
fn select_missing_project_is_not_found() {
    let (_temp, store) = store();
    store.ensure_projects_root().unwrap();
    assert_matches!(store.select_project("ghost"), Err(VpicError::NotFound(_)));
    assert_matches!(store.select_project("../x"), Err(VpicError::InvalidInput(_)));
}

#[test]
fn import_copies_tree_under_base_name() {
    let (temp, store) = store();
    let source = source_project(&temp, "trip");

    let outcome = store.import_project(&source, never_asked).unwrap();
    let project = match outcome {
        ImportOutcome::Imported {
            project,
            resolution,
        } => {
            assert_eq!(resolution, None);
            project
        }
        ImportOutcome::Cancelled => panic!("import was cancelled"),
    };

    assert_eq!(project.name(), "trip");
    assert!(project.image_path("pier_1700000000.jpg").as_std_path().is_file());
    let album = AlbumStore::load_album(&project, &AlbumName::default_album()).unwrap();
    assert_eq!(album.images, vec!["pier_1700000000.jpg"]);
    assert!(source.join("images/pier_1700000000.jpg").as_std_path().is_file());
}

#[test]
fn import_completes_missing_layout_without_touching_source() {
    let (temp, store) = store();
    let source = Utf8PathBuf::from_path_buf(temp.path().join("loose")).unwrap();
    fs::create_dir_all(source.as_std_path()).unwrap();
    fs::write(source.join("notes.txt"), b"hi").unwrap();
    assert!(!ProjectStore::is_valid_project_folder(&source));

    let outcome = store.import_project(&source, never_asked).unwrap();
    let name = imported_name(outcome);
    let dest = store.project_path(&name);

    assert!(ProjectStore::is_valid_project_folder(&dest));
    assert!(dest.join("albums_metadata/Unsigned_Images.json").as_std_path().is_file());
    assert!(dest.join("notes.txt").as_std_path().is_file());
    assert!(!source.join("images").as_std_path().exists());
}

#[test]
fn import_rename_picks_next_free_copy_name() {
    let (temp, store) = store();
    let source = source_project(&temp, "trip");
    store.create_project("trip").unwrap();

    let mut offered = None;
    let outcome = store
        .import_project(&source, |conflict| {
            offered = Some(conflict.rename_to.clone());
            Ok(ConflictResolution::Rename)
        })
        .unwrap();
    assert_eq!(offered.as_deref(), Some("trip_copy"));
    assert_eq!(imported_name(outcome), "trip_copy");

    let outcome = store
        .import_project(&source, |_| Ok(ConflictResolution::Rename))
        .unwrap();
    assert_eq!(imported_name(outcome), "trip_copy_1");

    assert_eq!(
        store.list_projects().unwrap(),
        vec!["trip", "trip_copy", "trip_copy_1"]
    );
}

#[test]
fn import_overwrite_replaces_existing_project() {
    let (temp, store) = store();
    let source = source_project(&temp, "trip");
    let existing = store.create_project("trip").unwrap();
    fs::write(existing.root().join("stale.txt"), b"old").unwrap();

    let outcome = store
        .import_project(&source, |_| Ok(ConflictResolution::Overwrite))
        .unwrap();
    assert_matches!(
        outcome,
        ImportOutcome::Imported {
            resolution: Some(ConflictResolution::Overwrite),
            ..
        }
    );
    assert!(!existing.root().join("stale.txt").as_std_path().exists());
    assert!(existing.image_path("pier_1700000000.jpg").as_std_path().is_file());
    assert_eq!(store.list_projects().unwrap(), vec!["trip"]);
}

#[test]
fn import_cancel_leaves_everything_alone() {
    let (temp, store) = store();
    let source = source_project(&temp, "trip");
    let existing = store.create_project("trip").unwrap();

    let outcome = store
        .import_project(&source, |_| Ok(ConflictResolution::Cancel))
        .unwrap();
    assert_matches!(outcome, ImportOutcome::Cancelled);
    assert!(!existing.has_layout());
    assert_eq!(store.list_projects().unwrap(), vec!["trip"]);
}

#[test]
fn import_rejects_non_directory() {
    let (temp, store) = store();
    let file = Utf8PathBuf::from_path_buf(temp.path().join("photo.jpg")).unwrap();
    fs::write(file.as_std_path(), b"x").unwrap();

    assert_matches!(
        store.import_project(&file, never_asked),
        Err(VpicError::InvalidFolder(_))
    );
    assert_matches!(
        store.import_project(Utf8Path::new("/definitely/not/here"), never_asked),
        Err(VpicError::InvalidFolder(_))
    );
}

#[test]
fn clear_removes_files_and_restores_default_album() {
    let (temp, store) = store();
    let source = source_project(&temp, "trip");
    let project = match store.import_project(&source, never_asked).unwrap() {
        ImportOutcome::Imported { project, .. } => project,
        ImportOutcome::Cancelled => panic!("import was cancelled"),
    };
    AlbumStore::create_album(&project, "Beach", "").unwrap();

    let report = store.clear_project(&project).unwrap();
    assert_eq!(report.removed_files, 3);
    assert!(project.has_layout());
    assert_eq!(
        AlbumStore::list_albums(&project).unwrap(),
        vec![AlbumName::default_album()]
    );
    let album = AlbumStore::load_album(&project, &AlbumName::default_album()).unwrap();
    assert!(album.images.is_empty());
}

#[test]
fn delete_removes_project_tree() {
    let (_temp, store) = store();
    let project = store.create_project("gone").unwrap();
    project.ensure_layout().unwrap();

    store.delete_project(&project).unwrap();
    assert!(!project.root().as_std_path().exists());
    assert_matches!(store.delete_project(&project), Err(VpicError::NotFound(_)));
}
