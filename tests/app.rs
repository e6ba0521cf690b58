use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use vpic_manager::app::{App, BatchDecision, BatchDriver, ProgressEvent, ProgressSink};
use vpic_manager::batch::{BatchProgress, BatchState};
use vpic_manager::config::default_image_extensions;
use vpic_manager::domain::ConflictResolution;
use vpic_manager::error::VpicError;
use vpic_manager::image::{ImageDetails, MetadataSource};
use vpic_manager::output::JsonOutput;
use vpic_manager::store::ProjectStore;

#[derive(Default)]
struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.borrow_mut().push(event.message);
    }
}

/// Replays scripted decisions and records what it was shown.
struct ScriptedDriver {
    confirm: bool,
    decisions: VecDeque<BatchDecision>,
    seen: Vec<(String, BatchProgress, bool)>,
}

impl ScriptedDriver {
    fn new(confirm: bool, decisions: Vec<BatchDecision>) -> Self {
        Self {
            confirm,
            decisions: decisions.into(),
            seen: Vec::new(),
        }
    }
}

impl BatchDriver for ScriptedDriver {
    fn confirm_queue(
        &mut self,
        _folder: &Utf8Path,
        _files: &[Utf8PathBuf],
    ) -> Result<bool, VpicError> {
        Ok(self.confirm)
    }

    fn describe(
        &mut self,
        source: &Utf8Path,
        progress: BatchProgress,
        last_error: Option<&VpicError>,
    ) -> Result<BatchDecision, VpicError> {
        self.seen.push((
            source.file_name().unwrap_or_default().to_string(),
            progress,
            last_error.is_some(),
        ));
        Ok(self.decisions.pop_front().unwrap_or(BatchDecision::Cancel))
    }
}

fn commit(name: &str, tags: &str) -> BatchDecision {
    BatchDecision::Commit(ImageDetails {
        display_name: name.to_string(),
        description: String::new(),
        tags: tags.to_string(),
    })
}

fn app() -> (TempDir, App) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("projects")).unwrap();
    let app = App::new(ProjectStore::new_with_root(root), default_image_extensions());
    (temp, app)
}

fn photo_folder(temp: &TempDir, files: &[&str]) -> Utf8PathBuf {
    let folder = Utf8PathBuf::from_path_buf(temp.path().join("photos")).unwrap();
    fs::create_dir_all(folder.as_std_path()).unwrap();
    for file in files {
        fs::write(folder.join(file).as_std_path(), file.as_bytes()).unwrap();
    }
    folder
}

#[test]
fn project_scoped_operations_need_a_project() {
    let (_temp, app) = app();
    assert_matches!(app.list_albums(), Err(VpicError::NoProjectSelected));
    assert_matches!(app.show_image("x.jpg"), Err(VpicError::NoProjectSelected));
    assert_matches!(app.sync(&JsonOutput), Err(VpicError::NoProjectSelected));
}

#[test]
fn create_project_becomes_active() {
    let (_temp, mut app) = app();
    let summary = app.create_project("Garden Pics", &JsonOutput).unwrap();
    assert_eq!(summary.name, "GardenPics");
    assert_eq!(app.active_project().unwrap().name(), "GardenPics");

    let albums = app.list_albums().unwrap();
    assert_eq!(albums.albums.len(), 1);
    assert_eq!(albums.albums[0].name, "Unsigned Images");
}

#[test]
fn open_project_reports_contents() {
    let (temp, mut app) = app();
    app.create_project("shots", &JsonOutput).unwrap();
    let source = photo_folder(&temp, &["p.png"]);
    let plant = ImageDetails {
        display_name: "Plant".to_string(),
        ..ImageDetails::default()
    };
    app.add_image(&source.join("p.png"), &plant, &JsonOutput)
        .unwrap();
    app.create_album("Flowers", "bright").unwrap();

    let summary = app.open_project("shots", &JsonOutput).unwrap();
    assert_eq!(summary.image_count, 1);
    assert_eq!(summary.albums, vec!["Flowers", "Unsigned Images"]);

    assert_matches!(
        app.open_project("missing", &JsonOutput),
        Err(VpicError::NotFound(_))
    );
}

#[test]
fn add_and_show_image() {
    let (temp, mut app) = app();
    app.create_project("shots", &JsonOutput).unwrap();
    let source = photo_folder(&temp, &["lake.jpg"]);
    let sink = RecordingSink::default();

    let metadata = app
        .add_image(
            &source.join("lake.jpg"),
            &ImageDetails {
                display_name: "Lake".to_string(),
                description: "Morning fog".to_string(),
                tags: "water,fog".to_string(),
            },
            &sink,
        )
        .unwrap();
    assert!(sink.messages.borrow()[0].contains(&metadata.filename));

    let view = app.show_image(&metadata.filename).unwrap();
    assert_eq!(view.display_name, "Lake");
    assert_eq!(view.tags, "water, fog");
    assert_eq!(view.album, "Unsigned Images");
    assert_eq!(view.metadata_source, MetadataSource::Stored);

    let album = app.show_album("Unsigned Images").unwrap();
    assert_eq!(album.images.len(), 1);
    assert_eq!(album.images[0].display_name, "Lake");
}

#[test]
fn batch_import_commits_skips_and_retries() {
    let (temp, mut app) = app();
    app.create_project("batch", &JsonOutput).unwrap();
    let folder = photo_folder(&temp, &["a.jpg", "b.png", "c.gif", "notes.txt"]);
    let mut driver = ScriptedDriver::new(
        true,
        vec![
            commit("", ""),
            commit("Alpha", "x,y"),
            BatchDecision::Skip,
            commit("Gamma", ""),
        ],
    );

    let result = app.batch_import(&folder, &mut driver, &JsonOutput).unwrap();

    assert_eq!(result.found, 3);
    assert_eq!(result.state, BatchState::Complete);
    assert_eq!(result.summary.ingested.len(), 2);
    assert_eq!(result.summary.skipped, 1);
    assert_eq!(
        result.message,
        "Batch upload complete! 2 images were successfully uploaded."
    );

    let shown: Vec<(&str, usize, bool)> = driver
        .seen
        .iter()
        .map(|(name, progress, retry)| (name.as_str(), progress.current, *retry))
        .collect();
    assert_eq!(
        shown,
        vec![
            ("a.jpg", 1, false),
            ("a.jpg", 1, true),
            ("b.png", 2, false),
            ("c.gif", 3, false),
        ]
    );
    assert_eq!(app.show_album("Unsigned Images").unwrap().images.len(), 2);
}

#[test]
fn batch_import_cancel_keeps_earlier_uploads() {
    let (temp, mut app) = app();
    app.create_project("batch", &JsonOutput).unwrap();
    let folder = photo_folder(&temp, &["a.jpg", "b.jpg", "c.jpg"]);
    let mut driver = ScriptedDriver::new(true, vec![commit("One", ""), BatchDecision::Cancel]);

    let result = app.batch_import(&folder, &mut driver, &JsonOutput).unwrap();
    assert_eq!(result.state, BatchState::Idle);
    assert_eq!(result.summary.ingested.len(), 1);
    assert_eq!(driver.seen.len(), 2);
    assert_eq!(app.project_summary().unwrap().image_count, 1);
}

#[test]
fn batch_import_declined_or_empty_does_nothing() {
    let (temp, mut app) = app();
    app.create_project("batch", &JsonOutput).unwrap();

    let folder = photo_folder(&temp, &["a.jpg"]);
    let mut declined = ScriptedDriver::new(false, Vec::new());
    let result = app.batch_import(&folder, &mut declined, &JsonOutput).unwrap();
    assert_eq!(result.found, 1);
    assert!(declined.seen.is_empty());
    assert!(result.summary.ingested.is_empty());

    let empty = Utf8PathBuf::from_path_buf(temp.path().join("empty")).unwrap();
    fs::create_dir_all(empty.as_std_path()).unwrap();
    let mut driver = ScriptedDriver::new(true, Vec::new());
    let result = app.batch_import(&empty, &mut driver, &JsonOutput).unwrap();
    assert_eq!(result.found, 0);
    assert_eq!(result.message, "No images found in the selected folder.");
}

#[test]
fn import_conflict_goes_through_resolver() {
    let (temp, mut app) = app();
    app.create_project("trip", &JsonOutput).unwrap();
    let source = Utf8PathBuf::from_path_buf(temp.path().join("outside").join("trip")).unwrap();
    fs::create_dir_all(source.as_std_path()).unwrap();

    let result = app
        .import_project(&source, |_| Ok(ConflictResolution::Rename), &JsonOutput)
        .unwrap();
    assert!(result.imported);
    assert_eq!(result.project.as_deref(), Some("trip_copy"));
    assert_eq!(app.active_project().unwrap().name(), "trip_copy");

    let err = app
        .import_project(
            &source,
            |_| Err(VpicError::ConfirmationRequired("conflict".to_string())),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, VpicError::ConfirmationRequired(_));
}

#[test]
fn clear_and_delete_active_project() {
    let (temp, mut app) = app();
    app.create_project("tmp", &JsonOutput).unwrap();
    let folder = photo_folder(&temp, &["z.png"]);
    let details = ImageDetails {
        display_name: "Z".to_string(),
        ..ImageDetails::default()
    };
    app.add_image(&folder.join("z.png"), &details, &JsonOutput)
        .unwrap();

    let cleared = app.clear_project(&JsonOutput).unwrap();
    assert_eq!(cleared.removed_files, 3);
    assert_eq!(app.project_summary().unwrap().image_count, 0);

    let deleted = app.delete_project(&JsonOutput).unwrap();
    assert!(deleted.deleted);
    assert_matches!(app.active_project(), Err(VpicError::NoProjectSelected));
    assert!(app.list_projects(&JsonOutput).unwrap().projects.is_empty());
}
