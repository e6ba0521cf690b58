use std::collections::VecDeque;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::Project;
use crate::error::VpicError;
use crate::fs_util::list_files;
use crate::image::{ImageDetails, ImageMetadata, ImageStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BatchState {
    #[default]
    Idle,
    Scanning,
    AwaitingConfirmation,
    Processing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next(Utf8PathBuf),
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// 1-based position of the active item.
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub ingested: Vec<String>,
    pub skipped: usize,
    pub total: usize,
}

impl BatchSummary {
    pub fn message(&self) -> String {
        format!(
            "Batch upload complete! {} images were successfully uploaded.",
            self.ingested.len()
        )
    }
}

/// Files directly inside `folder` whose extension is in `extensions` (case-insensitive),
/// sorted by path. An empty result is not an error.
pub fn scan(folder: &Utf8Path, extensions: &[String]) -> Result<Vec<Utf8PathBuf>, VpicError> {
    if !folder.as_std_path().is_dir() {
        return Err(VpicError::InvalidFolder(format!("{folder} is not a directory")));
    }
    let images = list_files(folder)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    debug!(folder = %folder, found = images.len(), "scanned folder for images");
    Ok(images)
}

/// Queue-driven ingestion, one image at a time.
///
/// `Idle -> Scanning -> AwaitingConfirmation -> Processing -> Complete`. While
/// processing, the caller commits (ingests) the active item and then advances; advancing
/// without a commit skips it. Cancelling drops the remaining queue but never undoes
/// images that were already ingested.
#[derive(Debug, Default)]
pub struct BatchImport {
    state: BatchState,
    staged: Vec<Utf8PathBuf>,
    queue: VecDeque<Utf8PathBuf>,
    active: Option<Utf8PathBuf>,
    active_committed: bool,
    current: usize,
    total: usize,
    ingested: Vec<String>,
    skipped: usize,
}

impl BatchImport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            current: self.current,
            total: self.total,
        }
    }

    pub fn active(&self) -> Option<&Utf8Path> {
        self.active.as_deref()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn staged(&self) -> &[Utf8PathBuf] {
        &self.staged
    }

    /// Scans `folder` and holds the result for confirmation. Nothing found returns the
    /// workflow to `Idle`.
    pub fn stage(
        &mut self,
        folder: &Utf8Path,
        extensions: &[String],
    ) -> Result<&[Utf8PathBuf], VpicError> {
        self.require_not_processing("scan")?;
        self.reset();
        self.state = BatchState::Scanning;
        let found = match scan(folder, extensions) {
            Ok(found) => found,
            Err(err) => {
                self.state = BatchState::Idle;
                return Err(err);
            }
        };
        if found.is_empty() {
            self.state = BatchState::Idle;
        } else {
            self.staged = found;
            self.state = BatchState::AwaitingConfirmation;
        }
        Ok(&self.staged)
    }

    /// Starts processing whatever `stage` found.
    pub fn confirm(&mut self) -> Result<&Utf8Path, VpicError> {
        if self.state != BatchState::AwaitingConfirmation {
            return Err(VpicError::WorkflowState(
                "nothing staged to confirm".to_string(),
            ));
        }
        let queue = std::mem::take(&mut self.staged);
        self.start(queue)
    }

    pub fn start(&mut self, queue: Vec<Utf8PathBuf>) -> Result<&Utf8Path, VpicError> {
        self.require_not_processing("start")?;
        if queue.is_empty() {
            return Err(VpicError::WorkflowState("queue is empty".to_string()));
        }
        self.reset();
        self.queue = queue.into();
        self.total = self.queue.len();
        self.current = 1;
        self.active = self.queue.pop_front();
        self.state = BatchState::Processing;
        info!(total = self.total, "batch import started");
        self.active
            .as_deref()
            .ok_or_else(|| VpicError::WorkflowState("queue is empty".to_string()))
    }

    /// Ingests the active item. It stays active until `advance`, so a failed commit can
    /// be retried with corrected details.
    pub fn commit(
        &mut self,
        project: &Project,
        details: &ImageDetails,
    ) -> Result<ImageMetadata, VpicError> {
        if self.state != BatchState::Processing {
            return Err(VpicError::WorkflowState("no batch in progress".to_string()));
        }
        if self.active_committed {
            return Err(VpicError::WorkflowState(
                "active image already committed".to_string(),
            ));
        }
        let source = self
            .active
            .as_deref()
            .ok_or_else(|| VpicError::WorkflowState("no active image".to_string()))?;
        let metadata = ImageStore::ingest(project, source, details)?;
        self.ingested.push(metadata.filename.clone());
        self.active_committed = true;
        Ok(metadata)
    }

    pub fn advance(&mut self) -> Advance {
        if self.state != BatchState::Processing {
            return Advance::Done;
        }
        if !self.active_committed {
            self.skipped += 1;
        }
        self.active_committed = false;
        match self.queue.pop_front() {
            Some(next) => {
                self.current += 1;
                self.active = Some(next.clone());
                Advance::Next(next)
            }
            None => {
                self.active = None;
                self.state = BatchState::Complete;
                info!(
                    ingested = self.ingested.len(),
                    skipped = self.skipped,
                    "batch import complete"
                );
                Advance::Done
            }
        }
    }

    pub fn skip_current(&mut self) -> Advance {
        self.advance()
    }

    /// Back to `Idle`. Returns what had been done so far.
    pub fn cancel(&mut self) -> BatchSummary {
        let summary = self.summary();
        if self.state == BatchState::Processing {
            info!(
                ingested = summary.ingested.len(),
                dropped = self.queue.len(),
                "batch import cancelled"
            );
        }
        self.reset();
        summary
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            ingested: self.ingested.clone(),
            skipped: self.skipped,
            total: self.total,
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn require_not_processing(&self, operation: &str) -> Result<(), VpicError> {
        if self.state == BatchState::Processing {
            return Err(VpicError::WorkflowState(format!(
                "cannot {operation} while a batch is in progress"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn queue(names: &[&str]) -> Vec<Utf8PathBuf> {
        names.iter().map(|name| Utf8PathBuf::from(*name)).collect()
    }

    #[test]
    fn start_requires_items() {
        let mut batch = BatchImport::new();
        assert_matches!(batch.start(Vec::new()), Err(VpicError::WorkflowState(_)));
        assert_eq!(batch.state(), BatchState::Idle);
    }

    #[test]
    fn skipping_everything_completes() {
        let mut batch = BatchImport::new();
        batch.start(queue(&["/in/a.jpg", "/in/b.jpg"])).unwrap();
        assert_eq!(batch.active(), Some(Utf8Path::new("/in/a.jpg")));

        assert_eq!(batch.skip_current(), Advance::Next("/in/b.jpg".into()));
        assert_eq!(batch.progress(), BatchProgress { current: 2, total: 2 });
        assert_eq!(batch.skip_current(), Advance::Done);
        assert_eq!(batch.state(), BatchState::Complete);
        assert_eq!(batch.summary().skipped, 2);
        assert!(batch.active().is_none());
    }

    #[test]
    fn cancel_resets_to_idle() {
        let mut batch = BatchImport::new();
        batch.start(queue(&["a.png", "b.png", "c.png"])).unwrap();
        batch.advance();

        let summary = batch.cancel();
        assert_eq!(summary.total, 3);
        assert_eq!(batch.state(), BatchState::Idle);
        assert_eq!(batch.remaining(), 0);
        assert_eq!(batch.progress(), BatchProgress::default());
        assert_eq!(batch.advance(), Advance::Done);
    }

    #[test]
    fn confirm_without_stage_fails() {
        let mut batch = BatchImport::new();
        assert_matches!(batch.confirm(), Err(VpicError::WorkflowState(_)));
    }
}
