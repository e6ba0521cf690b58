use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{BatchDecision, BatchDriver, ProgressEvent, ProgressSink};
use crate::batch::BatchProgress;
use crate::domain::ConflictResolution;
use crate::error::VpicError;
use crate::image::ImageDetails;
use crate::store::ImportConflict;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MISSING_NAME: &str = "Please provide a name for your image";

type Backend = CrosstermBackend<Stdout>;

static SCREEN_ACTIVE: AtomicBool = AtomicBool::new(false);

/// True while a dialog owns the terminal. Log output to stderr is held back meanwhile.
pub fn screen_active() -> bool {
    SCREEN_ACTIVE.load(Ordering::Relaxed)
}

fn terminal_error(err: io::Error) -> VpicError {
    VpicError::Terminal(err.to_string())
}

/// Alternate screen in raw mode for as long as it lives.
struct Screen {
    terminal: Terminal<Backend>,
}

impl Screen {
    fn enter() -> Result<Self, VpicError> {
        let mut stdout = io::stdout();
        enable_raw_mode().map_err(terminal_error)?;
        SCREEN_ACTIVE.store(true, Ordering::Relaxed);
        stdout
            .execute(EnterAlternateScreen)
            .map_err(terminal_error)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(terminal_error)?;
        terminal.clear().map_err(terminal_error)?;
        Ok(Self { terminal })
    }

    fn next_key(&mut self) -> Result<Option<KeyEvent>, VpicError> {
        if !event::poll(POLL_INTERVAL).map_err(terminal_error)? {
            return Ok(None);
        }
        match event::read().map_err(terminal_error)? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    fn draw_message(&mut self, title: &str, lines: Vec<Line<'static>>) -> Result<(), VpicError> {
        self.terminal
            .draw(|frame| {
                let block = Block::default().borders(Borders::ALL).title(title.to_string());
                let text = Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(block);
                frame.render_widget(text, frame.area());
            })
            .map_err(terminal_error)?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
        SCREEN_ACTIVE.store(false, Ordering::Relaxed);
    }
}

fn hint(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::Gray),
    ))
}

pub struct Tui;

impl Tui {
    /// y/n dialog. Esc counts as no.
    pub fn confirm(title: &str, message: &str) -> Result<bool, VpicError> {
        let mut screen = Screen::enter()?;
        loop {
            screen.draw_message(
                title,
                vec![
                    Line::from(message.to_string()),
                    Line::from(""),
                    hint("Press y to confirm, n to cancel."),
                ],
            )?;
            if let Some(key) = screen.next_key()? {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return Ok(false),
                    _ => {}
                }
            }
        }
    }

    pub fn choose_conflict(conflict: &ImportConflict) -> Result<ConflictResolution, VpicError> {
        let mut screen = Screen::enter()?;
        loop {
            screen.draw_message(
                "Project exists",
                vec![
                    Line::from(format!(
                        "A project named '{}' already exists.",
                        conflict.name
                    )),
                    Line::from(""),
                    Line::from(format!("r  rename the import to '{}'", conflict.rename_to)),
                    Line::from("o  overwrite the existing project"),
                    Line::from("c  cancel"),
                ],
            )?;
            if let Some(key) = screen.next_key()? {
                match key.code {
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        return Ok(ConflictResolution::Rename);
                    }
                    KeyCode::Char('o') | KeyCode::Char('O') => {
                        return Ok(ConflictResolution::Overwrite);
                    }
                    KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => {
                        return Ok(ConflictResolution::Cancel);
                    }
                    _ => {}
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Description,
    Tags,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Name => Field::Description,
            Field::Description => Field::Tags,
            Field::Tags => Field::Name,
        }
    }

    fn previous(self) -> Self {
        match self {
            Field::Name => Field::Tags,
            Field::Description => Field::Name,
            Field::Tags => Field::Description,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Description => "Description",
            Field::Tags => "Tags (comma separated)",
        }
    }
}

/// Name, description and tags for one image. Enter walks the fields in order and
/// submits from the last one.
#[derive(Debug)]
struct ImageForm {
    details: ImageDetails,
    focus: Field,
    error: Option<String>,
}

#[derive(Debug)]
enum FormAction {
    Continue,
    Submit,
    Skip,
    Cancel,
}

impl ImageForm {
    fn for_source(source: &Utf8Path) -> Self {
        Self::with_details(ImageDetails {
            display_name: source.file_stem().unwrap_or_default().to_string(),
            ..ImageDetails::default()
        })
    }

    fn with_details(details: ImageDetails) -> Self {
        Self {
            details,
            focus: Field::Name,
            error: None,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.details.display_name,
            Field::Description => &mut self.details.description,
            Field::Tags => &mut self.details.tags,
        }
    }

    fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.details.display_name,
            Field::Description => &self.details.description,
            Field::Tags => &self.details.tags,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Esc => FormAction::Cancel,
            KeyCode::F(2) => FormAction::Skip,
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                FormAction::Continue
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.previous();
                FormAction::Continue
            }
            KeyCode::Enter => {
                if self.details.display_name.trim().is_empty() {
                    self.error = Some(MISSING_NAME.to_string());
                    self.focus = Field::Name;
                    return FormAction::Continue;
                }
                if self.focus == Field::Tags {
                    FormAction::Submit
                } else {
                    self.focus = self.focus.next();
                    FormAction::Continue
                }
            }
            KeyCode::Backspace => {
                let focus = self.focus;
                self.value_mut(focus).pop();
                FormAction::Continue
            }
            KeyCode::Char(ch) => {
                let focus = self.focus;
                self.value_mut(focus).push(ch);
                self.error = None;
                FormAction::Continue
            }
            _ => FormAction::Continue,
        }
    }
}

fn draw_form(
    frame: &mut ratatui::Frame,
    source: &Utf8Path,
    progress: BatchProgress,
    form: &ImageForm,
    status: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(1),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("Image {} of {}  ", progress.current, progress.total),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(source.file_name().unwrap_or(source.as_str()).to_string()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Batch upload"));
    frame.render_widget(header, chunks[0]);

    for (area, field) in chunks[1..4]
        .iter()
        .zip([Field::Name, Field::Description, Field::Tags])
    {
        let style = if form.focus == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let input = Paragraph::new(form.value(field).to_string()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style)
                .title(field.label()),
        );
        frame.render_widget(input, *area);
    }

    let mut lines = Vec::with_capacity(2);
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(status) = status {
        lines.push(Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Green),
        )));
    }
    frame.render_widget(Paragraph::new(lines), chunks[4]);
    frame.render_widget(
        Paragraph::new(hint(
            "Tab next field | Enter continue/upload | F2 skip image | Esc cancel batch",
        )),
        chunks[5],
    );
}

/// Interactive `BatchDriver`: one screen session for the whole batch.
#[derive(Default)]
pub struct TuiBatchDriver {
    screen: Option<Screen>,
    status: Arc<Mutex<Option<String>>>,
    /// Last submitted details, offered again when that commit fails.
    submitted: Option<(Utf8PathBuf, ImageDetails)>,
}

/// Progress sink that feeds the batch form's status line instead of stderr.
pub struct TuiBatchProgress {
    status: Arc<Mutex<Option<String>>>,
}

impl ProgressSink for TuiBatchProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut status) = self.status.lock() {
            *status = Some(event.message.trim().to_string());
        }
    }
}

impl TuiBatchDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> TuiBatchProgress {
        TuiBatchProgress {
            status: Arc::clone(&self.status),
        }
    }

    fn status(&self) -> Option<String> {
        self.status.lock().ok().and_then(|status| status.clone())
    }

    fn form_for(&self, source: &Utf8Path, last_error: Option<&VpicError>) -> ImageForm {
        let Some(err) = last_error else {
            return ImageForm::for_source(source);
        };
        let mut form = match &self.submitted {
            Some((submitted, details)) if submitted == source => {
                ImageForm::with_details(details.clone())
            }
            _ => ImageForm::for_source(source),
        };
        form.error = Some(match err {
            VpicError::MissingName => MISSING_NAME.to_string(),
            other => format!("Upload failed: {other}"),
        });
        form
    }

    fn screen(&mut self) -> Result<&mut Screen, VpicError> {
        if self.screen.is_none() {
            self.screen = Some(Screen::enter()?);
        }
        self.screen
            .as_mut()
            .ok_or_else(|| VpicError::Terminal("screen unavailable".to_string()))
    }
}

impl BatchDriver for TuiBatchDriver {
    fn confirm_queue(
        &mut self,
        folder: &Utf8Path,
        files: &[Utf8PathBuf],
    ) -> Result<bool, VpicError> {
        let screen = self.screen()?;
        loop {
            screen.draw_message(
                "Batch upload",
                vec![
                    Line::from(format!("Found {} images in {folder}.", files.len())),
                    Line::from("Each image will be named and tagged before upload."),
                    Line::from(""),
                    hint("Press y to start, n to cancel."),
                ],
            )?;
            if let Some(key) = screen.next_key()? {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => return Ok(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return Ok(false),
                    _ => {}
                }
            }
        }
    }

    fn describe(
        &mut self,
        source: &Utf8Path,
        progress: BatchProgress,
        last_error: Option<&VpicError>,
    ) -> Result<BatchDecision, VpicError> {
        let mut form = self.form_for(source, last_error);
        let status = self.status();
        let screen = self.screen()?;
        loop {
            screen
                .terminal
                .draw(|frame| draw_form(frame, source, progress, &form, status.as_deref()))
                .map_err(terminal_error)?;
            let Some(key) = screen.next_key()? else {
                continue;
            };
            match form.handle_key(key) {
                FormAction::Continue => {}
                FormAction::Submit => {
                    self.submitted = Some((source.to_path_buf(), form.details.clone()));
                    return Ok(BatchDecision::Commit(form.details));
                }
                FormAction::Skip => return Ok(BatchDecision::Skip),
                FormAction::Cancel => return Ok(BatchDecision::Cancel),
            }
        }
    }
}
