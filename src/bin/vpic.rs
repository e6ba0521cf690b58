use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use vpic_manager::app::{App, BatchDecision, BatchDriver, ProgressSink};
use vpic_manager::batch::BatchProgress;
use vpic_manager::config::ConfigLoader;
use vpic_manager::domain::ConflictResolution;
use vpic_manager::error::VpicError;
use vpic_manager::image::ImageDetails;
use vpic_manager::output::{ConsoleOutput, JsonOutput, OutputMode};
use vpic_manager::store::ProjectStore;
use vpic_manager::tui::{self, Tui, TuiBatchDriver};

#[derive(Parser)]
#[command(name = "vpic")]
#[command(about = "Project-based picture manager: albums, tags and batch uploads")]
#[command(version, author)]
struct Cli {
    /// Path to a vpic.json config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory holding all projects (overrides the config)
    #[arg(long, global = true)]
    root: Option<Utf8PathBuf>,

    /// Project to operate on
    #[arg(long, short = 'p', global = true)]
    project: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create, open, import, clear or delete projects")]
    Project(ProjectArgs),
    #[command(about = "Manage albums of the selected project")]
    Album(AlbumArgs),
    #[command(about = "Upload or view single images")]
    Image(ImageArgs),
    #[command(about = "Upload every image in a folder, one at a time")]
    Batch(BatchArgs),
    #[command(about = "Rewrite image album references from the album files")]
    Sync,
}

#[derive(Args)]
struct ProjectArgs {
    #[command(subcommand)]
    command: ProjectCommand,
}

#[derive(Subcommand)]
enum ProjectCommand {
    #[command(about = "List projects")]
    List,
    #[command(about = "Create a new project")]
    Create { name: String },
    #[command(about = "Open a project and show its summary")]
    Open { name: String },
    #[command(about = "Copy an existing project folder into the projects root")]
    Import(ImportArgs),
    #[command(about = "Remove all images and albums, keeping the project")]
    Clear(ConfirmArgs),
    #[command(about = "Delete the project directory")]
    Delete(ConfirmArgs),
}

#[derive(Args)]
struct ImportArgs {
    source: Utf8PathBuf,

    /// What to do when a project with the same name exists
    #[arg(long, value_enum)]
    on_conflict: Option<ConflictResolution>,
}

#[derive(Args)]
struct ConfirmArgs {
    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct AlbumArgs {
    #[command(subcommand)]
    command: AlbumCommand,
}

#[derive(Subcommand)]
enum AlbumCommand {
    #[command(about = "List albums")]
    List,
    #[command(about = "Create an album")]
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    #[command(about = "Show the images of an album")]
    Show { name: String },
}

#[derive(Args)]
struct ImageArgs {
    #[command(subcommand)]
    command: ImageCommand,
}

#[derive(Subcommand)]
enum ImageCommand {
    #[command(about = "Upload one image into the default album")]
    Add {
        file: Utf8PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Comma separated
        #[arg(long, default_value = "")]
        tags: String,
    },
    #[command(about = "Show an image's metadata")]
    Show { filename: String },
}

#[derive(Args)]
struct BatchArgs {
    folder: Utf8PathBuf,

    /// Description applied to every image in non-interactive mode
    #[arg(long, default_value = "")]
    description: String,

    /// Tags applied to every image in non-interactive mode
    #[arg(long, default_value = "")]
    tags: String,

    #[arg(long)]
    yes: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<VpicError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &VpicError) -> u8 {
    match error {
        VpicError::NoProjectSelected | VpicError::NotFound(_) | VpicError::ConfigRead(_) => 2,
        VpicError::Filesystem(_) | VpicError::Corrupt { .. } | VpicError::Terminal(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr.with_filter(|_| !tui::screen_active()))
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.projects_root = root;
    }
    let mut app = App::new(ProjectStore::new(&config), config.image_extensions.clone());

    match cli.command {
        Commands::Project(args) => run_project(args.command, &mut app, cli.project, output_mode),
        Commands::Album(args) => {
            select(&mut app, cli.project)?;
            run_album(args.command, &app, output_mode)
        }
        Commands::Image(args) => {
            select(&mut app, cli.project)?;
            run_image(args.command, &app, output_mode)
        }
        Commands::Batch(args) => {
            select(&mut app, cli.project)?;
            run_batch(args, &app, output_mode)
        }
        Commands::Sync => {
            select(&mut app, cli.project)?;
            let report = app.sync(sink(output_mode))?;
            emit(output_mode, &report, || {
                println!("Updated {} image(s).", report.updated.len());
                for filename in &report.unfiled {
                    println!("Not in any album: {filename}");
                }
            })
        }
    }
}

fn sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &ConsoleOutput,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

/// JSON in non-interactive mode, otherwise whatever `human` prints.
fn emit<T: Serialize>(output_mode: OutputMode, value: &T, human: impl FnOnce()) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_json(value).into_diagnostic(),
        OutputMode::Interactive => {
            human();
            Ok(())
        }
    }
}

fn select(app: &mut App, project: Option<String>) -> Result<(), VpicError> {
    let name = project.ok_or(VpicError::NoProjectSelected)?;
    app.open_project(&name, &JsonOutput)?;
    Ok(())
}

fn confirm(output_mode: OutputMode, yes: bool, question: &str) -> Result<bool, VpicError> {
    if yes {
        return Ok(true);
    }
    match output_mode {
        OutputMode::Interactive => Tui::confirm("Confirm", question),
        OutputMode::NonInteractive => Err(VpicError::ConfirmationRequired(question.to_string())),
    }
}

fn run_project(
    command: ProjectCommand,
    app: &mut App,
    project: Option<String>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        ProjectCommand::List => {
            let result = app.list_projects(&JsonOutput)?;
            emit(output_mode, &result, || {
                if result.projects.is_empty() {
                    println!("No projects in {}", result.projects_root);
                }
                for name in &result.projects {
                    println!("{name}");
                }
            })
        }
        ProjectCommand::Create { name } => {
            let summary = app.create_project(&name, sink(output_mode))?;
            emit(output_mode, &summary, || {
                println!("Created project {} at {}", summary.name, summary.path);
            })
        }
        ProjectCommand::Open { name } => {
            let summary = app.open_project(&name, sink(output_mode))?;
            emit(output_mode, &summary, || {
                println!("{} ({})", summary.name, summary.path);
                println!("  images: {}", summary.image_count);
                println!("  albums: {}", summary.albums.join(", "));
            })
        }
        ProjectCommand::Import(args) => {
            let on_conflict = args.on_conflict;
            let result = app.import_project(
                &args.source,
                |conflict| match (on_conflict, output_mode) {
                    (Some(choice), _) => Ok(choice),
                    (None, OutputMode::Interactive) => Tui::choose_conflict(conflict),
                    (None, OutputMode::NonInteractive) => Err(VpicError::ConfirmationRequired(
                        format!(
                            "project '{}' already exists; pass --on-conflict",
                            conflict.name
                        ),
                    )),
                },
                sink(output_mode),
            )?;
            emit(output_mode, &result, || match &result.project {
                Some(name) => println!("Imported project {name}"),
                None => println!("Import cancelled"),
            })
        }
        ProjectCommand::Clear(args) => {
            select(app, project)?;
            let name = app.active_project()?.name().to_string();
            let question = format!("Clear all images and albums from project '{name}'?");
            if !confirm(output_mode, args.yes, &question)? {
                return Ok(());
            }
            let result = app.clear_project(sink(output_mode))?;
            emit(output_mode, &result, || {
                println!("Cleared {} ({} files removed)", result.project, result.removed_files);
            })
        }
        ProjectCommand::Delete(args) => {
            select(app, project)?;
            let name = app.active_project()?.name().to_string();
            let question = format!("Delete project '{name}'? This cannot be undone.");
            if !confirm(output_mode, args.yes, &question)? {
                return Ok(());
            }
            let result = app.delete_project(sink(output_mode))?;
            emit(output_mode, &result, || println!("Deleted project {}", result.project))
        }
    }
}

fn run_album(command: AlbumCommand, app: &App, output_mode: OutputMode) -> miette::Result<()> {
    match command {
        AlbumCommand::List => {
            let result = app.list_albums()?;
            emit(output_mode, &result, || {
                for album in &result.albums {
                    println!("{} ({} images)", album.name, album.image_count);
                }
            })
        }
        AlbumCommand::Create { name, description } => {
            let album = app.create_album(&name, &description)?;
            emit(output_mode, &album, || println!("Created album {}", album.name))
        }
        AlbumCommand::Show { name } => {
            let view = app.show_album(&name)?;
            emit(output_mode, &view, || {
                println!("{}", view.name);
                if !view.description.is_empty() {
                    println!("{}", view.description);
                }
                for entry in &view.images {
                    println!("  {}  {}", entry.display_name, entry.filename);
                }
            })
        }
    }
}

fn run_image(command: ImageCommand, app: &App, output_mode: OutputMode) -> miette::Result<()> {
    match command {
        ImageCommand::Add {
            file,
            name,
            description,
            tags,
        } => {
            let details = ImageDetails {
                display_name: name,
                description,
                tags,
            };
            let metadata = app.add_image(&file, &details, sink(output_mode))?;
            emit(output_mode, &metadata, || {
                println!("Image uploaded successfully as {}", metadata.filename);
            })
        }
        ImageCommand::Show { filename } => {
            let view = app.show_image(&filename)?;
            emit(output_mode, &view, || {
                println!("{}", view.display_name);
                println!("  file:        {}", view.path);
                println!("  description: {}", view.description);
                println!("  tags:        {}", view.tags);
                println!("  album:       {}", view.album);
                println!("  uploaded:    {}", view.upload_date);
            })
        }
    }
}

fn run_batch(args: BatchArgs, app: &App, output_mode: OutputMode) -> miette::Result<()> {
    let result = match output_mode {
        OutputMode::Interactive => {
            let mut driver = TuiBatchDriver::new();
            let progress = driver.progress();
            app.batch_import(&args.folder, &mut driver, &progress)?
        }
        OutputMode::NonInteractive => {
            let mut driver = FixedDetailsDriver {
                description: args.description,
                tags: args.tags,
                assume_yes: args.yes,
            };
            app.batch_import(&args.folder, &mut driver, &JsonOutput)?
        }
    };
    emit(output_mode, &result, || println!("{}", result.message))
}

/// Names each image after its file stem and applies the same description and tags.
/// Images that fail to upload are skipped.
struct FixedDetailsDriver {
    description: String,
    tags: String,
    assume_yes: bool,
}

impl BatchDriver for FixedDetailsDriver {
    fn confirm_queue(
        &mut self,
        folder: &Utf8Path,
        files: &[Utf8PathBuf],
    ) -> Result<bool, VpicError> {
        if self.assume_yes {
            return Ok(true);
        }
        Err(VpicError::ConfirmationRequired(format!(
            "upload {} images from {folder}",
            files.len()
        )))
    }

    fn describe(
        &mut self,
        source: &Utf8Path,
        _progress: BatchProgress,
        last_error: Option<&VpicError>,
    ) -> Result<BatchDecision, VpicError> {
        if last_error.is_some() {
            return Ok(BatchDecision::Skip);
        }
        Ok(BatchDecision::Commit(ImageDetails {
            display_name: source.file_stem().unwrap_or_default().to_string(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }))
    }
}
