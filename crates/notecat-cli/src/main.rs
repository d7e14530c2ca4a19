//! CLI entry point for NoteCat. Stands in for the capture window.

mod terminal;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use notecat_core::{
    app_data_dir, load_config, save_config, App, Config, FileDefaults, FolderPicker, GrantManager, NoopScope, Reply,
    Restore, SystemClock, CONFIG_FILENAME,
};
use tracing_subscriber::EnvFilter;

use terminal::{PathPicker, TerminalAlerter, TerminalPicker};

#[derive(Parser)]
#[command(name = "notecat")]
#[command(about = "NoteCat: capture a quick note into your notes folder")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Save a note (from --text or stdin) into the selected folder. The default.
    Capture {
        /// Note text. Read from stdin when omitted.
        #[arg(short, long)]
        text: Option<String>,
        /// Print the saved note as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the selected folder.
    Folder,
    /// Choose a different folder for notes.
    ChangeFolder {
        /// Folder to use. Asks interactively when omitted.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Forget the selected folder; the next capture asks again.
    ForgetFolder,
    /// Show where NoteCat stores its config and saved folder.
    DataDir,
    /// Write a default config.toml to the app data directory if there is none.
    InitConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Commands::Capture { text: None, json: false })) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Capture { text, json } => capture(text, json),
        Commands::Folder => {
            let store = FileDefaults::open_default()?;
            let mut grants = GrantManager::new(Box::new(store), Rc::new(NoopScope));
            match grants.restore_grant() {
                Ok(Restore::Restored(grant)) => print_folder(Some(grant.directory())),
                Ok(Restore::NotFound) => print_folder(None),
                Ok(Restore::Stale(path)) => {
                    print_folder(None);
                    eprintln!("(saved folder {} has moved or been removed)", path.display());
                }
                Err(e) => {
                    print_folder(None);
                    eprintln!("warning: {e}");
                }
            }
            grants.release_grant();
            Ok(ExitCode::SUCCESS)
        }
        Commands::ChangeFolder { path } => {
            let picker: Box<dyn FolderPicker> = match path {
                Some(p) => Box::new(PathPicker(Some(p))),
                None => Box::new(TerminalPicker::for_stdin()),
            };
            let mut app = build_app(picker)?;
            let reply = app.pick_folder();
            app.terminate();
            match reply {
                Reply::FolderSelected(dir) => {
                    print_folder(Some(&dir));
                    Ok(ExitCode::SUCCESS)
                }
                _ => Ok(ExitCode::FAILURE),
            }
        }
        Commands::ForgetFolder => {
            let mut app = build_app(Box::new(TerminalPicker::for_stdin()))?;
            let reply = app.forget_folder();
            app.terminate();
            Ok(if reply == Reply::FolderCleared {
                print_folder(None);
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::DataDir => {
            match app_data_dir() {
                Some(p) => println!("{}", p.display()),
                None => eprintln!("Could not determine app data directory."),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::InitConfig => {
            let dir = app_data_dir().context("could not determine app data directory")?;
            let path = dir.join(CONFIG_FILENAME);
            if path.exists() {
                println!("{} already exists", path.display());
            } else {
                save_config(&Config::default())?;
                println!("Wrote {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn capture(text: Option<String>, json: bool) -> anyhow::Result<ExitCode> {
    let mut stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut app = build_app(Box::new(TerminalPicker { interactive }))?;
    let reply = capture_with(&mut app, text, &mut stdin, interactive)?;
    app.terminate();
    match reply {
        Reply::Saved(note) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                println!("Saved {}", note.path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Launch, then save the note from `text` or `input`.
///
/// Piped input is read before launch so a first-run folder prompt can't consume it.
fn capture_with(
    app: &mut App,
    text: Option<String>,
    input: &mut dyn Read,
    interactive: bool,
) -> anyhow::Result<Reply> {
    let piped = match &text {
        None if !interactive => Some(read_note(input)?),
        _ => None,
    };

    app.launch();
    print_folder(app.selected_folder());

    let text = match text.or(piped) {
        Some(t) => t,
        None => {
            eprintln!("Type your note, then press Ctrl-D to save.");
            read_note(input)?
        }
    };
    app.buffer_mut().set(text);

    let mut reply = app.save();
    if let Reply::FolderSelected(_) = reply {
        reply = app.save();
    }
    Ok(reply)
}

fn read_note(input: &mut dyn Read) -> anyhow::Result<String> {
    let mut s = String::new();
    input
        .read_to_string(&mut s)
        .context("failed to read note from stdin")?;
    Ok(s)
}

fn build_app(picker: Box<dyn FolderPicker>) -> anyhow::Result<App> {
    let config = load_config();
    let store = FileDefaults::open_default().context("cannot open saved settings")?;
    Ok(App::new(
        &config,
        Box::new(store),
        Rc::new(NoopScope),
        Rc::new(SystemClock),
        picker,
        Box::new(TerminalAlerter),
    ))
}

fn print_folder(dir: Option<&std::path::Path>) {
    match dir {
        Some(d) => println!("Selected Folder: {}", d.display()),
        None => println!("Selected Folder: None"),
    }
}
