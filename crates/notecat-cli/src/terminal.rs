//! Terminal stand-ins for the folder chooser and the warning dialog.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use notecat_core::{Alerter, FolderPicker, PickError, PickerOptions};

/// Asks for a folder path on stderr/stdin. An empty line or EOF cancels.
///
/// When stdin is not a terminal it never reads: piped input belongs to the note.
pub struct TerminalPicker {
    pub interactive: bool,
}

impl TerminalPicker {
    pub fn for_stdin() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl FolderPicker for TerminalPicker {
    fn pick(&mut self, options: &PickerOptions) -> Result<Option<PathBuf>, PickError> {
        let mut stderr = io::stderr();
        if !self.interactive {
            writeln!(
                stderr,
                "No folder selected. Run `notecat change-folder PATH` to choose one."
            )?;
            return Ok(None);
        }
        let stdin = io::stdin();
        writeln!(stderr, "{}", options.message)?;
        loop {
            write!(stderr, "{}: ", options.prompt)?;
            stderr.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim();
            if line.is_empty() {
                return Ok(None);
            }
            let path = PathBuf::from(line);
            match accept(&path, options) {
                Ok(()) => return Ok(Some(path)),
                Err(reason) => writeln!(stderr, "{reason}")?,
            }
        }
    }
}

/// Answers with a path given on the command line, once.
pub struct PathPicker(pub Option<PathBuf>);

impl FolderPicker for PathPicker {
    fn pick(&mut self, options: &PickerOptions) -> Result<Option<PathBuf>, PickError> {
        let Some(path) = self.0.take() else {
            return Ok(None);
        };
        accept(&path, options).map_err(|reason| PickError::Io(io::Error::new(io::ErrorKind::InvalidInput, reason)))?;
        Ok(Some(path))
    }
}

/// Check a chosen path against the chooser options, creating it if allowed.
fn accept(path: &Path, options: &PickerOptions) -> Result<(), String> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        if options.directories_only {
            return Err(format!("not a folder: {}", path.display()));
        }
        return Ok(());
    }
    if !options.allow_create {
        return Err(format!("no such folder: {}", path.display()));
    }
    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    tracing::info!(dir = %path.display(), "created notes folder");
    Ok(())
}

/// Prints warnings to stderr.
pub struct TerminalAlerter;

impl Alerter for TerminalAlerter {
    fn warn(&mut self, message: &str) {
        eprintln!("warning: {message}");
    }
}
