//! Writing the note buffer to a new markdown file in the granted folder.
//!
//! Filenames are `<timestamp> - <title>.md`, where the title comes from the
//! first line of the note and the timestamp sorts lexically.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tempfile::NamedTempFile;
use unicode_segmentation::UnicodeSegmentation;

use crate::clock::Clock;
use crate::grant::FolderGrant;
use crate::scope::{AccessScope, ScopedAccess};

/// Title used when the first line is empty.
pub const FALLBACK_TITLE: &str = "Note";
pub const TITLE_MAX_CHARS: usize = 30;
pub const ELLIPSIS: &str = "...";
/// `YYYY-MM-DD-HHmmss`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Characters that are reserved on at least one common filesystem.
const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Text currently in the input surface.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NoteBuffer {
    text: String,
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl From<&str> for NoteBuffer {
    fn from(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

impl From<String> for NoteBuffer {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// A note that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFile {
    pub path: PathBuf,
    pub filename: String,
    pub timestamp: String,
    /// Length of the UTF-8 content.
    pub bytes: usize,
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// First line of `text`, cut to [`TITLE_MAX_CHARS`] user-perceived characters (grapheme
/// clusters) with [`ELLIPSIS`] appended when cut.
pub fn derive_title(text: &str) -> String {
    let first = text.split(is_line_break).next().unwrap_or_default();
    if first.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    match first.grapheme_indices(true).nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &first[..cut]),
        None => first.to_string(),
    }
}

/// Replace filesystem-reserved characters with `-`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if RESERVED.contains(&c) { '-' } else { c })
        .collect()
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn note_filename(timestamp: &str, title: &str) -> String {
    format!("{timestamp} - {title}.md")
}

/// `name.md` -> `name (n).md`
fn numbered(filename: &str, n: usize) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    format!("{stem} ({n}).md")
}

pub struct NoteWriter {
    scope: Rc<dyn AccessScope>,
    clock: Rc<dyn Clock>,
    unique_filenames: bool,
}

impl NoteWriter {
    pub fn new(scope: Rc<dyn AccessScope>, clock: Rc<dyn Clock>) -> Self {
        Self {
            scope,
            clock,
            unique_filenames: false,
        }
    }

    /// When set, a name collision gets a ` (2)`, ` (3)`, ... suffix instead of overwriting.
    pub fn unique_filenames(mut self, on: bool) -> Self {
        self.unique_filenames = on;
        self
    }

    /// Write `buffer` as a new note in the grant's directory.
    ///
    /// Nothing touches the filesystem unless there is a grant and the buffer is non-empty.
    /// The buffer is never modified here; clearing it after success is up to the caller.
    pub fn save(&self, buffer: &NoteBuffer, grant: Option<&FolderGrant>) -> Result<NoteFile, SaveError> {
        let dir = match grant {
            Some(g) if !g.directory().as_os_str().is_empty() => g.directory(),
            _ => return Err(SaveError::NoFolderSelected),
        };
        if buffer.is_empty() {
            return Err(SaveError::EmptyNote);
        }

        let timestamp = format_timestamp(self.clock.now());
        let title = sanitize_title(&derive_title(buffer.as_str()));
        let filename = note_filename(&timestamp, &title);

        let _access = ScopedAccess::begin(self.scope.clone(), dir);
        let content = buffer.as_str().as_bytes();
        let path = if self.unique_filenames {
            write_new(dir, &filename, content)?
        } else {
            let path = dir.join(&filename);
            write_atomic(&path, content).map_err(|source| SaveError::WriteFailed {
                path: path.clone(),
                source,
            })?;
            path
        };

        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or(filename);
        tracing::info!(path = %path.display(), bytes = content.len(), "saved note");
        Ok(NoteFile {
            path,
            filename,
            timestamp,
            bytes: content.len(),
        })
    }
}

/// Temp file holding `content`, created with ordinary file permissions (0o666 less umask)
/// so the note is as readable as any other file in the folder.
fn temp_with(dir: &Path, content: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Write to a temp file next to `path`, then rename it over `path`.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    temp_with(dir, content)?.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Like [`write_atomic`] but never replaces an existing file; tries numbered names instead.
fn write_new(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, SaveError> {
    let mut tmp = temp_with(dir, content).map_err(|source| SaveError::WriteFailed {
        path: dir.join(filename),
        source,
    })?;
    let mut n = 1;
    loop {
        let name = if n == 1 { filename.to_string() } else { numbered(filename, n) };
        let path = dir.join(&name);
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                n += 1;
            }
            Err(e) => return Err(SaveError::WriteFailed { path, source: e.error }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("no folder selected")]
    NoFolderSelected,
    #[error("note is empty")]
    EmptyNote,
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;
    use crate::scope::testing::CountingScope;

    fn at_0930() -> FixedClock {
        let t = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        FixedClock(t)
    }

    fn writer(scope: Rc<CountingScope>) -> NoteWriter {
        NoteWriter::new(scope, Rc::new(at_0930()))
    }

    fn grant(dir: &Path) -> FolderGrant {
        FolderGrant::new(dir, b"token".to_vec())
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn title_is_first_line() {
        assert_eq!(derive_title("Hello\nWorld"), "Hello");
        assert_eq!(derive_title("Hello\r\nWorld"), "Hello");
        assert_eq!(derive_title("Only line"), "Only line");
    }

    #[test]
    fn long_title_is_truncated() {
        let line = "abcdefghij".repeat(4) + "12345";
        assert_eq!(line.chars().count(), 45);
        assert_eq!(derive_title(&line), format!("{}...", &line[..30]));
        assert_eq!(derive_title(&"x".repeat(30)), "x".repeat(30));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let line = "é".repeat(31);
        assert_eq!(derive_title(&line), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn truncation_keeps_grapheme_clusters_whole() {
        // "e" + combining acute: two chars, one user-perceived character.
        let accented = "e\u{301}";
        assert_eq!(derive_title(&accented.repeat(30)), accented.repeat(30));
        assert_eq!(
            derive_title(&accented.repeat(31)),
            format!("{}...", accented.repeat(30))
        );

        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        let line = format!("{}{family}tail", "x".repeat(29));
        assert_eq!(derive_title(&line), format!("{}{family}...", "x".repeat(29)));
    }

    #[test]
    fn empty_first_line_falls_back() {
        assert_eq!(derive_title("\nsecond"), "Note");
        assert_eq!(derive_title("\u{2028}second"), "Note");
    }

    #[test]
    fn whitespace_first_line_is_kept() {
        assert_eq!(derive_title("   \nbody"), "   ");
    }

    #[test]
    fn sanitize_replaces_reserved() {
        assert_eq!(sanitize_title("a/b:c*d"), "a-b-c-d");
        assert_eq!(sanitize_title(r#"\?"<>|"#), "------");
        assert_eq!(sanitize_title("plain title"), "plain title");
    }

    #[test]
    fn timestamp_format() {
        assert_eq!(format_timestamp(at_0930().0), "2024-01-15-093000");
    }

    #[test]
    fn meeting_notes_scenario() {
        let vault = tempfile::tempdir().unwrap();
        let note = writer(Rc::default())
            .save(&NoteBuffer::from("Meeting notes"), Some(&grant(vault.path())))
            .unwrap();

        let expected = vault.path().join("2024-01-15-093000 - Meeting notes.md");
        assert_eq!(note.path, expected);
        assert_eq!(note.filename, "2024-01-15-093000 - Meeting notes.md");
        assert_eq!(note.timestamp, "2024-01-15-093000");
        assert_eq!(note.bytes, 13);
        assert_eq!(std::fs::read_to_string(&expected).unwrap(), "Meeting notes");
    }

    #[test]
    fn writes_exactly_one_file_with_buffer_content() {
        let vault = tempfile::tempdir().unwrap();
        let text = "a/b: todo?\nline two\n\n  ünïcødé ✓\n";
        let buffer = NoteBuffer::from(text);
        let note = writer(Rc::default()).save(&buffer, Some(&grant(vault.path()))).unwrap();

        assert_eq!(entries(vault.path()), vec!["2024-01-15-093000 - a-b- todo-.md".to_string()]);
        assert_eq!(std::fs::read(&note.path).unwrap(), text.as_bytes());
        assert_eq!(buffer.as_str(), text);
    }

    #[cfg(unix)]
    #[test]
    fn saved_note_has_ordinary_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let vault = tempfile::tempdir().unwrap();
        let plain = vault.path().join("plain.txt");
        std::fs::write(&plain, "x").unwrap();
        let expected = std::fs::metadata(&plain).unwrap().permissions().mode() & 0o777;

        let g = grant(vault.path());
        let note = writer(Rc::default())
            .save(&NoteBuffer::from("Meeting notes"), Some(&g))
            .unwrap();
        let mode = std::fs::metadata(&note.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected);

        let unique = writer(Rc::default())
            .unique_filenames(true)
            .save(&NoteBuffer::from("Meeting notes"), Some(&g))
            .unwrap();
        let mode = std::fs::metadata(&unique.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected);
    }

    #[test]
    fn no_grant_writes_nothing() {
        let scope = Rc::new(CountingScope::default());
        let err = writer(scope.clone()).save(&NoteBuffer::from("hi"), None).unwrap_err();
        assert!(matches!(err, SaveError::NoFolderSelected));
        assert_eq!(scope.begins.get(), 0);
    }

    #[test]
    fn empty_directory_is_no_folder() {
        let err = writer(Rc::default())
            .save(&NoteBuffer::from("hi"), Some(&grant(Path::new(""))))
            .unwrap_err();
        assert!(matches!(err, SaveError::NoFolderSelected));
    }

    #[test]
    fn empty_buffer_writes_nothing() {
        let vault = tempfile::tempdir().unwrap();
        let err = writer(Rc::default())
            .save(&NoteBuffer::new(), Some(&grant(vault.path())))
            .unwrap_err();
        assert!(matches!(err, SaveError::EmptyNote));
        assert!(entries(vault.path()).is_empty());
    }

    #[test]
    fn whitespace_only_note_is_saved_as_note() {
        let vault = tempfile::tempdir().unwrap();
        let note = writer(Rc::default())
            .save(&NoteBuffer::from("\n\n"), Some(&grant(vault.path())))
            .unwrap();
        assert_eq!(note.filename, "2024-01-15-093000 - Note.md");
    }

    #[test]
    fn missing_directory_fails_and_ends_session() {
        let root = tempfile::tempdir().unwrap();
        let gone = root.path().join("deleted-vault");
        let scope = Rc::new(CountingScope::default());

        let err = writer(scope.clone())
            .save(&NoteBuffer::from("hi"), Some(&grant(&gone)))
            .unwrap_err();
        assert!(matches!(err, SaveError::WriteFailed { .. }));
        assert_eq!(scope.begins.get(), 1);
        assert_eq!(scope.ends.get(), 1);
    }

    #[test]
    fn successful_save_ends_session() {
        let vault = tempfile::tempdir().unwrap();
        let scope = Rc::new(CountingScope::default());
        writer(scope.clone())
            .save(&NoteBuffer::from("hi"), Some(&grant(vault.path())))
            .unwrap();
        assert_eq!(scope.open(), 0);
        assert_eq!(scope.begins.get(), 1);
    }

    #[test]
    fn same_second_same_title_overwrites_by_default() {
        let vault = tempfile::tempdir().unwrap();
        let w = writer(Rc::default());
        let g = grant(vault.path());
        w.save(&NoteBuffer::from("Same\nfirst"), Some(&g)).unwrap();
        let second = w.save(&NoteBuffer::from("Same\nsecond"), Some(&g)).unwrap();

        assert_eq!(entries(vault.path()).len(), 1);
        assert_eq!(std::fs::read_to_string(second.path).unwrap(), "Same\nsecond");
    }

    #[test]
    fn unique_filenames_add_suffix() {
        let vault = tempfile::tempdir().unwrap();
        let w = writer(Rc::default()).unique_filenames(true);
        let g = grant(vault.path());
        w.save(&NoteBuffer::from("Same\nfirst"), Some(&g)).unwrap();
        let second = w.save(&NoteBuffer::from("Same\nsecond"), Some(&g)).unwrap();
        let third = w.save(&NoteBuffer::from("Same\nthird"), Some(&g)).unwrap();

        assert_eq!(second.filename, "2024-01-15-093000 - Same (2).md");
        assert_eq!(third.filename, "2024-01-15-093000 - Same (3).md");
        assert_eq!(
            entries(vault.path()),
            vec![
                "2024-01-15-093000 - Same (2).md".to_string(),
                "2024-01-15-093000 - Same (3).md".to_string(),
                "2024-01-15-093000 - Same.md".to_string(),
            ]
        );
        assert_eq!(std::fs::read_to_string(third.path).unwrap(), "Same\nthird");
    }
}
