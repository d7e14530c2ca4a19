//! Top-level controller: owns the current grant and the note buffer and maps
//! each user action onto the grant manager and note writer.
//!
//! Every failure ends up as one warning through [`Alerter`]; nothing here is fatal.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::clock::Clock;
use crate::config::Config;
use crate::defaults::KeyValueStore;
use crate::grant::{GrantError, GrantManager, GrantState, Restore};
use crate::notes::{NoteBuffer, NoteFile, NoteWriter, SaveError};
use crate::picker::{FolderPicker, PickerOptions};
use crate::scope::AccessScope;

/// Modal warning with a single acknowledgement.
pub trait Alerter {
    fn warn(&mut self, message: &str);
}

/// User-triggered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Launch,
    PickFolder,
    ForgetFolder,
    Save,
    Terminate,
}

/// What the UI should reflect after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Idle,
    FolderSelected(PathBuf),
    FolderCleared,
    /// The note was written and the buffer cleared; close or reset the input surface.
    Saved(NoteFile),
    Released,
}

pub struct App {
    grants: GrantManager,
    writer: NoteWriter,
    buffer: NoteBuffer,
    picker: Box<dyn FolderPicker>,
    alerts: Box<dyn Alerter>,
    picker_options: PickerOptions,
}

impl App {
    pub fn new(
        config: &Config,
        store: Box<dyn KeyValueStore>,
        scope: Rc<dyn AccessScope>,
        clock: Rc<dyn Clock>,
        picker: Box<dyn FolderPicker>,
        alerts: Box<dyn Alerter>,
    ) -> Self {
        Self {
            grants: GrantManager::new(store, scope.clone()),
            writer: NoteWriter::new(scope, clock).unique_filenames(config.unique_filenames),
            buffer: NoteBuffer::new(),
            picker,
            alerts,
            picker_options: config.picker_options(),
        }
    }

    pub fn buffer(&self) -> &NoteBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut NoteBuffer {
        &mut self.buffer
    }

    pub fn selected_folder(&self) -> Option<&Path> {
        self.grants.current().map(|g| g.directory())
    }

    pub fn grant_state(&self) -> GrantState {
        self.grants.state()
    }

    pub fn dispatch(&mut self, action: Action) -> Reply {
        tracing::debug!(?action, "dispatch");
        match action {
            Action::Launch => self.launch(),
            Action::PickFolder => self.pick_folder(),
            Action::ForgetFolder => self.forget_folder(),
            Action::Save => self.save(),
            Action::Terminate => self.terminate(),
        }
    }

    /// Restore the saved grant, or ask for a folder if there is none usable.
    pub fn launch(&mut self) -> Reply {
        match self.grants.restore_grant() {
            Ok(Restore::Restored(grant)) => Reply::FolderSelected(grant.directory().to_path_buf()),
            Ok(Restore::NotFound | Restore::Stale(_)) => self.pick_folder(),
            Err(e) => {
                self.alert_grant(&e);
                self.pick_folder()
            }
        }
    }

    pub fn pick_folder(&mut self) -> Reply {
        match self
            .grants
            .request_grant(self.picker.as_mut(), &self.picker_options)
        {
            Ok(grant) => Reply::FolderSelected(grant.directory().to_path_buf()),
            Err(e) => {
                self.alert_grant(&e);
                Reply::Idle
            }
        }
    }

    pub fn forget_folder(&mut self) -> Reply {
        match self.grants.forget_grant() {
            Ok(()) => Reply::FolderCleared,
            Err(e) => {
                self.alert_grant(&e);
                Reply::Idle
            }
        }
    }

    /// Save the buffer. Without a folder the user is asked for one and the note is kept.
    pub fn save(&mut self) -> Reply {
        match self.writer.save(&self.buffer, self.grants.current()) {
            Ok(note) => {
                self.buffer.clear();
                Reply::Saved(note)
            }
            Err(SaveError::NoFolderSelected) => {
                self.alerts.warn("Please select a folder first");
                self.pick_folder()
            }
            Err(SaveError::EmptyNote) => {
                self.alerts.warn("Cannot save empty note!");
                Reply::Idle
            }
            Err(SaveError::WriteFailed { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "note write failed");
                self.alerts.warn(&format!("Failed to save note: {source}"));
                Reply::Idle
            }
        }
    }

    pub fn terminate(&mut self) -> Reply {
        self.grants.release_grant();
        Reply::Released
    }

    fn alert_grant(&mut self, e: &GrantError) {
        if matches!(e, GrantError::UserCancelled) {
            return;
        }
        self.alerts.warn(&capitalize(&e.to_string()));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
