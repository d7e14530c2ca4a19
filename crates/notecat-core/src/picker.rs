//! Directory chooser seam. The CLI supplies a terminal implementation.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOptions {
    pub prompt: String,
    pub message: String,
    /// Only directories can be chosen, never files.
    pub directories_only: bool,
    pub allow_create: bool,
}

pub trait FolderPicker {
    /// Ask the user for a folder. `Ok(None)` means they dismissed the chooser.
    fn pick(&mut self, options: &PickerOptions) -> Result<Option<PathBuf>, PickError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PickError {
    #[error("folder chooser failed: {0}")]
    Io(#[from] std::io::Error),
}
