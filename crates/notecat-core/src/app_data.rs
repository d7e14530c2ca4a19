//! Where NoteCat keeps its own state (config and the saved folder grant).
//!
//! Notes themselves go to the folder the user picks; nothing else is written there.

use std::path::PathBuf;

/// Returns the directory where NoteCat stores `config.toml` and `defaults.toml`.
/// On macOS: `~/Library/Application Support/NoteCat/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "NoteCat", "NoteCat")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_is_created_under_notecat() {
        let dir = app_data_dir().expect("platform data directory");
        assert!(dir.is_dir());
        assert!(dir.to_string_lossy().to_lowercase().contains("notecat"));
    }
}
