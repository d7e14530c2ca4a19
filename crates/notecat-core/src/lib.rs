//! All backend logic independent of how the app is run.
//!
//! Notes go to a folder the user chooses once. NoteCat keeps only its config and
//! the saved folder grant in its own app data directory (see [app_data]).

pub mod app;
pub mod app_data;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod grant;
pub mod notes;
pub mod picker;
pub mod scope;
pub mod token;

pub use app::{Action, Alerter, App, Reply};
pub use app_data::app_data_dir;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, save_config, Config, ConfigError, PickerConfig, CONFIG_FILENAME};
pub use defaults::{FileDefaults, KeyValueStore, MemoryDefaults, StoreError};
pub use grant::{FolderGrant, GrantError, GrantManager, GrantState, Restore, GRANT_KEY};
pub use notes::{derive_title, sanitize_title, NoteBuffer, NoteFile, NoteWriter, SaveError};
pub use picker::{FolderPicker, PickError, PickerOptions};
pub use scope::{AccessScope, NoopScope, ScopedAccess};
pub use token::TokenError;
