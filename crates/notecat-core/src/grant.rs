//! Access grant manager: obtains, persists, restores and releases the capability
//! to write into the user's chosen folder.
//!
//! At most one grant is held at a time. While held, the manager keeps an access
//! session open on its directory; replacing, forgetting or releasing the grant
//! ends that session.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::defaults::{KeyValueStore, StoreError};
use crate::picker::{FolderPicker, PickError, PickerOptions};
use crate::scope::{AccessScope, ScopedAccess};
use crate::token::{self, TokenError};

/// Key under which the serialized token is stored.
pub const GRANT_KEY: &str = "FolderBookmark";

/// Permission to write into one directory, backed by a durable token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderGrant {
    directory: PathBuf,
    token: Vec<u8>,
    stale: bool,
}

impl FolderGrant {
    pub fn new(directory: impl Into<PathBuf>, token: Vec<u8>) -> Self {
        Self {
            directory: directory.into(),
            token,
            stale: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The opaque serialized capability.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    Uninitialized,
    AwaitingUserChoice,
    Active,
    /// The user dismissed the chooser, or the choice could not be saved. Saves re-prompt.
    NoGrant,
    Released,
}

/// Outcome of looking for a grant saved by an earlier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restore {
    Restored(FolderGrant),
    NotFound,
    /// A token exists but no longer names the directory it was made for.
    Stale(PathBuf),
}

impl Restore {
    /// `NotFound` and `Stale` both mean the user has to choose a folder again.
    pub fn needs_prompt(&self) -> bool {
        !matches!(self, Restore::Restored(_))
    }
}

struct Held {
    grant: FolderGrant,
    _session: ScopedAccess,
}

pub struct GrantManager {
    store: Box<dyn KeyValueStore>,
    scope: Rc<dyn AccessScope>,
    state: GrantState,
    held: Option<Held>,
}

impl GrantManager {
    pub fn new(store: Box<dyn KeyValueStore>, scope: Rc<dyn AccessScope>) -> Self {
        Self {
            store,
            scope,
            state: GrantState::Uninitialized,
            held: None,
        }
    }

    pub fn state(&self) -> GrantState {
        self.state
    }

    /// The active grant, if any.
    pub fn current(&self) -> Option<&FolderGrant> {
        self.held.as_ref().map(|h| &h.grant)
    }

    /// Read the saved token and reopen its directory.
    ///
    /// Any outcome other than `Restored` leaves the manager awaiting a user choice.
    pub fn restore_grant(&mut self) -> Result<Restore, GrantError> {
        let result = self.try_restore();
        match &result {
            Ok(Restore::Restored(grant)) => {
                tracing::info!(dir = %grant.directory.display(), "restored folder grant");
            }
            Ok(Restore::NotFound) => {
                tracing::info!("no saved folder grant");
                self.state = GrantState::AwaitingUserChoice;
            }
            Ok(Restore::Stale(path)) => {
                tracing::warn!(dir = %path.display(), "saved folder grant is stale");
                self.state = GrantState::AwaitingUserChoice;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore folder grant");
                self.state = GrantState::AwaitingUserChoice;
            }
        }
        result
    }

    fn try_restore(&mut self) -> Result<Restore, GrantError> {
        let Some(bytes) = self.store.get(GRANT_KEY).map_err(GrantError::RestoreStore)? else {
            return Ok(Restore::NotFound);
        };
        let resolved = token::resolve(&bytes).map_err(GrantError::RestoreToken)?;
        if resolved.is_stale {
            return Ok(Restore::Stale(resolved.path));
        }
        let grant = FolderGrant::new(resolved.path, bytes);
        self.hold(grant.clone());
        Ok(Restore::Restored(grant))
    }

    /// Ask the user for a folder, save a token for it and make it the active grant.
    ///
    /// On cancellation or failure the previous grant, if any, stays active.
    pub fn request_grant(
        &mut self,
        picker: &mut dyn FolderPicker,
        options: &PickerOptions,
    ) -> Result<FolderGrant, GrantError> {
        if self.held.is_none() {
            self.state = GrantState::AwaitingUserChoice;
        }
        let result = self.try_request(picker, options);
        match &result {
            Ok(grant) => {
                tracing::info!(dir = %grant.directory.display(), "granted folder access");
            }
            Err(GrantError::UserCancelled) => tracing::info!("folder selection cancelled"),
            Err(e) => tracing::warn!(error = %e, "folder grant failed"),
        }
        if result.is_err() && self.held.is_none() {
            self.state = GrantState::NoGrant;
        }
        result
    }

    fn try_request(
        &mut self,
        picker: &mut dyn FolderPicker,
        options: &PickerOptions,
    ) -> Result<FolderGrant, GrantError> {
        let picked = picker.pick(options)?.ok_or(GrantError::UserCancelled)?;
        let dir = picked
            .canonicalize()
            .map_err(|e| GrantError::InvalidFolder(picked.clone(), e))?;

        // The session only covers token creation; a grant that can't be saved is dropped here.
        let session = ScopedAccess::begin(self.scope.clone(), &dir);
        let bytes = token::create(&dir).map_err(GrantError::PersistToken)?;
        self.store
            .set(GRANT_KEY, &bytes)
            .map_err(GrantError::PersistStore)?;
        drop(session);

        let grant = FolderGrant::new(dir, bytes);
        self.hold(grant.clone());
        Ok(grant)
    }

    /// Replace whatever is held. The previous session ends before the new one begins.
    fn hold(&mut self, grant: FolderGrant) {
        self.held = None;
        let session = ScopedAccess::begin(self.scope.clone(), &grant.directory);
        self.held = Some(Held {
            grant,
            _session: session,
        });
        self.state = GrantState::Active;
    }

    /// End the access session for the held grant. Safe to call repeatedly.
    pub fn release_grant(&mut self) {
        if let Some(held) = self.held.take() {
            tracing::debug!(dir = %held.grant.directory.display(), "releasing folder grant");
        }
        if self.state == GrantState::Active {
            self.state = GrantState::Released;
        }
    }

    /// Drop the saved token and the held grant. The next launch will ask again.
    pub fn forget_grant(&mut self) -> Result<(), GrantError> {
        self.store.remove(GRANT_KEY).map_err(GrantError::Forget)?;
        self.held = None;
        self.state = GrantState::NoGrant;
        tracing::info!("forgot folder grant");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("folder selection cancelled")]
    UserCancelled,
    #[error(transparent)]
    Picker(#[from] PickError),
    #[error("cannot use {0}: {1}")]
    InvalidFolder(PathBuf, std::io::Error),
    #[error("failed to save folder access: {0}")]
    PersistToken(TokenError),
    #[error("failed to save folder access: {0}")]
    PersistStore(StoreError),
    #[error("failed to restore saved folder: {0}")]
    RestoreToken(TokenError),
    #[error("failed to restore saved folder: {0}")]
    RestoreStore(StoreError),
    #[error("failed to forget saved folder: {0}")]
    Forget(StoreError),
}
