//! Scoped access sessions on a granted directory.
//!
//! Sandboxed platforms require a begin/end bracket around filesystem access to a
//! user-granted folder. Sessions nest: every `begin` that returns `true` must be
//! matched by exactly one `end`.

use std::path::{Path, PathBuf};
use std::rc::Rc;

pub trait AccessScope {
    /// Start accessing `dir`. Returns `false` if no session was started (nothing to end).
    fn begin(&self, dir: &Path) -> bool;
    fn end(&self, dir: &Path);
}

/// For platforms without directory sandboxing. Never starts a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScope;

impl AccessScope for NoopScope {
    fn begin(&self, _dir: &Path) -> bool {
        false
    }

    fn end(&self, _dir: &Path) {}
}

/// Ends the session it started when dropped, on every exit path.
pub struct ScopedAccess {
    scope: Rc<dyn AccessScope>,
    dir: PathBuf,
    started: bool,
}

impl ScopedAccess {
    pub fn begin(scope: Rc<dyn AccessScope>, dir: &Path) -> Self {
        let started = scope.begin(dir);
        tracing::debug!(dir = %dir.display(), started, "access session begin");
        Self {
            scope,
            dir: dir.to_path_buf(),
            started,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }
}

impl Drop for ScopedAccess {
    fn drop(&mut self) {
        if self.started {
            self.scope.end(&self.dir);
            tracing::debug!(dir = %self.dir.display(), "access session end");
        }
    }
}
