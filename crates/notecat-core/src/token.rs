//! The durable capability token for a granted folder.
//!
//! A token is JSON: a `file://` URL for the directory plus, on Unix, the
//! directory's device/inode pair. Resolving a token checks that the path still
//! names the same directory; anything else makes it stale.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

const TOKEN_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirIdentity {
    pub dev: u64,
    pub ino: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Token {
    version: u32,
    url: Url,
    identity: Option<DirIdentity>,
    created_at: DateTime<Utc>,
}

/// Result of resolving a token back into a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    /// The path no longer names the directory the token was created for.
    pub is_stale: bool,
}

/// Serialize a token for `dir`. `dir` must be an existing absolute directory.
pub fn create(dir: &Path) -> Result<Vec<u8>, TokenError> {
    let meta = std::fs::metadata(dir).map_err(|e| TokenError::Inspect(dir.to_path_buf(), e))?;
    if !meta.is_dir() {
        return Err(TokenError::NotADirectory(dir.to_path_buf()));
    }
    let url = Url::from_directory_path(dir).map_err(|()| TokenError::NotAbsolute(dir.to_path_buf()))?;
    let token = Token {
        version: TOKEN_VERSION,
        url,
        identity: identity_of(&meta),
        created_at: Utc::now(),
    };
    serde_json::to_vec(&token).map_err(TokenError::Encode)
}

/// Reconstruct the directory from a serialized token.
pub fn resolve(bytes: &[u8]) -> Result<Resolved, TokenError> {
    let token: Token = serde_json::from_slice(bytes).map_err(TokenError::Decode)?;
    if token.version != TOKEN_VERSION {
        return Err(TokenError::UnsupportedVersion(token.version));
    }
    let path = token
        .url
        .to_file_path()
        .map_err(|()| TokenError::NotAFileUrl(token.url.to_string()))?
        .components()
        .collect::<PathBuf>();
    let is_stale = match std::fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => match (token.identity, identity_of(&meta)) {
            (Some(recorded), Some(current)) => recorded != current,
            _ => false,
        },
        _ => true,
    };
    Ok(Resolved { path, is_stale })
}

#[cfg(unix)]
fn identity_of(meta: &std::fs::Metadata) -> Option<DirIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(DirIdentity {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

#[cfg(not(unix))]
fn identity_of(_meta: &std::fs::Metadata) -> Option<DirIdentity> {
    None
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("cannot inspect {0}: {1}")]
    Inspect(PathBuf, std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("not an absolute path: {0}")]
    NotAbsolute(PathBuf),
    #[error("failed to encode folder token: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode folder token: {0}")]
    Decode(serde_json::Error),
    #[error("unsupported folder token version {0}")]
    UnsupportedVersion(u32),
    #[error("folder token does not name a local path: {0}")]
    NotAFileUrl(String),
}
