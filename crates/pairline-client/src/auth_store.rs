//! Per-session credential store locations.
//!
//! The messaging client owns the contents; the lifecycle manager only needs
//! to know where each session's store lives so logout can remove it.

use std::io;
use std::path::{Path, PathBuf};

use pairline_core::SessionId;
use tracing::debug;

/// Root directory holding one `session-<id>` directory per session.
#[derive(Clone, Debug)]
pub struct AuthStore {
    root: PathBuf,
}

impl AuthStore {
    /// Create a store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the store for `session_id`.
    pub fn location(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(format!("session-{session_id}"))
    }

    /// Remove a session's store. A location that does not exist is not an error.
    ///
    /// Locations outside the root are refused.
    pub async fn purge(&self, location: &Path) -> io::Result<()> {
        if !location.starts_with(&self.root) || location == self.root {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a session store under {}", location.display(), self.root.display()),
            ));
        }
        match tokio::fs::remove_dir_all(location).await {
            Ok(()) => {
                debug!(path = %location.display(), "auth store purged");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
