//! Unix socket listener.
//!
//! # Responsibilities
//! - Bind to the configured socket path
//! - Clear a stale socket file left behind by a previous run
//! - Accept incoming connections and tag them with a connection ID
//! - Remove the socket file when the listener goes away

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::net::connection::ConnectionId;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to the socket path.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A listening Unix domain socket.
#[derive(Debug)]
pub struct Listener {
    inner: UnixListener,
    path: PathBuf,
}

impl Listener {
    /// Bind to `path`.
    ///
    /// An existing *socket* file at `path` is treated as stale and removed;
    /// any other kind of file is left alone and binding fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, ListenerError> {
        let path = path.as_ref().to_path_buf();

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                tracing::debug!(path = %path.display(), "Removing stale socket file");
                std::fs::remove_file(&path).map_err(ListenerError::Bind)?;
            }
        }

        let inner = UnixListener::bind(&path).map_err(ListenerError::Bind)?;

        tracing::info!(path = %path.display(), "Listener bound");

        Ok(Self { inner, path })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(UnixStream, ConnectionId), ListenerError> {
        let (stream, _addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let id = ConnectionId::new();

        tracing::debug!(connection_id = %id, "Connection accepted");

        Ok((stream, id))
    }

    /// The socket path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}
