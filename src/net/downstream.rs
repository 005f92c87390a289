//! Downstream connection establishment.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;

/// Why a downstream connection could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The socket could not be created or the peer refused/was absent.
    #[error("Unable to connect to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer did not accept within the connect timeout.
    #[error("Unable to connect to {path}: timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
}

/// Open a stream socket to the downstream peer at `path`.
///
/// No local name is bound. A half-created socket is released before the
/// error is returned.
pub async fn connect_downstream(path: &Path, timeout: Duration) -> Result<UnixStream, ConnectError> {
    match tokio::time::timeout(timeout, UnixStream::connect(path)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ConnectError::Io {
            path: path.display().to_string(),
            source,
        }),
        Err(_) => Err(ConnectError::Timeout {
            path: path.display().to_string(),
            timeout,
        }),
    }
}
