//! Remote commands for a running applet instance.
//!
//! Each instance listens on a Unix socket named after its applet id. A
//! command is a single line holding its name; the server forwards names to
//! the UI thread, which decides whether to act on them.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("another instance is already listening on {}", .0.display())]
    AlreadyRunning(PathBuf),
    #[error("no running instance at {}", .path.display())]
    NotRunning {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("remote socket {} failed", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("remote commands are not supported on this platform")]
    Unsupported,
}

pub fn socket_path(applet_id: &str) -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("dirmenu-{applet_id}.sock"))
}

/// Receiving half living on the UI thread.
pub struct RemoteServer {
    path: PathBuf,
    commands: Receiver<String>,
    #[cfg(unix)]
    shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl RemoteServer {
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Next pending command, if any. Never blocks.
    pub fn poll(&self) -> Option<String> {
        match self.commands.try_recv() {
            Ok(name) => Some(name),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const MAX_COMMAND_LEN: u64 = 256;
    /// A client that sends no complete line within this window is dropped.
    const READ_TIMEOUT: Duration = Duration::from_millis(500);

    impl RemoteServer {
        /// Bind `path` and start accepting commands on a background thread.
        /// `wake` runs after each command is queued so the UI can repaint.
        pub fn bind(path: PathBuf, wake: impl Fn() + Send + 'static) -> Result<Self, RemoteError> {
            if UnixStream::connect(&path).is_ok() {
                return Err(RemoteError::AlreadyRunning(path));
            }
            // Stale socket from a crashed instance.
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path).map_err(|source| RemoteError::Io {
                path: path.clone(),
                source,
            })?;

            let (tx, commands) = mpsc::channel();
            let shutdown = Arc::new(AtomicBool::new(false));
            let stop = Arc::clone(&shutdown);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(err) => {
                            tracing::warn!(%err, "remote accept failed");
                            continue;
                        }
                    };
                    match read_command(stream) {
                        Ok(Some(name)) => {
                            tracing::debug!(command = %name, "remote command received");
                            if tx.send(name).is_err() {
                                break;
                            }
                            wake();
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(%err, "remote read failed"),
                    }
                }
            });

            tracing::info!(socket = %path.display(), "listening for remote commands");
            Ok(Self {
                path,
                commands,
                shutdown,
            })
        }
    }

    impl Drop for RemoteServer {
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::Release);
            // Unblock the accept loop so the thread sees the flag.
            let _ = UnixStream::connect(&self.path);
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn read_command(stream: UnixStream) -> io::Result<Option<String>> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let mut line = String::new();
        BufReader::new(stream)
            .take(MAX_COMMAND_LEN)
            .read_line(&mut line)?;
        let name = line.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    /// Deliver `name` to the instance listening on `path`.
    pub fn send(path: &Path, name: &str) -> Result<(), RemoteError> {
        let mut stream = UnixStream::connect(path).map_err(|source| RemoteError::NotRunning {
            path: path.to_path_buf(),
            source,
        })?;
        writeln!(stream, "{name}").map_err(|source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(unix)]
pub use imp::send;

#[cfg(not(unix))]
impl RemoteServer {
    pub fn bind(_path: PathBuf, _wake: impl Fn() + Send + 'static) -> Result<Self, RemoteError> {
        Err(RemoteError::Unsupported)
    }
}

#[cfg(not(unix))]
pub fn send(_path: &std::path::Path, _name: &str) -> Result<(), RemoteError> {
    Err(RemoteError::Unsupported)
}
