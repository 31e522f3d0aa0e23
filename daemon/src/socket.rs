//! Unix socket control surface
//!
//! Clients send one JSON [`Request`] per line and get one JSON [`Response`]
//! per line back. Anything pushed through [`SocketServer::notifier`] is
//! written to every connected client between replies.

use crate::protocol::{Request, Response};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const NOTIFY_CAPACITY: usize = 64;

#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

pub struct SocketServer {
    path: PathBuf,
    listener: UnixListener,
    notify_tx: broadcast::Sender<Response>,
    next_client: AtomicU64,
}

impl SocketServer {
    /// Bind `path`, replacing a stale socket file left by a previous run.
    pub async fn bind(path: &Path) -> std::io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)?;
        let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        info!(path = %path.display(), "control socket listening");
        Ok(Self {
            path: path.to_path_buf(),
            listener,
            notify_tx,
            next_client: AtomicU64::new(1),
        })
    }

    /// `/run/user/<uid>/reactmon.sock`
    pub fn default_path() -> PathBuf {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/run/user/{}/reactmon.sock", uid))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sender for unsolicited messages to all connected clients.
    pub fn notifier(&self) -> broadcast::Sender<Response> {
        self.notify_tx.clone()
    }

    pub async fn accept(&self) -> std::io::Result<UnixStream> {
        let (stream, _) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Accept clients forever, one task per connection.
    pub async fn serve<H>(&self, handler: Arc<H>)
    where
        H: RequestHandler + 'static,
    {
        loop {
            match self.accept().await {
                Ok(stream) => {
                    let client = self.next_client.fetch_add(1, Ordering::Relaxed);
                    let notifications = self.notify_tx.subscribe();
                    tokio::spawn(handle_client(client, stream, notifications, Arc::clone(&handler)));
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn write_message<W>(writer: &mut W, message: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await
}

fn rejection(error: serde_json::Error) -> Response {
    Response::error(format!("invalid request: {}", error))
}

/// Serve one connection until the client hangs up or a write fails.
async fn handle_client<H>(
    client: u64,
    stream: UnixStream,
    mut notifications: broadcast::Receiver<Response>,
    handler: Arc<H>,
) where
    H: RequestHandler + 'static,
{
    debug!(client, "client connected");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(client, error = %e, "read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<Request>(&line) {
                    Ok(request) => handler.handle(request).await,
                    Err(e) => {
                        warn!(client, error = %e, "rejected request");
                        rejection(e)
                    }
                };
                if let Err(e) = write_message(&mut writer, &response).await {
                    warn!(client, error = %e, "failed to write response");
                    break;
                }
            }
            message = notifications.recv() => {
                match message {
                    Ok(message) => {
                        if let Err(e) = write_message(&mut writer, &message).await {
                            warn!(client, error = %e, "failed to push notification");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(client, skipped, "client lagging, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    debug!(client, "client disconnected");
}
