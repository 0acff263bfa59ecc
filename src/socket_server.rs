use crate::ipc::{IpcCommand, IpcRequest, IpcResponse, get_socket_path};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Guard that removes the socket file when dropped
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if self.path.exists() {
                error!("Failed to remove socket file: {}", e);
            }
        } else {
            info!("Removed socket file at {}", self.path.display());
        }
    }
}

/// Start the IPC socket server at the default path
pub async fn start_server() -> Result<(mpsc::UnboundedReceiver<IpcRequest>, SocketGuard)> {
    let socket_path = get_socket_path()?;
    start_server_at(&socket_path).await
}

/// Start the IPC socket server
/// Returns a receiver for incoming requests and a guard that cleans up the socket
pub async fn start_server_at(
    socket_path: &Path,
) -> Result<(mpsc::UnboundedReceiver<IpcRequest>, SocketGuard)> {
    // Remove stale socket if it exists
    if socket_path.exists() {
        info!("Removing stale socket at {}", socket_path.display());
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

    info!("IPC socket listening at {}", socket_path.display());

    let guard = SocketGuard {
        path: socket_path.to_path_buf(),
    };
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn task to accept connections
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, tx_clone).await {
                            debug!("Client connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    });

    Ok((rx, guard))
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, tx: mpsc::UnboundedSender<IpcRequest>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one command per connection
    reader.read_line(&mut line).await?;

    let response = match line.parse::<IpcCommand>() {
        Ok(command) => {
            debug!("Received IPC command: {:?}", command);
            let (reply, response) = oneshot::channel();

            if tx.send(IpcRequest { command, reply }).is_err() {
                IpcResponse::Error("Daemon is shutting down".to_string())
            } else {
                response
                    .await
                    .unwrap_or_else(|_| IpcResponse::Error("Daemon dropped the request".to_string()))
            }
        }
        Err(e) => {
            warn!("Rejected IPC line: {}", e);
            IpcResponse::Error(e.to_string())
        }
    };

    // Send response
    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn temp_socket(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cardview-test-{}-{}.sock", name, std::process::id()))
    }

    async fn roundtrip(path: &Path, line: &str) -> IpcResponse {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        serde_json::from_str(out.trim()).unwrap()
    }

    #[tokio::test]
    async fn test_request_is_answered_by_receiver() {
        let path = temp_socket("answer");
        let (mut rx, _guard) = start_server_at(&path).await.unwrap();

        let daemon = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.command, IpcCommand::Status);
            request
                .reply
                .send(IpcResponse::Error("busy".to_string()))
                .unwrap();
        });

        match roundtrip(&path, "status\n").await {
            IpcResponse::Error(message) => assert_eq!(message, "busy"),
            other => panic!("unexpected {:?}", other),
        }
        daemon.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let path = temp_socket("unknown");
        let (_rx, _guard) = start_server_at(&path).await.unwrap();

        match roundtrip(&path, "dance\n").await {
            IpcResponse::Error(message) => assert!(message.contains("dance")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guard_removes_socket() {
        let path = temp_socket("guard");
        let (_rx, guard) = start_server_at(&path).await.unwrap();
        assert!(path.exists());

        drop(guard);

        assert!(!path.exists());
    }
}
