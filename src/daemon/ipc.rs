//! IPC bridge between the host UI / CLI and the control task.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request routing into the media-button dispatcher and the control task
//! - Event streaming for `watch` clients as newline-delimited JSON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, warn};

use crate::events::{BroadcastEventSink, UiEvent};
use crate::media::{
    DispatchError, DispatchOutcome, IgnoreReason, KeyInput, MediaButtonDispatcher,
};
use crate::notification::{StatusUpdate, WatchStatusSurface};
use crate::types::{validate_minutes, IpcRequest, IpcResponse, ResponseData, TimerSnapshot};

use super::controller::ControllerHandle;
use super::timer::TimerError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// The client closed the connection before sending a request
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

impl IpcError {
    /// Returns true if the client went away.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

// ============================================================================
// WatchMessage
// ============================================================================

/// One line of a `watch` stream after the initial response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchMessage {
    /// A UI event
    Event(UiEvent),
    /// A status surface update
    Status(StatusUpdate),
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// A stale socket file is removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write side or the size limit
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(256);
        let mut chunk = [0u8; 512];

        loop {
            let read = timeout(Duration::from_secs(READ_TIMEOUT_SECS), stream.read(&mut chunk))
                .await
                .map_err(|_| IpcError::Timeout)?
                .map_err(|e| IpcError::ReadError(e.to_string()))?;

            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if buffer.len() > MAX_REQUEST_SIZE {
                return Err(IpcError::RequestTooLarge.into());
            }
            // a complete JSON document needs no further reads
            if serde_json::from_slice::<serde_json::Value>(&buffer).is_ok() {
                break;
            }
        }

        if buffer.is_empty() {
            return Err(IpcError::ConnectionClosed.into());
        }

        let request: IpcRequest =
            serde_json::from_slice(&buffer).context("Failed to deserialize IPC request")?;
        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;
        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;
        Ok(())
    }

    /// Writes one newline-terminated JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_line<T: serde::Serialize>(stream: &mut UnixStream, value: &T) -> Result<()> {
        let mut json = serde_json::to_vec(value).context("Failed to serialize IPC message")?;
        json.push(b'\n');
        stream.write_all(&json).await.context("Failed to write line")?;
        stream.flush().await.context("Failed to flush line")?;
        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Routes IPC requests to the dispatcher and the control task.
pub struct RequestHandler {
    dispatcher: Arc<MediaButtonDispatcher>,
    controller: ControllerHandle,
    events: BroadcastEventSink,
    surface: Arc<WatchStatusSurface>,
}

impl RequestHandler {
    pub fn new(
        dispatcher: Arc<MediaButtonDispatcher>,
        controller: ControllerHandle,
        events: BroadcastEventSink,
        surface: Arc<WatchStatusSurface>,
    ) -> Self {
        Self {
            dispatcher,
            controller,
            events,
            surface,
        }
    }

    /// Attaches listeners for a `watch` client.
    pub fn subscribe(
        &self,
    ) -> (
        broadcast::Receiver<UiEvent>,
        watch::Receiver<Option<StatusUpdate>>,
    ) {
        (self.events.subscribe(), self.surface.subscribe())
    }

    /// Handles an IPC request and returns the appropriate response.
    ///
    /// `Watch` is answered with the current status; the event stream that
    /// follows is written by [`serve_connection`].
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::KeyEvent { code, release } => {
                let input = KeyInput::from_raw(code, !release);
                let outcome = self.dispatcher.on_broadcast(Some(input));
                self.handle_dispatch(outcome).await
            }
            IpcRequest::Session { action } => {
                let outcome = self.dispatcher.on_session_callback(action.into());
                self.handle_dispatch(outcome).await
            }
            IpcRequest::VolumeDown => self.handle_volume_down().await,
            IpcRequest::Duration { minutes } => {
                if let Err(e) = validate_minutes(minutes) {
                    return IpcResponse::error(e);
                }
                let result = self.controller.set_duration(u64::from(minutes) * 60).await;
                respond(result, format!("タイマー時間を{}分に設定しました", minutes))
            }
            IpcRequest::Preset { minutes } => {
                let result = self.controller.select_preset(minutes).await;
                respond(result, format!("プリセット{}分を選択しました", minutes))
            }
            IpcRequest::Pause => respond(self.controller.pause().await, "タイマーを一時停止しました"),
            IpcRequest::Resume => respond(self.controller.resume().await, "タイマーを再開しました"),
            IpcRequest::Stop => respond(self.controller.stop().await, "タイマーを停止しました"),
            IpcRequest::Status => respond(self.controller.status().await, ""),
            IpcRequest::Watch => respond(self.controller.status().await, "イベントの監視を開始します"),
            IpcRequest::Close => respond(self.controller.close().await, "アプリケーションを終了します"),
        }
    }

    async fn handle_dispatch(
        &self,
        outcome: Result<DispatchOutcome, DispatchError>,
    ) -> IpcResponse {
        let message = match outcome {
            Ok(DispatchOutcome::Forwarded(command)) => {
                format!("ボタン操作を受け付けました: {}", command)
            }
            Ok(DispatchOutcome::Ignored(reason)) => {
                format!("ボタン操作は無視されました: {}", describe_ignore(reason))
            }
            Err(e) => return IpcResponse::error(e.to_string()),
        };
        // queued behind the button, so the status reflects it
        respond(self.controller.status().await, message)
    }

    async fn handle_volume_down(&self) -> IpcResponse {
        match self.dispatcher.on_volume_down(Instant::now()) {
            Ok(true) => respond(self.controller.status().await, "前のチャプターに戻ります"),
            Ok(false) => respond(self.controller.status().await, "音量ダウンを受け付けました"),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }
}

fn describe_ignore(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::NotRegistered => "ディスパッチャが未登録です",
        IgnoreReason::SessionReleased => "対象アプリへの送信中です",
        IgnoreReason::MissingKey => "キー情報がありません",
        IgnoreReason::Unclassified => "対象外のキーです",
    }
}

fn respond(result: Result<TimerSnapshot, TimerError>, message: impl Into<String>) -> IpcResponse {
    match result {
        Ok(snapshot) => IpcResponse::success(message, Some(ResponseData::from_snapshot(&snapshot))),
        Err(e) => IpcResponse::error(e.to_string()),
    }
}

// ============================================================================
// Connection handling
// ============================================================================

/// Serves one client connection.
///
/// # Errors
///
/// Returns an error if the request cannot be read or the response cannot
/// be written.
pub async fn serve_connection(handler: &RequestHandler, mut stream: UnixStream) -> Result<()> {
    let request = IpcServer::receive_request(&mut stream).await?;
    debug!(?request, "ipc request");

    if let IpcRequest::Watch = request {
        // subscribe before answering so no event slips between the two
        let (events, status) = handler.subscribe();
        let response = handler.handle(IpcRequest::Watch).await;
        IpcServer::send_line(&mut stream, &response).await?;
        if response.is_success() {
            stream_watch(&mut stream, events, status).await;
        }
        return Ok(());
    }

    let response = handler.handle(request).await;
    IpcServer::send_response(&mut stream, &response).await
}

async fn stream_watch(
    stream: &mut UnixStream,
    mut events: broadcast::Receiver<UiEvent>,
    mut status: watch::Receiver<Option<StatusUpdate>>,
) {
    loop {
        let message = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => WatchMessage::Event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "watch client lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    return;
                }
                let Some(update) = status.borrow_and_update().clone() else {
                    continue;
                };
                WatchMessage::Status(update)
            }
        };

        if let Err(e) = IpcServer::send_line(stream, &message).await {
            debug!(error = %e, "watch client disconnected");
            return;
        }
    }
}

/// Accepts connections until the control task shuts down.
///
/// Each connection is served on its own task.
pub async fn serve(server: IpcServer, handler: Arc<RequestHandler>, controller: ControllerHandle) {
    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&handler, stream).await {
                            debug!(error = %e, "ipc connection failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept ipc connection"),
            },
            _ = controller.closed() => {
                debug!("control task finished, closing ipc server");
                return;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
