//! IPC Client for communicating with the sleep timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - The line-oriented `watch` stream

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::daemon::WatchMessage;
use crate::types::{IpcRequest, IpcResponse};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: usize = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Sends a button-style request (`KeyEvent` or `Session`).
    pub async fn press(&self, request: IpcRequest) -> Result<IpcResponse> {
        self.send_request_with_retry(&request).await
    }

    /// Sends a volume-down key press.
    pub async fn volume_down(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::VolumeDown).await
    }

    /// Sets the configured duration.
    pub async fn duration(&self, minutes: u32) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Duration { minutes })
            .await
    }

    /// Selects a preset duration.
    pub async fn preset(&self, minutes: u32) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Preset { minutes })
            .await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Pause).await
    }

    /// Sends a resume command to the daemon.
    pub async fn resume(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Resume).await
    }

    /// Sends a stop command to the daemon.
    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Stop).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Asks the daemon to close.
    pub async fn close(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Close).await
    }

    /// Streams watch messages until the daemon closes the connection.
    ///
    /// `on_message` is called once per line after the initial response.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, the daemon refuses the
    /// request, or a line cannot be parsed.
    pub async fn watch<F>(&self, mut on_message: F) -> Result<IpcResponse>
    where
        F: FnMut(WatchMessage),
    {
        let mut stream = self.connect().await?;
        Self::write_request(&mut stream, &IpcRequest::Watch).await?;

        let mut lines = BufReader::new(stream).lines();
        let first = timeout(Duration::from_secs(IO_TIMEOUT_SECS), lines.next_line())
            .await
            .context("読み込みがタイムアウトしました")?
            .context("レスポンスの受信に失敗しました")?
            .context("Daemonからの応答がありませんでした")?;

        let response: IpcResponse =
            serde_json::from_str(&first).context("レスポンスのパースに失敗しました")?;
        if !response.is_success() {
            anyhow::bail!("{}", response.message);
        }

        while let Some(line) = lines
            .next_line()
            .await
            .context("イベントの受信に失敗しました")?
        {
            if line.trim().is_empty() {
                continue;
            }
            let message: WatchMessage =
                serde_json::from_str(&line).context("イベントのパースに失敗しました")?;
            on_message(message);
        }

        Ok(response)
    }

    /// Sends a request to the daemon with retry logic.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut last_error = anyhow::anyhow!("リクエストを送信できませんでした");

        for attempt in 1..=MAX_RETRIES {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                // the daemon answered; retrying would repeat the command
                Err(e) if e.downcast_ref::<DaemonRejected>().is_some() => return Err(e),
                Err(e) => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    last_error = e;

                    if attempt < MAX_RETRIES {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect().await?;
        Self::write_request(&mut stream, request).await?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream)
                .take(MAX_RESPONSE_SIZE as u64)
                .read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        let response: IpcResponse =
            serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")?;

        if !response.is_success() {
            return Err(DaemonRejected(response.message).into());
        }

        Ok(response)
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'sleep-timer daemon' を起動してください")
    }

    async fn write_request(stream: &mut UnixStream, request: &IpcRequest) -> Result<()> {
        let request_json =
            serde_json::to_string(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(request_json.as_bytes()),
        )
        .await
        .context("書き込みがタイムアウトしました")?
        .context("リクエストの送信に失敗しました")?;

        timeout(Duration::from_secs(IO_TIMEOUT_SECS), stream.flush())
            .await
            .context("フラッシュがタイムアウトしました")?
            .context("フラッシュに失敗しました")?;

        // end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;
        Ok(())
    }
}

/// Error response returned by the daemon.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DaemonRejected(String);

// ============================================================================
// Tests
// ============================================================================
