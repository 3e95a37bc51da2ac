//! Display utilities for the sleep timer CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Status display
//! - The `watch` stream
//! - Error messages

use crate::daemon::WatchMessage;
use crate::events::UiEvent;
use crate::types::IpcResponse;

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a button press or volume-down request.
    pub fn show_press_result(response: &IpcResponse) {
        println!("* {}", response.message);
        Self::show_remaining(response, "  ");
    }

    /// Shows a success message for a duration or preset change.
    pub fn show_duration_success(response: &IpcResponse) {
        println!("* {}", response.message);
        Self::show_remaining(response, "  ");
    }

    /// Shows a success message for timer pause.
    pub fn show_pause_success(response: &IpcResponse) {
        println!("|| タイマーを一時停止しました");
        Self::show_remaining(response, "  ");
    }

    /// Shows a success message for timer resume.
    pub fn show_resume_success(response: &IpcResponse) {
        println!("> タイマーを再開しました");
        Self::show_remaining(response, "  ");
    }

    /// Shows a success message for timer stop.
    pub fn show_stop_success(_response: &IpcResponse) {
        println!("[] タイマーを停止しました");
    }

    /// Shows a success message for close.
    pub fn show_close_success(_response: &IpcResponse) {
        println!("* アプリケーションを終了しました");
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("スリープタイマー ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("タイマーは起動していません");
            return;
        };

        let state = data.state.as_deref().unwrap_or("unknown");
        println!("状態: {}", Self::state_label(state));

        if state == "running" || state == "paused" {
            if let Some(remaining) = data.remaining_seconds {
                println!("残り時間: {}", Self::format_time(remaining));
            }
        }
        if let Some(minutes) = data.duration_minutes {
            println!("設定時間: {}分", minutes);
        }
        if let Some(text) = &data.status_text {
            println!("通知: {}", text);
        }
    }

    /// Shows one line of the watch stream.
    pub fn show_watch_message(message: &WatchMessage) {
        println!("{}", Self::format_watch_message(message));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn show_remaining(response: &IpcResponse, indent: &str) {
        if let Some(data) = &response.data {
            if let Some(state) = data.state.as_deref() {
                println!("{}状態: {}", indent, Self::state_label(state));
            }
            if data.state.as_deref() == Some("running") || data.state.as_deref() == Some("paused")
            {
                if let Some(remaining) = data.remaining_seconds {
                    println!("{}残り時間: {}", indent, Self::format_time(remaining));
                }
            }
        }
    }

    fn state_label(state: &str) -> &str {
        match state {
            "idle" => "待機中",
            "running" => "動作中",
            "paused" => "一時停止中",
            "completed" => "完了",
            other => other,
        }
    }

    fn format_watch_message(message: &WatchMessage) -> String {
        match message {
            WatchMessage::Event(event) => match event {
                UiEvent::Started => "[started] タイマーを開始しました".to_string(),
                UiEvent::Paused => "[paused] タイマーを一時停止しました".to_string(),
                UiEvent::Resumed => "[resumed] タイマーを再開しました".to_string(),
                UiEvent::Completed => "[completed] タイマーが終了しました".to_string(),
                UiEvent::Stopped => "[stopped] タイマーを停止しました".to_string(),
                UiEvent::DurationUpdated { seconds } => format!(
                    "[durationUpdated] タイマー時間を{}に変更しました",
                    Self::format_time(*seconds)
                ),
                UiEvent::ButtonPressed { command } => {
                    format!("[buttonPressed] {}", command)
                }
                UiEvent::PresetSelected { minutes } => {
                    format!("[presetSelected] {}分", minutes)
                }
                UiEvent::CloseRequested => "[closeRequested] 終了します".to_string(),
            },
            WatchMessage::Status(update) => format!(
                "  {} ({})",
                update.text,
                Self::format_time(update.remaining_millis.div_ceil(1000))
            ),
        }
    }

    /// Formats seconds as `m:ss`.
    fn format_time(total_seconds: u64) -> String {
        format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

// ============================================================================
// Tests
// ============================================================================
