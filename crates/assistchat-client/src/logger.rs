//! JSONL transcript logging.
//!
//! One file per run; every message rendered into the panel is appended
//! as a single JSON line. Logging failures are reported to stderr and
//! never interrupt the chat.

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use assistchat_types::Message;

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String, // ISO-8601 local time
    role: &'a str,
    content: &'a str,
}

pub struct TranscriptLogger {
    file_path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl TranscriptLogger {
    /// Create a new logger; the file name carries the current local time.
    pub async fn new(workspace: &Path) -> Result<Self> {
        let logs_dir = workspace.join("logs");
        fs::create_dir_all(&logs_dir).await?;

        let filename = format!("assistchat-{}.jsonl", Local::now().format("%Y-%m-%d-%H%M%S"));
        let file_path = logs_dir.join(filename);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await?;
        Ok(Self {
            file_path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append a single transcript entry.
    pub async fn log(&mut self, message: &Message) {
        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            role: message.role.as_str(),
            content: &message.content,
        };
        let Some(file) = &mut self.file else { return };
        if let Ok(json) = serde_json::to_string(&entry) {
            if let Err(e) = file.write_all(json.as_bytes()).await {
                eprintln!("[Logging error] {}", e);
            } else if let Err(e) = file.write_all(b"\n").await {
                eprintln!("[Logging error] {}", e);
            }
        }
    }

    /// Close the logger (explicit drop). Called on graceful shutdown.
    pub async fn shutdown(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all().await;
        }
    }
}
