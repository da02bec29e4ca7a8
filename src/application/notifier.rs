//! Notification collaborator: delivers the daily summary text somewhere a
//! person will read it.

use std::future::Future;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
    fn send(&self, message: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes the message to the log. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "ferrecontrol::notification", "\n{}", message);
        Ok(())
    }
}

/// Appends each message as one JSON line to an outbox file that an external
/// relay (e.g. a messaging gateway) drains.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    queued_at: chrono::DateTime<Utc>,
    message: &'a str,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Notifier for OutboxNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let entry = OutboxEntry {
            queued_at: Utc::now(),
            message,
        };
        let mut line = serde_json::to_string(&entry).map_err(|e| NotifyError(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| NotifyError(format!("cannot open outbox {}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| NotifyError(format!("cannot write outbox {}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| NotifyError(format!("cannot write outbox {}: {}", self.path.display(), e)))?;

        tracing::debug!(outbox = %self.path.display(), "queued daily summary");
        Ok(())
    }
}

/// Notifier picked at startup from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Log(LogNotifier),
    Outbox(OutboxNotifier),
}

impl Notifier for ConfiguredNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        match self {
            ConfiguredNotifier::Log(n) => n.send(message).await,
            ConfiguredNotifier::Outbox(n) => n.send(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_outbox_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outbox.jsonl");
        let outbox = OutboxNotifier::new(&path);

        outbox.send("primero").await.unwrap();
        outbox.send("segundo\ncon salto").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["message"], "segundo\ncon salto");
    }

    #[tokio::test]
    async fn test_outbox_reports_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let outbox = OutboxNotifier::new(dir.path().join("missing").join("outbox.jsonl"));

        let err = outbox.send("hola").await.unwrap_err();
        assert!(err.0.starts_with("cannot open outbox"));
    }
}
