//! Sequential processor for JSON-lines inbound events.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::events::{InboundEvent, Outcome};
use crate::sink::NotificationSink;
use crate::tracker::Tracker;

/// Result of processing a single line.
#[derive(Debug)]
pub enum ProcessResult {
    /// The event ran and produced an outcome.
    Responded {
        user_id: i64,
        chat_id: i64,
        outcome: Outcome,
    },
    /// The event ran and was rejected or failed.
    Error {
        user_id: i64,
        chat_id: i64,
        error: TrackerError,
    },
    /// The line was not a valid event.
    Malformed { reason: String },
    /// The line was blank.
    Skipped,
}

/// Wire shape written back for every non-blank line.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<'a> {
    Ok {
        user_id: i64,
        chat_id: i64,
        outcome: &'a Outcome,
    },
    Error {
        user_id: i64,
        chat_id: i64,
        code: &'static str,
        message: String,
    },
    Malformed {
        reason: &'a str,
    },
}

impl ProcessResult {
    /// Response to write back, or `None` for blank lines.
    pub fn response(&self) -> Option<Response<'_>> {
        match self {
            ProcessResult::Responded {
                user_id,
                chat_id,
                outcome,
            } => Some(Response::Ok {
                user_id: *user_id,
                chat_id: *chat_id,
                outcome,
            }),
            ProcessResult::Error {
                user_id,
                chat_id,
                error,
            } => Some(Response::Error {
                user_id: *user_id,
                chat_id: *chat_id,
                code: error.code(),
                // System faults are surfaced generically
                message: if error.is_user_facing() {
                    error.to_string()
                } else {
                    "internal error".to_string()
                },
            }),
            ProcessResult::Malformed { reason } => Some(Response::Malformed {
                reason: reason.as_str(),
            }),
            ProcessResult::Skipped => None,
        }
    }
}

/// Counters for a processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub responded: usize,
    pub errors: usize,
    pub malformed: usize,
}

/// Feeds inbound events to a [`Tracker`] one at a time.
pub struct EventProcessor<S: NotificationSink> {
    tracker: Tracker<S>,
}

impl<S: NotificationSink> EventProcessor<S> {
    pub fn new(tracker: Tracker<S>) -> Self {
        Self { tracker }
    }

    /// Parse and dispatch one JSON line.
    pub async fn process_line(&self, line: &str) -> ProcessResult {
        let line = line.trim();
        if line.is_empty() {
            return ProcessResult::Skipped;
        }

        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Malformed event: {}", e);
                return ProcessResult::Malformed {
                    reason: e.to_string(),
                };
            }
        };

        debug!(
            user_id = event.user_id,
            chat_id = event.chat_id,
            operation = event.action.name(),
            "Processing event"
        );

        match self.tracker.dispatch(&event).await {
            Ok(outcome) => ProcessResult::Responded {
                user_id: event.user_id,
                chat_id: event.chat_id,
                outcome,
            },
            Err(error) => ProcessResult::Error {
                user_id: event.user_id,
                chat_id: event.chat_id,
                error,
            },
        }
    }

    /// Process every line of `reader`, writing one JSON response per event to `writer`.
    ///
    /// Runs until the reader is exhausted. Failed events and undecodable
    /// lines never stop the loop; only reader and writer errors do.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<ProcessStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut stats = ProcessStats::default();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let result = match std::str::from_utf8(&buf) {
                Ok(line) => self.process_line(line).await,
                Err(e) => {
                    warn!("Undecodable event line: {}", e);
                    ProcessResult::Malformed {
                        reason: format!("invalid UTF-8: {}", e),
                    }
                }
            };

            match &result {
                ProcessResult::Responded { .. } => stats.responded += 1,
                ProcessResult::Error { .. } => stats.errors += 1,
                ProcessResult::Malformed { .. } => stats.malformed += 1,
                ProcessResult::Skipped => continue,
            }

            if let Some(response) = result.response() {
                let mut payload = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
                payload.push(b'\n');
                writer.write_all(&payload).await?;
                writer.flush().await?;
            }
        }

        info!(
            responded = stats.responded,
            errors = stats.errors,
            malformed = stats.malformed,
            "Event stream ended"
        );
        Ok(stats)
    }
}
