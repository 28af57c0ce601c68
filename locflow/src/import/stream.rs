//! Progress of a streamed apply.

use tokio::sync::watch;

use crate::{error::Error, import::model::ImportStatus};

/// Receives [`ImportStatus`] records of one running apply.
///
/// Backed by a `watch` channel: the producer never waits for the consumer,
/// and a slow consumer only sees the latest status. The stream ends after a
/// terminal status.
pub struct StatusStream {
    receiver: watch::Receiver<ImportStatus>,
    finished: bool,
}

impl StatusStream {
    pub(crate) fn new(mut receiver: watch::Receiver<ImportStatus>) -> Self {
        receiver.mark_changed();
        Self {
            receiver,
            finished: false,
        }
    }

    /// Waits for the next status. Returns `None` once a terminal status has
    /// been delivered or the producer went away.
    pub async fn next(&mut self) -> Option<ImportStatus> {
        if self.finished {
            return None;
        }
        if self.receiver.changed().await.is_err() {
            self.finished = true;
            return None;
        }
        let status = self.receiver.borrow_and_update().clone();
        self.finished = status.is_terminal();
        Some(status)
    }

    /// The latest status without waiting.
    pub fn latest(&self) -> ImportStatus {
        self.receiver.borrow().clone()
    }

    /// Drains the stream into NDJSON, one status per line.
    pub async fn into_ndjson(mut self) -> Result<String, Error> {
        let mut out = String::new();
        while let Some(status) = self.next().await {
            out.push_str(&status.to_ndjson()?);
        }
        Ok(out)
    }
}
