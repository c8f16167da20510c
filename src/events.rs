//! Progress events emitted across the transport boundary
//!
//! The orchestrator emits these at well-defined points: start, each chunk
//! completion, aggregation start, final result, and failure. The SSE endpoint
//! streams them; the plain JSON endpoint ignores them.

use crate::orchestrator::SummaryResult;
use serde::Serialize;
use tokio::sync::mpsc;

/// One progress signal
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Processing,
    Info {
        message: String,
    },
    Progress {
        chunk_index: usize,
        total_chunks: usize,
        percent: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },
    Chunk {
        index: usize,
        summary: String,
    },
    Warning {
        message: String,
    },
    Result {
        summary: SummaryResult,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after: Option<u64>,
    },
    Complete,
}

impl ProgressEvent {
    /// Event name used on the wire (SSE event field)
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Processing => "processing",
            ProgressEvent::Info { .. } => "info",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Chunk { .. } => "chunk",
            ProgressEvent::Warning { .. } => "warning",
            ProgressEvent::Result { .. } => "result",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete => "complete",
        }
    }
}

/// Destination for progress events
///
/// Wraps an optional channel so non-streaming callers can pass a disabled
/// sink and skip the bookkeeping entirely. Sends never block and drop
/// silently once the receiver is gone.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl EventSink {
    /// Sink plus the receiving end for a streaming transport
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::Progress {
            chunk_index: 2,
            total_chunks: 8,
            percent: 25,
            stage: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["chunk_index"], 2);
        assert_eq!(json["percent"], 25);
        assert!(json.get("stage").is_none());
    }

    #[test]
    fn test_error_event_carries_retry_after() {
        let event = ProgressEvent::Error {
            message: "rate limited".to_string(),
            retry_after: Some(30),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["retry_after"], 30);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ProgressEvent::Processing.name(), "processing");
        assert_eq!(ProgressEvent::Complete.name(), "complete");
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(ProgressEvent::Processing);
        sink.emit(ProgressEvent::Complete);

        assert_eq!(rx.recv().await.unwrap().name(), "processing");
        assert_eq!(rx.recv().await.unwrap().name(), "complete");
    }

    #[test]
    fn test_disabled_sink_does_not_panic() {
        EventSink::disabled().emit(ProgressEvent::Complete);
    }
}
