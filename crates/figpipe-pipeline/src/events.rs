//! Pipeline event system for observability.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! progress reporters can follow a run without coupling to the runner.

use serde::{Deserialize, Serialize};

use figpipe_types::{GateStatus, PipelineStatus};

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        file_key: String,
        node_id: String,
    },
    StageStarted {
        stage: String,
    },
    StageCompleted {
        stage: String,
        cached: bool,
        duration_ms: u64,
    },
    GateEvaluated {
        gate: String,
        status: GateStatus,
        score: f64,
    },
    PatchAttempted {
        iteration: u32,
        strategy: String,
        accepted: bool,
    },
    RunCompleted {
        run_id: String,
        status: PipelineStatus,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(PipelineEvent::StageCompleted {
            stage: "normalize_ir".into(),
            cached: true,
            duration_ms: 0,
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::StageCompleted { stage, cached, .. } => {
                assert_eq!(stage, "normalize_ir");
                assert!(cached);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let emitter = EventEmitter::new(16);
        emitter.emit(PipelineEvent::RunCompleted {
            run_id: "r".into(),
            status: PipelineStatus::Fail,
        });
    }

    #[test]
    fn gate_event_serializes_status() {
        let event = PipelineEvent::GateEvaluated {
            gate: "static".into(),
            status: GateStatus::Warn,
            score: 75.0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"WARN\""));
    }
}
