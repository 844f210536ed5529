//! Observer trait for flow events.
//!
//! Inject an [`Arc<dyn FlowObserver>`] into an orchestrator to follow a
//! submission as it moves through its states: a terminal spinner, a GUI
//! binding, or a test recorder. All methods default to no-ops so
//! implementors only override what they need.
//!
//! # Example
//!
//! ```rust
//! use stegaudio_client::{FlowKind, FlowObserver, FlowState};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct History(Mutex<Vec<String>>);
//!
//! impl FlowObserver for History {
//!     fn on_state_change(&self, flow: FlowKind, state: &FlowState) {
//!         self.0.lock().unwrap().push(format!("{flow}: {}", state.label()));
//!     }
//! }
//!
//! let observer: Arc<dyn FlowObserver> = Arc::new(History::default());
//! observer.on_state_change(FlowKind::Verify, &FlowState::Validating);
//! ```

use crate::download::SavedArtifact;
use crate::state::{FlowKind, FlowState};
use std::sync::Arc;

/// Receives state transitions and side effects of a flow.
///
/// Calls happen on the task driving the submission, in order.
pub trait FlowObserver: Send + Sync {
    /// Called after every state transition, including resets.
    fn on_state_change(&self, flow: FlowKind, state: &FlowState) {
        let _ = (flow, state);
    }

    /// Called just before a request is sent.
    ///
    /// # Arguments
    /// * `step`     : 1-indexed step number
    /// * `total`    : steps in this submission
    /// * `endpoint` : endpoint path being called
    fn on_step_start(&self, flow: FlowKind, step: usize, total: usize, endpoint: &str) {
        let _ = (flow, step, total, endpoint);
    }

    /// Called once per artifact written to disk.
    fn on_artifact_saved(&self, flow: FlowKind, artifact: &SavedArtifact) {
        let _ = (flow, artifact);
    }
}

/// Default observer when none is configured.
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}

/// Shared observer handle as stored by the orchestrators.
pub type ObserverRef = Arc<dyn FlowObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        states: AtomicUsize,
        steps: AtomicUsize,
        saved: AtomicUsize,
    }

    impl FlowObserver for Counting {
        fn on_state_change(&self, _flow: FlowKind, _state: &FlowState) {
            self.states.fetch_add(1, Ordering::SeqCst);
        }

        fn on_step_start(&self, _flow: FlowKind, _step: usize, _total: usize, _endpoint: &str) {
            self.steps.fetch_add(1, Ordering::SeqCst);
        }

        fn on_artifact_saved(&self, _flow: FlowKind, _artifact: &SavedArtifact) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_state_change(FlowKind::Embed, &FlowState::Idle);
        o.on_step_start(FlowKind::Embed, 1, 2, "/embed/audio");
    }

    #[test]
    fn arc_dyn_observer_receives_events() {
        let counting = Arc::new(Counting::default());
        let o: ObserverRef = counting.clone();
        o.on_state_change(FlowKind::Extract, &FlowState::Validating);
        o.on_step_start(FlowKind::Extract, 1, 1, "/extract-file");
        o.on_artifact_saved(
            FlowKind::Extract,
            &SavedArtifact {
                requested_name: "secret.txt".into(),
                path: PathBuf::from("secret.txt"),
                size_bytes: 3,
            },
        );
        assert_eq!(counting.states.load(Ordering::SeqCst), 1);
        assert_eq!(counting.steps.load(Ordering::SeqCst), 1);
        assert_eq!(counting.saved.load(Ordering::SeqCst), 1);
    }
}
