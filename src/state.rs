//! Per-flow state machine.
//!
//! ```text
//! Idle ──▶ Validating ──▶ Submitting(1/n) ──▶ … ──▶ Submitting(n/n) ──▶ Succeeded
//!  ▲            │                 │                                      │
//!  │            └───────┬─────────┴──────────────────────────────▶ Failed
//!  └────── reset / new input ◀──────────────────────────────────────┘
//! ```
//!
//! `Failed` may also go straight to `Validating` when the user resubmits.
//! Each orchestrator owns one [`FlowTracker`] and is the only writer.

use crate::download::SavedArtifact;
use crate::error::ErrorDetail;
use crate::progress::{NoopObserver, ObserverRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The three user-facing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Embed,
    Extract,
    Verify,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Embed => f.write_str("embed"),
            FlowKind::Extract => f.write_str("extract"),
            FlowKind::Verify => f.write_str("verify"),
        }
    }
}

/// Capacity figures and links returned by the combined embed endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedReport {
    pub used_bytes: Option<u64>,
    pub max_bytes: Option<u64>,
    pub remaining_bytes: Option<u64>,
    /// Absolute URL of the produced audio, if the service returned one.
    pub audio_url: Option<String>,
    /// Absolute URL of the produced QR image, if the service returned one.
    pub qr_url: Option<String>,
    /// Artifacts pulled from the links when link fetching is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetched: Vec<SavedArtifact>,
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowOutcome {
    /// Embedded audio saved, plus the QR image when the service produced one.
    Embedded {
        audio: SavedArtifact,
        qr: Option<SavedArtifact>,
    },
    /// Combined embed: nothing saved automatically, links reported instead.
    EmbedReport(EmbedReport),
    Extracted(SavedArtifact),
    /// `note` carries the reason when `valid` is false because the call itself failed.
    Verified { valid: bool, note: Option<String> },
}

/// State of one flow instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    Validating,
    Submitting {
        step: usize,
        of: usize,
    },
    Succeeded(FlowOutcome),
    Failed(ErrorDetail),
}

impl FlowState {
    /// Short name for logs and UIs.
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Validating => "validating",
            FlowState::Submitting { .. } => "submitting",
            FlowState::Succeeded(_) => "succeeded",
            FlowState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Succeeded(_) | FlowState::Failed(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, FlowState::Validating | FlowState::Submitting { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &FlowState) -> bool {
        use FlowState::*;
        match (self, next) {
            (Idle, Idle) => true,
            (Idle | Failed(_), Validating) => true,
            (Succeeded(_) | Failed(_), Idle) => true,
            (Validating, Submitting { step: 1, .. }) => true,
            (Validating, Failed(_)) => true,
            (Submitting { step, of }, Submitting { step: n, of: n_of }) => {
                of == n_of && *n == step + 1 && n <= of
            }
            (Submitting { .. }, Succeeded(_) | Failed(_)) => true,
            _ => false,
        }
    }
}

/// Submission is allowed iff the flow is `Idle` or `Failed` and every required input is present.
pub fn can_submit(state: &FlowState, inputs_ready: bool) -> bool {
    inputs_ready && matches!(state, FlowState::Idle | FlowState::Failed(_))
}

/// Holds a flow's state and publishes every transition.
#[derive(Clone)]
pub struct FlowTracker {
    kind: FlowKind,
    state: FlowState,
    observer: ObserverRef,
}

impl fmt::Debug for FlowTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowTracker")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish()
    }
}

impl FlowTracker {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            state: FlowState::Idle,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observer = observer;
        self
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn observer(&self) -> &ObserverRef {
        &self.observer
    }

    /// Move to `next`. Illegal transitions are a programming error.
    pub fn advance(&mut self, next: FlowState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "{}: illegal transition {:?} -> {:?}",
            self.kind,
            self.state,
            next
        );
        if !self.state.can_transition_to(&next) {
            warn!(
                "{}: unexpected transition {} -> {}",
                self.kind,
                self.state.label(),
                next.label()
            );
        }
        debug!("{}: {} -> {}", self.kind, self.state.label(), next.label());
        self.state = next;
        self.observer.on_state_change(self.kind, &self.state);
    }

    /// Back to `Idle` after a result, or after a submission whose future was dropped.
    pub fn reset(&mut self) {
        if matches!(self.state, FlowState::Idle) {
            return;
        }
        if self.state.is_busy() {
            debug!("{}: previous submission was abandoned", self.kind);
        }
        self.state = FlowState::Idle;
        self.observer.on_state_change(self.kind, &self.state);
    }
}
