//! Run tracking
//!
//! Folds the event stream of a run into a summary. The training service
//! documents the per-run sequence `started → progress* → complete | error |
//! stopped`; the tracker follows it but does not enforce it. Out-of-sequence
//! events are logged and still recorded.

use serde::Serialize;
use tracing::warn;

use super::event::{TrainingComplete, TrainingEvent, TrainingProgress};

/// Observed phase of the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Started,
    Running,
    Completed,
    Errored,
    Stopped,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Stopped)
    }

    fn in_run(&self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }
}

/// Summary of one training run built from its events
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    phase: RunPhase,
    training_id: Option<String>,
    progress: Vec<TrainingProgress>,
    completion: Option<TrainingComplete>,
    message: Option<String>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the resulting phase
    pub fn observe(&mut self, event: &TrainingEvent) -> RunPhase {
        match event {
            TrainingEvent::Started(started) => {
                if self.phase.in_run() {
                    warn!(
                        previous = ?self.training_id,
                        next = %started.training_id,
                        "Run started before the previous one finished"
                    );
                }
                *self = Self {
                    phase: RunPhase::Started,
                    training_id: Some(started.training_id.clone()),
                    ..Self::default()
                };
            }
            TrainingEvent::Progress(progress) => {
                if !self.phase.in_run() {
                    warn!(epoch = progress.epoch, phase = ?self.phase, "Progress outside a run");
                }
                self.progress.push(progress.clone());
                self.phase = RunPhase::Running;
            }
            TrainingEvent::Complete(complete) => {
                self.warn_if_idle("training_complete");
                self.completion = Some(complete.clone());
                self.phase = RunPhase::Completed;
            }
            TrainingEvent::Error(message) => {
                self.warn_if_idle("training_error");
                self.message = Some(message.clone());
                self.phase = RunPhase::Errored;
            }
            TrainingEvent::Stopped(message) => {
                self.message = Some(message.clone());
                self.phase = RunPhase::Stopped;
            }
        }

        self.phase
    }

    fn warn_if_idle(&self, event: &str) {
        if !self.phase.in_run() {
            warn!(event_name = event, phase = ?self.phase, "Terminal event outside a run");
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn training_id(&self) -> Option<&str> {
        self.training_id.as_deref()
    }

    /// Epoch metrics in arrival order
    pub fn progress(&self) -> &[TrainingProgress] {
        &self.progress
    }

    pub fn latest(&self) -> Option<&TrainingProgress> {
        self.progress.last()
    }

    pub fn completion(&self) -> Option<&TrainingComplete> {
        self.completion.as_ref()
    }

    /// Error or stop message of a run that ended without completing
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Highest validation accuracy reported so far
    pub fn best_val_acc(&self) -> Option<f64> {
        self.progress
            .iter()
            .filter_map(|p| p.val_acc)
            .fold(None, |best, acc| match best {
                Some(b) if b >= acc => Some(b),
                _ => Some(acc),
            })
    }
}
