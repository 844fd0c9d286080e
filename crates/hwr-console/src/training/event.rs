//! Inbound training events
//!
//! The training service reports a run through five named events. Each maps
//! to one [`TrainingEvent`] variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Name of the command that starts a run
pub const START_TRAINING: &str = "start_training";
/// Name of the command that stops the current run
pub const STOP_TRAINING: &str = "stop_training";

// =============================================================================
// Event Kinds
// =============================================================================

/// Inbound event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Progress,
    Complete,
    Error,
    Stopped,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        Self::Started,
        Self::Progress,
        Self::Complete,
        Self::Error,
        Self::Stopped,
    ];

    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "training_started",
            Self::Progress => "training_progress",
            Self::Complete => "training_complete",
            Self::Error => "training_error",
            Self::Stopped => "training_stopped",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
            .or_else(|| Self::from_name(&format!("training_{}", s)))
            .ok_or_else(|| format!("unknown training event '{}'", s))
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Acknowledgement that a run was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStarted {
    pub training_id: String,
}

/// Metrics of one finished epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub epoch: u32,
    pub train_loss: f64,
    pub train_acc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_acc: Option<f64>,
}

/// Final result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingComplete {
    pub model_path: String,
    pub final_train_acc: f64,
    pub final_val_acc: f64,
}

// =============================================================================
// Events
// =============================================================================

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TrainingEvent {
    Started(TrainingStarted),
    Progress(TrainingProgress),
    Complete(TrainingComplete),
    Error(String),
    Stopped(String),
}

impl TrainingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Started(_) => EventKind::Started,
            Self::Progress(_) => EventKind::Progress,
            Self::Complete(_) => EventKind::Complete,
            Self::Error(_) => EventKind::Error,
            Self::Stopped(_) => EventKind::Stopped,
        }
    }

    /// Whether the event ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_) | Self::Stopped(_))
    }

    /// Decode a named event with its arguments.
    ///
    /// Returns `Ok(None)` for names outside the training vocabulary.
    pub fn from_wire(name: &str, args: &[Value]) -> Result<Option<Self>, serde_json::Error> {
        let Some(kind) = EventKind::from_name(name) else {
            return Ok(None);
        };
        let payload = args.first().cloned().unwrap_or(Value::Null);

        let event = match kind {
            EventKind::Started => Self::Started(serde_json::from_value(payload)?),
            EventKind::Progress => Self::Progress(serde_json::from_value(payload)?),
            EventKind::Complete => Self::Complete(serde_json::from_value(payload)?),
            EventKind::Error => Self::Error(message_text(payload)),
            EventKind::Stopped => Self::Stopped(message_text(payload)),
        };

        Ok(Some(event))
    }

    /// Event name and argument list as sent by the training service
    pub fn to_wire(&self) -> (&'static str, Vec<Value>) {
        let payload = match self {
            Self::Started(started) => serde_json::to_value(started),
            Self::Progress(progress) => serde_json::to_value(progress),
            Self::Complete(complete) => serde_json::to_value(complete),
            Self::Error(message) | Self::Stopped(message) => Ok(Value::String(message.clone())),
        };
        (self.kind().name(), vec![payload.unwrap_or(Value::Null)])
    }
}

/// Text of a message payload; objects carrying `message` or `error` are unwrapped
fn message_text(payload: Value) -> String {
    match payload {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Object(ref map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string()),
        other => other.to_string(),
    }
}
