//! Training requests
//!
//! [`TrainingRequest`] is the convenience input a caller fills in;
//! [`CanonicalTrainingRequest`] is the normalized, fully-defaulted record sent
//! with the `start_training` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Epoch count used when the request leaves it unset
pub const DEFAULT_EPOCHS: u32 = 50;
/// Dataset used when the request leaves it unset
pub const DEFAULT_DATASET: &str = "mnist";
/// Backend identifier of the convolutional model
pub const CNN_MODEL: &str = "cnn_model";
/// Backend identifier of the dense model, the fallback for any other shorthand
pub const MLP_MODEL: &str = "mlp_model";
/// Backend identifier of the cross-entropy loss
pub const CROSS_ENTROPY: &str = "cross_entropy";
/// Display label of cross-entropy used by the console's training form
pub const CROSS_ENTROPY_LABEL: &str = "交叉熵";

/// A request rejected before transmission
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid training request: {0}")]
pub struct InvalidRequest(pub String);

/// Training configuration as entered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// Architecture shorthand, e.g. `CNN` or `MLP`
    pub model_architecture: String,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub save_model_name: Option<String>,
    pub batch_size: u32,
    pub learning_rate: f64,
    #[serde(default)]
    pub epochs: Option<u32>,
    pub optimizer: String,
    pub loss_function: String,
}

/// Training configuration in the form the backend expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrainingRequest {
    pub model_architecture: String,
    pub dataset_name: String,
    pub save_model_name: String,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub epochs: u32,
    pub optimizer: String,
    pub loss_function: String,
}

impl TrainingRequest {
    /// Create a request with the mandatory fields; optional ones stay unset
    pub fn new(
        model_architecture: impl Into<String>,
        batch_size: u32,
        learning_rate: f64,
        optimizer: impl Into<String>,
        loss_function: impl Into<String>,
    ) -> Self {
        Self {
            model_architecture: model_architecture.into(),
            dataset_name: None,
            save_model_name: None,
            batch_size,
            learning_rate,
            epochs: None,
            optimizer: optimizer.into(),
            loss_function: loss_function.into(),
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset_name = Some(dataset.into());
        self
    }

    pub fn with_save_name(mut self, name: impl Into<String>) -> Self {
        self.save_model_name = Some(name.into());
        self
    }

    pub fn with_epochs(mut self, epochs: u32) -> Self {
        self.epochs = Some(epochs);
        self
    }

    /// Normalize and default the request, stamping generated names with now
    pub fn canonicalize(&self) -> Result<CanonicalTrainingRequest, InvalidRequest> {
        self.canonicalize_at(Utc::now())
    }

    /// Normalize and default the request, stamping generated names with `now`
    pub fn canonicalize_at(&self, now: DateTime<Utc>) -> Result<CanonicalTrainingRequest, InvalidRequest> {
        if self.batch_size == 0 {
            return Err(InvalidRequest("batch_size must be positive".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(InvalidRequest(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }

        let save_model_name = match self.save_model_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!(
                "{}_{}",
                self.model_architecture.to_lowercase(),
                now.timestamp_millis()
            ),
        };

        let dataset_name = match self.dataset_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_DATASET.to_string(),
        };

        let epochs = match self.epochs {
            Some(epochs) if epochs > 0 => epochs,
            _ => DEFAULT_EPOCHS,
        };

        Ok(CanonicalTrainingRequest {
            model_architecture: canonical_architecture(&self.model_architecture).to_string(),
            dataset_name,
            save_model_name,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            epochs,
            optimizer: self.optimizer.to_lowercase(),
            loss_function: canonical_loss(&self.loss_function),
        })
    }
}

/// Map an architecture shorthand to the backend's model identifier
pub fn canonical_architecture(architecture: &str) -> &'static str {
    if architecture.eq_ignore_ascii_case("cnn") || architecture == CNN_MODEL {
        CNN_MODEL
    } else {
        MLP_MODEL
    }
}

/// Map a loss-function label to the backend's identifier
pub fn canonical_loss(loss: &str) -> String {
    if loss == CROSS_ENTROPY_LABEL {
        CROSS_ENTROPY.to_string()
    } else {
        loss.to_lowercase()
    }
}
