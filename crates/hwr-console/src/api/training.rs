//! Training configuration and training service clients
//!
//! [`TrainingApi`] talks to the REST facade that stores training settings.
//! [`TrainingService`] talks to the HTTP side of the training process itself;
//! live progress goes through [`TrainingChannel`](crate::TrainingChannel).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiResult, ServiceClient};
use crate::training::CanonicalTrainingRequest;

#[derive(Debug, Clone)]
pub struct TrainingApi {
    client: ServiceClient,
}

impl TrainingApi {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Dataset currently selected for training
    pub async fn dataset(&self) -> ApiResult<Value> {
        self.client.get(&["train", "dataset"]).await
    }

    pub async fn architectures(&self) -> ApiResult<Value> {
        self.client.get(&["train", "architectures"]).await
    }

    pub async fn config(&self) -> ApiResult<Value> {
        self.client.get(&["train", "config"]).await
    }

    pub async fn set_config<C: Serialize + ?Sized>(&self, config: &C) -> ApiResult<Value> {
        self.client.post(&["train", "config"], config).await
    }

    pub async fn start(&self, request: &CanonicalTrainingRequest) -> ApiResult<Value> {
        self.client.post(&["train", "start"], request).await
    }

    pub async fn stop(&self) -> ApiResult<Value> {
        self.client.post_empty(&["train", "stop"]).await
    }

    pub async fn logs(&self) -> ApiResult<Value> {
        self.client.get(&["train", "logs"]).await
    }

    /// Loss and accuracy curves of the latest run
    pub async fn curve(&self) -> ApiResult<Value> {
        self.client.get(&["train", "curve"]).await
    }
}

/// Reply of the training service's health check
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrainingServiceHealth {
    pub status: String,
    /// Whether a run is in progress
    #[serde(default)]
    pub current_training: bool,
}

impl TrainingServiceHealth {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone)]
pub struct TrainingService {
    client: ServiceClient,
}

impl TrainingService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn health(&self) -> ApiResult<TrainingServiceHealth> {
        self.client.get(&["health"]).await
    }

    /// History of past runs
    pub async fn training_logs(&self) -> ApiResult<Value> {
        self.client.get(&["api", "training-logs"]).await
    }
}
