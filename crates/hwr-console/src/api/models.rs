//! Model management service client

use serde::{Deserialize, Serialize};

use super::{ApiResult, ServiceClient, ServiceMessage};

/// A trained model known to the model service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    /// ISO-8601 duration, e.g. `PT2H30M`
    #[serde(default)]
    pub train_time: Option<String>,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub train_date: Option<String>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyModel<'a> {
    model_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct ModelService {
    client: ServiceClient,
}

impl ModelService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn list(&self) -> ApiResult<Vec<ModelInfo>> {
        self.client.get(&["models"]).await
    }

    /// Make `name` the active model
    pub async fn apply(&self, name: &str) -> ApiResult<ServiceMessage> {
        self.client
            .post(&["models", "apply"], &ApplyModel { model_name: name })
            .await
    }

    pub async fn delete(&self, name: &str) -> ApiResult<ServiceMessage> {
        self.client.delete(&["models", name]).await
    }
}
