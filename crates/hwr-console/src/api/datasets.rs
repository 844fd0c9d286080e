//! Dataset service client

use serde::{Deserialize, Serialize};

use super::{ApiResult, ServiceClient, ServiceMessage};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub name: String,
    #[serde(default)]
    pub num_images: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectDataset<'a> {
    dataset_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct DatasetService {
    client: ServiceClient,
}

impl DatasetService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn list(&self) -> ApiResult<Vec<DatasetInfo>> {
        self.client.get(&["datasets"]).await
    }

    pub async fn delete(&self, name: &str) -> ApiResult<ServiceMessage> {
        self.client.delete(&["datasets", name]).await
    }

    /// Choose the dataset used by the next training run
    pub async fn select(&self, name: &str) -> ApiResult<ServiceMessage> {
        self.client
            .post(&["datasets", "select"], &SelectDataset { dataset_name: name })
            .await
    }
}
