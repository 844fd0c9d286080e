//! Operation log service client

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiResult, ServiceClient};

/// Layout of the `time` field
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// User label when no user id is stored
pub const UNKNOWN_USER: &str = "unknown";

/// One audit entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationLog {
    pub user: String,
    pub action: String,
    pub time: String,
}

impl OperationLog {
    /// Entry for `action` by `user_id` at `now`
    pub fn new(user_id: Option<&str>, action: &str, now: DateTime<Local>) -> Self {
        let user_id = user_id.filter(|id| !id.is_empty()).unwrap_or(UNKNOWN_USER);
        Self {
            user: format!("用户{}", user_id),
            action: action.to_string(),
            time: now.format(TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogService {
    client: ServiceClient,
}

impl LogService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn list(&self) -> ApiResult<Vec<OperationLog>> {
        self.client.get(&["logs"]).await
    }

    /// Record an operation. Failures are logged and otherwise ignored so
    /// they never interrupt the operation being recorded.
    pub async fn append(&self, user_id: Option<&str>, action: &str) {
        let entry = OperationLog::new(user_id, action, Local::now());
        match self.client.post::<_, serde_json::Value>(&["logs"], &entry).await {
            Ok(_) => debug!(action, "Operation logged"),
            Err(e) => warn!(action, error = %e, "Failed to record operation log"),
        }
    }
}
