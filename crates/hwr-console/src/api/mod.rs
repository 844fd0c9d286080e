//! REST clients for the console's collaborating services
//!
//! All clients share one `reqwest::Client` with a cookie store; the
//! authentication service keeps its session in a cookie.

pub mod auth;
pub mod datasets;
pub mod logs;
pub mod models;
pub mod training;

pub use auth::{AuthService, Captcha, ClientInfo, CurrentUser, LoginRequest};
pub use datasets::{DatasetInfo, DatasetService};
pub use logs::{LogService, OperationLog};
pub use models::{ModelInfo, ModelService};
pub use training::{TrainingApi, TrainingService, TrainingServiceHealth};

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ServicesConfig;

/// Envelope code meaning success
pub const SUCCESS_CODE: i64 = 200;

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Request rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("Authentication required")]
    AuthRequired,
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `{ code, message, data }` wrapper used by the authentication service
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The payload of a successful envelope
    pub fn into_result(self) -> ApiResult<Option<T>> {
        if self.code == SUCCESS_CODE {
            Ok(self.data)
        } else if self.code == 401 {
            Err(ApiError::AuthRequired)
        } else {
            Err(ApiError::Rejected {
                code: self.code,
                message: self.message.unwrap_or_default(),
            })
        }
    }
}

/// `{ msg }` or `{ error }` reply of the dataset and model services
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceMessage {
    pub fn text(&self) -> &str {
        self.error
            .as_deref()
            .or(self.msg.as_deref())
            .unwrap_or_default()
    }
}

/// Build the shared HTTP client
pub fn http_client(timeout: Duration) -> ApiResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .build()?)
}

// =============================================================================
// Service Client
// =============================================================================

/// HTTP client bound to one service's base URL
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> ApiResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended by path segments; each segment is percent-encoded
    pub fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.url(segments)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn post<B, T>(&self, segments: &[&str], body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        read_json(response).await
    }

    /// POST without a request body
    pub async fn post_empty<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.url(segments)?;
        debug!(%url, "POST");
        let response = self.http.post(url).send().await?;
        read_json(response).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.url(segments)?;
        debug!(%url, "DELETE");
        let response = self.http.delete(url).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    if status.as_u16() == 401 {
        return Err(ApiError::AuthRequired);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Server {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Human-readable text of an error body
fn error_message(body: &str) -> String {
    if let Ok(message) = serde_json::from_str::<ServiceMessage>(body) {
        if !message.text().is_empty() {
            return message.text().to_string();
        }
    }
    if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        if let Some(message) = envelope.message {
            return message;
        }
    }
    body.to_string()
}

// =============================================================================
// Console Services
// =============================================================================

/// Every REST collaborator, sharing one HTTP client
#[derive(Debug, Clone)]
pub struct ConsoleServices {
    pub auth: AuthService,
    pub datasets: DatasetService,
    pub models: ModelService,
    pub logs: LogService,
    pub training: TrainingApi,
    pub trainer: TrainingService,
}

impl ConsoleServices {
    pub fn new(config: &ServicesConfig) -> ApiResult<Self> {
        let http = http_client(config.request_timeout())?;
        Ok(Self {
            auth: AuthService::new(ServiceClient::new(http.clone(), &config.auth_url)?),
            datasets: DatasetService::new(ServiceClient::new(http.clone(), &config.datasets_url)?),
            models: ModelService::new(ServiceClient::new(http.clone(), &config.models_url)?),
            logs: LogService::new(ServiceClient::new(http.clone(), &config.logs_url)?),
            training: TrainingApi::new(ServiceClient::new(http.clone(), &config.training_api_url)?),
            trainer: TrainingService::new(ServiceClient::new(http, &config.training_service_url)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ServiceClient {
        ServiceClient::new(reqwest::Client::new(), base).unwrap()
    }

    #[test]
    fn test_url_segments() {
        let api = client("http://localhost:8080/api/");
        assert_eq!(
            api.url(&["datasets", "select"]).unwrap().as_str(),
            "http://localhost:8080/api/datasets/select"
        );
        assert_eq!(
            api.url(&["datasets", "hand written/v1"]).unwrap().as_str(),
            "http://localhost:8080/api/datasets/hand%20written%2Fv1"
        );

        let trainer = client("http://localhost:5897");
        assert_eq!(
            trainer.url(&["api", "training-logs"]).unwrap().as_str(),
            "http://localhost:5897/api/training-logs"
        );
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(matches!(
            ServiceClient::new(reqwest::Client::new(), "mailto:admin"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(ServiceClient::new(reqwest::Client::new(), "not a url").is_err());
    }

    #[test]
    fn test_envelope() {
        let ok: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":200,"message":"登录成功","data":{"user":{"id":1}}}"#)
                .unwrap();
        assert_eq!(ok.into_result().unwrap().unwrap()["user"]["id"], 1);

        let empty: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":200,"message":"退出成功","data":null}"#).unwrap();
        assert!(empty.into_result().unwrap().is_none());

        let rejected: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":400,"msg":"验证码错误或已过期"}"#).unwrap();
        match rejected.into_result() {
            Err(ApiError::Rejected { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "验证码错误或已过期");
            }
            other => panic!("unexpected {:?}", other),
        }

        let unauthorized: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":401,"message":"未登录或会话已过期"}"#).unwrap();
        assert!(matches!(unauthorized.into_result(), Err(ApiError::AuthRequired)));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"error":"modelName is required"}"#), "modelName is required");
        assert_eq!(error_message(r#"{"code":500,"message":"boom"}"#), "boom");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_services_from_default_config() {
        let services = ConsoleServices::new(&ServicesConfig::default()).unwrap();
        assert_eq!(services.models.client().base_url().port(), Some(8082));
        assert_eq!(services.logs.client().base_url().port(), Some(8081));
    }
}
