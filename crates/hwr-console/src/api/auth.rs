//! Authentication service client
//!
//! Captcha-gated login. The service keeps the session in a cookie, so the
//! shared client's cookie store must be kept between calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, ApiResult, Envelope, ServiceClient};

const DATA_URL_PREFIX: &str = "base64,";

/// Captcha challenge issued before login
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Captcha {
    pub verify_code_id: String,
    /// PNG image as a `data:` URL
    pub verify_code_img_base64: String,
    #[serde(default)]
    pub expire_time: Option<String>,
}

impl Captcha {
    /// Base64 body of the image, without any `data:image/png;base64,` prefix
    pub fn image_base64(&self) -> &str {
        match self.verify_code_img_base64.find(DATA_URL_PREFIX) {
            Some(index) => &self.verify_code_img_base64[index + DATA_URL_PREFIX.len()..],
            None => &self.verify_code_img_base64,
        }
    }
}

/// Client environment reported with a login
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub os: String,
    pub browser: String,
    pub login_ip: String,
}

impl ClientInfo {
    /// Describe the running process
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: format!("hwr/{}", env!("CARGO_PKG_VERSION")),
            login_ip: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub userid: i64,
    pub password: String,
    pub verify_code: String,
    pub verify_code_id: String,
    pub client_info: ClientInfo,
}

impl LoginRequest {
    pub fn new(
        userid: i64,
        password: impl Into<String>,
        verify_code: impl Into<String>,
        verify_code_id: impl Into<String>,
    ) -> Self {
        Self {
            userid,
            password: password.into(),
            verify_code: verify_code.into(),
            verify_code_id: verify_code_id.into(),
            client_info: ClientInfo::current(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub last_login_time: Option<String>,
    #[serde(default)]
    pub last_login_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    id: i64,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    client: ServiceClient,
}

impl AuthService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn captcha(&self) -> ApiResult<Captcha> {
        let envelope: Envelope<Captcha> = self.client.get(&["auth", "getVerifyCodeImg"]).await?;
        envelope
            .into_result()?
            .ok_or_else(|| missing("captcha"))
    }

    /// Log in; returns the id of the authenticated user
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<i64> {
        let envelope: Envelope<LoginData> = self.client.post(&["auth", "login"], request).await?;
        let data = envelope.into_result()?.ok_or_else(|| missing("user"))?;
        Ok(data.user.id)
    }

    pub async fn current_user(&self) -> ApiResult<CurrentUser> {
        let envelope: Envelope<CurrentUser> = self.client.get(&["auth", "currentUser"]).await?;
        envelope.into_result()?.ok_or(ApiError::AuthRequired)
    }

    pub async fn logout(&self) -> ApiResult<()> {
        let envelope: Envelope<Value> = self.client.post_empty(&["auth", "logout"]).await?;
        envelope.into_result()?;
        Ok(())
    }
}

fn missing(what: &str) -> ApiError {
    ApiError::Rejected {
        code: super::SUCCESS_CODE,
        message: format!("response carried no {}", what),
    }
}
