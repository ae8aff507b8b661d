//! Profile API client for uploading app user changes.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{ProfileSyncError, Result};
use crate::types::UserProps;

/// Transport used by the profile updater to write user changes.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Upload `props` for the given app user.
    async fn update_app_user(&self, app_id: &str, user_id: &str, props: &UserProps) -> Result<()>;
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ApiErrorResponse {
    fn into_message(self) -> Option<String> {
        match self.error {
            Some(ApiErrorDetail {
                code: Some(code),
                description: Some(description),
            }) => Some(format!("{}: {}", code, description)),
            Some(ApiErrorDetail {
                code,
                description,
            }) if code.is_some() || description.is_some() => code.or(description),
            _ => self.message,
        }
    }
}

/// Client for the app user profile REST API.
#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: Option<HeaderValue>,
}

impl HttpProfileClient {
    /// Create a new profile client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let auth_header = config
            .token
            .as_deref()
            .map(|token| {
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| ProfileSyncError::config("Invalid access token format"))
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProfileSyncError::config(format!("Failed to initialize HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    /// Create a client from `PROFILE_SYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&ClientConfig::from_env()?)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = &self.auth_header {
            headers.insert(AUTHORIZATION, auth.clone());
        }
        headers
    }

    fn app_user_url(&self, app_id: &str, user_id: &str) -> String {
        format!(
            "{}/apps/{}/appusers/{}",
            self.base_url,
            urlencoding::encode(app_id),
            urlencoding::encode(user_id)
        )
    }

    /// Check the response status, turning failures into API errors.
    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        debug!("API response ({}): {}", status, body);

        if status.is_success() {
            return Ok(());
        }

        if let Some(message) = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(ApiErrorResponse::into_message)
        {
            return Err(ProfileSyncError::api(status.as_u16(), message));
        }

        error!("Profile update failed ({}): {}", status, body);
        Err(ProfileSyncError::api(
            status.as_u16(),
            format!(
                "Request failed: {}",
                body.chars().take(200).collect::<String>()
            ),
        ))
    }
}

#[async_trait]
impl ProfileClient for HttpProfileClient {
    /// PUT /apps/{appId}/appusers/{userId}
    async fn update_app_user(&self, app_id: &str, user_id: &str, props: &UserProps) -> Result<()> {
        if app_id.is_empty() {
            return Err(ProfileSyncError::invalid_request("app id is required"));
        }
        if user_id.is_empty() {
            return Err(ProfileSyncError::invalid_request("user id is required"));
        }

        let url = self.app_user_url(app_id, user_id);
        debug!("[ProfileSync] PUT {} ({} fields)", url, props.len());

        let response = self
            .client
            .put(&url)
            .headers(self.headers())
            .json(props)
            .send()
            .await?;

        Self::check_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HttpProfileClient {
        HttpProfileClient::new(&ClientConfig::new(&server.base_url()).with_token("secret")).unwrap()
    }

    #[tokio::test]
    async fn test_update_app_user_puts_props() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/apps/app_1/appusers/u1")
                    .header("authorization", "Bearer secret")
                    .header("content-type", "application/json")
                    .json_body(json!({ "givenName": "Ada", "email": "ada@example.com" }));
                then.status(200).json_body(json!({ "appUser": {} }));
            })
            .await;

        let props = UserProps::new().given_name("Ada").email("ada@example.com");
        client(&server)
            .update_app_user("app_1", "u1", &props)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_message_is_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/apps/app_1/appusers/u1");
                then.status(400).json_body(json!({
                    "error": { "code": "bad_request", "description": "email is invalid" }
                }));
            })
            .await;

        let err = client(&server)
            .update_app_user("app_1", "u1", &UserProps::new().email("nope"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProfileSyncError::api(400, "bad_request: email is invalid")
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/apps/app_1/appusers/u1");
                then.status(503).body("upstream unavailable");
            })
            .await;

        let err = client(&server)
            .update_app_user("app_1", "u1", &UserProps::new().surname("Hopper"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProfileSyncError::api(503, "Request failed: upstream unavailable")
        );
    }

    #[tokio::test]
    async fn test_missing_ids_are_rejected() {
        let client =
            HttpProfileClient::new(&ClientConfig::new("http://localhost:1")).unwrap();
        let props = UserProps::new().surname("Hopper");

        assert!(matches!(
            client.update_app_user("", "u1", &props).await,
            Err(ProfileSyncError::InvalidRequest(_))
        ));
        assert!(matches!(
            client.update_app_user("app_1", "", &props).await,
            Err(ProfileSyncError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let config = ClientConfig::new("http://localhost").with_token("bad\ntoken");
        assert!(matches!(
            HttpProfileClient::new(&config),
            Err(ProfileSyncError::Config(_))
        ));
    }
}
