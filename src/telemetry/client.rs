//! Telemetry Client (C7): a minimal HTTP client bound to one node's agent.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::error::PiclError;
use crate::node::AgentAuthData;

use super::{HostInfo, TelemetrySample};

/// Default poll timeout: agent polling happens every second, so a slow node should not
/// stall the whole batch.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Timeout for control-plane requests (login, host info), which are infrequent and can
/// afford to wait longer.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Classifies an HTTP response by status code, per §4.7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    NotFound,
    Unauthorized,
    Forbidden,
    InternalServerError,
    OtherStatus(u16),
}

impl ApiStatus {
    fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            s if s < 400 => ApiStatus::Ok,
            404 => ApiStatus::NotFound,
            401 => ApiStatus::Unauthorized,
            403 => ApiStatus::Forbidden,
            500 => ApiStatus::InternalServerError,
            other => ApiStatus::OtherStatus(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ApiStatus::Ok)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "authType")]
    auth_type: &'a str,
    data: &'a serde_json::Value,
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    token: String,
}

/// Bound to one node's agent base URL; holds an optional bearer token after `login`.
pub struct TelemetryClient {
    base_url: String,
    http: Client,
    token: Option<String>,
}

impl TelemetryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
            token: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{path}", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Logs in using the node's configured agent credentials, storing the returned
    /// bearer token for subsequent requests.
    pub async fn login(&mut self, auth: &AgentAuthData) -> Result<(), PiclError> {
        let response = self
            .http
            .post(self.url("/login"))
            .timeout(CONTROL_TIMEOUT)
            .json(&LoginRequest {
                auth_type: &auth.auth_type,
                data: &auth.data,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PiclError::AuthError(self.base_url.clone()));
        }
        let login: LoginResponse = response.json().await?;
        self.token = Some(login.token);
        Ok(())
    }

    /// `GET /api/v0/cur`: the current telemetry sample.
    pub async fn cur(&self) -> Result<TelemetrySample, PiclError> {
        let builder = self.http.get(self.url("/cur")).timeout(POLL_TIMEOUT);
        let response = self.authorize(builder).send().await?;
        let status = ApiStatus::classify(response.status());
        if !status.is_ok() {
            return Err(PiclError::NetworkError(
                self.base_url.clone(),
                format!("{status:?}"),
            ));
        }
        Ok(response.json().await?)
    }

    /// `GET /api/v0/host`: host identification and uptime.
    pub async fn host_info(&self) -> Result<HostInfo, PiclError> {
        let builder = self.http.get(self.url("/host")).timeout(CONTROL_TIMEOUT);
        let response = self.authorize(builder).send().await?;
        let status = ApiStatus::classify(response.status());
        if !status.is_ok() {
            return Err(PiclError::NetworkError(
                self.base_url.clone(),
                format!("{status:?}"),
            ));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_status_codes() {
        assert_eq!(ApiStatus::classify(StatusCode::OK), ApiStatus::Ok);
        assert_eq!(ApiStatus::classify(StatusCode::NOT_FOUND), ApiStatus::NotFound);
        assert_eq!(ApiStatus::classify(StatusCode::UNAUTHORIZED), ApiStatus::Unauthorized);
        assert_eq!(ApiStatus::classify(StatusCode::FORBIDDEN), ApiStatus::Forbidden);
        assert_eq!(
            ApiStatus::classify(StatusCode::INTERNAL_SERVER_ERROR),
            ApiStatus::InternalServerError
        );
    }

    #[test]
    fn classifies_other_4xx_as_other_status() {
        assert_eq!(
            ApiStatus::classify(StatusCode::BAD_REQUEST),
            ApiStatus::OtherStatus(400)
        );
    }

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = TelemetryClient::new("http://10.0.0.2:8000/");
        assert_eq!(client.url("/cur"), "http://10.0.0.2:8000/api/v0/cur");
    }
}
