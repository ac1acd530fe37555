//! Shared HTTP plumbing for the REST host clients.

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use tokensync_common::{Error, Result, Secret};

/// User agent sent with every request.
const USER_AGENT: &str = "tokensync/0.1";

/// How the access token is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthScheme {
    /// `PRIVATE-TOKEN: <token>` (GitLab).
    PrivateToken,
    /// `Authorization: Bearer <token>` (GitHub).
    Bearer,
}

/// Authenticated JSON client bound to one API base URL.
pub(crate) struct RestClient {
    http: Client,
    base_url: String,
    secret: Secret,
    auth: AuthScheme,
    accept: Option<&'static str>,
}

impl RestClient {
    /// Create a client for `base_url` (no trailing slash).
    pub(crate) fn new(base_url: String, secret: Secret, auth: AuthScheme) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
            auth,
            accept: None,
        })
    }

    /// Send `accept` as the `Accept` header on every request.
    pub(crate) fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path starting with `/`.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start an authenticated request.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        builder = match self.auth {
            AuthScheme::PrivateToken => builder.header("PRIVATE-TOKEN", self.secret.expose()),
            AuthScheme::Bearer => builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.secret.expose()),
            ),
        };
        if let Some(accept) = self.accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder
    }

    /// Send a request and fail on any non-success status.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        debug!(status = %response.status(), url = %response.url(), "API response");
        check_status(response).await
    }

    /// GET `path` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        decode(response).await
    }

    /// GET `path` and return the body as text.
    pub(crate) async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))
    }

    /// POST a JSON body to `path` and decode the JSON reply.
    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }

    /// PATCH a JSON body to `path` and decode the JSON reply.
    pub(crate) async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::PATCH, path).json(body)).await?;
        decode(response).await
    }
}

/// Decode a success body as JSON.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::MalformedContent(format!("Failed to parse response: {}", e)))
}

/// Map a non-success status to the matching error.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let message = extract_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unexpected status")
            .to_string()
    });

    match status {
        StatusCode::UNAUTHORIZED => Error::Authentication(message),
        StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        _ => Error::RemoteApi {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human readable message out of an error body.
///
/// Both hosts answer `{"message": ...}`; GitLab sometimes uses `error`.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value.get("message").or_else(|| value.get("error"))?;
    Some(match message {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, r#"{"message":"401 Unauthorized"}"#),
            Error::Authentication(msg) if msg == "401 Unauthorized"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            Error::PermissionDenied(msg) if msg == "Forbidden"
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, r#"{"error":"404 Project Not Found"}"#),
            Error::NotFound(msg) if msg == "404 Project Not Found"
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":{"base":["bad"]}}"#),
            Error::RemoteApi { status: 422, .. }
        ));
    }

    #[test]
    fn test_url_building() {
        let client = RestClient::new(
            "https://gitlab.example.com/api/v4/".to_string(),
            Secret::new("t"),
            AuthScheme::PrivateToken,
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://gitlab.example.com/api/v4");
        assert_eq!(
            client.url("/user"),
            "https://gitlab.example.com/api/v4/user"
        );
    }
}
