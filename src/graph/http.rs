//! HTTP utilities for Graph REST API calls

use super::error::GraphError;
use super::transport::GraphResponse;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header Graph echoes back so a request can be traced server-side
const CLIENT_REQUEST_ID: &str = "client-request-id";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Graph API calls
///
/// Sends exactly one request per call and always drains the response body,
/// so the connection is released whatever the outcome.
#[derive(Clone)]
pub struct GraphHttpClient {
    client: Client,
}

impl GraphHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder =
            Client::builder().user_agent(concat!("accessreq/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Underlying reqwest client, for collaborators that should share its settings
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request and read the whole body
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        token: &str,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Result<GraphResponse, GraphError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!("{} {} [{}]", method, url, request_id);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(CLIENT_REQUEST_ID, request_id.as_str());

        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match body {
            Some(body) => {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_vec());
            }
            // Graph rejects bodiless POSTs without a Content-Length
            None if method == Method::POST => {
                request = request.body(Vec::new());
            }
            None => {}
        }

        let response = request
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                method: method.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| GraphError::BodyRead { status, source })?;

        Ok(GraphResponse { status, body })
    }
}

/// Format a Graph API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_graph_error(error: &GraphError) -> String {
    match error {
        GraphError::Auth(_) => {
            return concat!(
                "Authentication failed. ",
                "Check AZURE_CLIENT_ID/AZURE_CLIENT_SECRET or GRAPH_ACCESS_TOKEN."
            )
            .to_string();
        }
        GraphError::Cancelled => return "Request cancelled.".to_string(),
        GraphError::Transport { .. } => {
            return "Request failed. Check your network connection and try again.".to_string();
        }
        GraphError::Deserialization { .. } => {
            return "Unexpected response from Microsoft Graph.".to_string();
        }
        _ => {}
    }

    match error.status() {
        Some(StatusCode::FORBIDDEN) => {
            "Permission denied. Check the application's Graph API permissions.".to_string()
        }
        Some(StatusCode::UNAUTHORIZED) => {
            "Authentication failed. The access token was rejected.".to_string()
        }
        Some(StatusCode::NOT_FOUND) => "Resource not found.".to_string(),
        Some(StatusCode::TOO_MANY_REQUESTS) => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        Some(StatusCode::BAD_REQUEST) => "Invalid request. Check your parameters.".to_string(),
        Some(StatusCode::CONFLICT) => {
            "Request conflict. The request may not be in a cancellable state.".to_string()
        }
        Some(status) if status.is_server_error() => {
            "Microsoft Graph temporarily unavailable. Please try again.".to_string()
        }
        _ => {
            let error_str = error.to_string();
            let sanitized = error_str
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect::<String>();

            if sanitized.len() < error_str.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}
