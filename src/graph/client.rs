//! Graph Client
//!
//! Tenant-scoped base client combining authentication and HTTP
//! functionality. Resource clients reach it through [`Transport`].

use super::auth::GraphCredentials;
use super::error::GraphError;
use super::http::{sanitize_for_log, GraphHttpClient};
use super::transport::{
    ConsistencyFailureFunc, DeleteHttpRequestInput, GetHttpRequestInput, GraphResponse,
    PostHttpRequestInput, Transport, Uri,
};
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default Graph endpoint
pub const DEFAULT_ENDPOINT: &str = "https://graph.microsoft.com";

const NEXT_LINK: &str = "@odata.nextLink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v1.0")]
    V1,
    #[serde(rename = "beta")]
    Beta,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => f.write_str("v1.0"),
            ApiVersion::Beta => f.write_str("beta"),
        }
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "v1.0" | "v1" => Ok(ApiVersion::V1),
            "beta" => Ok(ApiVersion::Beta),
            other => Err(format!("unknown API version: {}", other)),
        }
    }
}

/// Backoff applied while a consistency-failure hook asks for a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyRetry {
    /// Total attempts, including the first request
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ConsistencyRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Main Graph client
#[derive(Clone)]
pub struct GraphClient {
    pub credentials: GraphCredentials,
    pub http: GraphHttpClient,
    pub endpoint: Url,
    pub api_version: ApiVersion,
    pub tenant_id: String,
    pub retry: ConsistencyRetry,
}

impl GraphClient {
    /// Create a new Graph client
    pub fn new(
        credentials: GraphCredentials,
        endpoint: &str,
        api_version: ApiVersion,
        tenant_id: &str,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid Graph endpoint: {}", endpoint))?;
        let http = GraphHttpClient::new(None).context("Failed to create HTTP client")?;

        Ok(Self {
            credentials,
            http,
            endpoint,
            api_version,
            tenant_id: tenant_id.to_string(),
            retry: ConsistencyRetry::default(),
        })
    }

    /// Create a client from resolved configuration and environment credentials
    pub fn from_config(config: &Config) -> Result<Self> {
        let tenant_id = config.effective_tenant();
        let client_id = config.effective_client_id();

        let timeout = config.timeout_secs.map(Duration::from_secs);
        let http = GraphHttpClient::new(timeout).context("Failed to create HTTP client")?;

        // Token requests share the configured timeout
        let credentials = GraphCredentials::from_env(
            &config.effective_authority(),
            &tenant_id,
            client_id.as_deref(),
            http.client().clone(),
        )
        .context("Failed to initialize Graph credentials")?;

        let mut client = Self::new(
            credentials,
            &config.effective_endpoint(),
            config.api_version.unwrap_or_default(),
            &tenant_id,
        )?;
        client.http = http;
        client.retry = config.consistency_retry();

        Ok(client)
    }

    pub fn with_consistency_retry(mut self, retry: ConsistencyRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Build the absolute URL for a resource
    pub fn build_url(&self, uri: &Uri) -> Url {
        let mut path = format!(
            "{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            self.api_version
        );
        if uri.has_tenant_id && !self.tenant_id.is_empty() {
            path.push('/');
            path.push_str(&urlencoding::encode(&self.tenant_id));
        }
        path.push_str(&uri.entity);

        let mut url = self.endpoint.clone();
        url.set_path(&path);
        url.set_query(None);
        if !uri.params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(uri.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }

    /// Parse a next-page link, refusing hosts other than the configured endpoint
    fn next_page_url(&self, link: &str) -> Result<Url, GraphError> {
        let url = Url::parse(link).map_err(|e| GraphError::InvalidUri {
            entity: link.to_string(),
            reason: e.to_string(),
        })?;

        let same_origin = url.scheme() == self.endpoint.scheme()
            && url.host_str() == self.endpoint.host_str()
            && url.port_or_known_default() == self.endpoint.port_or_known_default();
        if !same_origin {
            tracing::error!("Refusing next page link to foreign host {:?}", url.host_str());
            return Err(GraphError::InvalidUri {
                entity: link.to_string(),
                reason: "next page link points outside the Graph endpoint".to_string(),
            });
        }

        Ok(url)
    }

    /// Send a request, resending while the consistency hook reports a transient failure
    async fn send_with_retry(
        &self,
        method: Method,
        url: Url,
        headers: &[(String, String)],
        body: Option<&[u8]>,
        consistency_failure_func: Option<ConsistencyFailureFunc>,
    ) -> Result<GraphResponse, GraphError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            let token = self.credentials.get_token().await?;
            let response = self
                .http
                .send(method.clone(), url.clone(), &token, headers, body)
                .await?;

            let retryable = consistency_failure_func.is_some_and(|f| f(&response));
            if !retryable || attempt >= self.retry.attempts {
                return Ok(response);
            }

            tracing::debug!(
                "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                method,
                url.path(),
                response.status,
                delay,
                attempt,
                self.retry.attempts
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.retry.max_delay);
            attempt += 1;
        }
    }

    /// Follow `@odata.nextLink` and merge every page's `value` into the first page
    async fn follow_pages(
        &self,
        first: GraphResponse,
        input: &GetHttpRequestInput,
    ) -> Result<GraphResponse, GraphError> {
        let Ok(mut merged) = serde_json::from_str::<Map<String, Value>>(&first.body) else {
            return Ok(first);
        };
        let mut next = take_next_link(&mut merged);
        if next.is_none() {
            return Ok(first);
        }
        let Some(Value::Array(mut values)) = merged.remove("value") else {
            return Ok(first);
        };

        let mut status = first.status;
        let mut visited = HashSet::from([self.build_url(&input.uri)]);
        while let Some(link) = next {
            let url = self.next_page_url(&link)?;
            if !visited.insert(url.clone()) {
                return Err(GraphError::InvalidUri {
                    entity: link,
                    reason: "next page link repeats an earlier page".to_string(),
                });
            }
            tracing::debug!("Following next page {}", url.path());

            let response = self
                .send_with_retry(Method::GET, url, &input.headers, None, None)
                .await?;
            let response = check_status(
                &Method::GET,
                &input.uri.entity,
                response,
                &input.valid_status_codes,
            )?;
            status = response.status;

            let mut page = response.json::<Map<String, Value>>()?;
            next = take_next_link(&mut page);
            if let Some(Value::Array(items)) = page.remove("value") {
                values.extend(items);
            }
        }

        merged.insert("value".to_string(), Value::Array(values));
        let body = serde_json::to_string(&merged).map_err(GraphError::Serialization)?;

        Ok(GraphResponse { status, body })
    }
}

fn take_next_link(page: &mut Map<String, Value>) -> Option<String> {
    match page.remove(NEXT_LINK) {
        Some(Value::String(link)) if !link.is_empty() => Some(link),
        _ => None,
    }
}

/// Reject statuses outside the accepted set; an empty set accepts any success
fn check_status(
    method: &Method,
    entity: &str,
    response: GraphResponse,
    valid_status_codes: &[StatusCode],
) -> Result<GraphResponse, GraphError> {
    let accepted = if valid_status_codes.is_empty() {
        response.status.is_success()
    } else {
        valid_status_codes.contains(&response.status)
    };

    if accepted {
        return Ok(response);
    }

    // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
    tracing::error!(
        "API error: {} {} - {} - {}",
        method,
        entity,
        response.status,
        sanitize_for_log(&response.body)
    );

    Err(GraphError::UnexpectedStatus {
        method: method.clone(),
        entity: entity.to_string(),
        status: response.status,
        body: response.body,
    })
}

#[async_trait]
impl Transport for GraphClient {
    async fn get(&self, input: GetHttpRequestInput) -> Result<GraphResponse, GraphError> {
        let url = self.build_url(&input.uri);
        let response = self
            .send_with_retry(
                Method::GET,
                url,
                &input.headers,
                None,
                input.consistency_failure_func,
            )
            .await?;
        let response = check_status(
            &Method::GET,
            &input.uri.entity,
            response,
            &input.valid_status_codes,
        )?;

        if input.disable_paging {
            return Ok(response);
        }
        self.follow_pages(response, &input).await
    }

    async fn post(&self, input: PostHttpRequestInput) -> Result<GraphResponse, GraphError> {
        let url = self.build_url(&input.uri);
        let response = self
            .send_with_retry(
                Method::POST,
                url,
                &input.headers,
                input.body.as_deref(),
                input.consistency_failure_func,
            )
            .await?;

        check_status(
            &Method::POST,
            &input.uri.entity,
            response,
            &input.valid_status_codes,
        )
    }

    async fn delete(&self, input: DeleteHttpRequestInput) -> Result<GraphResponse, GraphError> {
        let url = self.build_url(&input.uri);
        let response = self
            .send_with_retry(
                Method::DELETE,
                url,
                &input.headers,
                None,
                input.consistency_failure_func,
            )
            .await?;

        check_status(
            &Method::DELETE,
            &input.uri.entity,
            response,
            &input.valid_status_codes,
        )
    }
}
