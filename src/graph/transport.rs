//! Transport primitives shared by all resource clients
//!
//! A resource client only knows how to describe a request (entity path,
//! query parameters, accepted status codes). Sending it is the job of a
//! [`Transport`], normally [`GraphClient`](super::client::GraphClient).

use super::error::GraphError;
use async_trait::async_trait;
use reqwest::StatusCode;

/// Decides whether a response is a transient consistency failure worth retrying
pub type ConsistencyFailureFunc = fn(&GraphResponse) -> bool;

/// Retry reads and deletes that race replication of a preceding write
pub fn retry_on_404_consistency_failure(response: &GraphResponse) -> bool {
    response.status == StatusCode::NOT_FOUND
}

/// Relative location of a Graph resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    pub entity: String,
    pub params: Vec<(String, String)>,
    /// Prefix the entity with the tenant ID
    pub has_tenant_id: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GetHttpRequestInput {
    pub consistency_failure_func: Option<ConsistencyFailureFunc>,
    pub disable_paging: bool,
    pub headers: Vec<(String, String)>,
    pub valid_status_codes: Vec<StatusCode>,
    pub uri: Uri,
}

#[derive(Debug, Clone, Default)]
pub struct PostHttpRequestInput {
    pub body: Option<Vec<u8>>,
    pub consistency_failure_func: Option<ConsistencyFailureFunc>,
    pub headers: Vec<(String, String)>,
    pub valid_status_codes: Vec<StatusCode>,
    pub uri: Uri,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteHttpRequestInput {
    pub consistency_failure_func: Option<ConsistencyFailureFunc>,
    pub headers: Vec<(String, String)>,
    pub valid_status_codes: Vec<StatusCode>,
    pub uri: Uri,
}

/// A fully drained response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphResponse {
    pub status: StatusCode,
    pub body: String,
}

impl GraphResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body as JSON, keeping the status on failure
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, GraphError> {
        serde_json::from_str(&self.body).map_err(|source| GraphError::Deserialization {
            status: self.status,
            source,
        })
    }
}

/// Get/Post/Delete primitives a resource client delegates to
///
/// Implementations must reject any status not listed in
/// `valid_status_codes` with [`GraphError::UnexpectedStatus`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, input: GetHttpRequestInput) -> Result<GraphResponse, GraphError>;

    async fn post(&self, input: PostHttpRequestInput) -> Result<GraphResponse, GraphError>;

    async fn delete(&self, input: DeleteHttpRequestInput) -> Result<GraphResponse, GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_on_404_only() {
        assert!(retry_on_404_consistency_failure(&GraphResponse::new(
            StatusCode::NOT_FOUND,
            ""
        )));
        assert!(!retry_on_404_consistency_failure(&GraphResponse::new(
            StatusCode::OK,
            "{}"
        )));
        assert!(!retry_on_404_consistency_failure(&GraphResponse::new(
            StatusCode::FORBIDDEN,
            ""
        )));
    }

    #[test]
    fn test_json_keeps_status() {
        let response = GraphResponse::new(StatusCode::OK, "not json");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::OK));
    }
}
