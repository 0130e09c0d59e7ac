//! Access package assignment requests
//!
//! Typed operations for the
//! `/identityGovernance/entitlementManagement/assignmentRequests` collection.
//! The client keeps no resource state between calls.

use super::client::GraphClient;
use super::error::GraphError;
use super::models::AccessPackageAssignmentRequest;
use super::odata::Query;
use super::transport::{
    retry_on_404_consistency_failure, DeleteHttpRequestInput, GetHttpRequestInput,
    PostHttpRequestInput, Transport, Uri,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Collection path, relative to the tenant
pub const ASSIGNMENT_REQUESTS_ENTITY: &str =
    "/identityGovernance/entitlementManagement/assignmentRequests";

/// Collection envelope returned by List
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRequestList {
    /// Total matching requests, present when `$count=true` was sent
    #[serde(
        default,
        rename = "@odata.count",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    #[serde(default)]
    pub value: Vec<AccessPackageAssignmentRequest>,
}

/// Client for access package assignment requests
#[derive(Clone)]
pub struct AccessPackageAssignmentRequestClient<T = GraphClient> {
    base: T,
    cancel: CancellationToken,
}

impl<T: Transport> AccessPackageAssignmentRequestClient<T> {
    pub fn new(base: T) -> Self {
        Self {
            base,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future calls once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn base(&self) -> &T {
        &self.base
    }

    fn entity(id: Option<&str>, action: Option<&str>) -> Uri {
        let mut entity = ASSIGNMENT_REQUESTS_ENTITY.to_string();
        if let Some(id) = id {
            entity.push('/');
            entity.push_str(&urlencoding::encode(id));
        }
        if let Some(action) = action {
            entity.push('/');
            entity.push_str(action);
        }

        Uri {
            entity,
            params: Vec::new(),
            has_tenant_id: true,
        }
    }

    async fn run<F, R>(&self, call: F) -> Result<R, GraphError>
    where
        F: Future<Output = Result<R, GraphError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GraphError::Cancelled),
            result = call => result,
        }
    }

    /// List assignment requests
    ///
    /// Every page is fetched unless `query.top` limits the result.
    pub async fn list(
        &self,
        query: &Query,
    ) -> Result<(Vec<AccessPackageAssignmentRequest>, StatusCode), GraphError> {
        let (list, status) = self.list_with_count(query).await?;
        Ok((list.value, status))
    }

    /// List assignment requests, keeping the service-side `@odata.count`
    pub async fn list_with_count(
        &self,
        query: &Query,
    ) -> Result<(AssignmentRequestList, StatusCode), GraphError> {
        let mut uri = Self::entity(None, None);
        uri.params = query.values();

        let input = GetHttpRequestInput {
            disable_paging: query.top > 0,
            headers: query.headers(),
            valid_status_codes: vec![StatusCode::OK],
            uri,
            ..Default::default()
        };

        let response = self.run(self.base.get(input)).await?;
        let data: AssignmentRequestList = response.json()?;

        tracing::debug!(
            "Listed {} assignment requests (count: {:?})",
            data.value.len(),
            data.count
        );
        Ok((data, response.status))
    }

    /// Get an assignment request by ID
    pub async fn get(
        &self,
        id: &str,
    ) -> Result<(AccessPackageAssignmentRequest, StatusCode), GraphError> {
        let input = GetHttpRequestInput {
            consistency_failure_func: Some(retry_on_404_consistency_failure),
            valid_status_codes: vec![StatusCode::OK],
            uri: Self::entity(Some(id), None),
            ..Default::default()
        };

        let response = self.run(self.base.get(input)).await?;
        let request = response.json()?;

        Ok((request, response.status))
    }

    /// Create an assignment request
    pub async fn create(
        &self,
        request: &AccessPackageAssignmentRequest,
    ) -> Result<(AccessPackageAssignmentRequest, StatusCode), GraphError> {
        let body = serde_json::to_vec(request).map_err(GraphError::Serialization)?;

        let input = PostHttpRequestInput {
            body: Some(body),
            valid_status_codes: vec![StatusCode::OK],
            uri: Self::entity(None, None),
            ..Default::default()
        };

        let response = self.run(self.base.post(input)).await?;
        let created: AccessPackageAssignmentRequest = response.json()?;

        tracing::info!(
            "Created assignment request {}",
            created.id.as_deref().unwrap_or("-")
        );
        Ok((created, response.status))
    }

    /// Delete an assignment request
    pub async fn delete(&self, id: &str) -> Result<StatusCode, GraphError> {
        let input = DeleteHttpRequestInput {
            consistency_failure_func: Some(retry_on_404_consistency_failure),
            valid_status_codes: vec![StatusCode::NO_CONTENT],
            uri: Self::entity(Some(id), None),
            ..Default::default()
        };

        let response = self.run(self.base.delete(input)).await?;
        Ok(response.status)
    }

    /// Cancel a request that is still in a cancellable state
    pub async fn cancel(&self, id: &str) -> Result<StatusCode, GraphError> {
        let input = PostHttpRequestInput {
            valid_status_codes: vec![StatusCode::OK],
            uri: Self::entity(Some(id), Some("cancel")),
            ..Default::default()
        };

        let response = self.run(self.base.post(input)).await?;
        Ok(response.status)
    }

    /// Re-process a failed or partially delivered request
    pub async fn reprocess(&self, id: &str) -> Result<StatusCode, GraphError> {
        let input = PostHttpRequestInput {
            valid_status_codes: vec![StatusCode::ACCEPTED],
            uri: Self::entity(Some(id), Some("reprocess")),
            ..Default::default()
        };

        let response = self.run(self.base.post(input)).await?;
        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{AccessPackageRequestState, AccessPackageRequestType};
    use crate::graph::transport::GraphResponse;
    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        uri: Uri,
        disable_paging: bool,
        retries_on_404: bool,
        valid_status_codes: Vec<StatusCode>,
        body: Option<Vec<u8>>,
    }

    /// In-memory stand-in for the Graph collection
    #[derive(Default)]
    struct FakeGraph {
        store: Mutex<HashMap<String, serde_json::Value>>,
        calls: Mutex<Vec<Recorded>>,
        next_id: Mutex<u32>,
        raw_reply: Mutex<Option<GraphResponse>>,
    }

    impl FakeGraph {
        fn record(&self, recorded: Recorded) {
            self.calls.lock().unwrap().push(recorded);
        }

        fn last_call(&self) -> Recorded {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }

        fn reply_with(&self, response: GraphResponse) {
            *self.raw_reply.lock().unwrap() = Some(response);
        }

        fn id_of(entity: &str) -> Option<String> {
            entity
                .strip_prefix(ASSIGNMENT_REQUESTS_ENTITY)
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| rest.split('/').next().unwrap_or_default().to_string())
        }

        fn accept(
            response: GraphResponse,
            method: Method,
            uri: &Uri,
            valid: &[StatusCode],
        ) -> Result<GraphResponse, GraphError> {
            if valid.contains(&response.status) {
                Ok(response)
            } else {
                Err(GraphError::UnexpectedStatus {
                    method,
                    entity: uri.entity.clone(),
                    status: response.status,
                    body: response.body,
                })
            }
        }
    }

    #[async_trait]
    impl Transport for FakeGraph {
        async fn get(&self, input: GetHttpRequestInput) -> Result<GraphResponse, GraphError> {
            self.record(Recorded {
                method: Method::GET,
                uri: input.uri.clone(),
                disable_paging: input.disable_paging,
                retries_on_404: input.consistency_failure_func.is_some(),
                valid_status_codes: input.valid_status_codes.clone(),
                body: None,
            });
            if let Some(reply) = self.raw_reply.lock().unwrap().take() {
                return Self::accept(reply, Method::GET, &input.uri, &input.valid_status_codes);
            }

            let store = self.store.lock().unwrap();
            let response = match Self::id_of(&input.uri.entity) {
                Some(id) => match store.get(&id) {
                    Some(record) => GraphResponse::new(StatusCode::OK, record.to_string()),
                    None => GraphResponse::new(
                        StatusCode::NOT_FOUND,
                        r#"{"error":{"code":"NotFound"}}"#,
                    ),
                },
                None => {
                    let mut values: Vec<_> = store.values().cloned().collect();
                    values.sort_by_key(|v| v["id"].as_str().unwrap_or_default().to_string());
                    GraphResponse::new(StatusCode::OK, json!({ "value": values }).to_string())
                }
            };
            Self::accept(response, Method::GET, &input.uri, &input.valid_status_codes)
        }

        async fn post(&self, input: PostHttpRequestInput) -> Result<GraphResponse, GraphError> {
            self.record(Recorded {
                method: Method::POST,
                uri: input.uri.clone(),
                disable_paging: false,
                retries_on_404: input.consistency_failure_func.is_some(),
                valid_status_codes: input.valid_status_codes.clone(),
                body: input.body.clone(),
            });
            if let Some(reply) = self.raw_reply.lock().unwrap().take() {
                return Self::accept(reply, Method::POST, &input.uri, &input.valid_status_codes);
            }

            let response = if input.uri.entity.ends_with("/cancel") {
                GraphResponse::new(StatusCode::OK, "")
            } else if input.uri.entity.ends_with("/reprocess") {
                GraphResponse::new(StatusCode::ACCEPTED, "")
            } else {
                let mut record: serde_json::Value =
                    serde_json::from_slice(input.body.as_deref().unwrap_or_default()).unwrap();
                let mut next_id = self.next_id.lock().unwrap();
                *next_id += 1;
                let id = format!("request-{}", next_id);
                record["id"] = json!(id);
                record["state"] = json!("submitted");
                self.store.lock().unwrap().insert(id, record.clone());
                GraphResponse::new(StatusCode::OK, record.to_string())
            };
            Self::accept(response, Method::POST, &input.uri, &input.valid_status_codes)
        }

        async fn delete(&self, input: DeleteHttpRequestInput) -> Result<GraphResponse, GraphError> {
            self.record(Recorded {
                method: Method::DELETE,
                uri: input.uri.clone(),
                disable_paging: false,
                retries_on_404: input.consistency_failure_func.is_some(),
                valid_status_codes: input.valid_status_codes.clone(),
                body: None,
            });

            let id = Self::id_of(&input.uri.entity).unwrap_or_default();
            let response = match self.store.lock().unwrap().remove(&id) {
                Some(_) => GraphResponse::new(StatusCode::NO_CONTENT, ""),
                None => GraphResponse::new(StatusCode::NOT_FOUND, ""),
            };
            Self::accept(response, Method::DELETE, &input.uri, &input.valid_status_codes)
        }
    }

    fn client() -> AccessPackageAssignmentRequestClient<FakeGraph> {
        AccessPackageAssignmentRequestClient::new(FakeGraph::default())
    }

    fn new_request() -> AccessPackageAssignmentRequest {
        let mut request = AccessPackageAssignmentRequest::admin_add("pkg-1", "policy-1", "user-1");
        request.justification = Some("quarterly access review".to_string());
        request
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let client = client();
        let input = new_request();

        let (created, status) = client.create(&input).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let id = created.id.clone().unwrap();

        let call = client.base().last_call();
        assert_eq!(call.uri.entity, ASSIGNMENT_REQUESTS_ENTITY);
        assert!(call.uri.has_tenant_id);
        let sent: AccessPackageAssignmentRequest =
            serde_json::from_slice(&call.body.unwrap()).unwrap();
        assert_eq!(sent, input);

        let (fetched, status) = client.get(&id).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched.request_type, Some(AccessPackageRequestType::AdminAdd));
        assert_eq!(fetched.justification, input.justification);
        assert_eq!(fetched.assignment, input.assignment);
        assert_eq!(fetched.state, Some(AccessPackageRequestState::Submitted));
    }

    #[tokio::test]
    async fn test_get_delete_get_is_not_found() {
        let client = client();
        let (created, _) = client.create(&new_request()).await.unwrap();
        let id = created.id.unwrap();

        client.get(&id).await.unwrap();
        let status = client.delete(&id).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let call = client.base().last_call();
        assert_eq!(call.method, Method::DELETE);
        assert!(call.retries_on_404);
        assert_eq!(call.valid_status_codes, vec![StatusCode::NO_CONTENT]);

        let err = client.get(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(client.base().last_call().retries_on_404);
    }

    #[tokio::test]
    async fn test_list_disables_paging_only_with_top() {
        let client = client();
        client.create(&new_request()).await.unwrap();
        client.create(&new_request()).await.unwrap();

        let (requests, status) = client.list(&Query::new()).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(requests.len(), 2);
        assert!(!client.base().last_call().disable_paging);

        client.list(&Query::new().top(1)).await.unwrap();
        let call = client.base().last_call();
        assert!(call.disable_paging);
        assert!(call.uri.params.contains(&("$top".to_string(), "1".to_string())));
    }

    #[tokio::test]
    async fn test_list_keeps_odata_count() {
        let client = client();
        client.base().reply_with(GraphResponse::new(
            StatusCode::OK,
            json!({ "@odata.count": 42, "value": [{ "id": "request-1" }] }).to_string(),
        ));

        let (list, status) = client.list_with_count(&Query::new().count(true)).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.count, Some(42));
        assert_eq!(list.value.len(), 1);

        let rendered = serde_json::to_value(&list).unwrap();
        assert_eq!(rendered["@odata.count"], json!(42));

        // Without $count the envelope carries no total
        let (list, _) = client.list_with_count(&Query::new()).await.unwrap();
        assert_eq!(list.count, None);
        assert!(serde_json::to_value(&list).unwrap().get("@odata.count").is_none());
    }

    #[tokio::test]
    async fn test_cancel_and_reprocess_statuses() {
        let client = client();

        assert_eq!(client.cancel("request-9").await.unwrap(), StatusCode::OK);
        let call = client.base().last_call();
        assert_eq!(call.uri.entity, format!("{}/request-9/cancel", ASSIGNMENT_REQUESTS_ENTITY));
        assert!(call.body.is_none());

        assert_eq!(client.reprocess("request-9").await.unwrap(), StatusCode::ACCEPTED);
        let call = client.base().last_call();
        assert_eq!(call.uri.entity, format!("{}/request-9/reprocess", ASSIGNMENT_REQUESTS_ENTITY));
        assert_eq!(call.valid_status_codes, vec![StatusCode::ACCEPTED]);
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_status() {
        let client = client();
        client.base().reply_with(GraphResponse::new(StatusCode::OK, "{\"id\": "));

        let err = client.get("request-1").await.unwrap_err();
        assert_eq!(err.stage(), crate::graph::error::Stage::Deserialization);
        assert_eq!(err.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_surfaced_by_transport() {
        let client = client();
        client.base().reply_with(GraphResponse::new(StatusCode::OK, ""));

        let err = client.reprocess("request-1").await.unwrap_err();
        assert_eq!(err.stage(), crate::graph::error::Stage::Status);
        assert_eq!(err.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_identifier_is_escaped() {
        let client = client();
        let _ = client.get("a/b c").await;
        assert_eq!(
            client.base().last_call().uri.entity,
            format!("{}/a%2Fb%20c", ASSIGNMENT_REQUESTS_ENTITY)
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_call() {
        let token = CancellationToken::new();
        let client = client().with_cancellation(token.clone());
        token.cancel();

        let err = client.list(&Query::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }
}
