//! Entitlement management models
//!
//! Every field is optional: the same types describe create payloads and
//! server responses, and absent fields are left out of the JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change an assignment request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPackageRequestType {
    AdminAdd,
    AdminUpdate,
    AdminRemove,
    UserAdd,
    UserUpdate,
    UserRemove,
    SystemAdd,
    SystemUpdate,
    SystemRemove,
    OnBehalfAdd,
    #[serde(other)]
    UnknownFutureValue,
}

impl std::str::FromStr for AccessPackageRequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .ok()
            .filter(|t| *t != AccessPackageRequestType::UnknownFutureValue)
            .ok_or_else(|| format!("unknown request type: {}", s))
    }
}

/// Server-side processing state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPackageRequestState {
    Submitted,
    PendingApproval,
    Delivering,
    Delivered,
    DeliveryFailed,
    Denied,
    Scheduled,
    Canceled,
    PartiallyDelivered,
    #[serde(other)]
    UnknownFutureValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
    /// ISO 8601 duration, e.g. `P30D`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub expiration_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementManagementSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<ExpirationPattern>,
}

/// The assignment a request creates, updates or removes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPackageAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Object ID of the principal receiving the assignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_package_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPackageRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPackageSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
}

/// A request to assign a principal to an access package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPackageAssignmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<AccessPackageRequestType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AccessPackageRequestState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<EntitlementManagementSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AccessPackageAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_package: Option<AccessPackageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requestor: Option<AccessPackageSubject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<Value>>,
}

impl AccessPackageAssignmentRequest {
    /// An admin request granting `target_id` the access package via `policy_id`
    pub fn admin_add(access_package_id: &str, policy_id: &str, target_id: &str) -> Self {
        Self {
            request_type: Some(AccessPackageRequestType::AdminAdd),
            assignment: Some(AccessPackageAssignment {
                target_id: Some(target_id.to_string()),
                assignment_policy_id: Some(policy_id.to_string()),
                access_package_id: Some(access_package_id.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
