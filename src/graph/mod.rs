//! Microsoft Graph API interaction module
//!
//! This module provides the core functionality for talking to the Graph
//! identity-governance API: authentication, the tenant-scoped base client,
//! and the typed assignment request client built on top of it.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer token providers and caching
//! - [`client`] - Tenant-scoped base client (status checks, retries, paging)
//! - [`http`] - HTTP utilities for REST API calls
//! - [`transport`] - Request inputs and the [`transport::Transport`] seam
//! - [`odata`] - OData query options
//! - [`models`] - Entitlement management types
//! - [`assignment_requests`] - Access package assignment request operations
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```ignore
//! use accessreq::graph::{AccessPackageAssignmentRequestClient, GraphClient, Query};
//!
//! async fn example(config: &accessreq::config::Config) -> anyhow::Result<()> {
//!     let client = AccessPackageAssignmentRequestClient::new(GraphClient::from_config(config)?);
//!     let (requests, _status) = client.list(&Query::new().top(10)).await?;
//!     Ok(())
//! }
//! ```

pub mod assignment_requests;
pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod models;
pub mod odata;
pub mod transport;

pub use assignment_requests::{AccessPackageAssignmentRequestClient, AssignmentRequestList};
pub use client::{ApiVersion, ConsistencyRetry, GraphClient};
pub use error::{GraphError, Stage};
pub use odata::Query;
