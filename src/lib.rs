//! Client for Microsoft Graph access package assignment requests.

pub mod config;
pub mod graph;

/// Version injected at compile time via ACCESSREQ_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ACCESSREQ_VERSION") {
    Some(v) => v,
    None => "dev",
};
