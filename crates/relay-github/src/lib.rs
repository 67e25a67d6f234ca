//! GitHub-facing building blocks for the session relay.
//!
//! This crate provides the REST client and wire models, transport retry
//! helpers, the event-to-subject resolver, and comment rendering helpers
//! consumed by the artifact, delta, and runtime crates.

pub mod github_api_client;
pub mod github_transport_helpers;
pub mod issue_comment;
pub mod models;
pub mod subject;

pub use github_api_client::{GithubApiClient, GithubClientConfig, ReactionTarget, RepoRef};
pub use subject::{resolve_subject, EventKind, ResolutionError, Subject, SubjectType};
