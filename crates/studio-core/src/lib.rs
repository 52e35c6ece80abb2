//! Domain model and process-level plumbing for the agent studio.
//!
//! Holds the records exchanged with the studio API (agents, workflow
//! applications, knowledge bases, provider keys), the access-control policy
//! evaluated on them, list helpers, retry policy, environment configuration,
//! and logging bootstrap.

pub mod access;
pub mod agent;
pub mod api_keys;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod listing;
pub mod observability;
pub mod retry;
pub mod workflow;

pub use access::{AccessControl, AccessRule, Permission, Principal, Role};
pub use agent::{
    Agent, AgentForm, AgentOwner, AgentParams, AgentWithOwner, KnowledgeBaseSettings,
    QueryExtension, SearchMode, Tag,
};
pub use api_keys::{ApiKeysConfig, ApiKeysForm, mask_api_key};
pub use config::StudioConfig;
pub use error::CoreError;
pub use knowledge::KnowledgeBase;
pub use listing::AgentFilter;
pub use observability::{LogSettings, init_observability};
pub use retry::RetryPolicy;
pub use workflow::{WorkflowApp, WorkflowForm};
