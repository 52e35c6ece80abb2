//! Agent, workflow, knowledge-base and provider-key records held by the
//! studio API.

use studio_core::{
    Agent, AgentForm, AgentWithOwner, ApiKeysConfig, ApiKeysForm, KnowledgeBase, WorkflowApp,
    WorkflowForm,
};

use crate::errors::StoreError;

mod http;

pub use http::HttpStudioApi;

/// CRUD over agent records.
#[async_trait::async_trait]
pub trait AgentStore: Send + Sync {
    /// Agents visible to the caller, with their owners.
    async fn list_agents(&self) -> Result<Vec<AgentWithOwner>, StoreError>;

    /// Agents the caller may edit.
    async fn list_workspace_agents(&self) -> Result<Vec<AgentWithOwner>, StoreError>;

    /// Base workflow apps exposed as agents.
    async fn list_base_agents(&self) -> Result<Vec<Agent>, StoreError>;

    /// `Ok(None)` when the record does not exist.
    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, StoreError>;

    async fn create_agent(&self, form: &AgentForm) -> Result<Agent, StoreError>;

    async fn update_agent(&self, id: i64, form: &AgentForm) -> Result<Agent, StoreError>;

    /// Flips the active flag and returns the updated record.
    async fn toggle_agent(&self, id: i64) -> Result<Agent, StoreError>;

    /// Whether the API reported a deletion.
    async fn delete_agent(&self, id: i64) -> Result<bool, StoreError>;

    /// Removes every agent. Admin only.
    async fn delete_all_agents(&self) -> Result<bool, StoreError>;
}

/// Read-only catalog of the resources an agent can bind to.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_workflows(&self) -> Result<Vec<WorkflowApp>, StoreError>;

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, StoreError>;
}

/// CRUD over workflow applications. Updates and deletes are admin only.
#[async_trait::async_trait]
pub trait WorkflowStore: CatalogSource {
    /// `Ok(None)` when the record does not exist or is not readable.
    async fn get_workflow(&self, id: i64) -> Result<Option<WorkflowApp>, StoreError>;

    async fn create_workflow(&self, form: &WorkflowForm) -> Result<WorkflowApp, StoreError>;

    async fn update_workflow(
        &self,
        id: i64,
        form: &WorkflowForm,
    ) -> Result<WorkflowApp, StoreError>;

    async fn delete_workflow(&self, id: i64) -> Result<bool, StoreError>;

    async fn delete_all_workflows(&self) -> Result<bool, StoreError>;
}

/// Upstream provider keys. Reads are masked; writes are admin only.
#[async_trait::async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn get_api_keys(&self) -> Result<ApiKeysConfig, StoreError>;

    async fn update_api_keys(&self, form: &ApiKeysForm) -> Result<ApiKeysConfig, StoreError>;
}
