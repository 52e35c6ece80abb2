use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Workflow application an agent can be based on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowApp {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub app_token: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: i64,
    pub created_at: i64,
}

impl WorkflowApp {
    /// Execution path, falling back to `params.api_path` for older records.
    ///
    /// `params` may arrive either as an object or as a JSON-encoded string.
    pub fn resolved_api_path(&self) -> Option<String> {
        if let Some(path) = self.api_path.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(path.trim().to_string());
        }
        let params = match &self.params {
            Some(serde_json::Value::String(raw)) => serde_json::from_str(raw).ok()?,
            Some(value) => value.clone(),
            None => return None,
        };
        params
            .get("api_path")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToOwned::to_owned)
    }

    pub fn has_app_token(&self) -> bool {
        self.app_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Form pre-filled from this record, for edit round trips.
    pub fn to_form(&self) -> WorkflowForm {
        WorkflowForm {
            id: Some(self.id),
            name: self.name.clone(),
            description: self.description.clone(),
            is_deleted: self.is_deleted,
            params: self.params.clone(),
            api_path: self.api_path.clone(),
            app_token: self.app_token.clone(),
        }
    }
}

/// Create/update payload for a workflow application.
///
/// `id` is optional on create; the API rejects ids that are already taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowForm {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub app_token: Option<String>,
}

impl WorkflowForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            is_deleted: false,
            params: None,
            api_path: None,
            app_token: None,
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = Some(api_path.into());
        self
    }

    pub fn app_token(mut self, app_token: impl Into<String>) -> Self {
        self.app_token = Some(app_token.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("workflow name must not be empty"));
        }
        if self.id.is_some_and(|id| id < 0) {
            return Err(CoreError::validation("workflow id must not be negative"));
        }
        Ok(())
    }
}
