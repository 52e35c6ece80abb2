use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{AccessControl, Permission, Principal, Role, can_access};
use crate::error::CoreError;

/// How the knowledge base is searched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    /// Vector similarity only.
    #[default]
    Embedding,
    /// Full-text recall only.
    FullTextRecall,
    /// Vector and full-text results merged.
    MixedRecall,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::FullTextRecall => "fullTextRecall",
            Self::MixedRecall => "mixedRecall",
        }
    }
}

/// Query rewriting before the knowledge-base search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryExtension {
    #[serde(rename = "datasetSearchUsingExtensionQuery", default)]
    pub enabled: bool,
    #[serde(
        rename = "datasetSearchExtensionModel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
    #[serde(
        rename = "datasetSearchExtensionBg",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub background: Option<String>,
}

pub const MIN_SEARCH_LIMIT: u32 = 100;
pub const MAX_SEARCH_LIMIT: u32 = 20_000;

/// Knowledge-base search parameters bound to an agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseSettings {
    #[serde(default)]
    pub dataset_ids: Vec<String>,
    #[serde(default)]
    pub search_mode: SearchMode,
    /// Minimum relevance score, `0.0..=1.0`.
    #[serde(default = "default_similarity")]
    pub similarity: f32,
    /// Maximum tokens of retrieved context.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(rename = "usingReRank", default)]
    pub using_rerank: bool,
    #[serde(flatten)]
    pub query_extension: QueryExtension,
}

fn default_similarity() -> f32 {
    0.4
}

fn default_limit() -> u32 {
    5_000
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            dataset_ids: Vec::new(),
            search_mode: SearchMode::default(),
            similarity: default_similarity(),
            limit: default_limit(),
            using_rerank: false,
            query_extension: QueryExtension::default(),
        }
    }
}

impl KnowledgeBaseSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.dataset_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(CoreError::validation(
                "knowledge base settings require at least one dataset",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity) {
            return Err(CoreError::validation(format!(
                "similarity must be between 0 and 1, got {}",
                self.similarity
            )));
        }
        if !(MIN_SEARCH_LIMIT..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(CoreError::validation(format!(
                "limit must be between {MIN_SEARCH_LIMIT} and {MAX_SEARCH_LIMIT}, got {}",
                self.limit
            )));
        }
        if self.query_extension.enabled
            && self
                .query_extension
                .model
                .as_deref()
                .is_none_or(|m| m.trim().is_empty())
        {
            return Err(CoreError::validation(
                "query extension requires an extension model",
            ));
        }
        Ok(())
    }
}

/// Display tag attached to an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Free-form agent parameters. Unknown keys are preserved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<KnowledgeBaseSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Agent record as returned by the studio API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    /// Workflow application the agent proxies to.
    #[serde(default)]
    pub base_app_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: AgentParams,
    #[serde(default)]
    pub access_control: Option<AccessControl>,
    #[serde(default)]
    pub is_deleted: bool,
    /// Epoch seconds.
    pub updated_at: i64,
    /// Epoch seconds.
    pub created_at: i64,
}

impl Agent {
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.updated_at, 0)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    /// Agents are "active" unless toggled off.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    pub fn can_read(&self, principal: &Principal) -> bool {
        can_access(
            principal,
            Permission::Read,
            self.user_id.as_deref(),
            self.access_control.as_ref(),
        )
    }

    pub fn can_write(&self, principal: &Principal) -> bool {
        can_access(
            principal,
            Permission::Write,
            self.user_id.as_deref(),
            self.access_control.as_ref(),
        )
    }

    /// Form pre-filled from this record, for edit round trips.
    pub fn to_form(&self) -> AgentForm {
        AgentForm {
            id: self.id,
            base_app_id: self.base_app_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            params: self.params.clone(),
            access_control: self.access_control.clone(),
            is_deleted: self.is_deleted,
        }
    }
}

/// Owner details attached to list responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOwner {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Agent list entry including its owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentWithOwner {
    #[serde(flatten)]
    pub agent: Agent,
    #[serde(default)]
    pub user: Option<AgentOwner>,
}

/// Create/update payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentForm {
    pub id: i64,
    #[serde(default)]
    pub base_app_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: AgentParams,
    #[serde(default)]
    pub access_control: Option<AccessControl>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl AgentForm {
    /// New private agent bound to a workflow application.
    pub fn new(id: i64, name: impl Into<String>, base_app_id: impl Into<String>) -> Self {
        Self {
            id,
            base_app_id: Some(base_app_id.into()),
            name: name.into(),
            description: String::new(),
            params: AgentParams::default(),
            access_control: Some(AccessControl::private()),
            is_deleted: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn knowledge_base(mut self, settings: KnowledgeBaseSettings) -> Self {
        self.params.knowledge_base = Some(settings);
        self
    }

    pub fn access_control(mut self, access_control: Option<AccessControl>) -> Self {
        self.access_control = access_control;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("agent name must not be empty"));
        }
        if self
            .base_app_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
        {
            return Err(CoreError::validation(
                "agent must be bound to a workflow application",
            ));
        }
        if let Some(settings) = &self.params.knowledge_base {
            settings.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> KnowledgeBaseSettings {
        KnowledgeBaseSettings {
            dataset_ids: vec!["ds-1".into()],
            ..KnowledgeBaseSettings::default()
        }
    }

    #[test]
    fn knowledge_base_settings_use_upstream_field_names() {
        let json = serde_json::to_value(KnowledgeBaseSettings {
            search_mode: SearchMode::MixedRecall,
            using_rerank: true,
            ..settings()
        })
        .expect("ser");
        assert_eq!(json["searchMode"], "mixedRecall");
        assert_eq!(json["usingReRank"], true);
        assert_eq!(json["datasetSearchUsingExtensionQuery"], false);
        assert_eq!(json["datasetIds"][0], "ds-1");
    }

    #[test]
    fn knowledge_base_defaults_fill_missing_fields() {
        let parsed: KnowledgeBaseSettings =
            serde_json::from_str(r#"{"datasetIds":["a"]}"#).expect("parse");
        assert_eq!(parsed.search_mode, SearchMode::Embedding);
        assert_eq!(parsed.limit, 5_000);
        assert!((parsed.similarity - 0.4).abs() < f32::EPSILON);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let bad_similarity = KnowledgeBaseSettings {
            similarity: 1.5,
            ..settings()
        };
        assert!(bad_similarity.validate().is_err());

        let bad_limit = KnowledgeBaseSettings {
            limit: 50,
            ..settings()
        };
        assert!(bad_limit.validate().is_err());

        let no_model = KnowledgeBaseSettings {
            query_extension: QueryExtension {
                enabled: true,
                model: None,
                background: None,
            },
            ..settings()
        };
        assert!(no_model.validate().is_err());

        let no_dataset = KnowledgeBaseSettings::default();
        assert!(no_dataset.validate().is_err());
    }

    #[test]
    fn form_requires_name_and_workflow() {
        assert!(AgentForm::new(1, " ", "wf").validate().is_err());
        assert!(AgentForm::new(1, "Helper", "").validate().is_err());
        assert!(
            AgentForm::new(1, "Helper", "wf")
                .knowledge_base(settings())
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn agent_params_keep_unknown_keys() {
        let raw = serde_json::json!({
            "id": 7,
            "name": "Support",
            "description": "d",
            "params": {"tags": [{"name": "faq"}], "temperature": 0.2},
            "access_control": null,
            "is_deleted": false,
            "updated_at": 1_700_000_000,
            "created_at": 1_600_000_000
        });
        let agent: Agent = serde_json::from_value(raw).expect("agent");
        assert_eq!(agent.params.tags[0].name, "faq");
        assert_eq!(agent.params.extra["temperature"], 0.2);
        assert!(agent.is_active());
        assert_eq!(
            agent.updated_at_utc().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        let back = serde_json::to_value(agent.to_form()).expect("form");
        assert_eq!(back["params"]["temperature"], 0.2);
    }

    #[test]
    fn list_entry_flattens_agent_and_owner() {
        let raw = serde_json::json!({
            "id": 1, "name": "A", "updated_at": 2, "created_at": 1,
            "user_id": "u1",
            "user": {"id": "u1", "name": "Ann", "email": "ann@example.com", "role": "admin"}
        });
        let entry: AgentWithOwner = serde_json::from_value(raw).expect("entry");
        assert_eq!(entry.agent.user_id.as_deref(), Some("u1"));
        assert_eq!(entry.user.map(|u| u.role), Some(Role::Admin));
    }

    fn owned_by(owner: &str, access_control: Option<AccessControl>) -> Agent {
        Agent {
            id: 1,
            base_app_id: Some("wf".into()),
            user_id: Some(owner.into()),
            name: "Helper".into(),
            description: String::new(),
            params: AgentParams::default(),
            access_control,
            is_deleted: false,
            updated_at: 0,
            created_at: 0,
        }
    }

    #[test]
    fn read_and_write_follow_owner_admin_and_rules() {
        use crate::access::AccessRule;

        let owner = Principal::new("alice", Role::User);
        let admin = Principal::new("root", Role::Admin);
        let ops = Principal::new("bob", Role::User).with_groups(["ops"]);
        let stranger = Principal::new("eve", Role::User);
        let shared = AccessControl {
            read: Some(AccessRule {
                group_ids: vec!["ops".into()],
                user_ids: vec![],
            }),
            write: None,
        };

        // (access_control, principal, can_read, can_write)
        let cases = [
            (None, &owner, true, true),
            (None, &admin, true, true),
            (None, &stranger, true, false),
            (Some(AccessControl::private()), &owner, true, true),
            (Some(AccessControl::private()), &admin, true, true),
            (Some(AccessControl::private()), &ops, false, false),
            (Some(shared.clone()), &ops, true, false),
            (Some(shared.clone()), &stranger, false, false),
            (Some(shared), &admin, true, true),
        ];
        for (control, principal, read, write) in cases {
            let agent = owned_by("alice", control.clone());
            assert_eq!(
                agent.can_read(principal),
                read,
                "read for {} on {control:?}",
                principal.user_id
            );
            assert_eq!(
                agent.can_write(principal),
                write,
                "write for {} on {control:?}",
                principal.user_id
            );
        }
    }

    #[test]
    fn ownerless_agent_only_admits_rules_and_admins() {
        let mut agent = owned_by("alice", Some(AccessControl::private()));
        agent.user_id = None;
        assert!(!agent.can_read(&Principal::new("alice", Role::User)));
        assert!(agent.can_write(&Principal::new("root", Role::Admin)));
    }
}
