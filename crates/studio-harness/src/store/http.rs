use reqwest::Method;
use serde::de::DeserializeOwned;
use studio_core::knowledge::parse_dataset_list;
use studio_core::{
    Agent, AgentForm, AgentWithOwner, ApiKeysConfig, ApiKeysForm, KnowledgeBase, StudioConfig,
    WorkflowApp, WorkflowForm,
};
use tracing::{debug, info};

use super::{AgentStore, ApiKeyStore, CatalogSource, WorkflowStore};
use crate::errors::{HarnessError, StoreError};

const API_PREFIX: &str = "/api/v1";
/// Provider keys are served by the `user_api_configs` router.
const API_KEYS_PATH: &str = "/user_api_configs/api-keys";

/// Studio REST API client.
pub struct HttpStudioApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStudioApi {
    pub fn new(config: &StudioConfig) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build api client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}{API_PREFIX}", config.api_base_url.trim_end_matches('/')),
            token: config
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToOwned::to_owned),
        })
    }

    /// Replaces the underlying HTTP client (proxies, custom TLS, tests).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, StoreError> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(event = "store.request", method = %method, path, "studio api request");
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("{method} {path} failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to read {path} response: {e}")))?;

        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| StoreError::Decode(format!("{path}: invalid JSON: {e}")))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T, StoreError> {
        let value = self.send_json(method, path, query, body).await?;
        decode(path, value)
    }

    /// Single record endpoint; a `null` answer becomes [`StoreError::Missing`].
    async fn fetch_record<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        id: Option<i64>,
        body: Option<&serde_json::Value>,
    ) -> Result<T, StoreError> {
        let query = id
            .map(|id| vec![("id", id.to_string())])
            .unwrap_or_default();
        let value = self.send_json(method, path, &query, body).await?;
        if value.is_null() {
            return Err(StoreError::Missing(path.to_string()));
        }
        decode(path, value)
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        id: i64,
    ) -> Result<Option<T>, StoreError> {
        match self.fetch_record(Method::GET, path, Some(id), None).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Delete endpoints answer with a bare boolean.
    async fn delete(&self, path: &str, id: Option<i64>) -> Result<bool, StoreError> {
        let query = id
            .map(|id| vec![("id", id.to_string())])
            .unwrap_or_default();
        let value = self.send_json(Method::DELETE, path, &query, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(format!("{path}: {e}")))
}

fn form_body(form: &AgentForm) -> Result<serde_json::Value, StoreError> {
    form.validate()?;
    serde_json::to_value(form).map_err(|e| StoreError::Decode(format!("agent form: {e}")))
}

fn workflow_body(form: &WorkflowForm) -> Result<serde_json::Value, StoreError> {
    form.validate()?;
    serde_json::to_value(form).map_err(|e| StoreError::Decode(format!("workflow form: {e}")))
}

/// `detail` from a JSON error body, else the raw body.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());
    match detail {
        Some(serde_json::Value::String(s)) => s,
        Some(other) if !other.is_null() => other.to_string(),
        _ if body.trim().is_empty() => "no response body".to_string(),
        _ => body.trim().to_string(),
    }
}

#[async_trait::async_trait]
impl AgentStore for HttpStudioApi {
    async fn list_agents(&self) -> Result<Vec<AgentWithOwner>, StoreError> {
        self.fetch(Method::GET, "/agents/", &[], None).await
    }

    async fn list_workspace_agents(&self) -> Result<Vec<AgentWithOwner>, StoreError> {
        self.fetch(Method::GET, "/agents/workspace", &[], None)
            .await
    }

    async fn list_base_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.fetch(Method::GET, "/agents/base", &[], None).await
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, StoreError> {
        self.fetch_optional("/agents/agent", id).await
    }

    async fn create_agent(&self, form: &AgentForm) -> Result<Agent, StoreError> {
        let body = form_body(form)?;
        self.fetch_record(Method::POST, "/agents/create", None, Some(&body))
            .await
    }

    async fn update_agent(&self, id: i64, form: &AgentForm) -> Result<Agent, StoreError> {
        let body = form_body(form)?;
        self.fetch_record(Method::POST, "/agents/agent/update", Some(id), Some(&body))
            .await
    }

    async fn toggle_agent(&self, id: i64) -> Result<Agent, StoreError> {
        self.fetch_record(Method::POST, "/agents/agent/toggle", Some(id), None)
            .await
    }

    async fn delete_agent(&self, id: i64) -> Result<bool, StoreError> {
        self.delete("/agents/agent/delete", Some(id)).await
    }

    async fn delete_all_agents(&self) -> Result<bool, StoreError> {
        info!(
            event = "store.delete_all",
            resource = "agents",
            "deleting every agent"
        );
        self.delete("/agents/delete/all", None).await
    }
}

#[async_trait::async_trait]
impl CatalogSource for HttpStudioApi {
    async fn list_workflows(&self) -> Result<Vec<WorkflowApp>, StoreError> {
        self.fetch(Method::GET, "/workflows/", &[], None).await
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, StoreError> {
        let path = "/knowledge_bases/get_knowledge_bases";
        let value = self.send_json(Method::GET, path, &[], None).await?;
        Ok(parse_dataset_list(&value))
    }
}

#[async_trait::async_trait]
impl WorkflowStore for HttpStudioApi {
    async fn get_workflow(&self, id: i64) -> Result<Option<WorkflowApp>, StoreError> {
        self.fetch_optional("/workflows/workflow", id).await
    }

    async fn create_workflow(&self, form: &WorkflowForm) -> Result<WorkflowApp, StoreError> {
        let body = workflow_body(form)?;
        self.fetch_record(Method::POST, "/workflows/create", None, Some(&body))
            .await
    }

    async fn update_workflow(
        &self,
        id: i64,
        form: &WorkflowForm,
    ) -> Result<WorkflowApp, StoreError> {
        let body = workflow_body(form)?;
        let path = "/workflows/workflow/update";
        self.fetch_record(Method::POST, path, Some(id), Some(&body))
            .await
    }

    async fn delete_workflow(&self, id: i64) -> Result<bool, StoreError> {
        self.delete("/workflows/workflow/delete", Some(id)).await
    }

    async fn delete_all_workflows(&self) -> Result<bool, StoreError> {
        info!(
            event = "store.delete_all",
            resource = "workflows",
            "deleting every workflow"
        );
        self.delete("/workflows/delete/all", None).await
    }
}

#[async_trait::async_trait]
impl ApiKeyStore for HttpStudioApi {
    async fn get_api_keys(&self) -> Result<ApiKeysConfig, StoreError> {
        self.fetch(Method::GET, API_KEYS_PATH, &[], None).await
    }

    async fn update_api_keys(&self, form: &ApiKeysForm) -> Result<ApiKeysConfig, StoreError> {
        form.validate()?;
        let body = serde_json::to_value(form)
            .map_err(|e| StoreError::Decode(format!("api keys form: {e}")))?;
        self.fetch(Method::POST, API_KEYS_PATH, &[], Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};
    use studio_core::SearchMode;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockBuilder, MockServer, Request, Respond, ResponseTemplate};

    use super::*;
    use crate::errors::NOT_FOUND_DETAIL;

    type Captured = Arc<Mutex<Vec<Request>>>;

    #[derive(Clone)]
    struct CaptureResponder {
        store: Captured,
        template: ResponseTemplate,
    }

    impl Respond for CaptureResponder {
        fn respond(&self, req: &Request) -> ResponseTemplate {
            self.store.lock().expect("mutex").push(req.clone());
            self.template.clone()
        }
    }

    async fn capture(
        server: &MockServer,
        mock: MockBuilder,
        template: ResponseTemplate,
    ) -> Captured {
        let store = Captured::default();
        mock.respond_with(CaptureResponder {
            store: store.clone(),
            template,
        })
        .mount(server)
        .await;
        store
    }

    fn route(verb: &str, endpoint: &str) -> MockBuilder {
        let full = format!("{API_PREFIX}{endpoint}");
        Mock::given(method(verb)).and(path(full))
    }

    fn by_id(verb: &str, endpoint: &str, id: &str) -> MockBuilder {
        route(verb, endpoint).and(query_param("id", id))
    }

    fn ok(body: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn status(code: u16, detail: &str) -> ResponseTemplate {
        let body = json!({ "detail": detail });
        ResponseTemplate::new(code).set_body_json(body)
    }

    fn only(captured: &Captured) -> Request {
        let requests = captured.lock().expect("mutex");
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }

    fn json_body(req: &Request) -> Value {
        serde_json::from_slice(&req.body).expect("json body")
    }

    fn authorization(req: &Request) -> Option<String> {
        req.headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    }

    fn api(server: &MockServer, token: Option<&str>) -> HttpStudioApi {
        let mut config = StudioConfig::new(server.uri());
        if let Some(token) = token {
            config = config.api_token(token);
        }
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("test client");
        HttpStudioApi::new(&config)
            .expect("api")
            .with_http_client(client)
    }

    fn agent_json(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "base_app_id": "wf-1",
            "user_id": "u-1",
            "name": name,
            "description": "",
            "params": {},
            "access_control": null,
            "is_deleted": false,
            "updated_at": 1_700_000_000,
            "created_at": 1_690_000_000,
        })
    }

    fn workflow_json(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "description": "",
            "params": null,
            "api_path": "/run/flow",
            "app_token": "",
            "is_deleted": false,
            "updated_at": 1,
            "created_at": 1,
        })
    }

    #[test]
    fn error_detail_prefers_json_detail() {
        assert_eq!(error_detail(r#"{"detail":"nope"}"#), "nope");
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"x"}]}"#),
            r#"[{"msg":"x"}]"#
        );
        assert_eq!(error_detail("plain failure\n"), "plain failure");
        assert_eq!(error_detail(""), "no response body");
    }

    #[tokio::test]
    async fn list_agents_sends_bearer_and_decodes_owners() {
        let server = MockServer::start().await;
        let mut with_user = agent_json(1, "Support");
        with_user["user"] = json!({
            "id": "u-1",
            "name": "Ana",
            "email": "ana@example.com",
            "role": "admin",
        });
        let captured = capture(
            &server,
            route("GET", "/agents/"),
            ok(json!([with_user, agent_json(2, "Sales")])),
        )
        .await;

        let api = api(&server, Some("secret"));
        let agents = api.list_agents().await.expect("list");
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].agent.name, "Support");
        let owner = agents[0].user.as_ref().map(|u| u.name.as_str());
        assert_eq!(owner, Some("Ana"));
        assert!(agents[1].user.is_none());

        let req = only(&captured);
        assert_eq!(authorization(&req).as_deref(), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn workspace_and_base_listings_hit_their_routes() {
        let server = MockServer::start().await;
        let workspace = capture(
            &server,
            route("GET", "/agents/workspace"),
            ok(json!([agent_json(4, "Mine")])),
        )
        .await;
        let base = capture(
            &server,
            route("GET", "/agents/base"),
            ok(json!([agent_json(5, "Base flow")])),
        )
        .await;

        let api = api(&server, None);
        let mine = api.list_workspace_agents().await.expect("workspace");
        assert_eq!(mine[0].agent.name, "Mine");
        let bases = api.list_base_agents().await.expect("base");
        assert_eq!(bases[0].name, "Base flow");

        assert_eq!(only(&workspace).url.query(), None);
        assert_eq!(only(&base).url.query(), None);
    }

    #[tokio::test]
    async fn get_agent_maps_not_found_answers_to_none() {
        let server = MockServer::start().await;
        let cases = [
            ("5", status(404, "gone")),
            ("6", ok(Value::Null)),
            ("7", ok(agent_json(7, "Found"))),
            ("8", status(401, NOT_FOUND_DETAIL)),
            ("9", status(401, "401 Unauthorized")),
        ];
        for (id, template) in cases {
            let mock = by_id("GET", "/agents/agent", id);
            capture(&server, mock, template).await;
        }

        let api = api(&server, None);
        assert_eq!(api.get_agent(5).await.expect("404"), None);
        assert_eq!(api.get_agent(6).await.expect("null"), None);
        let agent = api.get_agent(7).await.expect("found").expect("some");
        assert_eq!(agent.name, "Found");
        assert_eq!(api.get_agent(8).await.expect("401 not found"), None);
        let err = api.get_agent(9).await.expect_err("unauthorized");
        assert_eq!(
            err,
            StoreError::Api {
                status: 401,
                detail: "401 Unauthorized".into()
            }
        );

        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests.len(), 5);
        assert!(requests.iter().all(|req| authorization(req).is_none()));
    }

    #[tokio::test]
    async fn create_agent_validates_before_sending() {
        let server = MockServer::start().await;
        let api = api(&server, None);
        let form = AgentForm::new(0, "  ", "wf-1");
        let err = api.create_agent(&form).await.expect_err("invalid");
        assert!(matches!(err, StoreError::Validation(_)));
        let requests = server.received_requests().await.expect("recorded");
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn create_agent_posts_form() {
        let server = MockServer::start().await;
        let captured = capture(
            &server,
            route("POST", "/agents/create"),
            ok(agent_json(9, "New")),
        )
        .await;

        let api = api(&server, None);
        let form = AgentForm::new(0, "New", "wf-1").description("fresh");
        let agent = api.create_agent(&form).await.expect("create");
        assert_eq!(agent.id, 9);

        let body = json_body(&only(&captured));
        assert_eq!(body["name"], "New");
        assert_eq!(body["base_app_id"], "wf-1");
        assert_eq!(body["description"], "fresh");
    }

    #[tokio::test]
    async fn update_agent_posts_form_with_id_query() {
        let server = MockServer::start().await;
        let mut updated = agent_json(12, "Renamed");
        updated["params"] = json!({
            "knowledge_base": {"datasetIds": ["kb-1"], "searchMode": "mixedRecall"}
        });
        let captured = capture(
            &server,
            by_id("POST", "/agents/agent/update", "12"),
            ok(updated),
        )
        .await;

        let raw = agent_json(12, "Old");
        let original: Agent = serde_json::from_value(raw).expect("agent");
        let mut form = original.to_form();
        form.name = "Renamed".into();
        let api = api(&server, Some("tok"));
        let agent = api.update_agent(12, &form).await.expect("update");
        assert_eq!(agent.name, "Renamed");
        let kb = agent.params.knowledge_base.expect("knowledge base");
        assert_eq!(kb.search_mode, SearchMode::MixedRecall);

        let req = only(&captured);
        assert_eq!(req.url.query(), Some("id=12"));
        let body = json_body(&req);
        assert_eq!(body["id"], 12);
        assert_eq!(body["name"], "Renamed");
        assert_eq!(body["base_app_id"], "wf-1");
    }

    #[tokio::test]
    async fn toggle_and_delete_use_id_query() {
        let server = MockServer::start().await;
        let mut toggled = agent_json(3, "Flip");
        toggled["is_deleted"] = json!(true);
        let toggle = capture(
            &server,
            by_id("POST", "/agents/agent/toggle", "3"),
            ok(toggled),
        )
        .await;
        let delete = capture(
            &server,
            by_id("DELETE", "/agents/agent/delete", "3"),
            ok(json!(true)),
        )
        .await;

        let api = api(&server, None);
        let agent = api.toggle_agent(3).await.expect("toggle");
        assert!(!agent.is_active());
        assert!(api.delete_agent(3).await.expect("delete"));
        assert!(only(&toggle).body.is_empty());
        assert_eq!(only(&delete).url.query(), Some("id=3"));
    }

    #[tokio::test]
    async fn delete_all_agents_reads_boolean_answer() {
        let server = MockServer::start().await;
        let captured = capture(
            &server,
            route("DELETE", "/agents/delete/all"),
            ok(json!(false)),
        )
        .await;

        let api = api(&server, Some("admin"));
        assert!(!api.delete_all_agents().await.expect("delete all"));
        assert_eq!(only(&captured).url.query(), None);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_detail() {
        let server = MockServer::start().await;
        capture(
            &server,
            route("POST", "/agents/agent/toggle"),
            status(403, "not allowed"),
        )
        .await;

        let api = api(&server, None);
        let err = api.toggle_agent(1).await.expect_err("forbidden");
        assert_eq!(
            err,
            StoreError::Api {
                status: 403,
                detail: "not allowed".into()
            }
        );
    }

    #[tokio::test]
    async fn knowledge_bases_are_normalized() {
        let server = MockServer::start().await;
        let body = json!({"data": [{"_id": "kb-1", "name": "Docs", "intro": "manuals"}]});
        capture(
            &server,
            route("GET", "/knowledge_bases/get_knowledge_bases"),
            ok(body),
        )
        .await;

        let api = api(&server, None);
        let kbs = api.list_knowledge_bases().await.expect("kbs");
        assert_eq!(kbs.len(), 1);
        assert_eq!(kbs[0].id, "kb-1");
        assert_eq!(kbs[0].description, "manuals");
    }

    #[tokio::test]
    async fn workflows_decode() {
        let server = MockServer::start().await;
        capture(
            &server,
            route("GET", "/workflows/"),
            ok(json!([workflow_json(1, "Flow")])),
        )
        .await;

        let api = api(&server, None);
        let workflows = api.list_workflows().await.expect("workflows");
        let api_path = workflows[0].resolved_api_path();
        assert_eq!(api_path.as_deref(), Some("/run/flow"));
    }

    #[tokio::test]
    async fn workflow_crud_uses_workflow_routes() {
        let server = MockServer::start().await;
        let create = capture(
            &server,
            route("POST", "/workflows/create"),
            ok(workflow_json(21, "Flow")),
        )
        .await;
        let get = capture(
            &server,
            by_id("GET", "/workflows/workflow", "21"),
            ok(workflow_json(21, "Flow")),
        )
        .await;
        let update = capture(
            &server,
            by_id("POST", "/workflows/workflow/update", "21"),
            ok(workflow_json(21, "Flow v2")),
        )
        .await;
        let delete = capture(
            &server,
            by_id("DELETE", "/workflows/workflow/delete", "21"),
            ok(json!(true)),
        )
        .await;

        let api = api(&server, Some("admin"));
        let form = WorkflowForm::new("Flow")
            .api_path("/run/flow")
            .app_token("app-tok");
        let created = api.create_workflow(&form).await.expect("create");
        assert_eq!(created.id, 21);
        let fetched = api.get_workflow(21).await.expect("get").expect("some");
        assert_eq!(fetched.name, "Flow");

        let mut edit = fetched.to_form();
        edit.name = "Flow v2".into();
        let updated = api.update_workflow(21, &edit).await.expect("update");
        assert_eq!(updated.name, "Flow v2");
        assert!(api.delete_workflow(21).await.expect("delete"));

        let body = json_body(&only(&create));
        assert_eq!(body["name"], "Flow");
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["app_token"], "app-tok");
        assert!(only(&get).body.is_empty());
        assert_eq!(json_body(&only(&update))["id"], 21);
        assert_eq!(only(&delete).url.query(), Some("id=21"));
    }

    #[tokio::test]
    async fn missing_workflow_is_none_and_invalid_form_is_not_sent() {
        let server = MockServer::start().await;
        capture(
            &server,
            route("GET", "/workflows/workflow"),
            status(401, NOT_FOUND_DETAIL),
        )
        .await;

        let api = api(&server, None);
        assert_eq!(api.get_workflow(404).await.expect("missing"), None);

        let invalid = WorkflowForm::new(" ");
        let err = api.create_workflow(&invalid).await.expect_err("invalid");
        assert!(matches!(err, StoreError::Validation(_)));
        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn delete_all_workflows_hits_admin_route() {
        let server = MockServer::start().await;
        let captured = capture(
            &server,
            route("DELETE", "/workflows/delete/all"),
            ok(json!(true)),
        )
        .await;

        let api = api(&server, None);
        assert!(api.delete_all_workflows().await.expect("delete all"));
        assert!(only(&captured).body.is_empty());
    }

    #[tokio::test]
    async fn api_keys_read_masked_and_write_only_set_fields() {
        let server = MockServer::start().await;
        let masked = json!({
            "langflow_api_key_masked": "lf-1*****7890",
            "langflow_base_url": "http://langflow:7860",
            "fastgpt_api_key_masked": null,
            "fastgpt_base_url": null,
        });
        let get = route("GET", API_KEYS_PATH);
        capture(&server, get, ok(masked.clone())).await;
        let post = route("POST", API_KEYS_PATH);
        let update = capture(&server, post, ok(masked)).await;

        let api = api(&server, Some("admin"));
        let config = api.get_api_keys().await.expect("get");
        let masked_key = config.langflow_api_key_masked.as_deref();
        assert_eq!(masked_key, Some("lf-1*****7890"));
        assert_eq!(config.fastgpt_base_url, None);

        let form = ApiKeysForm {
            langflow_api_key: Some("lf-1234567890".into()),
            ..ApiKeysForm::default()
        };
        let stored = api.update_api_keys(&form).await.expect("update");
        assert_eq!(stored, config);
        assert_eq!(
            json_body(&only(&update)),
            json!({"langflow_api_key": "lf-1234567890"})
        );
    }

    #[tokio::test]
    async fn api_keys_update_without_langflow_setting_is_rejected_locally() {
        let server = MockServer::start().await;
        let form = ApiKeysForm {
            fastgpt_base_url: Some("http://fastgpt".into()),
            ..ApiKeysForm::default()
        };
        let api = api(&server, None);
        let err = api.update_api_keys(&form).await.expect_err("invalid");
        assert!(matches!(err, StoreError::Validation(_)));
        let requests = server.received_requests().await.expect("recorded");
        assert!(requests.is_empty());
    }
}
