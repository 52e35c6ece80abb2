use std::time::Duration;

use futures::StreamExt as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use studio_core::{RetryPolicy, StudioConfig};
use tracing::{debug, warn};

use super::{CompletionBody, GatewayResponse, WorkflowGateway, WorkflowRunRequest};
use crate::errors::{GatewayError, HarnessError};

const RUN_PATH: &str = "/api/v1/workflows/run";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Workflow gateway reached over HTTP.
///
/// Non-streaming runs are retried on transport failures and 429/5xx answers;
/// streaming runs are attempted once.
pub struct HttpWorkflowGateway {
    client: reqwest::Client,
    base_url: String,
    default_token: Option<String>,
    request_timeout: Duration,
    stream_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpWorkflowGateway {
    pub fn new(config: &StudioConfig) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build gateway client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            default_token: config.gateway_token.clone(),
            request_timeout: config.request_timeout,
            stream_timeout: config.stream_timeout,
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the underlying HTTP client (proxies, custom TLS, tests).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub(crate) fn run_url(&self, stream: bool) -> String {
        if stream {
            format!("{}{RUN_PATH}?stream=true", self.base_url)
        } else {
            format!("{}{RUN_PATH}", self.base_url)
        }
    }

    fn build_request(&self, request: &WorkflowRunRequest) -> reqwest::RequestBuilder {
        let body = serde_json::json!({
            "workflow_app_id": request.workflow_app_id,
            "model": request.model_id,
            "messages": request.messages,
            "stream": request.stream,
        });
        let timeout = if request.stream {
            self.stream_timeout
        } else {
            self.request_timeout
        };
        let mut builder = self
            .client
            .post(self.run_url(request.stream))
            .timeout(timeout)
            .json(&body);
        let token = request.token.as_deref().or(self.default_token.as_deref());
        if let Some(value) = authorization_value(token) {
            builder = builder.header(AUTHORIZATION, value);
        }
        if request.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }
        builder
    }

    async fn start_stream(
        &self,
        request: &WorkflowRunRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| GatewayError::transport(format!("workflow request failed: {e}")))?;
        let response = check_status(response).await?;

        if content_type(&response).contains("application/json") {
            debug!(
                event = "gateway.stream_fallback",
                workflow_app_id = %request.workflow_app_id,
                "gateway answered a streaming request with JSON"
            );
            return decode_completion(response).await.map(GatewayResponse::Json);
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| GatewayError::transport(format!("stream read failed: {e}")))
        });
        Ok(GatewayResponse::Stream(Box::pin(stream)))
    }

    async fn complete_once(
        &self,
        request: &WorkflowRunRequest,
    ) -> Result<CompletionBody, GatewayError> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| GatewayError::transport(format!("workflow request failed: {e}")))?;
        let response = check_status(response).await?;
        decode_completion(response).await
    }
}

#[async_trait::async_trait]
impl WorkflowGateway for HttpWorkflowGateway {
    async fn run(&self, request: WorkflowRunRequest) -> Result<GatewayResponse, GatewayError> {
        debug!(
            event = "gateway.run",
            workflow_app_id = %request.workflow_app_id,
            model = %request.model_id,
            messages = request.messages.len(),
            stream = request.stream,
            "starting workflow run"
        );
        if request.stream {
            return self.start_stream(&request).await;
        }

        let mut retries_done = 0;
        loop {
            match self.complete_once(&request).await {
                Ok(body) => return Ok(GatewayResponse::Json(body)),
                Err(err) if err.is_retryable() && self.retry.can_retry(retries_done) => {
                    let wait = self.retry.delay_for(retries_done);
                    warn!(
                        event = "gateway.retry",
                        attempt = retries_done + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retrying workflow run"
                    );
                    tokio::time::sleep(wait).await;
                    retries_done += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn authorization_value(token: Option<&str>) -> Option<String> {
    let token = token.map(str::trim).filter(|t| !t.is_empty())?;
    if token.starts_with("Bearer ") {
        Some(token.to_string())
    } else {
        Some(format!("Bearer {token}"))
    }
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(ToOwned::to_owned))
        .unwrap_or_else(|| truncate(&body, MAX_ERROR_BODY_CHARS));
    Err(GatewayError::http(status.as_u16(), message))
}

async fn decode_completion(response: reqwest::Response) -> Result<CompletionBody, GatewayError> {
    let content_type = content_type(&response);
    if content_type.contains("text/html") {
        return Err(GatewayError::protocol(
            "gateway returned an HTML page instead of JSON",
        ));
    }
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::transport(format!("failed to read workflow response: {e}")))?;
    serde_json::from_str(&body).map_err(|e| {
        GatewayError::protocol(format!(
            "invalid workflow response JSON: {e} (body: {})",
            truncate(&body, MAX_ERROR_BODY_CHARS)
        ))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;
    use crate::gateway::ChatMessage;

    #[derive(Clone)]
    struct CaptureResponder {
        store: Arc<Mutex<Vec<Request>>>,
        template: ResponseTemplate,
    }

    impl CaptureResponder {
        fn new(template: ResponseTemplate) -> Self {
            Self {
                store: Arc::default(),
                template,
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.store.lock().expect("mutex").clone()
        }
    }

    impl Respond for CaptureResponder {
        fn respond(&self, req: &Request) -> ResponseTemplate {
            self.store.lock().expect("mutex").push(req.clone());
            self.template.clone()
        }
    }

    fn gateway(server: &MockServer) -> HttpWorkflowGateway {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("test client");
        HttpWorkflowGateway::new(&StudioConfig::new(server.uri()))
            .expect("gateway")
            .with_http_client(client)
            .retry_policy(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn request(stream: bool, token: Option<&str>) -> WorkflowRunRequest {
        WorkflowRunRequest {
            token: token.map(ToOwned::to_owned),
            workflow_app_id: "wf-1".into(),
            model_id: "gpt-4o".into(),
            messages: vec![ChatMessage::user("hello")],
            stream,
        }
    }

    fn json_answer(status: u16, body: Value) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(body)
    }

    fn raw(status: u16, body: &str, mime: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_raw(body, mime)
    }

    fn header(req: &Request, name: &str) -> Option<String> {
        req.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    }

    async fn collect(response: GatewayResponse) -> String {
        let GatewayResponse::Stream(mut stream) = response else {
            panic!("expected stream response");
        };
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn authorization_header_rules() {
        assert_eq!(authorization_value(None), None);
        assert_eq!(authorization_value(Some("   ")), None);
        assert_eq!(
            authorization_value(Some("abc")).as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(
            authorization_value(Some("Bearer abc")).as_deref(),
            Some("Bearer abc")
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn streaming_run_posts_body_and_passes_bytes_through() {
        let server = MockServer::start().await;
        let events = "data: {\"text\":\"Hel\"}\ndata: {\"text\":\"lo\"}\ndata: [DONE]\n";
        let responder = CaptureResponder::new(raw(200, events, "text/event-stream"));
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .and(query_param("stream", "true"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let response = gateway.run(request(true, Some("tok"))).await.expect("run");
        let body = collect(response).await;
        assert!(body.contains("Hel"));
        assert!(body.ends_with("data: [DONE]\n"));

        let captured = responder.requests();
        let req = &captured[0];
        assert_eq!(header(req, "authorization").as_deref(), Some("Bearer tok"));
        assert_eq!(header(req, "accept").as_deref(), Some("text/event-stream"));
        let json: Value = serde_json::from_slice(&req.body).expect("json body");
        assert_eq!(json["workflow_app_id"], "wf-1");
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn blank_token_sends_no_authorization_header() {
        let server = MockServer::start().await;
        let responder = CaptureResponder::new(json_answer(200, json!({"response": "hi"})));
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        gateway.run(request(false, Some("  "))).await.expect("run");
        let captured = responder.requests();
        assert_eq!(header(&captured[0], "authorization"), None);
        assert_eq!(captured[0].url.query(), None);
    }

    #[tokio::test]
    async fn json_answer_to_stream_request_is_a_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(json_answer(200, json!({"response": "whole answer"})))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let response = gateway.run(request(true, None)).await.expect("run");
        match response {
            GatewayResponse::Json(body) => {
                assert_eq!(body.response.as_deref(), Some("whole answer"))
            }
            other => panic!("expected JSON fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_streaming_run_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(json_answer(200, json!({"response": "after retry"})))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let response = gateway.run(request(false, None)).await.expect("run");
        let GatewayResponse::Json(body) = response else {
            panic!("expected JSON");
        };
        assert_eq!(body.response.as_deref(), Some("after retry"));
        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried_and_use_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(json_answer(401, json!({"detail": "invalid token"})))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let err = gateway
            .run(request(false, Some("bad")))
            .await
            .expect_err("should fail");
        assert_eq!(err, GatewayError::http(401, "invalid token"));
        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn html_pages_are_rejected() {
        let server = MockServer::start().await;
        let page = raw(200, "<html>cdn</html>", "text/html; charset=utf-8");
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(page)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let err = gateway.run(request(false, None)).await.expect_err("html");
        assert!(matches!(err, GatewayError::Protocol { .. }));
    }

    #[tokio::test]
    async fn stream_errors_are_reported_before_reading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let err = gateway.run(request(true, None)).await.expect_err("500");
        assert_eq!(err, GatewayError::http(500, "boom"));
    }
}
