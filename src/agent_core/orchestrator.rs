//! Request orchestrator: the relay pipeline for one chat request.
//!
//! ```text
//! Received → Validating → CallingAgent → Interpreting → [CallingDesktop] → Responding
//! ```
//!
//! Each request runs independently; the only shared state is the two upstream
//! clients and the event sink, all read-only. The agent and desktop calls are
//! strictly sequential because the desktop call depends on the agent's reply.
//!
//! Every failure, including a panic anywhere in the pipeline, leaves
//! `handle` as a `RelayError` and produces exactly one `error` event.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use uuid::Uuid;

use super::errors::RelayError;
use super::events::{EventSink, PipelineEvent};
use super::types::{OrchestratorResponse, Stage};
use crate::desktop_client::{is_known_method, DesktopControl};
use crate::inference::{interpret, ChatCompletions, ChatRequest, Interpretation, ToolInvocation};

/// Per-request bookkeeping: correlation id and current stage.
#[derive(Debug)]
struct PipelineRun {
    request_id: String,
    stage: Stage,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            stage: Stage::Received,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(request_id = %self.request_id, stage = %stage, "pipeline stage");
        self.stage = stage;
    }
}

/// Drives a chat request through the agent and, when asked, the desktop.
pub struct Orchestrator {
    agent: Arc<dyn ChatCompletions>,
    desktop: Arc<dyn DesktopControl>,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        agent: Arc<dyn ChatCompletions>,
        desktop: Arc<dyn DesktopControl>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            agent,
            desktop,
            events,
        }
    }

    /// Handle one raw `POST /chat` body.
    pub async fn handle(&self, body: &[u8]) -> Result<OrchestratorResponse, RelayError> {
        let mut run = PipelineRun::new();
        self.events.emit(&PipelineEvent::ChatRequestReceived {
            request_id: run.request_id.clone(),
            body_bytes: body.len(),
        });

        let outcome = AssertUnwindSafe(self.run_stages(&mut run, body))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(RelayError::Unexpected {
                stage: run.stage,
                reason: panic_message(panic.as_ref()),
            }),
        };

        if let Err(err) = &result {
            self.events.emit(&PipelineEvent::Error {
                request_id: run.request_id.clone(),
                stage: run.stage,
                kind: err.kind().to_string(),
                status: err.status().as_u16(),
                detail: err.to_string(),
                upstream_body: err.upstream_body().map(str::to_string),
                upstream_data: err.upstream_data().cloned(),
            });
        }

        result
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        body: &[u8],
    ) -> Result<OrchestratorResponse, RelayError> {
        run.enter(Stage::Validating);
        let request = ChatRequest::from_json(body)?;

        run.enter(Stage::CallingAgent);
        let completion = self.agent.complete(&request).await?;
        self.events.emit(&PipelineEvent::AgentResponse {
            request_id: run.request_id.clone(),
            content: completion.content.clone(),
        });

        run.enter(Stage::Interpreting);
        match interpret(&completion.content) {
            Interpretation::Assistant(text) => {
                run.enter(Stage::Responding);
                self.events.emit(&PipelineEvent::AssistantReply {
                    request_id: run.request_id.clone(),
                    content: text.clone(),
                });
                Ok(OrchestratorResponse::Assistant { assistant: text })
            }
            Interpretation::ToolCall(invocation) => self.dispatch(run, invocation).await,
        }
    }

    async fn dispatch(
        &self,
        run: &mut PipelineRun,
        invocation: ToolInvocation,
    ) -> Result<OrchestratorResponse, RelayError> {
        run.enter(Stage::CallingDesktop);
        if !is_known_method(&invocation.tool) {
            tracing::warn!(
                request_id = %run.request_id,
                tool = %invocation.tool,
                "model requested an unknown desktop method; forwarding anyway"
            );
        }

        let rpc = self.desktop.invoke(&invocation).await?;
        self.events.emit(&PipelineEvent::ToolCallResult {
            request_id: run.request_id.clone(),
            tool: invocation.tool.clone(),
            result: rpc.result.clone(),
        });

        run.enter(Stage::Responding);
        Ok(OrchestratorResponse::ToolResult {
            tool_result: rpc.result,
            drag_path: invocation.drag_path().cloned(),
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::*;
    use crate::agent_core::events::RecordingEventSink;
    use crate::desktop_client::{DesktopError, RpcResult};
    use crate::inference::{AgentError, CompletionResult};

    // ─── Fakes ──────────────────────────────────────────────────────────────

    enum AgentReply {
        Text(&'static str),
        Fail(fn() -> AgentError),
        Panic,
    }

    struct FakeAgent {
        reply: AgentReply,
        calls: AtomicUsize,
    }

    impl FakeAgent {
        fn new(reply: AgentReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatCompletions for FakeAgent {
        async fn complete(&self, _request: &ChatRequest) -> Result<CompletionResult, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                AgentReply::Text(text) => Ok(CompletionResult {
                    content: (*text).to_string(),
                }),
                AgentReply::Fail(make) => Err(make()),
                AgentReply::Panic => panic!("agent exploded"),
            }
        }
    }

    struct FakeDesktop {
        reply: Result<Value, fn() -> DesktopError>,
        seen: Mutex<Vec<ToolInvocation>>,
    }

    impl FakeDesktop {
        fn ok(result: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(result),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(make: fn() -> DesktopError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(make),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DesktopControl for FakeDesktop {
        async fn invoke(&self, invocation: &ToolInvocation) -> Result<RpcResult, DesktopError> {
            self.seen.lock().unwrap().push(invocation.clone());
            match &self.reply {
                Ok(result) => Ok(RpcResult {
                    result: result.clone(),
                }),
                Err(make) => Err(make()),
            }
        }
    }

    fn orchestrator(
        agent: &Arc<FakeAgent>,
        desktop: &Arc<FakeDesktop>,
    ) -> (Orchestrator, Arc<RecordingEventSink>) {
        let sink = Arc::new(RecordingEventSink::new());
        let orch = Orchestrator::new(agent.clone(), desktop.clone(), sink.clone());
        (orch, sink)
    }

    const CLICK_REQUEST: &[u8] = br#"{"messages":[{"role":"user","content":"click at 10,20"}]}"#;

    // ─── Validation ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_invalid_requests_make_no_upstream_calls() {
        let bodies: [&[u8]; 5] = [
            br#"{}"#,
            br#"{"messages":"click"}"#,
            br#"{"messages":{"role":"user"}}"#,
            br#"{"messages":[]}"#,
            b"definitely not json",
        ];

        for body in bodies {
            let agent = FakeAgent::new(AgentReply::Text("unused"));
            let desktop = FakeDesktop::ok(json!("unused"));
            let (orch, sink) = orchestrator(&agent, &desktop);

            let err = orch.handle(body).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(agent.calls(), 0);
            assert_eq!(desktop.calls(), 0);
            assert_eq!(sink.names(), vec!["chat_request_received", "error"]);
        }
    }

    // ─── Scenarios ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_click_scenario() {
        let agent = FakeAgent::new(AgentReply::Text(
            r#"{"tool":"click","args":{"x":10,"y":20,"button":"left"}}"#,
        ));
        let desktop = FakeDesktop::ok(json!("ok"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        let resp = orch.handle(CLICK_REQUEST).await.unwrap();
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"tool_result": "ok"}));

        let seen = desktop.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].tool, "click");
        assert_eq!(Value::Object(seen[0].args.clone()), json!({"x": 10, "y": 20, "button": "left"}));

        assert_eq!(
            sink.names(),
            vec!["chat_request_received", "agent_response", "tool_call_result"]
        );
    }

    #[tokio::test]
    async fn test_plain_text_never_calls_desktop() {
        let agent = FakeAgent::new(AgentReply::Text("I clicked the button for you."));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        let resp = orch.handle(CLICK_REQUEST).await.unwrap();
        assert_eq!(
            resp,
            OrchestratorResponse::Assistant {
                assistant: "I clicked the button for you.".into()
            }
        );
        assert_eq!(desktop.calls(), 0);
        assert_eq!(
            sink.names(),
            vec!["chat_request_received", "agent_response", "assistant_reply"]
        );
    }

    #[tokio::test]
    async fn test_drag_round_trip_carries_path() {
        let agent = FakeAgent::new(AgentReply::Text(
            r#"{"tool":"drag","args":{"path":[[0,0],[10,10]]}}"#,
        ));
        let desktop = FakeDesktop::ok(json!({"dragged": true}));
        let (orch, _sink) = orchestrator(&agent, &desktop);

        let resp = orch.handle(CLICK_REQUEST).await.unwrap();
        assert_eq!(
            resp,
            OrchestratorResponse::ToolResult {
                tool_result: json!({"dragged": true}),
                drag_path: Some(json!([[0, 0], [10, 10]])),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_method_is_still_forwarded() {
        let agent = FakeAgent::new(AgentReply::Text(r#"{"tool":"zoom","args":{"level":2}}"#));
        let desktop = FakeDesktop::ok(json!("zoomed"));
        let (orch, _sink) = orchestrator(&agent, &desktop);

        orch.handle(CLICK_REQUEST).await.unwrap();
        assert_eq!(desktop.calls(), 1);
    }

    // ─── Agent failures ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_agent_timeout_is_504_and_skips_desktop() {
        let agent = FakeAgent::new(AgentReply::Fail(|| AgentError::Timeout {
            endpoint: "http://agent".into(),
            timeout_ms: 60_000,
        }));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(desktop.calls(), 0);

        match sink.events().last() {
            Some(PipelineEvent::Error { stage, kind, .. }) => {
                assert_eq!(*stage, Stage::CallingAgent);
                assert_eq!(kind, "agent_timeout");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_agent_unavailable_is_503() {
        let agent = FakeAgent::new(AgentReply::Fail(|| AgentError::Unavailable {
            endpoint: "http://agent".into(),
            reason: "connection refused".into(),
        }));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, _sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(desktop.calls(), 0);
    }

    #[tokio::test]
    async fn test_agent_malformed_is_502() {
        let agent = FakeAgent::new(AgentReply::Fail(|| AgentError::MalformedResponse {
            reason: "empty choices array".into(),
        }));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, _sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_agent_upstream_error_body_logged() {
        let agent = FakeAgent::new(AgentReply::Fail(|| AgentError::UpstreamError {
            status: 500,
            body: "CUDA out of memory".into(),
        }));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        match sink.events().last() {
            Some(PipelineEvent::Error { upstream_body, .. }) => {
                assert_eq!(upstream_body.as_deref(), Some("CUDA out of memory"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    // ─── Desktop failures ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_desktop_rpc_error_is_502_with_message() {
        let agent = FakeAgent::new(AgentReply::Text(r#"{"tool":"click","args":{}}"#));
        let desktop = FakeDesktop::failing(|| DesktopError::RpcError {
            code: -32602,
            message: "x is required".into(),
            data: None,
        });
        let (orch, sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("x is required"));
        assert!(!sink.names().contains(&"tool_call_result"));
    }

    #[tokio::test]
    async fn test_desktop_rpc_error_data_reaches_error_event() {
        let agent = FakeAgent::new(AgentReply::Text(r#"{"tool":"click","args":{"x":1,"y":1}}"#));
        let desktop = FakeDesktop::failing(|| DesktopError::RpcError {
            code: -32000,
            message: "element not clickable".into(),
            data: Some(json!({"covered_by": "modal"})),
        });
        let (orch, sink) = orchestrator(&agent, &desktop);

        orch.handle(CLICK_REQUEST).await.unwrap_err();
        match sink.events().last() {
            Some(PipelineEvent::Error {
                kind,
                upstream_data,
                ..
            }) => {
                assert_eq!(kind, "desktop_rpc_error");
                assert_eq!(upstream_data.as_ref(), Some(&json!({"covered_by": "modal"})));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_desktop_no_result_is_502() {
        let agent = FakeAgent::new(AgentReply::Text(r#"{"tool":"type","args":{"text":"hi"}}"#));
        let desktop = FakeDesktop::failing(|| DesktopError::NoResult {
            method: "type".into(),
        });
        let (orch, _sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "desktop_no_result");
    }

    #[tokio::test]
    async fn test_desktop_timeout_and_unavailable() {
        let agent = FakeAgent::new(AgentReply::Text(r#"{"tool":"scroll","args":{}}"#));

        let desktop = FakeDesktop::failing(|| DesktopError::Timeout {
            method: "scroll".into(),
            timeout_ms: 60_000,
        });
        let (orch, sink) = orchestrator(&agent, &desktop);
        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        match sink.events().last() {
            Some(PipelineEvent::Error { stage, .. }) => assert_eq!(*stage, Stage::CallingDesktop),
            other => panic!("expected error event, got {other:?}"),
        }

        let desktop = FakeDesktop::failing(|| DesktopError::Unavailable {
            endpoint: "http://desktop".into(),
            reason: "dns error".into(),
        });
        let (orch, _sink) = orchestrator(&agent, &desktop);
        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    // ─── Unexpected failures ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_panic_becomes_500_with_stage() {
        let agent = FakeAgent::new(AgentReply::Panic);
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        let err = orch.handle(CLICK_REQUEST).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("agent exploded"));

        match sink.events().last() {
            Some(PipelineEvent::Error { stage, kind, .. }) => {
                assert_eq!(*stage, Stage::CallingAgent);
                assert_eq!(kind, "unexpected_error");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    // ─── Correlation ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_events_share_request_id_and_differ_across_requests() {
        let agent = FakeAgent::new(AgentReply::Text("hello"));
        let desktop = FakeDesktop::ok(json!("unused"));
        let (orch, sink) = orchestrator(&agent, &desktop);

        orch.handle(CLICK_REQUEST).await.unwrap();
        orch.handle(CLICK_REQUEST).await.unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 6);
        let first = events[0].request_id();
        let second = events[3].request_id();
        assert!(events[..3].iter().all(|e| e.request_id() == first));
        assert!(events[3..].iter().all(|e| e.request_id() == second));
        assert_ne!(first, second);
    }

    #[test]
    fn test_panic_message_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert!(panic_message(other.as_ref()).contains("non-string"));
    }
}
