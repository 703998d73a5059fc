use std::sync::Arc;

use assistant::{AssistantConfig, ReportAssistant, parse_sse_body};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header}
};
use chat_server::{AppState, build_assistant, create_router};
use context::{ContextBuilder, ContextBuilderConfig};
use report_core::{ContextSource, StreamEvent};
use serde_json::{Value, json};
use testing::{FailingRetriever, MockGateway, StaticEmbedder, sample_report};
use tower::ServiceExt;

fn app_with(gateway: Arc<MockGateway>, context: ContextBuilder) -> Router {
    let assistant = ReportAssistant::new(gateway, context, AssistantConfig::default());
    create_router(Arc::new(AppState::new(assistant, None)))
}

fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_empty_message_is_rejected_without_model_calls() {
    let gateway = Arc::new(MockGateway::new());
    let app = app_with(gateway.clone(), ContextBuilder::summary_only());

    let response = app
        .oneshot(chat_request(&json!({"message": "  ", "document": sample_report()})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"], "message");
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let gateway = Arc::new(MockGateway::new());
    let app = app_with(gateway.clone(), ContextBuilder::summary_only());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap()
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("BAD_REQUEST"));
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn test_edit_request_streams_sse_frames() {
    let gateway = Arc::new(MockGateway::new());
    gateway.push_chat_text(
        r#"{"intent":"edit","section":"positioning","field":"statement","desiredChange":"mention AI"}"#
    );
    gateway.push_stream(&[
        "Here is a sharper statement.\n",
        "```json\n{\"isEdit\": true, \"edits\": [{\"section\": \"positioning\", \"fieldPath\": \"statement\", ",
        "\"oldValue\": \"Fast dispatch\", \"newValue\": \"AI-first dispatch\", \"explanation\": \"AI focus\"}]}\n```"
    ]);
    let app = app_with(gateway, ContextBuilder::summary_only());

    let response = app
        .oneshot(chat_request(&json!({
            "message": "Make the positioning mention AI",
            "document": sample_report()
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let events = parse_sse_body(&body_string(response).await);
    assert_eq!(events[0], StreamEvent::text("Here is a sharper statement.\n"));
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Edits { pending_edits, .. } if pending_edits[0].new_value == json!("AI-first dispatch"))));
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    assert!(events.last().unwrap().is_done());
}

#[tokio::test]
async fn test_explain_request_returns_json() {
    let gateway = Arc::new(MockGateway::new());
    gateway.push_chat_text(r#"{"intent":"explain","section":"marketAnalysis","whatToExplain":"market size"}"#);
    gateway.push_chat_text(r#"{"explanation":"Bottom-up sizing from fleet counts.","confidence":"medium","relatedFactors":[]}"#);
    let app = app_with(gateway.clone(), ContextBuilder::summary_only());

    let response = app
        .oneshot(chat_request(&json!({
            "message": "Where does the $4.2B come from?",
            "document": sample_report()
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["isExplanation"], true);
    assert_eq!(body["response"], "Bottom-up sizing from fleet counts.");
    assert_eq!(gateway.stream_calls(), 0);
}

#[tokio::test]
async fn test_retrieval_failure_still_answers_from_summary() {
    let gateway = Arc::new(MockGateway::new());
    gateway.push_chat_text(r#"{"intent":"question"}"#);
    gateway.push_stream(&["Operations leads."]);
    let context = ContextBuilder::new(
        Arc::new(StaticEmbedder::default()),
        Arc::new(FailingRetriever::new()),
        ContextBuilderConfig::default()
    );
    let app = app_with(gateway, context);

    let response = app
        .oneshot(chat_request(&json!({
            "message": "Who is the target customer?",
            "document": sample_report(),
            "documentId": "doc-7"
        })))
        .await
        .unwrap();

    let events = parse_sse_body(&body_string(response).await);
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error { .. })));
    let Some(StreamEvent::Done(done)) = events.last() else {
        panic!("stream must end with done");
    };
    assert!(!done.error);
    assert_eq!(done.metadata.context_source, Some(ContextSource::Summary));
}

#[tokio::test]
async fn test_circuits_endpoint_lists_gateway_breaker() {
    let mut config = config::Config::default();
    config.circuit_breaker.failure_threshold = 4;
    let app = create_router(Arc::new(AppState::new(build_assistant(&config), None)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/circuits")
                .body(Body::empty())
                .unwrap()
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body[0]["name"], "model-gateway");
    assert_eq!(body[0]["state"], "CLOSED");
    assert_eq!(body[0]["failureThreshold"], 4);
    assert_eq!(body[1]["name"], "embedding-gateway");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app_with(Arc::new(MockGateway::new()), ContextBuilder::summary_only());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap()
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("healthy"));
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let app = app_with(Arc::new(MockGateway::new()), ContextBuilder::summary_only());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap()
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
