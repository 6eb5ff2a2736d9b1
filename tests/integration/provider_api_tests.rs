/*!
 * OpenRouter client tests against a local HTTP server.
 *
 * The server answers every request with one canned response and records
 * the raw requests so headers and bodies can be checked.
 */

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quillsync::errors::{CancelReason, ProviderError};
use quillsync::providers::{CompletionProvider, CompletionRequest, OpenRouter};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::common::{CannedResponse, MockHttpServer};

const COMPLETION: &str = r#"{"id": "gen-1", "choices": [{"message": {"role": "assistant", "content": "Lin Dong walked into the valley."}}]}"#;

fn client_for(server: &MockHttpServer) -> OpenRouter {
    OpenRouter::new("sk-test", "vendor/model").with_base_url(format!("{}/", server.base_url))
}

fn request_body(raw: &str) -> Value {
    let (_, body) = raw.split_once("\r\n\r\n").expect("request has a body");
    serde_json::from_str(body).expect("request body is JSON")
}

#[tokio::test]
async fn test_complete_withSuccess_shouldSendHeadersAndReturnContent() {
    let server = MockHttpServer::start(CannedResponse::json(200, COMPLETION)).await;
    let client = client_for(&server);

    let text = client
        .complete(
            CompletionRequest::new("Translate: 林动走进了山谷").temperature(0.3).max_tokens(4000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(text, "Lin Dong walked into the valley.");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let raw = &requests[0];
    assert!(raw.starts_with("POST /chat/completions "));
    let head = raw.to_lowercase();
    assert!(head.contains("authorization: bearer sk-test"));
    assert!(head.contains("http-referer: https://quillsyncai.com"));
    assert!(head.contains("x-title: quillsync ai"));

    let body = request_body(raw);
    assert_eq!(body["model"], "vendor/model");
    assert_eq!(body["stream"], false);
    assert_eq!(body["max_tokens"], 4000);
    assert_eq!(body["transforms"][0], "middle-out");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Translate: 林动走进了山谷");
}

#[tokio::test]
async fn test_complete_withRequestModel_shouldOverrideConfiguredModel() {
    let server = MockHttpServer::start(CannedResponse::json(200, COMPLETION)).await;
    let client = client_for(&server);

    client
        .complete(
            CompletionRequest::new("hi").model("other/model").max_tokens(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let body = request_body(&server.requests()[0]);
    assert_eq!(body["model"], "other/model");
    // Budgets below the floor are raised
    assert_eq!(body["max_tokens"], 100);
}

#[tokio::test]
async fn test_complete_streaming_withEventStream_shouldReportGrowingText() {
    let stream = concat!(
        ": OPENROUTER PROCESSING\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Lin \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Dong\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let server = MockHttpServer::start(CannedResponse::event_stream(stream)).await;
    let client = client_for(&server);
    let seen = Mutex::new(Vec::new());

    let text = client
        .complete_streaming(
            CompletionRequest::new("林动"),
            &CancellationToken::new(),
            &|partial: &str| seen.lock().push(partial.to_string()),
        )
        .await
        .unwrap();

    assert_eq!(text, "Lin Dong");
    assert_eq!(*seen.lock(), vec!["Lin ".to_string(), "Lin Dong".to_string()]);
    assert_eq!(request_body(&server.requests()[0])["stream"], true);
}

#[tokio::test]
async fn test_complete_streaming_withSteadyStreamLongerThanDeadline_shouldFinish() {
    let events = [
        "data: {\"choices\":[{\"delta\":{\"content\":\"Lin \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Dong \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"walked.\"}}]}\n\n",
        "data: [DONE]\n\n",
    ];
    let server = MockHttpServer::start(CannedResponse::paced_event_stream(&events, Duration::from_millis(150))).await;
    let client = client_for(&server).with_timeouts(Duration::from_millis(400), Duration::from_millis(400));

    let text = client
        .complete_streaming(CompletionRequest::new("林动"), &CancellationToken::new(), &|_: &str| {})
        .await
        .unwrap();

    assert_eq!(text, "Lin Dong walked.");
}

#[tokio::test]
async fn test_complete_streaming_withStalledStream_shouldTimeOut() {
    let events = [
        "data: {\"choices\":[{\"delta\":{\"content\":\"Lin \"}}]}\n\n",
        "data: [DONE]\n\n",
    ];
    let server = MockHttpServer::start(CannedResponse::paced_event_stream(&events, Duration::from_secs(5))).await;
    let client = client_for(&server).with_timeouts(Duration::from_millis(150), Duration::from_millis(150));
    let seen = Mutex::new(Vec::new());

    let result = client
        .complete_streaming(
            CompletionRequest::new("林动"),
            &CancellationToken::new(),
            &|partial: &str| seen.lock().push(partial.to_string()),
        )
        .await;

    assert!(matches!(
        result,
        Err(ProviderError::Cancelled {
            reason: CancelReason::TimedOut
        })
    ));
    assert_eq!(*seen.lock(), vec!["Lin ".to_string()]);
}

#[tokio::test]
async fn test_complete_withErrorStatuses_shouldClassify() {
    let cases = [
        (401, r#"{"error": {"message": "Invalid API key"}}"#),
        (429, r#"{"error": {"message": "Too many requests"}}"#),
        (400, r#"{"error": {"message": "This model's maximum context length is 8192 tokens"}}"#),
        (500, "upstream exploded"),
    ];

    for (status, body) in cases {
        let server = MockHttpServer::start(CannedResponse::json(status, body)).await;
        let result = client_for(&server)
            .complete(CompletionRequest::new("hi"), &CancellationToken::new())
            .await;

        let error = result.unwrap_err();
        match status {
            401 => assert!(matches!(error, ProviderError::Authentication(ref m) if m == "Invalid API key")),
            429 => assert!(matches!(error, ProviderError::RateLimitExceeded(_))),
            400 => assert!(matches!(error, ProviderError::ContextTooLarge(_))),
            _ => assert!(matches!(
                error,
                ProviderError::ApiError { status_code: 500, ref message } if message == "upstream exploded"
            )),
        }
    }
}

#[tokio::test]
async fn test_complete_withMalformedBody_shouldFailAsMalformed() {
    let server = MockHttpServer::start(CannedResponse::json(200, r#"{"choices": []}"#)).await;

    let result = client_for(&server)
        .complete(CompletionRequest::new("hi"), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_complete_withSlowServer_shouldTimeOut() {
    let server =
        MockHttpServer::start(CannedResponse::json(200, COMPLETION).delayed(Duration::from_secs(5))).await;
    let client = client_for(&server).with_timeouts(Duration::from_millis(100), Duration::from_millis(100));

    let result = client
        .complete(CompletionRequest::new("hi"), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(ProviderError::Cancelled {
            reason: CancelReason::TimedOut
        })
    ));
}

#[tokio::test]
async fn test_cancel_withRequestInFlight_shouldAbortAsUserCancelled() {
    let server =
        MockHttpServer::start(CannedResponse::json(200, COMPLETION).delayed(Duration::from_secs(5))).await;
    let client = Arc::new(client_for(&server));

    let running = client.clone();
    let handle = tokio::spawn(async move {
        running
            .complete(CompletionRequest::new("hi"), &CancellationToken::new())
            .await
    });

    while server.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    client.cancel();

    let result = handle.await.unwrap();
    let error = result.unwrap_err();
    assert!(error.is_user_cancellation());
}

#[tokio::test]
async fn test_complete_withoutKey_shouldNotCallServer() {
    let server = MockHttpServer::start(CannedResponse::json(200, COMPLETION)).await;
    let client = OpenRouter::new("", "vendor/model").with_base_url(server.base_url.clone());

    let result = client
        .complete(CompletionRequest::new("hi"), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ProviderError::Config(_))));
    assert!(!client.is_configured());
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_list_models_withListing_shouldNormalizeAndCount() {
    let listing = r#"{"data": [
        {"id": "anthropic/claude-3-haiku", "name": "Claude 3 Haiku", "pricing": {"prompt": "0.25", "completion": "1.25"}, "context_length": 200000},
        {"id": "openai/gpt-4o", "name": "GPT-4o", "pricing": {"prompt": "5", "completion": "15"}}
    ]}"#;
    let server = MockHttpServer::start(CannedResponse::json(200, listing)).await;
    let client = client_for(&server);

    let models = client.list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    let haiku = models.iter().find(|m| m.id == "anthropic/claude-3-haiku").unwrap();
    assert_eq!(haiku.pricing.prompt, 0.25);
    assert_eq!(haiku.context_length, Some(200000));

    assert_eq!(client.test_connection().await.unwrap(), 2);
    let requests = server.requests();
    assert!(requests.iter().all(|r| r.starts_with("GET /models ")));
}
