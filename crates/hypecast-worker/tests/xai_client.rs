//! Chat-completions client against a mocked endpoint.

use std::time::Duration;

use hypecast_worker::{GenerativeConfig, GenerativeModel, Prompt, WorkerError, XaiClient};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer, models: &[&str]) -> XaiClient {
    XaiClient::new(GenerativeConfig {
        api_url: server.uri(),
        api_key: "xai-test".into(),
        models: models.iter().map(|m| m.to_string()).collect(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

#[tokio::test]
async fn test_complete_sends_bearer_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer xai-test"))
        .and(body_partial_json(json!({"model": "grok-a"})))
        .respond_with(completion("  Strong community. INVEST  "))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server, &["grok-a"])
        .complete(&Prompt::new("sys", "analyze PEPE"))
        .await
        .unwrap();

    assert_eq!(text, "Strong community. INVEST");
}

#[tokio::test]
async fn test_falls_back_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "grok-a"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "grok-b"})))
        .respond_with(completion("DO NOT INVEST"))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server, &["grok-a", "grok-b"])
        .complete(&Prompt::new("sys", "analyze PEPE"))
        .await
        .unwrap();
    assert_eq!(text, "DO NOT INVEST");

    let models: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["model"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(models, vec!["grok-a", "grok-b"]);
}

#[tokio::test]
async fn test_empty_choices_is_analysis_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server, &["grok-a"])
        .complete(&Prompt::new("sys", "analyze PEPE"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::AnalysisFailed(_)));
}

#[tokio::test]
async fn test_image_is_sent_as_content_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image_url", "image_url": {"url": "https://img.example.com/logo.png"}}
                ]}
            ]
        })))
        .respond_with(completion("INVEST"))
        .expect(1)
        .mount(&server)
        .await;

    let prompt = Prompt::new("sys", "look").with_image(Some("https://img.example.com/logo.png".into()));
    let text = client_for(&server, &["grok-a"]).complete(&prompt).await.unwrap();
    assert_eq!(text, "INVEST");
}
