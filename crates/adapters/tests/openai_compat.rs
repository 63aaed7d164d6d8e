use serde_json::json;
use story_adapters::{create_llm_adapter_from_profile, Credential, LlmConfig};
use story_core::ChatMessage;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn local_profile(base_url: String) -> LlmConfig {
    LlmConfig {
        base_url,
        interface_format: "OpenAI".into(),
        model_name: "gpt-3.5-turbo".into(),
        timeout: 5,
        ..LlmConfig::default()
    }
}

fn story_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a story planner."),
        ChatMessage::user("Create a plot outline for this request: a heist"),
    ]
}

// The blocking client owns its own runtime, so it is built and used off the
// async executor.
async fn invoke_blocking(profile: LlmConfig) -> Result<String, String> {
    tokio::task::spawn_blocking(move || {
        let adapter = create_llm_adapter_from_profile(&profile, &Credential::new("sk-test"))
            .map_err(|err| err.to_string())?;
        adapter
            .invoke(&story_messages())
            .map_err(|err| err.to_string())
    })
    .await
    .expect("blocking task panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_chat_request_and_trims_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 300,
            "top_p": 1.0,
            "messages": [
                {"role": "system", "content": "You are a story planner."},
                {"role": "user", "content": "Create a plot outline for this request: a heist"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "\n  Act I: the vault.  \n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = invoke_blocking(local_profile(server.uri())).await;

    assert_eq!(reply.unwrap(), "Act I: the vault.");
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_reported_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = invoke_blocking(local_profile(server.uri()))
        .await
        .expect_err("429 is a failure");

    assert!(err.contains("429"), "{err}");
    assert!(err.contains("quota exceeded"), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn reply_without_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = invoke_blocking(local_profile(server.uri()))
        .await
        .expect_err("no choices");

    assert!(err.contains("empty response"), "{err}");
}
