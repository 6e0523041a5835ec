mod common;

use delve_common::{Backoff, InferenceError, NO_RESPONSE_SENTINEL};
use delve_http::RecordingSleeper;
use delve_llm::inference::HfInferenceClient;
use delve_llm::sanitize::{Sanitizer, SubstitutionPreset};
use delve_llm::traits::TextGenerator;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/google/flan-t5-base";

fn client(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> HfInferenceClient {
    HfInferenceClient::new(&format!("{}{MODEL_PATH}", server.uri()), "hf_test")
        .expect("client builds")
        .with_sleeper(sleeper)
}

fn loading() -> ResponseTemplate {
    ResponseTemplate::new(503).set_body_json(json!({
        "error": "Model google/flan-t5-base is currently loading",
        "estimated_time": 20.0
    }))
}

#[tokio::test]
async fn sends_prompt_parameters_and_bearer() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_partial_json(json!({
            "inputs": "Describe sharding",
            "parameters": { "max_new_tokens": 250, "top_p": 0.9, "early_stopping": true }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "Sharding splits data." }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("Describe sharding", 3)
        .await
        .unwrap();
    assert_eq!(text, "Sharding splits data.");
}

#[tokio::test]
async fn echoed_prompt_is_stripped() {
    let server = MockServer::start().await;
    let prompt = "Summarize \"MongoDB\" briefly";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_text": format!("{prompt}  It is a document store.")
        })))
        .mount(&server)
        .await;

    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .generate(prompt, 3)
        .await
        .unwrap();
    assert!(!text.starts_with(prompt));
    assert_eq!(text, "It is a document store.");
}

#[tokio::test]
async fn cleanup_does_not_put_the_prompt_back_in_front() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "NoSQL databases scale out" }])),
        )
        .mount(&server)
        .await;

    // after the echo goes, `SQL` is rewritten to `NoSQL`
    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("No", 3)
        .await
        .unwrap();
    assert!(!text.starts_with("No"), "{text}");
    assert_eq!(text, "SQL databases scale out");
}

#[tokio::test]
async fn literal_prompt_prefix_is_never_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": "ab abc is great" }])),
        )
        .mount(&server)
        .await;

    let plain = Arc::new(Sanitizer::with_preset(SubstitutionPreset::None).unwrap());
    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .with_sanitizer(plain)
        .generate("ab", 3)
        .await
        .unwrap();
    assert!(!text.starts_with("ab"), "{text}");
    assert!(text.ends_with(" is great"), "{text}");
}

#[tokio::test]
async fn empty_generation_yields_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": "" }])))
        .mount(&server)
        .await;

    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("anything", 3)
        .await
        .unwrap();
    assert_eq!(text, NO_RESPONSE_SENTINEL);
}

#[tokio::test]
async fn unrecognized_body_yields_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "summary_text": "x" })))
        .mount(&server)
        .await;

    let text = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("anything", 3)
        .await
        .unwrap();
    assert_eq!(text, NO_RESPONSE_SENTINEL);
}

#[tokio::test]
async fn recovers_after_three_cold_starts() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "Warm <b>now</b> [1]" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let text = client(&server, sleeper.clone())
        .generate("wake up", 3)
        .await
        .unwrap();

    assert_eq!(text, "Warm now");
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(15)
        ]
    );
}

#[tokio::test]
async fn fixed_backoff_waits_the_same_each_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generated_text": "ok" })))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let text = client(&server, sleeper.clone())
        .with_backoff(Backoff::Fixed { ms: 2_000 })
        .generate("p", 3)
        .await
        .unwrap();

    assert_eq!(text, "ok");
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(2); 2]);
}

#[tokio::test]
async fn zero_retries_fails_on_first_503_without_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let err = client(&server, sleeper.clone())
        .generate("p", 0)
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::ModelUnavailable(_)), "{err:?}");
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn exhausted_retries_report_model_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .expect(4)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let err = client(&server, sleeper.clone())
        .generate("p", 3)
        .await
        .unwrap_err();

    match err {
        InferenceError::ModelUnavailable(msg) => assert!(msg.contains("currently loading")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sleeper.delays().len(), 3);
}

#[tokio::test]
async fn api_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Input validation error" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("p", 3)
        .await
        .unwrap_err();

    match err {
        InferenceError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Input validation error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_status_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("<html>denied</html>"))
        .mount(&server)
        .await;

    let err = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("p", 3)
        .await
        .unwrap_err();

    match err {
        InferenceError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "HTTP 401: Unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("gateway says hi"))
        .mount(&server)
        .await;

    let err = client(&server, Arc::new(RecordingSleeper::new()))
        .generate("p", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn connection_failure_is_wrapped() {
    let server = MockServer::start().await;
    let endpoint = format!("{}{MODEL_PATH}", server.uri());
    drop(server);

    let err = HfInferenceClient::new(&endpoint, "hf_test")
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .generate("p", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn default_retry_budget_comes_from_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(&server, sleeper.clone()).with_max_retries(1);
    let err = client.generate_default("p").await.unwrap_err();

    assert!(matches!(err, InferenceError::ModelUnavailable(_)));
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5)]);
    assert_eq!(client.model_name(), "google/flan-t5-base");
}
