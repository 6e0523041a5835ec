use delve_common::{SearchError, SearchResult};
use delve_web::{GoogleSearchClient, SearchProvider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/customsearch/v1";

fn client(server: &MockServer) -> GoogleSearchClient {
    GoogleSearchClient::new(&format!("{}{SEARCH_PATH}", server.uri()), "AIza_test", "engine-1")
        .expect("client builds")
}

#[tokio::test]
async fn sends_key_engine_query_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("key", "AIza_test"))
        .and(query_param("cx", "engine-1"))
        .and(query_param("q", "document databases"))
        .and(query_param("num", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "title": "X", "link": "http://y", "snippet": "..." }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hits = client(&server).search("document databases").await.unwrap();
    assert_eq!(
        hits,
        vec![SearchResult {
            title: "X".into(),
            url: "http://y".into()
        }]
    );
}

#[tokio::test]
async fn zero_items_is_an_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchInformation": { "totalResults": "0" }
        })))
        .mount(&server)
        .await;

    let hits = client(&server).search("zzqqxx").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn preserves_provider_order() {
    let server = MockServer::start().await;
    let items: Vec<_> = (1..=7)
        .map(|i| json!({ "title": format!("t{i}"), "link": format!("https://e.test/{i}") }))
        .collect();
    Mock::given(method("GET"))
        .and(query_param("num", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(&server)
        .await;

    let hits = client(&server).with_num(7).search("q").await.unwrap();
    let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, ["t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
}

#[tokio::test]
async fn nested_error_message_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid. Please pass a valid API key." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search("q").await.unwrap_err();
    match err {
        SearchError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("API key not valid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search("q").await.unwrap_err();
    match err {
        SearchError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "HTTP 503: Service Unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let err = client(&server).search("q").await.unwrap_err();
    assert!(matches!(err, SearchError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let server = MockServer::start().await;
    let endpoint = format!("{}{SEARCH_PATH}", server.uri());
    drop(server);

    let err = GoogleSearchClient::new(&endpoint, "k", "cx")
        .unwrap()
        .search("q")
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Transport(_)), "{err:?}");
}
