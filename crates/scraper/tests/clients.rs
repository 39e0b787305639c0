//! HTTP client tests against wiremock servers.

use std::time::Duration;

use assert_matches::assert_matches;
use relwatch_core::strategy::{ContentMode, ScrapingStrategy};
use relwatch_scraper::{
    AcquireError, AcquisitionSource, AnthropicConfig, AnthropicProvider, BrowserClient,
    BrowserConfig, CompletionProvider, ContentAcquirer, LlmError, StaticFetcher,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn browser(server: &MockServer) -> BrowserClient {
    BrowserClient::new(BrowserConfig {
        endpoint: server.uri(),
        token: Some("secret-token".to_string()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn fetcher() -> StaticFetcher {
    StaticFetcher::new(Duration::from_secs(5)).unwrap()
}

fn anthropic(server: &MockServer) -> AnthropicProvider {
    let mut config = AnthropicConfig::new("test-key");
    config.base_url = server.uri();
    config.model = "test-model".to_string();
    AnthropicProvider::new(config).unwrap()
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

#[tokio::test]
async fn browser_posts_script_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/function"))
        .and(query_param("token", "secret-token"))
        .and(header("content-type", "application/javascript"))
        .and(body_string_contains("page.goto(\"https://vendor.example/releases\""))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>4.3</html>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let content = acquirer
        .acquire("https://vendor.example/releases", &ScrapingStrategy::default())
        .await
        .unwrap();

    assert_eq!(content.content, "<html>4.3</html>");
    assert_eq!(content.source, AcquisitionSource::Browser);
    assert_eq!(content.mode, ContentMode::Html);
}

#[tokio::test]
async fn browser_markup_is_reduced_to_body_text_for_extraction() {
    let server = MockServer::start().await;
    let html = format!(
        "<html><head><script>{}</script><style>h1 {{ color: red }}</style></head>\
         <body><h1>Version 9.9.9</h1><p>Released today</p></body></html>",
        "var x = 1;".repeat(6_400)
    );
    Mock::given(method("POST"))
        .and(path("/function"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.clone(), "text/html"))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let page = acquirer
        .acquire_with_fallback("https://vendor.example/releases", &ScrapingStrategy::default())
        .await
        .unwrap();

    assert_eq!(page.source, AcquisitionSource::Browser);
    assert_eq!(page.mode, ContentMode::Html);
    assert_eq!(page.content, html);
    assert_eq!(page.extraction_text(), "Version 9.9.9 Released today");
}

#[tokio::test]
async fn browser_text_mode_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/function"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<b>literal</b> 1.0", "text/plain"))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let page = acquirer
        .acquire("https://vendor.example", &ScrapingStrategy::default())
        .await
        .unwrap();

    assert_eq!(page.mode, ContentMode::Text);
    assert_eq!(page.extraction_text(), "<b>literal</b> 1.0");
}

#[tokio::test]
async fn browser_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/function"))
        .respond_with(ResponseTemplate::new(408).set_body_string("timeout"))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let err = acquirer
        .acquire("https://vendor.example", &ScrapingStrategy::default())
        .await
        .unwrap_err();
    assert_matches!(err, AcquireError::Api { status: 408, .. });
}

#[tokio::test]
async fn acquire_without_browser_is_not_configured() {
    let acquirer = ContentAcquirer::new(None, fetcher());
    let err = acquirer
        .acquire("https://vendor.example", &ScrapingStrategy::default())
        .await
        .unwrap_err();
    assert_matches!(err, AcquireError::NotConfigured(_));
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fallback_uses_static_fetch_when_browser_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/function"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><h2>Version 2.1.0</h2><script>x()</script></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let url = format!("{}/releases", server.uri());
    let content = acquirer
        .acquire_with_fallback(&url, &ScrapingStrategy::default())
        .await
        .unwrap();

    assert_eq!(content.source, AcquisitionSource::Static);
    assert_eq!(content.mode, ContentMode::Text);
    assert_eq!(content.content, "Version 2.1.0");
}

#[tokio::test]
async fn fallback_when_browser_markup_has_no_visible_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/function"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><script>boot()</script></head><body><noscript>Enable JS</noscript></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>3.0.1</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(Some(browser(&server)), fetcher());
    let url = format!("{}/releases", server.uri());
    let content = acquirer
        .acquire_with_fallback(&url, &ScrapingStrategy::default())
        .await
        .unwrap();

    assert_eq!(content.source, AcquisitionSource::Static);
    assert_eq!(content.content, "3.0.1");
}

#[tokio::test]
async fn no_browser_goes_straight_to_static() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>1.0</p>", "text/html"))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(None, fetcher());
    let content = acquirer
        .acquire_with_fallback(&server.uri(), &ScrapingStrategy::default())
        .await
        .unwrap();
    assert_eq!(content.source, AcquisitionSource::Static);
    assert_eq!(content.content, "1.0");
}

#[tokio::test]
async fn static_error_propagates_when_both_paths_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let acquirer = ContentAcquirer::new(None, fetcher());
    let err = acquirer
        .acquire_with_fallback(&server.uri(), &ScrapingStrategy::default())
        .await
        .unwrap_err();
    assert_matches!(err, AcquireError::Api { status: 404, .. });
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anthropic_sends_headers_and_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_string_contains("\"model\":\"test-model\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "[{\"version\": "},
                {"type": "text", "text": "\"1.2.3\"}]"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = anthropic(&server).complete("find versions").await.unwrap();
    assert_eq!(reply, "[{\"version\": \"1.2.3\"}]");
}

#[tokio::test]
async fn anthropic_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let err = anthropic(&server).complete("x").await.unwrap_err();
    assert_matches!(err, LlmError::RateLimited { retry_after_secs: Some(12) });
}

#[tokio::test]
async fn anthropic_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = anthropic(&server).complete("x").await.unwrap_err();
    assert_matches!(err, LlmError::Api { status: 529, ref body } if body == "overloaded");
}

#[test]
fn anthropic_requires_api_key() {
    assert_matches!(
        AnthropicProvider::new(AnthropicConfig::new("  ")),
        Err(LlmError::NotConfigured(_))
    );
}
