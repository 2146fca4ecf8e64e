//! Integration tests for the translation client against a scripted transport.

#[path = "../support/fake_transport.rs"]
mod support;

use std::collections::BTreeMap;
use std::time::Duration;

use bimigrate::connection::ConnectionInfo;
use bimigrate::translate::{
    Availability, ClientOptions, HttpResponse, HttpTransport, RetryPolicy, TranslateError,
    TranslationClient, TranslationRequest, TranslationResult,
};
use support::FakeTransport;

fn options(max_retries: u32) -> ClientOptions {
    ClientOptions {
        retry: RetryPolicy::new(max_retries, Duration::ZERO),
        entities: vec![
            ("&lt;".to_string(), "<".to_string()),
            ("&gt;".to_string(), ">".to_string()),
            ("&amp;".to_string(), "&".to_string()),
        ],
        ..ClientOptions::default()
    }
}

// ============================================================================
// Availability
// ============================================================================

#[tokio::test]
async fn test_failed_probe_short_circuits_without_posting() {
    let fake = FakeTransport::unreachable();
    let client = TranslationClient::connect(fake.clone(), options(2)).await;

    assert_eq!(client.availability(), Availability::Unavailable);
    assert_eq!(
        client.translate("SUM([Sales])", "Orders", None).await,
        TranslationResult::Unavailable
    );
    assert_eq!(
        client.generate_m_code(&ConnectionInfo::default()).await,
        TranslationResult::Unavailable
    );
    assert_eq!(fake.gets(), 1);
    assert_eq!(fake.posts(), 0);
}

#[tokio::test]
async fn test_non_success_health_is_unavailable() {
    let fake = FakeTransport::with_health(Ok(HttpResponse::new(503, "starting")));
    let client = TranslationClient::connect(fake.clone(), options(0)).await;
    assert!(!client.is_available());
}

#[tokio::test]
async fn test_reprobe_refreshes_availability() {
    let fake = FakeTransport::unreachable();
    let mut client = TranslationClient::connect(fake.clone(), options(0)).await;
    assert_eq!(client.availability(), Availability::Unavailable);

    fake.set_health(Ok(HttpResponse::new(200, "ok")));
    assert_eq!(client.reprobe().await, Availability::Available);

    fake.push_dax("SUM('Orders'[Sales])");
    assert!(client.translate("SUM([Sales])", "Orders", None).await.is_translated());
    assert_eq!(fake.gets(), 2);
}

#[tokio::test]
async fn test_unprobed_client_attempts_calls() {
    let fake = FakeTransport::healthy();
    fake.push_dax("1");
    let client = TranslationClient::new(fake.clone(), options(0));

    assert_eq!(client.availability(), Availability::Unknown);
    assert_eq!(
        client.translate("1", "T", None).await,
        TranslationResult::Translated("1".to_string())
    );
    assert_eq!(fake.gets(), 0);
}

#[tokio::test]
async fn test_unreachable_http_service_is_unavailable() {
    let transport = HttpTransport::new("http://127.0.0.1:9/").unwrap();
    assert_eq!(transport.base_url(), "http://127.0.0.1:9");

    let client = TranslationClient::connect(
        transport,
        ClientOptions {
            probe_timeout: Duration::from_secs(2),
            ..options(0)
        },
    )
    .await;
    assert_eq!(client.availability(), Availability::Unavailable);
}

// ============================================================================
// Requests and results
// ============================================================================

#[tokio::test]
async fn test_translation_is_unescaped() {
    let fake = FakeTransport::healthy();
    fake.push_dax("IF [a] &gt; 0 &amp;&amp; [b] &lt; 1 THEN 1 END");
    let client = TranslationClient::connect(fake.clone(), options(0)).await;

    let result = client.translate("IF [a] > 0 THEN 1 END", "Orders", None).await;
    assert_eq!(result.text(), Some("IF [a] > 0 && [b] < 1 THEN 1 END"));
}

#[tokio::test]
async fn test_request_body() {
    let fake = FakeTransport::healthy();
    fake.push_dax("x").push_dax("y");
    let client = TranslationClient::connect(fake.clone(), options(0)).await;

    let mut mappings = BTreeMap::new();
    mappings.insert("Calculation_2".to_string(), "Margin".to_string());
    client
        .translate("[Calculation_2] * 2", "Orders", Some(&mappings))
        .await;
    client.translate("1", "Orders", None).await;

    let posted = fake.posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].0, "/convert");
    assert_eq!(posted[0].1["formula"], "[Calculation_2] * 2");
    assert_eq!(posted[0].1["table_name"], "Orders");
    assert_eq!(posted[0].1["column_mappings"]["Calculation_2"], "Margin");
    assert!(posted[1].1.get("column_mappings").is_none());
}

#[tokio::test]
async fn test_m_code_request() {
    let fake = FakeTransport::healthy();
    fake.push_m_code("let Source = 1 in Source");
    let client = TranslationClient::connect(fake.clone(), options(0)).await;

    let info = ConnectionInfo {
        class_type: "sqlserver".to_string(),
        server: Some("db01".to_string()),
        table: Some("Orders".to_string()),
        ..ConnectionInfo::default()
    };
    let result = client.generate_m_code(&info).await;

    assert_eq!(result.into_text().as_deref(), Some("let Source = 1 in Source"));
    let posted = fake.posted();
    assert_eq!(posted[0].0, "/convert/tableau-to-m-code");
    assert_eq!(posted[0].1["class_type"], "sqlserver");
    assert_eq!(posted[0].1["server"], "db01");
}

#[tokio::test]
async fn test_explicit_retry_policy() {
    let fake = FakeTransport::healthy();
    fake.push_status(500, "boom").push_dax("ok");
    let client = TranslationClient::connect(fake.clone(), options(0)).await;

    let request = TranslationRequest::new("1", "T");
    let result = client
        .translate_with(&request, &RetryPolicy::new(1, Duration::ZERO))
        .await;
    assert!(result.is_translated());
    assert_eq!(fake.posts(), 2);
}

#[tokio::test]
async fn test_undecodable_success_body_fails_without_retry() {
    let fake = FakeTransport::healthy();
    fake.push_status(200, "not json");
    let client = TranslationClient::connect(fake.clone(), options(3)).await;

    let result = client.translate("1", "T", None).await;
    assert!(matches!(result, TranslationResult::Failed { status: None, .. }));
    assert_eq!(fake.posts(), 1);
}

// ============================================================================
// Retry bounds
// ============================================================================

#[tokio::test]
async fn test_retries_transient_failures() {
    let fake = FakeTransport::healthy();
    fake.push_status(503, "busy")
        .push(Err(TranslateError::Timeout(Duration::from_secs(30))))
        .push_dax("SUM([Sales])");
    let client = TranslationClient::connect(fake.clone(), options(2)).await;

    let result = client.translate("SUM([Sales])", "Orders", None).await;
    assert!(result.is_translated());
    assert_eq!(fake.posts(), 3);
}

#[tokio::test]
async fn test_retries_stop_at_max_retries() {
    let fake = FakeTransport::healthy();
    fake.otherwise(HttpResponse::new(502, "bad gateway"));
    let client = TranslationClient::connect(fake.clone(), options(2)).await;

    let result = client.translate("1", "T", None).await;
    assert_eq!(
        result,
        TranslationResult::Failed {
            status: Some(502),
            body: "bad gateway".to_string()
        }
    );
    assert_eq!(fake.posts(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let fake = FakeTransport::healthy();
    fake.otherwise(HttpResponse::new(422, "cannot parse formula"));
    let client = TranslationClient::connect(fake.clone(), options(5)).await;

    let result = client.translate("IIF(", "T", None).await;
    assert!(matches!(result, TranslationResult::Failed { status: Some(422), .. }));
    assert_eq!(fake.posts(), 1);
}

#[tokio::test]
async fn test_backoff_is_applied_between_retries() {
    let fake = FakeTransport::healthy();
    fake.push_status(500, "").push_dax("ok");
    let client = TranslationClient::connect(
        fake.clone(),
        ClientOptions {
            retry: RetryPolicy::new(1, Duration::from_millis(40)),
            ..options(0)
        },
    )
    .await;

    let started = std::time::Instant::now();
    assert!(client.translate("1", "T", None).await.is_translated());
    assert!(started.elapsed() >= Duration::from_millis(40));
}
