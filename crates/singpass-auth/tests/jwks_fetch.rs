//! Key set fetcher integration tests
//!
//! Runs the fetcher against a wiremock JWKS endpoint and temp files:
//! - source validation happens before any request
//! - transport failures (status, size cap) vs malformed bodies
//! - local key set files

mod common;

use std::io::Write;

use common::{MockJwksServer, TestEcKey, test_config};
use pretty_assertions::assert_eq;
use serde_json::json;
use singpass_auth::{FetchError, KeySetFetcher, KeySetSource, KeyStore};

#[tokio::test]
async fn test_fetch_returns_raw_entries_unchanged() {
    // GIVEN: a provider publishing a signing key and an encryption key
    let mock = MockJwksServer::start().await;
    let sig = TestEcKey::generate().jwk("sig-1");
    let mut enc = TestEcKey::generate().jwk("enc-1");
    enc["use"] = json!("enc");
    enc["x5t"] = json!("opaque-extension-member");
    mock.mock_jwks(vec![sig.clone(), enc.clone()], 1).await;

    // WHEN: fetching the key set
    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    let entries = fetcher
        .fetch_key_set(Some(&mock.jwks_endpoint))
        .await
        .unwrap();

    // THEN: entries come back exactly as published, unknown members included
    assert_eq!(entries, vec![sig, enc]);
}

#[tokio::test]
async fn test_default_source_uses_configured_endpoint() {
    let mock = MockJwksServer::start().await;
    mock.mock_jwks(vec![TestEcKey::generate().jwk("default")], 1)
        .await;

    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    let entries = fetcher.fetch_key_set(None).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kid"], "default");
}

#[tokio::test]
async fn test_invalid_source_makes_no_request() {
    // GIVEN: a mock endpoint that must never be hit
    let mock = MockJwksServer::start().await;
    mock.expect_no_requests().await;
    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();

    // WHEN / THEN: every unusable source is a caller error
    for source in ["not a url", "", "jwks.json", "ftp://127.0.0.1/jwks"] {
        let err = fetcher.fetch_key_set(Some(source)).await.unwrap_err();
        assert!(
            matches!(err, FetchError::InvalidSource(_)),
            "{source:?} gave {err:?}"
        );
    }
    // MockServer verifies expect(0) on drop
}

#[tokio::test]
async fn test_plain_http_rejected_for_remote_hosts() {
    let fetcher = KeySetFetcher::new(test_config("https://idp.example.com/jwks")).unwrap();
    let err = fetcher
        .fetch_key_set(Some("http://idp.example.com/jwks"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidSource(_)));
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let mock = MockJwksServer::start().await;
    mock.mock_raw(500, "internal error").await;

    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    let err = fetcher.fetch_key_set(None).await.unwrap_err();

    match err {
        FetchError::Transport { reason, .. } => assert!(reason.contains("500"), "{reason}"),
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let mock = MockJwksServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(
            wiremock::ResponseTemplate::new(302).insert_header("Location", "http://evil.example/jwks"),
        )
        .mount(&mock.server)
        .await;

    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    assert!(matches!(
        fetcher.fetch_key_set(None).await,
        Err(FetchError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let mock = MockJwksServer::start().await;
    mock.mock_raw(200, "<html>maintenance</html>").await;

    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    assert!(matches!(
        fetcher.fetch_key_set(None).await,
        Err(FetchError::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn test_missing_keys_member_is_malformed() {
    let mock = MockJwksServer::start().await;
    mock.mock_raw(200, r#"{"issuer":"https://idp.example.com"}"#)
        .await;

    let fetcher = KeySetFetcher::new(test_config(&mock.jwks_endpoint)).unwrap();
    let err = fetcher.fetch_key_set(None).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse { .. }));
    assert!(err.to_string().contains("keys"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mock = MockJwksServer::start().await;
    let padding = "x".repeat(4096);
    mock.mock_raw(200, format!(r#"{{"keys":[],"padding":"{padding}"}}"#))
        .await;

    let config = test_config(&mock.jwks_endpoint).with_max_response_size(1024);
    let fetcher = KeySetFetcher::new(config).unwrap();

    match fetcher.fetch_key_set(None).await.unwrap_err() {
        FetchError::Transport { reason, .. } => {
            assert!(reason.contains("maximum size"), "{reason}")
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_client() {
    let mock = MockJwksServer::start().await;
    mock.mock_jwks(vec![TestEcKey::generate().jwk("custom")], 1)
        .await;

    let client = reqwest::Client::builder()
        .user_agent("relying-party/1.0")
        .build()
        .unwrap();
    let fetcher = KeySetFetcher::with_client(client, test_config(&mock.jwks_endpoint));

    let entries = fetcher.fetch_key_set(None).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_file_source() {
    // GIVEN: a key set on disk
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let body = json!({ "keys": [TestEcKey::generate().jwk("on-disk")] });
    file.write_all(body.to_string().as_bytes()).unwrap();
    let source = url::Url::from_file_path(file.path()).unwrap().to_string();

    // WHEN: fetching through a file:// URL
    let fetcher = KeySetFetcher::new(test_config("https://idp.example.com/jwks")).unwrap();
    assert!(matches!(
        fetcher.parse_source(Some(&source)).unwrap(),
        KeySetSource::File(_)
    ));
    let entries = fetcher.fetch_key_set(Some(&source)).await.unwrap();

    // THEN: the entries build a usable store
    let store = KeyStore::from_key_set(&entries);
    assert!(store.contains("on-disk"));
}

#[tokio::test]
async fn test_absolute_path_source() {
    // GIVEN: a key set on disk, referenced by its plain path
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let body = json!({ "keys": [TestEcKey::generate().jwk("by-path")] });
    file.write_all(body.to_string().as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    // WHEN: fetching without a file:// scheme
    let fetcher = KeySetFetcher::new(test_config("https://idp.example.com/jwks")).unwrap();
    let entries = fetcher.fetch_key_set(Some(&path)).await.unwrap();

    // THEN: the file is read like any other local source
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kid"], "by-path");
}

#[tokio::test]
async fn test_missing_file_is_transport() {
    let dir = tempfile::tempdir().unwrap();
    let missing = url::Url::from_file_path(dir.path().join("absent.json"))
        .unwrap()
        .to_string();

    let fetcher = KeySetFetcher::new(test_config("https://idp.example.com/jwks")).unwrap();
    assert!(matches!(
        fetcher.fetch_key_set(Some(&missing)).await,
        Err(FetchError::Transport { .. })
    ));
}
