use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use marketlens::config::AppConfig;
use marketlens::credentials::{CredentialBundle, FacebookCredentials, GoogleCredentials, TokenCipher};
use marketlens::source::Platform;
use marketlens::store::Store;
use mockito::Server;
use serde_json::{json, Value};
use std::sync::Arc;
use sync_manager::{
    create_sync_router, ConnectorRegistry, SourceLocks, SyncAppState, SyncCoordinator,
    SyncServices,
};
use tower::ServiceExt;

fn cipher() -> TokenCipher {
    TokenCipher::from_key_bytes(&[9u8; 32]).unwrap()
}

fn create_test_app(store: Arc<Store>, analytics_url: &str) -> Router {
    let mut config = AppConfig::default();
    config.google.analytics_data_url = analytics_url.to_string();
    config.sync.retry_base_delay_ms = 1;

    let services = Arc::new(SyncServices::new(store.clone(), cipher(), &config));
    let registry = ConnectorRegistry::from_services(&services, config.sync.default_window_days);
    let coordinator = Arc::new(SyncCoordinator::new(
        store.clone(),
        registry,
        Arc::new(SourceLocks::new()),
    ));

    create_sync_router(SyncAppState {
        store,
        services,
        coordinator,
        default_window_days: config.sync.default_window_days,
    })
}

fn seed_google(store: &Store, user_id: &str, property: Option<&str>) -> String {
    let cipher = cipher();
    store
        .upsert_source(
            user_id,
            Platform::GoogleAnalytics,
            &CredentialBundle::Google(GoogleCredentials {
                access_token: cipher.encrypt("ga-access").unwrap(),
                refresh_token: None,
                expires_at: None,
                token_type: "Bearer".into(),
                property_id: property.map(str::to_string),
            }),
        )
        .unwrap()
        .id
}

fn seed_facebook(store: &Store, user_id: &str) -> String {
    let cipher = cipher();
    store
        .upsert_source(
            user_id,
            Platform::FacebookInstagram,
            &CredentialBundle::Facebook(FacebookCredentials {
                access_token: cipher.encrypt("user").unwrap(),
                refresh_token: None,
                expires_at: None,
                token_type: "bearer".into(),
                page_id: "page-1".into(),
                page_name: "Page".into(),
                page_access_token: cipher.encrypt("page").unwrap(),
                instagram_account_id: None,
                available_pages: Vec::new(),
            }),
        )
        .unwrap()
        .id
}

async fn send(app: Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("authorization", format!("Bearer {}", user));
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_requires_identity() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(app, "POST", "/api/sync", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_sync_all_with_no_sources() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(app, "POST", "/api/sync", Some("user-1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "total_sources": 0, "success_count": 0, "failure_count": 0, "results": [] })
    );
}

#[tokio::test]
async fn test_set_property_checks_ownership() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", None);
    let uri = format!("/api/sources/{}/google-analytics/property", source_id);

    let app = create_test_app(store.clone(), "http://unused.test");
    let (status, body) = send(
        app.clone(),
        "PUT",
        &uri,
        Some("user-2"),
        Some(json!({ "property_id": "properties/77" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "source_not_found");

    let (status, _) = send(
        app,
        "PUT",
        &uri,
        Some("user-1"),
        Some(json!({ "property_id": "properties/77" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let source = store.get_source(&source_id).unwrap().unwrap();
    assert_eq!(
        source.credentials.as_google().unwrap().property_id.as_deref(),
        Some("properties/77")
    );
}

#[tokio::test]
async fn test_set_property_on_facebook_source() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_facebook(&store, "user-1");
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "PUT",
        &format!("/api/sources/{}/google-analytics/property", source_id),
        Some("user-1"),
        Some(json!({ "property_id": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "credential_mismatch");
}

#[tokio::test]
async fn test_ga_sync_without_property() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", None);
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/sources/{}/google-analytics/sync", source_id),
        Some("user-1"),
        Some(json!({ "start_date": "2024-01-01", "end_date": "2024-01-31" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_configuration");
    assert!(body["message"].as_str().unwrap().contains("property"));
}

#[tokio::test]
async fn test_facebook_sync_rejects_non_positive_days() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_facebook(&store, "user-1");
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/sources/{}/facebook/sync", source_id),
        Some("user-1"),
        Some(json!({ "days": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_date_range");
}

#[tokio::test]
async fn test_facebook_sync_rejects_oversized_days() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_facebook(&store, "user-1");
    let app = create_test_app(store, "http://unused.test");
    let uri = format!("/api/sources/{}/facebook/sync", source_id);

    for days in [3651i64, 200_000_000, i64::MAX] {
        let (status, body) = send(
            app.clone(),
            "POST",
            &uri,
            Some("user-1"),
            Some(json!({ "days": days })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "days = {}", days);
        assert_eq!(body["error"], "invalid_date_range");
        assert!(body["message"].as_str().unwrap().contains("3650"));
    }
}

#[tokio::test]
async fn test_ga_sync_rejects_century_range() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", Some("55"));
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/sources/{}/google-analytics/sync", source_id),
        Some("user-1"),
        Some(json!({ "start_date": "2000-01-01", "end_date": "2100-12-31" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_date_range");
}

#[tokio::test]
async fn test_single_source_sync_of_unsupported_platform() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = store
        .upsert_source(
            "user-1",
            Platform::GoogleAds,
            &CredentialBundle::Google(GoogleCredentials {
                access_token: "enc".into(),
                refresh_token: None,
                expires_at: None,
                token_type: "Bearer".into(),
                property_id: None,
            }),
        )
        .unwrap()
        .id;
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/sources/{}/sync", source_id),
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_platform");
}

#[tokio::test]
async fn test_refresh_not_needed() {
    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", Some("1"));
    let app = create_test_app(store, "http://unused.test");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/sources/{}/refresh", source_id),
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "refreshed": false }));
}

#[tokio::test]
async fn test_realtime_report() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/properties/55:runRealtimeReport")
        .match_header("authorization", "Bearer ga-access")
        .with_status(200)
        .with_body(r#"{"rows":[{"metricValues":[{"value":"12"}]}]}"#)
        .create_async()
        .await;

    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", Some("properties/55"));
    let app = create_test_app(store, &server.url());

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/sources/{}/google-analytics/realtime", source_id),
        Some("user-1"),
        None,
    )
    .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "active_users": 12.0 }));
}

#[tokio::test]
async fn test_provider_failure_maps_to_bad_gateway() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/properties/55:runReport")
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"status":"PERMISSION_DENIED"}}"#)
        .create_async()
        .await;

    let store = Arc::new(Store::open(":memory:").unwrap());
    let source_id = seed_google(&store, "user-1", Some("55"));
    let app = create_test_app(store, &server.url());

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/sources/{}/google-analytics/top-pages?limit=5", source_id),
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "provider_error");
}
