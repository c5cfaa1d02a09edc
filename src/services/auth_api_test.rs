use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> AuthApi {
    AuthApi::with_client(reqwest::Client::new(), &server.uri(), Duration::from_millis(300))
}

// =============================================================================
// TokenPair parsing
// =============================================================================

#[test]
fn token_pair_accepts_snake_case() {
    let pair = TokenPair::from_json(&json!({ "access_token": "a", "refresh_token": "r" })).unwrap();
    assert_eq!(pair, TokenPair { access_token: "a".into(), refresh_token: "r".into() });
}

#[test]
fn token_pair_accepts_camel_case() {
    let pair = TokenPair::from_json(&json!({ "accessToken": "a", "refreshToken": "r" })).unwrap();
    assert_eq!(pair, TokenPair { access_token: "a".into(), refresh_token: "r".into() });
}

#[test]
fn token_pair_accepts_mixed_naming() {
    let pair = TokenPair::from_json(&json!({ "access_token": "a", "refreshToken": "r" })).unwrap();
    assert_eq!(pair.access_token, "a");
    assert_eq!(pair.refresh_token, "r");
}

#[test]
fn token_pair_prefers_snake_case_when_both_present() {
    let pair = TokenPair::from_json(&json!({
        "access_token": "snake",
        "accessToken": "camel",
        "refresh_token": "r",
    }))
    .unwrap();
    assert_eq!(pair.access_token, "snake");
}

#[test]
fn token_pair_missing_refresh_token_fails() {
    let err = TokenPair::from_json(&json!({ "access_token": "a" })).unwrap_err();
    assert_eq!(err, AuthApiError::MissingTokens);
}

#[test]
fn token_pair_empty_token_counts_as_missing() {
    let err = TokenPair::from_json(&json!({ "access_token": "", "refresh_token": "r" })).unwrap_err();
    assert_eq!(err, AuthApiError::MissingTokens);
}

#[test]
fn token_pair_non_object_fails_to_parse() {
    let err = TokenPair::from_json(&json!("nope")).unwrap_err();
    assert!(matches!(err, AuthApiError::Parse(_)));
}

// =============================================================================
// refresh
// =============================================================================

#[tokio::test]
async fn refresh_posts_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "refresh_token": "r-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "a-2", "refreshToken": "r-2" })))
        .expect(1)
        .mount(&server)
        .await;

    let pair = api(&server).refresh("r-1").await.unwrap();
    assert_eq!(pair, TokenPair { access_token: "a-2".into(), refresh_token: "r-2".into() });
}

#[tokio::test]
async fn refresh_rejection_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let err = api(&server).refresh("r-1").await.unwrap_err();
    assert_eq!(err, AuthApiError::Rejected { status: 401, body: "expired".into() });
}

#[tokio::test]
async fn refresh_non_json_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = api(&server).refresh("r-1").await.unwrap_err();
    assert!(matches!(err, AuthApiError::Parse(_)));
}

#[tokio::test]
async fn refresh_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "a", "refresh_token": "r" }))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = api(&server).refresh("r-1").await.unwrap_err();
    assert!(matches!(err, AuthApiError::Request(_)), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn refresh_unreachable_is_request_error() {
    let api = AuthApi::with_client(reqwest::Client::new(), "http://127.0.0.1:9", Duration::from_secs(1));
    let err = api.refresh("r-1").await.unwrap_err();
    assert!(matches!(err, AuthApiError::Request(_)));
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_builds_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 17, "name": "Ada", "email": "ada@example.com", "role": "admin", "plan_id": "team" },
            "access_token": "a-1",
            "refresh_token": "r-1",
        })))
        .mount(&server)
        .await;

    let creds = Credentials { email: "ada@example.com".into(), password: "pw".into() };
    let session = api(&server).login(&creds).await.unwrap();
    assert_eq!(session.user.id, "17");
    assert_eq!(session.user.role.as_deref(), Some("admin"));
    assert_eq!(session.user.plan_id.as_deref(), Some("team"));
    assert_eq!(session.access_token, "a-1");
    assert_eq!(session.refresh_token, "r-1");
}

#[tokio::test]
async fn login_accepts_camel_case_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": "u1", "name": "Bo", "email": "bo@example.com" },
            "accessToken": "a-1",
            "refreshToken": "r-1",
        })))
        .mount(&server)
        .await;

    let creds = Credentials { email: "bo@example.com".into(), password: "pw".into() };
    let session = api(&server).login(&creds).await.unwrap();
    assert_eq!(session.access_token, "a-1");
    assert!(session.is_complete());
}

#[tokio::test]
async fn login_rejected_credentials_pass_status_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"detail":"bad credentials"}"#))
        .mount(&server)
        .await;

    let creds = Credentials { email: "x@example.com".into(), password: "bad".into() };
    let err = api(&server).login(&creds).await.unwrap_err();
    assert!(matches!(err, AuthApiError::Rejected { status: 422, .. }));
}

#[tokio::test]
async fn base_url_trailing_slash_is_trimmed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "a", "refresh_token": "r" })))
        .expect(1)
        .mount(&server)
        .await;

    let api = AuthApi::with_client(reqwest::Client::new(), &format!("{}/", server.uri()), Duration::from_secs(1));
    assert!(api.refresh("r-1").await.is_ok());
}
