use std::sync::Arc;

use super::*;
use crate::config::ClientConfig;
use crate::store::MemoryStore;
use crate::transport::test_helpers::MockTransport;
use crate::types::TokenPair;

const LOGIN_OK: &str = r#"{
    "success": true,
    "data": {
        "user": {"id":"u1","email":"a@b.com","firstName":"A","lastName":"B"},
        "accessToken": "acc-1",
        "refreshToken": "ref-1"
    }
}"#;
const PROFILE_OK: &str = r#"{"success":true,"data":{"user":{"id":"u1","email":"a@b.com","firstName":"A","lastName":"B"}}}"#;
const REFRESH_OK: &str = r#"{"success":true,"data":{"accessToken":"acc-2"}}"#;
const ACK_OK: &str = r#"{"success":true,"message":"ok"}"#;
const BAD_CREDENTIALS: &str = r#"{"success":false,"message":"Invalid email or password"}"#;
const TOKEN_EXPIRED: &str = r#"{"success":false,"message":"Token expired"}"#;

fn manager(
    responses: Vec<Result<crate::transport::HttpResponse, AuthError>>,
) -> (SessionManager, Arc<MockTransport>, Arc<dyn SecureStore>) {
    let transport = Arc::new(MockTransport::new(responses));
    let store: Arc<dyn SecureStore> = Arc::new(MemoryStore::new());
    let config = ClientConfig::with_base_url("http://test.local/api");
    let api = Arc::new(ApiClient::with_transport(&config, store.clone(), transport.clone()));
    (SessionManager::new(api), transport, store)
}

async fn seed_tokens(store: &Arc<dyn SecureStore>) {
    let pair = TokenPair { access_token: "acc-0".into(), refresh_token: "ref-0".into() };
    store::save_token_pair(store.as_ref(), &pair).await.unwrap();
}

// =============================================================================
// sign_in
// =============================================================================

#[tokio::test]
async fn sign_in_success_establishes_session() {
    let (session, transport, store) = manager(vec![MockTransport::ok(200, LOGIN_OK)]);

    let user = session.sign_in("a@b.com", "secret1").await.unwrap();
    assert_eq!(user.id, "u1");

    let state = session.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.user.as_ref().unwrap().email, "a@b.com");
    assert!(state.error.is_none());
    assert!(!state.is_loading);
    assert_eq!(state.phase, SessionPhase::SignedIn);

    // tokens persisted as one composite value
    let pair = store::load_token_pair(store.as_ref()).await.unwrap();
    assert_eq!(pair.access_token, "acc-1");
    assert_eq!(pair.refresh_token, "ref-1");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn sign_in_bad_credentials_sets_error_and_stays_signed_out() {
    let (session, _, store) = manager(vec![MockTransport::ok(401, BAD_CREDENTIALS)]);

    let err = session.sign_in("a@b.com", "wrongpw").await.unwrap_err();
    assert!(err.is_auth());

    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
    assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
    assert_eq!(state.phase, SessionPhase::SignedOut);
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
}

#[tokio::test]
async fn sign_in_validation_never_reaches_network() {
    let (session, transport, _) = manager(vec![]);

    let err = session.sign_in("", "secret1").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "email is required");
    assert_eq!(transport.call_count(), 0);

    let err = session.sign_in("not-an-email", "secret1").await.unwrap_err();
    assert!(err.is_validation());

    let err = session.sign_in("a@b.com", "short").await.unwrap_err();
    assert_eq!(err.to_string(), "password must be at least 6 characters");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn sign_in_network_failure_surfaces_and_resets() {
    let (session, _, _) = manager(vec![Err(AuthError::Network("unreachable".into()))]);

    let err = session.sign_in("a@b.com", "secret1").await.unwrap_err();
    assert!(err.is_network());
    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.error.is_some());
    assert!(!state.is_loading);
}

// =============================================================================
// sign_up
// =============================================================================

#[tokio::test]
async fn sign_up_success_does_not_establish_session() {
    let (session, _, store) = manager(vec![MockTransport::ok(201, ACK_OK)]);

    session.sign_up("a@b.com", "secret1", "A", "B").await.unwrap();

    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
    assert!(state.error.is_none());
    assert_eq!(state.phase, SessionPhase::SignedOut);
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
}

#[tokio::test]
async fn sign_up_then_explicit_sign_in_reaches_signed_in() {
    let (session, transport, _) = manager(vec![
        MockTransport::ok(201, ACK_OK),
        MockTransport::ok(200, LOGIN_OK),
    ]);

    session.sign_up("a@b.com", "secret1", "A", "B").await.unwrap();
    assert!(!session.is_signed_in().await);

    session.sign_in("a@b.com", "secret1").await.unwrap();
    assert!(session.is_signed_in().await);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn sign_up_requires_names() {
    let (session, transport, _) = manager(vec![]);

    let err = session.sign_up("a@b.com", "secret1", "", "B").await.unwrap_err();
    assert_eq!(err.to_string(), "first name is required");
    let err = session.sign_up("a@b.com", "secret1", "A", "  ").await.unwrap_err();
    assert_eq!(err.to_string(), "last name is required");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn sign_up_duplicate_email_surfaces_backend_message() {
    let (session, _, _) = manager(vec![MockTransport::ok(
        409,
        r#"{"success":false,"message":"Email already registered"}"#,
    )]);

    let err = session.sign_up("a@b.com", "secret1", "A", "B").await.unwrap_err();
    assert_eq!(err.to_string(), "Email already registered");
    assert_eq!(session.snapshot().await.error.as_deref(), Some("Email already registered"));
}

// =============================================================================
// sign_out
// =============================================================================

#[tokio::test]
async fn sign_out_clears_everything() {
    let (session, _, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(200, ACK_OK),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    session.sign_out().await;

    let state = session.snapshot().await;
    assert!(state.user.is_none());
    assert!(!state.is_signed_in);
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(state.phase, SessionPhase::SignedOut);
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
    assert!(store.get(SESSION_KEY).await.is_none());
}

#[tokio::test]
async fn sign_out_clears_locally_even_when_backend_unreachable() {
    let (session, _, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        Err(AuthError::Network("backend gone".into())),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    session.sign_out().await;

    let state = session.snapshot().await;
    assert!(state.user.is_none());
    assert!(!state.is_signed_in);
    assert!(state.error.is_none());
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
    assert!(store.get(SESSION_KEY).await.is_none());
}

// =============================================================================
// check_auth_status
// =============================================================================

#[tokio::test]
async fn check_auth_status_without_tokens_makes_no_network_calls() {
    let (session, transport, _) = manager(vec![]);

    session.check_auth_status().await;

    assert_eq!(session.snapshot().await.phase, SessionPhase::SignedOut);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn check_auth_status_restores_session_from_valid_token() {
    let (session, _, store) = manager(vec![MockTransport::ok(200, PROFILE_OK)]);
    seed_tokens(&store).await;

    session.check_auth_status().await;

    let state = session.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.user.as_ref().unwrap().id, "u1");
    assert_eq!(state.phase, SessionPhase::SignedIn);
}

#[tokio::test]
async fn check_auth_status_refreshes_stale_access_token() {
    let (session, transport, store) = manager(vec![
        MockTransport::ok(401, TOKEN_EXPIRED),
        MockTransport::ok(200, REFRESH_OK),
        MockTransport::ok(200, PROFILE_OK),
    ]);
    seed_tokens(&store).await;

    session.check_auth_status().await;

    assert!(session.is_signed_in().await);
    assert_eq!(transport.call_count(), 3);
    let pair = store::load_token_pair(store.as_ref()).await.unwrap();
    assert_eq!(pair.access_token, "acc-2");
}

#[tokio::test]
async fn check_auth_status_expired_session_clears_tokens() {
    let (session, transport, store) = manager(vec![
        MockTransport::ok(401, TOKEN_EXPIRED),
        MockTransport::ok(401, r#"{"success":false,"message":"Refresh token invalid"}"#),
    ]);
    seed_tokens(&store).await;

    session.check_auth_status().await;

    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
    // degrades silently, no stranded error
    assert!(state.error.is_none());
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
    assert_eq!(transport.call_count(), 2);
}

// =============================================================================
// refresh_auth
// =============================================================================

#[tokio::test]
async fn refresh_auth_updates_user() {
    let updated = r#"{"success":true,"data":{"user":{"id":"u1","email":"a@b.com","firstName":"Ada","lastName":"B"}}}"#;
    let (session, _, _) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(200, updated),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    session.refresh_auth().await;

    let state = session.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.user.as_ref().unwrap().first_name, "Ada");
    assert_eq!(state.phase, SessionPhase::SignedIn);
}

#[tokio::test]
async fn refresh_auth_failure_forces_silent_sign_out() {
    let (session, _, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(401, TOKEN_EXPIRED),
        MockTransport::ok(401, r#"{"success":false,"message":"Refresh token invalid"}"#),
        MockTransport::ok(200, ACK_OK),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    session.refresh_auth().await;

    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
    // forced sign-out is silent: no user-facing error
    assert!(state.error.is_none());
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
}

// =============================================================================
// update_profile / change_password
// =============================================================================

#[tokio::test]
async fn update_profile_replaces_user_without_phase_change() {
    let updated = r#"{"success":true,"data":{"user":{"id":"u1","email":"a@b.com","firstName":"Ada","lastName":"Byron"}}}"#;
    let (session, _, _) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(200, updated),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    let user = session.update_profile("Ada", "Byron").await.unwrap();
    assert_eq!(user.last_name, "Byron");

    let state = session.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.phase, SessionPhase::SignedIn);
    assert_eq!(state.user.as_ref().unwrap().first_name, "Ada");
}

#[tokio::test]
async fn update_profile_failure_keeps_session() {
    let (session, _, _) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(500, r#"{"success":false,"message":"boom"}"#),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    let err = session.update_profile("Ada", "Byron").await.unwrap_err();
    assert!(matches!(err, AuthError::Server { .. }));

    let state = session.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.user.as_ref().unwrap().first_name, "A");
    assert!(state.error.is_some());
}

#[tokio::test]
async fn rejected_refresh_during_update_profile_forces_sign_out() {
    let (session, transport, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(401, TOKEN_EXPIRED),
        MockTransport::ok(401, r#"{"success":false,"message":"Refresh token invalid"}"#),
        MockTransport::ok(200, ACK_OK),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    let err = session.update_profile("Ada", "Byron").await.unwrap_err();
    assert_eq!(err.to_string(), "Token expired");

    // the dead session is torn down, not left looking signed in
    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
    assert_eq!(state.phase, SessionPhase::SignedOut);
    assert!(state.error.is_none());
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
    assert!(store.get(SESSION_KEY).await.is_none());
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn rejected_refresh_during_change_password_forces_sign_out() {
    let (session, _, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(401, TOKEN_EXPIRED),
        MockTransport::ok(401, r#"{"success":false,"message":"Refresh token invalid"}"#),
        MockTransport::ok(200, ACK_OK),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    let err = session.change_password("old-pw", "newpass", "newpass").await.unwrap_err();
    assert!(err.is_auth());
    assert!(!session.is_signed_in().await);
    assert!(store::load_token_pair(store.as_ref()).await.is_none());
}

#[tokio::test]
async fn transient_auth_failure_with_tokens_present_keeps_session() {
    // a plain 403 (no refresh involved) must not tear the session down
    let (session, _, store) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(403, r#"{"success":false,"message":"Forbidden"}"#),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    let err = session.update_profile("Ada", "Byron").await.unwrap_err();
    assert!(err.is_auth());
    assert!(session.is_signed_in().await);
    assert!(store::load_token_pair(store.as_ref()).await.is_some());
    assert_eq!(session.snapshot().await.error.as_deref(), Some("Forbidden"));
}

#[tokio::test]
async fn change_password_mismatch_is_validation() {
    let (session, transport, _) = manager(vec![]);

    let err = session.change_password("old-pw", "newpass", "different").await.unwrap_err();
    assert_eq!(err.to_string(), "passwords do not match");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn change_password_too_short_is_validation() {
    let (session, transport, _) = manager(vec![]);

    let err = session.change_password("old-pw", "short", "short").await.unwrap_err();
    assert_eq!(err.to_string(), "password must be at least 6 characters");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn change_password_success_clears_loading() {
    let (session, _, _) = manager(vec![
        MockTransport::ok(200, LOGIN_OK),
        MockTransport::ok(200, ACK_OK),
    ]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    session.change_password("old-pw", "newpass", "newpass").await.unwrap();
    let state = session.snapshot().await;
    assert!(!state.is_loading);
    assert!(state.error.is_none());
}

// =============================================================================
// persistence round-trip
// =============================================================================

#[tokio::test]
async fn persisted_session_round_trips_subset_only() {
    let (session, _, store) = manager(vec![MockTransport::ok(200, LOGIN_OK)]);
    session.sign_in("a@b.com", "secret1").await.unwrap();

    // simulate a process restart sharing the same backing store
    let config = ClientConfig::with_base_url("http://test.local/api");
    let transport = Arc::new(MockTransport::new(vec![]));
    let api = Arc::new(ApiClient::with_transport(&config, store.clone(), transport));
    let restarted = SessionManager::new(api);

    restarted.restore_persisted().await;

    let state = restarted.snapshot().await;
    assert!(state.is_signed_in);
    assert_eq!(state.user.as_ref().unwrap().email, "a@b.com");
    // process-local fields come back at defaults
    assert!(!state.is_loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn restore_ignores_corrupt_blob() {
    let (session, _, store) = manager(vec![]);
    store.set(SESSION_KEY, "{broken").await.unwrap();

    session.restore_persisted().await;

    assert_eq!(session.snapshot().await.phase, SessionPhase::SignedOut);
}

#[tokio::test]
async fn restore_upholds_signed_in_implies_user() {
    let (session, _, store) = manager(vec![]);
    store
        .set(SESSION_KEY, r#"{"user":null,"isSignedIn":true}"#)
        .await
        .unwrap();

    session.restore_persisted().await;

    let state = session.snapshot().await;
    assert!(!state.is_signed_in);
    assert!(state.user.is_none());
}

// =============================================================================
// error handling
// =============================================================================

#[tokio::test]
async fn clear_error_is_explicit() {
    let (session, _, _) = manager(vec![MockTransport::ok(401, BAD_CREDENTIALS)]);
    let _ = session.sign_in("a@b.com", "wrong-pw").await;
    assert!(session.snapshot().await.error.is_some());

    session.clear_error().await;
    assert!(session.snapshot().await.error.is_none());
}
