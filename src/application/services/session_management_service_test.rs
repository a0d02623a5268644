use std::sync::Arc;

use chrono::Duration;

use crate::application::ports::auth_ports::MockSessionNotifier;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::test_support::*;
use crate::common::clock::ManualClock;
use crate::common::config::SessionConfig;
use crate::domain::entities::refresh_token::RevocationReason;
use crate::domain::entities::session::Session;

fn session_config(max_concurrent_sessions: usize) -> SessionConfig {
    SessionConfig {
        max_concurrent_sessions,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn test_single_session_cap_evicts_previous_login() {
    let harness = Harness::new();
    let sessions = &harness.session_service;

    let a = sessions
        .create_session("u1", "device-a", Some("10.0.0.1".into()), None)
        .await
        .unwrap();

    harness.clock.advance(Duration::minutes(1));
    let b = sessions
        .create_session("u1", "device-b", Some("10.0.0.2".into()), None)
        .await
        .unwrap();

    assert!(!sessions.validate_session(&a.id).await);
    assert!(sessions.validate_session(&b.id).await);
    assert_eq!(harness.sessions.count_for("u1"), 1);

    let notifications = harness.notifier.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0], ("u1".to_string(), vec![a.id.clone()]));
}

#[tokio::test]
async fn test_cap_never_exceeded_and_oldest_go_first() {
    let mut config = test_config();
    config.session.max_concurrent_sessions = 3;
    let harness = Harness::with_config(config);

    let mut created = Vec::new();
    for i in 0..6 {
        let session = harness
            .session_service
            .create_session("u1", &format!("device-{}", i), None, None)
            .await
            .unwrap();
        created.push(session.id);
        harness.clock.advance(Duration::seconds(10));

        let active = harness.session_service.list_active_sessions("u1").await.unwrap();
        assert!(active.len() <= 3);
    }

    let active: Vec<String> = harness
        .session_service
        .list_active_sessions("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(active, created[3..].to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_stay_within_cap() {
    let mut config = test_config();
    config.session.max_concurrent_sessions = 1;
    let harness = Harness::with_config(config);
    let logins = 8;

    let handles: Vec<_> = (0..logins)
        .map(|i| {
            let sessions = harness.session_service.clone();
            tokio::spawn(async move {
                sessions
                    .create_session("u1", &format!("device-{}", i), None, None)
                    .await
                    .unwrap()
            })
        })
        .collect();
    for handle in futures::future::join_all(handles).await {
        handle.unwrap();
    }

    let active = harness.session_service.list_active_sessions("u1").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(harness.sessions.count_for("u1"), 1);

    let evicted: usize = harness
        .notifier
        .notifications
        .lock()
        .unwrap()
        .iter()
        .map(|(_, ids)| ids.len())
        .sum();
    assert_eq!(evicted, logins - 1);
}

#[tokio::test]
async fn test_expired_sessions_do_not_count_towards_cap() {
    let mut config = test_config();
    config.session.max_concurrent_sessions = 2;
    let harness = Harness::with_config(config);

    let stale = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();
    harness.clock.advance(Duration::minutes(31));

    harness
        .session_service
        .create_session("u1", "device-b", None, None)
        .await
        .unwrap();

    // The stale row is still stored but no eviction was needed
    assert!(harness.sessions.sessions.lock().unwrap().contains_key(&stale.id));
    assert!(harness.notifier.notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_eviction_revokes_refresh_tokens_of_evicted_session() {
    let harness = Harness::new();

    let old = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();
    let issued = harness
        .token_service
        .issue_refresh_token("u1", Some(old.id.clone()))
        .await
        .unwrap();

    harness
        .session_service
        .create_session("u1", "device-b", None, None)
        .await
        .unwrap();

    let token = harness.tokens.by_id(&issued.record.id).unwrap();
    assert_eq!(token.revoked_reason.as_deref(), Some("session_evicted"));
}

#[tokio::test]
async fn test_notifier_not_called_when_disabled() {
    let clock = Arc::new(ManualClock::new(t0()));
    let mut notifier = MockSessionNotifier::new();
    notifier.expect_notify_concurrent_session().never();

    let service = SessionManagementService::new(
        Arc::new(InMemorySessionRepository::default()),
        Arc::new(InMemoryTokenRepository::default()),
        Arc::new(notifier),
        SessionConfig {
            notify_on_concurrent_session: false,
            ..session_config(1)
        },
        clock,
    );

    service.create_session("u1", "a", None, None).await.unwrap();
    service.create_session("u1", "b", None, None).await.unwrap();
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_login() {
    let mut notifier = MockSessionNotifier::new();
    notifier
        .expect_notify_concurrent_session()
        .times(1)
        .returning(|_, _, _| {
            Err(crate::common::errors::DomainError::unavailable("Mail", "smtp down"))
        });

    let service = SessionManagementService::new(
        Arc::new(InMemorySessionRepository::default()),
        Arc::new(InMemoryTokenRepository::default()),
        Arc::new(notifier),
        session_config(1),
        Arc::new(ManualClock::new(t0())),
    );

    service.create_session("u1", "a", None, None).await.unwrap();
    let second = service.create_session("u1", "b", None, None).await;

    assert!(second.is_ok());
}

#[tokio::test]
async fn test_expired_session_rejected_without_sweep() {
    let harness = Harness::new();
    let session = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();

    harness.clock.advance(Duration::minutes(30));

    assert!(!harness.session_service.validate_session(&session.id).await);
    // Nothing swept it; the row is still there
    assert_eq!(harness.sessions.count_for("u1"), 1);
}

#[tokio::test]
async fn test_validation_slides_expiry() {
    let harness = Harness::new();
    let session = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();

    harness.clock.advance(Duration::minutes(20));
    assert!(harness.session_service.validate_session(&session.id).await);

    let touched = harness.session_service.get_session(&session.id).await.unwrap();
    assert_eq!(touched.last_activity_at, t0() + Duration::minutes(20));
    assert_eq!(touched.expires_at, t0() + Duration::minutes(50));

    // 45 minutes after login is past the original expiry but inside the slid one
    harness.clock.advance(Duration::minutes(25));
    assert!(harness.session_service.validate_session(&session.id).await);
}

#[tokio::test]
async fn test_without_sliding_expiration_expiry_is_fixed() {
    let mut config = test_config();
    config.session.sliding_expiration = false;
    let harness = Harness::with_config(config);

    let session = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();

    harness.clock.advance(Duration::minutes(20));
    assert!(harness.session_service.validate_session(&session.id).await);
    harness.clock.advance(Duration::minutes(10));
    assert!(!harness.session_service.validate_session(&session.id).await);
}

#[tokio::test]
async fn test_validate_fails_closed_when_store_unavailable() {
    let harness = Harness::new();
    let session = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();

    harness.sessions.outage.set(true);

    assert!(!harness.session_service.validate_session(&session.id).await);
    assert!(!harness.session_service.validate_session("missing").await);
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let mut config = test_config();
    config.session.max_concurrent_sessions = 5;
    let harness = Harness::with_config(config);

    for device in ["a", "b", "c"] {
        harness
            .session_service
            .create_session("u1", device, None, None)
            .await
            .unwrap();
    }
    harness.clock.advance(Duration::minutes(30));
    let live = harness
        .session_service
        .create_session("u1", "d", None, None)
        .await
        .unwrap();

    let first = harness.session_service.cleanup_expired_sessions().await;
    let second = harness.session_service.cleanup_expired_sessions().await;

    assert!(first.successful);
    assert_eq!(first.count_removed, 3);
    assert!(second.successful);
    assert_eq!(second.count_removed, 0);
    assert!(harness.session_service.validate_session(&live.id).await);
}

#[tokio::test]
async fn test_cleanup_reports_store_failure() {
    let harness = Harness::new();
    harness.sessions.outage.set(true);

    let result = harness.session_service.cleanup_expired_sessions().await;

    assert!(!result.successful);
    assert_eq!(result.count_removed, 0);
    assert!(result.message.contains("pool timed out"));
}

#[tokio::test]
async fn test_end_session_is_idempotent_and_revokes_tokens() {
    let harness = Harness::new();
    let session = harness
        .session_service
        .create_session("u1", "device-a", None, None)
        .await
        .unwrap();
    let issued = harness
        .token_service
        .issue_refresh_token("u1", Some(session.id.clone()))
        .await
        .unwrap();

    harness
        .session_service
        .end_session(&session.id, RevocationReason::Logout)
        .await
        .unwrap();
    harness
        .session_service
        .end_session(&session.id, RevocationReason::Logout)
        .await
        .unwrap();

    assert!(!harness.session_service.validate_session(&session.id).await);
    assert!(harness.tokens.by_id(&issued.record.id).unwrap().is_revoked());
}

#[tokio::test]
async fn test_end_user_sessions_leaves_other_users_alone() {
    let mut config = test_config();
    config.session.max_concurrent_sessions = 3;
    let harness = Harness::with_config(config);

    harness.sessions.insert(Session::new("u1".into(), "a".into(), None, None, t0(), Duration::minutes(30)));
    harness.sessions.insert(Session::new("u1".into(), "b".into(), None, None, t0(), Duration::minutes(30)));
    harness.sessions.insert(Session::new("u2".into(), "c".into(), None, None, t0(), Duration::minutes(30)));

    let ended = harness.session_service.end_user_sessions("u1").await.unwrap();

    assert_eq!(ended, 2);
    assert_eq!(harness.sessions.count_for("u1"), 0);
    assert_eq!(harness.sessions.count_for("u2"), 1);
}
