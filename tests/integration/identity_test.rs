//! Identity attachment, consent gating and persisted preferences.

use std::sync::Arc;

use beacon_entity::event::{EventCode, EventName, EventPayload};
use beacon_entity::identity::OptChannel;

use crate::helpers::{TestBeacon, eventually};

#[tokio::test]
async fn test_identity_is_attached_until_logout() {
    let t = TestBeacon::new().await;
    let identity = t.beacon.identity();

    let anonymous = t
        .beacon
        .track_event("browse", EventPayload::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(anonymous.user_identity, None);

    identity.login("user-42").await.unwrap();
    let known = t
        .beacon
        .track_event("browse", EventPayload::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(known.user_identity.as_deref(), Some("user-42"));

    let logout = identity.logout(true).await.unwrap().unwrap();
    assert_eq!(logout.event_name, EventName::from(EventCode::UserLoggedOut));
    assert_eq!(logout.user_identity.as_deref(), Some("user-42"));

    let after = t
        .beacon
        .track_event("browse", EventPayload::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.user_identity, None);
}

#[tokio::test]
async fn test_tracking_opt_out_suppresses_all_but_opt_events() {
    let t = TestBeacon::new().await;
    let identity = t.beacon.identity();

    let opt_out = identity
        .set_opt(OptChannel::Tracking, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(opt_out.event_name, EventName::from(EventCode::OptOutTracking));

    assert!(
        t.beacon
            .track_event("hidden", EventPayload::new())
            .await
            .unwrap()
            .is_none()
    );
    assert!(identity.login("user-1").await.unwrap().is_none());

    let opt_in = identity
        .set_opt(OptChannel::Tracking, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(opt_in.event_name, EventName::from(EventCode::OptInTracking));

    t.beacon.flush().await.unwrap();
    assert_eq!(
        t.transport.sent_names(),
        vec!["USER_OPT_OUT_TRACKING", "USER_OPT_IN_TRACKING"]
    );
}

#[tokio::test]
async fn test_state_survives_restart() {
    let t = TestBeacon::new().await;
    let guid = t.beacon.identity().device_guid();
    t.beacon.identity().login("user-7").await.unwrap();
    t.beacon
        .identity()
        .set_opt(OptChannel::Push, false)
        .await
        .unwrap();
    t.beacon
        .identity()
        .register_push_token("tok-1")
        .await
        .unwrap();

    let t = t.reopen().await;
    let identity = t.beacon.identity();
    assert_eq!(identity.device_guid(), guid);
    assert_eq!(identity.identity().await.as_deref(), Some("user-7"));
    assert!(!identity.has_opted(OptChannel::Push).await);
    assert!(identity.has_opted(OptChannel::Tracking).await);
    assert!(identity.register_push_token("tok-1").await.unwrap().is_none());

    let refreshed = identity.register_push_token("tok-2").await.unwrap().unwrap();
    assert_eq!(
        refreshed.event_name,
        EventName::from(EventCode::PushTokenRefreshed)
    );

    let prefs = identity.stored_preferences().await.unwrap();
    assert!(prefs.values().any(|v| v == "tok-2"));
    assert!(prefs.values().any(|v| v == "user-7"));
}

#[tokio::test]
async fn test_install_tracked_once_across_restarts() {
    let t = TestBeacon::new().await;
    t.beacon.start().await.unwrap();
    let t = t.reopen().await;
    t.beacon.start().await.unwrap();

    // APP_LAUNCHED is the last event tracked by the second start.
    let transport = Arc::clone(&t.transport);
    assert!(eventually(|| transport.sent_names().iter().any(|n| n == "APP_LAUNCHED")).await);
    t.beacon.shutdown().await.unwrap();

    let names = t.transport.sent_names();
    assert_eq!(names.iter().filter(|n| *n == "APP_INSTALLED").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "FIRST_APP_LAUNCHED").count(), 1);
    assert!(!names.iter().any(|n| n == "APP_UPDATED"));
}
