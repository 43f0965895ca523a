// Grace timer tests
//
// The grace timer is the only timeout-driven transition in the system.
// These run on tokio's paused clock so the grace period elapses virtually.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::Mutex;

use reviewroom_session_core::archive::{SessionArchive, SessionArchiver};
use reviewroom_session_core::{
    CoordinatorConfig, EndReason, ParticipantId, Role, SessionCoordinator, SessionError,
    SessionState,
};

const GRACE: Duration = Duration::from_secs(30);

fn pid(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

fn config() -> CoordinatorConfig {
    CoordinatorConfig::default().with_grace_period(GRACE)
}

/// Let the paused clock run past the grace deadline and give the spawned
/// timer task a chance to complete.
async fn outlive_grace() {
    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn grace_expiry_ends_an_abandoned_session() {
    let coordinator = SessionCoordinator::new(config());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.leave(&session, &pid("p1")).await.unwrap();

    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Live);
    outlive_grace().await;
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Ended);

    // The expired session rejects further mutations.
    assert_eq!(
        coordinator.send_chat(&session, &pid("p1"), "anyone?").await.unwrap_err(),
        SessionError::SessionClosed
    );
}

#[tokio::test(start_paused = true)]
async fn rejoin_within_grace_cancels_the_timer() {
    let coordinator = SessionCoordinator::new(config());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.leave(&session, &pid("p1")).await.unwrap();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();

    outlive_grace().await;
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Live);
}

#[tokio::test(start_paused = true)]
async fn different_identity_joining_also_cancels_the_timer() {
    let coordinator = SessionCoordinator::new(config());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.leave(&session, &pid("p1")).await.unwrap();
    // The advisor shows up during the grace window.
    coordinator.join(&session, pid("p2"), Role::Advisor).await.unwrap();

    outlive_grace().await;
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Live);
}

#[tokio::test(start_paused = true)]
async fn timer_does_not_fire_while_someone_is_connected() {
    let coordinator = SessionCoordinator::new(config());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.join(&session, pid("p2"), Role::Advisor).await.unwrap();

    // One participant leaving does not start the timer.
    coordinator.leave(&session, &pid("p1")).await.unwrap();
    outlive_grace().await;
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Live);
}

#[tokio::test(start_paused = true)]
async fn leave_rejoin_leave_restarts_the_window() {
    let coordinator = SessionCoordinator::new(config());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();

    coordinator.leave(&session, &pid("p1")).await.unwrap();
    tokio::time::sleep(GRACE / 2).await;
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.leave(&session, &pid("p1")).await.unwrap();

    // Half the original window has passed; the restarted timer must not
    // fire until a full period after the second leave.
    tokio::time::sleep(GRACE - Duration::from_secs(5)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Live);

    outlive_grace().await;
    assert_eq!(coordinator.session_state(&session).await.unwrap(), SessionState::Ended);
}

/// Archiver that records everything it receives.
#[derive(Debug, Default)]
struct CapturingArchiver {
    records: Mutex<Vec<SessionArchive>>,
}

#[async_trait::async_trait]
impl SessionArchiver for CapturingArchiver {
    async fn archive(&self, record: SessionArchive) {
        self.records.lock().await.push(record);
    }
}

#[tokio::test(start_paused = true)]
async fn grace_expiry_archives_with_reason() {
    let archiver = Arc::new(CapturingArchiver::default());
    let coordinator = SessionCoordinator::with_archiver(config(), archiver.clone());
    let session = coordinator.create_session();
    coordinator.join(&session, pid("p1"), Role::Student).await.unwrap();
    coordinator.send_chat(&session, &pid("p1"), "for the record").await.unwrap();
    coordinator.leave(&session, &pid("p1")).await.unwrap();

    outlive_grace().await;

    let records = archiver.records.lock().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, session);
    assert_eq!(records[0].reason, EndReason::GraceExpired);
    assert_eq!(records[0].messages.len(), 1);
}
