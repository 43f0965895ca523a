// Session mirror tests
//
// The mirror must converge on the authority's state under the delivery
// faults the transport allows: duplicated, reordered and stale deltas.

use chrono::Utc;
use pretty_assertions::assert_eq;

use reviewroom_client_core::{Applied, SessionMirror};
use reviewroom_session_core::api::types::{
    ChatMessage, ConnectionState, MediaField, ParticipantId, ParticipantInfo, PresenceSnapshot,
    ResyncResponse, Role, SessionId, SessionState,
};
use reviewroom_session_core::events::SessionDelta;
use reviewroom_session_core::EndReason;

fn pid(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

fn sid() -> SessionId {
    SessionId::from("session-test")
}

fn bootstrap() -> SessionMirror {
    let snapshot = PresenceSnapshot {
        session_id: sid(),
        state: SessionState::Live,
        started_at: Some(Utc::now()),
        ended_at: None,
        participants: vec![ParticipantInfo {
            id: pid("p1"),
            role: Role::Student,
            connection: ConnectionState::Connected,
            media: Default::default(),
        }],
        revision: 1,
        latest_seq: 0,
    };
    SessionMirror::from_resync(ResyncResponse {
        snapshot,
        messages: vec![],
        full_replay: false,
    })
}

fn chat_delta(seq: u64, body: &str) -> SessionDelta {
    SessionDelta::ChatMessage {
        session_id: sid(),
        message: ChatMessage {
            seq,
            sender: pid("p1"),
            body: body.to_string(),
            sent_at: Utc::now(),
        },
    }
}

fn media_delta(field: MediaField, value: bool, revision: u64) -> SessionDelta {
    SessionDelta::MediaUpdate {
        session_id: sid(),
        participant_id: pid("p1"),
        field,
        value,
        revision,
    }
}

#[test]
fn gapped_chat_deltas_are_buffered_then_drained_in_order() {
    let mut mirror = bootstrap();

    // 3 arrives before 1 and 2.
    assert_eq!(mirror.apply(chat_delta(3, "c")), Applied::Buffered);
    assert!(mirror.has_chat_gap());
    assert!(mirror.messages().is_empty());

    assert_eq!(mirror.apply(chat_delta(1, "a")), Applied::Accepted);
    assert_eq!(mirror.messages().len(), 1);

    // 2 closes the gap; 3 drains with it.
    assert_eq!(mirror.apply(chat_delta(2, "b")), Applied::Accepted);
    assert!(!mirror.has_chat_gap());
    let bodies: Vec<&str> = mirror.messages().iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["a", "b", "c"]);
    assert_eq!(mirror.last_contiguous_seq(), 3);
}

#[test]
fn duplicate_chat_deltas_are_discarded() {
    let mut mirror = bootstrap();
    assert_eq!(mirror.apply(chat_delta(1, "a")), Applied::Accepted);
    assert_eq!(mirror.apply(chat_delta(1, "a")), Applied::Discarded);
    assert_eq!(mirror.messages().len(), 1);

    // A duplicate of a still-buffered delta collapses into one copy.
    assert_eq!(mirror.apply(chat_delta(3, "c")), Applied::Buffered);
    assert_eq!(mirror.apply(chat_delta(3, "c")), Applied::Buffered);
    assert_eq!(mirror.apply(chat_delta(2, "b")), Applied::Accepted);
    assert_eq!(mirror.messages().len(), 3);
}

#[test]
fn stale_media_deltas_lose_to_newer_revisions() {
    let mut mirror = bootstrap();

    assert_eq!(mirror.apply(media_delta(MediaField::Mic, true, 5)), Applied::Accepted);
    // An older toggle for the same field arrives late; it must not win.
    assert_eq!(mirror.apply(media_delta(MediaField::Mic, false, 3)), Applied::Discarded);
    assert!(mirror.participant(&pid("p1")).unwrap().media.mic);

    // A different field with an older revision than mic's is still fresh
    // for that field's own history.
    assert_eq!(mirror.apply(media_delta(MediaField::Camera, true, 4)), Applied::Accepted);
    assert!(mirror.participant(&pid("p1")).unwrap().media.camera);
}

#[test]
fn deltas_below_snapshot_revision_are_stale() {
    let mut mirror = bootstrap(); // snapshot revision 1
    assert_eq!(mirror.apply(media_delta(MediaField::Mic, true, 1)), Applied::Discarded);
    assert!(!mirror.participant(&pid("p1")).unwrap().media.mic);
}

#[test]
fn presence_update_replaces_displaced_role_holder() {
    let mut mirror = bootstrap();

    // p1 disconnects, then p9 claims the student slot.
    let disconnect = SessionDelta::PresenceUpdate {
        session_id: sid(),
        participant_id: pid("p1"),
        role: Role::Student,
        connection: ConnectionState::Disconnected,
        revision: 2,
    };
    assert_eq!(mirror.apply(disconnect), Applied::Accepted);

    let replace = SessionDelta::PresenceUpdate {
        session_id: sid(),
        participant_id: pid("p9"),
        role: Role::Student,
        connection: ConnectionState::Connected,
        revision: 3,
    };
    assert_eq!(mirror.apply(replace), Applied::Accepted);

    assert!(mirror.participant(&pid("p1")).is_none());
    let students: Vec<_> = mirror
        .participants()
        .into_iter()
        .filter(|p| p.role == Role::Student)
        .collect();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id, pid("p9"));
}

#[test]
fn session_ended_is_terminal() {
    let mut mirror = bootstrap();
    let ended = SessionDelta::SessionEnded {
        session_id: sid(),
        reason: EndReason::Ended { by: pid("p1") },
        ended_at: Utc::now(),
    };
    assert_eq!(mirror.apply(ended), Applied::Accepted);
    assert!(mirror.is_ended());
    assert!(!mirror.can_mutate());
    assert!(mirror.participants().is_empty());

    // Everything after termination is ignored.
    assert_eq!(mirror.apply(chat_delta(1, "late")), Applied::Discarded);
    assert_eq!(mirror.apply(media_delta(MediaField::Mic, true, 9)), Applied::Discarded);
}

#[test]
fn deltas_for_other_sessions_are_ignored() {
    let mut mirror = bootstrap();
    let foreign = SessionDelta::ChatMessage {
        session_id: SessionId::from("session-other"),
        message: ChatMessage {
            seq: 1,
            sender: pid("p1"),
            body: "wrong room".to_string(),
            sent_at: Utc::now(),
        },
    };
    assert_eq!(mirror.apply(foreign), Applied::Discarded);
    assert!(mirror.messages().is_empty());
}

#[test]
fn full_replay_resync_discards_local_history() {
    let mut mirror = bootstrap();
    mirror.apply(chat_delta(1, "old"));

    // The authority trimmed history; the resync restarts at seq 7.
    let snapshot = PresenceSnapshot {
        session_id: sid(),
        state: SessionState::Live,
        started_at: Some(Utc::now()),
        ended_at: None,
        participants: vec![],
        revision: 10,
        latest_seq: 8,
    };
    let messages = vec![
        ChatMessage { seq: 7, sender: pid("p1"), body: "x".into(), sent_at: Utc::now() },
        ChatMessage { seq: 8, sender: pid("p1"), body: "y".into(), sent_at: Utc::now() },
    ];
    mirror.apply_resync(ResyncResponse { snapshot, messages, full_replay: true });

    assert_eq!(
        mirror.messages().iter().map(|m| m.seq).collect::<Vec<_>>(),
        vec![7, 8]
    );
    assert_eq!(mirror.last_contiguous_seq(), 8);
    assert!(!mirror.has_chat_gap());
}

#[test]
fn elapsed_is_recomputable_from_timestamps() {
    let started = Utc::now();
    let snapshot = PresenceSnapshot {
        session_id: sid(),
        state: SessionState::Live,
        started_at: Some(started),
        ended_at: None,
        participants: vec![],
        revision: 0,
        latest_seq: 0,
    };
    let mirror = SessionMirror::from_resync(ResyncResponse {
        snapshot,
        messages: vec![],
        full_replay: false,
    });
    let later = started + chrono::Duration::seconds(125);
    assert_eq!(mirror.elapsed_seconds_at(later), Some(125));
}
