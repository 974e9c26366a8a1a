mod common;

use common::{config, eventually, harness, harness_with, joined, next_event, USER};
use party_core::notification::NotificationKind;
use party_core::template::EmoteOptions;
use party_core::{PartyError, PartyEvent, ReadyState, SessionConfig};
use serde_json::{json, Map, Value};
use std::time::Duration;

const FRIEND: &str = "friend";

fn swap_request(start: i64, target: i64, swap_with: &str, version: u64) -> Map<String, Value> {
    let encoded = json!({
        "MemberSquadAssignmentRequest": {
            "startingAbsoluteIdx": start,
            "targetAbsoluteIdx": target,
            "swapTargetMemberId": swap_with,
            "version": version,
        }
    })
    .to_string();
    let mut updated = Map::new();
    updated.insert("Default:MemberSquadAssignmentRequest_j".to_string(), json!(encoded));
    updated
}

#[tokio::test]
async fn test_member_join_assigns_position_and_refreshes_once() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    let refreshes = h.service.call_count("party_update_meta");

    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());

    assert_eq!(party.member_count(), 2);
    let mine = party.with_state(|s| s.assignment_of(USER)).unwrap();
    let theirs = party.with_state(|s| s.assignment_of(FRIEND)).unwrap();
    assert_eq!(mine.position, Some(0));
    assert_eq!(theirs.position, Some(1));
    assert_eq!(h.service.call_count("party_update_meta"), refreshes + 1);

    // The published list matches the local one.
    let stored = h.service.party(party.id()).unwrap();
    let raw = stored.meta["Default:RawSquadAssignments_j"].as_str().unwrap();
    let wire: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(wire["RawSquadAssignments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_member_join_without_chat_presence_still_completes() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();

    // No chat occupant: the join waits out the chat timeout and goes on.
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());
    assert_eq!(party.member_count(), 2);
}

#[tokio::test]
async fn test_member_leaving_refreshes_assignments() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());
    let refreshes = h.service.call_count("party_update_meta");

    h.service
        .remove_member(party.id(), FRIEND, NotificationKind::MemberLeft)
        .unwrap();
    let left = next_event(&mut h.events, |e| matches!(e, PartyEvent::MemberLeft(_))).await;
    assert!(matches!(left, Some(PartyEvent::MemberLeft(m)) if m.id == FRIEND));
    assert_eq!(party.member_count(), 1);
    assert!(party.with_state(|s| s.assignment_of(FRIEND)).is_none());
    assert_eq!(h.service.call_count("party_update_meta"), refreshes + 1);
}

#[tokio::test]
async fn test_swap_request_from_member_is_honoured_by_leader() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());

    h.service
        .update_member_state(party.id(), FRIEND, swap_request(1, 0, USER, 1))
        .unwrap();
    let swap = next_event(&mut h.events, |e| matches!(e, PartyEvent::TeamSwap { .. })).await;
    match swap {
        Some(PartyEvent::TeamSwap { member, other }) => {
            assert_eq!(member.id, FRIEND);
            assert_eq!(other.id, USER);
        }
        other => panic!("expected a team swap, got {:?}", other),
    }
    assert_eq!(party.with_state(|s| s.holder_of(0).map(str::to_string)), Some(FRIEND.to_string()));
    assert_eq!(party.me().position(), Some(1));

    let friend_updated = |e: &PartyEvent| matches!(e, PartyEvent::MemberUpdated(m) if m.id == FRIEND);
    assert!(next_event(&mut h.events, friend_updated).await.is_some());

    // The same version again changes nothing.
    let refreshes = h.service.call_count("party_update_meta");
    h.service
        .update_member_state(party.id(), FRIEND, swap_request(1, 0, USER, 1))
        .unwrap();
    assert!(next_event(&mut h.events, friend_updated).await.is_some());
    assert_eq!(h.service.call_count("party_update_meta"), refreshes);
    assert_eq!(party.me().position(), Some(1));
}

#[tokio::test]
async fn test_promotion_hands_leadership_over() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());

    party.promote(FRIEND).await.unwrap();
    let promoted = next_event(&mut h.events, |e| matches!(e, PartyEvent::MemberPromoted { .. })).await;
    match promoted {
        Some(PartyEvent::MemberPromoted { old, new }) => {
            assert_eq!(old.map(|m| m.id).as_deref(), Some(USER));
            assert_eq!(new.id, FRIEND);
        }
        other => panic!("expected a promotion, got {:?}", other),
    }
    assert!(!party.me().leader());
    assert_eq!(party.leader().unwrap().id, FRIEND);
    assert!(party.set_custom_key("nope").await.is_err());
}

#[tokio::test]
async fn test_being_kicked_moves_to_a_new_party() {
    let mut h = harness();
    h.service.insert_party("remote", "host", 16);
    let party = h.session.join_party("remote").await.unwrap();
    assert!(eventually(|| party.member_count() == 2).await);

    h.service
        .remove_member("remote", USER, NotificationKind::MemberKicked)
        .unwrap();
    let kicked = next_event(&mut h.events, |e| matches!(e, PartyEvent::MemberKicked(_))).await;
    assert!(matches!(kicked, Some(PartyEvent::MemberKicked(m)) if m.id == USER));

    let current = h.session.party().unwrap();
    assert_ne!(current.id(), "remote");
    assert!(current.me().leader());
}

#[tokio::test]
async fn test_state_updates_echo_into_the_arena() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();

    party.me().set_ready(ReadyState::Ready).await.unwrap();
    let changed = next_event(&mut h.events, |e| {
        matches!(e, PartyEvent::MemberUpdated(m) if m.id == USER && m.ready() == ReadyState::Ready)
    })
    .await;
    assert!(changed.is_some());
    assert!(
        eventually(|| {
            let stored = h.service.party(party.id()).unwrap();
            party.me().member().map(|m| m.revision) == Some(stored.members[0].revision)
        })
        .await
    );
}

#[tokio::test]
async fn test_timed_emote_clears_itself() {
    let h = harness();
    let party = h.session.create_party().await.unwrap();
    let me = party.me();

    me.set_emote(EmoteOptions::emote("EID_Floss").run_for(Some(Duration::from_millis(300))))
        .await
        .unwrap();
    assert_eq!(me.member().unwrap().emote().as_deref(), Some("EID_Floss"));
    assert!(eventually(|| me.member().is_some_and(|m| m.emote().is_none())).await);
}

#[tokio::test]
async fn test_join_confirmation_and_decline_events() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();

    h.service.notify(json!({
        "type": NotificationKind::MemberRequireConfirmation.type_name(),
        "party_id": party.id(),
        "account_id": "applicant",
        "sent": "2026-01-01T00:00:00Z",
    }));
    let request = next_event(&mut h.events, |e| matches!(e, PartyEvent::JoinConfirmation(_))).await;
    let Some(PartyEvent::JoinConfirmation(request)) = request else {
        panic!("expected a join confirmation");
    };
    assert_eq!(request.user_id, "applicant");
    request.confirm().await.unwrap();
    assert_eq!(h.service.call_count("party_member_confirm"), 1);

    h.service.notify(json!({
        "type": NotificationKind::InviteDeclined.type_name(),
        "party_id": party.id(),
        "invitee_id": "someone",
        "sent": "2026-01-01T00:00:00Z",
    }));
    let declined = next_event(&mut h.events, |e| matches!(e, PartyEvent::InviteDeclined { .. })).await;
    assert!(matches!(declined, Some(PartyEvent::InviteDeclined { invitee_id, .. }) if invitee_id == "someone"));
}

#[tokio::test]
async fn test_notifications_for_other_parties_are_ignored() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    h.service.insert_party("elsewhere", "host", 16);

    h.service.add_member("elsewhere", FRIEND).unwrap();
    h.service.add_member(party.id(), "visitor").unwrap();
    assert!(next_event(&mut h.events, joined("visitor")).await.is_some());
    assert!(party.get_member(FRIEND).is_none());
}

#[tokio::test]
async fn test_local_position_request_swaps_with_holder() {
    let mut h = harness();
    let party = h.session.create_party().await.unwrap();
    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());
    assert!(eventually(|| party.me().position() == Some(0)).await);

    let err = party.me().set_position(16).await.unwrap_err();
    assert!(matches!(err, PartyError::Validation(_)));

    party.me().set_position(1).await.unwrap();
    let swap = next_event(&mut h.events, |e| matches!(e, PartyEvent::TeamSwap { .. })).await;
    match swap {
        Some(PartyEvent::TeamSwap { member, other }) => {
            assert_eq!(member.id, USER);
            assert_eq!(other.id, FRIEND);
        }
        other => panic!("expected a team swap, got {:?}", other),
    }
    assert!(eventually(|| party.me().position() == Some(1)).await);

    // Asking for the position already held sends nothing.
    let sent = h.service.call_count("party_update_member_meta");
    party.me().set_position(1).await.unwrap();
    assert_eq!(h.service.call_count("party_update_member_meta"), sent);
}

fn presence_status(h: &common::Harness) -> Option<String> {
    h.chat
        .presences()
        .last()
        .and_then(|p| p["Status"].as_str().map(str::to_string))
}

#[tokio::test]
async fn test_presence_tracks_party_size() {
    let mut h = harness_with(SessionConfig {
        status: Some("Party {party_size}/{party_max_size}".to_string()),
        ..config()
    });
    let party = h.session.create_party().await.unwrap();
    assert!(eventually(|| presence_status(&h).as_deref() == Some("Party 1/16")).await);

    h.chat.add_occupant(FRIEND);
    h.service.add_member(party.id(), FRIEND).unwrap();
    assert!(next_event(&mut h.events, joined(FRIEND)).await.is_some());
    assert!(eventually(|| presence_status(&h).as_deref() == Some("Party 2/16")).await);

    h.service
        .remove_member(party.id(), FRIEND, NotificationKind::MemberLeft)
        .unwrap();
    assert!(next_event(&mut h.events, |e| matches!(e, PartyEvent::MemberLeft(_)))
        .await
        .is_some());
    assert!(eventually(|| presence_status(&h).as_deref() == Some("Party 1/16")).await);
}
