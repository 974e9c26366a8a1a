#![allow(dead_code)]

use party_core::{MemoryChatRoom, MemoryPartyService, PartyEvent, PartySession, SessionConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const USER: &str = "local-user";

pub struct Harness {
    pub service: Arc<MemoryPartyService>,
    pub chat: Arc<MemoryChatRoom>,
    pub session: PartySession,
    pub events: broadcast::Receiver<PartyEvent>,
    _pump: JoinHandle<()>,
}

pub fn config() -> SessionConfig {
    SessionConfig {
        user_id: USER.to_string(),
        display_name: "Local User".to_string(),
        member_join_timeout_ms: 300,
        member_state_timeout_ms: 500,
        create_confirm_timeout_ms: 1000,
        ..Default::default()
    }
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let service = Arc::new(MemoryPartyService::new());
    let rx = service.notifications();
    let chat = Arc::new(MemoryChatRoom::new(USER));
    let session = PartySession::new(config, service.clone(), chat.clone());
    let events = session.subscribe();
    let pump = session.reconciler().spawn(rx);
    Harness {
        service,
        chat,
        session,
        events,
        _pump: pump,
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Next event matching `pred`, or `None` after two seconds.
pub async fn next_event(
    events: &mut broadcast::Receiver<PartyEvent>,
    mut pred: impl FnMut(&PartyEvent) -> bool,
) -> Option<PartyEvent> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .ok()
        .flatten()
}

pub fn joined(user_id: &str) -> impl FnMut(&PartyEvent) -> bool + '_ {
    move |e| matches!(e, PartyEvent::MemberJoined(m) if m.id == user_id)
}
