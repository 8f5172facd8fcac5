//! View state reducer fed by backend callbacks.

use view_core::{
    AccountList, BackendEvent, BackendError, EventKind, EventTextFormatter, IngestOutcome,
    InMemoryUserDirectory, NameRenderer, RoomCategory, RoomListReconciler, RoomUpdate,
    TimelineEvent, TimelineReconciler, UserProfile,
};
use tracing::{debug, trace, warn};

use crate::config::ViewConfig;

/// Sidebar room row handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub room_id: String,
    pub category: RoomCategory,
    pub display_name: String,
    pub topic: Option<String>,
    pub typing_text: String,
    pub is_selected: bool,
}

/// Rendered timeline row handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRowView {
    pub event_id: String,
    pub date_ms: u64,
    pub text: String,
    pub is_local_echo: bool,
    pub is_own: bool,
}

/// Full UI snapshot emitted after state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub accounts: Vec<String>,
    pub rooms: Vec<RoomView>,
    pub timeline: Vec<TimelineRowView>,
    pub selected_room_id: Option<String>,
    pub room_filter: String,
    pub error_text: Option<String>,
}

/// Owned list models and view selection, mutated only by callbacks and user actions.
#[derive(Debug, Clone)]
pub struct ViewState {
    config: ViewConfig,
    accounts: AccountList,
    users: InMemoryUserDirectory,
    rooms: RoomListReconciler,
    timeline: TimelineReconciler,
    selected_room_id: Option<String>,
    room_filter: String,
    error_text: Option<String>,
}

impl ViewState {
    pub fn new(config: ViewConfig) -> Self {
        let timeline = TimelineReconciler::new(config.timeline_max_entries, config.echo_window);
        Self {
            config,
            accounts: AccountList::default(),
            users: InMemoryUserDirectory::default(),
            rooms: RoomListReconciler::default(),
            timeline,
            selected_room_id: None,
            room_filter: String::new(),
            error_text: None,
        }
    }

    /// Select the room whose timeline is rendered.
    pub fn select_room(&mut self, room_id: impl Into<String>) {
        let room_id = room_id.into();
        debug!(%room_id, "state selected room");
        self.selected_room_id = Some(room_id);
    }

    /// Set the sidebar filter text.
    pub fn set_room_filter(&mut self, filter: impl Into<String>) {
        self.room_filter = filter.into();
    }

    /// Record a failed backend call for display.
    pub fn set_error(&mut self, error: &BackendError) {
        self.error_text = Some(format!("{} ({})", error.message, error.code));
    }

    /// Feed one backend callback into the reducer.
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::AccountUpdated { user_id } => {
                if self.accounts.add(user_id.clone()) {
                    debug!(%user_id, "account added");
                }
            }
            BackendEvent::AccountDeleted { user_id } => {
                self.accounts.remove(&user_id);
                let removed = self.rooms.remove_account(&user_id);
                debug!(%user_id, removed_rooms = removed, "account removed");
            }
            BackendEvent::UserUpdated(profile) => self.upsert_user(profile),
            BackendEvent::RoomUpdated(update) => self.upsert_room(update),
            BackendEvent::RoomForgotten { user_id, room_id } => {
                self.forget_room(&user_id, &room_id);
            }
            BackendEvent::TimelineEventReceived(event) => self.ingest_timeline_event(event),
            BackendEvent::AsyncCallCompleted {
                request_id,
                error: Some(error),
                ..
            } => {
                warn!(%request_id, code = %error.code, "backend call failed");
                self.set_error(&error);
            }
            BackendEvent::AsyncCallCompleted { request_id, .. } => {
                trace!(%request_id, "backend call completed");
            }
        }
    }

    /// Current immutable snapshot for UI rendering.
    pub fn snapshot(&self) -> ViewSnapshot {
        let formatter = EventTextFormatter::new(&self.users, &self.config.name_style);

        let rooms = self
            .rooms
            .filtered(&self.room_filter)
            .map(|row| RoomView {
                room_id: row.room_id.clone(),
                category: row.category,
                display_name: row.label().to_owned(),
                topic: row.topic.clone(),
                typing_text: row.typing_text.clone(),
                is_selected: self.selected_room_id.as_deref() == Some(row.room_id.as_str()),
            })
            .collect();

        let timeline = match &self.selected_room_id {
            Some(room_id) => self
                .timeline
                .room_entries(room_id)
                .filter(|entry| self.is_visible(&entry.event))
                .filter_map(|entry| {
                    let text = formatter.compose_row(&entry.event);
                    if text.is_empty() {
                        return None;
                    }
                    Some(TimelineRowView {
                        event_id: entry.event.event_id.clone(),
                        date_ms: entry.event.date_ms,
                        text,
                        is_local_echo: entry.event.is_local_echo,
                        is_own: self.is_own(&entry.event.sender_id),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        ViewSnapshot {
            accounts: self.accounts.user_ids().to_vec(),
            rooms,
            timeline,
            selected_room_id: self.selected_room_id.clone(),
            room_filter: self.room_filter.clone(),
            error_text: self.error_text.clone(),
        }
    }

    fn upsert_user(&mut self, profile: UserProfile) {
        self.users.upsert(profile);
    }

    fn upsert_room(&mut self, update: RoomUpdate) {
        let names = NameRenderer::new(&self.users, &self.config.name_style);
        let typing_text = names.typing_text(&update.typing_members, &update.user_id);
        let room_id = update.room_id.clone();
        let outcome = self.rooms.upsert_room(update, typing_text);
        trace!(%room_id, ?outcome, "room update applied");
    }

    fn forget_room(&mut self, user_id: &str, room_id: &str) {
        self.rooms.forget_room(user_id, room_id);
        self.timeline.forget_room(room_id);
        if self.selected_room_id.as_deref() == Some(room_id) {
            debug!(%room_id, "selected room was forgotten");
            self.selected_room_id = None;
        }
    }

    fn ingest_timeline_event(&mut self, event: TimelineEvent) {
        let room_id = event.room_id.clone();
        match self.timeline.ingest(event) {
            IngestOutcome::Appended { evicted } if evicted > 0 => {
                debug!(%room_id, evicted, "timeline cap reached");
            }
            outcome => trace!(%room_id, ?outcome, "timeline event ingested"),
        }
    }

    fn is_visible(&self, event: &TimelineEvent) -> bool {
        let EventKind::Member {
            content,
            previous_content,
            ..
        } = &event.kind
        else {
            return true;
        };
        let membership_change = previous_content
            .as_ref()
            .is_none_or(|previous| previous.membership != content.membership);
        if membership_change {
            self.config.show_membership_events
        } else {
            self.config.show_profile_changes
        }
    }

    fn is_own(&self, sender_id: &str) -> bool {
        match &self.config.self_user_id {
            Some(self_id) => self_id == sender_id,
            None => self.accounts.contains(sender_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use view_core::{MemberContent, Membership, MessageType, RequestId};

    const ALICE: &str = "@alice:example.org";
    const BOB: &str = "@bob:example.org";
    const ROOM: &str = "!room:example.org";

    fn message(event_id: &str, sender: &str, body: &str, echo: bool) -> BackendEvent {
        BackendEvent::TimelineEventReceived(TimelineEvent {
            room_id: ROOM.to_owned(),
            event_id: event_id.to_owned(),
            sender_id: sender.to_owned(),
            date_ms: 1_700_000_000_000,
            is_local_echo: echo,
            target_user_id: None,
            kind: EventKind::Message {
                msgtype: MessageType::Text,
                body: body.to_owned(),
            },
        })
    }

    fn room_update(category: RoomCategory, name: Option<&str>, typing: &[&str]) -> BackendEvent {
        BackendEvent::RoomUpdated(RoomUpdate {
            user_id: ALICE.to_owned(),
            category,
            room_id: ROOM.to_owned(),
            display_name: name.map(str::to_owned),
            avatar_url: None,
            topic: None,
            members: vec![ALICE.to_owned(), BOB.to_owned()],
            typing_members: typing.iter().map(|id| (*id).to_owned()).collect(),
            inviter_id: None,
        })
    }

    fn state() -> ViewState {
        let mut state = ViewState::new(ViewConfig::default());
        state.handle_backend_event(BackendEvent::AccountUpdated {
            user_id: ALICE.to_owned(),
        });
        state.handle_backend_event(BackendEvent::UserUpdated(UserProfile {
            user_id: BOB.to_owned(),
            display_name: Some("Bob".to_owned()),
            avatar_url: None,
            status_message: None,
        }));
        state
    }

    #[test]
    fn local_echo_row_is_replaced_by_confirmation() {
        let mut state = state();
        state.select_room(ROOM);
        state.handle_backend_event(message("txn-1", ALICE, "hi", true));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.timeline.len(), 1);
        assert!(snapshot.timeline[0].is_local_echo);
        assert!(snapshot.timeline[0].is_own);

        state.handle_backend_event(message("$1", ALICE, "hi", false));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.timeline.len(), 1);
        assert_eq!(snapshot.timeline[0].event_id, "$1");
        assert!(!snapshot.timeline[0].is_local_echo);
        assert!(snapshot.timeline[0].text.ends_with(": hi"));
    }

    #[test]
    fn timeline_shows_only_selected_room() {
        let mut state = state();
        state.handle_backend_event(message("$1", BOB, "hello", false));
        assert!(state.snapshot().timeline.is_empty());

        state.select_room(ROOM);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.timeline.len(), 1);
        assert!(!snapshot.timeline[0].is_own);
        assert!(snapshot.timeline[0].text.contains(">Bob</font>"));
    }

    #[test]
    fn room_typing_text_excludes_viewing_account() {
        let mut state = state();
        state.handle_backend_event(room_update(RoomCategory::Rooms, Some("Room"), &[ALICE, BOB]));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.rooms.len(), 1);
        let typing = &snapshot.rooms[0].typing_text;
        assert!(typing.contains(">Bob</font>"));
        assert!(typing.ends_with(" is typing…"));
        assert!(!typing.contains("alice"));
    }

    #[test]
    fn forgotten_room_clears_rows_and_selection() {
        let mut state = state();
        state.handle_backend_event(room_update(RoomCategory::Left, Some("Room"), &[]));
        state.handle_backend_event(message("$1", BOB, "bye", false));
        state.select_room(ROOM);

        state.handle_backend_event(BackendEvent::RoomForgotten {
            user_id: ALICE.to_owned(),
            room_id: ROOM.to_owned(),
        });

        let snapshot = state.snapshot();
        assert!(snapshot.rooms.is_empty());
        assert!(snapshot.timeline.is_empty());
        assert_eq!(snapshot.selected_room_id, None);
        assert!(state.timeline.is_empty());
    }

    #[test]
    fn room_filter_narrows_sidebar() {
        let mut state = state();
        state.handle_backend_event(room_update(RoomCategory::Rooms, Some("Rust Dev"), &[]));

        state.set_room_filter("go");
        assert!(state.snapshot().rooms.is_empty());
        state.set_room_filter("rust");
        assert_eq!(state.snapshot().rooms.len(), 1);
    }

    #[test]
    fn hidden_membership_and_empty_profile_rows_are_suppressed() {
        let config = ViewConfig {
            show_membership_events: false,
            ..ViewConfig::default()
        };
        let mut state = ViewState::new(config);
        state.select_room(ROOM);

        let mut joined = MemberContent::new(Membership::Join);
        joined.displayname = Some("Bob".into());
        for (event_id, previous) in [("$join", None), ("$noop", Some(joined.clone()))] {
            state.handle_backend_event(BackendEvent::TimelineEventReceived(TimelineEvent {
                room_id: ROOM.to_owned(),
                event_id: event_id.to_owned(),
                sender_id: BOB.to_owned(),
                date_ms: 1,
                is_local_echo: false,
                target_user_id: None,
                kind: EventKind::Member {
                    state_key: BOB.to_owned(),
                    content: joined.clone(),
                    previous_content: previous,
                },
            }));
        }

        assert_eq!(state.timeline.len(), 2);
        assert!(state.snapshot().timeline.is_empty());
    }

    #[test]
    fn failed_call_completion_sets_error_text() {
        let mut state = state();
        state.handle_backend_event(BackendEvent::AsyncCallCompleted {
            request_id: RequestId::new(),
            result: None,
            error: Some(BackendError::from_kind(
                "M_FORBIDDEN",
                vec![serde_json::Value::from("not allowed")],
            )),
        });

        assert_eq!(
            state.snapshot().error_text.as_deref(),
            Some("not allowed (M_FORBIDDEN)")
        );
    }

    #[test]
    fn deleted_account_drops_its_rooms() {
        let mut state = state();
        state.handle_backend_event(room_update(RoomCategory::Rooms, Some("Room"), &[]));
        state.handle_backend_event(BackendEvent::AccountDeleted {
            user_id: ALICE.to_owned(),
        });

        let snapshot = state.snapshot();
        assert!(snapshot.accounts.is_empty());
        assert!(snapshot.rooms.is_empty());
    }
}
