//! Display text for timeline events.
//!
//! Sentences produced by [`EventTextFormatter::format`] describe what the
//! sender did without naming the sender; [`EventTextFormatter::compose_row`]
//! prefixes the colored sender name to build a full timeline row.

use tracing::warn;

use crate::{
    names::{NameRenderer, NameStyle, escape_html},
    types::{
        EventKind, GuestAccess, HistoryVisibility, JoinRule, MemberContent, Membership,
        MessageType, TimelineEvent,
    },
    users::UserDirectory,
};

const DIAGNOSTICS_TARGET: &str = "chatview::diagnostics";
const UNDECRYPTABLE_TEXT: &str = "hasn't sent your device the keys to decrypt this message.";
const UNKNOWN_TEXT: &str = "did something this client does not understand.";

/// Renders timeline events into HTML-like display strings.
pub struct EventTextFormatter<'a, D: UserDirectory + ?Sized> {
    names: NameRenderer<'a, D>,
}

impl<'a, D: UserDirectory + ?Sized> EventTextFormatter<'a, D> {
    pub fn new(directory: &'a D, style: &'a NameStyle) -> Self {
        Self {
            names: NameRenderer::new(directory, style),
        }
    }

    pub fn names(&self) -> &NameRenderer<'a, D> {
        &self.names
    }

    /// Text for one event. An empty string means the row should be hidden.
    pub fn format(&self, event: &TimelineEvent) -> String {
        match &event.kind {
            EventKind::RoomCreate { federate: true } => {
                "allowed users on other matrix servers to join this room.".to_owned()
            }
            EventKind::RoomCreate { federate: false } => {
                "blocked users on other matrix servers from joining this room.".to_owned()
            }
            EventKind::GuestAccess { guest_access } => match guest_access {
                GuestAccess::CanJoin => "allowed guests to join the room.".to_owned(),
                GuestAccess::Forbidden => "forbade guests to join the room.".to_owned(),
            },
            EventKind::JoinRules { join_rule } => match join_rule {
                JoinRule::Public => "made the room public.".to_owned(),
                JoinRule::Invite | JoinRule::Knock | JoinRule::Private => {
                    "made the room invite-only.".to_owned()
                }
            },
            EventKind::HistoryVisibility { history_visibility } => {
                let audience = match history_visibility {
                    HistoryVisibility::Shared => "all room members",
                    HistoryVisibility::WorldReadable => "any member or outsider",
                    HistoryVisibility::Joined => "all room members, since the time they joined",
                    HistoryVisibility::Invited => {
                        "all room members, since the time they were invited"
                    }
                };
                format!("made future room history visible to {audience}.")
            }
            EventKind::PowerLevels => "changed the room's permissions.".to_owned(),
            EventKind::Member {
                state_key,
                content,
                previous_content,
            } => self.member_text(event, state_key, content, previous_content.as_ref()),
            EventKind::CanonicalAlias { alias } => match non_blank(alias) {
                Some(alias) => format!("set the room's main address to {}.", escape_html(alias)),
                None => "removed the room's main address.".to_owned(),
            },
            EventKind::Name { name } => match non_blank(name) {
                Some(name) => format!("changed the room's name to \"{}\".", escape_html(name)),
                None => "removed the room's name.".to_owned(),
            },
            EventKind::Topic { topic } => match non_blank(topic) {
                Some(topic) => format!("changed the room's topic to \"{}\".", escape_html(topic)),
                None => "removed the room's topic.".to_owned(),
            },
            EventKind::Avatar { avatar_url } => match non_blank(avatar_url) {
                Some(_) => "changed the room's picture.".to_owned(),
                None => "removed the room's picture.".to_owned(),
            },
            EventKind::Encryption => "turned on encryption for this room.".to_owned(),
            EventKind::Undecryptable { .. } => UNDECRYPTABLE_TEXT.to_owned(),
            EventKind::Message { body, .. } => body.clone(),
            EventKind::Unknown {
                event_type,
                payload,
            } => {
                warn!(
                    target: DIAGNOSTICS_TARGET,
                    event_type = %event_type,
                    event_id = %event.event_id,
                    room_id = %event.room_id,
                    payload = %payload,
                    "unrecognized timeline event kind"
                );
                UNKNOWN_TEXT.to_owned()
            }
        }
    }

    /// Full row text: colored sender name followed by the event text.
    ///
    /// Returns an empty string when the event text is empty.
    pub fn compose_row(&self, event: &TimelineEvent) -> String {
        let text = self.format(event);
        if text.is_empty() {
            return text;
        }

        let sender = if event.kind.is_undecryptable() {
            self.names
                .colored_name_html_with(&event.sender_id, self.names.style().error_color)
        } else {
            self.names.colored_name_html(&event.sender_id)
        };

        match &event.kind {
            EventKind::Message {
                msgtype: MessageType::Emote,
                ..
            } => format!("<i>{sender} {text}</i>"),
            EventKind::Message { .. } => format!("{sender}: {text}"),
            _ => format!("{sender} {text}"),
        }
    }

    /// "X is typing…" line for a room, excluding the viewing account.
    pub fn typing_text(&self, members: &[String], self_id: &str) -> String {
        self.names.typing_text(members, self_id)
    }

    fn member_text(
        &self,
        event: &TimelineEvent,
        state_key: &str,
        content: &MemberContent,
        previous: Option<&MemberContent>,
    ) -> String {
        let previous_membership = previous.map(|prev| prev.membership);
        let target_id = event.target_user_id.as_deref().unwrap_or(state_key);
        let reason = non_blank(&content.reason)
            .map(|reason| format!(", reason: {}", escape_html(reason)))
            .unwrap_or_default();

        if previous_membership != Some(content.membership) {
            match content.membership {
                Membership::Join => {
                    return if previous_membership == Some(Membership::Invite) {
                        "accepted their invitation.".to_owned()
                    } else {
                        "joined the room.".to_owned()
                    };
                }
                Membership::Invite => {
                    return format!(
                        "invited {} to the room.",
                        self.names.colored_name_html(target_id)
                    );
                }
                Membership::Leave if state_key == event.sender_id => {
                    return if previous_membership == Some(Membership::Invite) {
                        format!("declined their invitation{reason}.")
                    } else {
                        format!("left the room{reason}.")
                    };
                }
                Membership::Leave => {
                    let target = self.names.colored_name_html(target_id);
                    return match previous_membership {
                        Some(Membership::Invite) => {
                            format!("withdrew {target}'s invitation{reason}.")
                        }
                        Some(Membership::Ban) => {
                            format!("unbanned {target} from the room{reason}.")
                        }
                        _ => format!("kicked {target} out from the room{reason}."),
                    };
                }
                Membership::Ban => {
                    return format!(
                        "banned {} from the room{reason}.",
                        self.names.colored_name_html(target_id)
                    );
                }
                Membership::Knock => {}
            }
        }

        let Some(previous) = previous else {
            return String::new();
        };

        let mut changed = Vec::new();
        if content.avatar_url != previous.avatar_url {
            changed.push("profile picture".to_owned());
        }
        if content.displayname != previous.displayname {
            changed.push(format!(
                "display name from \"{}\" to \"{}\"",
                escape_html(non_blank(&previous.displayname).unwrap_or(state_key)),
                escape_html(non_blank(&content.displayname).unwrap_or(state_key)),
            ));
        }

        if changed.is_empty() {
            String::new()
        } else {
            format!("changed their {}.", changed.join(" and "))
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}
