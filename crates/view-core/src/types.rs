use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use uuid::Uuid;

use crate::error::BackendError;

/// Identifier correlating a backend call with its completion callback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Room membership state carried by `m.room.member` events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Ban,
    Knock,
}

/// Content (or previous content) of a membership event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberContent {
    pub membership: Membership,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Free-text reason attached to kicks, bans and leaves.
    #[serde(default)]
    pub reason: Option<String>,
}

impl MemberContent {
    pub fn new(membership: Membership) -> Self {
        Self {
            membership,
            displayname: None,
            avatar_url: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuestAccess {
    CanJoin,
    Forbidden,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinRule {
    Public,
    Invite,
    Knock,
    Private,
}

/// Who can read future room history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryVisibility {
    Shared,
    WorldReadable,
    Joined,
    Invited,
}

/// Encryption scheme of an event the client could not decrypt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionScheme {
    Olm,
    Megolm,
}

/// Matrix message type of a room message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Standard text message (`m.text`).
    Text,
    /// Notice message (`m.notice`).
    Notice,
    /// Emote message (`m.emote`), rendered as an action of the sender.
    Emote,
}

/// Kind-specific payload of a timeline event.
///
/// Equality of two `EventKind` values is what "same content" means when a
/// confirmed event is matched against a pending local echo.
///
/// A `type` this client does not know deserializes to [`EventKind::Unknown`]
/// with the whole raw object as payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(remote = "Self", tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    RoomCreate {
        federate: bool,
    },
    GuestAccess {
        guest_access: GuestAccess,
    },
    JoinRules {
        join_rule: JoinRule,
    },
    HistoryVisibility {
        history_visibility: HistoryVisibility,
    },
    PowerLevels,
    Member {
        /// User whose membership changed.
        state_key: String,
        content: MemberContent,
        #[serde(default)]
        previous_content: Option<MemberContent>,
    },
    CanonicalAlias {
        #[serde(default)]
        alias: Option<String>,
    },
    Name {
        #[serde(default)]
        name: Option<String>,
    },
    Topic {
        #[serde(default)]
        topic: Option<String>,
    },
    Avatar {
        #[serde(default)]
        avatar_url: Option<String>,
    },
    Encryption,
    Undecryptable {
        scheme: EncryptionScheme,
    },
    Message {
        msgtype: MessageType,
        body: String,
    },
    /// Event type this client has no rendering for.
    Unknown {
        event_type: String,
        #[serde(default)]
        payload: Value,
    },
}

const KNOWN_KIND_TAGS: &[&str] = &[
    "room_create",
    "guest_access",
    "join_rules",
    "history_visibility",
    "power_levels",
    "member",
    "canonical_alias",
    "name",
    "topic",
    "avatar",
    "encryption",
    "undecryptable",
    "message",
    "unknown",
];

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EventKind::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let Some(tag) = raw.get("type").and_then(Value::as_str) else {
            return Err(de::Error::missing_field("type"));
        };
        if KNOWN_KIND_TAGS.contains(&tag) {
            return EventKind::deserialize(raw).map_err(de::Error::custom);
        }
        Ok(Self::Unknown {
            event_type: tag.to_owned(),
            payload: raw,
        })
    }
}

impl EventKind {
    /// Whether the payload could not be decrypted client-side.
    pub fn is_undecryptable(&self) -> bool {
        matches!(self, Self::Undecryptable { .. })
    }

    /// Whether the event renders as a sentence about its sender rather than a message body.
    pub fn is_state(&self) -> bool {
        !matches!(self, Self::Message { .. })
    }

    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RoomCreate { .. } => "RoomCreate",
            Self::GuestAccess { .. } => "GuestAccess",
            Self::JoinRules { .. } => "JoinRules",
            Self::HistoryVisibility { .. } => "HistoryVisibility",
            Self::PowerLevels => "PowerLevels",
            Self::Member { .. } => "Member",
            Self::CanonicalAlias { .. } => "CanonicalAlias",
            Self::Name { .. } => "Name",
            Self::Topic { .. } => "Topic",
            Self::Avatar { .. } => "Avatar",
            Self::Encryption => "Encryption",
            Self::Undecryptable {
                scheme: EncryptionScheme::Olm,
            } => "OlmEvent",
            Self::Undecryptable {
                scheme: EncryptionScheme::Megolm,
            } => "MegolmEvent",
            Self::Message { .. } => "Message",
            Self::Unknown { .. } => "Unknown",
        }
    }
}

/// Timeline event notification delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub room_id: String,
    /// Event ID; provisional (for example a transaction ID) for local echoes.
    pub event_id: String,
    pub sender_id: String,
    /// Server timestamp in milliseconds since Unix epoch.
    pub date_ms: u64,
    /// Client-predicted event not yet confirmed by the backend.
    #[serde(default)]
    pub is_local_echo: bool,
    /// Second user named by the event (invite/kick/ban target).
    #[serde(default)]
    pub target_user_id: Option<String>,
    pub kind: EventKind,
}

impl TimelineEvent {
    /// Whether `self` is the confirmed counterpart of the pending local echo `echo`.
    pub fn confirms(&self, echo: &TimelineEvent) -> bool {
        echo.is_local_echo
            && echo.room_id == self.room_id
            && echo.sender_id == self.sender_id
            && echo.kind == self.kind
    }
}

/// Sidebar section a room is listed under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoomCategory {
    Invites,
    Rooms,
    Left,
}

/// Payload of the backend's room-updated callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomUpdate {
    /// Account that sees the room.
    pub user_id: String,
    pub category: RoomCategory,
    pub room_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub typing_members: Vec<String>,
    #[serde(default)]
    pub inviter_id: Option<String>,
}

/// Cached profile of a user (an account or a room member).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Callback notifications emitted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackendEvent {
    /// A logged-in account appeared or changed.
    AccountUpdated { user_id: String },
    /// A logged-in account was removed.
    AccountDeleted { user_id: String },
    /// Profile data for a user changed.
    UserUpdated(UserProfile),
    /// Room summary changed.
    RoomUpdated(RoomUpdate),
    /// Room was left and forgotten by an account.
    RoomForgotten { user_id: String, room_id: String },
    /// New, confirmed or local-echo timeline event.
    TimelineEventReceived(TimelineEvent),
    /// Completion of a previously dispatched backend call.
    AsyncCallCompleted {
        request_id: RequestId,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<BackendError>,
    },
}

impl BackendEvent {
    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AccountUpdated { .. } => "AccountUpdated",
            Self::AccountDeleted { .. } => "AccountDeleted",
            Self::UserUpdated(_) => "UserUpdated",
            Self::RoomUpdated(_) => "RoomUpdated",
            Self::RoomForgotten { .. } => "RoomForgotten",
            Self::TimelineEventReceived(_) => "TimelineEventReceived",
            Self::AsyncCallCompleted { .. } => "AsyncCallCompleted",
        }
    }
}

/// View-level commands forwarded to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewCommand {
    /// Start or stop the typing notice of `user_id` in a room.
    SetTyping {
        user_id: String,
        room_id: String,
        typing: bool,
    },
    /// Generic backend call; the result arrives as `AsyncCallCompleted`.
    Call {
        request_id: RequestId,
        method: String,
        args: Vec<Value>,
    },
}

impl ViewCommand {
    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetTyping { .. } => "SetTyping",
            Self::Call { .. } => "Call",
        }
    }
}
