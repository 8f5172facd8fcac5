//! View-model core shared by chat front ends.
//!
//! This crate defines the backend callback/command protocol, the event text
//! formatter, the timeline and room list reconcilers, and the async call
//! relay used to await backend results.

/// Future-based relay of asynchronous backend call completions.
pub mod calls;
/// Async command/callback channel primitives.
pub mod channel;
/// Stable backend error types and error-kind classification.
pub mod error;
/// Display text for timeline events.
pub mod format;
/// Display names, name colors and markup escaping.
pub mod names;
/// Completion payload normalization.
pub mod normalization;
/// Room list model.
pub mod rooms;
/// Timeline reconciliation with local-echo replacement.
pub mod timeline;
/// Backend-facing protocol types (callbacks, commands, event payloads).
pub mod types;
/// User profile directory and account list.
pub mod users;

pub use calls::{CallError, PendingCall, PendingCalls};
pub use channel::{BackendChannelError, BackendChannels, CommandSender, EventSender, EventStream};
pub use error::{BackendError, BackendErrorCategory, classify_error_kind};
pub use format::EventTextFormatter;
pub use names::{NameColor, NameRenderer, NameStyle, escape_html, filter_matches, hue_from};
pub use normalization::normalize_call_completion;
pub use rooms::{RoomListReconciler, RoomRow, RoomUpsert};
pub use timeline::{IngestOutcome, TimelineEntry, TimelineReconciler};
pub use types::{
    BackendEvent, EncryptionScheme, EventKind, GuestAccess, HistoryVisibility, JoinRule,
    MemberContent, Membership, MessageType, RequestId, RoomCategory, RoomUpdate, TimelineEvent,
    UserProfile, ViewCommand,
};
pub use users::{AccountList, InMemoryUserDirectory, UserDirectory};
