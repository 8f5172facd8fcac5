use tracing::{debug, trace};

use crate::types::TimelineEvent;

/// Default cap on retained timeline entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
/// Default number of most recent entries searched for a matching local echo.
pub const DEFAULT_ECHO_WINDOW: usize = 250;

/// One de-duplicated timeline row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub event: TimelineEvent,
    /// Monotonic arrival counter; replacing an entry assigns a new value.
    pub arrival: u64,
}

impl TimelineEntry {
    pub fn is_local_echo(&self) -> bool {
        self.event.is_local_echo
    }

    pub fn is_undecryptable(&self) -> bool {
        self.event.kind.is_undecryptable()
    }

    pub fn is_state(&self) -> bool {
        self.event.kind.is_state()
    }
}

/// What [`TimelineReconciler::ingest`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event was appended as a new entry.
    Appended { evicted: usize },
    /// Event replaced the pending local echo at `index`.
    ReplacedEcho { index: usize },
    /// Event overwrote the entry with the same event ID at `index`.
    Updated { index: usize },
    /// Undecryptable duplicate ignored; the decrypted entry at `index` was kept.
    KeptExisting { index: usize },
}

/// Bounded, ordered timeline with local-echo replacement and event-ID upserts.
#[derive(Debug, Clone)]
pub struct TimelineReconciler {
    entries: Vec<TimelineEntry>,
    max_entries: usize,
    echo_window: usize,
    next_arrival: u64,
}

impl Default for TimelineReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_ECHO_WINDOW)
    }
}

impl TimelineReconciler {
    /// Create a timeline with an entry cap (`max_entries >= 1`) and echo search window.
    pub fn new(max_entries: usize, echo_window: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            echo_window: echo_window.max(1),
            next_arrival: 0,
        }
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Entries of one room in arrival order.
    pub fn room_entries<'a>(
        &'a self,
        room_id: &'a str,
    ) -> impl Iterator<Item = &'a TimelineEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.event.room_id == room_id)
    }

    pub fn get(&self, event_id: &str) -> Option<&TimelineEntry> {
        self.position_of(event_id).map(|index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Merge one event notification into the timeline.
    pub fn ingest(&mut self, event: TimelineEvent) -> IngestOutcome {
        if event.is_local_echo {
            trace!(room_id = %event.room_id, event_id = %event.event_id, "local echo appended");
            return self.append(event);
        }

        let existing = self.position_of(&event.event_id);
        if existing.is_none()
            && let Some(index) = self.find_echo(&event)
        {
            debug!(
                room_id = %event.room_id,
                event_id = %event.event_id,
                index,
                "confirmed event replaced local echo"
            );
            self.replace(index, event);
            return IngestOutcome::ReplacedEcho { index };
        }

        match existing {
            Some(index)
                if event.kind.is_undecryptable() && !self.entries[index].is_undecryptable() =>
            {
                debug!(
                    room_id = %event.room_id,
                    event_id = %event.event_id,
                    kind = event.kind.label(),
                    "kept decrypted entry over undecryptable duplicate"
                );
                IngestOutcome::KeptExisting { index }
            }
            Some(index) => {
                trace!(event_id = %event.event_id, index, "timeline entry updated");
                self.replace(index, event);
                IngestOutcome::Updated { index }
            }
            None => self.append(event),
        }
    }

    /// Remove every entry of a room. Returns how many entries were removed.
    pub fn forget_room(&mut self, room_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.event.room_id != room_id);
        let removed = before - self.entries.len();
        debug!(%room_id, removed, "room forgotten from timeline");
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn append(&mut self, event: TimelineEvent) -> IngestOutcome {
        let arrival = self.bump_arrival();
        self.entries.push(TimelineEntry { event, arrival });
        let evicted = self.trim_to_max();
        IngestOutcome::Appended { evicted }
    }

    fn replace(&mut self, index: usize, event: TimelineEvent) {
        let arrival = self.bump_arrival();
        self.entries[index] = TimelineEntry { event, arrival };
    }

    fn bump_arrival(&mut self) -> u64 {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        arrival
    }

    /// Oldest pending local echo among the most recent `echo_window` entries
    /// that `event` confirms.
    fn find_echo(&self, event: &TimelineEvent) -> Option<usize> {
        let start = self.entries.len().saturating_sub(self.echo_window);
        self.entries[start..]
            .iter()
            .position(|entry| event.confirms(&entry.event))
            .map(|offset| start + offset)
    }

    fn position_of(&self, event_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| !entry.event.is_local_echo && entry.event.event_id == event_id)
    }

    fn trim_to_max(&mut self) -> usize {
        if self.entries.len() <= self.max_entries {
            return 0;
        }

        let excess = self.entries.len() - self.max_entries;
        self.entries.drain(0..excess);
        trace!(excess, "evicted oldest timeline entries");
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncryptionScheme, EventKind, MessageType};

    const ROOM: &str = "!room:example.org";
    const ALICE: &str = "@alice:example.org";

    fn text(body: &str) -> EventKind {
        EventKind::Message {
            msgtype: MessageType::Text,
            body: body.to_owned(),
        }
    }

    fn event(event_id: &str, kind: EventKind) -> TimelineEvent {
        TimelineEvent {
            room_id: ROOM.to_owned(),
            event_id: event_id.to_owned(),
            sender_id: ALICE.to_owned(),
            date_ms: 1_700_000_000_000,
            is_local_echo: false,
            target_user_id: None,
            kind,
        }
    }

    fn echo(txn_id: &str, kind: EventKind) -> TimelineEvent {
        TimelineEvent {
            is_local_echo: true,
            ..event(txn_id, kind)
        }
    }

    fn undecryptable(event_id: &str) -> TimelineEvent {
        event(
            event_id,
            EventKind::Undecryptable {
                scheme: EncryptionScheme::Megolm,
            },
        )
    }

    fn ids(timeline: &TimelineReconciler) -> Vec<&str> {
        timeline
            .entries()
            .iter()
            .map(|entry| entry.event.event_id.as_str())
            .collect()
    }

    #[test]
    fn confirmed_event_replaces_local_echo_in_place() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(event("$0", text("before")));
        timeline.ingest(echo("txn-1", text("hello")));
        timeline.ingest(event("$2", text("after")));

        let outcome = timeline.ingest(event("$1", text("hello")));

        assert_eq!(outcome, IngestOutcome::ReplacedEcho { index: 1 });
        assert_eq!(timeline.len(), 3);
        assert_eq!(ids(&timeline), ["$0", "$1", "$2"]);
        assert!(!timeline.entries()[1].is_local_echo());
    }

    #[test]
    fn local_echoes_are_always_appended() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(echo("txn-1", text("same")));
        let outcome = timeline.ingest(echo("txn-1", text("same")));

        assert_eq!(outcome, IngestOutcome::Appended { evicted: 0 });
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn identical_echoes_are_confirmed_oldest_first() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(echo("txn-1", text("ok")));
        timeline.ingest(echo("txn-2", text("ok")));

        assert_eq!(
            timeline.ingest(event("$1", text("ok"))),
            IngestOutcome::ReplacedEcho { index: 0 }
        );
        assert_eq!(
            timeline.ingest(event("$2", text("ok"))),
            IngestOutcome::ReplacedEcho { index: 1 }
        );
        assert_eq!(ids(&timeline), ["$1", "$2"]);
    }

    #[test]
    fn redelivered_confirmation_does_not_consume_another_echo() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(echo("txn-1", text("ok")));
        timeline.ingest(echo("txn-2", text("ok")));

        let first = timeline.ingest(event("$1", text("ok")));
        let redelivered = timeline.ingest(event("$1", text("ok")));

        assert_eq!(first, IngestOutcome::ReplacedEcho { index: 0 });
        assert_eq!(redelivered, IngestOutcome::Updated { index: 0 });
        assert_eq!(ids(&timeline), vec!["$1", "txn-2"]);
        assert!(timeline.entries()[1].is_local_echo());

        let second = timeline.ingest(event("$2", text("ok")));
        assert_eq!(second, IngestOutcome::ReplacedEcho { index: 1 });
        assert_eq!(ids(&timeline), vec!["$1", "$2"]);
    }

    #[test]
    fn echo_outside_window_is_not_matched() {
        let mut timeline = TimelineReconciler::new(50, 2);
        timeline.ingest(echo("txn-1", text("old")));
        timeline.ingest(event("$a", text("a")));
        timeline.ingest(event("$b", text("b")));

        let outcome = timeline.ingest(event("$1", text("old")));
        assert_eq!(outcome, IngestOutcome::Appended { evicted: 0 });
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn echo_in_other_room_is_not_matched() {
        let mut timeline = TimelineReconciler::new(50, 10);
        let mut other_room = echo("txn-1", text("hi"));
        other_room.room_id = "!other:example.org".to_owned();
        timeline.ingest(other_room);

        let outcome = timeline.ingest(event("$1", text("hi")));
        assert_eq!(outcome, IngestOutcome::Appended { evicted: 0 });
    }

    #[test]
    fn duplicate_event_id_is_upserted() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(event("$1", text("v1")));
        timeline.ingest(event("$2", text("other")));

        let outcome = timeline.ingest(event("$1", text("v2")));
        assert_eq!(outcome, IngestOutcome::Updated { index: 0 });
        assert_eq!(timeline.len(), 2);
        assert_eq!(
            timeline.get("$1").map(|entry| &entry.event.kind),
            Some(&text("v2"))
        );
    }

    #[test]
    fn undecryptable_duplicate_does_not_clobber_decrypted_entry() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(event("$1", text("secret")));

        let outcome = timeline.ingest(undecryptable("$1"));
        assert_eq!(outcome, IngestOutcome::KeptExisting { index: 0 });
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.entries()[0].event.kind, text("secret"));
    }

    #[test]
    fn decrypted_event_replaces_undecryptable_placeholder() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(undecryptable("$1"));
        assert_eq!(
            timeline.ingest(undecryptable("$1")),
            IngestOutcome::Updated { index: 0 }
        );

        let outcome = timeline.ingest(event("$1", text("now readable")));
        assert_eq!(outcome, IngestOutcome::Updated { index: 0 });
        assert_eq!(timeline.len(), 1);
        assert!(!timeline.entries()[0].is_undecryptable());
    }

    #[test]
    fn cap_keeps_most_recent_entries() {
        let max = 5;
        let mut timeline = TimelineReconciler::new(max, 3);
        let mut evicted_total = 0;
        for i in 0..max + 3 {
            if let IngestOutcome::Appended { evicted } =
                timeline.ingest(event(&format!("${i}"), text(&format!("m{i}"))))
            {
                evicted_total += evicted;
            }
        }

        assert_eq!(timeline.len(), max);
        assert_eq!(evicted_total, 3);
        assert_eq!(ids(&timeline), ["$3", "$4", "$5", "$6", "$7"]);
    }

    #[test]
    fn forget_room_removes_only_that_room() {
        let mut timeline = TimelineReconciler::new(50, 10);
        timeline.ingest(event("$1", text("a")));
        let mut other = event("$2", text("b"));
        other.room_id = "!other:example.org".to_owned();
        timeline.ingest(other);

        assert_eq!(timeline.forget_room(ROOM), 1);
        assert_eq!(ids(&timeline), ["$2"]);
        assert_eq!(timeline.room_entries(ROOM).count(), 0);
        assert_eq!(timeline.room_entries("!other:example.org").count(), 1);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let mut timeline = TimelineReconciler::new(0, 0);
        timeline.ingest(event("$1", text("a")));
        timeline.ingest(event("$2", text("b")));
        assert_eq!(timeline.max_entries(), 1);
        assert_eq!(ids(&timeline), ["$2"]);
    }
}
