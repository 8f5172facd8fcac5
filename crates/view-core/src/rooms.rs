use tracing::{debug, trace};

use crate::{
    names::filter_matches,
    types::{RoomCategory, RoomUpdate},
};

/// Room list row backing the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRow {
    pub user_id: String,
    pub category: RoomCategory,
    pub room_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub topic: Option<String>,
    pub members: Vec<String>,
    pub inviter_id: Option<String>,
    /// Rendered "X is typing…" line; empty when nobody is typing.
    pub typing_text: String,
}

impl RoomRow {
    /// Name shown in the list: display name, or room ID when unnamed.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.room_id)
    }
}

/// What [`RoomListReconciler::upsert_room`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomUpsert {
    Inserted { index: usize },
    Updated { index: usize },
    /// Row moved from another category, keeping its position.
    Moved { index: usize, from: RoomCategory },
}

/// Room summaries keyed by `(user_id, room_id)` within a category.
#[derive(Debug, Clone, Default)]
pub struct RoomListReconciler {
    rows: Vec<RoomRow>,
}

impl RoomListReconciler {
    pub fn rows(&self) -> &[RoomRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, user_id: &str, room_id: &str) -> Option<&RoomRow> {
        self.rows
            .iter()
            .find(|row| row.user_id == user_id && row.room_id == room_id)
    }

    /// Rows of one account under one category.
    pub fn rows_for<'a>(
        &'a self,
        user_id: &'a str,
        category: RoomCategory,
    ) -> impl Iterator<Item = &'a RoomRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.user_id == user_id && row.category == category)
    }

    /// Rows whose label matches every word of `filter`.
    pub fn filtered<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a RoomRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| filter_matches(filter, row.label()))
    }

    /// Insert or update a room from a backend update.
    ///
    /// `typing_text` is the rendered typing line for the update's typing
    /// members, already excluding the viewing account.
    pub fn upsert_room(&mut self, update: RoomUpdate, typing_text: String) -> RoomUpsert {
        let RoomUpdate {
            user_id,
            category,
            room_id,
            display_name,
            avatar_url,
            topic,
            members,
            typing_members: _,
            inviter_id,
        } = update;

        let same_category = self.rows.iter().position(|row| {
            row.user_id == user_id && row.room_id == room_id && row.category == category
        });
        let other_category = self.rows.iter().position(|row| {
            row.user_id == user_id && row.room_id == room_id && row.category != category
        });

        let mut row = RoomRow {
            user_id,
            category,
            room_id,
            display_name,
            avatar_url,
            topic,
            members,
            inviter_id,
            typing_text,
        };

        if let Some(index) = same_category {
            trace!(room_id = %row.room_id, ?category, "room row updated");
            self.rows[index] = row;
            if let Some(stale) = other_category {
                self.rows.remove(stale);
                return RoomUpsert::Updated {
                    index: if stale < index { index - 1 } else { index },
                };
            }
            return RoomUpsert::Updated { index };
        }

        if let Some(index) = other_category {
            let stale = &self.rows[index];
            let from = stale.category;
            row.display_name = row.display_name.or_else(|| stale.display_name.clone());
            row.avatar_url = row.avatar_url.or_else(|| stale.avatar_url.clone());
            row.topic = row.topic.or_else(|| stale.topic.clone());
            row.inviter_id = row.inviter_id.or_else(|| stale.inviter_id.clone());
            debug!(room_id = %row.room_id, ?from, to = ?category, "room moved between categories");
            self.rows[index] = row;
            return RoomUpsert::Moved { index, from };
        }

        trace!(room_id = %row.room_id, ?category, "room row inserted");
        self.rows.push(row);
        RoomUpsert::Inserted {
            index: self.rows.len() - 1,
        }
    }

    /// Delete the row of a room under a category. Returns `true` when found.
    pub fn remove_room(&mut self, user_id: &str, room_id: &str, category: RoomCategory) -> bool {
        let Some(index) = self.rows.iter().position(|row| {
            row.user_id == user_id && row.room_id == room_id && row.category == category
        }) else {
            return false;
        };
        self.rows.remove(index);
        true
    }

    /// Delete every row of a room for an account, whatever its category.
    pub fn forget_room(&mut self, user_id: &str, room_id: &str) -> usize {
        let before = self.rows.len();
        self.rows
            .retain(|row| !(row.user_id == user_id && row.room_id == room_id));
        before - self.rows.len()
    }

    /// Delete every row of an account.
    pub fn remove_account(&mut self, user_id: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.user_id != user_id);
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "@alice:example.org";
    const ROOM: &str = "!room:example.org";

    fn update(category: RoomCategory, name: Option<&str>) -> RoomUpdate {
        RoomUpdate {
            user_id: ALICE.to_owned(),
            category,
            room_id: ROOM.to_owned(),
            display_name: name.map(str::to_owned),
            avatar_url: name.map(|_| "mxc://example.org/avatar".to_owned()),
            topic: name.map(|_| "Topic".to_owned()),
            members: vec![ALICE.to_owned()],
            typing_members: Vec::new(),
            inviter_id: None,
        }
    }

    #[test]
    fn inserts_then_updates_same_category() {
        let mut rooms = RoomListReconciler::default();
        assert_eq!(
            rooms.upsert_room(update(RoomCategory::Rooms, Some("Old")), String::new()),
            RoomUpsert::Inserted { index: 0 }
        );
        assert_eq!(
            rooms.upsert_room(update(RoomCategory::Rooms, Some("New")), "typing".into()),
            RoomUpsert::Updated { index: 0 }
        );

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms.rows()[0].display_name.as_deref(), Some("New"));
        assert_eq!(rooms.rows()[0].typing_text, "typing");
    }

    #[test]
    fn category_change_keeps_position_and_inherits_profile() {
        let mut rooms = RoomListReconciler::default();
        let mut first = update(RoomCategory::Rooms, Some("First"));
        first.room_id = "!first:example.org".to_owned();
        rooms.upsert_room(first, String::new());
        rooms.upsert_room(update(RoomCategory::Invites, Some("Party")), String::new());

        let outcome = rooms.upsert_room(update(RoomCategory::Left, None), String::new());

        assert_eq!(
            outcome,
            RoomUpsert::Moved {
                index: 1,
                from: RoomCategory::Invites
            }
        );
        assert_eq!(rooms.len(), 2);
        let row = rooms.get(ALICE, ROOM).expect("room should still be listed");
        assert_eq!(row.category, RoomCategory::Left);
        assert_eq!(row.display_name.as_deref(), Some("Party"));
        assert_eq!(row.topic.as_deref(), Some("Topic"));
        assert_eq!(
            row.avatar_url.as_deref(),
            Some("mxc://example.org/avatar")
        );
    }

    #[test]
    fn rooms_are_scoped_per_account() {
        let mut rooms = RoomListReconciler::default();
        rooms.upsert_room(update(RoomCategory::Rooms, Some("A")), String::new());
        let mut other = update(RoomCategory::Invites, Some("B"));
        other.user_id = "@bob:example.org".to_owned();
        rooms.upsert_room(other, String::new());

        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms.rows_for(ALICE, RoomCategory::Rooms).count(), 1);
        assert_eq!(rooms.rows_for(ALICE, RoomCategory::Invites).count(), 0);

        assert_eq!(rooms.remove_account("@bob:example.org"), 1);
        assert_eq!(rooms.len(), 1);
    }

    #[test]
    fn remove_requires_matching_category() {
        let mut rooms = RoomListReconciler::default();
        rooms.upsert_room(update(RoomCategory::Rooms, Some("A")), String::new());

        assert!(!rooms.remove_room(ALICE, ROOM, RoomCategory::Left));
        assert!(rooms.remove_room(ALICE, ROOM, RoomCategory::Rooms));
        assert!(rooms.is_empty());
    }

    #[test]
    fn forget_removes_room_from_every_category() {
        let mut rooms = RoomListReconciler::default();
        rooms.upsert_room(update(RoomCategory::Left, Some("A")), String::new());
        assert_eq!(rooms.forget_room(ALICE, ROOM), 1);
        assert!(rooms.get(ALICE, ROOM).is_none());
    }

    #[test]
    fn filter_matches_label_or_room_id() {
        let mut rooms = RoomListReconciler::default();
        rooms.upsert_room(update(RoomCategory::Rooms, Some("Rust Dev")), String::new());
        let mut unnamed = update(RoomCategory::Rooms, None);
        unnamed.room_id = "!unnamed:example.org".to_owned();
        rooms.upsert_room(unnamed, String::new());

        assert_eq!(rooms.filtered("dev").count(), 1);
        assert_eq!(rooms.filtered("unnamed").count(), 1);
        assert_eq!(rooms.filtered("").count(), 2);
    }
}
