use std::collections::HashMap;

use tracing::trace;

use crate::types::UserProfile;

/// Read access to cached user profiles (`getUser` / `getUserDisplayName`).
pub trait UserDirectory {
    fn user(&self, user_id: &str) -> Option<UserProfile>;

    fn display_name(&self, user_id: &str) -> Option<String> {
        self.user(user_id)?.display_name
    }
}

/// User profiles kept up to date from `UserUpdated` callbacks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<String, UserProfile>,
}

impl InMemoryUserDirectory {
    /// Insert or replace a profile.
    pub fn upsert(&mut self, profile: UserProfile) {
        trace!(user_id = %profile.user_id, "user profile upserted");
        self.users.insert(profile.user_id.clone(), profile);
    }

    pub fn remove(&mut self, user_id: &str) -> Option<UserProfile> {
        self.users.remove(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn user(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).cloned()
    }

    fn display_name(&self, user_id: &str) -> Option<String> {
        self.users.get(user_id)?.display_name.clone()
    }
}

/// Ordered list of logged-in accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountList {
    user_ids: Vec<String>,
}

impl AccountList {
    /// Add an account unless it is already listed. Returns `true` when added.
    pub fn add(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.contains(&user_id) {
            return false;
        }
        self.user_ids.push(user_id);
        true
    }

    /// Remove an account. Returns `true` when it was listed.
    pub fn remove(&mut self, user_id: &str) -> bool {
        let before = self.user_ids.len();
        self.user_ids.retain(|id| id != user_id);
        self.user_ids.len() != before
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
    }

    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str, name: Option<&str>) -> UserProfile {
        UserProfile {
            user_id: user_id.to_owned(),
            display_name: name.map(str::to_owned),
            avatar_url: None,
            status_message: None,
        }
    }

    #[test]
    fn upsert_replaces_existing_profile() {
        let mut users = InMemoryUserDirectory::default();
        users.upsert(profile("@alice:example.org", Some("Alice")));
        users.upsert(profile("@alice:example.org", Some("Alice B.")));

        assert_eq!(users.len(), 1);
        assert_eq!(
            users.display_name("@alice:example.org").as_deref(),
            Some("Alice B.")
        );
        assert_eq!(users.display_name("@nobody:example.org"), None);
    }

    #[test]
    fn default_display_name_reads_through_user() {
        struct Fixed;
        impl UserDirectory for Fixed {
            fn user(&self, user_id: &str) -> Option<UserProfile> {
                Some(profile(user_id, Some("Fixed")))
            }
        }

        assert_eq!(Fixed.display_name("@x:y").as_deref(), Some("Fixed"));
    }

    #[test]
    fn accounts_are_unique_and_ordered() {
        let mut accounts = AccountList::default();
        assert!(accounts.add("@a:x"));
        assert!(accounts.add("@b:x"));
        assert!(!accounts.add("@a:x"));
        assert_eq!(accounts.user_ids(), ["@a:x", "@b:x"]);

        assert!(accounts.remove("@a:x"));
        assert!(!accounts.remove("@a:x"));
        assert_eq!(accounts.user_ids(), ["@b:x"]);
    }
}
