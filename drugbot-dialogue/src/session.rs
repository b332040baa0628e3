//! Per-user session store with time-based expiry.
//!
//! One record per user id. A record whose `last_updated` is older than
//! `now - ttl` is treated as absent: `evict_expired` purges it, and `update`
//! hides it from the caller and drops it.

use crate::content::DrugCode;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Default idle window before a selection is forgotten.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

/// Where a user is in the two-step menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No pending selection
    Initial,
    /// A code was chosen, waiting for the confirmation keystroke
    AwaitingConfirm,
}

/// Session state for a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: String,
    pub selection: Option<DrugCode>,
    pub step: Step,
    pub last_updated: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        user_id: impl Into<String>,
        selection: Option<DrugCode>,
        step: Step,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            selection,
            step,
            last_updated: now,
        }
    }

    /// A record with no pending selection.
    pub fn initial(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(user_id, None, Step::Initial, now)
    }
}

/// Concurrent map of user id to session record.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionRecord>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        // A cutoff before the representable range means nothing can be that old.
        now.checked_sub_signed(self.ttl)
            .is_some_and(|cutoff| record.last_updated < cutoff)
    }

    /// Replace any existing record for `user_id`.
    pub fn upsert(
        &self,
        user_id: &str,
        selection: Option<DrugCode>,
        step: Step,
        now: DateTime<Utc>,
    ) {
        self.sessions.insert(
            user_id.to_string(),
            SessionRecord::new(user_id, selection, step, now),
        );
    }

    pub fn get(&self, user_id: &str) -> Option<SessionRecord> {
        self.sessions.get(user_id).map(|r| r.value().clone())
    }

    /// Remove every record last updated before `now - ttl`.
    ///
    /// Returns the number of records removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, record| {
            let keep = !self.is_expired(record, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Read-modify-write a user's session atomically.
    ///
    /// `f` sees the live record (`None` when absent or expired) and may
    /// replace or clear it. The user's entry stays locked while `f` runs, so
    /// `f` must not call back into the store.
    pub fn update<R, F>(&self, user_id: &str, now: DateTime<Utc>, f: F) -> R
    where
        F: FnOnce(&mut Option<SessionRecord>) -> R,
    {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = if self.is_expired(occupied.get(), now) {
                    None
                } else {
                    Some(occupied.get().clone())
                };

                let result = f(&mut slot);
                match slot {
                    Some(record) => {
                        occupied.insert(record);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(record) = slot {
                    vacant.insert(record);
                }
                result
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}
