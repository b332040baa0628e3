//! Dialogue resolution: maps an inbound text to a reply and a session transition.
//!
//! ```text
//! Initial ──code──▶ AwaitingConfirm ──"a"──▶ Initial (detail reply)
//!                   AwaitingConfirm ──code──▶ AwaitingConfirm (new prompt)
//! any ──ttl elapsed──▶ Initial (record purged)
//! ```
//!
//! Unrecognized input never touches the session.

use crate::content::{DrugCode, DrugTable, SELECT_FIRST_TEXT};
use crate::reply::ReplyPayload;
use crate::session::{SessionRecord, SessionStore, Step};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The confirmation keystroke (matched case-insensitively).
pub const CONFIRM_KEY: &str = "a";

/// Which reply branch an input resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Select(DrugCode),
    Detail(DrugCode),
    SelectFirst,
    Menu,
}

impl Branch {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Detail(_) => "detail",
            Self::SelectFirst => "select_first",
            Self::Menu => "menu",
        }
    }
}

/// Resolves user input against the session store and drug table.
#[derive(Debug, Clone)]
pub struct DialogueResolver {
    store: Arc<SessionStore>,
    table: Arc<DrugTable>,
}

impl DialogueResolver {
    pub fn new(store: Arc<SessionStore>, table: Arc<DrugTable>) -> Self {
        Self { store, table }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn table(&self) -> &DrugTable {
        &self.table
    }

    /// Produce the reply for `text` from `user_id` at `now`.
    pub fn resolve(&self, user_id: &str, text: &str, now: DateTime<Utc>) -> ReplyPayload {
        self.resolve_with_branch(user_id, text, now).0
    }

    /// Like [`resolve`](Self::resolve), also reporting the branch taken.
    pub fn resolve_with_branch(
        &self,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> (ReplyPayload, Branch) {
        let evicted = self.store.evict_expired(now);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired sessions");
        }

        let input = text.trim();

        let (reply, branch) = if let Some(code) = DrugCode::parse(input) {
            self.store
                .upsert(user_id, Some(code), Step::AwaitingConfirm, now);
            (
                ReplyPayload::text(self.table.entry(code).prompt.clone()),
                Branch::Select(code),
            )
        } else if input.eq_ignore_ascii_case(CONFIRM_KEY) {
            self.confirm(user_id, now)
        } else {
            (ReplyPayload::text(self.table.menu_text()), Branch::Menu)
        };

        tracing::debug!(user_id, branch = branch.as_str(), "Resolved input");
        (reply, branch)
    }

    /// Consume a pending selection, if any.
    fn confirm(&self, user_id: &str, now: DateTime<Utc>) -> (ReplyPayload, Branch) {
        let selection = self.store.update(user_id, now, |slot| {
            let pending = match slot {
                Some(record) if record.step == Step::AwaitingConfirm => record.selection,
                _ => None,
            };
            if pending.is_some() {
                *slot = Some(SessionRecord::initial(user_id, now));
            }
            pending
        });

        match selection {
            Some(code) => (self.table.entry(code).detail_reply(), Branch::Detail(code)),
            None => (ReplyPayload::text(SELECT_FIRST_TEXT), Branch::SelectFirst),
        }
    }
}
