use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::telegram::{ChatId, UserId};

/// A flow belongs to one user in one chat, so group members never share state.
pub type SessionKey = (ChatId, UserId);

/// Where a user is inside a multi-step flow. Idle chats have no session at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialogue {
    WaitingForTitle,
    WaitingForContent { title: String },
    WaitingForTags { title: String, content: String },
    SearchingByTags,
}

#[derive(Debug)]
struct Session {
    dialogue: Dialogue,
    touched_at: Instant,
}

/// Per-user, per-chat dialogue state, dropped after `timeout` of inactivity.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a flow, replacing whatever the user was doing in that chat.
    pub fn begin(&self, key: SessionKey, dialogue: Dialogue, now: Instant) {
        let (chat_id, user_id) = key;
        if let Some(previous) = self.sessions().insert(
            key,
            Session {
                dialogue: dialogue.clone(),
                touched_at: now,
            },
        ) {
            tracing::debug!(chat_id, user_id, dialogue = ?previous.dialogue, "dialogue aborted");
        }
        tracing::debug!(chat_id, user_id, ?dialogue, "dialogue started");
    }

    /// Moves an active flow to its next step.
    pub fn advance(&self, key: SessionKey, dialogue: Dialogue, now: Instant) {
        let (chat_id, user_id) = key;
        tracing::debug!(chat_id, user_id, ?dialogue, "dialogue advanced");
        self.sessions().insert(
            key,
            Session {
                dialogue,
                touched_at: now,
            },
        );
    }

    /// Removes and returns the live session. An expired one is discarded and reported as idle.
    pub fn take(&self, key: SessionKey, now: Instant) -> Option<Dialogue> {
        let session = self.sessions().remove(&key)?;
        if self.is_expired(&session, now) {
            let (chat_id, user_id) = key;
            tracing::info!(chat_id, user_id, dialogue = ?session.dialogue, "dialogue expired");
            return None;
        }
        Some(session.dialogue)
    }

    /// Ends the flow. Returns whether there was a live one.
    pub fn finish(&self, key: SessionKey, now: Instant) -> bool {
        self.take(key, now).is_some()
    }

    /// Drops every expired session; returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|&(chat_id, user_id), session| {
            let expired = self.is_expired(session, now);
            if expired {
                tracing::info!(chat_id, user_id, dialogue = ?session.dialogue, "dialogue expired");
            }
            !expired
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.touched_at) > self.timeout
    }
}
