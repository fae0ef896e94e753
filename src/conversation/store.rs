//! In-process conversation store keyed by session.
//!
//! Each session owns its own async mutex, so one chat turn for a session
//! completes before the next begins while other sessions proceed
//! independently. The session map is bounded by a least-recently-used
//! capacity and an optional idle TTL, both enforced lazily on access.

use dashmap::DashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::message::Message;
use super::trim::TrimPolicy;

/// Default cap on the number of live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Bounds on the session map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Evict the least-recently-used session when this many exist.
    pub max_sessions: Option<usize>,
    /// Drop sessions that have not been touched for this long.
    pub idle_ttl: Option<Duration>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: Some(DEFAULT_MAX_SESSIONS),
            idle_ttl: None,
        }
    }
}

/// An ordered transcript bounded by a [`TrimPolicy`].
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    policy: TrimPolicy,
}

impl Conversation {
    pub fn new(policy: TrimPolicy) -> Self {
        Self {
            messages: Vec::new(),
            policy,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply the trim policy in place and return the retained messages.
    pub fn trim(&mut self) -> &[Message] {
        self.messages = self.policy.apply(&self.messages);
        &self.messages
    }
}

/// One session's conversation plus its access bookkeeping.
#[derive(Debug)]
pub struct Session {
    conversation: Mutex<Conversation>,
    last_seen: StdMutex<Instant>,
}

impl Session {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation: Mutex::new(conversation),
            last_seen: StdMutex::new(Instant::now()),
        }
    }

    /// Wait for exclusive access to the conversation.
    pub async fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.touch();
        self.conversation.lock().await
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    fn last_seen(&self) -> Instant {
        *self.last_seen.lock().unwrap()
    }
}

/// Mapping from session key to conversation, scoped to the server's lifetime.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: DashMap<String, Arc<Session>>,
    policy: TrimPolicy,
    seed: Option<String>,
    limits: SessionLimits,
}

impl ConversationStore {
    /// Create an empty store whose conversations are bounded by `policy`.
    pub fn new(policy: TrimPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
            seed: None,
            limits: SessionLimits::default(),
        }
    }

    /// Seed every new conversation with a system message.
    pub fn with_seed(mut self, system_prompt: impl Into<String>) -> Self {
        self.seed = Some(system_prompt.into());
        self
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn policy(&self) -> TrimPolicy {
        self.policy
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forget a session. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Get the session for `key`, creating it (and seeding it) on first use.
    pub fn session(&self, key: &str) -> Arc<Session> {
        self.expire_idle();

        if let Some(entry) = self.sessions.get(key) {
            let session = entry.value().clone();
            drop(entry);
            session.touch();
            return session;
        }

        let mut created = false;
        let session = self
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Session::new(self.fresh_conversation()))
            })
            .value()
            .clone();

        if created {
            tracing::debug!(session = %key, seeded = self.seed.is_some(), "Created conversation");
            self.evict_over_capacity(key);
        }

        session
    }

    /// Append a message to a session's conversation without trimming.
    pub async fn append(&self, key: &str, message: Message) {
        let session = self.session(key);
        session.lock().await.push(message);
    }

    /// Snapshot of a session's conversation, creating it if needed.
    pub async fn get_or_create(&self, key: &str) -> Vec<Message> {
        let session = self.session(key);
        let conversation = session.lock().await;
        conversation.messages().to_vec()
    }

    /// Trim a session's conversation in place and return what was retained.
    pub async fn trim(&self, key: &str) -> Vec<Message> {
        let session = self.session(key);
        let mut conversation = session.lock().await;
        conversation.trim().to_vec()
    }

    fn fresh_conversation(&self) -> Conversation {
        let mut conversation = Conversation::new(self.policy);
        if let Some(seed) = &self.seed {
            conversation.push(Message::system(seed.clone()));
        }
        conversation
    }

    fn expire_idle(&self) {
        let Some(ttl) = self.limits.idle_ttl else {
            return;
        };
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            Self::in_use(session) || now.duration_since(session.last_seen()) <= ttl
        });
        let expired = before.saturating_sub(self.sessions.len());
        if expired > 0 {
            tracing::debug!(expired, "Expired idle conversations");
        }
    }

    /// A session is in use while anyone besides the map holds it, or while
    /// its conversation is locked. In-use sessions are never dropped.
    fn in_use(session: &Arc<Session>) -> bool {
        Arc::strong_count(session) > 1 || session.conversation.try_lock().is_err()
    }

    fn evict_over_capacity(&self, keep: &str) {
        let Some(max) = self.limits.max_sessions else {
            return;
        };
        while self.sessions.len() > max.max(1) {
            // Collect the victim first; no map refs may be held while removing.
            let victim = self
                .sessions
                .iter()
                .filter(|entry| entry.key() != keep && !Self::in_use(entry.value()))
                .min_by_key(|entry| entry.value().last_seen())
                .map(|entry| entry.key().clone());

            match victim {
                Some(victim) => {
                    self.sessions.remove(&victim);
                    tracing::debug!(session = %victim, "Evicted least recently used conversation");
                }
                None => {
                    tracing::debug!(
                        sessions = self.sessions.len(),
                        "All conversations in use, capacity temporarily exceeded"
                    );
                    break;
                }
            }
        }
    }
}
