use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub type UserId = u64;

#[derive(Debug, Clone)]
pub struct Session {
    answers: Vec<String>,
    touched: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            answers: Vec::new(),
            touched: Instant::now(),
        }
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }
}

/// Per-user answer lists. Sessions live until they are evicted explicitly
/// or go idle for longer than the sweep limit.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<UserId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the session, or clears it if it already exists.
    pub fn reset(&mut self, user: UserId) {
        debug!("[Session] Reset session for user {}", user);
        self.sessions.insert(user, Session::new());
    }

    /// Appends an answer. Returns `None` when the user has no session.
    pub fn record(&mut self, user: UserId, answer: String) -> Option<usize> {
        let session = self.sessions.get_mut(&user)?;
        session.answers.push(answer);
        session.touched = Instant::now();
        Some(session.answers.len())
    }

    #[cfg(test)]
    pub fn get(&self, user: UserId) -> Option<&Session> {
        self.sessions.get(&user)
    }

    pub fn answers(&self, user: UserId) -> Option<&[String]> {
        self.sessions.get(&user).map(Session::answers)
    }

    #[cfg(test)]
    pub fn evict(&mut self, user: UserId) -> bool {
        self.sessions.remove(&user).is_some()
    }

    pub fn evict_idle(&mut self, max_idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), max_idle)
    }

    fn evict_idle_at(&mut self, now: Instant, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.saturating_duration_since(session.touched) <= max_idle);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!("[Session] Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
