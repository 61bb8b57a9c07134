use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use shared::protocol::Notification;
use uuid::Uuid;

/// Sessions untouched for this long are dropped on the next write.
pub const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct SessionData {
    theme: Option<String>,
    flashes: Vec<Notification>,
    touched: Instant,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            theme: None,
            flashes: Vec::new(),
            touched: Instant::now(),
        }
    }
}

/// Per-session flash queue and UI preferences.
///
/// Flashes are read-once: [`SessionStore::take_flashes`] drains them.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionData>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_flash(&self, id: SessionId, notification: Notification) {
        let mut sessions = self.lock();
        prune(&mut sessions);
        let data = sessions.entry(id).or_default();
        data.touched = Instant::now();
        data.flashes.push(notification);
    }

    pub fn take_flashes(&self, id: SessionId) -> Vec<Notification> {
        let mut sessions = self.lock();
        let Some(data) = sessions.get_mut(&id) else {
            return Vec::new();
        };
        data.touched = Instant::now();
        let flashes = std::mem::take(&mut data.flashes);
        if data.theme.is_none() {
            sessions.remove(&id);
        }
        flashes
    }

    pub fn theme(&self, id: SessionId) -> Option<String> {
        self.lock().get(&id).and_then(|data| data.theme.clone())
    }

    pub fn set_theme(&self, id: SessionId, theme: impl Into<String>) {
        let mut sessions = self.lock();
        prune(&mut sessions);
        let data = sessions.entry(id).or_default();
        data.touched = Instant::now();
        data.theme = Some(theme.into());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionData>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn prune(sessions: &mut HashMap<SessionId, SessionData>) {
    sessions.retain(|_, data| data.touched.elapsed() < SESSION_IDLE_LIMIT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashes_are_read_once() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.add_flash(id, Notification::success("example.com", "Reboot task has been added to queue"));

        let first = store.take_flashes(id);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_success());
        assert!(store.take_flashes(id).is_empty());
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        let alice = SessionId::generate();
        let bob = SessionId::generate();
        store.add_flash(alice, Notification::error(None, "boom"));
        assert!(store.take_flashes(bob).is_empty());
        assert_eq!(store.take_flashes(alice).len(), 1);
    }

    #[test]
    fn theme_survives_flash_reads() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.set_theme(id, "dark");
        store.add_flash(id, Notification::error(None, "boom"));
        store.take_flashes(id);
        assert_eq!(store.theme(id).as_deref(), Some("dark"));
    }

    #[test]
    fn drained_sessions_without_preferences_are_dropped() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.add_flash(id, Notification::error(None, "boom"));
        store.take_flashes(id);
        assert!(store.is_empty());
    }

    #[test]
    fn session_ids_parse_back() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("not-a-uuid"), None);
    }
}
