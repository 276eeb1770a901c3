//! Sliding viewing-session window shared by every player of a registry.

use playback_model::{AttributeBag, keys};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionWindow {
    id: Option<String>,
    started_at: i64,
    expires_at: i64,
    timeout_ms: i64,
}

impl SessionWindow {
    pub fn new(timeout_ms: i64) -> Self {
        Self {
            id: None,
            started_at: 0,
            expires_at: 0,
            timeout_ms,
        }
    }

    /// Extends the window to `now + timeout`, starting a new session first if
    /// there is none or the current one has expired. Returns whether a new
    /// session was started.
    pub fn touch(&mut self, now: i64) -> bool {
        let rotate = self.id.is_none() || now > self.expires_at;
        if rotate {
            let id = Uuid::new_v4().to_string();
            debug!(session = %id, "Starting viewing session");
            self.id = Some(id);
            self.started_at = now;
        }
        self.expires_at = now + self.timeout_ms;
        rotate
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Writes `snid`, `snst` and `snepti` into an environment bag.
    pub fn write_to(&self, environment: &mut AttributeBag) {
        let Some(id) = self.id.as_deref() else {
            return;
        };
        environment.insert_scalar(keys::SESSION_ID, id);
        environment.insert_scalar(keys::SESSION_START, self.started_at);
        environment.insert_scalar(keys::SESSION_EXPIRES, self.expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_model::EntityKind;

    const TIMEOUT: i64 = 25 * 60 * 1000;

    #[test]
    fn activity_slides_the_expiry() {
        let mut session = SessionWindow::new(TIMEOUT);
        assert!(session.touch(1_000));
        let id = session.id().unwrap().to_string();

        assert!(!session.touch(1_000 + TIMEOUT));
        assert!(!session.touch(1_000 + 2 * TIMEOUT));
        assert_eq!(session.id(), Some(id.as_str()));
        assert_eq!(session.started_at(), 1_000);
        assert_eq!(session.expires_at(), 1_000 + 3 * TIMEOUT);
    }

    #[test]
    fn idle_past_the_timeout_rotates() {
        let mut session = SessionWindow::new(TIMEOUT);
        session.touch(0);
        let first = session.id().unwrap().to_string();

        assert!(session.touch(TIMEOUT + 1));
        assert_ne!(session.id().unwrap(), first);
        assert_eq!(session.started_at(), TIMEOUT + 1);
    }

    #[test]
    fn environment_fields() {
        let mut environment = AttributeBag::new(EntityKind::Environment);
        let mut session = SessionWindow::new(TIMEOUT);
        session.write_to(&mut environment);
        assert!(environment.is_empty());

        session.touch(5);
        session.write_to(&mut environment);
        assert_eq!(environment.get_i64(keys::SESSION_START), Some(5));
        assert_eq!(environment.get_i64(keys::SESSION_EXPIRES), Some(5 + TIMEOUT));
        assert!(environment.get_string(keys::SESSION_ID).is_some());
    }
}
