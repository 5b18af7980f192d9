use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// A 401 survived the refresh attempt (or refresh was impossible).
    SessionExpired,
    UserInitiated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEventKind {
    LoggedIn,
    TokensRefreshed,
    LoggedOut { reason: LogoutReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    #[serde(flatten)]
    pub kind: SessionEventKind,
    pub at: String,
}

impl SessionEvent {
    fn now(kind: SessionEventKind) -> Self {
        Self { kind, at: now_iso() }
    }

    pub fn is_logout(&self) -> bool {
        matches!(self.kind, SessionEventKind::LoggedOut { .. })
    }
}

/// Fan-out of session lifecycle events. Emitting with no subscribers is a no-op.
#[derive(Clone)]
pub(crate) struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, kind: SessionEventKind) {
        let _ = self.tx.send(SessionEvent::now(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_logout_with_reason() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        events.emit(SessionEventKind::LoggedOut {
            reason: LogoutReason::SessionExpired,
        });

        let event = rx.recv().await.unwrap();
        assert!(event.is_logout());
        assert_eq!(
            event.kind,
            SessionEventKind::LoggedOut {
                reason: LogoutReason::SessionExpired
            }
        );
    }

    #[test]
    fn event_serializes_flat() {
        let event = SessionEvent {
            kind: SessionEventKind::LoggedOut {
                reason: LogoutReason::UserInitiated,
            },
            at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"kind": "logged_out", "reason": "user_initiated", "at": "2026-01-01T00:00:00Z"})
        );
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        SessionEvents::new().emit(SessionEventKind::LoggedIn);
    }
}
