use chrono::DateTime;
use chrono::Utc;
use secrecy::Secret;

use crate::error::CoreError;

/// A webhook subscription is scoped to exactly one of a user, tracker, or
/// ticket (`original_source/webhooks.py`'s `UserWebhook`/`TrackerWebhook`/
/// `TicketWebhook`), each firing on its own subset of `WebhookEvent`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookScope {
    User(i64),
    Tracker(i64),
    Ticket(i64),
}

/// Event names a webhook subscription can be registered against, per
/// `original_source/webhooks.py`'s per-scope `events` lists. Not every scope
/// accepts every variant — `WebhookEvent::allowed_for_scope` enforces that
/// at registration time, mirroring each Python class's own `events` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    TrackerCreate,
    TrackerUpdate,
    TrackerDelete,
    TicketCreate,
    TicketUpdate,
    LabelCreate,
    LabelDelete,
    EventCreate,
}

impl WebhookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrackerCreate => "tracker:create",
            Self::TrackerUpdate => "tracker:update",
            Self::TrackerDelete => "tracker:delete",
            Self::TicketCreate => "ticket:create",
            Self::TicketUpdate => "ticket:update",
            Self::LabelCreate => "label:create",
            Self::LabelDelete => "label:delete",
            Self::EventCreate => "event:create",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tracker:create" => Some(Self::TrackerCreate),
            "tracker:update" => Some(Self::TrackerUpdate),
            "tracker:delete" => Some(Self::TrackerDelete),
            "ticket:create" => Some(Self::TicketCreate),
            "ticket:update" => Some(Self::TicketUpdate),
            "label:create" => Some(Self::LabelCreate),
            "label:delete" => Some(Self::LabelDelete),
            "event:create" => Some(Self::EventCreate),
            _ => None,
        }
    }

    /// Matches each Python class's fixed `events` list exactly.
    pub fn allowed_for_scope(self, scope: WebhookScope) -> bool {
        match scope {
            WebhookScope::User(_) => matches!(
                self,
                Self::TrackerCreate | Self::TrackerUpdate | Self::TrackerDelete | Self::TicketCreate
            ),
            WebhookScope::Tracker(_) => matches!(
                self,
                Self::LabelCreate | Self::LabelDelete | Self::TicketCreate | Self::EventCreate
            ),
            WebhookScope::Ticket(_) => matches!(self, Self::TicketUpdate | Self::EventCreate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookSubscription {
    pub id: i64,
    pub scope: WebhookScope,
    pub url: String,
    pub secret: Secret<String>,
    pub events: Vec<WebhookEvent>,
    pub created: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Rejects a registration that lists an event the scope's class doesn't
/// support, e.g. `label:create` on a `UserWebhook`.
pub fn validate_events(scope: WebhookScope, events: &[WebhookEvent]) -> Result<(), CoreError> {
    if events.is_empty() {
        return Err(CoreError::validation("events", "at least one event is required"));
    }
    if let Some(bad) = events.iter().find(|e| !e.allowed_for_scope(scope)) {
        return Err(CoreError::validation(
            "events",
            format!("{} is not a valid event for this subscription scope", bad.as_str()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_scope_accepts_ticket_create_and_event_create() {
        let scope = WebhookScope::Tracker(1);
        assert!(WebhookEvent::TicketCreate.allowed_for_scope(scope));
        assert!(WebhookEvent::EventCreate.allowed_for_scope(scope));
        assert!(!WebhookEvent::TrackerDelete.allowed_for_scope(scope));
    }

    #[test]
    fn ticket_scope_rejects_tracker_events() {
        let scope = WebhookScope::Ticket(1);
        assert!(!WebhookEvent::TrackerCreate.allowed_for_scope(scope));
        assert!(WebhookEvent::TicketUpdate.allowed_for_scope(scope));
    }

    #[test]
    fn validate_events_rejects_mismatched_scope() {
        let scope = WebhookScope::User(1);
        let err = validate_events(scope, &[WebhookEvent::LabelCreate]).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn validate_events_rejects_empty_list() {
        assert!(validate_events(WebhookScope::User(1), &[]).is_err());
    }
}
