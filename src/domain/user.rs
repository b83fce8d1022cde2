use chrono::DateTime;
use chrono::Utc;

/// A local account. Created on first OAuth exchange (the exchange itself is
/// out of scope — the engine only ever receives the resulting `User`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Whether the user's own actions notify them (§4.5 self-notification
    /// suppression).
    pub notify_self: bool,
    pub created: DateTime<Utc>,
}

impl User {
    /// `~username` form, used in mention URLs and email `From` headers.
    pub fn canonical_name(&self) -> String {
        format!("~{}", self.username)
    }
}
