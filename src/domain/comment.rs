use chrono::DateTime;
use chrono::Utc;
use unicode_segmentation::UnicodeSegmentation;

use super::TicketAuthenticity;
use crate::error::CoreError;

/// A comment on a ticket. Edits are non-destructive (`spec.md` §4.4): editing
/// inserts a new row and sets the old row's `superceeded_by_id`, rather than
/// mutating `text` in place.
#[derive(Debug, Clone)]
pub struct TicketComment {
    pub id: i64,
    pub ticket_id: i64,
    pub submitter_id: i64,
    pub text: String,
    pub authenticity: TicketAuthenticity,
    /// Set once a later edit superceeds this row.
    pub superceeded_by_id: Option<i64>,
    pub created: DateTime<Utc>,
}

impl TicketComment {
    pub fn is_current(&self) -> bool {
        self.superceeded_by_id.is_none()
    }
}

pub fn validate_text(text: &str) -> Result<(), CoreError> {
    let len = text.graphemes(true).count();
    if !(3..=16384).contains(&len) {
        return Err(CoreError::validation(
            "text",
            "Comment text must be 3-16384 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;

    use super::*;

    #[test]
    fn text_length_bounds() {
        assert_err!(validate_text("ab"));
        assert_ok!(validate_text("abc"));
        assert_ok!(validate_text(&"a".repeat(16384)));
        assert_err!(validate_text(&"a".repeat(16385)));
    }
}
