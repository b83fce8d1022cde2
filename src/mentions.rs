//! Mention parser (`spec.md` §4.3). Pure text → references; resolving a
//! reference into an actual `User`/`Ticket` row is the caller's job
//! (`crate::lifecycle`), which is why this module does no I/O, matching
//! `find_mentioned_users`/`find_mentioned_tickets` in
//! `original_source/tickets.py` but generalized to the three qualified
//! ticket-mention shapes plus the canonical URL form.

use once_cell::sync::Lazy;
use regex::Regex;

/// A parsed, unresolved ticket reference (§4.3 resolution rules).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketMentionRef {
    /// `#N` — same tracker as the text being parsed.
    Bare { scoped_id: i64 },
    /// `name#N` — a tracker owned by the same user as the current tracker.
    Named { tracker_name: String, scoped_id: i64 },
    /// `~user/name#N` or the fully-qualified URL form.
    Qualified {
        username: String,
        tracker_name: String,
        scoped_id: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMentions {
    pub usernames: Vec<String>,
    pub tickets: Vec<TicketMentionRef>,
}

// `(?:^|[\s(])` anchors on start-of-string, whitespace, or `(`, matching the
// "start or whitespace or (" leading-context rule shared by both patterns.
static USER_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(])~(\w+)\b(?!/)").expect("valid regex")
});

static BARE_TICKET_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s(])#(\d+)\b").expect("valid regex"));

static NAMED_TICKET_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s(])([A-Za-z0-9_.-]+)#(\d+)\b").expect("valid regex"));

static QUALIFIED_TICKET_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(])~([A-Za-z0-9_-]+)/([A-Za-z0-9_.-]+)#(\d+)\b").expect("valid regex")
});

fn qualified_url_regex(origin: &str) -> Regex {
    let escaped = regex::escape(origin);
    Regex::new(&format!(
        r"(?:^|[\s(]){escaped}/~([A-Za-z0-9_-]+)/([A-Za-z0-9_.-]+)/(\d+)\b"
    ))
    .expect("valid regex")
}

/// Extracts `~username` references. URLs with a `~` path segment do not
/// match because the tilde there is followed by `user/...`, excluded by the
/// trailing `(?!/)` lookahead.
pub fn find_mentioned_users(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    USER_MENTION
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Extracts all ticket references, most-qualified shape first so a
/// fully-qualified or named match consumes the text before the bare `#N`
/// pattern would otherwise re-match its numeric suffix.
pub fn find_mentioned_tickets(text: &str, origin: &str) -> Vec<TicketMentionRef> {
    let mut refs = Vec::new();
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    let url_re = qualified_url_regex(origin);
    for caps in url_re.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        consumed.push((whole.start(), whole.end()));
        refs.push(TicketMentionRef::Qualified {
            username: caps[1].to_string(),
            tracker_name: caps[2].to_string(),
            scoped_id: caps[3].parse().unwrap_or_default(),
        });
    }

    for caps in QUALIFIED_TICKET_MENTION.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        consumed.push((whole.start(), whole.end()));
        refs.push(TicketMentionRef::Qualified {
            username: caps[1].to_string(),
            tracker_name: caps[2].to_string(),
            scoped_id: caps[3].parse().unwrap_or_default(),
        });
    }

    for caps in NAMED_TICKET_MENTION.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        consumed.push((whole.start(), whole.end()));
        refs.push(TicketMentionRef::Named {
            tracker_name: caps[1].to_string(),
            scoped_id: caps[2].parse().unwrap_or_default(),
        });
    }

    for caps in BARE_TICKET_MENTION.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        consumed.push((whole.start(), whole.end()));
        refs.push(TicketMentionRef::Bare {
            scoped_id: caps[1].parse().unwrap_or_default(),
        });
    }

    refs
}

fn overlaps(consumed: &[(usize, usize)], start: usize, end: usize) -> bool {
    consumed
        .iter()
        .any(|&(cs, ce)| start < ce && cs < end)
}

/// Parses both mention forms out of `text` in one pass.
pub fn parse_mentions(text: &str, origin: &str) -> ParsedMentions {
    ParsedMentions {
        usernames: find_mentioned_users(text),
        tickets: find_mentioned_tickets(text, origin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_user_mentions() {
        let users = find_mentioned_users("hey ~alice and ~bob, take a look");
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn url_path_segment_is_not_a_user_mention() {
        let users = find_mentioned_users("~user1 and https://example.org/~user2/tracker");
        assert_eq!(users, vec!["user1".to_string()]);
    }

    #[test]
    fn bare_ticket_mention() {
        let refs = find_mentioned_tickets("see #17 for context", "https://example.org");
        assert_eq!(refs, vec![TicketMentionRef::Bare { scoped_id: 17 }]);
    }

    #[test]
    fn named_ticket_mention() {
        let refs = find_mentioned_tickets("fixed in bugs#42", "https://example.org");
        assert_eq!(
            refs,
            vec![TicketMentionRef::Named {
                tracker_name: "bugs".to_string(),
                scoped_id: 42
            }]
        );
    }

    #[test]
    fn qualified_ticket_mention() {
        let refs = find_mentioned_tickets("see ~alice/bugs#3", "https://example.org");
        assert_eq!(
            refs,
            vec![TicketMentionRef::Qualified {
                username: "alice".to_string(),
                tracker_name: "bugs".to_string(),
                scoped_id: 3
            }]
        );
    }

    #[test]
    fn canonical_url_ticket_mention() {
        let refs = find_mentioned_tickets(
            "see https://example.org/~alice/bugs/3 please",
            "https://example.org",
        );
        assert_eq!(
            refs,
            vec![TicketMentionRef::Qualified {
                username: "alice".to_string(),
                tracker_name: "bugs".to_string(),
                scoped_id: 3
            }]
        );
    }

    #[test]
    fn mixed_references_all_found() {
        let parsed = parse_mentions("~u1 and ~u2 see #2", "https://example.org");
        assert_eq!(parsed.usernames, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(parsed.tickets, vec![TicketMentionRef::Bare { scoped_id: 2 }]);
    }
}
