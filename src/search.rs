//! Search DSL (`spec.md` §4.6). Parses a query string into a structured
//! `SearchQuery`; `crate::repo::ticket` is responsible for turning that into
//! an actual SQL predicate. Grounded on `find_search_terms`/
//! `filter_by_status`/`filter_by_submitter` in `original_source/search.py`,
//! reworked as a single-pass regex tokenizer (one unified alternation
//! instead of four patterns applied with string-splicing) and extended with
//! the `assigned`/`label`/`no`/`sort`/`rsort` keys `spec.md` adds.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::TicketStatus;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Created,
    Updated,
    Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            key: SortKey::Updated,
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    Open,
    Closed,
    Exact(TicketStatus),
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorFilter {
    Me,
    Username(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    pub status: StatusFilter,
    pub submitter: Option<ActorFilter>,
    pub assigned: Option<ActorFilter>,
    pub labels: Vec<String>,
    pub no_assignee: bool,
    pub no_label: bool,
    pub sort: Sort,
    /// Bare words and quoted phrases, matched against title ∪ description ∪
    /// comments.
    pub text_terms: Vec<String>,
}

static TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<neg>!)?(?:(?P<qkey>\w+):"(?P<qval>[^"]+)"|(?P<ukey>\w+):(?P<uval>\S+)|"(?P<phrase>[^"]+)"|(?P<word>\w+))"#,
    )
    .expect("valid regex")
});

enum Term {
    Property { key: String, value: String, negated: bool },
    Text(String),
}

fn tokenize(input: &str) -> Vec<Term> {
    TERM.captures_iter(input)
        .map(|caps| {
            let negated = caps.name("neg").is_some();
            if let (Some(key), Some(value)) = (caps.name("qkey"), caps.name("qval")) {
                Term::Property {
                    key: key.as_str().to_lowercase(),
                    value: value.as_str().to_string(),
                    negated,
                }
            } else if let (Some(key), Some(value)) = (caps.name("ukey"), caps.name("uval")) {
                Term::Property {
                    key: key.as_str().to_lowercase(),
                    value: value.as_str().to_string(),
                    negated,
                }
            } else if let Some(phrase) = caps.name("phrase") {
                Term::Text(phrase.as_str().to_string())
            } else {
                Term::Text(caps.name("word").unwrap().as_str().to_string())
            }
        })
        .collect()
}

fn parse_status(value: &str) -> Result<StatusFilter, CoreError> {
    match value {
        "any" => Ok(StatusFilter::Any),
        "open" => Ok(StatusFilter::Open),
        "closed" => Ok(StatusFilter::Closed),
        other => TicketStatus::parse(other)
            .map(StatusFilter::Exact)
            .ok_or_else(|| CoreError::validation("status", format!("Invalid status: {other}"))),
    }
}

fn parse_actor(value: &str) -> ActorFilter {
    if value == "me" {
        ActorFilter::Me
    } else {
        ActorFilter::Username(value.trim_start_matches('~').to_string())
    }
}

fn parse_sort_key(value: &str) -> Result<SortKey, CoreError> {
    match value {
        "created" => Ok(SortKey::Created),
        "updated" => Ok(SortKey::Updated),
        "comments" => Ok(SortKey::Comments),
        other => Err(CoreError::validation(
            "sort",
            format!("Invalid sort key: {other}"),
        )),
    }
}

/// Parses a search query string into a `SearchQuery`, applying the
/// `status:open`/`sort:updated` defaults and rejecting unknown keys or
/// enum values.
pub fn parse_query(input: &str) -> Result<SearchQuery, CoreError> {
    let mut query = SearchQuery::default();
    let mut status_seen = false;
    let mut sort_seen = false;

    for term in tokenize(input) {
        match term {
            Term::Text(word) => query.text_terms.push(word),
            Term::Property { key, value, negated } => match key.as_str() {
                "status" => {
                    if negated {
                        return Err(CoreError::validation("status", "status cannot be negated"));
                    }
                    query.status = parse_status(&value)?;
                    status_seen = true;
                }
                "submitter" => query.submitter = Some(parse_actor(&value)),
                "assigned" => query.assigned = Some(parse_actor(&value)),
                "label" => {
                    if negated {
                        // Negated label membership isn't modeled separately;
                        // treat as an unmatched filter rather than silently
                        // ignoring the negation.
                        return Err(CoreError::validation(
                            "label",
                            "negated label filters are not supported",
                        ));
                    }
                    query.labels.push(value);
                }
                "no" => match value.as_str() {
                    "assignee" => query.no_assignee = true,
                    "label" => query.no_label = true,
                    other => {
                        return Err(CoreError::validation(
                            "no",
                            format!("Invalid search term: no:{other}"),
                        ))
                    }
                },
                "sort" => {
                    query.sort = Sort {
                        key: parse_sort_key(&value)?,
                        direction: SortDirection::Descending,
                    };
                    sort_seen = true;
                }
                "rsort" => {
                    query.sort = Sort {
                        key: parse_sort_key(&value)?,
                        direction: SortDirection::Ascending,
                    };
                    sort_seen = true;
                }
                other => {
                    return Err(CoreError::validation(
                        "query",
                        format!("Invalid search term: {other}"),
                    ))
                }
            },
        }
    }

    if !status_seen {
        query.status = StatusFilter::Open;
    }
    if !sort_seen {
        query.sort = Sort::default();
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let q = parse_query("crash").unwrap();
        assert_eq!(q.status, StatusFilter::Open);
        assert_eq!(q.sort, Sort::default());
        assert_eq!(q.text_terms, vec!["crash".to_string()]);
    }

    #[test]
    fn explicit_status_any() {
        let q = parse_query("status:any").unwrap();
        assert_eq!(q.status, StatusFilter::Any);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = parse_query("status:bogus").unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = parse_query("frobnicate:1").unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn quoted_phrase_kept_atomic() {
        let q = parse_query(r#"label:"help wanted" "out of memory""#).unwrap();
        assert_eq!(q.labels, vec!["help wanted".to_string()]);
        assert_eq!(q.text_terms, vec!["out of memory".to_string()]);
    }

    #[test]
    fn me_submitter_resolved_by_caller() {
        let q = parse_query("submitter:me").unwrap();
        assert_eq!(q.submitter, Some(ActorFilter::Me));
    }

    #[test]
    fn rsort_is_ascending() {
        let q = parse_query("rsort:created").unwrap();
        assert_eq!(
            q.sort,
            Sort {
                key: SortKey::Created,
                direction: SortDirection::Ascending
            }
        );
    }

    #[test]
    fn no_assignee_term() {
        let q = parse_query("no:assignee").unwrap();
        assert!(q.no_assignee);
    }
}
