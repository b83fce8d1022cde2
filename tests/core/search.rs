use quickcheck_macros::quickcheck;
use tracker_core::search::parse_query;

/// The tokenizer is a single regex pass over untrusted user input (§4.6);
/// it must never panic, only ever return `Ok` or a `CoreError::Validation`.
#[quickcheck]
fn parse_query_never_panics(input: String) -> bool {
    matches!(parse_query(&input), Ok(_) | Err(_))
}

#[test]
fn bare_words_become_text_terms_and_defaults_apply() {
    let query = parse_query("printer jam").unwrap();
    assert_eq!(query.text_terms, vec!["printer", "jam"]);
    assert_eq!(query.status, tracker_core::search::StatusFilter::Open);
}
