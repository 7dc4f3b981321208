//! Topic-exchange routing-key matching.
//!
//! Routing keys are dot-separated words (`job.hot`). Binding patterns use the
//! AMQP topic rules: `*` matches exactly one word, `#` matches zero or more.

/// Returns true when `key` is routed to a queue bound with `pattern`.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            // `#` may swallow any number of words, including none.
            (0..=key.len()).any(|skip| matches_words(rest, &key[skip..]))
        }
        Some((&"*", rest)) => !key.is_empty() && matches_words(rest, &key[1..]),
        Some((word, rest)) => {
            key.first().is_some_and(|k| k == word) && matches_words(rest, &key[1..])
        }
    }
}
