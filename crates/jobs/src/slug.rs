//! URL slugs for job postings.
//!
//! Titles are folded to ASCII (Latin-1, Latin Extended-A and Vietnamese diacritics),
//! lowercased and hyphenated. Punctuation is dropped, `-` and whitespace both act
//! as separators.

/// Fallback used when a title folds to nothing (e.g. only symbols or non-Latin script).
pub const FALLBACK_SLUG: &str = "job";

const FOLDS: &[(&str, &str)] = &[
    ("àáâãäåāăąạảấầẩẫậắằẳẵặ", "a"),
    ("ÀÁÂÃÄÅĀĂĄẠẢẤẦẨẪẬẮẰẲẴẶ", "a"),
    ("æ", "ae"),
    ("Æ", "ae"),
    ("çćĉċč", "c"),
    ("ÇĆĈĊČ", "c"),
    ("ďđ", "d"),
    ("ĎĐÐ", "d"),
    ("èéêëēĕėęěẹẻẽếềểễệ", "e"),
    ("ÈÉÊËĒĔĖĘĚẸẺẼẾỀỂỄỆ", "e"),
    ("ĝğġģ", "g"),
    ("ĜĞĠĢ", "g"),
    ("ĥħ", "h"),
    ("ĤĦ", "h"),
    ("ìíîïĩīĭįıỉị", "i"),
    ("ÌÍÎÏĨĪĬĮİỈỊ", "i"),
    ("ĵ", "j"),
    ("Ĵ", "j"),
    ("ķ", "k"),
    ("Ķ", "k"),
    ("ĺļľŀł", "l"),
    ("ĹĻĽĿŁ", "l"),
    ("ñńņňŉ", "n"),
    ("ÑŃŅŇ", "n"),
    ("òóôõöøōŏőơọỏốồổỗộớờởỡợ", "o"),
    ("ÒÓÔÕÖØŌŎŐƠỌỎỐỒỔỖỘỚỜỞỠỢ", "o"),
    ("œ", "oe"),
    ("Œ", "oe"),
    ("ŕŗř", "r"),
    ("ŔŖŘ", "r"),
    ("śŝşš", "s"),
    ("ŚŜŞŠ", "s"),
    ("ß", "ss"),
    ("ţťŧ", "t"),
    ("ŢŤŦ", "t"),
    ("þ", "th"),
    ("Þ", "th"),
    ("ùúûüũūŭůűųưụủứừửữự", "u"),
    ("ÙÚÛÜŨŪŬŮŰŲƯỤỦỨỪỬỮỰ", "u"),
    ("ŵ", "w"),
    ("Ŵ", "w"),
    ("ýÿŷỳỵỷỹ", "y"),
    ("ÝŸŶỲỴỶỸ", "y"),
    ("źżž", "z"),
    ("ŹŻŽ", "z"),
];

fn fold(c: char) -> Option<&'static str> {
    FOLDS
        .iter()
        .find(|(from, _)| from.contains(c))
        .map(|(_, to)| *to)
}

/// Turn a title into a lowercase, hyphen-separated ASCII slug.
pub fn slugify(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '-' || c.is_whitespace() {
            folded.push(' ');
        } else if c.is_ascii_alphanumeric() {
            folded.push(c.to_ascii_lowercase());
        } else if let Some(ascii) = fold(c) {
            folded.push_str(ascii);
        }
    }

    let slug = folded.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Resolve collisions by appending `-1`, `-2`, ... to `base` until `is_taken` says no.
///
/// The lookup is fallible so callers can back it with a store.
pub fn unique_slug<E>(
    base: &str,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    if !is_taken(base)? {
        return Ok(base.to_string());
    }
    let mut suffix = 1u64;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn slugify_basic_titles() {
        assert_eq!(slugify("Senior Rust Engineer"), "senior-rust-engineer");
        assert_eq!(slugify("  Full-Stack   Developer "), "full-stack-developer");
        assert_eq!(slugify("Node.js / C++ Dev"), "nodejs-c-dev");
    }

    #[test]
    fn slugify_folds_diacritics() {
        assert_eq!(slugify("Lập trình viên Đà Nẵng"), "lap-trinh-vien-da-nang");
        assert_eq!(slugify("Café Über Straße"), "cafe-uber-strasse");
    }

    #[test]
    fn slugify_falls_back_when_empty() {
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify("工程师"), FALLBACK_SLUG);
    }

    #[test]
    fn unique_slug_appends_counter_from_one() {
        let taken: HashSet<&str> = ["backend-dev", "backend-dev-1"].into_iter().collect();
        let lookup = |s: &str| Ok::<_, ()>(taken.contains(s));
        assert_eq!(unique_slug("backend-dev", lookup), Ok("backend-dev-2".to_string()));
        assert_eq!(unique_slug("frontend-dev", lookup), Ok("frontend-dev".to_string()));
    }

    proptest! {
        #[test]
        fn slug_is_url_safe(input in ".{0,64}") {
            let slug = slugify(&input);
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }
}
