//! Swedish collation for display-name sorting, backed by the ICU4X collator
//! with the `sv` tailoring (`å ä ö` after `z`, `æ ø ü` as `ä ö y`, accents
//! and case as tie-breaks, punctuation before digits before letters).
//!
//! The collator is built once from compiled data. Should that ever fail,
//! names fall back to code point order.

use std::cmp::Ordering;
use std::sync::LazyLock;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use icu_locale_core::locale;

static SWEDISH: LazyLock<Option<CollatorBorrowed<'static>>> = LazyLock::new(|| {
    match Collator::try_new(locale!("sv").into(), CollatorOptions::default()) {
        Ok(collator) => Some(collator),
        Err(e) => {
            tracing::warn!(error = %e, "sv collation data unavailable, using code point order");
            None
        }
    }
});

/// Compare two strings with Swedish collation.
pub fn compare_sv(a: &str, b: &str) -> Ordering {
    match SWEDISH.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    }
}

/// Sort strings in place with Swedish collation. Strings the collator
/// considers equal are ordered by code point, so the result is total.
pub fn sort_sv<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| {
        let (a, b) = (a.as_ref(), b.as_ref());
        compare_sv(a, b).then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(words: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = words.iter().map(|s| s.to_string()).collect();
        sort_sv(&mut v);
        v
    }

    #[test]
    fn swedish_letters_after_z() {
        assert_eq!(
            sorted(&["Örby", "Zeta", "Ängby", "Åby", "Alby"]),
            vec!["Alby", "Zeta", "Åby", "Ängby", "Örby"]
        );
    }

    #[test]
    fn case_insensitive_primary() {
        assert_eq!(sorted(&["bravo", "Alfa", "charlie"]), vec!["Alfa", "bravo", "charlie"]);
    }

    #[test]
    fn lowercase_before_uppercase_on_tie() {
        assert_eq!(compare_sv("a", "A"), Ordering::Less);
    }

    #[test]
    fn accents_are_secondary() {
        assert_eq!(compare_sv("e", "é"), Ordering::Less);
        assert_eq!(compare_sv("é", "f"), Ordering::Less);
        assert_eq!(sorted(&["Café", "Cafe", "Cafx"]), vec!["Cafe", "Café", "Cafx"]);
    }

    #[test]
    fn decomposed_matches_precomposed() {
        let decomposed = "a\u{030A}by";
        assert_eq!(compare_sv(decomposed, "åby"), Ordering::Equal);
        assert_eq!(compare_sv(decomposed, "zeta"), Ordering::Greater);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare_sv("Scout", "Scoutkår"), Ordering::Less);
    }

    #[test]
    fn danish_and_german_variants() {
        assert_eq!(compare_sv("ü", "y"), Ordering::Greater);
        assert_eq!(compare_sv("ü", "z"), Ordering::Less);
        assert_eq!(compare_sv("æ", "ö"), Ordering::Less);
        assert_eq!(compare_sv("ø", "ä"), Ordering::Greater);
    }

    #[test]
    fn punctuation_and_foreign_letters() {
        assert_eq!(
            sorted(&[
                "Öland",
                "Łódź Scouts",
                "Kåra Scoutkår",
                "Ðaniel",
                "«Bäver»",
                "Kår’s Scoutkår",
                "Bäver",
                "1:a Täby",
            ]),
            vec![
                "«Bäver»",
                "1:a Täby",
                "Bäver",
                "Ðaniel",
                "Kår’s Scoutkår",
                "Kåra Scoutkår",
                "Łódź Scouts",
                "Öland",
            ]
        );
    }

    #[test]
    fn identical_strings_are_equal() {
        assert_eq!(compare_sv("Bromma", "Bromma"), Ordering::Equal);
    }

    #[test]
    fn sort_is_total_on_collation_ties() {
        assert_eq!(sorted(&["b", "a\u{030A}", "å"]), vec!["b", "a\u{030A}", "å"]);
    }
}
