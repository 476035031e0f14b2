//! Field normalizer
//!
//! Every extracted value goes through [`normalize`] before it lands in a record.
//! Besides whitespace cleanup it repairs the listing site's doubled-text defect,
//! where a value is rendered twice ("Full-time Full-time", "Band 5 Band 5 Nurse").

use std::borrow::Cow;

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a raw field value.
///
/// Returns `None` for absent, empty or whitespace-only input. The repair rules run in
/// order (whole-string halves, whole-string phrase doubling, repeated token runs) and
/// are re-applied until nothing changes, which makes the function idempotent.
pub fn normalize(raw: Option<&str>) -> Option<String> {
    let mut text = collapse_whitespace(raw?);
    if text.is_empty() {
        return None;
    }

    loop {
        let repaired = {
            let halves = collapse_halves(&text);
            let phrase = collapse_doubled_phrase(&halves);
            collapse_token_runs(&phrase).into_owned()
        };
        if repaired == text {
            return Some(text);
        }
        text = repaired;
    }
}

/// "NurseNurse" -> "Nurse", for any string made of two identical halves.
fn collapse_halves(text: &str) -> Cow<'_, str> {
    let char_count = text.chars().count();
    if char_count < 2 || char_count % 2 != 0 {
        return Cow::Borrowed(text);
    }
    let Some((mid, _)) = text.char_indices().nth(char_count / 2) else {
        return Cow::Borrowed(text);
    };
    let (left, right) = text.split_at(mid);
    if left == right {
        Cow::Borrowed(left)
    } else {
        Cow::Borrowed(text)
    }
}

/// "<phrase> <phrase>" -> "<phrase>" for phrases of at least 3 characters.
fn collapse_doubled_phrase(text: &str) -> Cow<'_, str> {
    let char_count = text.chars().count();
    if char_count % 2 == 0 {
        return Cow::Borrowed(text);
    }
    let half = char_count / 2;
    if half < 3 {
        return Cow::Borrowed(text);
    }
    let Some((mid, ' ')) = text.char_indices().nth(half) else {
        return Cow::Borrowed(text);
    };
    let (left, right) = (&text[..mid], &text[mid + 1..]);
    if left == right {
        Cow::Borrowed(left)
    } else {
        Cow::Borrowed(text)
    }
}

/// Collapse immediately repeated runs of whitespace-delimited tokens:
/// "Full-time Full-time" -> "Full-time", "Band 5 Band 5 Nurse" -> "Band 5 Nurse".
fn collapse_token_runs(text: &str) -> Cow<'_, str> {
    let mut tokens: Vec<&str> = text.split(' ').collect();
    let original_len = tokens.len();

    let mut changed = true;
    while changed {
        changed = false;
        let mut run = 1;
        while run * 2 <= tokens.len() {
            let mut start = 0;
            while start + run * 2 <= tokens.len() {
                if tokens[start..start + run] == tokens[start + run..start + run * 2] {
                    tokens.drain(start + run..start + run * 2);
                    changed = true;
                } else {
                    start += 1;
                }
            }
            run += 1;
        }
    }

    if tokens.len() == original_len {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Full-time Full-time", "Full-time")]
    #[case("Nurse  Nurse", "Nurse")]
    #[case("Band 6 Nurse", "Band 6 Nurse")]
    #[case("Band 5 Band 5 Nurse", "Band 5 Nurse")]
    #[case("NurseNurse", "Nurse")]
    #[case("  Leeds Teaching Hospitals \n NHS Trust ", "Leeds Teaching Hospitals NHS Trust")]
    #[case("Permanent Permanent Permanent", "Permanent")]
    #[case("£28,407 to £34,581 a year", "£28,407 to £34,581 a year")]
    #[case("1212", "12")]
    #[case("2025 2025", "2025")]
    #[case("5 Band 6 Band", "5 Band 6 Band")]
    #[case("Day shift Day shift", "Day shift")]
    fn test_normalize_cases(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize(Some(raw)).as_deref(), Some(expected));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   \n\t "))]
    fn test_normalize_empty(#[case] raw: Option<&str>) {
        assert_eq!(normalize(raw), None);
    }

    #[test]
    fn test_short_phrase_rule_needs_three_characters() {
        // "ab ab" is below the phrase minimum but still a repeated token run
        assert_eq!(collapse_doubled_phrase("ab ab"), "ab ab");
        assert_eq!(normalize(Some("ab ab")).as_deref(), Some("ab"));
    }

    #[test]
    fn test_rules_chain_to_fixpoint() {
        // phrase doubling leaves "abcabc", which the halves rule then repairs
        assert_eq!(normalize(Some("abcabc abcabc")).as_deref(), Some("abc"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(" a \u{a0} b\n\nc "), "a b c");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[a-cA-C0-9 \\-\n]{0,24}") {
            let once = normalize(Some(&raw));
            let twice = normalize(once.as_deref());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_normalize_is_idempotent_on_any_text(raw in any::<String>()) {
            let once = normalize(Some(&raw));
            prop_assert_eq!(normalize(once.as_deref()), once);
        }

        #[test]
        fn prop_output_has_no_outer_or_double_whitespace(raw in "\\PC{0,40}") {
            if let Some(text) = normalize(Some(&raw)) {
                prop_assert!(!text.is_empty());
                prop_assert_eq!(text.trim(), text.as_str());
                prop_assert!(!text.contains("  "));
            }
        }
    }
}
