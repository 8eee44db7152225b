//! crates/book_alchemist_core/src/pages.rs
//!
//! Turning raw replies into book pages, and recognising the last page.

/// Separator the model places between pages.
pub const PAGE_DELIMITER: &str = "---";

/// Phrases that end the automatic loop when found in the last page of a batch.
pub const AUTO_LOOP_SENTINELS: [&str; 2] = [
    "ende der buch-manifestation",
    "habe meinen teil der schöpfung vollendet",
];

/// Phrases that block a manual fetch when found in the last stored page.
/// This is the auto-loop set plus the unhyphenated spelling the model also uses;
/// the two sets differ on purpose.
pub const MANUAL_FETCH_SENTINELS: [&str; 3] = [
    "ende der buch-manifestation",
    "habe meinen teil der schöpfung vollendet",
    "ende der buchmanifestation",
];

/// Splits a reply into trimmed, non-empty pages, in order.
pub fn split_pages(raw: &str) -> Vec<String> {
    raw.split(PAGE_DELIMITER)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_any(page: &str, phrases: &[&str]) -> bool {
    let lowered = page.to_lowercase();
    phrases.iter().any(|phrase| lowered.contains(phrase))
}

/// Case-insensitive check used by the automatic loop.
pub fn ends_auto_loop(page: &str) -> bool {
    contains_any(page, &AUTO_LOOP_SENTINELS)
}

/// Case-insensitive check used to guard manual fetches.
pub fn blocks_manual_fetch(page: &str) -> bool {
    contains_any(page, &MANUAL_FETCH_SENTINELS)
}
