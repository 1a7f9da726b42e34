//! Audio source resolution
//!
//! A verse's candidate list is its primary URL followed by its fallbacks, in
//! order, with blank entries dropped. An empty list means the verse cannot be
//! played at all and must be reported, never retried.

use tilawa_common::Verse;

/// Ordered candidate URLs for `verse` (primary first)
pub fn candidate_urls(verse: &Verse) -> Vec<String> {
    verse
        .primary_audio_url
        .iter()
        .chain(verse.fallback_audio_urls.iter())
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}
