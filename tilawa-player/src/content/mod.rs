//! Content retrieval and playlist resolution
//!
//! A `ContentProvider` turns `(surah, reciter)` into a `Surah` whose verses
//! carry their audio sources. Playlists (saved sections, cross-surah ranges)
//! are resolved on top of it and handed to a session as plain `Vec<Verse>`.

pub mod alquran;
pub mod everyayah;

pub use alquran::AlQuranCloudClient;

use crate::error::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use tilawa_common::{SavedSection, Surah, Verse, VerseRange};
use tracing::debug;

/// Source of surah content
///
/// Verses come back in ascending `number_in_surah` order and are never
/// re-sorted downstream.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn surah(&self, surah_number: u16, reciter: &str) -> Result<Surah>;
}

/// Verses of a saved section, in provider order
pub async fn resolve_section(
    provider: &dyn ContentProvider,
    section: &SavedSection,
    reciter: &str,
) -> Result<Vec<Verse>> {
    let range = section.range()?;
    resolve_range(provider, &range, reciter).await
}

/// Verses inside an inclusive range that may span several surahs
///
/// Surahs are fetched concurrently; the result keeps surah order.
pub async fn resolve_range(
    provider: &dyn ContentProvider,
    range: &VerseRange,
    reciter: &str,
) -> Result<Vec<Verse>> {
    range.validate()?;

    let surahs = try_join_all(range.surahs().map(|n| provider.surah(n, reciter))).await?;
    let verses = filter_range(surahs, range);

    debug!(
        start = %format!("{}:{}", range.start.surah, range.start.ayah),
        end = %format!("{}:{}", range.end.surah, range.end.ayah),
        verses = verses.len(),
        "Resolved verse range"
    );
    Ok(verses)
}

/// Keep the verses of `surahs` that fall inside `range`, preserving order
pub fn filter_range(surahs: impl IntoIterator<Item = Surah>, range: &VerseRange) -> Vec<Verse> {
    surahs
        .into_iter()
        .flat_map(|surah| surah.verses)
        .filter(|verse| range.contains(verse.position()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use tilawa_common::VersePosition;

    struct FixedProvider {
        ayah_counts: HashMap<u16, u16>,
    }

    #[async_trait]
    impl ContentProvider for FixedProvider {
        async fn surah(&self, surah_number: u16, _reciter: &str) -> Result<Surah> {
            let count = self
                .ayah_counts
                .get(&surah_number)
                .copied()
                .ok_or_else(|| Error::Content(format!("no surah {}", surah_number)))?;

            let verses = (1..=count)
                .map(|ayah| Verse {
                    global_number: surah_number as u32 * 1000 + ayah as u32,
                    surah_number,
                    number_in_surah: ayah,
                    text: String::new(),
                    primary_audio_url: Some(format!("https://cdn.example/{}/{}.mp3", surah_number, ayah)),
                    fallback_audio_urls: vec![],
                })
                .collect();

            Ok(Surah {
                number: surah_number,
                name: String::new(),
                english_name: String::new(),
                verses,
            })
        }
    }

    fn provider() -> FixedProvider {
        FixedProvider {
            ayah_counts: HashMap::from([(1, 7), (2, 286), (3, 200)]),
        }
    }

    #[tokio::test]
    async fn test_section_filters_inclusive_bounds() {
        let section = SavedSection::new("Kursi", 2, 255, 257).unwrap();
        let verses = resolve_section(&provider(), &section, "ar.alafasy").await.unwrap();

        let numbers: Vec<u16> = verses.iter().map(|v| v.number_in_surah).collect();
        assert_eq!(numbers, vec![255, 256, 257]);
    }

    #[tokio::test]
    async fn test_range_spans_surahs_in_order() {
        let range = VerseRange::new(VersePosition::new(1, 6), VersePosition::new(2, 2)).unwrap();
        let verses = resolve_range(&provider(), &range, "ar.alafasy").await.unwrap();

        let labels: Vec<String> = verses.iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["1:6", "1:7", "2:1", "2:2"]);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let range = VerseRange::new(VersePosition::new(3, 1), VersePosition::new(4, 5)).unwrap();
        let result = resolve_range(&provider(), &range, "ar.alafasy").await;
        assert!(matches!(result, Err(Error::Content(_))));
    }

    #[tokio::test]
    async fn test_range_past_surah_end_is_truncated() {
        let section = SavedSection::new("Tail", 1, 5, 40).unwrap();
        let verses = resolve_section(&provider(), &section, "ar.alafasy").await.unwrap();
        assert_eq!(verses.len(), 3);
    }
}
