//! alquran.cloud API client
//!
//! Fetches a surah with a reciter's audio edition and maps each ayah to a
//! `Verse`. Every response is wrapped in `{ code, status, data }`; anything
//! but `status == "OK"` is treated as an error.

use super::{everyayah, ContentProvider};
use crate::config::ContentConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tilawa_common::{Surah, Verse, VersePosition};
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("tilawa-player/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: u16,
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSurah {
    number: u16,
    #[serde(default)]
    name: String,
    #[serde(default)]
    english_name: String,
    ayahs: Vec<ApiAyah>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAyah {
    /// Global verse number
    number: u32,
    #[serde(default)]
    text: String,
    number_in_surah: u16,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default, alias = "audioSecondarys")]
    audio_secondary: Option<Vec<String>>,
}

/// Unwrap the `{ code, status, data }` envelope
fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| Error::Content(format!("Malformed API response: {}", e)))?;

    if envelope.status != "OK" {
        let detail = match &envelope.data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "Unknown API error".to_string(),
            other => other.to_string(),
        };
        return Err(Error::Content(format!(
            "API error {} ({}): {}",
            envelope.code, envelope.status, detail
        )));
    }

    serde_json::from_value(envelope.data)
        .map_err(|e| Error::Content(format!("Unexpected API payload: {}", e)))
}

fn non_empty(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
}

fn into_surah(api: ApiSurah, reciter: &str) -> Surah {
    let surah_number = api.number;
    let verses = api
        .ayahs
        .into_iter()
        .map(|ayah| {
            let mut fallbacks: Vec<String> = ayah
                .audio_secondary
                .unwrap_or_default()
                .into_iter()
                .filter(|u| !u.trim().is_empty())
                .collect();
            everyayah::prepend_fallback(&mut fallbacks, reciter, surah_number, ayah.number_in_surah);

            Verse {
                global_number: ayah.number,
                surah_number,
                number_in_surah: ayah.number_in_surah,
                text: ayah.text,
                primary_audio_url: non_empty(ayah.audio),
                fallback_audio_urls: fallbacks,
            }
        })
        .collect();

    Surah {
        number: surah_number,
        name: api.name,
        english_name: api.english_name,
        verses,
    }
}

/// Parse a `/surah/{n}/{edition}` response body
pub fn parse_surah_response(body: &str, reciter: &str) -> Result<Surah> {
    let api: ApiSurah = parse_envelope(body)?;
    Ok(into_surah(api, reciter))
}

/// alquran.cloud client with retry on transport errors and 5xx responses
pub struct AlQuranCloudClient {
    http_client: reqwest::Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl AlQuranCloudClient {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Content(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retries: config.request_retries.max(1),
            backoff: config.retry_backoff(),
        })
    }

    /// GET with linear backoff: attempt n waits n × backoff before retrying
    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            match self.http_client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => last_error = format!("Failed to read body: {}", e),
                        }
                    } else if status.is_server_error() {
                        last_error = format!("API call failed with status {}", status);
                    } else {
                        return Err(Error::Content(format!(
                            "API call failed with status {} for {}",
                            status, url
                        )));
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            warn!(
                url = %url,
                attempt,
                retries = self.retries,
                "Fetch failed: {}",
                last_error
            );

            if attempt < self.retries {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        Err(Error::Content(format!(
            "Failed to fetch {} after {} attempts: {}",
            url, self.retries, last_error
        )))
    }

    async fn fetch_api<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "Querying alquran.cloud");
        let body = self.fetch_with_retry(&url).await?;
        parse_envelope(&body)
    }
}

#[async_trait]
impl ContentProvider for AlQuranCloudClient {
    async fn surah(&self, surah_number: u16, reciter: &str) -> Result<Surah> {
        VersePosition::new(surah_number, 1).validate()?;
        if reciter.trim().is_empty() {
            return Err(Error::BadRequest("Reciter must not be empty".to_string()));
        }

        let api: ApiSurah = self
            .fetch_api(&format!("surah/{}/{}", surah_number, reciter.trim()))
            .await?;
        let surah = into_surah(api, reciter);

        info!(
            surah = surah.number,
            verses = surah.verses.len(),
            reciter = %reciter,
            "Retrieved surah from alquran.cloud"
        );
        Ok(surah)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FATIHA_EXCERPT: &str = r#"{
        "code": 200,
        "status": "OK",
        "data": {
            "number": 1,
            "name": "سُورَةُ ٱلْفَاتِحَةِ",
            "englishName": "Al-Faatiha",
            "revelationType": "Meccan",
            "ayahs": [
                {
                    "number": 1,
                    "audio": "https://cdn.islamic.network/quran/audio/128/ar.alafasy/1.mp3",
                    "audioSecondary": ["https://cdn.islamic.network/quran/audio/64/ar.alafasy/1.mp3"],
                    "text": "بِسْمِ ٱللَّهِ",
                    "numberInSurah": 1,
                    "juz": 1
                },
                {
                    "number": 2,
                    "audio": "",
                    "text": "ٱلْحَمْدُ لِلَّهِ",
                    "numberInSurah": 2
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_surah_maps_ayahs_in_order() {
        let surah = parse_surah_response(FATIHA_EXCERPT, "ar.alafasy").unwrap();

        assert_eq!(surah.number, 1);
        assert_eq!(surah.english_name, "Al-Faatiha");
        assert_eq!(surah.verses.len(), 2);

        let first = &surah.verses[0];
        assert_eq!(first.global_number, 1);
        assert_eq!(
            first.primary_audio_url.as_deref(),
            Some("https://cdn.islamic.network/quran/audio/128/ar.alafasy/1.mp3")
        );
        assert_eq!(
            first.fallback_audio_urls,
            vec![
                "https://everyayah.com/data/Alafasy_128kbps/001001.mp3".to_string(),
                "https://cdn.islamic.network/quran/audio/64/ar.alafasy/1.mp3".to_string(),
            ]
        );

        // Empty primary is dropped, everyayah still available
        let second = &surah.verses[1];
        assert_eq!(second.number_in_surah, 2);
        assert!(second.primary_audio_url.is_none());
        assert_eq!(second.fallback_audio_urls.len(), 1);
    }

    #[test]
    fn test_unknown_reciter_gets_no_everyayah_fallback() {
        let surah = parse_surah_response(FATIHA_EXCERPT, "ar.minshawi").unwrap();
        assert_eq!(surah.verses[0].fallback_audio_urls.len(), 1);
        assert!(surah.verses[1].fallback_audio_urls.is_empty());
    }

    #[test]
    fn test_non_ok_status_is_error() {
        let body = r#"{"code": 404, "status": "NOT FOUND", "data": "Surah not found"}"#;
        let err = parse_surah_response(body, "ar.alafasy").unwrap_err();
        assert!(err.to_string().contains("Surah not found"));
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(parse_surah_response("<html>", "ar.alafasy").is_err());
    }
}
