//! Settings database access
//!
//! Read/write settings from the settings table (key-value store). Playback
//! defaults stored here seed every new session's configuration.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tilawa_common::{PlaybackConfiguration, RepeatMode};
use tracing::warn;

pub const KEY_REPETITIONS: &str = "repetitions_per_verse";
pub const KEY_INTER_VERSE_DELAY: &str = "inter_verse_delay_secs";
pub const KEY_PLAYBACK_RATE: &str = "playback_rate";
pub const KEY_REPEAT_MODE: &str = "repeat_mode";
pub const KEY_DELAY_BETWEEN_REPETITIONS: &str = "delay_between_repetitions";
pub const KEY_DEFAULT_RECITER: &str = "default_reciter";

/// Load the playback defaults a new session starts with
///
/// Missing or unparsable values fall back to the built-in default for that
/// field. A stored combination that fails validation is replaced as a whole.
pub async fn load_playback_defaults(db: &Pool<Sqlite>) -> Result<PlaybackConfiguration> {
    let defaults = PlaybackConfiguration::default();

    let config = PlaybackConfiguration {
        repetitions_per_verse: get_or(db, KEY_REPETITIONS, defaults.repetitions_per_verse).await?,
        inter_verse_delay_secs: get_or(db, KEY_INTER_VERSE_DELAY, defaults.inter_verse_delay_secs)
            .await?,
        playback_rate: get_or(db, KEY_PLAYBACK_RATE, defaults.playback_rate).await?,
        repeat_mode: get_or::<RepeatMode>(db, KEY_REPEAT_MODE, defaults.repeat_mode).await?,
        delay_between_repetitions: get_or(
            db,
            KEY_DELAY_BETWEEN_REPETITIONS,
            defaults.delay_between_repetitions,
        )
        .await?,
    };

    if let Err(e) = config.validate() {
        warn!("Stored playback defaults are invalid ({}), using built-in defaults", e);
        return Ok(defaults);
    }

    Ok(config)
}

/// Persist playback defaults after validating them
pub async fn save_playback_defaults(db: &Pool<Sqlite>, config: &PlaybackConfiguration) -> Result<()> {
    config.validate()?;

    set_setting(db, KEY_REPETITIONS, config.repetitions_per_verse).await?;
    set_setting(db, KEY_INTER_VERSE_DELAY, config.inter_verse_delay_secs).await?;
    set_setting(db, KEY_PLAYBACK_RATE, config.playback_rate).await?;
    set_setting(db, KEY_REPEAT_MODE, config.repeat_mode).await?;
    set_setting(db, KEY_DELAY_BETWEEN_REPETITIONS, config.delay_between_repetitions).await
}

/// Reciter edition used when a request names none
pub async fn get_default_reciter(db: &Pool<Sqlite>, fallback: &str) -> Result<String> {
    match get_setting::<String>(db, KEY_DEFAULT_RECITER).await? {
        Some(reciter) if !reciter.trim().is_empty() => Ok(reciter),
        _ => Ok(fallback.to_string()),
    }
}

pub async fn set_default_reciter(db: &Pool<Sqlite>, reciter: &str) -> Result<()> {
    if reciter.trim().is_empty() {
        return Err(Error::BadRequest("Reciter must not be empty".to_string()));
    }
    set_setting(db, KEY_DEFAULT_RECITER, reciter.trim()).await
}

async fn get_or<T: FromStr>(db: &Pool<Sqlite>, key: &str, default: T) -> Result<T> {
    match get_setting::<T>(db, key).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(Error::Config(msg)) => {
            warn!("{}, using default", msg);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
