//! Database initialization
//!
//! Opens (creating if needed) the SQLite file, creates tables and seeds any
//! missing settings with their built-in defaults.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tilawa_common::PlaybackConfiguration;
use tracing::info;

use super::settings::{
    KEY_DEFAULT_RECITER, KEY_DELAY_BETWEEN_REPETITIONS, KEY_INTER_VERSE_DELAY,
    KEY_PLAYBACK_RATE, KEY_REPEAT_MODE, KEY_REPETITIONS,
};

/// Open the database file and bring the schema up to date
pub async fn init_database(path: &Path, default_reciter: &str) -> Result<Pool<Sqlite>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tilawa_common::config::ensure_dir(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    info!("Connected to database: {}", path.display());

    create_schema(&pool).await?;
    init_settings_defaults(&pool, default_reciter).await?;

    Ok(pool)
}

/// Create tables if they do not exist
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS saved_sections (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            surah_number INTEGER NOT NULL CHECK (surah_number BETWEEN 1 AND 114),
            start_ayah INTEGER NOT NULL CHECK (start_ayah >= 1),
            end_ayah INTEGER NOT NULL CHECK (end_ayah >= start_ayah),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert defaults for any missing setting
pub async fn init_settings_defaults(pool: &Pool<Sqlite>, default_reciter: &str) -> Result<()> {
    let playback = PlaybackConfiguration::default();

    let defaults = vec![
        (KEY_REPETITIONS, playback.repetitions_per_verse.to_string()),
        (KEY_INTER_VERSE_DELAY, playback.inter_verse_delay_secs.to_string()),
        (KEY_PLAYBACK_RATE, playback.playback_rate.to_string()),
        (KEY_REPEAT_MODE, playback.repeat_mode.to_string()),
        (
            KEY_DELAY_BETWEEN_REPETITIONS,
            playback.delay_between_repetitions.to_string(),
        ),
        (KEY_DEFAULT_RECITER, default_reciter.to_string()),
    ];

    for (key, default_value) in defaults {
        let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(&default_value)
            .execute(pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
    }

    Ok(())
}
