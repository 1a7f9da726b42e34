//! HTTP request handlers
//!
//! Engine errors are mapped to status codes in one place (`ApiError`); every
//! error body is `{ "status": "error: <message>" }`.

use crate::api::server::AppContext;
use crate::audio::AudioOutput;
use crate::content::{self, ContentProvider};
use crate::db;
use crate::error::Error;
use crate::state::SessionSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tilawa_common::{
    ConfigurationUpdate, PlaybackConfiguration, PlaybackMode, SavedSection, Verse, VerseRange,
};
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

/// POST /sessions body: exactly one of `surah` or `range`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub surah: Option<u16>,
    pub range: Option<VerseRange>,
    pub reciter: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: PlaybackMode,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    /// Applied on top of the stored defaults
    #[serde(default)]
    pub config: ConfigurationUpdate,
}

/// Optional body of POST /sessions/section/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSessionRequest {
    pub reciter: Option<String>,
    #[serde(default)]
    pub start_index: usize,
    pub autoplay: Option<bool>,
    #[serde(default)]
    pub config: ConfigurationUpdate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedResponse {
    pub session_id: Uuid,
    pub total_verses: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub position_secs: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekResponse {
    pub position_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    pub name: String,
    pub surah_number: u16,
    pub start_ayah: u16,
    pub end_ayah: u16,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDefaults {
    pub config: PlaybackConfiguration,
    pub default_reciter: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDefaultsUpdate {
    #[serde(default)]
    pub config: ConfigurationUpdate,
    pub default_reciter: Option<String>,
}

fn default_mode() -> PlaybackMode {
    PlaybackMode::Listening
}

fn default_autoplay() -> bool {
    true
}

// ============================================================================
// Error mapping
// ============================================================================

/// Engine error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<tilawa_common::Error> for ApiError {
    fn from(err: tilawa_common::Error) -> Self {
        Self(Error::Common(err))
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::BadRequest(_) | Error::Common(tilawa_common::Error::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) | Error::Common(tilawa_common::Error::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidState(_) | Error::NothingToPlay => StatusCode::CONFLICT,
            Error::Content(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(StatusResponse {
                status: format!("error: {}", self.0),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Health / build info
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tilawa-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /build_info
pub async fn get_build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

/// GET /audio/devices - List available audio output devices
pub async fn list_audio_devices() -> ApiResult<Json<DeviceListResponse>> {
    let devices = tokio::task::spawn_blocking(AudioOutput::list_devices)
        .await
        .map_err(|e| Error::Internal(format!("Device listing failed: {}", e)))??;
    Ok(Json(DeviceListResponse { devices }))
}

// ============================================================================
// Sessions
// ============================================================================

async fn resolve_reciter(ctx: &AppContext, requested: Option<String>) -> ApiResult<String> {
    match requested.filter(|r| !r.trim().is_empty()) {
        Some(reciter) => Ok(reciter),
        None => Ok(db::settings::get_default_reciter(&ctx.db_pool, &ctx.default_reciter).await?),
    }
}

async fn session_config(ctx: &AppContext, update: &ConfigurationUpdate) -> ApiResult<PlaybackConfiguration> {
    let defaults = db::settings::load_playback_defaults(&ctx.db_pool).await?;
    Ok(update.apply_to(&defaults)?)
}

async fn start(
    ctx: &AppContext,
    verses: Vec<Verse>,
    mode: PlaybackMode,
    config: PlaybackConfiguration,
    start_index: usize,
    autoplay: bool,
) -> ApiResult<Json<SessionStartedResponse>> {
    let total_verses = verses.len();
    let session_id = ctx
        .controller
        .start(verses, mode, config, start_index, autoplay)
        .await?;

    info!("Started {} session {} with {} verses", mode, session_id, total_verses);
    Ok(Json(SessionStartedResponse {
        session_id,
        total_verses,
    }))
}

/// POST /sessions - Start a session over a surah or a verse range
pub async fn start_session(
    State(ctx): State<AppContext>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<SessionStartedResponse>> {
    let reciter = resolve_reciter(&ctx, req.reciter).await?;
    let provider: &dyn ContentProvider = ctx.content.as_ref();

    let verses = match (req.surah, req.range) {
        (Some(surah), None) => provider.surah(surah, &reciter).await?.verses,
        (None, Some(range)) => content::resolve_range(provider, &range, &reciter).await?,
        _ => {
            return Err(Error::BadRequest(
                "Exactly one of 'surah' or 'range' is required".to_string(),
            )
            .into())
        }
    };

    let config = session_config(&ctx, &req.config).await?;
    start(&ctx, verses, req.mode, config, req.start_index, req.autoplay).await
}

/// POST /sessions/section/:section_id - Memorization drill of a saved section
pub async fn start_section_session(
    State(ctx): State<AppContext>,
    Path(section_id): Path<Uuid>,
    body: Option<Json<SectionSessionRequest>>,
) -> ApiResult<Json<SessionStartedResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let section = db::sections::get_section(&ctx.db_pool, section_id).await?;
    let reciter = resolve_reciter(&ctx, req.reciter).await?;
    let verses = content::resolve_section(ctx.content.as_ref(), &section, &reciter).await?;

    let config = session_config(&ctx, &req.config).await?;
    start(
        &ctx,
        verses,
        PlaybackMode::Memorization,
        config,
        req.start_index,
        req.autoplay.unwrap_or(true),
    )
    .await
}

/// DELETE /sessions - Tear down the active session
pub async fn stop_session(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.stop().await?;
    Ok(StatusResponse::ok())
}

// ============================================================================
// Transport control
// ============================================================================

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.play().await?;
    Ok(StatusResponse::ok())
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.pause().await?;
    Ok(StatusResponse::ok())
}

/// POST /playback/next
pub async fn next(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.next().await?;
    Ok(StatusResponse::ok())
}

/// POST /playback/previous
pub async fn previous(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.previous().await?;
    Ok(StatusResponse::ok())
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<Json<SeekResponse>> {
    let position_secs = ctx.controller.seek(req.position_secs).await?;
    Ok(Json(SeekResponse { position_secs }))
}

/// POST /playback/jump
pub async fn jump(
    State(ctx): State<AppContext>,
    Json(req): Json<JumpRequest>,
) -> ApiResult<Json<StatusResponse>> {
    ctx.controller.jump_to(req.index).await?;
    Ok(StatusResponse::ok())
}

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.controller.snapshot())
}

/// PUT /playback/config - Live update of the active session
pub async fn configure(
    State(ctx): State<AppContext>,
    Json(update): Json<ConfigurationUpdate>,
) -> ApiResult<Json<PlaybackConfiguration>> {
    let config = ctx.controller.configure(update).await?;
    Ok(Json(config))
}

// ============================================================================
// Saved sections
// ============================================================================

/// GET /sections
pub async fn list_sections(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<SavedSection>>> {
    Ok(Json(db::sections::list_sections(&ctx.db_pool).await?))
}

/// POST /sections
pub async fn create_section(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateSectionRequest>,
) -> ApiResult<(StatusCode, Json<SavedSection>)> {
    let section = SavedSection::new(req.name, req.surah_number, req.start_ayah, req.end_ayah)?;
    db::sections::insert_section(&ctx.db_pool, &section).await?;

    info!(
        "Saved section '{}' ({}:{}-{})",
        section.name, section.surah_number, section.start_ayah, section.end_ayah
    );
    Ok((StatusCode::CREATED, Json(section)))
}

/// DELETE /sections/:section_id
pub async fn delete_section(
    State(ctx): State<AppContext>,
    Path(section_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db::sections::delete_section(&ctx.db_pool, section_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Stored defaults
// ============================================================================

/// GET /settings/playback
pub async fn get_playback_defaults(State(ctx): State<AppContext>) -> ApiResult<Json<PlaybackDefaults>> {
    let config = db::settings::load_playback_defaults(&ctx.db_pool).await?;
    let default_reciter = db::settings::get_default_reciter(&ctx.db_pool, &ctx.default_reciter).await?;
    Ok(Json(PlaybackDefaults {
        config,
        default_reciter,
    }))
}

/// PUT /settings/playback - Persist defaults used by future sessions
pub async fn update_playback_defaults(
    State(ctx): State<AppContext>,
    Json(req): Json<PlaybackDefaultsUpdate>,
) -> ApiResult<Json<PlaybackDefaults>> {
    let current = db::settings::load_playback_defaults(&ctx.db_pool).await?;
    let config = req.config.apply_to(&current)?;

    if let Some(reciter) = req.default_reciter.as_deref() {
        if reciter.trim().is_empty() {
            return Err(Error::BadRequest("defaultReciter must not be empty".to_string()).into());
        }
        db::settings::set_default_reciter(&ctx.db_pool, reciter.trim()).await?;
    }
    db::settings::save_playback_defaults(&ctx.db_pool, &config).await?;

    let default_reciter = db::settings::get_default_reciter(&ctx.db_pool, &ctx.default_reciter).await?;
    Ok(Json(PlaybackDefaults {
        config,
        default_reciter,
    }))
}
