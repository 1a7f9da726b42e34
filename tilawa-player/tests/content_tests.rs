//! alquran.cloud client against a local stand-in server

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tilawa_player::config::ContentConfig;
use tilawa_player::content::{AlQuranCloudClient, ContentProvider};
use tilawa_player::Error;

const SURAH_BODY: &str = r#"{
    "code": 200,
    "status": "OK",
    "data": {
        "number": 112,
        "name": "سُورَةُ الإِخۡلَاصِ",
        "englishName": "Al-Ikhlaas",
        "ayahs": [
            { "number": 6222, "numberInSurah": 1, "text": "", "audio": "https://cdn.test/6222.mp3" },
            { "number": 6223, "numberInSurah": 2, "text": "", "audio": "https://cdn.test/6223.mp3" },
            { "number": 6224, "numberInSurah": 3, "text": "", "audio": "https://cdn.test/6224.mp3" },
            { "number": 6225, "numberInSurah": 4, "text": "", "audio": "https://cdn.test/6225.mp3" }
        ]
    }
}"#;

#[derive(Clone)]
struct Flaky {
    hits: Arc<AtomicUsize>,
    failures: usize,
    failure_status: StatusCode,
}

async fn surah_handler(State(flaky): State<Flaky>) -> (StatusCode, &'static str) {
    let hit = flaky.hits.fetch_add(1, Ordering::SeqCst);
    if hit < flaky.failures {
        (flaky.failure_status, "unavailable")
    } else {
        (StatusCode::OK, SURAH_BODY)
    }
}

/// Serve `/v1/surah/:n/:edition` and return a client pointed at it
async fn start_server(failures: usize, failure_status: StatusCode) -> (AlQuranCloudClient, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/surah/:surah/:edition", get(surah_handler))
        .with_state(Flaky {
            hits: Arc::clone(&hits),
            failures,
            failure_status,
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ContentConfig {
        base_url: format!("http://{}/v1/", addr),
        retry_backoff_ms: 1,
        ..ContentConfig::default()
    };
    (AlQuranCloudClient::new(&config).unwrap(), hits)
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (client, hits) = start_server(2, StatusCode::SERVICE_UNAVAILABLE).await;

    let surah = client.surah(112, "ar.alafasy").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(surah.number, 112);
    assert_eq!(surah.verses.len(), 4);
    assert_eq!(surah.verses[3].global_number, 6225);
    assert_eq!(surah.verses[3].primary_audio_url.as_deref(), Some("https://cdn.test/6225.mp3"));
    // everyayah mirror is the first fallback for known reciters
    assert_eq!(
        surah.verses[0].fallback_audio_urls,
        vec!["https://everyayah.com/data/Alafasy_128kbps/112001.mp3".to_string()]
    );
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (client, hits) = start_server(10, StatusCode::BAD_GATEWAY).await;

    let err = client.surah(112, "ar.alafasy").await.unwrap_err();
    assert!(matches!(err, Error::Content(_)));
    assert!(err.to_string().contains("after 3 attempts"), "{}", err);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    let (client, hits) = start_server(10, StatusCode::NOT_FOUND).await;

    let err = client.surah(112, "ar.alafasy").await.unwrap_err();
    assert!(matches!(err, Error::Content(_)));
    assert!(err.to_string().contains("404"), "{}", err);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_surah_never_hits_network() {
    let (client, hits) = start_server(0, StatusCode::OK).await;

    let err = client.surah(115, "ar.alafasy").await.unwrap_err();
    assert!(matches!(err, Error::Common(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
