//! HttpImageLoader against a local image host
//!
//! Spins up an axum server on an ephemeral port that serves an image, a
//! missing path, an HTML page, and a relay that fetches nothing but always
//! answers with an image.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use reel_common::config::HttpConfig;
use reel_poster::{
    resolve_request, FallbackChain, FallbackTransform, HttpImageLoader, ImageLoader, ImageRequest,
    LoadOutcome, MemorySuccessCache, Phase, ResolverContext, SuccessCache,
};
use std::net::SocketAddr;
use std::sync::Arc;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

async fn png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_MAGIC)
}

async fn html_page() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
}

async fn missing() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

/// Start the image host, returning its address
async fn start_image_host() -> SocketAddr {
    let app = Router::new()
        .route("/ok.png", get(png))
        .route("/page.html", get(html_page))
        .route("/missing.png", get(missing))
        .route("/relay", get(png));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn loader() -> HttpImageLoader {
    let config = HttpConfig {
        timeout_ms: 2_000,
        ..Default::default()
    };
    HttpImageLoader::new(&config, None).unwrap()
}

#[tokio::test]
async fn test_image_response_loads() {
    let addr = start_image_host().await;
    let outcome = loader().load(&format!("http://{}/ok.png", addr)).await;
    assert_eq!(outcome, LoadOutcome::Loaded);
}

#[tokio::test]
async fn test_404_fails() {
    let addr = start_image_host().await;
    let outcome = loader().load(&format!("http://{}/missing.png", addr)).await;
    assert!(!outcome.is_loaded());
}

#[tokio::test]
async fn test_non_image_content_type_fails() {
    let addr = start_image_host().await;
    let outcome = loader().load(&format!("http://{}/page.html", addr)).await;
    assert!(!outcome.is_loaded());
}

#[tokio::test]
async fn test_upgraded_scheme_falls_back_to_relay() {
    let addr = start_image_host().await;

    // The host speaks plain HTTP, so the https: upgrade of the original fails
    // and the first relay has to deliver the image.
    let chain = FallbackChain::new(vec![FallbackTransform::new(
        "local-relay",
        format!("http://{}/relay?url={{url_encoded}}", addr),
    )]);
    let cache = Arc::new(MemorySuccessCache::new());
    let ctx = ResolverContext::new(Arc::new(chain), cache.clone());

    let original = format!("http://{}/ok.png", addr);
    let report = resolve_request(ImageRequest::new(original), &ctx, &loader()).await;

    let upgraded = format!("https://{}/ok.png", addr);
    let expected = format!(
        "http://{}/relay?url={}",
        addr,
        reel_poster::fallback::encode_uri_component(&upgraded)
    );
    assert_eq!(report.phase, Phase::Loaded);
    assert_eq!(report.attempts[0].url, upgraded);
    assert!(!report.attempts[0].loaded);
    assert_eq!(report.resolved_url, expected);
    assert!(cache.contains(&expected));
}
