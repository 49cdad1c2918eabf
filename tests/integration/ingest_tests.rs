//! Default download processor and post sink against mock servers

use crate::common::{candidate, png};
use gleaner::ingest::{
    asset_file_name, DownloadProcessor, HttpPostSink, ImageProcessor, PostSink, ProcessedAsset,
};
use gleaner::GleanError;
use reqwest::Client;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_download_stores_asset_under_hashed_name() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/lake.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(800, 600), "image/png"))
        .mount(&mock_server)
        .await;

    let assets = TempDir::new().unwrap();
    let processor = DownloadProcessor::new(
        Client::new(),
        assets.path(),
        Some("https://cdn.example.com/assets".to_string()),
    );

    let url = format!("{}/photos/lake.png", mock_server.uri());
    let asset = processor
        .process(&candidate(&url, 800, 600, None))
        .await
        .expect("download succeeds")
        .expect("image is large enough");

    let file_name = asset_file_name(&url, "png");
    assert_eq!(asset.url, format!("https://cdn.example.com/assets/{}", file_name));
    assert_eq!((asset.width, asset.height), (800, 600));
    assert!(assets.path().join(&file_name).exists());
}

#[tokio::test]
async fn test_download_drops_small_images() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/thumb.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(320, 240), "image/png"))
        .mount(&mock_server)
        .await;

    let assets = TempDir::new().unwrap();
    let processor = DownloadProcessor::new(Client::new(), assets.path(), None);

    // Declared dimensions lie; the real ones decide
    let url = format!("{}/thumb.png", mock_server.uri());
    let result = processor
        .process(&candidate(&url, 1600, 1200, None))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_download_rejects_non_images() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/not-an-image.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&mock_server)
        .await;

    let assets = TempDir::new().unwrap();
    let processor = DownloadProcessor::new(Client::new(), assets.path(), None);

    let url = format!("{}/not-an-image.jpg", mock_server.uri());
    let err = processor
        .process(&candidate(&url, 1600, 1200, None))
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::Processing { .. }));
}

#[tokio::test]
async fn test_download_refuses_oversized_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(800, 600), "image/png"))
        .mount(&mock_server)
        .await;

    let assets = TempDir::new().unwrap();
    let processor = DownloadProcessor::new(Client::new(), assets.path(), None).with_max_bytes(100);

    let url = format!("{}/huge.png", mock_server.uri());
    let err = processor
        .process(&candidate(&url, 800, 600, None))
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::Processing { .. }));
    assert_eq!(std::fs::read_dir(assets.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_maps_missing_image_to_http_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let assets = TempDir::new().unwrap();
    let processor = DownloadProcessor::new(Client::new(), assets.path(), None);

    let url = format!("{}/gone.jpg", mock_server.uri());
    let err = processor
        .process(&candidate(&url, 1600, 1200, None))
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::HttpStatus { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_post_sink_sends_json_with_bearer_token() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_string_contains("\"source_domain\":\"photos.test\""))
        .and(body_string_contains("\"tags\":[\"landscape\",\"lake\"]"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "p-42"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = HttpPostSink::new(
        Client::new(),
        &format!("{}/api/posts", mock_server.uri()),
        Some("secret-token".to_string()),
    );
    let asset = ProcessedAsset {
        url: "https://cdn.example.com/assets/abc.jpg".to_string(),
        width: 2400,
        height: 1600,
    };
    let tags = vec!["landscape".to_string(), "lake".to_string()];

    let id = sink
        .create_post(
            &asset,
            "https://photos.test/lake",
            "photos.test",
            &tags,
            Some("A still lake"),
        )
        .await
        .unwrap();
    assert_eq!(id, "p-42");
}

#[tokio::test]
async fn test_post_sink_surfaces_rejections() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&mock_server)
        .await;

    let sink = HttpPostSink::new(Client::new(), &mock_server.uri(), None);
    let asset = ProcessedAsset {
        url: "https://cdn.example.com/assets/abc.jpg".to_string(),
        width: 2400,
        height: 1600,
    };

    let err = sink
        .create_post(&asset, "https://photos.test/lake", "photos.test", &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::HttpStatus { status: 422, .. }));
}
