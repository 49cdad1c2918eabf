//! Scraper strategies against mock HTTP servers

use gleaner::scrape::{
    RedditScraper, ScrapeOptions, Scraper, StaticPageScraper, UnsplashScraper,
};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_static_page_candidates_and_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head>
                <meta property="og:image" content="/images/cover.jpg">
            </head><body>
                <img src="/images/one.jpg" alt="First photo" width="1600" height="1200">
                <img data-src="/images/lazy.jpg" alt="Lazy photo">
                <img src="/images/tiny.jpg" width="40" height="40">
                <img src="/images/site-logo.png">
                <img src="/images/one.jpg">
                <a href="/gallery?page=2">Next</a>
                <a href="/files/archive.zip" download>Archive</a>
            </body></html>"#,
            "text/html; charset=utf-8",
        ))
        .mount(&mock_server)
        .await;

    let scraper = StaticPageScraper::new(Client::new());
    let output = scraper
        .scrape(&format!("{}/gallery", base_url), 10, &ScrapeOptions::default())
        .await
        .unwrap();

    let urls: Vec<String> = output.images.iter().map(|c| c.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/images/cover.jpg", base_url),
            format!("{}/images/one.jpg", base_url),
            format!("{}/images/lazy.jpg", base_url),
        ]
    );
    assert_eq!(output.images[1].width, Some(1600));
    assert_eq!(output.images[1].alt.as_deref(), Some("First photo"));
    assert_eq!(output.links, vec![format!("{}/gallery?page=2", base_url)]);
}

#[tokio::test]
async fn test_static_page_respects_limit() {
    let mock_server = MockServer::start().await;
    let images: String = (0..5)
        .map(|i| format!(r#"<img src="/images/{}.jpg">"#, i))
        .collect();
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(format!("<html><body>{}</body></html>", images), "text/html"),
        )
        .mount(&mock_server)
        .await;

    let scraper = StaticPageScraper::new(Client::new());
    let output = scraper
        .scrape(&mock_server.uri(), 2, &ScrapeOptions::default())
        .await
        .unwrap();
    assert_eq!(output.images.len(), 2);
}

#[tokio::test]
async fn test_static_page_rejects_non_html() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
        .mount(&mock_server)
        .await;

    let scraper = StaticPageScraper::new(Client::new());
    let result = scraper
        .scrape(&mock_server.uri(), 10, &ScrapeOptions::default())
        .await;
    assert!(result.is_err());
}

fn unsplash_photo(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "width": 4000,
        "height": 3000,
        "alt_description": "snowy mountain ridge",
        "urls": {
            "full": format!("https://images.unsplash.com/{}?full", id),
            "regular": format!("https://images.unsplash.com/{}?regular", id)
        },
        "links": {"html": format!("https://unsplash.com/photos/{}", id)}
    })
}

#[tokio::test]
async fn test_unsplash_search() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/photos"))
        .and(query_param("query", "mountains"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Client-ID test-key"))
        .and(header("accept-version", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "total_pages": 1,
            "results": [unsplash_photo("a1"), unsplash_photo("b2")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scraper = UnsplashScraper::new(
        Client::new(),
        &mock_server.uri(),
        Some("test-key".to_string()),
    );
    assert!(scraper.is_configured());

    let output = scraper
        .scrape("mountains", 10, &ScrapeOptions::default())
        .await
        .unwrap();

    assert_eq!(output.images.len(), 2);
    assert_eq!(output.images[0].url, "https://images.unsplash.com/a1?full");
    assert_eq!(output.images[0].source_domain, "unsplash.com");
    assert_eq!(output.images[0].width, Some(4000));
    assert!(output.links.is_empty());
}

#[tokio::test]
async fn test_unsplash_server_error_fails_the_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let scraper = UnsplashScraper::new(
        Client::new(),
        &mock_server.uri(),
        Some("test-key".to_string()),
    );
    let err = scraper
        .scrape("mountains", 10, &ScrapeOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_reddit_listing_keeps_image_posts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "reddit-token",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/EarthPorn/hot"))
        .and(header("authorization", "Bearer reddit-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "after": null,
                "children": [
                    {"data": {
                        "url": "https://i.redd.it/lake.jpg",
                        "title": "Glacier lake at sunrise",
                        "permalink": "/r/EarthPorn/comments/1/lake/",
                        "post_hint": "image",
                        "preview": {"images": [{"source": {"width": 4032, "height": 3024}}]}
                    }},
                    {"data": {
                        "url": "https://www.reddit.com/r/EarthPorn/comments/2/discussion/",
                        "title": "Discussion thread",
                        "permalink": "/r/EarthPorn/comments/2/discussion/",
                        "is_self": true
                    }},
                    {"data": {
                        "url": "https://example.com/article",
                        "title": "An article",
                        "permalink": "/r/EarthPorn/comments/3/article/",
                        "post_hint": "link"
                    }}
                ]
            }
        })))
        .mount(&mock_server)
        .await;

    let scraper = RedditScraper::new(
        Client::new(),
        &mock_server.uri(),
        &format!("{}/api/v1/access_token", mock_server.uri()),
        Some("client-id".to_string()),
        Some("client-secret".to_string()),
    );

    let output = scraper
        .scrape("r/EarthPorn", 10, &ScrapeOptions::default())
        .await
        .unwrap();
    assert_eq!(output.images.len(), 1);
    let image = &output.images[0];
    assert_eq!(image.url, "https://i.redd.it/lake.jpg");
    assert_eq!(
        image.page_url,
        "https://www.reddit.com/r/EarthPorn/comments/1/lake/"
    );
    assert_eq!(image.width, Some(4032));

    // The cached token is reused
    scraper
        .scrape("EarthPorn", 10, &ScrapeOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reddit_without_credentials_is_empty() {
    let scraper = RedditScraper::new(
        Client::new(),
        "https://oauth.reddit.com",
        "https://www.reddit.com/api/v1/access_token",
        None,
        None,
    );
    assert!(!scraper.is_configured());

    let output = scraper
        .scrape("EarthPorn", 10, &ScrapeOptions::default())
        .await
        .unwrap();
    assert!(output.images.is_empty());
}
