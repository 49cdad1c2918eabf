//! Chrome-backed render sessions
//!
//! Only compiled with the `browser` feature. A session owns one browser
//! process (or a connection to a remote one) and one reusable tab.

use crate::config::RendererConfig;
use crate::scrape::rendered::{RenderSession, RenderedImage, RenderedPage, SessionFactory};
use crate::{GleanError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// Pause after scrolling so network-triggered images can render
const SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Scrolls down in steps until the page stops growing or 3000px are covered
const SCROLL_SCRIPT: &str = r#"
(async () => {
    const cap = 3000;
    const step = 600;
    let scrolled = 0;
    let lastHeight = 0;
    while (scrolled < cap) {
        window.scrollBy(0, step);
        scrolled += step;
        await new Promise(r => setTimeout(r, 250));
        const height = document.body ? document.body.scrollHeight : 0;
        if (height === lastHeight && scrolled + window.innerHeight >= height) {
            break;
        }
        lastHeight = height;
    }
    window.scrollTo(0, 0);
    return scrolled;
})()
"#;

/// Reports every image's laid-out size and enclosing link, plus all page links
const EXTRACT_SCRIPT: &str = r#"
(() => {
    const images = Array.from(document.images).map(img => {
        const rect = img.getBoundingClientRect();
        const anchor = img.closest('a[href]');
        return {
            src: img.currentSrc || img.src || img.getAttribute('data-src') || '',
            alt: img.alt || null,
            width: rect.width,
            height: rect.height,
            link: anchor ? anchor.href : null,
        };
    }).filter(img => img.src);
    const links = Array.from(document.querySelectorAll('a[href]')).map(a => a.href);
    return { images, links };
})()
"#;

#[derive(Debug, Deserialize)]
struct Extracted {
    #[serde(default)]
    images: Vec<RenderedImage>,
    #[serde(default)]
    links: Vec<String>,
}

fn render_error(context: &str, e: impl std::fmt::Display) -> GleanError {
    GleanError::Render(format!("{}: {}", context, e))
}

/// Launch and connect failures; frontier items stay pending on these
fn unavailable(context: &str, e: impl std::fmt::Display) -> GleanError {
    GleanError::NotConfigured {
        capability: "renderer",
        reason: format!("{}: {}", context, e),
    }
}

/// Launches Chrome, or connects to a running instance, per `[renderer]`
pub struct ChromeSessionFactory {
    config: RendererConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(self.config.navigation_timeout_secs));

        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--mute-audio")
            .build()
            .map_err(|e| unavailable("invalid browser config", e))
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>> {
        let (browser, mut handler) = match &self.config.remote_url {
            Some(remote) => {
                info!("Connecting to remote browser at {}", remote);
                Browser::connect(remote.clone())
                    .await
                    .map_err(|e| unavailable("failed to connect to browser", e))?
            }
            None => {
                info!("Launching browser (headless={})", self.config.headless);
                Browser::launch(self.browser_config()?)
                    .await
                    .map_err(|e| unavailable("failed to launch browser", e))?
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error("failed to open tab", e))?;

        Ok(Box::new(ChromeSession {
            browser,
            page: Some(page),
            handler_task,
        }))
    }
}

/// One browser and its reusable tab
pub struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    async fn page(&mut self) -> Result<&Page> {
        if self.page.is_none() {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| render_error("failed to open tab", e))?;
            self.page = Some(page);
        }
        self.page
            .as_ref()
            .ok_or_else(|| GleanError::Render("tab unavailable".to_string()))
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| render_error("invalid script", e))?;

    page.evaluate_expression(params)
        .await
        .map_err(|e| render_error("script failed", e))?
        .into_value::<T>()
        .map_err(|e| render_error("unexpected script result", e))
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn is_alive(&mut self) -> bool {
        !self.handler_task.is_finished() && self.browser.version().await.is_ok()
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage> {
        let page = self.page().await?;

        page.goto(url.as_str())
            .await
            .map_err(|e| render_error(&format!("navigation to {} failed", url), e))?;

        let scrolled: f64 = evaluate(page, SCROLL_SCRIPT).await?;
        tokio::time::sleep(SETTLE_DELAY).await;

        let extracted: Extracted = evaluate(page, EXTRACT_SCRIPT).await?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        debug!(
            "Rendered {} (scrolled {}px): {} images, {} links",
            final_url,
            scrolled,
            extracted.images.len(),
            extracted.links.len()
        );

        Ok(RenderedPage {
            final_url,
            images: extracted.images,
            links: extracted.links,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        let result = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        result
            .map(|_| ())
            .map_err(|e| render_error("failed to close browser", e))
    }
}
