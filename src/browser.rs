use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jluszcz_rust_utils::cache::{dated_cache_path, try_cached_query};
use log::{debug, info, trace, warn};
use scraper::{ElementRef, Html, Node, Selector};
use thirtyfour::ChromiumLikeCapabilities;
use thirtyfour::prelude::*;
use tokio::time::sleep;

use crate::airline::{calendar_url, query_calendar};
use crate::config::TrackerConfig;

const CELL_SELECTOR: &str = "td, .day, .date, [data-date]";
const COOKIE_DIALOG_TIMEOUT: Duration = Duration::from_secs(5);
const COOKIE_DIALOG_POLL: Duration = Duration::from_millis(250);
const COOKIE_DISMISS_WAIT: Duration = Duration::from_secs(2);

const PAGE_CONTENT_FILE: &str = "page_content.txt";
const SCREENSHOT_FILE: &str = "final_screenshot.png";

/// Text of the calendar page as a reader would see it.
#[derive(Debug, Default)]
pub struct RenderedPage {
    pub text: String,
    pub cells: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Renderer {
    WebDriver,
    Http,
}

impl FromStr for Renderer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "webdriver" => Ok(Renderer::WebDriver),
            "http" => Ok(Renderer::Http),
            other => Err(anyhow!("Unknown renderer: {other}")),
        }
    }
}

fn reject_cookie_locators() -> [By; 6] {
    [
        By::XPath("//button[contains(normalize-space(.), 'Reject All')]"),
        By::XPath("//button[contains(normalize-space(.), 'Reject all')]"),
        By::XPath("//button[contains(normalize-space(.), 'Decline All')]"),
        By::Css("[data-testid=\"reject-all\"]"),
        By::Css(".reject-all"),
        By::Css("#reject-all"),
    ]
}

pub async fn render(config: &TrackerConfig) -> Result<RenderedPage> {
    let page = match config.renderer {
        Renderer::WebDriver => render_webdriver(config).await?,
        Renderer::Http => render_http(config).await?,
    };
    debug!(
        "Rendered {} chars of text and {} calendar cells",
        page.text.len(),
        page.cells.len()
    );

    if let Some(dir) = &config.debug_dir {
        save_page_text(dir, &page).await?;
    }

    Ok(page)
}

async fn save_page_text(dir: &Path, page: &RenderedPage) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(PAGE_CONTENT_FILE);
    tokio::fs::write(&path, &page.text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Saved page text to {}", path.display());
    Ok(())
}

fn cache_key(config: &TrackerConfig) -> String {
    format!(
        "calendar-{}-{}-{}-{}",
        config.route.origin, config.route.destination, config.month.year, config.month.month
    )
}

async fn render_http(config: &TrackerConfig) -> Result<RenderedPage> {
    let cache_path = dated_cache_path(&cache_key(config));

    let html = try_cached_query(config.use_cache, &cache_path, || {
        query_calendar(&config.route, &config.month)
    })
    .await?;
    trace!("{html}");

    Ok(page_from_html(&html))
}

async fn render_webdriver(config: &TrackerConfig) -> Result<RenderedPage> {
    let mut caps = DesiredCapabilities::chrome();
    if config.headless {
        caps.set_headless()?;
    }

    let driver = WebDriver::new(config.webdriver_url.as_str(), caps)
        .await
        .with_context(|| format!("Failed to connect to WebDriver at {}", config.webdriver_url))?;

    let result = drive(&driver, config).await;

    // The session has to be closed whether or not the page loaded.
    if let Err(e) = driver.quit().await {
        warn!("Failed to close browser session: {e}");
    }

    result
}

async fn drive(driver: &WebDriver, config: &TrackerConfig) -> Result<RenderedPage> {
    let url = calendar_url(&config.route, &config.month);
    info!("Navigating to {url}");
    driver.goto(&url).await?;

    dismiss_cookie_dialog(driver).await;

    sleep(config.settle).await;

    let text = driver.find(By::Tag("body")).await?.text().await?;

    let mut cells = Vec::new();
    for element in driver.find_all(By::Css(CELL_SELECTOR)).await? {
        match element.text().await {
            Ok(t) if !t.trim().is_empty() => cells.push(t),
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable calendar cell: {e}"),
        }
    }

    if let Some(dir) = &config.debug_dir {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(SCREENSHOT_FILE);
        driver.screenshot(&path).await?;
        debug!("Saved screenshot to {}", path.display());
    }

    Ok(RenderedPage { text, cells })
}

/// Waits for any known "reject cookies" button to appear and clicks it.
async fn dismiss_cookie_dialog(driver: &WebDriver) -> bool {
    let mut locators = reject_cookie_locators().into_iter();
    let Some(first) = locators.next() else {
        return false;
    };
    let query = locators
        .fold(driver.query(first), |query, locator| query.or(locator))
        .wait(COOKIE_DIALOG_TIMEOUT, COOKIE_DIALOG_POLL)
        .and_displayed();

    let button = match query.first().await {
        Ok(button) => button,
        Err(e) => {
            debug!("No cookie button appeared: {e}");
            info!("No cookie consent dialog found");
            return false;
        }
    };

    match button.click().await {
        Ok(()) => {
            info!("Dismissed cookie dialog");
            sleep(COOKIE_DISMISS_WAIT).await;
            true
        }
        Err(e) => {
            warn!("Cookie dialog button not clickable: {e}");
            false
        }
    }
}

fn is_hidden(element: &ElementRef) -> bool {
    matches!(
        element.value().name(),
        "script" | "style" | "noscript" | "template" | "head"
    )
}

fn is_block(element: &ElementRef) -> bool {
    matches!(
        element.value().name(),
        "p" | "div"
            | "br"
            | "li"
            | "tr"
            | "td"
            | "th"
            | "table"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "button"
    )
}

fn visible_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if is_hidden(&child) {
                        continue;
                    }
                    visible_text(child, out);
                    if is_block(&child) && !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Approximates a browser's rendered body text from static HTML.
pub fn page_from_html(html: &str) -> RenderedPage {
    let document = Html::parse_document(html);

    let mut text = String::new();
    match Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
    {
        Some(body) => visible_text(body, &mut text),
        None => visible_text(document.root_element(), &mut text),
    }

    let cells = Selector::parse(CELL_SELECTOR)
        .map(|selector| {
            document
                .select(&selector)
                .map(|cell| {
                    let mut t = String::new();
                    visible_text(cell, &mut t);
                    t.trim().to_owned()
                })
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    RenderedPage {
        text: text.trim().to_owned(),
        cells,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE_CALENDAR_HTML: &str = include_str!("../tests/fixtures/calendar_page.html");

    #[test]
    fn test_renderer_parse() {
        assert_eq!("webdriver".parse::<Renderer>().unwrap(), Renderer::WebDriver);
        assert_eq!("http".parse::<Renderer>().unwrap(), Renderer::Http);
        assert!("playwright".parse::<Renderer>().is_err());
    }

    #[test]
    fn test_page_from_html_skips_scripts() {
        let page = page_from_html(
            "<html><head><title>t</title></head><body><script>var pts = 1;</script><p>Hello</p><style>p{}</style></body></html>",
        );
        assert_eq!(page.text, "Hello");
    }

    #[test]
    fn test_page_from_html_separates_blocks() {
        let page = page_from_html("<body><div>Sun 19</div><div>Economy</div></body>");
        assert_eq!(page.text, "Sun 19\nEconomy");
    }

    #[test]
    fn test_page_from_html_joins_inline() {
        let page = page_from_html("<body><p><span>95,000</span><span>pts</span></p></body>");
        assert_eq!(page.text, "95,000 pts");
    }

    #[test]
    fn test_page_from_html_cells() {
        let page = page_from_html(EXAMPLE_CALENDAR_HTML);
        assert!(page.cells.iter().any(|c| c.contains("Upper Class")));
        assert!(page.cells.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_page_from_html_fixture_text() {
        let page = page_from_html(EXAMPLE_CALENDAR_HTML);
        assert!(page.text.contains("Sun 19"));
        assert!(!page.text.contains("window.__STATE__"));
    }

    #[tokio::test]
    async fn test_save_page_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let page = RenderedPage {
            text: "Sun 19".to_owned(),
            cells: vec![],
        };
        save_page_text(dir.path(), &page).await?;
        let saved = tokio::fs::read_to_string(dir.path().join(PAGE_CONTENT_FILE)).await?;
        assert_eq!(saved, "Sun 19");
        Ok(())
    }

    #[test]
    fn test_cache_key_depends_on_query() {
        let output = std::path::PathBuf::from("extracted_points.txt");
        let blr = crate::config::test_config(output.clone());
        let mut jfk = crate::config::test_config(output.clone());
        jfk.route = crate::types::Route::new("LHR", "JFK").unwrap();
        let mut november = crate::config::test_config(output);
        november.month = crate::types::SearchMonth::new(11, 2025).unwrap();

        assert_eq!(cache_key(&blr), "calendar-LHR-BLR-2025-10");
        assert_ne!(cache_key(&blr), cache_key(&jfk));
        assert_ne!(cache_key(&blr), cache_key(&november));
    }

    #[test]
    fn test_cookie_dialog_waits_for_late_banner() {
        assert!(COOKIE_DIALOG_TIMEOUT >= Duration::from_secs(3));
        assert!(COOKIE_DIALOG_POLL < COOKIE_DIALOG_TIMEOUT);
    }

    /// Requires a WebDriver server on localhost:4444.
    #[tokio::test]
    #[ignore]
    async fn test_dismiss_late_cookie_banner() -> Result<()> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        let driver = WebDriver::new("http://localhost:4444", caps).await?;

        driver
            .goto("data:text/html,<html><body><script>setTimeout(function(){var b=document.createElement('button');b.textContent='Reject All';b.onclick=function(){b.remove()};document.body.appendChild(b)},1000)</script></body></html>")
            .await?;
        let dismissed = dismiss_cookie_dialog(&driver).await;
        let remaining = driver
            .find_all(By::XPath("//button[contains(normalize-space(.), 'Reject All')]"))
            .await?;

        driver.quit().await?;

        assert!(dismissed);
        assert!(remaining.is_empty());
        Ok(())
    }
}
