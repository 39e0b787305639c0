//! Per-target scraping strategies and the remote acquisition script.
//!
//! A [`ScrapingStrategy`] describes how to coax a vendor page into showing
//! its version information: which tabs to click, which collapsed sections to
//! expand, what to wait for. [`build_acquisition_script`] turns it into a
//! single Puppeteer-style function body that the remote browser endpoint
//! executes in one round-trip.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on page navigation.
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on waiting for the configured readiness selector. Expiry is
/// not an error; the script carries on with whatever rendered.
pub const WAIT_FOR_SELECTOR_TIMEOUT_MS: u64 = 10_000;

/// Settle time after interactions when the strategy does not specify one.
pub const DEFAULT_SETTLE_MS: u64 = 2_000;

/// Hard ceiling on the settle time a strategy may request.
pub const MAX_SETTLE_MS: u64 = 30_000;

/// Pause after each click so that triggered content can render.
const CLICK_PAUSE_MS: u64 = 250;

/// Custom-script fragments that indicate the script waits on rendered text
/// rather than on markup structure.
const TEXT_READINESS_MARKERS: &[&str] = &["innerText", "textContent", "waitForFunction"];

// ---------------------------------------------------------------------------
// ContentMode
// ---------------------------------------------------------------------------

/// What the acquisition script hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Full serialized DOM (`page.content()`).
    Html,
    /// Rendered plain text of `<body>` (`document.body.innerText`).
    Text,
}

impl ContentMode {
    /// MIME type reported back to the browser endpoint.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentMode::Html => "text/html",
            ContentMode::Text => "text/plain",
        }
    }
}

// ---------------------------------------------------------------------------
// ScrapingStrategy
// ---------------------------------------------------------------------------

/// Interaction recipe for one acquisition target.
///
/// Stored as JSONB next to the catalog entry; every field is optional so an
/// empty object `{}` is a valid "just load the page" strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingStrategy {
    /// Selectors whose every match is clicked, in order.
    pub click_selectors: Vec<String>,
    /// Selectors whose matches are scrolled into view, in order.
    pub expand_selectors: Vec<String>,
    /// Selector to wait for after navigation.
    pub wait_for_selector: Option<String>,
    /// Settle time after interactions, in milliseconds.
    pub wait_time_ms: Option<u64>,
    /// Raw JavaScript run with `page` in scope after the interactions.
    pub custom_script: Option<String>,
    /// Explicit output mode; inferred from the custom script when absent.
    pub content_mode: Option<ContentMode>,
}

impl ScrapingStrategy {
    /// Settle duration clamped to [`MAX_SETTLE_MS`].
    pub fn settle_ms(&self) -> u64 {
        self.wait_time_ms.unwrap_or(DEFAULT_SETTLE_MS).min(MAX_SETTLE_MS)
    }

    /// Resolve the output mode.
    ///
    /// A custom script that waits on a text condition forces plain text:
    /// handing markup to the extractor would let a semantic-selector pass
    /// drop the very text the script waited for.
    pub fn content_mode(&self) -> ContentMode {
        if let Some(mode) = self.content_mode {
            return mode;
        }
        match self.custom_script.as_deref() {
            Some(script) if waits_on_text(script) => ContentMode::Text,
            _ => ContentMode::Html,
        }
    }
}

/// Whether a custom script polls rendered text.
fn waits_on_text(script: &str) -> bool {
    TEXT_READINESS_MARKERS.iter().any(|m| script.contains(m))
}

// ---------------------------------------------------------------------------
// Script builder
// ---------------------------------------------------------------------------

/// Encode a value as a JavaScript literal (JSON is a JS subset).
fn js_literal(value: impl Into<serde_json::Value>) -> String {
    value.into().to_string()
}

/// Build the remote-execution script for `url` following `strategy`.
///
/// Steps run sequentially: navigate, optionally wait for a selector
/// (non-fatal), click every match of every click selector with per-element
/// isolation, scroll expand matches into view, run the custom script with
/// errors swallowed, settle, then read the page in the resolved
/// [`ContentMode`].
pub fn build_acquisition_script(url: &str, strategy: &ScrapingStrategy) -> String {
    let mode = strategy.content_mode();
    let mut script = String::from("export default async function ({ page }) {\n");

    script.push_str(&format!(
        "  await page.goto({}, {{ waitUntil: \"networkidle2\", timeout: {NAVIGATION_TIMEOUT_MS} }});\n",
        js_literal(url)
    ));

    if let Some(selector) = strategy.wait_for_selector.as_deref() {
        script.push_str(&format!(
            "  try {{\n    await page.waitForSelector({}, {{ timeout: {WAIT_FOR_SELECTOR_TIMEOUT_MS} }});\n  }} catch (e) {{\n    console.log(`wait-for selector timed out: ${{e.message}}`);\n  }}\n",
            js_literal(selector)
        ));
    }

    if !strategy.click_selectors.is_empty() {
        script.push_str(&format!(
            "  for (const selector of {}) {{\n    const elements = await page.$$(selector);\n    for (const element of elements) {{\n      try {{\n        await element.click();\n        await new Promise((r) => setTimeout(r, {CLICK_PAUSE_MS}));\n      }} catch (e) {{\n        console.log(`click failed for ${{selector}}: ${{e.message}}`);\n      }}\n    }}\n  }}\n",
            js_literal(strategy.click_selectors.clone())
        ));
    }

    if !strategy.expand_selectors.is_empty() {
        script.push_str(&format!(
            "  for (const selector of {}) {{\n    const elements = await page.$$(selector);\n    for (const element of elements) {{\n      try {{\n        await element.evaluate((el) => el.scrollIntoView());\n      }} catch (e) {{}}\n    }}\n  }}\n",
            js_literal(strategy.expand_selectors.clone())
        ));
    }

    if let Some(custom) = strategy.custom_script.as_deref() {
        script.push_str(&format!(
            "  try {{\n    await (async () => {{\n{custom}\n    }})();\n  }} catch (e) {{\n    console.log(`custom script failed: ${{e.message}}`);\n  }}\n"
        ));
    }

    script.push_str(&format!(
        "  await new Promise((r) => setTimeout(r, {}));\n",
        strategy.settle_ms()
    ));

    match mode {
        ContentMode::Html => script.push_str("  const data = await page.content();\n"),
        ContentMode::Text => {
            script.push_str("  const data = await page.evaluate(() => document.body.innerText);\n")
        }
    }
    script.push_str(&format!(
        "  return {{ data, type: {} }};\n}}\n",
        js_literal(mode.mime_type())
    ));

    script
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strategy_navigates_settles_and_reads_html() {
        let script = build_acquisition_script("https://example.com/releases", &ScrapingStrategy::default());
        assert!(script.starts_with("export default async function ({ page })"));
        assert!(script.contains("page.goto(\"https://example.com/releases\""));
        assert!(script.contains("timeout: 30000"));
        assert!(script.contains("setTimeout(r, 2000)"));
        assert!(script.contains("page.content()"));
        assert!(!script.contains("waitForSelector"));
        assert!(!script.contains("element.click()"));
    }

    #[test]
    fn wait_for_selector_is_non_fatal() {
        let strategy = ScrapingStrategy {
            wait_for_selector: Some(".release-notes".into()),
            ..Default::default()
        };
        let script = build_acquisition_script("https://example.com", &strategy);
        let wait = script.find("waitForSelector(\".release-notes\"").unwrap();
        let try_pos = script[..wait].rfind("try {").unwrap();
        assert!(try_pos < wait);
        assert!(script[wait..].contains("catch (e)"));
        assert!(script.contains("timeout: 10000"));
    }

    #[test]
    fn clicks_are_isolated_per_element() {
        let strategy = ScrapingStrategy {
            click_selectors: vec!["#tab-releases".into(), "button.more".into()],
            ..Default::default()
        };
        let script = build_acquisition_script("https://example.com", &strategy);
        assert!(script.contains(r##"["#tab-releases","button.more"]"##));
        let click = script.find("element.click()").unwrap();
        let loop_pos = script.find("for (const element of elements)").unwrap();
        let try_pos = script[loop_pos..click].find("try {");
        assert!(try_pos.is_some(), "click must be wrapped inside the per-element loop");
    }

    #[test]
    fn expand_selectors_scroll_into_view() {
        let strategy = ScrapingStrategy {
            expand_selectors: vec!["details".into()],
            ..Default::default()
        };
        let script = build_acquisition_script("https://example.com", &strategy);
        assert!(script.contains(r#"["details"]"#));
        assert!(script.contains("scrollIntoView()"));
    }

    #[test]
    fn selectors_are_escaped() {
        let strategy = ScrapingStrategy {
            click_selectors: vec![r#"a[title="Release \"notes\""]"#.into()],
            ..Default::default()
        };
        let script = build_acquisition_script("https://example.com/?q=\"x\"", &strategy);
        assert!(script.contains(r#"page.goto("https://example.com/?q=\"x\"""#));
        assert!(script.contains(r#"a[title=\"Release \\\"notes\\\"\"]"#));
    }

    #[test]
    fn custom_script_errors_are_swallowed() {
        let strategy = ScrapingStrategy {
            custom_script: Some("await page.click('#load');".into()),
            ..Default::default()
        };
        let script = build_acquisition_script("https://example.com", &strategy);
        assert!(script.contains("await page.click('#load');"));
        assert!(script.contains("custom script failed"));
        assert!(script.contains("page.content()"));
    }

    #[test]
    fn text_readiness_script_returns_plain_text() {
        let strategy = ScrapingStrategy {
            custom_script: Some(
                "await page.waitForFunction(() => document.body.innerText.includes('Version'));"
                    .into(),
            ),
            ..Default::default()
        };
        assert_eq!(strategy.content_mode(), ContentMode::Text);
        let script = build_acquisition_script("https://example.com", &strategy);
        assert!(script.contains("document.body.innerText);"));
        assert!(script.contains("type: \"text/plain\""));
        assert!(!script.contains("page.content()"));
    }

    #[test]
    fn explicit_mode_overrides_inference() {
        let strategy = ScrapingStrategy {
            custom_script: Some("await page.waitForFunction(() => true);".into()),
            content_mode: Some(ContentMode::Html),
            ..Default::default()
        };
        assert_eq!(strategy.content_mode(), ContentMode::Html);
    }

    #[test]
    fn settle_time_is_clamped() {
        let strategy = ScrapingStrategy {
            wait_time_ms: Some(600_000),
            ..Default::default()
        };
        assert_eq!(strategy.settle_ms(), MAX_SETTLE_MS);
        let script = build_acquisition_script("https://example.com", &strategy);
        assert!(script.contains("setTimeout(r, 30000)"));
    }

    #[test]
    fn strategy_deserializes_from_partial_json() {
        let strategy: ScrapingStrategy =
            serde_json::from_str(r##"{"click_selectors": ["#a"], "content_mode": "text"}"##).unwrap();
        assert_eq!(strategy.click_selectors, vec!["#a".to_string()]);
        assert!(strategy.expand_selectors.is_empty());
        assert_eq!(strategy.content_mode, Some(ContentMode::Text));
    }
}
