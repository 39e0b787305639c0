//! Plain HTTP fetch, used when the remote browser is unavailable.

use std::time::Duration;

use scraper::{Html, Selector};

use crate::error::AcquireError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Elements whose text is never page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug)]
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and return its visible body text.
    pub async fn fetch(&self, url: &str) -> Result<String, AcquireError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AcquireError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let html = response.text().await?;
        Ok(html_to_text(&html))
    }
}

/// Reduce a document to the whitespace-normalized text of its body.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    let root = body.unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_visible_body_text() {
        let html = r#"<html><head><title>Ignored</title><style>p { color: red }</style></head>
            <body><h1>Release   notes</h1>
            <script>var v = "9.9.9";</script>
            <p>Version <b>4.3</b> released</p></body></html>"#;
        assert_eq!(html_to_text(html), "Release notes Version 4.3 released");
    }

    #[test]
    fn fragment_without_body_still_yields_text() {
        assert_eq!(html_to_text("just 1.2.3"), "just 1.2.3");
    }
}
