//! HTTP implementations of the fetch and score boundaries.
//!
//! [`HttpFetcher`] does a plain GET and a shallow title/feed-link scan;
//! heavyweight content extraction lives behind the scoring service, not
//! here. [`HttpScorer`] posts article text to the scoring API and maps its
//! per-foundation JSON back onto [`ScoredFoundation`] values.

use std::collections::HashMap;
use std::time::Duration;

use moralgraph_shared::{
    FetchedArticle, Foundation, MoralGraphError, Polarity, Result, ScoredFoundation, ScoringConfig,
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::pipeline::{ArticleFetcher, MoralScorer};

/// Fetches article pages and RSS feeds over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moralgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| MoralGraphError::Fetch(format!("client build: {e}")))?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| MoralGraphError::Fetch(format!("{url}: {e}")))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| MoralGraphError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoralGraphError::Fetch(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| MoralGraphError::Fetch(format!("{url}: {e}")))
    }
}

impl ArticleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedArticle> {
        let body = self.get_text(url).await?;
        let title = extract_title(&body).unwrap_or_else(|| url.to_string());
        debug!(url = %url, bytes = body.len(), "article fetched");
        Ok(FetchedArticle {
            title,
            url: url.to_string(),
            text: body,
            language: None,
        })
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<String>> {
        let body = self.get_text(feed_url).await?;
        Ok(extract_feed_links(&body))
    }
}

/// First `<title>` element text, trimmed.
fn extract_title(html: &str) -> Option<String> {
    let start = html.find("<title")?;
    let open_end = html[start..].find('>')? + start + 1;
    let close = html[open_end..].find("</title>")? + open_end;
    let title = html[open_end..close].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Article links from the `<item>` blocks of an RSS document, in order.
fn extract_feed_links(xml: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = xml;
    while let Some(item_start) = rest.find("<item") {
        let item = &rest[item_start..];
        let Some(item_end) = item.find("</item>") else { break };
        let block = &item[..item_end];

        if let Some(link_start) = block.find("<link>") {
            if let Some(link_end) = block[link_start + 6..].find("</link>") {
                let link = block[link_start + 6..link_start + 6 + link_end].trim();
                if !link.is_empty() {
                    links.push(link.to_string());
                }
            }
        }
        rest = &rest[item_start + item_end..];
    }
    links
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// One foundation entry in the scoring API's response. The key is the
/// foundation label; unknown labels are dropped during mapping.
#[derive(Debug, Deserialize)]
struct ScoreEntry {
    intensity: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    hits: Option<i64>,
}

/// Calls the external moral scoring model over HTTP.
pub struct HttpScorer {
    client: reqwest::Client,
    api_url: String,
    model_name: String,
}

impl HttpScorer {
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moralgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MoralGraphError::Scoring(format!("client build: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model_name: config.model_name.clone(),
        })
    }
}

impl MoralScorer for HttpScorer {
    async fn score(&self, article: &FetchedArticle) -> Result<Vec<ScoredFoundation>> {
        let request = ScoreRequest {
            text: &article.text,
            model: &self.model_name,
            language: article.language.as_deref(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| MoralGraphError::Scoring(format!("{}: {e}", article.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoralGraphError::Scoring(format!(
                "{}: HTTP {status}",
                article.url
            )));
        }

        let entries: HashMap<String, ScoreEntry> = response
            .json()
            .await
            .map_err(|e| MoralGraphError::Scoring(format!("{}: {e}", article.url)))?;

        // Map onto the fixed five, in fixed order; polarity comes from the
        // intensity, not from the service.
        let mut slots: [Option<ScoredFoundation>; 5] = Default::default();
        for (label, entry) in entries {
            let Some(foundation) = Foundation::parse(&label) else {
                debug!(label = %label, "scoring response carried an unknown foundation");
                continue;
            };
            slots[foundation.index()] = Some(ScoredFoundation {
                foundation,
                polarity: Polarity::from_intensity(entry.intensity),
                intensity: entry.intensity,
                confidence: entry.confidence,
                hits: entry.hits,
            });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
