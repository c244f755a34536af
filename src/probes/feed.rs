//! Generic Atom/RSS feed probe (§4.5 `feed`), also reused by the `github`
//! and `sourceforge` adapters to parse their own feed-shaped endpoints.
//!
//! Grounded on `FeedChore` in `piss/chores.py`; uses `quick-xml`'s serde
//! support to deserialize rather than hand-rolled XML walking.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::store::NewEvent;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: String,
    #[serde(default)]
    updated: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: String,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// A normalized entry from either an Atom or an RSS document.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Parse `xml` as Atom first, then RSS; errors if neither shape matches.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    if let Ok(feed) = quick_xml::de::from_str::<AtomFeed>(xml) {
        return Ok(feed
            .entries
            .into_iter()
            .map(|e| FeedEntry {
                title: e.title,
                link: e.links.into_iter().find_map(|l| l.href),
                updated: e.updated.as_deref().and_then(parse_rfc3339),
            })
            .collect());
    }
    if let Ok(rss) = quick_xml::de::from_str::<Rss>(xml) {
        return Ok(rss
            .channel
            .items
            .into_iter()
            .map(|i| FeedEntry {
                title: i.title,
                link: i.link,
                updated: i.pub_date.as_deref().and_then(parse_rfc2822),
            })
            .collect());
    }
    anyhow::bail!("unrecognized feed document (neither Atom nor RSS)")
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s).ok().map(|d| d.with_timezone(&Utc))
}

/// The generic `feed` adapter: emit an Event per entry newer than the prior
/// poll's high-water mark. Never emits a Release (spec §4.5).
pub async fn probe(client: &Client, chore: &str, url: &str, prior_status: Option<&crate::store::ChoreStatus>) -> Result<ProbeOutcome> {
    let last_poll: i64 = prior_status
        .and_then(|s| s.last_result.as_deref())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let response = client.get(url).send().await.context("fetching feed")?;
    let response = response.error_for_status().context("feed endpoint returned an error status")?;
    let text = crate::http::read_capped_text(response).await.context("reading feed body")?;
    let entries = parse_feed(&text)?;

    let mut events = Vec::new();
    let mut newest = last_poll;
    for entry in entries {
        let ts = entry.updated.map(|d| d.timestamp()).unwrap_or(0);
        if ts > last_poll {
            events.push(NewEvent {
                chore: chore.to_string(),
                category: "news".to_string(),
                time: ts,
                title: entry.title,
                content: None,
                url: entry.link,
            });
        }
        newest = newest.max(ts);
    }

    Ok(ProbeOutcome {
        release: None,
        events,
        last_result: Some(newest.to_string()),
        err: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atom_entries() {
        let xml = r#"<?xml version="1.0"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <entry>
                <title>v1.0</title>
                <updated>2024-01-01T00:00:00Z</updated>
                <link href="https://example.com/releases/v1.0"/>
            </entry>
        </feed>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "v1.0");
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/releases/v1.0"));
    }

    #[test]
    fn parses_rss_items() {
        let xml = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
            <item>
                <title>release</title>
                <link>https://example.com/file.tar.gz</link>
                <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
            </item>
        </channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "release");
    }
}
