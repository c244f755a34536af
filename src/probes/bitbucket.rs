//! Bitbucket probe: downloads API for release-category repos, HTML tag-page
//! scraping for tag-category repos (the tags API lacks date ordering).
//!
//! Grounded on `BitbucketChore` in `piss/chores.py`. The tag-page selector
//! is isolated in [`scrape_tag_page`] per the brittleness open question
//! (spec §9): Bitbucket's markup changes periodically and this is the one
//! place that needs updating when it does.

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::classifier::BitbucketKind;
use crate::store::Release;
use crate::version::tag::tag_maxver;
use crate::version::tarball::{tarball_maxver, TarballCandidate};

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct DownloadsResponse {
    values: Vec<DownloadEntry>,
}

#[derive(Debug, Deserialize)]
struct DownloadEntry {
    name: String,
    #[serde(default)]
    created_on: Option<String>,
}

pub async fn probe(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    repo: &str,
    kind: BitbucketKind,
    prefix: Option<&str>,
) -> Result<ProbeOutcome> {
    match kind {
        BitbucketKind::Downloads => probe_downloads(client, package, current_version, repo, prefix).await,
        BitbucketKind::Tag => probe_tag_page(client, package, current_version, repo).await,
    }
}

async fn probe_downloads(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    repo: &str,
    prefix: Option<&str>,
) -> Result<ProbeOutcome> {
    let url = format!("https://api.bitbucket.org/2.0/repositories/{repo}/downloads");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching Bitbucket downloads")?
        .error_for_status()
        .context("Bitbucket downloads endpoint returned an error status")?;
    let parsed: DownloadsResponse =
        crate::http::read_capped_json(response).await.context("parsing Bitbucket downloads response")?;

    let candidates: Vec<TarballCandidate> = parsed
        .values
        .iter()
        .map(|v| TarballCandidate {
            filename: v.name.clone(),
            updated: v
                .created_on
                .as_deref()
                .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.timestamp())
                .unwrap_or(0),
            description: None,
        })
        .collect();

    let name_prefix = prefix.unwrap_or(package);
    let origversion = current_version.unwrap_or("0");
    let Some((version, file)) = tarball_maxver(&candidates, name_prefix, origversion) else {
        return Ok(ProbeOutcome::not_found());
    };

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "bitbucket".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated: file.updated,
            url: format!("https://bitbucket.org/{repo}/downloads/{}", file.filename),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}

struct TagPageRow {
    tag: String,
    timestamp: Option<i64>,
}

/// Scrape `https://bitbucket.org/<repo>/downloads/?tab=tags`: the tags panel
/// is a `#tag-pjax-container` containing `tr.iterable-item` rows, each with
/// an anchor naming the tag and a `<time datetime=…>` for the commit date.
fn scrape_tag_page(html: &str) -> Vec<TagPageRow> {
    let document = Html::parse_document(html);
    let container_sel = Selector::parse("#tag-pjax-container").unwrap();
    let row_sel = Selector::parse("tr.iterable-item").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();
    let time_sel = Selector::parse("time").unwrap();

    let Some(container) = document.select(&container_sel).next() else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for row in container.select(&row_sel) {
        let Some(anchor) = row.select(&anchor_sel).next() else {
            continue;
        };
        let tag: String = anchor.text().collect::<String>().trim().to_string();
        if tag.is_empty() {
            continue;
        }
        let timestamp = row
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.timestamp());
        rows.push(TagPageRow { tag, timestamp });
    }
    rows
}

async fn probe_tag_page(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    repo: &str,
) -> Result<ProbeOutcome> {
    let url = format!("https://bitbucket.org/{repo}/downloads/?tab=tags");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching Bitbucket tag page")?
        .error_for_status()
        .context("Bitbucket tag page returned an error status")?;
    let html = crate::http::read_capped_text(response).await.context("reading Bitbucket tag page")?;

    let rows = scrape_tag_page(&html);
    let tags: Vec<&str> = rows.iter().map(|r| r.tag.as_str()).collect();
    let origversion = current_version.unwrap_or("0");
    let Some((version, tag)) = tag_maxver(&tags, "", origversion) else {
        return Ok(ProbeOutcome::not_found());
    };

    let updated = rows.iter().find(|r| r.tag == tag).and_then(|r| r.timestamp).unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "bitbucket".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://bitbucket.org/{repo}/src/{tag}"),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_tag_rows_from_container() {
        let html = r#"
            <html><body>
            <div id="tag-pjax-container">
                <table><tbody>
                <tr class="iterable-item"><td><a href="/org/repo/src/v1.0">v1.0</a></td><td><time datetime="2024-01-01T00:00:00Z"></time></td></tr>
                <tr class="iterable-item"><td><a href="/org/repo/src/v1.1">v1.1</a></td><td><time datetime="2024-02-01T00:00:00Z"></time></td></tr>
                </tbody></table>
            </div>
            </body></html>
        "#;
        let rows = scrape_tag_page(html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag, "v1.0");
        assert!(rows[0].timestamp.is_some());
    }

    #[test]
    fn empty_without_container() {
        let html = "<html><body>no tags here</body></html>";
        assert!(scrape_tag_page(html).is_empty());
    }
}
