//! GitHub probe: `https://github.com/<repo>/releases.atom`.
//!
//! Grounded on `fetch_github_tags`/`fetch_latest_github_release` in the
//! teacher's `github/mod.rs`, trading the REST API (which needs auth for
//! reasonable rate limits) for the unauthenticated Atom feed spec §4.5
//! names, and `tag_maxver` in place of `semver`.

use anyhow::{Context, Result};
use reqwest::Client;

use crate::store::{ChoreStatus, Release};
use crate::version::tag::tag_maxver;

use super::feed::parse_feed;
use super::ProbeOutcome;

pub async fn probe(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    repo: &str,
    prior_status: Option<&ChoreStatus>,
) -> Result<ProbeOutcome> {
    let url = format!("https://github.com/{repo}/releases.atom");

    let mut request = client.get(&url);
    if let Some(etag) = prior_status.and_then(|s| s.last_result.as_deref()) {
        request = request.header(reqwest::header::IF_NONE_MATCH, etag);
    }

    let response = request.send().await.context("fetching GitHub releases feed")?;
    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return Ok(ProbeOutcome {
            last_result: prior_status.and_then(|s| s.last_result.clone()),
            ..Default::default()
        });
    }
    let response = response.error_for_status().context("GitHub releases feed returned an error status")?;
    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = crate::http::read_capped_text(response).await.context("reading GitHub releases feed")?;

    let entries = parse_feed(&text)?;
    let tags: Vec<String> = entries
        .iter()
        .filter_map(|e| e.link.as_deref())
        .filter_map(|link| link.rsplit('/').next())
        .map(str::to_string)
        .collect();

    let origversion = current_version.unwrap_or("0");
    let Some((version, tag)) = tag_maxver(&tags, "", origversion) else {
        return Ok(ProbeOutcome {
            last_result: etag,
            ..ProbeOutcome::not_found()
        });
    };

    let updated = entries
        .iter()
        .find(|e| e.link.as_deref().map(|l| l.ends_with(tag)).unwrap_or(false))
        .and_then(|e| e.updated)
        .map(|d| d.timestamp())
        .unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "github".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://github.com/{repo}/releases/tag/{tag}"),
        }),
        events: Vec::new(),
        last_result: etag,
        err: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tag_from_release_link() {
        let link = "https://github.com/org/foo/releases/tag/v1.2.0";
        let tag = link.rsplit('/').next().unwrap();
        assert_eq!(tag, "v1.2.0");
    }
}
