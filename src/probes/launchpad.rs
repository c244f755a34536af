//! Launchpad probe: `/1.0/<proj>/releases`, `tag_maxver` over `version`.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::store::Release;
use crate::version::tag::tag_maxver;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    entries: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    version: String,
    date_released: Option<String>,
}

pub async fn probe(client: &Client, package: &str, current_version: Option<&str>, project: &str) -> Result<ProbeOutcome> {
    let url = format!("https://api.launchpad.net/1.0/{project}/releases");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching Launchpad releases")?
        .error_for_status()
        .context("Launchpad endpoint returned an error status")?;
    let parsed: ReleasesResponse =
        crate::http::read_capped_json(response).await.context("parsing Launchpad releases response")?;

    let versions: Vec<&str> = parsed.entries.iter().map(|e| e.version.as_str()).collect();
    let origversion = current_version.unwrap_or("0");
    let Some((version, matched)) = tag_maxver(&versions, "", origversion) else {
        return Ok(ProbeOutcome::not_found());
    };

    let updated = parsed
        .entries
        .iter()
        .find(|e| e.version == matched)
        .and_then(|e| e.date_released.as_deref())
        .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.timestamp())
        .unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "launchpad".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://launchpad.net/{project}/+download"),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
