//! npm probe: `/<pkg>/` registry document, `dist-tags.latest` → `time[ver]`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::store::Release;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct NpmPackage {
    #[serde(rename = "dist-tags")]
    dist_tags: DistTags,
    #[serde(default)]
    time: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DistTags {
    latest: String,
}

pub async fn probe(client: &Client, package: &str, npm_name: &str) -> Result<ProbeOutcome> {
    let url = format!("https://registry.npmjs.org/{npm_name}/");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching npm registry document")?
        .error_for_status()
        .context("npm registry returned an error status")?;
    let parsed: NpmPackage =
        crate::http::read_capped_json(response).await.context("parsing npm registry response")?;

    let version = parsed.dist_tags.latest;
    let updated = parsed
        .time
        .get(&version)
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|d| d.timestamp())
        .unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "npm".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://www.npmjs.com/package/{npm_name}/v/{version}"),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
