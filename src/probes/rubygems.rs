//! RubyGems probe: `/api/v1/gems/<gem>.json`, a single record with no
//! version history to rank — the endpoint already reports the latest.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::store::Release;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct GemInfo {
    version: String,
    #[serde(default)]
    project_uri: Option<String>,
}

pub async fn probe(client: &Client, package: &str, gem: &str) -> Result<ProbeOutcome> {
    let url = format!("https://rubygems.org/api/v1/gems/{gem}.json");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching RubyGems metadata")?
        .error_for_status()
        .context("RubyGems endpoint returned an error status")?;
    let parsed: GemInfo = crate::http::read_capped_json(response).await.context("parsing RubyGems response")?;

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "rubygems".to_string(),
            version: crate::version::normalize_release_version(package, &parsed.version),
            updated: chrono::Utc::now().timestamp(),
            url: parsed
                .project_uri
                .unwrap_or_else(|| format!("https://rubygems.org/gems/{gem}")),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
