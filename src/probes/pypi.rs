//! PyPI probe: `/pypi/<name>/json`.
//!
//! Grounded on the teacher's `pypi/mod.rs` (`PypiResponse`/`fetch_pypi_releases`).

use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::store::Release;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct PypiResponse {
    info: PypiInfo,
    releases: HashMap<String, Vec<PypiArtifact>>,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct PypiArtifact {
    upload_time_iso_8601: Option<String>,
}

pub async fn probe(client: &Client, package: &str, _current_version: Option<&str>, name: &str) -> Result<ProbeOutcome> {
    let url = format!("https://pypi.org/pypi/{name}/json");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching PyPI package metadata")?
        .error_for_status()
        .context("PyPI endpoint returned an error status")?;
    let parsed: PypiResponse = crate::http::read_capped_json(response).await.context("parsing PyPI response")?;

    let version = parsed.info.version;
    let updated = parsed
        .releases
        .get(&version)
        .and_then(|artifacts| artifacts.first())
        .and_then(|a| a.upload_time_iso_8601.as_deref())
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|d| d.timestamp())
        .unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "pypi".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://pypi.org/project/{name}/{version}/"),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
