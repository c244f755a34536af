//! GitLab probe: `/api/v4/projects/<urlenc-repo>/repository/tags`.
//!
//! Grounded on the teacher's `gitlab/mod.rs` (URL-encoded `owner%2Fproject`
//! path, same tags endpoint).

use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;

use crate::store::Release;
use crate::version::tag::tag_maxver;

use super::ProbeOutcome;

#[derive(Debug, Deserialize)]
struct GitlabTag {
    name: String,
    commit: GitlabCommit,
}

#[derive(Debug, Deserialize)]
struct GitlabCommit {
    committed_date: Option<String>,
}

pub async fn probe(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    repo: &str,
    _prior_status: Option<&crate::store::ChoreStatus>,
) -> Result<ProbeOutcome> {
    let encoded = utf8_percent_encode(repo, NON_ALPHANUMERIC).to_string();
    let url = format!("https://gitlab.com/api/v4/projects/{encoded}/repository/tags");

    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching GitLab tags")?
        .error_for_status()
        .context("GitLab tags endpoint returned an error status")?;
    let tags: Vec<GitlabTag> =
        crate::http::read_capped_json(response).await.context("parsing GitLab tags response")?;

    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    let origversion = current_version.unwrap_or("0");
    let Some((version, tag_name)) = tag_maxver(&names, "", origversion) else {
        return Ok(ProbeOutcome::not_found());
    };

    let updated = tags
        .iter()
        .find(|t| t.name == tag_name)
        .and_then(|t| t.commit.committed_date.as_deref())
        .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.timestamp())
        .unwrap_or(0);

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "gitlab".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated,
            url: format!("https://gitlab.com/{repo}/-/tags/{tag_name}"),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
