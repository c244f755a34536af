//! SourceForge probe: `/projects/<p>/rss?path=<path>`, a feed of files
//! ranked with `tarball_maxver`.
//!
//! Grounded on the SourceForge branch of `detect_upstream` in
//! `piss/chores.py`, reused here at the probe layer via [`super::feed`].

use anyhow::{Context, Result};
use reqwest::Client;

use crate::store::Release;
use crate::version::tarball::{tarball_maxver, TarballCandidate};

use super::feed::parse_feed;
use super::ProbeOutcome;

pub async fn probe(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    project: &str,
    path: &str,
) -> Result<ProbeOutcome> {
    let url = format!("https://sourceforge.net/projects/{project}/rss?path=/{path}");
    let response = client
        .get(&url)
        .send()
        .await
        .context("fetching SourceForge file feed")?
        .error_for_status()
        .context("SourceForge feed returned an error status")?;
    let text = crate::http::read_capped_text(response).await.context("reading SourceForge feed")?;

    let entries = parse_feed(&text)?;
    let candidates: Vec<TarballCandidate> = entries
        .iter()
        .filter_map(|e| {
            let link = e.link.as_deref()?;
            let filename = link.trim_end_matches('/').rsplit('/').next()?;
            Some(TarballCandidate {
                filename: filename.to_string(),
                updated: e.updated.map(|d| d.timestamp()).unwrap_or(0),
                description: None,
            })
        })
        .collect();

    let origversion = current_version.unwrap_or("0");
    let Some((version, file)) = tarball_maxver(&candidates, package, origversion) else {
        return Ok(ProbeOutcome::not_found());
    };

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "sourceforge".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated: file.updated,
            url: format!("https://sourceforge.net/projects/{project}/files/{path}/{}/download", file.filename),
        }),
        events: Vec::new(),
        last_result: None,
        err: None,
    })
}
