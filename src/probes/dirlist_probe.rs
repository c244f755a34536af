//! Directory-listing probe: fetch a URL, parse with [`crate::dirlist`], rank
//! entries with `tarball_maxver`; falls back to a regex scan over the raw
//! HTML when the listing parser finds nothing structured.
//!
//! Grounded on `DirListingChore` in `piss/chores.py`.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;

use crate::dirlist::parse_listing;
use crate::http::SOFT_BODY_CAP_BYTES;
use crate::store::{ChoreStatus, Release};
use crate::version::tarball::{tarball_maxver, TarballCandidate};

use super::ProbeOutcome;

fn fallback_token_re(prefix: &str) -> Regex {
    Regex::new(&format!(
        r"(?i){}[._-]v?[0-9][0-9a-zA-Z.~+_-]*?\.(?:tar\.xz|tar\.bz2|tar\.gz|tz|zip|gem)",
        regex::escape(prefix)
    ))
    .unwrap()
}

pub async fn probe(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    url: &str,
    prefix: &str,
    prior_status: Option<&ChoreStatus>,
) -> Result<ProbeOutcome> {
    let mut request = client.get(url);
    if let Some(etag) = prior_status.and_then(|s| s.last_result.as_deref()) {
        request = request.header(reqwest::header::IF_NONE_MATCH, etag);
    }

    let response = request.send().await.context("fetching directory listing")?;
    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return Ok(ProbeOutcome {
            last_result: prior_status.and_then(|s| s.last_result.clone()),
            ..Default::default()
        });
    }
    let response = response.error_for_status().context("directory listing returned an error status")?;
    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = crate::http::read_capped_text(response).await.context("reading directory listing body")?;

    let origversion = current_version.unwrap_or("0");

    if body.len() <= SOFT_BODY_CAP_BYTES {
        let listing = parse_listing(&body);
        let candidates: Vec<TarballCandidate> = listing
            .entries
            .iter()
            .map(|e| TarballCandidate {
                filename: e.name.clone(),
                updated: e.modified.map(|d| d.timestamp()).unwrap_or(0),
                description: e.description.clone(),
            })
            .collect();

        if let Some((version, file)) = tarball_maxver(&candidates, prefix, origversion) {
            return Ok(ProbeOutcome {
                release: Some(Release {
                    package: package.to_string(),
                    upstream_type: "dirlist".to_string(),
                    version: crate::version::normalize_release_version(package, &version),
                    updated: file.updated,
                    url: join_url(url, &file.filename),
                }),
                events: Vec::new(),
                last_result: etag,
                err: None,
            });
        }
    }

    // Large page, or nothing structured found: regex-only extraction.
    let re = fallback_token_re(prefix);
    let candidates: Vec<TarballCandidate> = re
        .find_iter(&body)
        .map(|m| TarballCandidate {
            filename: m.as_str().to_string(),
            updated: 0,
            description: None,
        })
        .collect();

    let Some((version, file)) = tarball_maxver(&candidates, prefix, origversion) else {
        return Ok(ProbeOutcome {
            last_result: etag,
            ..ProbeOutcome::not_found()
        });
    };

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "dirlist".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated: file.updated,
            url: join_url(url, &file.filename),
        }),
        events: Vec::new(),
        last_result: etag,
        err: None,
    })
}

fn join_url(base: &str, filename: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{filename}")
    } else {
        format!("{base}/{filename}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_avoids_double_slash() {
        assert_eq!(join_url("https://example.com/dl/", "foo-1.0.tar.gz"), "https://example.com/dl/foo-1.0.tar.gz");
        assert_eq!(join_url("https://example.com/dl", "foo-1.0.tar.gz"), "https://example.com/dl/foo-1.0.tar.gz");
    }
}
