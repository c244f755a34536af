//! Probe Adapters (C5): one small protocol adapter per upstream type.
//!
//! Each probe is a pure function `(descriptor, current state) -> outcome`
//! per the "mutable self.status" design note (§9) — no probe owns or
//! mutates its own status; the scheduler commits whatever is returned.

pub mod bitbucket;
pub mod cgit;
pub mod dirlist_probe;
pub mod feed;
pub mod ftp;
pub mod github;
pub mod gitlab;
pub mod html;
pub mod launchpad;
pub mod npm;
pub mod pypi;
pub mod rubygems;
pub mod sourceforge;

use reqwest::Client;

use crate::classifier::ProbeDescriptor;
use crate::store::{ChoreStatus, NewEvent, Release};

/// What a probe found, ready for the scheduler to persist atomically.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub release: Option<Release>,
    pub events: Vec<NewEvent>,
    /// Replacement value for `ChoreStatus.last_result` (ETag or a
    /// JSON-wrapped blob carrying prior entries), or `None` to leave it
    /// unchanged.
    pub last_result: Option<String>,
    /// Set when the probe found nothing or failed; mirrors
    /// `UpstreamStatus.err` (spec §4.5/§7). `None` means success.
    pub err: Option<String>,
}

impl ProbeOutcome {
    pub(crate) fn failure(err: impl Into<String>) -> Self {
        ProbeOutcome {
            err: Some(err.into()),
            ..Default::default()
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::failure("not found")
    }
}

/// Dispatch a classified descriptor to its adapter. Network/parse errors
/// never propagate past this call: they are folded into `ProbeOutcome.err`
/// (spec §4.5 "Error handling per probe").
pub async fn run(
    client: &Client,
    package: &str,
    current_version: Option<&str>,
    descriptor: &ProbeDescriptor,
    prior_status: Option<&ChoreStatus>,
) -> ProbeOutcome {
    let result = match descriptor {
        ProbeDescriptor::GitHub { repo } => {
            github::probe(client, package, current_version, repo, prior_status).await
        },
        ProbeDescriptor::GitLab { repo } => {
            gitlab::probe(client, package, current_version, repo, prior_status).await
        },
        ProbeDescriptor::Bitbucket { repo, kind, prefix } => {
            bitbucket::probe(client, package, current_version, repo, *kind, prefix.as_deref()).await
        },
        ProbeDescriptor::PyPi { name } => pypi::probe(client, package, current_version, name).await,
        ProbeDescriptor::RubyGems { gem } => rubygems::probe(client, package, gem).await,
        ProbeDescriptor::Npm { package: pkg } => npm::probe(client, package, pkg).await,
        ProbeDescriptor::Launchpad { project } => {
            launchpad::probe(client, package, current_version, project).await
        },
        ProbeDescriptor::SourceForge { project, path } => {
            sourceforge::probe(client, package, current_version, project, path).await
        },
        ProbeDescriptor::Cgit { url, project } => {
            cgit::probe(client, package, current_version, url, project).await
        },
        ProbeDescriptor::DirListing { url, prefix } => {
            dirlist_probe::probe(client, package, current_version, url, prefix, prior_status).await
        },
        ProbeDescriptor::Ftp { url, prefix } => {
            ftp::probe(package, current_version, url, prefix, prior_status).await
        },
        ProbeDescriptor::Html { url, selector, regex } => {
            html::probe(client, package, url, selector.as_deref(), regex.as_deref(), prior_status).await
        },
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => ProbeOutcome::failure(format!("{e:#}")),
    }
}
