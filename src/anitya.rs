//! Release-Monitoring Mirror (C6): periodically pull the Anitya
//! (release-monitoring.org) project index and link packages to projects by
//! collapsed-name match.
//!
//! Grounded on `anitya.py` in `examples/original_source/`; the version-gate
//! redesign and v1/v2 schema tolerance follow the Open Question resolution
//! in `SPEC_FULL.md` §D.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::store::{AnityaProject as StoredProject, Store};

const DEFAULT_API_ENDPOINT: &str = "https://release-monitoring.org/api/v2/";
const PAGE_SIZE: u32 = 250;
const MAX_RETRIES: u32 = 5;

/// Resolve the base URL, honoring the `API_ENDPOINT` env override (spec §6).
pub fn api_endpoint() -> String {
    std::env::var("API_ENDPOINT").unwrap_or_else(|_| DEFAULT_API_ENDPOINT.to_string())
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: i64,
    name: String,
    homepage: Option<String>,
    ecosystem: Option<String>,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    version_url: Option<String>,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    updated_on: Option<i64>,
    #[serde(default)]
    created_on: Option<i64>,
}

/// Schema-tolerant page: v2 carries `items`/`total_items`, v1 carries a flat
/// `projects` array. We accept either shape per §9's Open Question.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Option<Vec<RawProject>>,
    #[serde(default)]
    total_items: Option<u64>,
    #[serde(default)]
    projects: Option<Vec<RawProject>>,
    #[serde(default)]
    page: Option<u32>,
}

impl Page {
    fn projects(self) -> Vec<RawProject> {
        self.items.or(self.projects).unwrap_or_default()
    }
}

fn version_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(version|ver|v|releases|release|rel|r)[-._/]?").unwrap())
}

fn underscore_group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)_(\d+)").unwrap())
}

/// Strip a leading version marker, then repeatedly collapse `\d_\d` groups
/// to dots (spec §4.6).
pub fn normalize_anitya_version(raw: &str) -> String {
    let mut v = raw.trim().to_string();
    if let Some(m) = version_prefix_re().find(&v) {
        if m.end() < v.len() && v.as_bytes()[m.end()].is_ascii_digit() {
            v = v[m.end()..].to_string();
        }
    }
    loop {
        let replaced = underscore_group_re().replace(&v, "$1.$2").to_string();
        if replaced == v {
            break;
        }
        v = replaced;
    }
    v
}

/// Pull the full Anitya project index into the local store, paginating
/// until the server reports no more pages (v2) or a single flat page (v1).
pub async fn sync(client: &Client, store: &Store) -> Result<usize> {
    let base = api_endpoint();
    let mut page_num = 1u32;
    let mut total_synced = 0usize;

    loop {
        let url = format!("{}projects/?page={page_num}&items_per_page={PAGE_SIZE}", base.trim_end_matches('/'));
        let page = fetch_page_with_retries(client, &url).await?;
        let is_v1 = page.items.is_none();
        let total_items = page.total_items;
        let projects = page.projects();
        if projects.is_empty() {
            break;
        }

        for raw in &projects {
            let stored = StoredProject {
                id: raw.id,
                name: raw.name.clone(),
                homepage: raw.homepage.clone(),
                ecosystem: raw.ecosystem.clone(),
                backend: raw.backend.clone(),
                version_url: raw.version_url.clone(),
                regex: raw.regex.clone(),
                latest_version: raw.version.as_deref().map(normalize_anitya_version),
                updated_on: raw.updated_on,
                created_on: raw.created_on,
            };
            store.upsert_anitya_project(&stored).await?;
            total_synced += 1;
        }

        if is_v1 {
            info!(total_synced, "synced Anitya project index (v1 flat schema)");
            break;
        }

        let synced_so_far = page_num as u64 * PAGE_SIZE as u64;
        if let Some(total) = total_items {
            if synced_so_far >= total {
                break;
            }
        } else if projects.len() < PAGE_SIZE as usize {
            break;
        }
        page_num += 1;
    }

    info!(total_synced, "synced Anitya project index");
    Ok(total_synced)
}

async fn fetch_page_with_retries(client: &Client, url: &str) -> Result<Page> {
    let mut last_err = None;
    for attempt in 1..=MAX_RETRIES {
        match client.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<Page>().await {
                    Ok(page) => return Ok(page),
                    Err(e) => last_err = Some(anyhow::Error::from(e)),
                },
                Err(e) => last_err = Some(anyhow::Error::from(e)),
            },
            Err(e) => last_err = Some(anyhow::Error::from(e)),
        }
        warn!(attempt, url, "retrying Anitya page fetch");
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("exhausted retries fetching {url}")).context("fetching Anitya project page"))
}

/// Collapse a name for matching: lowercase, strip `.`, ` `, `-`, `_`.
fn collapse_name(name: &str) -> String {
    name.to_ascii_lowercase().chars().filter(|c| !matches!(c, '.' | ' ' | '-' | '_')).collect()
}

/// Ecosystem priority order for disambiguating same-name projects (spec §4.6).
fn ecosystem_priority(ecosystem: Option<&str>) -> (u8, String) {
    let rank = match ecosystem.unwrap_or("").to_ascii_lowercase().as_str() {
        "pypi" => 0,
        "npm" | "npmjs" => 1,
        "rubygems" => 2,
        "maven" => 3,
        "crates.io" | "cargo" => 4,
        other => {
            return (5, other.to_string());
        },
    };
    (rank, ecosystem.unwrap_or("").to_ascii_lowercase())
}

/// For each package name, find the best-matching Anitya project by
/// collapsed-name equality, tie-broken by ecosystem priority then smallest
/// id (spec §4.6 `detect_links`).
pub fn detect_links<'a>(package_names: &[String], projects: &'a [StoredProject]) -> HashMap<String, &'a StoredProject> {
    let mut by_collapsed: HashMap<String, Vec<&StoredProject>> = HashMap::new();
    for project in projects {
        let key = collapse_name(&strip_host_prefix(&project.name));
        by_collapsed.entry(key).or_default().push(project);
    }

    let mut links = HashMap::new();
    for name in package_names {
        let key = collapse_name(name);
        if let Some(candidates) = by_collapsed.get(&key) {
            if let Some(best) = candidates.iter().min_by(|a, b| {
                let pa = ecosystem_priority(a.ecosystem.as_deref());
                let pb = ecosystem_priority(b.ecosystem.as_deref());
                pa.cmp(&pb).then(a.id.cmp(&b.id))
            }) {
                links.insert(name.clone(), *best);
            }
        }
    }
    links
}

/// Strip a leading `<host>/`-style prefix from a project name (e.g.
/// `"github.com/foo/bar"` -> `"foo/bar"`), mirroring `re_projectrep` in
/// `anitya.py`.
fn strip_host_prefix(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^[^/]+/").unwrap());
    re.replace(name, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_version_prefix_and_underscores() {
        assert_eq!(normalize_anitya_version("v1_2_3"), "1.2.3");
        assert_eq!(normalize_anitya_version("release-2_0"), "2.0");
    }

    #[test]
    fn collapses_names_for_matching() {
        assert_eq!(collapse_name("My-Package_Name"), "mypackagename");
    }

    #[test]
    fn ecosystem_priority_prefers_pypi_over_generic() {
        let pypi = ecosystem_priority(Some("PyPI"));
        let other = ecosystem_priority(Some("sourceforge"));
        assert!(pypi < other);
    }

    #[test]
    fn detect_links_picks_smallest_id_on_tie() {
        let projects = vec![
            StoredProject {
                id: 5,
                name: "foo".into(),
                homepage: None,
                ecosystem: Some("pypi".into()),
                backend: None,
                version_url: None,
                regex: None,
                latest_version: None,
                updated_on: None,
                created_on: None,
            },
            StoredProject {
                id: 2,
                name: "foo".into(),
                homepage: None,
                ecosystem: Some("pypi".into()),
                backend: None,
                version_url: None,
                regex: None,
                latest_version: None,
                updated_on: None,
                created_on: None,
            },
        ];
        let links = detect_links(&["foo".to_string()], &projects);
        assert_eq!(links["foo"].id, 2);
    }

    #[test]
    fn detect_links_strips_host_prefix_from_project_name() {
        let projects = vec![StoredProject {
            id: 1,
            name: "github.com/foo/bar".into(),
            homepage: None,
            ecosystem: Some("pypi".into()),
            backend: None,
            version_url: None,
            regex: None,
            latest_version: None,
            updated_on: None,
            created_on: None,
        }];
        let links = detect_links(&["foo/bar".to_string()], &projects);
        assert_eq!(links["foo/bar"].id, 1);
    }
}
