//! Upstream Classifier (C4): maps `(name, source_kind, url, current_version)`
//! to a typed [`ProbeDescriptor`].
//!
//! Grounded on `detect_upstream` in `piss/chores.py`. Modeled as a tagged
//! union with a dispatch function per the polymorphic-probes design note,
//! rather than the original's class hierarchy.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::abbs::SourceKind;
use crate::urlnorm::remove_package_version;

/// A classified upstream, ready to be handed to a [`crate::probes`] adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeDescriptor {
    GitHub { repo: String },
    GitLab { repo: String },
    Bitbucket { repo: String, kind: BitbucketKind, prefix: Option<String> },
    PyPi { name: String },
    RubyGems { gem: String },
    Npm { package: String },
    Launchpad { project: String },
    SourceForge { project: String, path: String },
    Cgit { url: String, project: String },
    DirListing { url: String, prefix: String },
    Ftp { url: String, prefix: String },
    /// `selector`/`regex` are only ever populated from an explicit chore
    /// config (§9 `HTMLSelectorChore`); `detect_upstream`'s own fallback
    /// leaves them `None` and the probe falls back to whole-body text.
    Html { url: String, selector: Option<String>, regex: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitbucketKind {
    Downloads,
    Tag,
}

impl ProbeDescriptor {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProbeDescriptor::GitHub { .. } => "github",
            ProbeDescriptor::GitLab { .. } => "gitlab",
            ProbeDescriptor::Bitbucket { .. } => "bitbucket",
            ProbeDescriptor::PyPi { .. } => "pypi",
            ProbeDescriptor::RubyGems { .. } => "rubygems",
            ProbeDescriptor::Npm { .. } => "npm",
            ProbeDescriptor::Launchpad { .. } => "launchpad",
            ProbeDescriptor::SourceForge { .. } => "sourceforge",
            ProbeDescriptor::Cgit { .. } => "cgit",
            ProbeDescriptor::DirListing { .. } => "dirlist",
            ProbeDescriptor::Ftp { .. } => "ftp",
            ProbeDescriptor::Html { .. } => "html",
        }
    }
}

fn github_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^github\.com$").unwrap())
}

fn gitlab_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^gitlab\.com$").unwrap())
}

const COMMON_EXT: &[&str] = &[".gz", ".bz2", ".xz", ".tar", ".7z", ".rar", ".zip"];

const CGIT_HOSTS: &[&str] = &["git.kernel.org", "git.gnome.org", "git.zx2c4.com", "cgit.freedesktop.org"];

fn repo_path(path_segments: &[&str], n: usize) -> Option<String> {
    if path_segments.len() < n {
        return None;
    }
    let mut repo = path_segments[..n].join("/");
    if repo.ends_with(".git") {
        repo.truncate(repo.len() - 4);
    }
    Some(repo)
}

/// Classify a package source URL into a [`ProbeDescriptor`]. Returns `None`
/// when no rule matches (a legitimate outcome per §4.4, not an error).
pub fn detect_upstream(
    name: &str,
    source_kind: SourceKind,
    url: &str,
    current_version: Option<&str>,
) -> Option<ProbeDescriptor> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    let segments: Vec<&str> = parsed.path_segments().map(|s| s.filter(|x| !x.is_empty()).collect()).unwrap_or_default();

    if github_re().is_match(&host) {
        if let Some(repo) = repo_path(&segments, 2) {
            return Some(ProbeDescriptor::GitHub { repo });
        }
    }

    if gitlab_re().is_match(&host) {
        if let Some(repo) = repo_path(&segments, 2) {
            return Some(ProbeDescriptor::GitLab { repo });
        }
    }

    if host == "bitbucket.org" {
        if let Some(repo) = repo_path(&segments, 2) {
            let kind = if segments.get(2) == Some(&"downloads") {
                BitbucketKind::Downloads
            } else {
                BitbucketKind::Tag
            };
            let prefix = segments.last().map(|s| tarball_prefix(s));
            return Some(ProbeDescriptor::Bitbucket { repo, kind, prefix });
        }
    }

    if host == "pypi.io" || host == "pypi.python.org" {
        let pkg = if let Some(pos) = segments.iter().position(|s| *s == "source") {
            segments.get(pos + 2).map(|s| s.to_string())
        } else {
            segments.last().map(|last| strip_trailing_version(last))
        };
        if let Some(pkg) = pkg {
            return Some(ProbeDescriptor::PyPi { name: pkg });
        }
    }

    if host == "rubygems.org" || host == "gems.rubyforge.org" {
        if let Some(last) = segments.last() {
            return Some(ProbeDescriptor::RubyGems { gem: tarball_prefix(last) });
        }
    }

    if host == "registry.npmjs.org" {
        if let Some(pkg) = segments.first() {
            return Some(ProbeDescriptor::Npm { package: pkg.to_string() });
        }
    }

    if host == "launchpad.net" {
        if let Some(project) = segments.first() {
            let project_lower = project.to_ascii_lowercase();
            let name_lower = name.to_ascii_lowercase();
            if name_lower.contains(&project_lower) || project_lower.contains(&name_lower) {
                return Some(ProbeDescriptor::Launchpad { project: project.to_string() });
            }
        }
    }

    if parsed.scheme() == "ftp" {
        let mut dir = strip_filename(parsed.path());
        if let Some(v) = current_version {
            dir = remove_package_version(name, &dir, v);
        }
        return Some(ProbeDescriptor::Ftp { url: rebuild_url(&parsed, &dir), prefix: name.to_string() });
    }

    let is_git_signal = url.contains("cgit")
        || ((source_kind == SourceKind::Git || url.contains("git"))
            && (CGIT_HOSTS.contains(&host.as_str()) || parsed.path().contains("/snapshot/")));
    if is_git_signal {
        let mut truncated = parsed.clone();
        if let Some(pos) = truncated.path().find("/snapshot/") {
            let path = truncated.path()[..pos].to_string();
            truncated.set_path(&path);
        }
        if truncated.scheme() == "git" {
            let _ = truncated.set_scheme("http");
        }
        let project = segments.last().map(|s| s.to_string()).unwrap_or_default();
        return Some(ProbeDescriptor::Cgit { url: truncated.to_string(), project });
    }

    if host == "sourceforge.net" || host.ends_with(".sourceforge.net") || host == "downloads.sourceforge.net" || host == "sourceforge.mirrorservice.org" {
        if let Some(pos) = segments.iter().position(|s| *s == "projects") {
            if let Some(project) = segments.get(pos + 1) {
                let path = segments[pos + 2..].join("/");
                return Some(ProbeDescriptor::SourceForge { project: project.to_string(), path });
            }
        }
        if let Some(pos) = segments.iter().position(|s| *s == "code-snapshots") {
            if let Some(project) = segments.get(pos + 3) {
                return Some(ProbeDescriptor::SourceForge {
                    project: project.to_string(),
                    path: segments[pos..].join("/"),
                });
            }
        }
        // download-mirror subdomain: host itself carries the project in a
        // `/project/<name>/...` shaped path even without the literal
        // "projects" segment on some mirrors.
        if let Some(project) = segments.first() {
            return Some(ProbeDescriptor::SourceForge {
                project: project.to_string(),
                path: segments.get(1..).map(|s| s.join("/")).unwrap_or_default(),
            });
        }
    }

    if matches!(source_kind, SourceKind::Git | SourceKind::Svn | SourceKind::Bzr) {
        return None;
    }

    if (parsed.scheme() == "http" || parsed.scheme() == "https") && source_kind == SourceKind::Tarball {
        let prefix = segments.last().map(|s| tarball_prefix(s)).unwrap_or_default();
        let mut dir = strip_filename(parsed.path());
        if let Some(v) = current_version {
            dir = remove_package_version(name, &dir, v);
        }
        let mut cleaned = parsed.clone();
        cleaned.set_path(&dir);
        cleaned.set_query(None);
        cleaned.set_fragment(None);
        return Some(ProbeDescriptor::DirListing { url: cleaned.to_string(), prefix });
    }

    None
}

fn strip_trailing_version(segment: &str) -> String {
    if let Some(pos) = segment.rfind('-') {
        segment[..pos].to_string()
    } else {
        segment.to_string()
    }
}

fn tarball_prefix(filename: &str) -> String {
    let mut name = filename.to_string();
    for ext in COMMON_EXT {
        if name.to_ascii_lowercase().ends_with(ext) {
            let cut = name.len() - ext.len();
            name.truncate(cut);
        }
    }
    if let Some(pos) = name.rfind(['-', '_', '.']) {
        name.truncate(pos);
    }
    name
}

fn strip_filename(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..=pos].to_string(),
        None => "/".to_string(),
    }
}

fn rebuild_url(parsed: &Url, path: &str) -> String {
    let mut u = parsed.clone();
    u.set_path(path);
    u.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_github_tarball_url() {
        let d = detect_upstream(
            "foo",
            SourceKind::Tarball,
            "https://github.com/org/foo/archive/v1.0.tar.gz",
            Some("1.0"),
        );
        assert_eq!(d, Some(ProbeDescriptor::GitHub { repo: "org/foo".to_string() }));
    }

    #[test]
    fn detects_dirlist_for_generic_tarball() {
        let d = detect_upstream(
            "curl",
            SourceKind::Tarball,
            "https://curl.se/download/curl-7.88.1.tar.xz",
            Some("7.88.1"),
        );
        assert_eq!(
            d,
            Some(ProbeDescriptor::DirListing {
                url: "https://curl.se/download/".to_string(),
                prefix: "curl".to_string(),
            })
        );
    }

    #[test]
    fn git_source_kind_without_repo_host_returns_none() {
        let d = detect_upstream("foo", SourceKind::Git, "https://example.com/foo.git", None);
        assert_eq!(d, None);
    }

    #[test]
    fn strips_dot_git_suffix_from_github_repo() {
        let d = detect_upstream("foo", SourceKind::Git, "https://github.com/org/foo.git", None);
        assert_eq!(d, Some(ProbeDescriptor::GitHub { repo: "org/foo".to_string() }));
    }

    #[test]
    fn plain_tarball_url_with_snapshot_in_path_is_not_misdetected_as_cgit() {
        // A CDN mirror path that merely contains "/snapshot/" with no git
        // signal (not a known cgit host, no "git" in the URL, not a GIT
        // source kind) must fall through to dirlist, not cgit.
        let d = detect_upstream(
            "foo",
            SourceKind::Tarball,
            "https://mirror.example.com/releases/snapshot/foo.tar.gz",
            Some("1.0"),
        );
        assert_eq!(
            d,
            Some(ProbeDescriptor::DirListing {
                url: "https://mirror.example.com/releases/snapshot/".to_string(),
                prefix: "foo".to_string(),
            })
        );
    }

    #[test]
    fn git_source_kind_with_snapshot_path_on_unlisted_host_is_cgit() {
        let d = detect_upstream(
            "foo",
            SourceKind::Git,
            "https://git.example.com/foo/snapshot/foo.tar.gz",
            None,
        );
        assert_eq!(
            d,
            Some(ProbeDescriptor::Cgit {
                url: "https://git.example.com/foo".to_string(),
                project: "foo.tar.gz".to_string(),
            })
        );
    }
}
