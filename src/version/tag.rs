//! `tag_maxver`: pick the best-matching VCS tag name among a set of
//! candidates (C1, used by the `github`/`gitlab`/`launchpad` probes).

use std::sync::OnceLock;

use regex::Regex;

use super::{version_format, VersionKey};

fn version_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^v(er(sion)?)?[-._]?").unwrap())
}

fn shape_guard_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\.\d+|\d{3,})").unwrap())
}

struct Scored<'a> {
    shape_match: bool,
    key: VersionKey,
    tag: &'a str,
    version: String,
}

/// Return `(version, tag)` for the highest-scoring tag, stripping a leading
/// `<prefix>[._-]` and a leading version marker (`v`, `ver`, `version`) first.
/// A candidate is discarded unless what remains looks like a version: starts
/// with `\d+\.\d+` or a run of 3+ digits (rejects branch names like `main`).
pub fn tag_maxver<'a, S: AsRef<str>>(
    tags: &'a [S],
    prefix: &str,
    origversion: &str,
) -> Option<(String, &'a str)> {
    let accepts_shape = version_format(origversion);
    let prefix_lower = prefix.to_ascii_lowercase();

    let mut best: Option<Scored<'_>> = None;
    for tag in tags {
        let tag = tag.as_ref();
        let mut rest = tag;

        if !prefix_lower.is_empty() {
            let lower = tag.to_ascii_lowercase();
            if let Some(stripped) = lower.strip_prefix(&prefix_lower) {
                let consumed = tag.len() - stripped.len();
                rest = &tag[consumed..];
                rest = rest.trim_start_matches(['.', '_', '-']);
            }
        }

        let ver_candidate = if let Some(m) = version_prefix_re().find(rest) {
            &rest[m.end()..]
        } else {
            rest
        };

        if !shape_guard_re().is_match(ver_candidate) {
            continue;
        }

        let scored = Scored {
            shape_match: accepts_shape(ver_candidate),
            key: VersionKey(ver_candidate.to_string()),
            tag,
            version: ver_candidate.to_string(),
        };

        best = Some(match best {
            None => scored,
            Some(current) => {
                if (scored.shape_match, &scored.key) > (current.shape_match, &current.key) {
                    scored
                } else {
                    current
                }
            },
        });
    }

    best.map(|b| (b.version, b.tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_version_tag() {
        let tags = ["v1.0", "v1.10", "v1.2"];
        let (ver, tag) = tag_maxver(&tags, "", "1.0").unwrap();
        assert_eq!(ver, "1.10");
        assert_eq!(tag, "v1.10");
    }

    #[test]
    fn strips_repo_prefix() {
        let tags = ["myrepo-2.0", "myrepo-2.1"];
        let (ver, _) = tag_maxver(&tags, "myrepo", "2.0").unwrap();
        assert_eq!(ver, "2.1");
    }

    #[test]
    fn rejects_non_version_tags() {
        let tags = ["main", "latest", "v1.0"];
        let (ver, tag) = tag_maxver(&tags, "", "1.0").unwrap();
        assert_eq!(ver, "1.0");
        assert_eq!(tag, "v1.0");
    }
}
