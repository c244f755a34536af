//! URL Normalizer (C2): strip version-bearing path components so a
//! tarball's parent directory can be used as a directory-listing target.
//!
//! Grounded on `remove_package_version` in `piss/chores.py`.

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;

fn minor_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+$").unwrap())
}

/// Walk `path` segment by segment, strip `name` and surrounding separators
/// from each, and truncate (inclusive) at the first segment whose remainder
/// either contains `version` as a substring or is a non-`N.N`-shaped prefix
/// of it. Preserves a leading `/` and a trailing `/`.
///
/// Example: `remove_package_version("foo", "/project/downloads/foo-1.2.3/", "1.2.3")`
/// returns `/project/downloads/`.
pub fn remove_package_version(name: &str, path: &str, version: &str) -> String {
    let had_leading_slash = path.starts_with('/');
    let had_trailing_slash = path.ends_with('/') && path.len() > 1;

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut kept: Vec<String> = Vec::new();

    for seg in &segments {
        let decoded = percent_decode_str(seg).decode_utf8_lossy().to_string();
        let stripped = strip_name(&decoded, name);

        let cuts = !version.is_empty()
            && (stripped.contains(version)
                || (is_version_prefix(&stripped, version) && !minor_version_re().is_match(&stripped)));

        if cuts {
            break;
        }
        kept.push(seg.to_string());
    }

    let mut out = String::new();
    if had_leading_slash {
        out.push('/');
    }
    out.push_str(&kept.join("/"));
    if had_trailing_slash && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Strip every occurrence of `name` from `segment` (case-insensitive),
/// mirroring the original's `.replace(name, '')` — not just a literal
/// prefix match.
fn strip_name(segment: &str, name: &str) -> String {
    let stripped = if name.is_empty() {
        segment.to_string()
    } else {
        let re = Regex::new(&format!("(?i){}", regex::escape(name))).unwrap();
        re.replace_all(segment, "").to_string()
    };
    stripped.trim_matches(|c: char| c == ' ' || c == '-' || c == '_' || c == '.').to_string()
}

fn is_version_prefix(candidate: &str, version: &str) -> bool {
    !candidate.is_empty() && version.starts_with(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_versioned_directory() {
        let out = remove_package_version("foo", "/project/downloads/foo-1.2.3/", "1.2.3");
        assert_eq!(out, "/project/downloads/");
    }

    #[test]
    fn preserves_path_without_version_component() {
        let out = remove_package_version("foo", "/project/downloads/", "1.2.3");
        assert_eq!(out, "/project/downloads/");
    }

    #[test]
    fn preserves_leading_and_trailing_slash() {
        let out = remove_package_version("curl", "/download/curl-7.88.1/", "7.88.1");
        assert!(out.starts_with('/'));
        assert!(out.ends_with('/'));
    }

    #[test]
    fn minor_version_shaped_remainder_is_not_truncated_unless_substring() {
        // "1.2" is a proper prefix of "1.2.3" but matches the N.N guard,
        // so it is NOT truncated on the prefix rule alone.
        let out = remove_package_version("foo", "/a/foo-1.2/b/", "1.2.3");
        assert_eq!(out, "/a/foo-1.2/b/");
    }

    #[test]
    fn url_decodes_segments_before_comparison() {
        let out = remove_package_version("my pkg", "/dl/my%20pkg-2.0/", "2.0");
        assert_eq!(out, "/dl/");
    }

    #[test]
    fn strip_name_removes_every_occurrence_not_just_a_leading_one() {
        // "foo" sits in the middle, not at position 0; every occurrence must
        // still be removed, not just a literal prefix match.
        assert_eq!(strip_name("archive-foo-2.0", "foo"), "archive--2.0");
        // Case-insensitive, and removes repeats.
        assert_eq!(strip_name("FOO-foo-1.0", "foo"), "1.0");
    }
}
