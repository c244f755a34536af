//! `tarball_maxver`: pick the best-matching tarball among a directory listing
//! (C1, spec §4.1 scenario 1).

use std::sync::OnceLock;

use regex::Regex;

use super::{version_format, VersionKey};

/// A candidate file as seen by the directory listing or feed parser.
#[derive(Debug, Clone)]
pub struct TarballCandidate {
    pub filename: String,
    pub updated: i64,
    pub description: Option<String>,
}

/// Archive extensions recognized by the tarball filename grammar.
const EXTENSIONS: &[&str] = &["tar.xz", "tar.bz2", "tar.gz", "tz", "taz", "tbz2", "zip", "gem"];

fn binary_artifact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)linux32|linux64|win32|win64|osx|x86|i[3-6]86|x64|amd64|arm64|armhf|armel|mips|ppc|powerpc|s390x|mingw|msvc|portable|dbgsym",
        )
        .unwrap()
    })
}

/// Matches `<prefix>[._-]v?<ver>[.-_](orig|src)?.<ext>`, where `<prefix>` and
/// `<ver>` are captured for scoring.
fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let ext_alt = EXTENSIONS.join("|");
        Regex::new(&format!(
            r"(?i)^(?P<prefix>.+?)[._-]v?(?P<ver>[0-9][0-9a-zA-Z.~+_-]*?)(?:[.\-_](?:orig|src))?\.(?:{ext_alt})$",
            ext_alt = ext_alt
        ))
        .unwrap()
    })
}

struct Scored {
    prefix_match: bool,
    shape_match: bool,
    key: VersionKey,
    candidate: TarballCandidate,
    version: String,
}

/// Return the tarball with the highest-scoring version among `candidates`,
/// using `name` as the expected prefix and `origversion` as the shape
/// reference. Returns `(version, candidate)` or `None` if nothing parses.
pub fn tarball_maxver<'a>(
    candidates: &'a [TarballCandidate],
    name: &str,
    origversion: &str,
) -> Option<(String, &'a TarballCandidate)> {
    let accepts_shape = version_format(origversion);
    let name_lower = name.to_ascii_lowercase();
    let re = filename_re();

    let mut best: Option<Scored> = None;
    for candidate in candidates {
        let lower = candidate.filename.to_ascii_lowercase();
        if !lower.starts_with(&name_lower) {
            continue;
        }
        if binary_artifact_re().is_match(&lower) {
            continue;
        }
        let Some(caps) = re.captures(&candidate.filename) else {
            continue;
        };
        let prefix = caps.name("prefix").unwrap().as_str();
        let ver = caps.name("ver").unwrap().as_str();

        let scored = Scored {
            prefix_match: prefix.eq_ignore_ascii_case(name),
            shape_match: accepts_shape(ver),
            key: VersionKey(ver.to_string()),
            candidate,
            version: ver.to_string(),
        };

        best = Some(match best {
            None => scored,
            Some(current) => {
                if (scored.prefix_match, scored.shape_match, &scored.key)
                    > (current.prefix_match, current.shape_match, &current.key)
                {
                    scored
                } else {
                    current
                }
            },
        });
    }

    best.map(|b| (b.version, b.candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(name: &str) -> TarballCandidate {
        TarballCandidate {
            filename: name.to_string(),
            updated: 0,
            description: None,
        }
    }

    #[test]
    fn picks_highest_numeric_version_ignoring_binary_artifacts() {
        let candidates = vec![
            cand("foo-1.2.tar.gz"),
            cand("foo-1.10.tar.gz"),
            cand("foo-linux64-2.0.tar.gz"),
        ];
        let (ver, file) = tarball_maxver(&candidates, "foo", "1.2").unwrap();
        assert_eq!(ver, "1.10");
        assert_eq!(file.filename, "foo-1.10.tar.gz");
    }

    #[test]
    fn rejects_non_matching_prefix() {
        let candidates = vec![cand("bar-1.0.tar.gz")];
        assert!(tarball_maxver(&candidates, "foo", "1.0").is_none());
    }

    #[test]
    fn strips_orig_and_src_suffixes() {
        let candidates = vec![cand("foo-1.5.orig.tar.gz"), cand("foo-1.4.tar.gz")];
        let (ver, _) = tarball_maxver(&candidates, "foo", "1.4").unwrap();
        assert_eq!(ver, "1.5");
    }
}
