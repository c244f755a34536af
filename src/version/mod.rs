//! Version comparison, shape-matching, and normalization (C1).
//!
//! This mirrors the Debian/RPM-style "tilde sorts before empty" comparison
//! discipline used by the original `piss` service, made explicit because
//! none of the host language's version crates (semver, pep440) model the
//! free-form version strings found in upstream release tags and filenames.

pub mod tag;
pub mod tarball;

use std::cmp::Ordering;

/// A maximal run of either digits or non-digits within a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Digits(&'a str),
    Other(&'a str),
}

fn segment(s: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let is_digit = bytes[i].is_ascii_digit();
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() == is_digit {
            i += 1;
        }
        let run = &s[start..i];
        segments.push(if is_digit {
            Segment::Digits(run)
        } else {
            Segment::Other(run)
        });
    }
    segments
}

/// Per-character ordering used when two non-digit runs are compared.
///
/// `~` sorts before everything, including the empty string; digits sort
/// before letters; letters sort in codepoint order; everything else sorts
/// after letters.
fn char_order(c: char) -> i32 {
    match c {
        '~' => -1,
        '0'..='9' => c as i32 - '0' as i32 + 1,
        'a'..='z' | 'A'..='Z' => c as i32,
        other => other as i32 + 256,
    }
}

/// Sentinel for "no character here" (one string ran out before the
/// other). Must sort below every real character, including `~` (-1), so
/// a missing run never outranks an explicit tilde or letter.
const MISSING_ORDER: i32 = i32::MIN;

fn compare_other(a: &str, b: &str) -> Ordering {
    let mut ac = a.chars();
    let mut bc = b.chars();
    loop {
        match (ac.next(), bc.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(cb)) => return MISSING_ORDER.cmp(&char_order(cb)),
            (Some(ca), None) => return char_order(ca).cmp(&MISSING_ORDER),
            (Some(ca), Some(cb)) => {
                let ord = char_order(ca).cmp(&char_order(cb));
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}

/// Compare two version strings, returning `Less`/`Equal`/`Greater`.
///
/// Segments both strings into runs of digits vs. non-digits and compares
/// pairwise: two digit runs compare as non-negative integers, anything else
/// compares character-by-character via [`char_order`]. A missing run on one
/// side is treated as `0` on the digit side and `""` on the non-digit side,
/// so `"1.0~rc1"` sorts before `"1.0"` and `"1.0"` sorts before `"1.0-1"`.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    let sa = segment(a);
    let sb = segment(b);
    let len = sa.len().max(sb.len());
    for i in 0..len {
        let ea = sa.get(i);
        let eb = sb.get(i);
        let ord = match (ea, eb) {
            (Some(Segment::Digits(x)), Some(Segment::Digits(y))) => {
                compare_numeric(x, y)
            },
            (Some(Segment::Digits(x)), None) => compare_numeric(x, "0"),
            (None, Some(Segment::Digits(y))) => compare_numeric("0", y),
            (Some(Segment::Digits(x)), Some(Segment::Other(y))) => {
                compare_numeric(x, "0").then(compare_other("", y))
            },
            (Some(Segment::Other(x)), Some(Segment::Digits(y))) => {
                compare_other(x, "").then(compare_numeric("0", y))
            },
            (Some(Segment::Other(x)), Some(Segment::Other(y))) => compare_other(x, y),
            (Some(Segment::Other(x)), None) => compare_other(x, ""),
            (None, Some(Segment::Other(y))) => compare_other("", y),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    // Final tie-break: plain byte-wise comparison.
    a.cmp(b)
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// A reference version's lexical "shape": the sequence of digit-run and
/// non-digit-run classes, ignoring their exact contents.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShapeClass {
    Digits(usize),
    Other,
}

fn shape_of(v: &str) -> Vec<ShapeClass> {
    segment(v)
        .into_iter()
        .map(|s| match s {
            Segment::Digits(d) => ShapeClass::Digits(d.len()),
            Segment::Other(_) => ShapeClass::Other,
        })
        .collect()
}

/// Build a "plausibility" check from a reference version: does `candidate`
/// have the same shape (digit-run/non-digit-run class sequence, with digit
/// runs bucketed into "short" (1-2 digits), "medium" (3-4), and "long" (5+)
/// so that `1.2.3` and `1.23.4` are considered the same shape but `1.2.3`
/// and a date-like `20240101` are not)?
///
/// Used as a guard so that, e.g., a date-shaped tarball name doesn't win
/// over a dotted-numeric one when the current version is dotted-numeric.
pub fn version_format(reference: &str) -> impl Fn(&str) -> bool {
    let bucket = |n: usize| -> u8 {
        match n {
            0..=2 => 0,
            3..=4 => 1,
            _ => 2,
        }
    };
    let reference_shape: Vec<(bool, u8)> = shape_of(reference)
        .into_iter()
        .map(|c| match c {
            ShapeClass::Digits(n) => (true, bucket(n)),
            ShapeClass::Other => (false, 0),
        })
        .collect();
    move |candidate: &str| {
        let candidate_shape: Vec<(bool, u8)> = shape_of(candidate)
            .into_iter()
            .map(|c| match c {
                ShapeClass::Digits(n) => (true, bucket(n)),
                ShapeClass::Other => (false, 0),
            })
            .collect();
        // A single shared prefix of digit-run/non-digit-run alternation
        // suffices; we don't require every punctuation run to match
        // exactly, only the digit/non-digit alternation and rough magnitude.
        let n = reference_shape.len().min(candidate_shape.len());
        if n == 0 {
            return false;
        }
        reference_shape[..n] == candidate_shape[..n]
    }
}

/// Sort key used to pick the "maximum" version among candidates: wraps
/// [`version_compare`] so it composes with `Ord`-based tuple comparisons
/// (used by [`tarball::tarball_maxver`] and [`tag::tag_maxver`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionKey(pub String);

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        version_compare(&self.0, &other.0)
    }
}

/// Normalize a release version per the `Release` invariants in the data
/// model: strip a leading `v`/`ver`/`release`/`rel`/`r[-._]?` marker, strip a
/// leading `<package>[-._]` prefix, and collapse all-underscore numeric
/// groups (`\d_\d`) to dots when the result has no dots.
pub fn normalize_release_version(package: &str, raw: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    let prefix_re = PREFIX_RE.get_or_init(|| {
        Regex::new(r"(?i)^(v|ver|version|release|rel|r)[-._]?").unwrap()
    });

    let mut v = raw.trim().to_string();
    if let Some(m) = prefix_re.find(&v) {
        if m.end() < v.len() && v.as_bytes()[m.end()].is_ascii_digit() {
            v = v[m.end()..].to_string();
        }
    }

    let pkg_prefix = format!("{}[-._]", regex::escape(package));
    if let Ok(re) = Regex::new(&format!("(?i)^{}", pkg_prefix)) {
        if let Some(m) = re.find(&v) {
            v = v[m.end()..].to_string();
        }
    }

    if !v.contains('.') {
        static NUM_GROUP_RE: OnceLock<Regex> = OnceLock::new();
        let re = NUM_GROUP_RE.get_or_init(|| Regex::new(r"(\d)_(\d)").unwrap());
        loop {
            let replaced = re.replace(&v, "$1.$2").to_string();
            if replaced == v {
                break;
            }
            v = replaced;
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflexive_and_antisymmetric() {
        for (a, b) in [("1.0", "1.0"), ("1.2.3", "1.2.3"), ("1.0~rc1", "1.0~rc1")] {
            assert_eq!(version_compare(a, a), Ordering::Equal);
            assert_eq!(version_compare(a, b).reverse(), version_compare(b, a));
        }
    }

    #[test]
    fn tilde_sorts_before_release() {
        assert_eq!(version_compare("1.0~rc1", "1.0"), Ordering::Less);
    }

    #[test]
    fn numeric_runs_compare_as_integers() {
        assert_eq!(version_compare("1.10", "1.2"), Ordering::Greater);
        assert_eq!(version_compare("1.9", "1.10"), Ordering::Less);
    }

    #[test]
    fn missing_trailing_component_sorts_lower() {
        assert_eq!(version_compare("1.0", "1.0-1"), Ordering::Less);
    }

    #[test]
    fn missing_run_sorts_below_alphabetic_suffix() {
        // A run that's simply absent must sort lower than a real letter,
        // so a bare release never loses to its own alpha-suffixed variant.
        assert_eq!(version_compare("1.0", "1.0a"), Ordering::Less);
        assert_eq!(version_compare("1.0a", "1.0"), Ordering::Greater);
    }

    #[test]
    fn normalize_idempotent() {
        for v in ["v1.2.3", "release-2.0", "foo-1.0.0", "1_2_3", "2.0"] {
            let once = normalize_release_version("foo", v);
            let twice = normalize_release_version("foo", &once);
            assert_eq!(once, twice, "not idempotent for {v}");
        }
    }

    #[test]
    fn normalize_strips_prefixes() {
        assert_eq!(normalize_release_version("curl", "v7.88.1"), "7.88.1");
        assert_eq!(normalize_release_version("curl", "curl-7.88.1"), "7.88.1");
        assert_eq!(normalize_release_version("foo", "release-1.0"), "1.0");
    }

    #[test]
    fn normalize_collapses_underscore_groups_when_no_dots() {
        assert_eq!(normalize_release_version("foo", "1_2_3"), "1.2.3");
        // Already has dots: leave underscores alone.
        assert_eq!(normalize_release_version("foo", "1.2_3"), "1.2_3");
    }

    #[test]
    fn shape_filter_prefers_dotted_numeric_over_date_shaped() {
        let accepts = version_format("1.2.3");
        assert!(accepts("1.10.2"));
        assert!(!accepts("20240101"));
    }
}
