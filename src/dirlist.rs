//! Directory Listing Parser (C3): normalize Apache/nginx/cgit/html-table
//! directory listings into a common `FileEntry` schema.
//!
//! Grounded on `parse_listing` in `piss/chores.py`, reimplemented against
//! `scraper` (the selector/tree-walk crate favored across the retrieval
//! pack for HTML extraction) instead of BeautifulSoup.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// One entry in a normalized directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub description: Option<String>,
    pub signature: Option<String>,
}

/// `(path portion of an "Index of ..." title, parsed entries)`.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub cwd: Option<String>,
    pub entries: Vec<FileEntry>,
}

const DATETIME_FORMATS: &[&str] = &[
    "%d-%b-%Y %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%b-%d %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
    "%Y-%m-%d",
    "%d/%m/%Y %H:%M:%S %z",
];

/// Try each of the six recognized datetime shapes in order (spec §4.3).
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if fmt.ends_with("%z") {
            if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            continue;
        }
        if fmt == &"%Y-%m-%d" {
            if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
                return Some(DateTime::from_naive_utc_and_offset(
                    d.and_hms_opt(0, 0, 0).unwrap(),
                    Utc,
                ));
            }
            continue;
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

fn filesize_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\d+(\.\d+)?\s?[BKMGTPEZY]$|^\d+$|^-$").unwrap())
}

/// Decode a human-readable size string (`"1.5K"`, `"4096"`, `"-"`) into
/// bytes. Invalid input returns `None` ("size unknown") rather than erroring.
pub fn human2bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }
    if !filesize_re().is_match(raw) {
        return None;
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let mut chars = raw.chars();
    let suffix = chars.next_back()?;
    let num_part: String = chars.collect();
    let num_part = num_part.trim();
    let value: f64 = num_part.parse().ok()?;
    let exp = "BKMGTPEZY".find(suffix.to_ascii_uppercase())? as u32;
    Some((value * 1024f64.powi(exp as i32)) as u64)
}

/// Format a byte count the way `sizeof_fmt` does in the original: binary
/// (1024) units, one decimal place, suffix from `BKMGTPEZY`.
pub fn sizeof_fmt(mut bytes: f64) -> String {
    for unit in ["B", "K", "M", "G", "T", "P", "E", "Z"] {
        if bytes.abs() < 1024.0 {
            return format!("{bytes:.1}{unit}");
        }
        bytes /= 1024.0;
    }
    format!("{bytes:.1}Y")
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Index of (?P<path>\S*)").unwrap())
}

fn parent_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(parent directory|\.\.|\.\./)$").unwrap())
}

fn absolute_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^((ht|f)tps?:)?//|^/").unwrap())
}

/// Parse an HTML directory listing document into a normalized [`Listing`].
pub fn parse_listing(document: &str) -> Listing {
    let html = Html::parse_document(document);

    let cwd = find_index_title(&html);

    if let Some(entries) = try_parse_pre(&html) {
        return Listing { cwd, entries };
    }
    if let Some(entries) = try_parse_table(&html) {
        return Listing { cwd, entries };
    }
    Listing {
        cwd,
        entries: parse_ul_fallback(&html),
    }
}

fn find_index_title(html: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").unwrap();
    let h1_sel = Selector::parse("h1").unwrap();
    for sel in [&title_sel, &h1_sel] {
        for el in html.select(sel) {
            let text: String = el.text().collect();
            if let Some(caps) = title_re().captures(text.trim()) {
                return Some(caps["path"].to_string());
            }
        }
    }
    None
}

fn try_parse_pre(html: &Html) -> Option<Vec<FileEntry>> {
    let pre_sel = Selector::parse("pre").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let pre = html.select(&pre_sel).find(|p| p.select(&a_sel).any(|a| !text_of(&a).trim().is_empty()))?;

    let mut entries = Vec::new();
    let mut started = false;
    let mut pending_name: Option<String> = None;
    let mut pending_text_after_name = String::new();

    for node in pre.children() {
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == "a" {
                let text = text_of(&el);
                let href = el.value().attr("href").unwrap_or("");
                if !started {
                    if parent_dir_re().is_match(text.trim()) || href == "../" || href == ".." {
                        started = true;
                        continue;
                    }
                    continue;
                }
                if let Some(name) = pending_name.take() {
                    entries.push(make_entry(&name, &pending_text_after_name));
                }
                let decoded = percent_encoding::percent_decode_str(href.trim_end_matches('/'))
                    .decode_utf8_lossy()
                    .to_string();
                let name = if !decoded.is_empty() { decoded } else { text.trim().to_string() };
                pending_name = Some(name);
                pending_text_after_name.clear();
            }
        } else if let Some(text) = node.value().as_text() {
            if started && pending_name.is_some() {
                pending_text_after_name.push_str(text);
            }
        }
    }
    if let Some(name) = pending_name.take() {
        entries.push(make_entry(&name, &pending_text_after_name));
    }

    Some(entries)
}

fn make_entry(name: &str, trailing: &str) -> FileEntry {
    let mut modified = None;
    let mut size = None;
    let mut description = None;

    let tokens: Vec<&str> = trailing.split_whitespace().collect();
    // Try progressively shorter leading windows against the datetime table,
    // then treat the next token as size, then the rest as description.
    let mut rest_start = 0;
    'outer: for window in (1..=4).rev() {
        if window > tokens.len() {
            continue;
        }
        let candidate = tokens[..window].join(" ");
        if let Some(dt) = parse_datetime(&candidate) {
            modified = Some(dt);
            rest_start = window;
            break 'outer;
        }
    }
    if rest_start < tokens.len() {
        if filesize_re().is_match(tokens[rest_start]) {
            size = human2bytes(tokens[rest_start]);
            rest_start += 1;
        }
    }
    if rest_start < tokens.len() {
        let desc = tokens[rest_start..].join(" ");
        if !desc.is_empty() {
            description = Some(desc);
        }
    }

    FileEntry {
        name: name.to_string(),
        modified,
        size,
        description,
        signature: None,
    }
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect()
}

fn normalize_header(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "name" => Some("name"),
        "last modified" | "modified" | "date" => Some("modified"),
        "size" => Some("size"),
        "description" | "comment" => Some("description"),
        "type" => Some("description"),
        "signature" => Some("signature"),
        "parent directory" => None,
        _ => None,
    }
}

/// Does this header row look like a real directory-listing header (as
/// opposed to some unrelated decorative `<table>` earlier in the page)?
/// A header counts even when its only recognized cell is "Parent Directory",
/// which `normalize_header` otherwise maps to `None` (no column, but still a
/// listing signal).
fn looks_like_listing_header(header_cells: &[ElementRef]) -> bool {
    header_cells.iter().any(|c| {
        let lower = text_of(c).trim().to_ascii_lowercase();
        normalize_header(&lower).is_some() || lower == "parent directory"
    })
}

/// Recognized columns, indexed by physical `<td>` position — `None` marks a
/// header cell that doesn't map to a known column (e.g. an interleaved
/// "Signature" column we don't otherwise display, or something unrecognized),
/// so later columns keep their correct physical index instead of shifting.
fn try_parse_table(html: &Html) -> Option<Vec<FileEntry>> {
    let table_sel = Selector::parse("table").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let mut chosen: Option<(Vec<ElementRef>, Vec<Option<&'static str>>)> = None;
    for table in html.select(&table_sel) {
        let rows: Vec<_> = table.select(&tr_sel).collect();
        if rows.is_empty() {
            continue;
        }
        let header_cells: Vec<_> = rows[0].select(&th_sel).collect();
        if header_cells.is_empty() || !looks_like_listing_header(&header_cells) {
            continue;
        }
        let columns: Vec<Option<&'static str>> =
            header_cells.iter().map(|c| normalize_header(&text_of(c))).collect();
        chosen = Some((rows, columns));
        break;
    }
    let (rows, columns) = chosen?;
    let body_rows = &rows[1..];

    let mut entries = Vec::new();
    for row in body_rows {
        let cells: Vec<_> = row.select(&td_sel).collect();
        if cells.is_empty() {
            continue;
        }
        let first = &cells[0];
        let Some(anchor) = first.select(&a_sel).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or("");
        if parent_dir_re().is_match(href.trim()) || href == "../" {
            continue;
        }
        let decoded = percent_encoding::percent_decode_str(href.trim_end_matches('/'))
            .decode_utf8_lossy()
            .to_string();
        let rendered = text_of(&anchor).trim().to_string();
        let name = if !rendered.is_empty() && decoded.ends_with(rendered.as_str()) {
            rendered
        } else if !decoded.is_empty() {
            decoded
        } else {
            rendered
        };

        let mut entry = FileEntry {
            name,
            modified: None,
            size: None,
            description: None,
            signature: None,
        };

        for (i, col) in columns.iter().enumerate().skip(1) {
            let Some(cell) = cells.get(i) else { continue };
            if let Some(sort_value) = cell.value().attr("data-sort-value") {
                match *col {
                    Some("modified") => {
                        if let Ok(secs) = sort_value.parse::<i64>() {
                            entry.modified = DateTime::from_timestamp(secs, 0);
                        }
                        continue;
                    },
                    Some("size") => {
                        if let Ok(bytes) = sort_value.parse::<u64>() {
                            entry.size = Some(bytes);
                        }
                        continue;
                    },
                    _ => {},
                }
            }
            let text = text_of(cell).trim().to_string();
            match *col {
                Some("modified") => entry.modified = parse_datetime(&text),
                Some("size") => entry.size = human2bytes(&text),
                Some("description") => {
                    if !text.is_empty() {
                        entry.description = Some(text);
                    }
                },
                Some("signature") => {
                    if !text.is_empty() {
                        entry.signature = Some(text);
                    }
                },
                _ => {},
            }
        }

        entries.push(entry);
    }

    Some(entries)
}

fn parse_ul_fallback(html: &Html) -> Vec<FileEntry> {
    let li_sel = Selector::parse("li").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let mut entries = Vec::new();
    for li in html.select(&li_sel) {
        let Some(anchor) = li.select(&a_sel).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or("");
        if href.is_empty() || href == "." || href == ".." || href.starts_with('#') {
            continue;
        }
        if absolute_url_re().is_match(href) {
            continue;
        }
        let decoded = percent_encoding::percent_decode_str(href.trim_end_matches('/'))
            .decode_utf8_lossy()
            .to_string();
        entries.push(FileEntry {
            name: decoded,
            modified: None,
            size: None,
            description: None,
            signature: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_apache_style_pre_listing() {
        let doc = r#"
            <html><head><title>Index of /dl/</title></head>
            <body><h1>Index of /dl/</h1>
            <pre><a href="../">Parent Directory</a>
<a href="foo-1.0.tar.gz">foo-1.0.tar.gz</a>             01-Jan-2024 10:00    1.2M
<a href="foo-1.1.tar.gz">foo-1.1.tar.gz</a>             02-Jan-2024 10:00    1.3M
</pre></body></html>
        "#;
        let listing = parse_listing(doc);
        assert_eq!(listing.cwd.as_deref(), Some("/dl/"));
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.entries[0].name, "foo-1.0.tar.gz");
        assert!(listing.entries[0].modified.is_some());
        assert!(listing.entries[0].size.unwrap() > 0);
    }

    #[test]
    fn parses_html_table_with_header() {
        let doc = r#"
            <html><body><table>
            <tr><th>Name</th><th>Last modified</th><th>Size</th><th>Description</th></tr>
            <tr><td><a href="bar-2.0.tar.gz">bar-2.0.tar.gz</a></td><td>2024-01-01 00:00</td><td>4.0K</td><td>release</td></tr>
            </table></body></html>
        "#;
        let listing = parse_listing(doc);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "bar-2.0.tar.gz");
        assert_eq!(listing.entries[0].description.as_deref(), Some("release"));
    }

    #[test]
    fn parses_signature_column_and_keeps_later_columns_aligned() {
        // "Signature" isn't one of the four displayed columns, but its
        // header cell must still occupy a physical <td> slot so "Last
        // modified" (after it) is read from the right cell.
        let doc = r#"
            <html><body><table>
            <tr><th>Name</th><th>Size</th><th>Signature</th><th>Last modified</th></tr>
            <tr>
                <td><a href="bar-2.0.tar.gz">bar-2.0.tar.gz</a></td>
                <td>4.0K</td>
                <td>bar-2.0.tar.gz.asc</td>
                <td>2024-01-01 00:00</td>
            </tr>
            </table></body></html>
        "#;
        let listing = parse_listing(doc);
        assert_eq!(listing.entries.len(), 1);
        let entry = &listing.entries[0];
        assert_eq!(entry.size, Some(4096));
        assert_eq!(entry.signature.as_deref(), Some("bar-2.0.tar.gz.asc"));
        assert!(entry.modified.is_some());
    }

    #[test]
    fn skips_decorative_table_without_listing_header() {
        // A nav/decorative table before the real listing must be ignored in
        // favor of the one whose header actually matches.
        let doc = r#"
            <html><body>
            <table><tr><th>Home</th><th>About</th></tr><tr><td>x</td><td>y</td></tr></table>
            <table>
            <tr><th>Name</th><th>Last modified</th><th>Size</th></tr>
            <tr><td><a href="bar-2.0.tar.gz">bar-2.0.tar.gz</a></td><td>2024-01-01 00:00</td><td>4.0K</td></tr>
            </table>
            </body></html>
        "#;
        let listing = parse_listing(doc);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "bar-2.0.tar.gz");
    }

    #[test]
    fn table_with_no_recognized_header_falls_through_to_none() {
        let html = Html::parse_document(
            r#"<html><body><table><tr><th>Home</th><th>About</th></tr><tr><td>x</td><td>y</td></tr></table></body></html>"#,
        );
        assert_eq!(try_parse_table(&html), None);
    }

    #[test]
    fn parses_ul_fallback_and_rejects_absolute_links() {
        let doc = r#"
            <html><body><ul>
            <li><a href="baz-1.0.zip">baz-1.0.zip</a></li>
            <li><a href="/elsewhere">elsewhere</a></li>
            <li><a href="..">up</a></li>
            </ul></body></html>
        "#;
        let listing = parse_listing(doc);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "baz-1.0.zip");
    }

    #[test]
    fn human2bytes_decodes_binary_units() {
        assert_eq!(human2bytes("1K"), Some(1024));
        assert_eq!(human2bytes("4096"), Some(4096));
        assert_eq!(human2bytes("-"), None);
        assert_eq!(human2bytes("garbage"), None);
    }

    #[test]
    fn sizeof_fmt_matches_binary_scaling() {
        assert_eq!(sizeof_fmt(1024.0), "1.0K");
        assert_eq!(sizeof_fmt(512.0), "512.0B");
    }
}
