//! Read-only ingestion of the upstream "abbs" package catalog.
//!
//! Grounded on the query shape and `async` pooled-query pattern in the
//! teacher's `package/mod.rs` (`PackageQuery`), adapted to read a foreign
//! SQLite database rather than evaluate Nix expressions.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// The kind of source URL a package declares, taken from the `spsrc.key`
/// column of the abbs database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Tarball,
    Git,
    Svn,
    Bzr,
    None,
}

impl SourceKind {
    fn from_key(key: &str) -> Self {
        match key {
            "SRCTBL" => SourceKind::Tarball,
            "GITSRC" => SourceKind::Git,
            "SVNSRC" => SourceKind::Svn,
            "BZRSRC" => SourceKind::Bzr,
            _ => SourceKind::None,
        }
    }
}

/// A single row of the abbs catalog: a package name plus its declared
/// source URL and current version, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub source_kind: SourceKind,
    pub source_url: Option<String>,
    pub current_version: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    name: String,
    srctype: Option<String>,
    srcurl: Option<String>,
    version: Option<String>,
}

/// A read-only connection to the abbs database.
pub struct AbbsDb {
    pool: SqlitePool,
}

impl AbbsDb {
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("opening abbs database at {path}"))?;
        Ok(Self { pool })
    }

    /// Fetch the full package list in the randomized order the scheduler
    /// relies on for uniform backoff sampling (spec §4.7).
    pub async fn list_packages(&self) -> Result<Vec<Package>> {
        let rows: Vec<PackageRow> = sqlx::query_as(
            r#"
            SELECT v_packages.name AS name, spsrc.key AS srctype, spsrc.value AS srcurl, version
            FROM v_packages
            LEFT JOIN package_spec spsrc
              ON spsrc.package = v_packages.name
             AND spsrc.key IN ('SRCTBL','GITSRC','SVNSRC','BZRSRC')
            ORDER BY random()
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("querying abbs package catalog")?;

        Ok(rows
            .into_iter()
            .map(|r| Package {
                name: r.name,
                source_kind: r.srctype.as_deref().map(SourceKind::from_key).unwrap_or(SourceKind::None),
                source_url: r.srcurl,
                current_version: r.version,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_maps_known_keys() {
        assert_eq!(SourceKind::from_key("SRCTBL"), SourceKind::Tarball);
        assert_eq!(SourceKind::from_key("GITSRC"), SourceKind::Git);
        assert_eq!(SourceKind::from_key("SVNSRC"), SourceKind::Svn);
        assert_eq!(SourceKind::from_key("BZRSRC"), SourceKind::Bzr);
        assert_eq!(SourceKind::from_key("WHATEVER"), SourceKind::None);
    }
}
