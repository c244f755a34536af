//! Event Store (C8): durable SQLite-backed state for poll status, releases,
//! events, chore state, and the Anitya mirror.
//!
//! Grounded on `Database` in the teacher's `database/mod.rs` — same
//! pooled-connection-plus-migration bootstrap, same upsert-on-write
//! discipline for backoff bookkeeping.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use tracing::debug;

/// Successful polls are not retried for this long (spec §4.7).
pub const SUCCESS_BACKOFF_SECS: i64 = 2 * 3600;
/// Failing polls back off three days before being retried.
pub const FAILURE_BACKOFF_SECS: i64 = 3 * 86400;

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamStatus {
    pub package: String,
    pub updated: Option<i64>,
    pub last_try: i64,
    pub err: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub package: String,
    pub upstream_type: String,
    pub version: String,
    pub updated: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub chore: String,
    pub category: String,
    pub time: i64,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub chore: String,
    pub category: String,
    pub time: i64,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoreStatus {
    pub name: String,
    pub updated: Option<i64>,
    pub last_result: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnityaProject {
    pub id: i64,
    pub name: String,
    pub homepage: Option<String>,
    pub ecosystem: Option<String>,
    pub backend: Option<String>,
    pub version_url: Option<String>,
    pub regex: Option<String>,
    pub latest_version: Option<String>,
    pub updated_on: Option<i64>,
    pub created_on: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct UpstreamStatusRow {
    package: String,
    updated: Option<i64>,
    last_try: i64,
    err: Option<String>,
}

impl From<UpstreamStatusRow> for UpstreamStatus {
    fn from(r: UpstreamStatusRow) -> Self {
        UpstreamStatus {
            package: r.package,
            updated: r.updated,
            last_try: r.last_try,
            err: r.err,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    chore: String,
    category: String,
    time: i64,
    title: String,
    content: Option<String>,
    url: Option<String>,
}

impl From<EventRow> for Event {
    fn from(r: EventRow) -> Self {
        Event {
            id: r.id,
            chore: r.chore,
            category: r.category,
            time: r.time,
            title: r.title,
            content: r.content,
            url: r.url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChoreStatusRow {
    name: String,
    updated: Option<i64>,
    last_result: Option<String>,
}

impl From<ChoreStatusRow> for ChoreStatus {
    fn from(r: ChoreStatusRow) -> Self {
        ChoreStatus {
            name: r.name,
            updated: r.updated,
            last_result: r.last_result,
        }
    }
}

/// The PUIS event store: one SQLite database holding status, releases,
/// events, chore state, and the Anitya mirror tables. Cheap to clone: the
/// underlying `SqlitePool` is itself a handle to a shared connection pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating parent directory for {db_path}"))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("opening event store at {db_path}"))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running event store migrations")?;

        Ok(Self { pool })
    }

    pub async fn get_status(&self, package: &str) -> Result<Option<UpstreamStatus>> {
        let row: Option<UpstreamStatusRow> = sqlx::query_as(
            "SELECT package, updated, last_try, err FROM upstream_status WHERE package = ?",
        )
        .bind(package)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Compute the full set of packages currently serving a backoff window,
    /// per spec §4.7 ("the set of delayed packages is computed once per
    /// run"). Anything not in this set, or never polled, is eligible.
    pub async fn delayed_packages(&self, now: DateTime<Utc>) -> Result<HashSet<String>> {
        let now_ts = now.timestamp();
        let rows: Vec<UpstreamStatusRow> = sqlx::query_as(
            "SELECT package, updated, last_try, err FROM upstream_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut delayed = HashSet::new();
        for row in rows {
            let backoff = if row.err.is_some() {
                FAILURE_BACKOFF_SECS
            } else {
                SUCCESS_BACKOFF_SECS
            };
            if now_ts < row.last_try + backoff {
                delayed.insert(row.package);
            }
        }
        Ok(delayed)
    }

    pub async fn record_success(&self, package: &str, now: DateTime<Utc>) -> Result<()> {
        let ts = now.timestamp();
        sqlx::query(
            r#"
            INSERT INTO upstream_status (package, updated, last_try, err)
            VALUES (?, ?, ?, NULL)
            ON CONFLICT(package) DO UPDATE SET updated = excluded.updated, last_try = excluded.last_try, err = NULL
            "#,
        )
        .bind(package)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_failure(&self, package: &str, now: DateTime<Utc>, err: &str) -> Result<()> {
        let ts = now.timestamp();
        debug!(package, err, "recording probe failure");
        sqlx::query(
            r#"
            INSERT INTO upstream_status (package, updated, last_try, err)
            VALUES (?, NULL, ?, ?)
            ON CONFLICT(package) DO UPDATE SET last_try = excluded.last_try, err = excluded.err
            "#,
        )
        .bind(package)
        .bind(ts)
        .bind(err)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_release(&self, release: &Release) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO package_upstream (package, type, version, time, url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(package) DO UPDATE SET
                type = excluded.type, version = excluded.version,
                time = excluded.time, url = excluded.url
            "#,
        )
        .bind(&release.package)
        .bind(&release.upstream_type)
        .bind(&release.version)
        .bind(release.updated)
        .bind(&release.url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_release(&self, package: &str) -> Result<Option<Release>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            package: String,
            r#type: String,
            version: String,
            time: i64,
            url: String,
        }
        let row: Option<Row> = sqlx::query_as(
            "SELECT package, type, version, time, url FROM package_upstream WHERE package = ?",
        )
        .bind(package)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Release {
            package: r.package,
            upstream_type: r.r#type,
            version: r.version,
            updated: r.time,
            url: r.url,
        }))
    }

    pub async fn append_event(&self, event: &NewEvent) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO events (chore, category, time, title, content, url) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.chore)
        .bind(&event.category)
        .bind(event.time)
        .bind(&event.title)
        .bind(&event.content)
        .bind(&event.url)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_events(&self, limit: i64) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, chore, category, time, title, content, url FROM events ORDER BY time DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_chore_status(&self, name: &str) -> Result<Option<ChoreStatus>> {
        let row: Option<ChoreStatusRow> = sqlx::query_as(
            "SELECT name, updated, last_result FROM chore_status WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn set_chore_status(&self, name: &str, updated: i64, last_result: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chore_status (name, updated, last_result)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET updated = excluded.updated, last_result = excluded.last_result
            "#,
        )
        .bind(name)
        .bind(updated)
        .bind(last_result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_anitya_project(&self, project: &AnityaProject) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO anitya_projects
                (id, name, homepage, ecosystem, backend, version_url, regex, latest_version, updated_on, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, homepage = excluded.homepage, ecosystem = excluded.ecosystem,
                backend = excluded.backend, version_url = excluded.version_url, regex = excluded.regex,
                latest_version = excluded.latest_version, updated_on = excluded.updated_on,
                created_on = excluded.created_on
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.homepage)
        .bind(&project.ecosystem)
        .bind(&project.backend)
        .bind(&project.version_url)
        .bind(&project.regex)
        .bind(&project.latest_version)
        .bind(project.updated_on)
        .bind(project.created_on)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn all_anitya_projects(&self) -> Result<Vec<AnityaProject>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: i64,
            name: String,
            homepage: Option<String>,
            ecosystem: Option<String>,
            backend: Option<String>,
            version_url: Option<String>,
            regex: Option<String>,
            latest_version: Option<String>,
            updated_on: Option<i64>,
            created_on: Option<i64>,
        }
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, name, homepage, ecosystem, backend, version_url, regex, latest_version, updated_on, created_on FROM anitya_projects",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| AnityaProject {
                id: r.id,
                name: r.name,
                homepage: r.homepage,
                ecosystem: r.ecosystem,
                backend: r.backend,
                version_url: r.version_url,
                regex: r.regex,
                latest_version: r.latest_version,
                updated_on: r.updated_on,
                created_on: r.created_on,
            })
            .collect())
    }

    pub async fn link_package_to_project(&self, package: &str, project_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO anitya_link (package, projectid) VALUES (?, ?)
            ON CONFLICT(package) DO UPDATE SET projectid = excluded.projectid
            "#,
        )
        .bind(package)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn backoff_windows_match_spec_scenario_5() {
        let store = Store::new(":memory:").await.unwrap();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let two_days_ago = now - chrono::Duration::days(2);
        let four_days_ago = now - chrono::Duration::days(4);

        store.record_failure("pkg-recent-fail", two_days_ago, "not found").await.unwrap();
        store.record_failure("pkg-old-fail", four_days_ago, "not found").await.unwrap();

        let delayed = store.delayed_packages(now).await.unwrap();
        assert!(delayed.contains("pkg-recent-fail"));
        assert!(!delayed.contains("pkg-old-fail"));
    }

    #[tokio::test]
    async fn success_record_clears_prior_error() {
        let store = Store::new(":memory:").await.unwrap();
        let now = Utc::now();
        store.record_failure("pkg", now, "boom").await.unwrap();
        store.record_success("pkg", now).await.unwrap();
        let status = store.get_status("pkg").await.unwrap().unwrap();
        assert!(status.err.is_none());
    }

    #[tokio::test]
    async fn events_are_returned_in_descending_time_order() {
        let store = Store::new(":memory:").await.unwrap();
        store
            .append_event(&NewEvent {
                chore: "foo".into(),
                category: "release".into(),
                time: 100,
                title: "first".into(),
                content: None,
                url: None,
            })
            .await
            .unwrap();
        store
            .append_event(&NewEvent {
                chore: "foo".into(),
                category: "release".into(),
                time: 200,
                title: "second".into(),
                content: None,
                url: None,
            })
            .await
            .unwrap();
        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events[0].title, "second");
        assert_eq!(events[1].title, "first");
    }
}
