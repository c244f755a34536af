//! Poll Scheduler (C7): drive probes across the package list with backoff,
//! conditional-GET caching, priority ordering, and cancellation.
//!
//! The bounded-concurrency mode is grounded on the teacher's `JoinSet`-based
//! worker pool in `commands/run.rs`; the reference discipline (§4.7) is
//! single-worker cooperative, which this module also supports by passing
//! `concurrency = 1`.

use std::collections::BinaryHeap;
use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::abbs::Package;
use crate::classifier::detect_upstream;
use crate::config::ChoreDefinition;
use crate::probes;
use crate::store::Store;

/// Summary returned after a full poll cycle, used by `commands::poll`/`run`
/// for log output.
#[derive(Debug, Default, Clone)]
pub struct PollSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_backoff: usize,
    pub unclassified: usize,
}

/// Run one full detection + poll cycle over the abbs package list,
/// respecting the backoff set computed once up front (spec §4.7). Returns
/// after every eligible package has been attempted.
pub async fn poll_cycle(
    client: &Client,
    store: &Store,
    packages: Vec<Package>,
    concurrency: usize,
) -> Result<PollSummary> {
    let now = Utc::now();
    let delayed = store.delayed_packages(now).await?;
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut summary = PollSummary::default();
    let mut joinset: JoinSet<Result<Option<bool>>> = JoinSet::new();

    for package in packages {
        if delayed.contains(&package.name) {
            summary.skipped_backoff += 1;
            continue;
        }

        let Some(source_url) = package.source_url.clone() else {
            summary.unclassified += 1;
            continue;
        };

        let descriptor = detect_upstream(
            &package.name,
            package.source_kind,
            &source_url,
            package.current_version.as_deref(),
        );
        let Some(descriptor) = descriptor else {
            summary.unclassified += 1;
            store.record_failure(&package.name, now, "can't detect upstream").await?;
            continue;
        };

        summary.attempted += 1;
        let permit = semaphore.clone().acquire_owned().await?;
        let client = client.clone();
        let store = store.clone();
        let current_version = package.current_version.clone();
        let name = package.name.clone();

        joinset.spawn(async move {
            let _permit = permit;
            let outcome = probes::run(&client, &name, current_version.as_deref(), &descriptor, None).await;
            let succeeded = outcome.err.is_none();
            if let Some(release) = &outcome.release {
                store.upsert_release(release).await?;
            }
            if succeeded {
                store.record_success(&name, Utc::now()).await?;
            } else if let Some(err) = &outcome.err {
                store.record_failure(&name, Utc::now(), err).await?;
            }
            Ok(Some(succeeded))
        });
    }

    while let Some(result) = joinset.join_next().await {
        match result {
            Ok(Ok(Some(true))) => summary.succeeded += 1,
            Ok(Ok(Some(false))) => summary.failed += 1,
            Ok(Ok(None)) => {},
            Ok(Err(e)) => {
                warn!(error = %e, "probe task returned an error");
                summary.failed += 1;
            },
            Err(e) => {
                warn!(error = %e, "probe task panicked");
                summary.failed += 1;
            },
        }
    }

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped_backoff = summary.skipped_backoff,
        unclassified = summary.unclassified,
        "poll cycle complete"
    );

    Ok(summary)
}

/// Static chore-type priority used by the chore-mode scheduler (spec §4.7).
fn chore_priority(chore_type: &str) -> u8 {
    match chore_type {
        "feed" => 10,
        "github" => 9,
        "bitbucket" => 9,
        "imap" => 8,
        "dirlist" => 6,
        "ftp" => 5,
        "html" => 4,
        _ => 0,
    }
}

struct ScheduledChore {
    due: i64,
    priority: u8,
    chore: ChoreDefinition,
}

impl PartialEq for ScheduledChore {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.priority == other.priority
    }
}
impl Eq for ScheduledChore {}

impl PartialOrd for ScheduledChore {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledChore {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; we want the *most overdue, highest
        // priority* chore first, so reverse `due` (earlier due = greater).
        other.due.cmp(&self.due).then(self.priority.cmp(&other.priority))
    }
}

/// Run the chore-mode event-emitting loop: a priority queue keyed on
/// `(status.updated + keep_interval, priority)`. When `keep_interval` is
/// `None`, the queue drains once; otherwise it runs until SIGINT.
pub async fn run_chore_loop(
    client: &Client,
    store: &Store,
    chores: Vec<ChoreDefinition>,
    keep_interval: Option<std::time::Duration>,
) -> Result<()> {
    let mut heap = BinaryHeap::new();
    for chore in chores {
        let status = store.get_chore_status(&chore.name).await?;
        let due = status.as_ref().and_then(|s| s.updated).unwrap_or(0);
        let priority = chore_priority(chore.descriptor.kind_name());
        heap.push(ScheduledChore { due, priority, chore });
    }

    let mut cancel = Box::pin(tokio::signal::ctrl_c());

    loop {
        let Some(ScheduledChore { chore, .. }) = heap.pop() else {
            break;
        };

        let prior_status = store.get_chore_status(&chore.name).await?;
        let outcome = probes::run(client, &chore.name, None, &chore.descriptor, prior_status.as_ref()).await;

        let now = Utc::now().timestamp();
        for event in &outcome.events {
            store.append_event(event).await?;
        }
        if let Some(release) = &outcome.release {
            store.upsert_release(release).await?;
        }
        store.set_chore_status(&chore.name, now, outcome.last_result.as_deref()).await?;
        if let Some(err) = &outcome.err {
            debug!(chore = %chore.name, err, "chore probe reported no update");
        }

        match keep_interval {
            Some(interval) => {
                let due = now + interval.as_secs() as i64;
                let priority = chore_priority(chore.descriptor.kind_name());
                heap.push(ScheduledChore { due, priority, chore });
            },
            None => {
                if heap.is_empty() {
                    break;
                }
            },
        }

        if keep_interval.is_some() {
            tokio::select! {
                _ = &mut cancel => {
                    info!("received interrupt, committing partial progress and exiting");
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_millis(1)) => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ranks_match_spec() {
        assert_eq!(chore_priority("feed"), 10);
        assert_eq!(chore_priority("github"), 9);
        assert_eq!(chore_priority("bitbucket"), 9);
        assert_eq!(chore_priority("imap"), 8);
        assert_eq!(chore_priority("dirlist"), 6);
        assert_eq!(chore_priority("ftp"), 5);
        assert_eq!(chore_priority("html"), 4);
    }

    #[test]
    fn scheduled_chore_orders_most_overdue_first() {
        let a = ScheduledChore {
            due: 100,
            priority: 5,
            chore: ChoreDefinition {
                name: "a".into(),
                descriptor: crate::classifier::ProbeDescriptor::Html { url: "x".into(), selector: None, regex: None },
            },
        };
        let b = ScheduledChore {
            due: 50,
            priority: 5,
            chore: ChoreDefinition {
                name: "b".into(),
                descriptor: crate::classifier::ProbeDescriptor::Html { url: "y".into(), selector: None, regex: None },
            },
        };
        let mut heap = BinaryHeap::new();
        heap.push(a);
        heap.push(b);
        assert_eq!(heap.pop().unwrap().chore.name, "b");
    }
}
