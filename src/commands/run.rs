//! `puis run [-k minutes] [-d db] [-c chores.yaml]`: drive the chore-mode
//! event-emitting poll loop (spec §6).

use anyhow::{Context, Result};
use tracing::info;

use crate::config;
use crate::http;
use crate::scheduler;
use crate::store::Store;

pub async fn run(
    chores_path: String,
    db_path: String,
    keep_interval_minutes: Option<u64>,
) -> Result<()> {
    let expanded_db = shellexpand::tilde(&db_path).to_string();
    let expanded_chores = shellexpand::tilde(&chores_path).to_string();

    let yaml = tokio::fs::read_to_string(&expanded_chores)
        .await
        .with_context(|| format!("reading chore config at {expanded_chores}"))?;
    let chores = config::parse_chores(&yaml)?;
    info!(count = chores.len(), "loaded chore config");

    let store = Store::new(&expanded_db)
        .await
        .with_context(|| format!("opening event store at {expanded_db}"))?;
    let client = http::build_client(env!("CARGO_PKG_VERSION"), "https://example.org/puis")?;

    let keep_interval = keep_interval_minutes.map(|m| std::time::Duration::from_secs(m * 60));
    scheduler::run_chore_loop(&client, &store, chores, keep_interval).await?;

    info!("chore loop exited cleanly");
    Ok(())
}
