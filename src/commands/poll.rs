//! `puis poll <abbs-db> <piss-db>`: one detection + poll cycle over the
//! abbs catalog, followed by an Anitya mirror sync and name-link pass
//! (spec §6, the historical bare-invocation CLI form).

use anyhow::{Context, Result};
use tracing::info;

use crate::abbs::AbbsDb;
use crate::anitya;
use crate::http;
use crate::scheduler;
use crate::store::Store;

pub async fn poll(abbs_db: String, piss_db: String, concurrency: Option<usize>) -> Result<()> {
    let expanded_abbs = shellexpand::tilde(&abbs_db).to_string();
    let expanded_piss = shellexpand::tilde(&piss_db).to_string();

    let abbs = AbbsDb::open(&expanded_abbs)
        .await
        .with_context(|| format!("opening abbs database at {expanded_abbs}"))?;
    let store = Store::new(&expanded_piss)
        .await
        .with_context(|| format!("opening event store at {expanded_piss}"))?;
    let client = http::build_client(env!("CARGO_PKG_VERSION"), "https://example.org/puis")?;

    let packages = abbs.list_packages().await.context("listing abbs packages")?;
    info!(count = packages.len(), "loaded abbs package catalog");
    let package_names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();

    let concurrency = concurrency.unwrap_or_else(|| std::cmp::max(1, num_cpus::get() / 4));
    let summary = scheduler::poll_cycle(&client, &store, packages, concurrency).await?;
    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped_backoff = summary.skipped_backoff,
        unclassified = summary.unclassified,
        "detection + poll cycle complete"
    );

    let project_count = anitya::sync(&client, &store).await.context("syncing Anitya mirror")?;
    info!(project_count, "Anitya mirror sync complete");

    let projects = store.all_anitya_projects().await?;
    let links = anitya::detect_links(&package_names, &projects);
    for (package, project) in &links {
        store.link_package_to_project(package, project.id).await?;
    }
    info!(linked = links.len(), "Anitya name-link pass complete");

    Ok(())
}
