//! `puis generate`: emit a `chores.yaml` from the abbs catalog, merging
//! against an existing config when one is given (spec.md §B.1, the
//! original's `generate_chore_config`).

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::abbs::AbbsDb;
use crate::classifier::detect_upstream;
use crate::config::{self, ChoreDefinition};

pub async fn generate(abbs_db: String, existing_config: Option<String>, output: Option<String>) -> Result<()> {
    let expanded_abbs = shellexpand::tilde(&abbs_db).to_string();
    let abbs = AbbsDb::open(&expanded_abbs)
        .await
        .with_context(|| format!("opening abbs database at {expanded_abbs}"))?;
    let packages = abbs.list_packages().await.context("listing abbs packages")?;

    let mut generated = Vec::new();
    for package in &packages {
        let Some(url) = package.source_url.as_deref() else {
            continue;
        };
        match detect_upstream(&package.name, package.source_kind, url, package.current_version.as_deref()) {
            Some(descriptor) => generated.push(ChoreDefinition {
                name: package.name.clone(),
                descriptor,
            }),
            None => warn!(package = %package.name, "can't detect upstream, omitting from generated config"),
        }
    }
    info!(generated = generated.len(), total = packages.len(), "generated chore definitions");

    let chores = if let Some(path) = existing_config {
        let expanded = shellexpand::tilde(&path).to_string();
        let existing_yaml = tokio::fs::read_to_string(&expanded)
            .await
            .with_context(|| format!("reading existing chore config at {expanded}"))?;
        let existing = config::parse_chores(&existing_yaml)?;
        config::merge_chores(generated, existing)
    } else {
        generated
    };

    let yaml = config::render_chores(&chores)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, yaml)
                .await
                .with_context(|| format!("writing chore config to {path}"))?;
        },
        None => print!("{yaml}"),
    }

    Ok(())
}
