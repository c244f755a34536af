//! `puis check [-f term|text|atom|jinja2] [-n N] [-T tpl] [output]`: render
//! recent events in one of the supported formats (spec §6).

use anyhow::{Context, Result};

use crate::render::{self, OutputFormat};
use crate::store::Store;

pub async fn check(
    db_path: String,
    format: OutputFormat,
    limit: i64,
    template_path: Option<String>,
    output: Option<String>,
) -> Result<()> {
    let expanded_db = shellexpand::tilde(&db_path).to_string();
    let store = Store::new(&expanded_db)
        .await
        .with_context(|| format!("opening event store at {expanded_db}"))?;
    let events = store.recent_events(limit).await.context("loading recent events")?;

    let rendered = match format {
        OutputFormat::Term => render::render_term(&events),
        OutputFormat::Text => render::render_text(&events),
        OutputFormat::Atom => render::render_atom("urn:puis", "PUIS events", &events)?,
        OutputFormat::Jinja2 => {
            let template_path = template_path.context("jinja2 output format requires -T <template>")?;
            let template_source = tokio::fs::read_to_string(&template_path)
                .await
                .with_context(|| format!("reading template at {template_path}"))?;
            render::render_jinja2(&template_source, &events)?
        },
    };

    match output {
        Some(path) if path != "-" => {
            tokio::fs::write(&path, rendered)
                .await
                .with_context(|| format!("writing rendered output to {path}"))?;
        },
        _ => print!("{rendered}"),
    }

    Ok(())
}
