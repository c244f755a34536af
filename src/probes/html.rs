//! HTML selector probe: apply a CSS selector (optionally a regex capture
//! group over the matched text), diff against the previous poll's captured
//! text, emit an Event carrying the diff. Never emits a Release (spec §4.5
//! `html` row, `HTMLSelectorChore` in `piss/chores.py`).

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html as HtmlDoc, Selector};
use serde::{Deserialize, Serialize};

use crate::store::{ChoreStatus, NewEvent};

use super::ProbeOutcome;

/// `ChoreStatus.last_result` payload for this probe: JSON-wrapped so the
/// previous selection survives across polls (mirrors `ExtendedChoreStatus`).
#[derive(Debug, Serialize, Deserialize, Default)]
struct HtmlState {
    entries: Vec<String>,
}

pub async fn probe(
    client: &reqwest::Client,
    chore: &str,
    url: &str,
    selector: Option<&str>,
    regex: Option<&str>,
    prior_status: Option<&ChoreStatus>,
) -> Result<ProbeOutcome> {
    let response = client
        .get(url)
        .send()
        .await
        .context("fetching HTML selector target")?
        .error_for_status()
        .context("HTML selector target returned an error status")?;
    let body = crate::http::read_capped_text(response).await.context("reading HTML selector target body")?;

    let selector_str = selector.unwrap_or("body");
    let css = Selector::parse(selector_str).map_err(|e| anyhow::anyhow!("invalid CSS selector {selector_str:?}: {e:?}"))?;
    let document = HtmlDoc::parse_document(&body);

    let mut entries: Vec<String> = Vec::new();
    for el in document.select(&css) {
        let text: String = el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
        let captured = match regex {
            Some(pattern) => {
                let re = Regex::new(pattern).with_context(|| format!("invalid regex {pattern:?}"))?;
                re.captures(&text)
                    .and_then(|c| c.get(1).or_else(|| c.get(0)))
                    .map(|m| m.as_str().to_string())
            },
            None => Some(text),
        };
        if let Some(c) = captured {
            if !c.is_empty() {
                entries.push(c);
            }
        }
    }

    let prior_state: HtmlState = prior_status
        .and_then(|s| s.last_result.as_deref())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    let new_entries: Vec<&String> = entries.iter().filter(|e| !prior_state.entries.contains(e)).collect();

    let mut events = Vec::new();
    if !new_entries.is_empty() {
        let content = new_entries.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n");
        events.push(NewEvent {
            chore: chore.to_string(),
            category: "news".to_string(),
            time: chrono::Utc::now().timestamp(),
            title: format!("{chore}: selector update"),
            content: Some(content),
            url: Some(url.to_string()),
        });
    }

    let state = HtmlState { entries };
    let last_result = serde_json::to_string(&state).context("serializing HTML selector state")?;

    Ok(ProbeOutcome {
        release: None,
        events,
        last_result: Some(last_result),
        err: None,
    })
}
