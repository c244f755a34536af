//! Shared HTTP client construction for the probe adapters.
//!
//! Grounded on the `reqwest::Client` construction in the teacher's
//! `github/mod.rs`/`gitlab/mod.rs` (fixed headers, explicit timeout), scaled
//! up to the response-size cap spec §5 requires.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

/// Hard cap on any single probe response body (spec §5).
pub const HARD_BODY_CAP_BYTES: usize = 50 * 1024 * 1024;
/// Above this, HTML parsing is skipped in favor of regex-only extraction.
pub const SOFT_BODY_CAP_BYTES: usize = 1024 * 1024;

/// Build the pooled client every probe shares. `homepage` and `version` are
/// folded into the fixed User-Agent string, matching
/// `Mozilla/5.0 (compatible; PUIS/<ver>; +<homepage>)`.
pub fn build_client(version: &str, homepage: &str) -> Result<Client> {
    let user_agent = format!("Mozilla/5.0 (compatible; PUIS/{version}; +{homepage})");
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(20))
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("building shared HTTP client")
}

/// Stream a response body, aborting once [`HARD_BODY_CAP_BYTES`] is
/// exceeded rather than buffering an unbounded reply.
pub async fn read_capped_body(response: reqwest::Response) -> Result<Vec<u8>> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading response body")?;
        buf.extend_from_slice(&chunk);
        if buf.len() > HARD_BODY_CAP_BYTES {
            anyhow::bail!("response body exceeded {HARD_BODY_CAP_BYTES} byte cap");
        }
    }
    Ok(buf)
}

/// [`read_capped_body`], decoded as UTF-8 (lossily, matching `Response::text`'s
/// own leniency) rather than buffered without a cap.
pub async fn read_capped_text(response: reqwest::Response) -> Result<String> {
    let bytes = read_capped_body(response).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// [`read_capped_body`], parsed as JSON rather than buffered without a cap.
pub async fn read_capped_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = read_capped_body(response).await?;
    serde_json::from_slice(&bytes).context("parsing capped JSON response body")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_embeds_version_and_homepage() {
        let client = build_client("0.1.0", "https://example.invalid").unwrap();
        // reqwest doesn't expose the built UA directly; this just asserts
        // construction succeeds with the expected inputs.
        drop(client);
    }
}
