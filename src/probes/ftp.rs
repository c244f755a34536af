//! FTP probe: `lstat` the target directory, short-circuit on unchanged
//! mtime, otherwise list and rank with `tarball_maxver`.
//!
//! Grounded on `FTPChore` in `piss/chores.py` (`ftputil.FTPHost`); `suppaftp`
//! is the ecosystem-standard async FTP client, wrapped the way the teacher
//! wraps other blocking subprocess calls via `tokio::task::spawn_blocking`
//! equivalents — here `suppaftp`'s `async` feature gives native async I/O
//! directly, so no blocking bridge is needed.

use anyhow::{Context, Result};
use suppaftp::AsyncFtpStream;
use url::Url;

use crate::store::{ChoreStatus, Release};
use crate::version::tarball::{tarball_maxver, TarballCandidate};

use super::ProbeOutcome;

pub async fn probe(
    package: &str,
    current_version: Option<&str>,
    url: &str,
    prefix: &str,
    prior_status: Option<&ChoreStatus>,
) -> Result<ProbeOutcome> {
    let parsed = Url::parse(url).context("parsing FTP URL")?;
    let host = parsed.host_str().context("FTP URL missing host")?;
    let port = parsed.port().unwrap_or(21);
    let path = parsed.path();

    let mut stream = AsyncFtpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to FTP host {host}"))?;
    stream
        .login("anonymous", "anonymous@")
        .await
        .context("logging in to FTP host")?;
    stream.cwd(path).await.with_context(|| format!("changing to FTP directory {path}"))?;

    // `MDTM` on the directory itself mirrors `ftputil`'s `lstat(dir).st_mtime`
    // short-circuit in the original: if the directory hasn't changed since
    // the last poll, skip the listing and scoring entirely.
    let mtime = stream.mdtm(path).await.ok().map(|dt| dt.and_utc().timestamp().to_string());
    if let (Some(mtime), Some(prior)) = (&mtime, prior_status.and_then(|s| s.last_result.as_deref())) {
        if mtime == prior {
            let _ = stream.quit().await;
            return Ok(ProbeOutcome {
                last_result: Some(mtime.clone()),
                ..Default::default()
            });
        }
    }

    let names = stream.nlst(None).await.context("listing FTP directory")?;
    let _ = stream.quit().await;

    let candidates: Vec<TarballCandidate> = names
        .into_iter()
        .map(|name| TarballCandidate {
            filename: name,
            updated: 0,
            description: None,
        })
        .collect();

    let origversion = current_version.unwrap_or("0");
    let Some((version, file)) = tarball_maxver(&candidates, prefix, origversion) else {
        return Ok(ProbeOutcome {
            last_result: mtime,
            ..ProbeOutcome::not_found()
        });
    };

    Ok(ProbeOutcome {
        release: Some(Release {
            package: package.to_string(),
            upstream_type: "ftp".to_string(),
            version: crate::version::normalize_release_version(package, &version),
            updated: chrono::Utc::now().timestamp(),
            url: format!("{}/{}", url.trim_end_matches('/'), file.filename),
        }),
        events: Vec::new(),
        last_result: mtime,
        err: None,
    })
}
