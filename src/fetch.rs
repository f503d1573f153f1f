// Fetching the source tables into the workspace.
use anyhow::{anyhow, Context, Result};
use log::info;
use rayon::prelude::*;
use reqwest::blocking::Client;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// A remote file and where it should live locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    pub target: PathBuf,
}

impl Download {
    /// Place the download in `dir` under the file name the URL ends with.
    pub fn into_dir(url: &str, dir: &Path) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid URL {url}"))?;
        let filename = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("URL {url} does not end in a file name"))?;
        Ok(Self {
            url: url.to_string(),
            target: dir.join(filename),
        })
    }
}

/// Blocking HTTP client for the source tables. Requests never time out; a
/// stalled download holds up the run rather than failing it.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(None)
        .build()
        .context("Could not build HTTP client")
}

/// Make sure `download.target` exists, fetching it only if it is missing.
///
/// Source file names embed a content hash, so an existing file is taken to
/// be complete. The body is written to a temporary file next to the target
/// and renamed into place, so an interrupted fetch never leaves a partial
/// target behind.
pub fn download_if_missing(client: &Client, download: &Download) -> Result<()> {
    let target = &download.target;
    if target.exists() {
        info!("{} already present, skipping download", target.display());
        return Ok(());
    }

    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("Could not create directory {}", dir.display()))?;

    info!("Downloading {}", download.url);
    let bytes = client
        .get(&download.url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::bytes)
        .with_context(|| format!("Failed to download {}", download.url))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Could not create temporary file in {}", dir.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("Could not write download of {}", download.url))?;
    tmp.persist(target)
        .with_context(|| format!("Could not save download to {}", target.display()))?;
    info!("Saved {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

/// Run every download on a pool of `workers` threads and wait for all of
/// them. The first failure is returned.
pub fn fetch_all(client: &Client, downloads: &[Download], workers: usize) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("download-{i}"))
        .build()?;
    pool.install(|| {
        downloads
            .par_iter()
            .try_for_each(|download| download_if_missing(client, download))
    })
}
