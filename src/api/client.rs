//! Blocking upload worker for the parse service (feature-gated).

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use serde::Deserialize;

use super::{ParseResponse, UploadOutcome};
use crate::persistence::settings::AppSettings;

// FastAPI-style error body; anything else falls back to the status line
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Spawn a worker thread that uploads `path` to the parse service and report
/// the terminal outcome on the returned channel. Fire-and-forget from the
/// GUI's perspective: the caller drains the receiver once per frame and never
/// blocks on it.
pub fn spawn_upload(path: PathBuf, cfg: &AppSettings) -> Receiver<UploadOutcome> {
    let (tx, rx) = std::sync::mpsc::channel();
    let url = cfg.parse_url();
    // Generous bound: parsing plus cost calculation on a large model can
    // take minutes. A timeout is reported like any other server failure.
    let timeout = Duration::from_secs(cfg.parse_timeout_secs.max(1));
    std::thread::spawn(move || {
        let outcome = match upload(&url, &path, timeout) {
            Ok(parsed) => UploadOutcome::Parsed(parsed),
            Err(e) => UploadOutcome::Failed(e.to_string()),
        };
        // Receiver may be gone if the app shut down mid-upload
        let _ = tx.send(outcome);
    });
    rx
}

fn upload(url: &str, path: &PathBuf, timeout: Duration) -> anyhow::Result<ParseResponse> {
    log::info!("uploading {} to {}", path.display(), url);
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let form = reqwest::blocking::multipart::Form::new().file("file", path)?;
    let response = client.post(url).multipart(form).send()?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.detail,
            Err(_) if !text.is_empty() => text,
            Err(_) => status.to_string(),
        };
        log::warn!("parse service rejected {}: {}", path.display(), message);
        anyhow::bail!("{}", message);
    }

    let parsed: ParseResponse = response.json()?;
    log::info!(
        "parse service returned {} elements (costs_calculated={})",
        parsed.element_count,
        parsed.costs_calculated
    );
    Ok(parsed)
}
