//! Track duration probing
//!
//! Fetches the narration track (http(s) URL, `file://` URL or plain path)
//! and reads its duration from the container headers with symphonia.

use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Fetch a track and return its duration in milliseconds
pub async fn probe_duration(client: &reqwest::Client, url: &str) -> Result<u64> {
    let bytes = fetch_bytes(client, url).await?;
    let extension = extension_of(url);

    debug!(url = %url, bytes = bytes.len(), "Probing track duration");

    tokio::task::spawn_blocking(move || duration_from_bytes(bytes, extension.as_deref()))
        .await
        .map_err(|e| Error::Internal(format!("Probe task failed: {}", e)))?
}

/// Read track bytes from the network or the local filesystem
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::AudioPlayback(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AudioPlayback(format!(
                "Fetching {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::AudioPlayback(format!("Failed to read {}: {}", url, e)))?;
        return Ok(bytes.to_vec());
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::AudioPlayback(format!("Failed to read {}: {}", path, e)))
}

/// Probe an in-memory track
pub fn duration_from_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<u64> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::AudioPlayback(format!("Unrecognized audio format: {}", e)))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| Error::AudioPlayback("No audio track found".to_string()))?;

    let params = &track.codec_params;
    let n_frames = params
        .n_frames
        .ok_or_else(|| Error::AudioPlayback("Track length not declared".to_string()))?;

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(n_frames);
        return Ok(time.seconds * 1000 + (time.frac * 1000.0).round() as u64);
    }

    match params.sample_rate {
        Some(rate) if rate > 0 => Ok(n_frames * 1000 / rate as u64),
        _ => Err(Error::AudioPlayback("Track sample rate unknown".to_string())),
    }
}

/// Lower-case file extension of the URL path, ignoring query and fragment
fn extension_of(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
