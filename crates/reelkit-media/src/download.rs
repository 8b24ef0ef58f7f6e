//! Blob download to local scratch space.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Download a blob URL to `dest`. `file://` URLs are copied locally so the
/// pipeline has a uniform entry point in tests and dev.
pub async fn download_to(url: &str, dest: impl AsRef<Path>) -> MediaResult<()> {
    let dest = dest.as_ref();

    if let Some(path) = url.strip_prefix("file://") {
        tokio::fs::copy(path, dest).await.map_err(|e| {
            MediaError::download_failed(format!("local copy from {path} failed: {e}"))
        })?;
        debug!(url = %url, dest = %dest.display(), "Copied local blob");
        return Ok(());
    }

    let response = reqwest::get(url)
        .await
        .map_err(|e| MediaError::download_failed(format!("GET {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(MediaError::download_failed(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| MediaError::download_failed(format!("stream read failed: {e}")))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;

    if written == 0 {
        return Err(MediaError::download_failed(format!("{url} was empty")));
    }

    info!(url = %url, bytes = written, dest = %dest.display(), "Download complete");
    Ok(())
}
