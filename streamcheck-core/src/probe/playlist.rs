use std::time::Duration;

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::{Error, Result};

/// Fetches a playlist and looks for a segment reference in its body.
///
/// This is a presence heuristic, not manifest parsing: any body containing the
/// segment marker counts, even when the marker shows up incidentally.
#[derive(Debug, Clone)]
pub struct PlaylistProbe {
    client: reqwest::Client,
    segment_marker: String,
}

impl PlaylistProbe {
    pub fn new(segment_marker: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, segment_marker))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, segment_marker: impl Into<String>) -> Self {
        Self {
            client,
            segment_marker: segment_marker.into(),
        }
    }

    /// `true` iff the playlist answers 200 OK and its body mentions a segment
    pub async fn probe(&self, url: &str) -> bool {
        match self.fetch(url).await {
            Ok(body) => {
                let up = body.contains(&self.segment_marker);
                if up {
                    info!(url = %url, "Playlist lists segments, stream is up");
                } else {
                    warn!(url = %url, marker = %self.segment_marker, "Playlist has no segments, stream is down");
                }
                up
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Playlist fetch failed");
                false
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Transport(format!("playlist not found, HTTP status {status}")));
        }

        Ok(response.text().await?)
    }
}
