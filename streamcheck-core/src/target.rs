//! Stream endpoint descriptors
//!
//! A push-style target is dialed over TCP before any player is launched, so its
//! host and port are split out up front. A pull-style target is only ever
//! fetched as a whole URL.

use std::fmt;

use serde::Serialize;
use url::{Host, Url};

use crate::{Error, Result};

const RTMP_DEFAULT_PORT: u16 = 1935;
const RTMPS_DEFAULT_PORT: u16 = 443;

/// Push-style target (e.g. `rtmp://live.example.com:1935/app/key`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushTarget {
    url: String,
    host: String,
    port: u16,
    path: String,
}

impl PushTarget {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host without IPv6 brackets, suitable for dialing
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Stream path below the server, e.g. `/app/key` (may be empty)
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port` as shown in logs
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Pull-style target (an HTTP playlist URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullTarget {
    url: String,
}

impl PullTarget {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamTarget {
    Push(PushTarget),
    Pull(PullTarget),
}

impl StreamTarget {
    /// Parse a stream URL, deciding its style from the scheme
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let parsed = Url::parse(raw)
            .map_err(|e| Error::InvalidInput(format!("invalid stream URL {raw}: {e}")))?;

        match parsed.scheme() {
            "rtmp" | "rtmps" => {
                let host = match parsed.host() {
                    Some(Host::Domain(domain)) => domain.to_string(),
                    Some(Host::Ipv4(addr)) => addr.to_string(),
                    Some(Host::Ipv6(addr)) => addr.to_string(),
                    None => {
                        return Err(Error::InvalidInput(format!("stream URL has no host: {raw}")))
                    }
                };
                let default_port = if parsed.scheme() == "rtmps" {
                    RTMPS_DEFAULT_PORT
                } else {
                    RTMP_DEFAULT_PORT
                };

                Ok(Self::Push(PushTarget {
                    url: raw.to_string(),
                    host,
                    port: parsed.port().unwrap_or(default_port),
                    path: parsed.path().to_string(),
                }))
            }
            "http" | "https" => Ok(Self::Pull(PullTarget {
                url: raw.to_string(),
            })),
            other => Err(Error::InvalidInput(format!(
                "unsupported stream scheme {other}: expected rtmp://, rtmps://, http:// or https://"
            ))),
        }
    }

    /// Parse a URL that must be push-style
    pub fn parse_push(raw: &str) -> Result<PushTarget> {
        match Self::parse(raw)? {
            Self::Push(target) => Ok(target),
            Self::Pull(_) => Err(Error::InvalidInput(format!(
                "expected an rtmp:// URL, got {raw}"
            ))),
        }
    }

    /// Parse a URL that must be pull-style
    pub fn parse_pull(raw: &str) -> Result<PullTarget> {
        match Self::parse(raw)? {
            Self::Pull(target) => Ok(target),
            Self::Push(_) => Err(Error::InvalidInput(format!(
                "expected an http(s):// playlist URL, got {raw}"
            ))),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Push(target) => target.url(),
            Self::Pull(target) => target.url(),
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}
