use std::fmt;

use url::Url;

use crate::config::DEFAULT_PORT;
use crate::error::RtmpError;

/// A parsed `rtmp://host[:port]/app[/...]/stream` destination.
///
/// The last path segment (plus any query string) is the stream name; every
/// segment before it belongs to the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream: String,
}

impl RtmpUrl {
    pub fn parse(input: &str) -> Result<Self, RtmpError> {
        let invalid = |reason: &str| RtmpError::InvalidUrl {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "rtmp" {
            return Err(invalid("scheme must be rtmp"));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let path = url.path().trim_matches('/');
        let (app, stream) = path
            .rsplit_once('/')
            .ok_or_else(|| invalid("path must be /app/stream"))?;
        if app.is_empty() || stream.is_empty() {
            return Err(invalid("path must be /app/stream"));
        }

        let stream = match url.query() {
            Some(query) => format!("{stream}?{query}"),
            None => stream.to_string(),
        };

        Ok(Self {
            host,
            port,
            app: app.to_string(),
            stream,
        })
    }

    /// `host:port` for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The `tcUrl` sent with `connect`: everything up to the app name.
    pub fn tc_url(&self) -> String {
        if self.port == DEFAULT_PORT {
            format!("rtmp://{}/{}", self.host, self.app)
        } else {
            format!("rtmp://{}:{}/{}", self.host, self.port, self.app)
        }
    }
}

impl fmt::Display for RtmpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream)
    }
}
