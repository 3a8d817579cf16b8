use std::fmt;
use url::{Position, Url};

const DEFAULT_PATH: &str = "/announce";

/// Components of a tracker announce URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceUrl {
    /// Scheme as written, e.g. `http` or `https`. Empty if the URL could not be parsed.
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Path plus query, if any.
    pub path: String,
}

impl Default for AnnounceUrl {
    fn default() -> Self {
        Self {
            protocol: String::new(),
            host: String::new(),
            port: 80,
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

impl AnnounceUrl {
    pub fn is_https(&self) -> bool {
        self.protocol == "https"
    }
}

impl fmt::Display for AnnounceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.protocol, self.host, self.port, self.path)
    }
}

/// Split `scheme://host[:port][path]`. Port defaults to 443 for https and 80 otherwise, path
/// defaults to `/announce`. Anything unparsable yields [`AnnounceUrl::default`] instead of an
/// error.
pub fn split_announce_url(announce_url: &str) -> AnnounceUrl {
    let Ok(url) = Url::parse(announce_url) else {
        log::warn!("Unparsable announce URL '{announce_url}', using defaults");
        return AnnounceUrl::default();
    };
    let Some(host) = url.host_str() else {
        log::warn!("Announce URL '{announce_url}' has no host, using defaults");
        return AnnounceUrl::default();
    };

    let protocol = url.scheme().to_owned();
    let port = url.port().unwrap_or(if protocol == "https" { 443 } else { 80 });

    // the parser turns a missing path into "/" for http(s)
    let path = match &url[Position::BeforePath..] {
        "" => DEFAULT_PATH,
        "/" if !has_explicit_path(announce_url) => DEFAULT_PATH,
        path => path,
    };

    AnnounceUrl {
        protocol,
        host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
        port,
        path: path.to_owned(),
    }
}

fn has_explicit_path(announce_url: &str) -> bool {
    announce_url
        .split_once("://")
        .is_some_and(|(_, after_scheme)| after_scheme.contains('/'))
}
