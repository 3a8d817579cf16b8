pub mod http;
pub mod url;
mod utils;

use crate::benc::{self, ParseError};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::{fmt, io, str};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("invalid TLS server name '{0}'")]
    InvalidServerName(String),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad HTTP response: {0}")]
    Http(String),
    #[error("tracker failure: {0}")]
    Response(String),
    #[error("malformed tracker response: {0}")]
    Malformed(#[from] ParseError),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Connection { source, .. } | Error::Io(source) => source,
            other => io::Error::other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnounceEvent {
    #[default]
    Started,
    Stopped,
    Completed,
}

impl AnnounceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnounceEvent::Started => "started",
            AnnounceEvent::Stopped => "stopped",
            AnnounceEvent::Completed => "completed",
        }
    }
}

impl fmt::Display for AnnounceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnounceEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(AnnounceEvent::Started),
            "stopped" => Ok(AnnounceEvent::Stopped),
            "completed" => Ok(AnnounceEvent::Completed),
            other => Err(format!("unknown announce event '{other}'")),
        }
    }
}

/// Client state reported to the tracker.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: AnnounceEvent,
}

impl AnnounceRequest {
    /// `base_path` with the announce parameters appended to its query.
    pub fn to_path(&self, base_path: &str) -> String {
        let mut builder = http::AnnouncePathBuilder::new(base_path);
        builder
            .info_hash(&self.info_hash)
            .peer_id(&self.peer_id)
            .port(self.port)
            .bytes_uploaded(self.uploaded)
            .bytes_downloaded(self.downloaded)
            .bytes_left(self.left)
            .event(self.event);
        builder.build()
    }
}

/// Decoded body of an announce response.
pub struct AnnounceResponse {
    root: BTreeMap<String, benc::Element>,
}

impl AnnounceResponse {
    pub fn from_bytes(body: &[u8]) -> Result<Self, Error> {
        let root = benc::Element::from_bytes(body)?
            .into_dict()
            .map_err(|_| Error::Http("response body is not a dictionary".to_owned()))?;
        Ok(Self {
            root: benc::convert_dictionary(root),
        })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.get_str("failure reason")
    }

    pub fn warning_message(&self) -> Option<&str> {
        self.get_str("warning message")
    }

    pub fn interval(&self) -> Option<usize> {
        self.get_usize("interval")
    }

    pub fn complete(&self) -> Option<usize> {
        self.get_usize("complete")
    }

    pub fn incomplete(&self) -> Option<usize> {
        self.get_usize("incomplete")
    }

    /// Peers in either the compact (6 bytes each) or the dictionary-list form.
    pub fn peers(&self) -> Option<Vec<SocketAddr>> {
        match self.root.get("peers") {
            Some(benc::Element::List(list)) => Some(utils::parse_dictionary_peers(list).collect()),
            Some(benc::Element::ByteString(data)) => {
                Some(utils::parse_binary_ipv4_peers(data).collect())
            }
            _ => None,
        }
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        match self.root.get(key) {
            Some(benc::Element::ByteString(data)) => str::from_utf8(data).ok(),
            _ => None,
        }
    }

    fn get_usize(&self, key: &str) -> Option<usize> {
        match self.root.get(key) {
            Some(benc::Element::Integer(value)) => usize::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AnnounceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.root {
            match (key.as_str(), value) {
                ("peers", _) => {
                    write!(f, "peers:")?;
                    for peer in self.peers().unwrap_or_default() {
                        write!(f, " {peer}")?;
                    }
                    writeln!(f)?;
                }
                (_, benc::Element::ByteString(data)) => {
                    writeln!(f, "{key}: {}", String::from_utf8_lossy(data))?
                }
                (_, benc::Element::Integer(value)) => writeln!(f, "{key}: {value}")?,
                _ => writeln!(f, "{key}: <{}>", value.kind())?,
            }
        }
        Ok(())
    }
}

/// Announce `request` to the tracker at `announce_url` over HTTP or HTTPS and decode the reply.
/// A `failure reason` in the reply is reported as [`Error::Response`].
pub fn announce(announce_url: &str, request: &AnnounceRequest) -> Result<AnnounceResponse, Error> {
    let target = url::split_announce_url(announce_url);
    let path = request.to_path(&target.path);
    log::debug!("Announcing '{}' to {target}", request.event);

    let raw = if target.is_https() {
        http::send_https_request(&target.host, target.port, &path)?
    } else {
        http::send_http_request(&target.host, target.port, &path)?
    };

    let response = http::split_response(&raw)?;
    if response.status != 200 {
        return Err(Error::Http(format!("status {}", response.status)));
    }
    let content = AnnounceResponse::from_bytes(response.body)?;
    if let Some(reason) = content.failure_reason() {
        return Err(Error::Response(reason.to_owned()));
    }
    if let Some(warning) = content.warning_message() {
        log::warn!("Tracker {} warns: {warning}", target.host);
    }
    log::info!(
        "Tracker {} replied with {} peers, interval {:?}",
        target.host,
        content.peers().map_or(0, |peers| peers.len()),
        content.interval()
    );
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_parse_compact_response() {
        let body = b"d8:completei5e10:incompletei3e8:intervali1800e5:peers12:\x7f\x00\x00\x01\x1a\xe1\xc0\xa8\x01\x02\x00\x50e";
        let response = AnnounceResponse::from_bytes(body).unwrap();
        assert_eq!(Some(5), response.complete());
        assert_eq!(Some(3), response.incomplete());
        assert_eq!(Some(1800), response.interval());
        assert_eq!(None, response.failure_reason());
        assert_eq!(
            Some(vec![
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6881),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)), 80),
            ]),
            response.peers()
        );
    }

    #[test]
    fn test_parse_dictionary_peers() {
        let body = b"d8:intervali60e5:peersld2:ip8:10.0.0.17:peer id20:-BL0001-aaaaaaaaaaaa4:porti6881eed2:ip4:\x0a\x00\x00\x024:porti51413eeee";
        let response = AnnounceResponse::from_bytes(body).unwrap();
        assert_eq!(
            Some(vec![
                "10.0.0.1:6881".parse().unwrap(),
                "10.0.0.2:51413".parse().unwrap(),
            ]),
            response.peers()
        );
    }

    #[test]
    fn test_failure_and_warning_are_exposed() {
        let body = b"d14:failure reason12:unregistered15:warning message4:slowe";
        let response = AnnounceResponse::from_bytes(body).unwrap();
        assert_eq!(Some("unregistered"), response.failure_reason());
        assert_eq!(Some("slow"), response.warning_message());
        assert_eq!(None, response.peers());
    }

    #[test]
    fn test_non_dictionary_body_is_rejected() {
        assert!(matches!(AnnounceResponse::from_bytes(b"le"), Err(Error::Http(_))));
        assert!(matches!(AnnounceResponse::from_bytes(b"<html>"), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_request_path_uses_base_path() {
        let request = AnnounceRequest {
            info_hash: [0xff; 20],
            peer_id: *b"-BL0001-000000000000",
            port: 6881,
            uploaded: 0,
            downloaded: 0,
            left: 20000,
            event: AnnounceEvent::Completed,
        };
        let path = request.to_path("/tr/announce");
        assert!(path.starts_with("/tr/announce?info_hash=%FF%FF"), "{path}");
        assert!(path.ends_with("&left=20000&event=completed"), "{path}");
        assert_eq!(
            http::build_announce_path(
                &request.info_hash,
                &request.peer_id,
                6881,
                0,
                0,
                20000,
                "completed"
            ),
            request.to_path("/announce")
        );
    }

    #[test]
    fn test_announce_event_names() {
        for event in [AnnounceEvent::Started, AnnounceEvent::Stopped, AnnounceEvent::Completed] {
            assert_eq!(Ok(event), event.to_string().parse());
        }
        assert!("paused".parse::<AnnounceEvent>().is_err());
    }
}
