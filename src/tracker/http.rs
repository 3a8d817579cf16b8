use super::Error;
use crate::info_stopwatch;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, OnceLock};
use std::{fmt, str};

/// Bytes left as-is in query values: alphanumerics and `-_.~`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode raw bytes with uppercase hex digits.
pub fn url_encode(data: &[u8]) -> String {
    percent_encode(data, QUERY_VALUE).to_string()
}

/// Appends announce parameters to a path, starting the query with `?` or continuing an
/// existing one with `&`.
pub struct AnnouncePathBuilder {
    path: String,
    separator: char,
}

impl AnnouncePathBuilder {
    pub fn new(base_path: &str) -> Self {
        let mut path = String::with_capacity(base_path.len() + 160);
        path.push_str(base_path);
        let separator = if base_path.contains('?') { '&' } else { '?' };
        Self { path, separator }
    }

    pub fn info_hash(&mut self, data: &[u8]) -> &mut Self {
        self.append_bytes("info_hash", data)
    }

    pub fn peer_id(&mut self, data: &[u8]) -> &mut Self {
        self.append_bytes("peer_id", data)
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.append_display("port", port)
    }

    pub fn bytes_uploaded(&mut self, count: u64) -> &mut Self {
        self.append_display("uploaded", count)
    }

    pub fn bytes_downloaded(&mut self, count: u64) -> &mut Self {
        self.append_display("downloaded", count)
    }

    pub fn bytes_left(&mut self, count: u64) -> &mut Self {
        self.append_display("left", count)
    }

    pub fn event(&mut self, event: impl fmt::Display) -> &mut Self {
        self.append_display("event", event)
    }

    pub fn build(self) -> String {
        self.path
    }

    fn append_bytes(&mut self, name: &str, data: &[u8]) -> &mut Self {
        self.append_display(name, percent_encode(data, QUERY_VALUE))
    }

    fn append_display(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        use std::fmt::Write;
        let _ = write!(self.path, "{}{name}={value}", self.separator);
        self.separator = '&';
        self
    }
}

/// `/announce?info_hash=..&peer_id=..&port=..&uploaded=..&downloaded=..&left=..&event=..`
pub fn build_announce_path(
    info_hash: &[u8],
    peer_id: &[u8],
    port: u16,
    uploaded: u64,
    downloaded: u64,
    left: u64,
    event: &str,
) -> String {
    let mut builder = AnnouncePathBuilder::new("/announce");
    builder
        .info_hash(info_hash)
        .peer_id(peer_id)
        .port(port)
        .bytes_uploaded(uploaded)
        .bytes_downloaded(downloaded)
        .bytes_left(left)
        .event(event);
    builder.build()
}

/// Issue `GET path` over plain TCP and return the raw response, headers included.
pub fn send_http_request(host: &str, port: u16, path: &str) -> Result<Vec<u8>, Error> {
    let _sw = info_stopwatch!("GET http://{host}:{port}{path}");
    let mut stream = connect(host, port)?;
    write_request(&mut stream, host, path)?;
    read_until_closed(&mut stream)
}

/// Same as [`send_http_request`] but over TLS, verifying the server against the bundled
/// web PKI roots.
pub fn send_https_request(host: &str, port: u16, path: &str) -> Result<Vec<u8>, Error> {
    let _sw = info_stopwatch!("GET https://{host}:{port}{path}");
    let server_name =
        ServerName::try_from(host.to_owned()).map_err(|_| Error::InvalidServerName(host.to_owned()))?;
    let conn = ClientConnection::new(tls_config(), server_name)?;
    let mut stream = StreamOwned::new(conn, connect(host, port)?);

    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock).map_err(|source| Error::Connection {
            host: host.to_owned(),
            port,
            source,
        })?;
    }
    log::debug!("TLS session established with {host}:{port}");

    write_request(&mut stream, host, path)?;
    let response = read_until_closed(&mut stream)?;
    stream.conn.send_close_notify();
    let _ = stream.conn.complete_io(&mut stream.sock);
    Ok(response)
}

fn tls_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            Arc::new(ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
        })
        .clone()
}

fn connect(host: &str, port: u16) -> Result<TcpStream, Error> {
    let stream = TcpStream::connect((host, port)).map_err(|source| Error::Connection {
        host: host.to_owned(),
        port,
        source,
    })?;
    log::debug!("Connected to tracker {host}:{port}");
    Ok(stream)
}

fn write_request(stream: &mut impl Write, host: &str, path: &str) -> io::Result<()> {
    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes())?;
    stream.flush()
}

/// Largest raw tracker response accepted, headers included.
pub const MAX_RESPONSE_LEN: usize = 1024 * 1024;

fn read_until_closed(stream: &mut impl Read) -> Result<Vec<u8>, Error> {
    let mut response = Vec::with_capacity(4096);
    match stream.take(MAX_RESPONSE_LEN as u64 + 1).read_to_end(&mut response) {
        Ok(_) if response.len() > MAX_RESPONSE_LEN => Err(Error::Http(format!(
            "response longer than {MAX_RESPONSE_LEN} bytes"
        ))),
        Ok(_) => Ok(response),
        // servers that skip close_notify
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !response.is_empty() => {
            Ok(response)
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Status code and body of a raw HTTP/1.x response.
#[derive(Debug, PartialEq, Eq)]
pub struct HttpResponse<'a> {
    pub status: u16,
    pub body: &'a [u8],
}

/// Separate the status line and headers from the body. Chunked transfer encoding is not
/// decoded.
pub fn split_response(raw: &[u8]) -> Result<HttpResponse<'_>, Error> {
    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| Error::Http("no end of headers".to_owned()))?;
    let head = str::from_utf8(&raw[..header_end])
        .map_err(|_| Error::Http("headers are not valid UTF-8".to_owned()))?;

    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse::<u16>()
            .map_err(|_| Error::Http(format!("bad status line '{status_line}'")))?,
        _ => return Err(Error::Http(format!("bad status line '{status_line}'"))),
    };

    Ok(HttpResponse {
        status,
        body: &raw[header_end + 4..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_url_encode_escapes_binary_and_keeps_unreserved() {
        assert_eq!("%00%FF", url_encode(&[0x00, 0xff]));
        assert_eq!("aZ09-_.~", url_encode(b"aZ09-_.~"));
        assert_eq!("%20%2F%3F%26%3D", url_encode(b" /?&="));
    }

    #[test]
    fn test_build_announce_path() {
        let mut info_hash = [b'a'; 20];
        info_hash[0] = 0x00;
        info_hash[19] = 0xff;
        let peer_id = *b"-BL0001-abcdefABCDEF";

        let path = build_announce_path(&info_hash, &peer_id, 6881, 1, 2, 3, "started");
        assert_eq!(
            "/announce?info_hash=%00aaaaaaaaaaaaaaaaaa%FF&peer_id=-BL0001-abcdefABCDEF\
             &port=6881&uploaded=1&downloaded=2&left=3&event=started",
            path
        );
    }

    #[test]
    fn test_builder_continues_existing_query() {
        let mut builder = AnnouncePathBuilder::new("/ann?passkey=x");
        builder.port(1).bytes_left(0);
        assert_eq!("/ann?passkey=x&port=1&left=0", builder.build());
    }

    #[test]
    fn test_split_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nd8:intervali60ee";
        let response = split_response(raw).unwrap();
        assert_eq!(200, response.status);
        assert_eq!(b"d8:intervali60ee".as_slice(), response.body);

        let raw = b"HTTP/1.0 404 Not Found\r\n\r\n";
        let response = split_response(raw).unwrap();
        assert_eq!(404, response.status);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_split_response_rejects_garbage() {
        assert!(matches!(split_response(b"HTTP/1.1 200 OK\r\n"), Err(Error::Http(_))));
        assert!(matches!(split_response(b"SSH-2.0\r\n\r\n"), Err(Error::Http(_))));
        assert!(matches!(split_response(b"HTTP/1.1 abc\r\n\r\n"), Err(Error::Http(_))));
    }

    #[test]
    fn test_send_http_request_reads_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"\r\n\r\n") {
                let n = sock.read(&mut buf).unwrap();
                assert_ne!(0, n);
                request.extend_from_slice(&buf[..n]);
            }
            sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
            sock.write_all(b"d8:intervali900ee").unwrap();
            String::from_utf8(request).unwrap()
        });

        let response = send_http_request("127.0.0.1", port, "/announce?port=1").unwrap();
        assert_eq!(b"HTTP/1.1 200 OK\r\n\r\nd8:intervali900ee".as_slice(), response.as_slice());

        let request = server.join().unwrap();
        assert_eq!(
            "GET /announce?port=1 HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
            request
        );
    }

    #[test]
    fn test_endless_response_is_cut_off() {
        let result = read_until_closed(&mut io::repeat(b'x'));
        assert!(matches!(result, Err(Error::Http(_))), "{result:?}");

        let mut largest = io::repeat(b'x').take(MAX_RESPONSE_LEN as u64);
        assert_eq!(MAX_RESPONSE_LEN, read_until_closed(&mut largest).unwrap().len());
    }

    #[test]
    fn test_connection_failure_names_target() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        match send_http_request("127.0.0.1", port, "/") {
            Err(Error::Connection { host, port: p, .. }) => {
                assert_eq!("127.0.0.1", host);
                assert_eq!(port, p);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
