use super::Error;
use crate::sec;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = sec!(15);

/// Connect to `host:port`, trying each resolved address in turn. The returned stream has
/// `TCP_NODELAY` set and no read timeout.
pub fn connect_to_peer(host: &str, port: u16) -> Result<TcpStream, Error> {
    let target = format!("{host}:{port}");
    let connection_error = |source| Error::Connection {
        addr: target.clone(),
        source,
    };

    let mut last_error =
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in (host, port).to_socket_addrs().map_err(connection_error)? {
        log::debug!("Connecting to {addr}...");
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(connection_error)?;
                log::info!("Connected to peer {addr}");
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("Failed to connect to {addr}: {e}");
                last_error = e;
            }
        }
    }
    Err(connection_error(last_error))
}
