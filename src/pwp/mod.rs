//! Peer wire protocol over a blocking stream: handshake, message framing, bitfields and the
//! wait for an unchoke.
mod handshake;
mod message;
mod tcp;
mod unchoke;

pub use handshake::{HANDSHAKE_LEN, Handshake, read_handshake, receive_handshake, send_handshake};
pub use message::{
    Bitfield, MAX_MSG_LEN, Message, MessageId, bitfield_from_payload, read_message,
    receive_bitfield, send_interested,
};
pub use tcp::connect_to_peer;
pub use unchoke::{PeerStream, UnchokePolicy, wait_for_unchoke, wait_for_unchoke_with_backlog};

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection closed: {0}")]
    ConnectionClosed(io::Error),
    #[error("failed to connect to {addr}: {source}")]
    Connection { addr: String, source: io::Error },
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::ConnectionClosed(source) | Error::Connection { source, .. } => source,
            Error::Protocol(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
        }
    }
}
