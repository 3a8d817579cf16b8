use super::Error;
use crate::utils::hex::hex;
use std::io::{Read, Write};

pub const HANDSHAKE_LEN: usize = 68;

const PSTR: &[u8; 19] = b"BitTorrent protocol";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: &[u8; 20], peer_id: &[u8; 20]) -> Self {
        Self {
            reserved: [0u8; 8],
            info_hash: *info_hash,
            peer_id: *peer_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut buf = [0u8; HANDSHAKE_LEN];
        buf[0] = PSTR.len() as u8;
        buf[1..20].copy_from_slice(PSTR);
        buf[20..28].copy_from_slice(&self.reserved);
        buf[28..48].copy_from_slice(&self.info_hash);
        buf[48..68].copy_from_slice(&self.peer_id);
        buf
    }

    /// `None` unless the buffer starts with the 19-byte `BitTorrent protocol` identifier.
    pub fn from_bytes(buf: &[u8; HANDSHAKE_LEN]) -> Option<Self> {
        if buf[0] as usize != PSTR.len() || &buf[1..20] != PSTR {
            return None;
        }
        let mut handshake = Handshake::new(&[0u8; 20], &[0u8; 20]);
        handshake.reserved.copy_from_slice(&buf[20..28]);
        handshake.info_hash.copy_from_slice(&buf[28..48]);
        handshake.peer_id.copy_from_slice(&buf[48..68]);
        Some(handshake)
    }
}

/// Write the 68-byte handshake with all reserved bits cleared.
pub fn send_handshake<W: Write>(
    stream: &mut W,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
) -> Result<(), Error> {
    let buf = Handshake::new(info_hash, peer_id).to_bytes();
    stream.write_all(&buf).and_then(|_| stream.flush()).map_err(Error::ConnectionClosed)?;
    log::debug!("Handshake sent, info hash {}", hex(info_hash));
    Ok(())
}

/// Read a full handshake from the remote side. Short reads and a wrong protocol identifier
/// yield `None`.
pub fn read_handshake<R: Read>(stream: &mut R) -> Option<Handshake> {
    let mut buf = [0u8; HANDSHAKE_LEN];
    if let Err(e) = stream.read_exact(&mut buf) {
        log::warn!("Failed to read handshake: {e}");
        return None;
    }
    let Some(handshake) = Handshake::from_bytes(&buf) else {
        log::warn!(
            "Unexpected protocol identifier '{}'",
            String::from_utf8_lossy(&buf[1..=(buf[0] as usize).min(HANDSHAKE_LEN - 1)])
        );
        return None;
    };
    log::debug!(
        "Handshake received. Peer id: {}, info hash: {}",
        String::from_utf8_lossy(&handshake.peer_id),
        hex(&handshake.info_hash)
    );
    Some(handshake)
}

pub fn receive_handshake<R: Read>(stream: &mut R) -> bool {
    read_handshake(stream).is_some()
}
