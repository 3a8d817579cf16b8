use super::Error;
use bitvec::prelude::*;
use std::fmt;
use std::io::{Read, Write};

pub type Bitfield = BitVec<u8, Msb0>;

/// Upper bound on the declared length of an incoming message.
pub const MAX_MSG_LEN: usize = 1024 * 1024;

const ID_CHOKE: u8 = 0;
const ID_UNCHOKE: u8 = 1;
const ID_INTERESTED: u8 = 2;
const ID_NOT_INTERESTED: u8 = 3;
const ID_HAVE: u8 = 4;
const ID_BITFIELD: u8 = 5;
const ID_REQUEST: u8 = 6;
const ID_PIECE: u8 = 7;
const ID_CANCEL: u8 = 8;
const ID_PORT: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Port,
    /// Extension messages and anything else this client does not interpret.
    Unknown(u8),
}

impl MessageId {
    pub fn from_byte(id: u8) -> Self {
        match id {
            ID_CHOKE => MessageId::Choke,
            ID_UNCHOKE => MessageId::Unchoke,
            ID_INTERESTED => MessageId::Interested,
            ID_NOT_INTERESTED => MessageId::NotInterested,
            ID_HAVE => MessageId::Have,
            ID_BITFIELD => MessageId::Bitfield,
            ID_REQUEST => MessageId::Request,
            ID_PIECE => MessageId::Piece,
            ID_CANCEL => MessageId::Cancel,
            ID_PORT => MessageId::Port,
            other => MessageId::Unknown(other),
        }
    }

    /// Wire id, `None` for keep-alive which has none.
    pub fn to_byte(self) -> Option<u8> {
        Some(match self {
            MessageId::KeepAlive => return None,
            MessageId::Choke => ID_CHOKE,
            MessageId::Unchoke => ID_UNCHOKE,
            MessageId::Interested => ID_INTERESTED,
            MessageId::NotInterested => ID_NOT_INTERESTED,
            MessageId::Have => ID_HAVE,
            MessageId::Bitfield => ID_BITFIELD,
            MessageId::Request => ID_REQUEST,
            MessageId::Piece => ID_PIECE,
            MessageId::Cancel => ID_CANCEL,
            MessageId::Port => ID_PORT,
            MessageId::Unknown(id) => id,
        })
    }
}

/// One length-prefixed peer message.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    length: u32,
    id: MessageId,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        match id {
            MessageId::KeepAlive => Self::keep_alive(),
            _ => Self {
                length: u32::try_from(payload.len() + 1).unwrap_or(u32::MAX),
                id,
                payload,
            },
        }
    }

    pub fn keep_alive() -> Self {
        Self {
            length: 0,
            id: MessageId::KeepAlive,
            payload: Vec::new(),
        }
    }

    pub fn unchoke() -> Self {
        Self::new(MessageId::Unchoke, Vec::new())
    }

    pub fn interested() -> Self {
        Self::new(MessageId::Interested, Vec::new())
    }

    pub fn have(piece_index: u32) -> Self {
        Self::new(MessageId::Have, piece_index.to_be_bytes().to_vec())
    }

    /// Spare bits in the last byte are sent as zeros.
    pub fn bitfield(bitfield: &Bitfield) -> Self {
        let mut bits = bitfield.clone();
        bits.set_uninitialized(false);
        Self::new(MessageId::Bitfield, bits.into_vec())
    }

    /// Payload size + 1, or 0 for keep-alive.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serialize and write in a single `write_all`.
    pub fn write_to<W: Write>(&self, dst: &mut W) -> Result<(), Error> {
        let mut buf = Vec::with_capacity(4 + self.length as usize);
        buf.extend_from_slice(&self.length.to_be_bytes());
        if let Some(id) = self.id.to_byte() {
            buf.push(id);
            buf.extend_from_slice(&self.payload);
        }
        dst.write_all(&buf).and_then(|_| dst.flush()).map_err(Error::ConnectionClosed)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{} bytes]", self.id, self.payload.len())
    }
}

fn read_u32_from<R: Read>(src: &mut R) -> Result<u32, Error> {
    let mut bytes = [0u8; 4];
    src.read_exact(&mut bytes).map_err(Error::ConnectionClosed)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Read one message. A zero length prefix is a keep-alive and nothing more is read. Any short
/// read is reported as [`Error::ConnectionClosed`].
pub fn read_message<R: Read>(src: &mut R) -> Result<Message, Error> {
    let length = read_u32_from(src)?;
    if length == 0 {
        return Ok(Message::keep_alive());
    }
    if length as usize > MAX_MSG_LEN {
        return Err(Error::Protocol(format!("too long message received: {length} bytes")));
    }

    let id = {
        let mut id_byte = [0u8; 1];
        src.read_exact(&mut id_byte).map_err(Error::ConnectionClosed)?;
        MessageId::from_byte(id_byte[0])
    };
    let mut payload = vec![0u8; length as usize - 1];
    src.read_exact(&mut payload).map_err(Error::ConnectionClosed)?;

    log::trace!("Received {id:?} with {} payload bytes", payload.len());
    Ok(Message {
        length,
        id,
        payload,
    })
}

/// Send `interested`. Failures are logged and reported as `false`.
pub fn send_interested<W: Write>(dst: &mut W) -> bool {
    match Message::interested().write_to(dst) {
        Ok(()) => {
            log::debug!("Sent interested");
            true
        }
        Err(e) => {
            log::warn!("Failed to send interested: {e}");
            false
        }
    }
}

/// Unpack `payload` most-significant bit first, keeping at most `num_pieces` bits.
pub fn bitfield_from_payload(payload: &[u8], num_pieces: usize) -> Bitfield {
    let mut bitfield = Bitfield::from_slice(payload);
    bitfield.truncate(num_pieces);
    bitfield
}

/// Read the next message and decode it as a bitfield. Anything other than a readable bitfield
/// message yields an empty result.
pub fn receive_bitfield<R: Read>(src: &mut R, num_pieces: usize) -> Bitfield {
    match read_message(src) {
        Ok(msg) if msg.id() == MessageId::Bitfield => {
            let bitfield = bitfield_from_payload(msg.payload(), num_pieces);
            log::debug!(
                "Received bitfield: {} of {} pieces available",
                bitfield.count_ones(),
                bitfield.len()
            );
            bitfield
        }
        Ok(msg) => {
            log::warn!("Expected bitfield, received {msg:?}");
            Bitfield::new()
        }
        Err(e) => {
            log::warn!("Failed to receive bitfield: {e}");
            Bitfield::new()
        }
    }
}
