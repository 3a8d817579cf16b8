pub mod creator;

use crate::benc::{self, ParseError, TypeMismatch};
use crate::utils::hex::hex;
use sha1_smol::Sha1;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fmt, fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid torrent format: {0}")]
    InvalidTorrentFormat(&'static str),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}': {source}")]
    WrongFieldType {
        field: &'static str,
        source: TypeMismatch,
    },
    #[error("field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("malformed bencode: {0}")]
    Malformed(#[from] ParseError),
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

/// Parsed single-file `.torrent`. Immutable; re-parse to get a new one.
///
/// Text fields keep their raw bytes, since older torrents are not always UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    announce: Vec<u8>,
    name: Vec<u8>,
    piece_length: usize,
    pieces: Vec<u8>,
    length: u64,
    info_hash: [u8; 20],
}

/// Decode `bytes` and build a [`Metainfo`] from them.
pub fn parse(bytes: &[u8]) -> Result<Metainfo, Error> {
    let bencode = benc::Element::from_bytes(bytes)?;
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("Metainfo content:\n{bencode}");
    }
    Metainfo::from_bencode(bencode)
}

/// SHA-1 of the canonically re-encoded `info` entry of the top-level dictionary in `bytes`.
pub fn compute_info_hash(bytes: &[u8]) -> Result<[u8; 20], Error> {
    let mut root = top_level_dictionary(benc::Element::from_bytes(bytes)?)?;
    let info = root.remove(b"info".as_slice()).ok_or(Error::MissingField("info"))?;
    Ok(info_hash_of(&info))
}

/// Read the file at `path` and compute its info-hash.
pub fn compute_info_hash_from_file(path: impl AsRef<Path>) -> Result<[u8; 20], Error> {
    compute_info_hash(&read_file(path.as_ref())?)
}

fn info_hash_of(info: &benc::Element) -> [u8; 20] {
    Sha1::from(info.to_bytes()).digest().bytes()
}

fn top_level_dictionary(
    bencode: benc::Element,
) -> Result<BTreeMap<Vec<u8>, benc::Element>, Error> {
    bencode
        .into_dict()
        .map_err(|_| Error::InvalidTorrentFormat("top-level value is not a dictionary"))
}

impl Metainfo {
    /// Read and parse a `.torrent` file.
    pub fn from_file(metainfo_file: impl AsRef<Path>) -> Result<Self, Error> {
        let path = metainfo_file.as_ref();
        log::info!("Input metainfo file: {}", path.display());
        parse(&read_file(path)?)
    }

    pub fn from_bencode(parsed: benc::Element) -> Result<Self, Error> {
        let mut root = top_level_dictionary(parsed)?;

        let info_element = root.remove(b"info".as_slice()).ok_or(Error::MissingField("info"))?;
        let info_hash = info_hash_of(&info_element);
        let info = info_element.into_dict().map_err(|source| Error::WrongFieldType {
            field: "info",
            source,
        })?;

        let announce = match root.get(b"announce".as_slice()) {
            Some(e) => bytes_field("announce", e)?,
            None => Vec::new(),
        };

        let name = bytes_field("name", required(&info, "name")?)?;

        let piece_length = integer_field("piece length", required(&info, "piece length")?)?;
        let piece_length = usize::try_from(piece_length)
            .ok()
            .filter(|len| *len > 0)
            .ok_or(Error::InvalidField {
                field: "piece length",
                reason: "must be positive",
            })?;

        let pieces = bytes_field("pieces", required(&info, "pieces")?)?;
        if pieces.len() % 20 != 0 {
            return Err(Error::InvalidField {
                field: "pieces",
                reason: "length is not a multiple of 20",
            });
        }

        let length = integer_field("length", required(&info, "length")?)?;
        let length = u64::try_from(length).map_err(|_| Error::InvalidField {
            field: "length",
            reason: "must not be negative",
        })?;

        Ok(Self {
            announce,
            name,
            piece_length,
            pieces,
            length,
            info_hash,
        })
    }

    /// Tracker URL, empty if the file has none. Invalid UTF-8 is replaced.
    pub fn announce(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.announce)
    }

    pub fn announce_bytes(&self) -> &[u8] {
        &self.announce
    }

    /// Suggested file name. Invalid UTF-8 is replaced.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Number of bytes in each piece.
    pub fn piece_length(&self) -> usize {
        self.piece_length
    }

    /// Concatenated 20-byte SHA-1 hashes, one per piece.
    pub fn pieces(&self) -> &[u8] {
        &self.pieces
    }

    pub fn piece_hashes(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.chunks_exact(20)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len() / 20
    }

    /// Length of the file in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// SHA-1 hash of the info dictionary.
    pub fn info_hash(&self) -> &[u8; 20] {
        &self.info_hash
    }
}

impl fmt::Display for Metainfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Announce URL: {}", self.announce())?;
        writeln!(f, "Name: {}", self.name())?;
        writeln!(f, "Piece Length: {}", self.piece_length)?;
        writeln!(f, "Total Length: {}", self.length)?;
        writeln!(f, "Pieces (SHA1s combined): {} bytes", self.pieces.len())?;
        write!(f, "Info Hash: {}", hex(&self.info_hash))
    }
}

fn required<'a>(
    dict: &'a BTreeMap<Vec<u8>, benc::Element>,
    field: &'static str,
) -> Result<&'a benc::Element, Error> {
    dict.get(field.as_bytes()).ok_or(Error::MissingField(field))
}

fn integer_field(field: &'static str, e: &benc::Element) -> Result<i64, Error> {
    e.as_int().map_err(|source| Error::WrongFieldType { field, source })
}

fn bytes_field(field: &'static str, e: &benc::Element) -> Result<Vec<u8>, Error> {
    e.as_bytes()
        .map(<[u8]>::to_vec)
        .map_err(|source| Error::WrongFieldType { field, source })
}
