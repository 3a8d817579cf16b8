use super::{Error, read_file};
use crate::benc;
use crate::debug_stopwatch;
use sha1_smol::Sha1;
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

pub const DEFAULT_PIECE_LENGTH: usize = 16384;

/// Everything needed to emit a single-file `.torrent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// Tracker URL. May be empty for offline use.
    pub announce: String,
    pub name: String,
    pub length: u64,
    pub piece_length: usize,
    /// Concatenated 20-byte SHA-1 digests.
    pub piece_hashes: Vec<u8>,
}

impl TorrentFile {
    /// Hash the file at `path` and describe it, taking the name from the last path component.
    pub fn from_file(
        path: impl AsRef<Path>,
        announce: impl Into<String>,
        piece_length: usize,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let piece_length = NonZeroUsize::new(piece_length).ok_or(Error::InvalidField {
            field: "piece length",
            reason: "must be positive",
        })?;
        let content = read_file(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(Error::InvalidField {
                field: "name",
                reason: "input path has no file name",
            })?;

        Ok(Self {
            announce: announce.into(),
            name,
            length: content.len() as u64,
            piece_length: piece_length.get(),
            piece_hashes: compute_piece_hashes(&content, piece_length),
        })
    }
}

/// SHA-1 of each consecutive `piece_length` chunk (the last one may be shorter), concatenated
/// in order. Empty input yields an empty result.
pub fn compute_piece_hashes(data: &[u8], piece_length: NonZeroUsize) -> Vec<u8> {
    let _sw = debug_stopwatch!("Hashing {} bytes in pieces of {}", data.len(), piece_length);
    data.chunks(piece_length.get())
        .flat_map(|piece| Sha1::from(piece).digest().bytes())
        .collect()
}

/// Read the file at `path` and hash its pieces.
pub fn compute_file_piece_hashes(
    path: impl AsRef<Path>,
    piece_length: NonZeroUsize,
) -> Result<Vec<u8>, Error> {
    let content = read_file(path.as_ref())?;
    Ok(compute_piece_hashes(&content, piece_length))
}

/// Build `{"announce": .., "info": {"length", "name", "piece length", "pieces"}}`.
pub fn create_torrent_dict(file: &TorrentFile) -> benc::Element {
    let info: BTreeMap<Vec<u8>, benc::Element> = [
        (b"name".to_vec(), file.name.as_str().into()),
        (b"length".to_vec(), to_integer(file.length)),
        (b"piece length".to_vec(), to_integer(file.piece_length)),
        (b"pieces".to_vec(), file.piece_hashes.clone().into()),
    ]
    .into();

    let root: BTreeMap<Vec<u8>, benc::Element> = [
        (b"announce".to_vec(), file.announce.as_str().into()),
        (b"info".to_vec(), info.into()),
    ]
    .into();

    root.into()
}

// Sizes beyond i64::MAX cannot come from a real file.
fn to_integer(value: impl TryInto<i64>) -> benc::Element {
    benc::Element::Integer(value.try_into().unwrap_or(i64::MAX))
}

/// Encode `file` and write it to `output_path`. A failed write may leave a partial file.
pub fn write_torrent_file(output_path: impl AsRef<Path>, file: &TorrentFile) -> Result<(), Error> {
    let output_path = output_path.as_ref();
    let encoded = create_torrent_dict(file).to_bytes();
    fs::write(output_path, encoded).map_err(|source| Error::Io {
        path: output_path.to_owned(),
        source,
    })?;
    log::info!("Wrote {} ({} pieces)", output_path.display(), file.piece_hashes.len() / 20);
    Ok(())
}

/// Hash `input_file` and return the encoded `.torrent` content.
pub fn create_torrent(
    input_file: impl AsRef<Path>,
    announce: impl Into<String>,
    piece_length: usize,
) -> Result<Vec<u8>, Error> {
    let file = TorrentFile::from_file(input_file, announce, piece_length)?;
    Ok(create_torrent_dict(&file).to_bytes())
}
