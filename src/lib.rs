//! Blocking BitTorrent building blocks: bencode, single-file metainfo, HTTP(S) tracker
//! announce and the peer wire handshake.
//!
//! Example usage: `src/bin/bitlite.rs`.

/// Bencode codec.
pub mod benc;

/// `.torrent` parsing, info-hash and torrent creation.
pub mod meta;

/// Peer wire protocol.
pub mod pwp;

/// HTTP(S) tracker client.
pub mod tracker;

/// Utility functions and types.
pub mod utils;
