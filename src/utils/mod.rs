pub mod config;

/// Locating the remote peer before connecting.
pub mod discovery;

pub mod hex;
pub mod peer_id;
pub mod stopwatch;
pub mod time;
