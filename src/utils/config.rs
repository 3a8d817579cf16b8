//! Settings file (JSON):
//! ```text
//! {
//!     "listen_port": 6881,
//!     "piece_length": 16384,
//!     "event": "started",
//!     "unchoke_attempts": 3,
//!     "unchoke_timeout_secs": 10,
//!     "interface": "wlo1"
//! }
//! ```
//! Every field is optional. A missing file yields the defaults.
use crate::pwp::UnchokePolicy;
use crate::sec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fs, io};

pub const FILENAME: &str = ".bitlite.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_port: u16,
    pub piece_length: usize,
    pub event: String,
    pub unchoke_attempts: usize,
    pub unchoke_timeout_secs: u64,
    pub interface: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 6881,
            piece_length: 16384,
            event: "started".to_owned(),
            unchoke_attempts: 3,
            unchoke_timeout_secs: 10,
            interface: "wlo1".to_owned(),
        }
    }
}

impl Config {
    pub fn unchoke_policy(&self) -> UnchokePolicy {
        UnchokePolicy {
            attempts: self.unchoke_attempts,
            timeout: sec!(self.unchoke_timeout_secs),
            ..Default::default()
        }
    }
}

pub fn load_config(filepath: impl AsRef<Path>) -> io::Result<Config> {
    match fs::read(filepath.as_ref()) {
        Ok(buf) => {
            let config = serde_json::from_slice(&buf)?;
            log::debug!("Loaded config from {}: {config:?}", filepath.as_ref().display());
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e),
    }
}

pub fn save_config(filepath: impl AsRef<Path>, config: &Config) -> io::Result<()> {
    let json_bytes = serde_json::to_vec_pretty(config)?;
    fs::write(filepath, json_bytes)?;
    Ok(())
}
