use core::fmt;
use derive_more::Deref;
use rand::Rng;

/// 20-byte client identity sent to trackers and peers: `-BL0001-` followed by 12 random
/// base62 characters.
#[derive(Clone, Copy, PartialEq, Eq, Deref)]
pub struct PeerId([u8; 20]); // immutable wrapper

const PREFIX: &[u8; 8] = b"-BL0001-";
const CHARSET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

impl PeerId {
    pub fn generate_new() -> Self {
        let mut ret = [0u8; 20];
        ret[..PREFIX.len()].copy_from_slice(PREFIX);

        let mut rng = rand::rng();
        for b in &mut ret[PREFIX.len()..] {
            *b = CHARSET[rng.random_range(0..CHARSET.len())];
        }
        Self(ret)
    }
}

/// Same as [`PeerId::generate_new`], as raw bytes.
pub fn generate_peer_id() -> [u8; 20] {
    *PeerId::generate_new()
}

impl From<&[u8; 20]> for PeerId {
    fn from(value: &[u8; 20]) -> Self {
        Self(*value)
    }
}

impl From<[u8; 20]> for PeerId {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from_utf8_lossy(&self.0).fmt(f)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_peer_id_has_prefix_and_base62_suffix() {
        let id = PeerId::generate_new();
        assert_eq!(20, id.len());
        assert_eq!(b"-BL0001-", &id[..8]);
        assert!(id[8..].iter().all(u8::is_ascii_alphanumeric), "{id}");
    }

    #[test]
    fn test_generated_peer_ids_differ() {
        let first = generate_peer_id();
        let second = generate_peer_id();
        assert_ne!(first, second);
    }
}
