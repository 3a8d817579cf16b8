use std::fmt::Write;

/// Lowercase hex rendering of binary identifiers (info-hashes) for logs.
pub fn hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
