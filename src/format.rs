//! Renders raw sector bytes for logs and debug output.

use itertools::Itertools as _;

/// Formats raw byte slices without any decoding.
pub struct Raw;

impl Raw {
    /// Formats raw bytes as an escaped ASCII string.
    pub fn bytes(bytes: &[u8]) -> String {
        let escaped = bytes
            .iter()
            .copied()
            .flat_map(std::ascii::escape_default)
            .collect_vec();
        format!("\"{}\"", String::from_utf8_lossy(&escaped))
    }

    /// Like [`Raw::bytes`], cut to at most `limit` input bytes.
    pub fn truncated(bytes: &[u8], limit: usize) -> String {
        if bytes.len() <= limit {
            return Self::bytes(bytes);
        }
        format!(
            "{}... ({} more bytes)",
            Self::bytes(&bytes[..limit]),
            bytes.len() - limit
        )
    }
}
